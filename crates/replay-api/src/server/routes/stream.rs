async fn stream_replay(
    Path(replay_id): Path<String>,
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, HttpApiError> {
    let initial_messages = {
        let inner = state.inner.lock().await;
        let replay = require_replay(&inner, &replay_id)?;
        let now = Instant::now();
        vec![
            StreamMessage::playback_status(&replay_id, &replay.status()),
            StreamMessage::frame(&replay_id, &replay.snapshot(now)),
        ]
    };

    Ok(ws.on_upgrade(move |socket| stream_socket(socket, state, replay_id, initial_messages)))
}

async fn stream_socket(
    mut socket: WebSocket,
    state: AppState,
    replay_id: String,
    initial_messages: Vec<StreamMessage>,
) {
    for message in &initial_messages {
        if send_stream_message(&mut socket, message).await.is_err() {
            return;
        }
    }

    let mut rx = state.stream_tx.subscribe();

    loop {
        tokio::select! {
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Ping(payload))) => {
                        if socket.send(Message::Pong(payload)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => {
                        break;
                    }
                    _ => {}
                }
            }
            outgoing = rx.recv() => {
                match outgoing {
                    Ok(message) => {
                        if message.replay_id != replay_id {
                            continue;
                        }

                        if send_stream_message(&mut socket, &message).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::debug!(%replay_id, skipped, "stream client lagged");
                        let warning = StreamMessage::warning(
                            &replay_id,
                            0,
                            format!("stream client lagged and skipped {skipped} message(s)"),
                        );

                        if send_stream_message(&mut socket, &warning).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        break;
                    }
                }
            }
        }
    }
}

async fn send_stream_message(
    socket: &mut WebSocket,
    message: &StreamMessage,
) -> Result<(), axum::Error> {
    let payload = serde_json::to_string(message).map_err(axum::Error::new)?;
    socket.send(Message::Text(payload.into())).await
}

#[derive(Debug, Clone, Serialize)]
struct StreamMessage {
    schema_version: String,
    #[serde(rename = "type")]
    message_type: String,
    replay_id: String,
    second: u64,
    payload: Value,
}

impl StreamMessage {
    fn frame(replay_id: &str, snapshot: &ReplaySnapshot) -> Self {
        Self {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            message_type: "replay.frame".to_string(),
            replay_id: replay_id.to_string(),
            second: snapshot.second,
            payload: json!(snapshot),
        }
    }

    fn playback_status(replay_id: &str, status: &PlaybackStatus) -> Self {
        Self {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            message_type: "playback.status".to_string(),
            replay_id: replay_id.to_string(),
            second: status.second,
            payload: json!(status),
        }
    }

    fn warning(replay_id: &str, second: u64, warning: String) -> Self {
        Self {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            message_type: "warning".to_string(),
            replay_id: replay_id.to_string(),
            second,
            payload: json!({ "message": warning }),
        }
    }
}
