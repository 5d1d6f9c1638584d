#[derive(Clone)]
struct AppState {
    inner: std::sync::Arc<Mutex<ServerInner>>,
    stream_tx: broadcast::Sender<StreamMessage>,
}

impl AppState {
    fn new() -> Self {
        let (stream_tx, _) = broadcast::channel(STREAM_CAPACITY);
        Self {
            inner: std::sync::Arc::new(Mutex::new(ServerInner::default())),
            stream_tx,
        }
    }
}

#[derive(Default)]
struct ServerInner {
    replay: Option<ReplayApi>,
    loaded_count: u64,
}

fn require_replay<'a>(
    inner: &'a ServerInner,
    replay_id: &str,
) -> Result<&'a ReplayApi, HttpApiError> {
    let Some(replay) = inner.replay.as_ref() else {
        return Err(HttpApiError::replay_not_found(replay_id, None));
    };

    if replay.replay_id() != replay_id {
        return Err(HttpApiError::replay_not_found(replay_id, Some(replay.replay_id())));
    }

    Ok(replay)
}

fn require_replay_mut<'a>(
    inner: &'a mut ServerInner,
    replay_id: &str,
) -> Result<&'a mut ReplayApi, HttpApiError> {
    let Some(replay) = inner.replay.as_mut() else {
        return Err(HttpApiError::replay_not_found(replay_id, None));
    };

    if replay.replay_id() != replay_id {
        return Err(HttpApiError::replay_not_found(replay_id, Some(replay.replay_id())));
    }

    Ok(replay)
}

fn collect_frame_messages(replay: &mut ReplayApi) -> Vec<StreamMessage> {
    let replay_id = replay.replay_id().to_string();
    replay
        .drain_frames()
        .iter()
        .map(|frame| StreamMessage::frame(&replay_id, frame))
        .collect()
}

fn broadcast_messages(state: &AppState, messages: Vec<StreamMessage>) {
    for message in messages {
        let _ = state.stream_tx.send(message);
    }
}
