#[derive(Debug, Deserialize)]
struct LoadReplayRequest {
    replay_id: Option<String>,
    csv: Option<String>,
    rows: Option<Vec<RawRow>>,
    #[serde(default)]
    config: ReplayConfig,
}

#[derive(Debug, Serialize)]
struct LoadReplayResponse {
    schema_version: String,
    replay_id: String,
    summary: ReplaySummary,
    status: PlaybackStatus,
    replaced_existing_replay: bool,
}

fn build_replay(
    replay_id: String,
    csv: Option<String>,
    rows: Option<Vec<RawRow>>,
    config: ReplayConfig,
) -> Result<ReplayApi, HttpApiError> {
    match (csv, rows) {
        (Some(csv), None) => {
            ReplayApi::from_csv(replay_id, &csv, config).map_err(HttpApiError::from_load)
        }
        (None, Some(rows)) => {
            ReplayApi::from_rows(replay_id, &rows, config).map_err(HttpApiError::from_replay)
        }
        (Some(_), Some(_)) => Err(HttpApiError::invalid_request(
            "provide either csv or rows, not both",
            None,
        )),
        (None, None) => Err(HttpApiError::invalid_request(
            "request carries no cycle data",
            Some("expected csv or rows".to_string()),
        )),
    }
}

async fn load_replay(
    State(state): State<AppState>,
    Json(request): Json<LoadReplayRequest>,
) -> Result<Json<LoadReplayResponse>, HttpApiError> {
    let (response, messages) = {
        let mut inner = state.inner.lock().await;
        let replay_id = request
            .replay_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| next_replay_id(inner.loaded_count + 1));

        // Timeline compilation is CPU-bound and runs off the async workers.
        let (csv, rows, config) = (request.csv, request.rows, request.config);
        let mut replay =
            tokio::task::spawn_blocking(move || build_replay(replay_id, csv, rows, config))
                .await
                .map_err(|err| {
                    HttpApiError::internal("replay load task failed", Some(err.to_string()))
                })??;

        let replaced_existing_replay = inner.replay.is_some();
        let mut messages = collect_frame_messages(&mut replay);
        let status = replay.status();
        if replaced_existing_replay {
            messages.push(StreamMessage::warning(
                replay.replay_id(),
                0,
                "existing replay was replaced by POST /replays".to_string(),
            ));
        }
        messages.push(StreamMessage::playback_status(replay.replay_id(), &status));

        let response = LoadReplayResponse {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            replay_id: replay.replay_id().to_string(),
            summary: replay.summary().clone(),
            status,
            replaced_existing_replay,
        };
        inner.replay = Some(replay);
        inner.loaded_count += 1;
        (response, messages)
    };

    broadcast_messages(&state, messages);

    Ok(Json(response))
}

#[derive(Debug, Serialize)]
struct SeekSummary {
    from_second: u64,
    to_second: u64,
    full_rebuild: bool,
    replayed_frames: u64,
    applied_events: u64,
    skipped_events: u64,
}

impl From<SeekReport> for SeekSummary {
    fn from(report: SeekReport) -> Self {
        Self {
            from_second: report.from_second,
            to_second: report.to_second,
            full_rebuild: report.full_rebuild,
            replayed_frames: report.replayed_frames,
            applied_events: report.applied_events,
            skipped_events: report.skipped_events,
        }
    }
}

#[derive(Debug, Serialize)]
struct ReplayControlResponse {
    schema_version: String,
    replay_id: String,
    status: PlaybackStatus,
    seek: Option<SeekSummary>,
}

#[derive(Debug, Deserialize)]
struct SeekRequest {
    second: i64,
}

#[derive(Debug, Deserialize, Default)]
struct SkipRequest {
    seconds: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct SpeedRequest {
    multiplier: f64,
}

/// Runs one control call against the loaded replay and broadcasts the frames it painted.
async fn control_replay(
    state: &AppState,
    replay_id: &str,
    action: impl FnOnce(&mut ReplayApi, Instant) -> Option<SeekReport>,
) -> Result<Json<ReplayControlResponse>, HttpApiError> {
    let (response, messages) = {
        let mut inner = state.inner.lock().await;
        let replay = require_replay_mut(&mut inner, replay_id)?;
        let seek = action(replay, Instant::now());

        let mut messages = collect_frame_messages(replay);
        let status = replay.status();
        messages.push(StreamMessage::playback_status(replay_id, &status));

        (
            ReplayControlResponse {
                schema_version: SCHEMA_VERSION_V1.to_string(),
                replay_id: replay_id.to_string(),
                status,
                seek: seek.map(SeekSummary::from),
            },
            messages,
        )
    };

    broadcast_messages(state, messages);

    Ok(Json(response))
}

async fn seek_replay(
    Path(replay_id): Path<String>,
    State(state): State<AppState>,
    Json(request): Json<SeekRequest>,
) -> Result<Json<ReplayControlResponse>, HttpApiError> {
    control_replay(&state, &replay_id, |replay, now| {
        Some(replay.seek(request.second, now))
    })
    .await
}

async fn play_pause_replay(
    Path(replay_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<ReplayControlResponse>, HttpApiError> {
    control_replay(&state, &replay_id, |replay, now| {
        replay.play_pause(now);
        None
    })
    .await
}

async fn skip_replay(
    Path(replay_id): Path<String>,
    State(state): State<AppState>,
    Json(request): Json<SkipRequest>,
) -> Result<Json<ReplayControlResponse>, HttpApiError> {
    let seconds = request.seconds.unwrap_or(DEFAULT_SKIP_SECONDS);
    control_replay(&state, &replay_id, |replay, now| Some(replay.skip(seconds, now))).await
}

async fn set_speed(
    Path(replay_id): Path<String>,
    State(state): State<AppState>,
    Json(request): Json<SpeedRequest>,
) -> Result<Json<ReplayControlResponse>, HttpApiError> {
    if !request.multiplier.is_finite() || request.multiplier <= 0.0 {
        return Err(HttpApiError::invalid_request(
            "multiplier must be a positive number",
            Some(format!("multiplier={}", request.multiplier)),
        ));
    }
    control_replay(&state, &replay_id, |replay, _| {
        replay.set_playback_speed(request.multiplier);
        None
    })
    .await
}
