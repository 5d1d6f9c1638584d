async fn get_summary(
    Path(replay_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<ReplaySummary>, HttpApiError> {
    let inner = state.inner.lock().await;
    let summary = require_replay(&inner, &replay_id)?.summary().clone();
    Ok(Json(summary))
}

async fn get_status(
    Path(replay_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<ReplayControlResponse>, HttpApiError> {
    let response = {
        let inner = state.inner.lock().await;
        let status = require_replay(&inner, &replay_id)?.status();
        ReplayControlResponse {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            replay_id: replay_id.clone(),
            status,
            seek: None,
        }
    };

    Ok(Json(response))
}

async fn get_snapshot(
    Path(replay_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<ReplaySnapshot>, HttpApiError> {
    let inner = state.inner.lock().await;
    let snapshot = require_replay(&inner, &replay_id)?.snapshot(Instant::now());
    Ok(Json(snapshot))
}

#[derive(Debug, Serialize)]
struct MarkersResponse {
    schema_version: String,
    replay_id: String,
    duration_seconds: u64,
    markers: Vec<TimelineMarker>,
}

async fn get_markers(
    Path(replay_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<MarkersResponse>, HttpApiError> {
    let response = {
        let inner = state.inner.lock().await;
        let replay = require_replay(&inner, &replay_id)?;
        MarkersResponse {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            replay_id: replay_id.clone(),
            duration_seconds: replay.summary().duration_seconds,
            markers: replay.markers(),
        }
    };

    Ok(Json(response))
}
