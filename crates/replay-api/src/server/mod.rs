use std::net::SocketAddr;
use std::time::{Duration, Instant};

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Request, State};
use axum::http::header::{HeaderName, HeaderValue};
use axum::http::Method;
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use contracts::{
    ApiError, ErrorCode, PlaybackStatus, ReplayConfig, ReplaySnapshot, ReplaySummary,
    TimelineMarker, SCHEMA_VERSION_V1,
};
use replay_core::playback::DEFAULT_SKIP_SECONDS;
use replay_core::{RawRow, ReplayError, SeekReport};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, Mutex};

use crate::{LoadError, ReplayApi};

const FRAME_PUMP_INTERVAL: Duration = Duration::from_millis(16);
const STREAM_CAPACITY: usize = 1024;

include!("error.rs");
include!("state.rs");
include!("routes/control.rs");
include!("routes/query.rs");
include!("routes/stream.rs");
include!("util.rs");

pub async fn serve(addr: SocketAddr) -> Result<(), ServerError> {
    let state = AppState::new();
    tokio::spawn(frame_pump(state.clone()));
    let app = router(state);

    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "replay server listening");
    axum::serve(listener, app).await?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/replays", post(load_replay))
        .route("/api/v1/replays/{replay_id}/summary", get(get_summary))
        .route("/api/v1/replays/{replay_id}/status", get(get_status))
        .route("/api/v1/replays/{replay_id}/snapshot", get(get_snapshot))
        .route("/api/v1/replays/{replay_id}/markers", get(get_markers))
        .route("/api/v1/replays/{replay_id}/seek", post(seek_replay))
        .route("/api/v1/replays/{replay_id}/play_pause", post(play_pause_replay))
        .route("/api/v1/replays/{replay_id}/skip", post(skip_replay))
        .route("/api/v1/replays/{replay_id}/speed", post(set_speed))
        .route("/api/v1/replays/{replay_id}/stream", get(stream_replay))
        .layer(middleware::from_fn(cors_middleware))
        .with_state(state)
}

/// Polls the active replay once per display refresh and broadcasts whatever it painted.
async fn frame_pump(state: AppState) {
    let mut ticker = tokio::time::interval(FRAME_PUMP_INTERVAL);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        ticker.tick().await;
        let messages = {
            let mut inner = state.inner.lock().await;
            let Some(replay) = inner.replay.as_mut() else {
                continue;
            };
            let outcome = replay.poll(Instant::now());
            let mut messages = collect_frame_messages(replay);
            if outcome.stopped_at_end {
                messages.push(StreamMessage::playback_status(replay.replay_id(), &replay.status()));
            }
            messages
        };
        broadcast_messages(&state, messages);
    }
}

async fn cors_middleware(request: Request, next: Next) -> Response {
    if request.method() == Method::OPTIONS {
        let mut response = Response::new(axum::body::Body::empty());
        *response.status_mut() = StatusCode::NO_CONTENT;
        apply_cors_headers(response.headers_mut());
        return response;
    }

    let mut response = next.run(request).await;
    apply_cors_headers(response.headers_mut());
    response
}
