#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("server io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug)]
struct HttpApiError {
    status: StatusCode,
    error: ApiError,
}

impl HttpApiError {
    fn replay_not_found(requested_replay_id: &str, active_replay_id: Option<&str>) -> Self {
        let details = active_replay_id.map(|active| {
            format!("requested_replay_id={requested_replay_id} active_replay_id={active}")
        });
        Self {
            status: StatusCode::NOT_FOUND,
            error: ApiError::new(
                ErrorCode::ReplayNotFound,
                "replay_id does not match the loaded replay",
                details,
            ),
        }
    }

    fn invalid_request(message: impl Into<String>, details: Option<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error: ApiError::new(ErrorCode::InvalidRequest, message, details),
        }
    }

    fn internal(message: impl Into<String>, details: Option<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            error: ApiError::new(ErrorCode::InternalError, message, details),
        }
    }

    fn from_load(err: LoadError) -> Self {
        match err {
            LoadError::Ingest(err) => {
                Self::invalid_request("csv could not be read", Some(err.to_string()))
            }
            LoadError::Replay(err) => Self::from_replay(err),
        }
    }

    fn from_replay(err: ReplayError) -> Self {
        let message = err.to_string();
        match err {
            ReplayError::NoData {
                total_rows,
                skipped_rows,
            } => Self {
                status: StatusCode::UNPROCESSABLE_ENTITY,
                error: ApiError::new(
                    ErrorCode::NoData,
                    message,
                    Some(format!("total_rows={total_rows} skipped_rows={skipped_rows}")),
                ),
            },
            ReplayError::EmptyWindow => Self {
                status: StatusCode::UNPROCESSABLE_ENTITY,
                error: ApiError::new(ErrorCode::NoData, message, None),
            },
            ReplayError::WindowTooLarge {
                seconds,
                max_seconds,
            } => Self {
                status: StatusCode::UNPROCESSABLE_ENTITY,
                error: ApiError::new(
                    ErrorCode::InvalidRequest,
                    message,
                    Some(format!("window_seconds={seconds} max_seconds={max_seconds}")),
                ),
            },
        }
    }
}

impl IntoResponse for HttpApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.error)).into_response()
    }
}
