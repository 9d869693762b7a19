use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::engine::duty::DutyError;
use crate::models::session::RideStage;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unprocessable: {0}")]
    Unprocessable(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("upstream failure: {0}")]
    Upstream(String),

    #[error("unavailable: {0}")]
    Unavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Outcome of a driver action the coordinator refused or could not commit.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RideError {
    #[error("trip start code does not match")]
    InvalidOtp,

    #[error("cannot {action} while ride is {stage}")]
    InvalidTransition {
        action: &'static str,
        stage: RideStage,
    },

    #[error("booking {0} is no longer the active ride")]
    Stale(String),

    #[error("booking {0} was cancelled by the rider")]
    Cancelled(String),

    #[error("booking update failed: {0}")]
    DurableWrite(String),

    #[error("ride coordinator is not running")]
    Unavailable,
}

impl RideError {
    /// Whether the driver can simply try the same action again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RideError::InvalidOtp | RideError::DurableWrite(_))
    }
}

impl From<RideError> for AppError {
    fn from(err: RideError) -> Self {
        let message = err.to_string();
        match err {
            RideError::InvalidOtp => AppError::Unprocessable(message),
            RideError::InvalidTransition { .. } | RideError::Stale(_) | RideError::Cancelled(_) => {
                AppError::Conflict(message)
            }
            RideError::DurableWrite(_) => AppError::Upstream(message),
            RideError::Unavailable => AppError::Unavailable(message),
        }
    }
}

impl From<DutyError> for AppError {
    fn from(err: DutyError) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Unprocessable(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::Upstream(msg) => (StatusCode::BAD_GATEWAY, msg.clone()),
            AppError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use axum::response::IntoResponse;

    use super::{AppError, RideError};
    use crate::models::session::RideStage;

    fn status_of(err: RideError) -> StatusCode {
        AppError::from(err).into_response().status()
    }

    #[test]
    fn ride_errors_map_to_http_statuses() {
        assert_eq!(status_of(RideError::InvalidOtp), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            status_of(RideError::InvalidTransition {
                action: "accept",
                stage: RideStage::Idle
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(status_of(RideError::Stale("B-1".into())), StatusCode::CONFLICT);
        assert_eq!(status_of(RideError::Cancelled("B-1".into())), StatusCode::CONFLICT);
        assert_eq!(
            status_of(RideError::DurableWrite("bad gateway".into())),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(status_of(RideError::Unavailable), StatusCode::SERVICE_UNAVAILABLE);
    }
}
