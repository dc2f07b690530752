use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

/// Failure of a batched metadata resolution.
///
/// `Clone` because a single failed batch is reported to every caller that
/// was waiting on it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Resolver returned {actual} values for {expected} keys")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("Resolution aborted: {0}")]
    Aborted(String),
}

/// Common error types used across the application.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Resolution error: {0}")]
    Resolution(#[from] ResolutionError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Numeric overflow: {0}")]
    Overflow(String),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        AppError::InvalidInput(msg.into())
    }

    pub fn overflow(msg: impl Into<String>) -> Self {
        AppError::Overflow(msg.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Resolution(ResolutionError::NotFound(_)) => {
                (StatusCode::NOT_FOUND, self.to_string())
            }
            AppError::Resolution(_) => (StatusCode::BAD_GATEWAY, self.to_string()),
            AppError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Overflow(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg.clone()),
            AppError::Rpc(_) => (StatusCode::BAD_GATEWAY, self.to_string()),
            AppError::Decode(msg) => (StatusCode::BAD_GATEWAY, msg.clone()),
            AppError::Config(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = json!({ "error": message });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_error_converts() {
        let err: AppError = ResolutionError::Transport("connection reset".into()).into();
        assert!(matches!(err, AppError::Resolution(ResolutionError::Transport(_))));
        assert_eq!(
            err.to_string(),
            "Resolution error: Transport error: connection reset"
        );
    }

    #[test]
    fn test_status_codes() {
        let not_found: AppError = ResolutionError::NotFound("0x1".into()).into();
        assert_eq!(not_found.into_response().status(), StatusCode::NOT_FOUND);

        let bad = AppError::invalid_input("negative amount");
        assert_eq!(bad.into_response().status(), StatusCode::BAD_REQUEST);

        let upstream: AppError = ResolutionError::LengthMismatch {
            expected: 2,
            actual: 1,
        }
        .into();
        assert_eq!(upstream.into_response().status(), StatusCode::BAD_GATEWAY);
    }
}
