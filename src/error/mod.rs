use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Failures raised while processing connection lifecycle events.
///
/// None of these is fatal to the process; each is contained to the
/// connection that caused it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PresenceError {
    #[error("{0}")]
    InvalidFormat(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Too many connections from {origin}")]
    RateLimited { origin: String },

    #[error("New connection established")]
    Superseded,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Connection is closed")]
    ConnectionClosed,

    #[error("{0}")]
    Store(String),
}

impl PresenceError {
    /// Machine-readable code sent alongside the message in `error` events
    pub fn code(&self) -> &'static str {
        match self {
            PresenceError::InvalidFormat(_) => "INVALID_FORMAT",
            PresenceError::NotFound(_) => "NOT_FOUND",
            PresenceError::RateLimited { .. } => "RATE_LIMITED",
            PresenceError::Superseded => "SUPERSEDED",
            PresenceError::Transport(_) => "TRANSPORT_ERROR",
            PresenceError::ConnectionClosed => "CONNECTION_CLOSED",
            PresenceError::Store(_) => "INTERNAL_ERROR",
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Serialize)]
struct ErrorBody {
    code: String,
    message: String,
}

/// Check if running in production mode (based on RUN_MODE env var)
fn is_production() -> bool {
    std::env::var("RUN_MODE")
        .map(|m| m == "production" || m == "prod")
        .unwrap_or(false)
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, client_message, log_message) = match &self {
            AppError::Config(e) => {
                let log_msg = e.to_string();
                let client_msg = if is_production() {
                    "Configuration error".to_string()
                } else {
                    log_msg.clone()
                };
                (StatusCode::INTERNAL_SERVER_ERROR, "CONFIG_ERROR", client_msg, log_msg)
            }
            AppError::Auth(msg) => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                msg.clone(),
                msg.clone(),
            ),
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                msg.clone(),
                msg.clone(),
            ),
            AppError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                msg.clone(),
                msg.clone(),
            ),
            AppError::Forbidden(msg) => (
                StatusCode::FORBIDDEN,
                "FORBIDDEN",
                msg.clone(),
                msg.clone(),
            ),
            AppError::Internal(e) => {
                let log_msg = e.clone();
                let client_msg = if is_production() {
                    "Internal server error".to_string()
                } else {
                    log_msg.clone()
                };
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", client_msg, log_msg)
            }
            AppError::Store(e) => {
                let log_msg = e.to_string();
                let client_msg = if is_production() {
                    "Internal server error".to_string()
                } else {
                    log_msg.clone()
                };
                (StatusCode::INTERNAL_SERVER_ERROR, "STORE_ERROR", client_msg, log_msg)
            }
        };

        if status.is_server_error() {
            tracing::error!(
                code = %code,
                status = %status.as_u16(),
                message = %log_message,
                "API error"
            );
        } else {
            tracing::debug!(
                code = %code,
                status = %status.as_u16(),
                message = %log_message,
                "API request rejected"
            );
        }

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message: client_message,
            },
        };

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presence_error_codes() {
        assert_eq!(
            PresenceError::InvalidFormat("Invalid interest ID format".into()).code(),
            "INVALID_FORMAT"
        );
        assert_eq!(PresenceError::NotFound("Interest not found".into()).code(), "NOT_FOUND");
        assert_eq!(PresenceError::Superseded.code(), "SUPERSEDED");
        assert_eq!(
            PresenceError::Transport("connection reset".into()).code(),
            "TRANSPORT_ERROR"
        );
    }

    #[test]
    fn test_presence_error_messages_are_client_facing() {
        let err = PresenceError::InvalidFormat("Invalid typing data".into());
        assert_eq!(err.to_string(), "Invalid typing data");
        assert_eq!(PresenceError::Superseded.to_string(), "New connection established");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::Forbidden("x".into()).into_response().status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::Validation("x".into()).into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Auth("x".into()).into_response().status(),
            StatusCode::UNAUTHORIZED
        );
    }
}
