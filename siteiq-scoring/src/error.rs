//! HTTP error type for the scoring service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Duplicate idempotency key (409); carries the existing resource
    #[error("Conflict: {message}")]
    Conflict {
        message: String,
        existing: Option<Value>,
    },

    /// Request understood but the target cannot be processed (422)
    #[error("Unprocessable: {0}")]
    Unprocessable(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// siteiq-common error
    #[error(transparent)]
    Common(#[from] siteiq_common::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message, details) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg, None),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg, None),
            ApiError::Conflict { message, existing } => {
                (StatusCode::CONFLICT, "CONFLICT", message, existing)
            }
            ApiError::Unprocessable(msg) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "UNPROCESSABLE", msg, None)
            }
            ApiError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg, None)
            }
            ApiError::Common(err) => {
                let (status, code) = match &err {
                    siteiq_common::Error::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
                    siteiq_common::Error::InvalidInput(_) => {
                        (StatusCode::BAD_REQUEST, "BAD_REQUEST")
                    }
                    siteiq_common::Error::Config(_) => {
                        (StatusCode::BAD_REQUEST, "CONFIGURATION_ERROR")
                    }
                    _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
                };
                if status.is_server_error() {
                    tracing::error!(error = %err, "Request failed");
                }
                (status, code, err.to_string(), None)
            }
        };

        let mut error = json!({
            "code": error_code,
            "message": message,
        });
        if let Some(details) = details {
            error["details"] = details;
        }

        (status, Json(json!({ "error": error }))).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
