//! API error types and JSON error response formatting.
//!
//! ApiError maps internal errors to HTTP status codes with a consistent
//! `{error, message}` JSON body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use dealpilot_automation::AutomationError;
use dealpilot_core::error::DealpilotError;

/// JSON error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Machine-readable error code (e.g., "bad_request", "not_found").
    pub error: String,
    pub message: String,
}

#[derive(Debug)]
pub enum ApiError {
    /// 400 - missing or malformed parameters.
    BadRequest(String),
    NotFound(String),
    /// 422 - well-formed input that fails validation.
    UnprocessableEntity(String),
    Internal(String),
    /// 503 - a backing store or the engine is not available.
    ServiceUnavailable(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::UnprocessableEntity(msg) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "unprocessable_entity", msg)
            }
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal API error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg)
            }
            ApiError::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable", msg)
            }
        };

        let body = ErrorBody {
            error: error_code.to_string(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

impl From<DealpilotError> for ApiError {
    fn from(err: DealpilotError) -> Self {
        match err {
            DealpilotError::Validation(msg) => ApiError::UnprocessableEntity(msg),
            DealpilotError::NotFound(msg) => ApiError::NotFound(msg),
            DealpilotError::ShuttingDown => {
                ApiError::ServiceUnavailable("Shutdown in progress".to_string())
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<AutomationError> for ApiError {
    fn from(err: AutomationError) -> Self {
        match &err {
            AutomationError::InvalidSignal(msg) => ApiError::UnprocessableEntity(msg.clone()),
            AutomationError::RuleLoad(_) | AutomationError::QueueClosed => {
                ApiError::ServiceUnavailable(err.to_string())
            }
            AutomationError::Aborted(_) => ApiError::Internal(err.to_string()),
        }
    }
}
