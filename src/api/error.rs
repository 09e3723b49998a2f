//! Error-to-response mapping for the HTTP edge.

use crate::detect::DetectError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

/// Errors surfaced to HTTP callers. Each variant maps to a distinct
/// status so clients can tell "fix your request" from "try again later".
#[derive(Debug)]
pub enum ApiError {
    /// Malformed caller input; never retried internally.
    Validation(String),
    /// Missing or wrong X-API-KEY header.
    Unauthorized,
    /// No model has been published yet; retriable after training completes.
    ModelNotReady,
    /// Storage or other unexpected failure.
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "Unauthorized: Invalid API Key".to_string(),
            ),
            ApiError::ModelNotReady => (
                StatusCode::SERVICE_UNAVAILABLE,
                "model not yet trained, try again later".to_string(),
            ),
            ApiError::Internal(e) => {
                error!("Request failed: {:#}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<DetectError> for ApiError {
    fn from(e: DetectError) -> Self {
        match e {
            DetectError::ModelNotReady => ApiError::ModelNotReady,
            other => ApiError::Internal(other.into()),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        ApiError::Internal(e)
    }
}
