//! API error types and their HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;

/// API error response body.
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: String,
}

/// API errors.
#[derive(Debug)]
pub enum ApiError {
    /// Request rejected before admission (schema, addresses, bounds).
    Validation(String),
    NotFound(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL", msg),
        };

        let body = Json(ErrorResponse {
            error: message,
            code: code.to_string(),
        });

        (status, body).into_response()
    }
}

impl From<normalizer::Error> for ApiError {
    fn from(e: normalizer::Error) -> Self {
        ApiError::Validation(e.to_string())
    }
}

impl From<order_store::Error> for ApiError {
    fn from(e: order_store::Error) -> Self {
        match e {
            order_store::Error::NotFound(id) => ApiError::NotFound(format!("order '{}' not found", id)),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<engine::QueueError> for ApiError {
    fn from(e: engine::QueueError) -> Self {
        ApiError::Internal(e.to_string())
    }
}
