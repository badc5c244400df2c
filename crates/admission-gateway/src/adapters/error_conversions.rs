//! Error conversions from infrastructure types.
//!
//! These conversions involve I/O and HTTP types and belong in the adapters layer.

use crate::adapters::buffer::BufferError;
use crate::domain::{ApiError, ErrorKind};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

/// Back-off suggested to clients when the buffer refuses a put
const RETRY_AFTER_MS: u64 = 500;

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidParams => StatusCode::BAD_REQUEST,
        ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::ExpiredRequest | ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        ErrorKind::Downstream => StatusCode::BAD_REQUEST,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (status_for(self.kind), Json(self)).into_response()
    }
}

impl From<std::io::Error> for ApiError {
    fn from(e: std::io::Error) -> Self {
        ApiError::internal(e.to_string())
    }
}

impl From<BufferError> for ApiError {
    fn from(e: BufferError) -> Self {
        match e {
            BufferError::Conflict(_) => ApiError::conflict(e.to_string()),
            BufferError::Full { .. } | BufferError::IdSpaceExhausted => {
                ApiError::unavailable(e.to_string(), Some(RETRY_AFTER_MS))
            }
            BufferError::EmptyBatch => ApiError::invalid_params(e.to_string()),
        }
    }
}
