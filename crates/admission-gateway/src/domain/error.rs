//! Gateway error types.
//!
//! `ApiError` is what a client sees. Its kinds follow the admission taxonomy:
//! validation, authorization, duplicate preparation, expired preparation,
//! transient unavailability and downstream engine errors, which are relayed
//! without reinterpretation.

use crate::domain::config::ConfigError;
use crate::domain::params::ContractError;
use serde::Serialize;
use std::fmt;

/// Stable error codes written into the `error` field of responses.
pub mod codes {
    pub const INVALID_PARAMS: &str = "E_INVALIDPARAMS";
    pub const UNAUTHORIZED: &str = "E_UNAUTHORIZED";
    pub const CONFLICT: &str = "E_CONFLICT";
    pub const EXPIRED_REQUEST: &str = "E_EXPIREDREQUEST";
    pub const NOT_FOUND: &str = "E_NOTFOUND";
    pub const UNAVAILABLE: &str = "E_UNAVAILABLE";
    pub const TIMEOUT: &str = "E_TIMEOUT";
    pub const INTERNAL: &str = "E_SERVER";
}

/// Client-facing error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Missing or malformed parameter, rejected before any handler runs
    InvalidParams,
    /// Missing or rejected session
    Unauthorized,
    /// A live prepared request already holds the identifier
    Conflict,
    /// Prepared request unknown, already consumed or past its TTL
    ExpiredRequest,
    /// Resource not found
    NotFound,
    /// Transient condition (chain updating, buffer full); retry with backoff
    Unavailable,
    /// Request exceeded its time budget
    Timeout,
    /// Unexpected gateway failure
    Internal,
    /// Error produced by the contract/data engine, relayed as-is
    Downstream,
}

impl ErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidParams => codes::INVALID_PARAMS,
            Self::Unauthorized => codes::UNAUTHORIZED,
            Self::Conflict => codes::CONFLICT,
            Self::ExpiredRequest => codes::EXPIRED_REQUEST,
            Self::NotFound => codes::NOT_FOUND,
            Self::Unavailable => codes::UNAVAILABLE,
            Self::Timeout => codes::TIMEOUT,
            Self::Internal | Self::Downstream => codes::INTERNAL,
        }
    }

    /// Only buffer/infrastructure conditions may be retried by the client.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable | Self::Timeout)
    }
}

/// API error returned to clients
#[derive(Debug, Clone, PartialEq)]
pub struct ApiError {
    pub kind: ErrorKind,
    pub message: String,
    /// Extra payload; for `Downstream` this is the engine's error body
    pub data: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(kind: ErrorKind, message: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            kind,
            message: message.into(),
            data: Some(data),
        }
    }

    /// Invalid parameters
    pub fn invalid_params(details: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidParams, details)
    }

    /// Required parameter absent
    pub fn missing_param(name: &str) -> Self {
        Self::new(
            ErrorKind::InvalidParams,
            format!("parameter {name} has not been found"),
        )
    }

    pub fn unauthorized(details: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthorized, format!("Unauthorized: {}", details.into()))
    }

    /// Duplicate preparation under a live identifier
    pub fn conflict(details: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, details)
    }

    /// Prepared request expired or unknown; the client must prepare again
    pub fn expired_request(request_id: impl fmt::Display) -> Self {
        Self::new(
            ErrorKind::ExpiredRequest,
            format!("request {request_id} has expired or is unknown"),
        )
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, format!("{} not found", resource.into()))
    }

    pub fn unavailable(details: impl Into<String>, retry_after_ms: Option<u64>) -> Self {
        let mut error = Self::new(ErrorKind::Unavailable, details);
        if let Some(retry_after_ms) = retry_after_ms {
            error.data = Some(serde_json::json!({ "retry_after_ms": retry_after_ms }));
        }
        error
    }

    pub fn timeout(details: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, details)
    }

    pub fn internal(details: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, details)
    }

    /// Wrap an engine error body so it reaches the client unchanged
    pub fn downstream(payload: serde_json::Value) -> Self {
        let message = payload
            .get("error")
            .and_then(|e| e.as_str())
            .unwrap_or("downstream error")
            .to_string();
        Self::with_data(ErrorKind::Downstream, message, payload)
    }

    /// The engine's permission refusal
    pub fn access_denied() -> Self {
        Self::downstream(serde_json::json!({
            "type": "panic",
            "error": "Access denied"
        }))
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.kind, &self.data) {
            (ErrorKind::Downstream, Some(payload)) => write!(f, "{}", payload),
            _ => write!(f, "[{}] {}", self.kind.code(), self.message),
        }
    }
}

impl std::error::Error for ApiError {}

impl Serialize for ApiError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;

        if let (ErrorKind::Downstream, Some(payload)) = (&self.kind, &self.data) {
            return payload.serialize(serializer);
        }

        let len = if self.data.is_some() { 3 } else { 2 };
        let mut state = serializer.serialize_struct("ApiError", len)?;
        state.serialize_field("error", self.kind.code())?;
        state.serialize_field("msg", &self.message)?;
        if let Some(ref data) = self.data {
            state.serialize_field("data", data)?;
        }
        state.end()
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        ApiError::invalid_params(format!("invalid json: {}", e))
    }
}

impl From<hex::FromHexError> for ApiError {
    fn from(e: hex::FromHexError) -> Self {
        ApiError::invalid_params(format!("invalid hex: {}", e))
    }
}

/// Result type for API operations
pub type ApiResult<T> = Result<T, ApiError>;

/// Route table construction errors. Any of these aborts startup.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RouteError {
    #[error("route {method} {pattern}: {source}")]
    Contract {
        method: String,
        pattern: String,
        #[source]
        source: ContractError,
    },

    #[error("route {method} {pattern} registered twice")]
    Duplicate { method: String, pattern: String },

    #[error("route {pattern}: method {method} cannot be routed")]
    Method { method: String, pattern: String },
}

/// Gateway-level errors (not client facing)
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("route table error: {0}")]
    Routes(#[from] RouteError),

    #[error("server bind error: {0}")]
    Bind(String),

    #[error("telemetry error: {0}")]
    Telemetry(String),

    #[error("internal error: {0}")]
    Internal(String),
}
