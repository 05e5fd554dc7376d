//! Failure taxonomy shared by the auth core and the gateway

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Category of a failed operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Malformed or missing input
    BadInput,
    /// Resource already exists
    Conflict,
    /// Credentials or token rejected
    Unauthorized,
    /// Throttled by a rate-limit policy
    RateLimited,
    /// Upstream did not answer in time
    UpstreamTimeout,
    /// Anything else; detail is logged, never returned
    Internal,
}

impl ErrorKind {
    /// Transport status code
    pub fn status_code(self) -> u16 {
        match self {
            Self::BadInput => 400,
            Self::Unauthorized => 401,
            Self::Conflict => 409,
            Self::RateLimited => 429,
            Self::Internal => 500,
            Self::UpstreamTimeout => 504,
        }
    }

    /// Machine-checkable category
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BadInput => "BAD_INPUT",
            Self::Conflict => "CONFLICT",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::RateLimited => "RATE_LIMITED",
            Self::UpstreamTimeout => "UPSTREAM_TIMEOUT",
            Self::Internal => "INTERNAL",
        }
    }

    /// Reason phrase carried in the `error` field of the envelope
    pub fn reason(self) -> &'static str {
        match self {
            Self::BadInput => "Bad Request",
            Self::Unauthorized => "Unauthorized",
            Self::Conflict => "Conflict",
            Self::RateLimited => "Too Many Requests",
            Self::Internal => "Internal Server Error",
            Self::UpstreamTimeout => "Gateway Timeout",
        }
    }

    /// Inverse of [`ErrorKind::status_code`]; unknown codes are `Internal`.
    pub fn from_status(status: u16) -> Self {
        match status {
            400 | 422 => Self::BadInput,
            401 | 403 => Self::Unauthorized,
            409 => Self::Conflict,
            429 => Self::RateLimited,
            504 | 408 => Self::UpstreamTimeout,
            _ => Self::Internal,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure envelope crossing the gateway/core channel
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[error("{error} ({status_code}): {message}")]
pub struct RpcError {
    pub status_code: u16,
    pub error: String,
    pub message: String,
}

impl RpcError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            status_code: kind.status_code(),
            error: kind.reason().to_string(),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        ErrorKind::from_status(self.status_code)
    }

    /// Coerce an arbitrary error payload into an envelope.
    ///
    /// Accepts the envelope itself, `{status, message}` shapes, message arrays
    /// (joined with `", "`), bare strings, and falls back to `Internal`.
    pub fn coerce(value: &Value) -> Self {
        let Some(obj) = value.as_object() else {
            return match value.as_str() {
                Some(msg) => Self::new(ErrorKind::Internal, msg),
                None => Self::new(ErrorKind::Internal, "internal error"),
            };
        };

        let status = ["statusCode", "status", "code"]
            .iter()
            .filter_map(|k| obj.get(*k))
            .find_map(Value::as_u64)
            .and_then(|s| u16::try_from(s).ok())
            .filter(|s| (400..600).contains(s))
            .unwrap_or(500);
        let kind = ErrorKind::from_status(status);

        let message = match obj.get("message") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join(", "),
            _ => kind.reason().to_string(),
        };

        Self {
            status_code: kind.status_code(),
            error: kind.reason().to_string(),
            message,
        }
    }
}
