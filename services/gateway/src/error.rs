//! Error types for the gateway service.

use axum::extract::rejection::JsonRejection;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use warden_types::{ErrorKind, RpcError};

/// API error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: u16,
    pub category: &'static str,
    pub message: String,
}

/// API error type
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{message}")]
    TooManyRequests { message: String, retry_after_secs: u64 },

    #[error("upstream timed out")]
    UpstreamTimeout,

    #[error("internal error")]
    Internal(String),
}

impl ApiError {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    pub fn rate_limited(message: impl Into<String>, retry_after_secs: u64) -> Self {
        Self::TooManyRequests {
            message: message.into(),
            retry_after_secs,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::BadRequest(_) => ErrorKind::BadInput,
            Self::Unauthorized(_) => ErrorKind::Unauthorized,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::TooManyRequests { .. } => ErrorKind::RateLimited,
            Self::UpstreamTimeout => ErrorKind::UpstreamTimeout,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.kind().status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl From<RpcError> for ApiError {
    fn from(err: RpcError) -> Self {
        match err.kind() {
            ErrorKind::BadInput => Self::BadRequest(err.message),
            ErrorKind::Unauthorized => Self::Unauthorized(err.message),
            ErrorKind::Conflict => Self::Conflict(err.message),
            ErrorKind::RateLimited => Self::rate_limited(err.message, 60),
            ErrorKind::UpstreamTimeout => Self::UpstreamTimeout,
            ErrorKind::Internal => Self::Internal(err.message),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let kind = self.kind();

        // Log internal errors
        if let Self::Internal(detail) = &self {
            tracing::error!(detail = %detail, "Internal API error");
        }

        let retry_after = match &self {
            Self::TooManyRequests {
                retry_after_secs, ..
            } => Some(*retry_after_secs),
            _ => None,
        };

        let body = ErrorResponse {
            error: ErrorDetail {
                code: status.as_u16(),
                category: kind.as_str(),
                message: self.to_string(),
            },
        };

        let mut response = (status, Json(body)).into_response();
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
