//! Auth errors

use thiserror::Error;
use warden_types::{ErrorKind, RpcError};

/// Why a refresh token was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshFailure {
    /// Account has no refresh state (never issued, or logged out)
    NoStoredToken,
    /// Token id differs from the stored one
    Mismatch,
    /// Token id is on the blacklist
    Revoked,
    /// Digest comparison or signature verification failed
    Invalid,
    /// Another rotation replaced the stored pair first
    ConcurrentRotation,
}

impl RefreshFailure {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoStoredToken => "no refresh token stored",
            Self::Mismatch => "refresh token mismatch",
            Self::Revoked => "refresh token has been revoked",
            Self::Invalid => "invalid refresh token",
            Self::ConcurrentRotation => "concurrent refresh detected; retry",
        }
    }
}

impl std::fmt::Display for RefreshFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authentication errors
#[derive(Error, Debug)]
pub enum AuthError {
    /// Malformed or missing input
    #[error("{0}")]
    BadInput(String),

    /// Email already registered
    #[error("email already in use")]
    EmailTaken,

    /// Invalid credentials (unknown email or wrong password)
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Invalid token (malformed, bad signature, unknown key id)
    #[error("invalid token")]
    InvalidToken,

    /// Token has expired
    #[error("token expired")]
    TokenExpired,

    /// Refresh token rejected
    #[error("{0}")]
    RefreshRejected(RefreshFailure),

    /// Database error
    #[error("database error: {0}")]
    Database(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Failure category
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::BadInput(_) => ErrorKind::BadInput,
            Self::EmailTaken => ErrorKind::Conflict,
            Self::InvalidCredentials
            | Self::InvalidToken
            | Self::TokenExpired
            | Self::RefreshRejected(_) => ErrorKind::Unauthorized,
            Self::Database(_) | Self::Configuration(_) | Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Get HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        self.kind().status_code()
    }

    /// Get error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::BadInput(_) => "BAD_INPUT",
            Self::EmailTaken => "EMAIL_TAKEN",
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::InvalidToken => "INVALID_TOKEN",
            Self::TokenExpired => "TOKEN_EXPIRED",
            Self::RefreshRejected(_) => "REFRESH_REJECTED",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Message safe to return to callers; internal detail stays in the logs
    pub fn public_message(&self) -> String {
        match self.kind() {
            ErrorKind::Internal => "internal error".to_string(),
            _ => self.to_string(),
        }
    }

    pub(crate) fn bad_input(message: impl Into<String>) -> Self {
        Self::BadInput(message.into())
    }
}

impl From<warden_db::DbError> for AuthError {
    fn from(err: warden_db::DbError) -> Self {
        match err {
            warden_db::DbError::Conflict(_) => Self::EmailTaken,
            err => {
                tracing::error!("Database error: {}", err);
                Self::Database(err.to_string())
            }
        }
    }
}

impl From<AuthError> for RpcError {
    fn from(err: AuthError) -> Self {
        RpcError::new(err.kind(), err.public_message())
    }
}

/// Result alias for auth operations
pub type AuthResult<T> = Result<T, AuthError>;
