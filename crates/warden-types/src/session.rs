//! Cache-resident session state

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::AccountId;

/// Marker that an account has an active session.
///
/// Advisory only: the credential store decides refresh validity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub account_id: AccountId,
    pub email: String,
    pub login_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn new(account_id: AccountId, email: impl Into<String>) -> Self {
        Self {
            account_id,
            email: email.into(),
            login_at: Utc::now(),
        }
    }
}

/// Mirror of the current refresh token id, kept for fast lookup and so that
/// logout can blacklist the outstanding token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshMetadata {
    pub jti: String,
    pub issued_at: DateTime<Utc>,
}

impl RefreshMetadata {
    pub fn new(jti: impl Into<String>) -> Self {
        Self {
            jti: jti.into(),
            issued_at: Utc::now(),
        }
    }
}
