//! Database row models
//!
//! These types map directly to database rows using SQLx's FromRow derive.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;
use warden_types::{AccountId, PublicAccount};

/// Account row from the database
#[derive(Clone, PartialEq, Eq, FromRow)]
pub struct AccountRow {
    pub id: Uuid,
    pub email: String,
    pub password_digest: String,
    pub refresh_digest: Option<String>,
    pub refresh_jti: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AccountRow {
    /// Projection safe to hand out of the auth core
    pub fn to_public(&self) -> PublicAccount {
        PublicAccount {
            id: AccountId(self.id),
            email: self.email.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    /// Current refresh pair, present only when both halves are set
    pub fn refresh_state(&self) -> Option<(&str, &str)> {
        match (&self.refresh_digest, &self.refresh_jti) {
            (Some(digest), Some(jti)) => Some((digest.as_str(), jti.as_str())),
            _ => None,
        }
    }
}

impl std::fmt::Debug for AccountRow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountRow")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("refresh_jti", &self.refresh_jti)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish_non_exhaustive()
    }
}
