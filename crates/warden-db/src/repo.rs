//! Repository traits
//!
//! Define async repository interfaces for database operations.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::DbResult;
use crate::models::AccountRow;

/// Account repository trait
///
/// Authoritative for refresh-token validity. The refresh digest and jti are
/// only ever written together.
#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Find an account by ID
    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<AccountRow>>;

    /// Find an account by normalized email
    async fn find_by_email(&self, email: &str) -> DbResult<Option<AccountRow>>;

    /// Create a new account; `DbError::Conflict` if the email is taken
    async fn create(&self, account: CreateAccount) -> DbResult<AccountRow>;

    /// Unconditionally replace the refresh pair
    async fn set_refresh_state(&self, id: Uuid, digest: &str, jti: &str) -> DbResult<()>;

    /// Unconditionally clear the refresh pair
    async fn clear_refresh_state(&self, id: Uuid) -> DbResult<()>;

    /// Replace the refresh pair only if the stored pair equals the expected
    /// one. Returns whether the replacement happened.
    ///
    /// At most one caller can succeed for a given expected pair.
    async fn rotate_refresh_if_matches(
        &self,
        id: Uuid,
        expected_digest: &str,
        expected_jti: &str,
        next_digest: &str,
        next_jti: &str,
    ) -> DbResult<bool>;

    /// All accounts ordered by creation time, then id
    async fn list_all(&self) -> DbResult<Vec<AccountRow>>;
}

/// Create account input
#[derive(Clone)]
pub struct CreateAccount {
    pub id: Uuid,
    pub email: String,
    pub password_digest: String,
}

impl std::fmt::Debug for CreateAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreateAccount")
            .field("id", &self.id)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}
