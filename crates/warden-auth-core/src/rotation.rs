//! Refresh-token rotation
//!
//! Exchanges a valid refresh token for a new pair exactly once. The store's
//! compare-and-swap is the only serialization point: of any number of
//! concurrent exchanges presenting the same token, at most one wins.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use warden_db::AccountRepository;
use warden_types::{AccountId, RefreshMetadata, TokenPair};

use crate::cache::{keys, SoftCache};
use crate::error::{AuthError, AuthResult, RefreshFailure};
use crate::hasher::SecretHasher;
use crate::token::TokenIssuer;

/// Shortest blacklist lifetime written for a replaced token
const MIN_BLACKLIST_TTL: Duration = Duration::from_secs(1);

/// Orchestrates validated refresh-token exchange
pub struct RotationCoordinator<R: AccountRepository> {
    accounts: Arc<R>,
    issuer: Arc<TokenIssuer>,
    token_hasher: Arc<dyn SecretHasher>,
    cache: SoftCache,
}

impl<R: AccountRepository> RotationCoordinator<R> {
    pub fn new(
        accounts: Arc<R>,
        issuer: Arc<TokenIssuer>,
        token_hasher: Arc<dyn SecretHasher>,
        cache: SoftCache,
    ) -> Self {
        Self {
            accounts,
            issuer,
            token_hasher,
            cache,
        }
    }

    /// Exchange `provided` for a new pair.
    ///
    /// The caller has already verified the token's signature and expiry and
    /// read `account_id`/`email` from it.
    pub async fn refresh(
        &self,
        account_id: AccountId,
        email: &str,
        provided: &str,
    ) -> AuthResult<TokenPair> {
        let reject = AuthError::RefreshRejected;

        let account = self.accounts.find_by_id(account_id.0).await?;
        let Some((stored_digest, stored_jti)) = account
            .as_ref()
            .and_then(|a| a.refresh_state())
            .map(|(d, j)| (d.to_string(), j.to_string()))
        else {
            tracing::debug!(account_id = %account_id, "Refresh without stored refresh state");
            return Err(reject(RefreshFailure::NoStoredToken));
        };

        // Cheap replay filter before any cache round-trip or digest work
        let claims = self.issuer.decode_unverified(provided).unwrap_or_default();
        if claims.jti.as_deref() != Some(stored_jti.as_str()) {
            tracing::warn!(account_id = %account_id, "Refresh token id does not match stored id");
            return Err(reject(RefreshFailure::Mismatch));
        }

        if self.cache.exists(&keys::blacklist(&stored_jti)).await {
            tracing::warn!(account_id = %account_id, "Blacklisted refresh token presented");
            return Err(reject(RefreshFailure::Revoked));
        }

        if !self.token_hasher.verify(provided, &stored_digest) {
            tracing::warn!(account_id = %account_id, "Refresh token digest mismatch");
            return Err(reject(RefreshFailure::Invalid));
        }

        let minted = self.issuer.mint_pair(account_id, email)?;
        let next_digest = self.token_hasher.hash(&minted.pair.refresh_token)?;

        let rotated = self
            .accounts
            .rotate_refresh_if_matches(
                account_id.0,
                &stored_digest,
                &stored_jti,
                &next_digest,
                &minted.refresh_jti,
            )
            .await?;
        if !rotated {
            tracing::warn!(account_id = %account_id, "Lost refresh rotation race");
            return Err(reject(RefreshFailure::ConcurrentRotation));
        }

        let blacklist_ttl = self.remaining_lifetime(claims.exp);
        self.cache
            .set_json(&keys::blacklist(&stored_jti), &true, blacklist_ttl)
            .await;
        self.cache
            .set_json(
                &keys::refresh(account_id),
                &RefreshMetadata::new(&minted.refresh_jti),
                self.issuer.refresh_ttl(),
            )
            .await;
        self.cache.delete(&keys::account(account_id)).await;
        if let Some(account) = &account {
            self.cache.delete(&keys::account_email(&account.email)).await;
        }

        tracing::info!(account_id = %account_id, "Refresh token rotated");
        Ok(minted.pair)
    }

    /// Time until the replaced token would have expired on its own
    fn remaining_lifetime(&self, exp: Option<i64>) -> Duration {
        blacklist_ttl(exp, Utc::now().timestamp(), self.issuer.refresh_ttl())
    }
}

/// Blacklist lifetime for a token expiring at `exp`, floored at one second;
/// the full refresh lifetime when `exp` is unknown.
pub(crate) fn blacklist_ttl(exp: Option<i64>, now: i64, fallback: Duration) -> Duration {
    match exp {
        Some(exp) => u64::try_from(exp.saturating_sub(now))
            .map(Duration::from_secs)
            .unwrap_or(MIN_BLACKLIST_TTL)
            .max(MIN_BLACKLIST_TTL),
        None => fallback,
    }
}

impl<R: AccountRepository> std::fmt::Debug for RotationCoordinator<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RotationCoordinator")
            .field("issuer", &self.issuer)
            .finish_non_exhaustive()
    }
}
