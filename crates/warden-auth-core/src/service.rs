//! Auth core - ties together credentials, token issuance, rotation, and
//! session state

use std::sync::Arc;
use uuid::Uuid;
use warden_db::{AccountRepository, CreateAccount};
use warden_types::{
    is_valid_email, normalize_email, AccountId, Credentials, LogoutResponse, PublicAccount,
    RefreshMetadata, SessionRecord, TokenPair, MAX_EMAIL_LEN,
};

use crate::cache::{keys, CachedAccount, RevocationCache, SoftCache};
use crate::config::AuthConfig;
use crate::error::{AuthError, AuthResult, RefreshFailure};
use crate::hasher::{Argon2Hasher, SecretHasher, Sha256TokenHasher};
use crate::rotation::{blacklist_ttl, RotationCoordinator};
use crate::token::{TokenClass, TokenIssuer};

/// Longest password accepted
pub const MAX_PASSWORD_LEN: usize = 1024;

/// Check an email/password pair and return the normalized email.
pub fn validate_credentials_input(credentials: &Credentials) -> AuthResult<String> {
    if credentials.email.trim().is_empty() {
        return Err(AuthError::bad_input("email is required"));
    }
    if credentials.password.is_empty() {
        return Err(AuthError::bad_input("password is required"));
    }
    if credentials.password.len() > MAX_PASSWORD_LEN {
        return Err(AuthError::bad_input("password is too long"));
    }
    let email = normalize_email(&credentials.email);
    if email.len() > MAX_EMAIL_LEN || !is_valid_email(&email) {
        return Err(AuthError::bad_input("email must be a valid email address"));
    }
    Ok(email)
}

/// Authentication core
///
/// Registration, login, logout, and refresh over:
/// - an authoritative account store
/// - a TTL cache for sessions, refresh metadata, and blacklist entries
/// - an RS256 token issuer
pub struct AuthCore<R: AccountRepository> {
    config: AuthConfig,
    accounts: Arc<R>,
    issuer: Arc<TokenIssuer>,
    passwords: Arc<dyn SecretHasher>,
    token_hasher: Arc<dyn SecretHasher>,
    cache: SoftCache,
    rotation: RotationCoordinator<R>,
}

impl<R: AccountRepository> AuthCore<R> {
    /// Create a new auth core with Argon2 passwords and SHA-256 refresh digests
    pub fn new(
        config: AuthConfig,
        accounts: Arc<R>,
        issuer: Arc<TokenIssuer>,
        cache: Arc<dyn RevocationCache>,
    ) -> Self {
        let cache = SoftCache::new(cache);
        let token_hasher: Arc<dyn SecretHasher> = Arc::new(Sha256TokenHasher::new());
        Self {
            rotation: RotationCoordinator::new(
                Arc::clone(&accounts),
                Arc::clone(&issuer),
                Arc::clone(&token_hasher),
                cache.clone(),
            ),
            config,
            accounts,
            issuer,
            passwords: Arc::new(Argon2Hasher::new()),
            token_hasher,
            cache,
        }
    }

    /// Replace the password hasher
    pub fn with_password_hasher(mut self, hasher: Arc<dyn SecretHasher>) -> Self {
        self.passwords = hasher;
        self
    }

    /// Hash a password on the blocking pool
    async fn hash_password(&self, password: &str) -> AuthResult<String> {
        let hasher = Arc::clone(&self.passwords);
        let password = password.to_owned();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| AuthError::Internal(format!("password hashing task failed: {e}")))?
    }

    /// Check a password against its digest on the blocking pool
    async fn verify_password(&self, password: &str, digest: &str) -> AuthResult<bool> {
        let hasher = Arc::clone(&self.passwords);
        let password = password.to_owned();
        let digest = digest.to_owned();
        tokio::task::spawn_blocking(move || hasher.verify(&password, &digest))
            .await
            .map_err(|e| AuthError::Internal(format!("password check task failed: {e}")))
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub fn issuer(&self) -> &Arc<TokenIssuer> {
        &self.issuer
    }

    // =========================================================================
    // Registration & Login
    // =========================================================================

    /// Create an account and issue its first token pair
    pub async fn register(&self, email: &str, password: &str) -> AuthResult<TokenPair> {
        let email = validate_credentials_input(&Credentials::new(email, password))?;

        if self.accounts.find_by_email(&email).await?.is_some() {
            tracing::debug!("Registration for existing email rejected");
            return Err(AuthError::EmailTaken);
        }

        let password_digest = self.hash_password(password).await?;
        let row = self
            .accounts
            .create(CreateAccount {
                id: Uuid::new_v4(),
                email,
                password_digest,
            })
            .await?;
        let account_id = AccountId(row.id);

        self.cache
            .set_json(
                &keys::account(account_id),
                &CachedAccount::from(&row),
                self.config.registered_account_ttl,
            )
            .await;

        tracing::info!(account_id = %account_id, "Account registered");
        self.issue_token_pair(account_id, &row.email).await
    }

    /// Sign a new pair and make its refresh token the only valid one
    pub async fn issue_token_pair(&self, account_id: AccountId, email: &str) -> AuthResult<TokenPair> {
        let minted = self.issuer.mint_pair(account_id, email)?;
        let digest = self.token_hasher.hash(&minted.pair.refresh_token)?;

        self.accounts
            .set_refresh_state(account_id.0, &digest, &minted.refresh_jti)
            .await?;

        self.cache
            .set_json(
                &keys::refresh(account_id),
                &RefreshMetadata::new(&minted.refresh_jti),
                self.issuer.refresh_ttl(),
            )
            .await;

        Ok(minted.pair)
    }

    /// Look up an account by email (cache first) and check its password
    pub async fn validate_credentials(
        &self,
        email: &str,
        password: &str,
    ) -> AuthResult<Option<CachedAccount>> {
        let email = normalize_email(email);
        let email_key = keys::account_email(&email);

        let account = match self.cache.get_json::<CachedAccount>(&email_key).await {
            Some(account) => account,
            None => {
                let Some(row) = self.accounts.find_by_email(&email).await? else {
                    return Ok(None);
                };
                let snapshot = CachedAccount::from(&row);
                let ttl = self.config.account_lookup_ttl;
                self.cache.set_json(&email_key, &snapshot, ttl).await;
                self.cache
                    .set_json(&keys::account(AccountId(row.id)), &snapshot, ttl)
                    .await;
                snapshot
            }
        };

        if self.verify_password(password, &account.password_digest).await? {
            Ok(Some(account))
        } else {
            Ok(None)
        }
    }

    /// Check credentials and open a session
    pub async fn login(&self, email: &str, password: &str) -> AuthResult<TokenPair> {
        let email = validate_credentials_input(&Credentials::new(email, password))?;

        let Some(account) = self.validate_credentials(&email, password).await? else {
            tracing::info!("Login rejected: invalid credentials");
            return Err(AuthError::InvalidCredentials);
        };

        self.login_account(AccountId(account.id), &account.email).await
    }

    /// Open a session for an already authenticated account
    pub async fn login_account(&self, account_id: AccountId, email: &str) -> AuthResult<TokenPair> {
        self.cache
            .set_json(
                &keys::session(account_id),
                &SessionRecord::new(account_id, email),
                self.config.session_ttl,
            )
            .await;

        let pair = self.issue_token_pair(account_id, email).await?;
        tracing::info!(account_id = %account_id, "Account logged in");
        Ok(pair)
    }

    // =========================================================================
    // Refresh & Logout
    // =========================================================================

    /// Verify a refresh token and rotate it
    pub async fn refresh_with_token(&self, refresh_token: &str) -> AuthResult<TokenPair> {
        if refresh_token.is_empty() {
            return Err(AuthError::bad_input("refreshToken is required"));
        }

        let invalid = AuthError::RefreshRejected(RefreshFailure::Invalid);
        let claims = match self.issuer.verify(refresh_token, TokenClass::Refresh) {
            Ok(claims) => claims,
            Err(_) => return Err(invalid),
        };
        let Some(account_id) = claims.account_id() else {
            return Err(invalid);
        };

        self.rotation
            .refresh(account_id, &claims.email, refresh_token)
            .await
    }

    /// End the account's session and revoke its outstanding refresh token
    pub async fn logout(&self, account_id: AccountId) -> AuthResult<LogoutResponse> {
        self.revoke_all_sessions(account_id).await?;
        tracing::info!(account_id = %account_id, "Account logged out");
        Ok(LogoutResponse { success: true })
    }

    /// Clear refresh state and session entries; blacklist every known
    /// outstanding refresh token id
    pub async fn revoke_all_sessions(&self, account_id: AccountId) -> AuthResult<()> {
        let refresh_key = keys::refresh(account_id);
        // read before the delete below
        let metadata = self.cache.get_json::<RefreshMetadata>(&refresh_key).await;
        let account = self.accounts.find_by_id(account_id.0).await?;

        self.accounts.clear_refresh_state(account_id.0).await?;

        self.cache.delete(&keys::session(account_id)).await;
        self.cache.delete(&refresh_key).await;
        self.cache.delete(&keys::account(account_id)).await;
        if let Some(account) = &account {
            self.cache.delete(&keys::account_email(&account.email)).await;
        }

        let refresh_ttl = self.issuer.refresh_ttl();
        let mut revoked: Vec<(String, std::time::Duration)> = Vec::new();
        if let Some(metadata) = metadata {
            let exp = metadata.issued_at.timestamp()
                + i64::try_from(refresh_ttl.as_secs()).unwrap_or(i64::MAX / 2);
            let ttl = blacklist_ttl(Some(exp), chrono::Utc::now().timestamp(), refresh_ttl);
            revoked.push((metadata.jti, ttl));
        }
        if let Some(jti) = account.and_then(|a| a.refresh_jti) {
            if !revoked.iter().any(|(j, _)| *j == jti) {
                revoked.push((jti, refresh_ttl));
            }
        }
        for (jti, ttl) in revoked {
            self.cache.set_json(&keys::blacklist(&jti), &true, ttl).await;
        }

        Ok(())
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Whether a session record exists for the account
    pub async fn is_active(&self, account_id: AccountId) -> bool {
        self.cache.exists(&keys::session(account_id)).await
    }

    /// All accounts as public projections, oldest first
    pub async fn list_accounts(&self) -> AuthResult<Vec<PublicAccount>> {
        let rows = self.accounts.list_all().await?;
        Ok(rows.iter().map(|row| row.to_public()).collect())
    }
}

impl<R: AccountRepository> std::fmt::Debug for AuthCore<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthCore")
            .field("config", &self.config)
            .field("issuer", &self.issuer)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_credentials_input() {
        let ok = validate_credentials_input(&Credentials::new(" Alice@Example.com", "pw123"));
        assert_eq!(ok.unwrap(), "alice@example.com");

        for (email, password) in [
            ("", "pw123"),
            ("   ", "pw123"),
            ("alice@example.com", ""),
            ("not-an-email", "pw123"),
            ("alice@example", "pw123"),
        ] {
            let err = validate_credentials_input(&Credentials::new(email, password)).unwrap_err();
            assert!(matches!(err, AuthError::BadInput(_)), "{email:?}/{password:?}");
        }

        let long = "x".repeat(MAX_PASSWORD_LEN + 1);
        assert!(validate_credentials_input(&Credentials::new("a@b.co", long)).is_err());
    }
}
