//! Configuration types for the auth core

use std::time::Duration;

/// Default access token key id
pub const DEFAULT_ACCESS_KID: &str = "access-v1";
/// Default refresh token key id
pub const DEFAULT_REFRESH_KID: &str = "refresh-v1";

/// Auth core configuration
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Key id embedded in access token headers
    pub access_kid: String,
    /// Key id embedded in refresh token headers
    pub refresh_kid: String,
    /// Access token lifetime
    pub access_ttl: Duration,
    /// Refresh token lifetime
    pub refresh_ttl: Duration,
    /// Session record lifetime
    pub session_ttl: Duration,
    /// Account snapshot lifetime after registration
    pub registered_account_ttl: Duration,
    /// Account snapshot lifetime after a credential lookup
    pub account_lookup_ttl: Duration,
}

impl AuthConfig {
    /// Create a new auth config
    pub fn new(access_kid: impl Into<String>, refresh_kid: impl Into<String>) -> Self {
        Self {
            access_kid: access_kid.into(),
            refresh_kid: refresh_kid.into(),
            access_ttl: Duration::from_secs(15 * 60),
            refresh_ttl: Duration::from_secs(7 * 24 * 60 * 60),
            session_ttl: Duration::from_secs(60 * 60),
            registered_account_ttl: Duration::from_secs(60 * 60),
            account_lookup_ttl: Duration::from_secs(30 * 60),
        }
    }

    /// Set access token lifetime
    pub fn with_access_ttl(mut self, ttl: Duration) -> Self {
        self.access_ttl = ttl;
        self
    }

    /// Set refresh token lifetime
    pub fn with_refresh_ttl(mut self, ttl: Duration) -> Self {
        self.refresh_ttl = ttl;
        self
    }

    /// Set session record lifetime
    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self::new(DEFAULT_ACCESS_KID, DEFAULT_REFRESH_KID)
    }
}
