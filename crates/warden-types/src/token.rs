//! Token pair types

use serde::{Deserialize, Serialize};

/// Token type advertised on every pair
pub const BEARER: &str = "Bearer";

/// Access/refresh token pair returned by registration, login, and refresh.
///
/// Produced fresh on every issuance and never persisted verbatim.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    /// Access token (short-lived)
    pub access_token: String,
    /// Refresh token (long-lived, single use)
    pub refresh_token: String,
    /// Token type (always "Bearer")
    pub token_type: String,
    /// Access token lifetime in seconds
    pub expires_in: u64,
    /// Key id the access token was signed with
    pub key_id: String,
}

impl TokenPair {
    pub fn new(
        access_token: String,
        refresh_token: String,
        expires_in: u64,
        key_id: impl Into<String>,
    ) -> Self {
        Self {
            access_token,
            refresh_token,
            token_type: BEARER.to_string(),
            expires_in,
            key_id: key_id.into(),
        }
    }
}

impl std::fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenPair")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}
