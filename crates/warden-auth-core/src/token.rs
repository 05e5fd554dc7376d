//! RS256 token signing and verification
//!
//! Each token class has its own key pair and key id. The key id is carried in
//! the JWT header and must match the class being verified; there is no
//! fallback to another key.

use chrono::Utc;
use jsonwebtoken::{
    decode, decode_header, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use subtle::ConstantTimeEq;
use thiserror::Error;
use uuid::Uuid;
use warden_types::{AccountId, TokenPair};

use crate::config::AuthConfig;
use crate::error::{AuthError, AuthResult};

/// Token class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenClass {
    Access,
    Refresh,
}

impl std::fmt::Display for TokenClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Access => write!(f, "access"),
            Self::Refresh => write!(f, "refresh"),
        }
    }
}

/// Claims carried by both token classes. Only refresh tokens have a `jti`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject (account ID)
    pub sub: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
    /// Issued at timestamp
    pub iat: i64,
    /// Expiration timestamp
    pub exp: i64,
}

impl TokenClaims {
    pub fn account_id(&self) -> Option<AccountId> {
        AccountId::parse(&self.sub).ok()
    }
}

/// Claims read without any verification. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UnverifiedClaims {
    pub sub: Option<String>,
    pub jti: Option<String>,
    pub exp: Option<i64>,
}

/// Errors loading key material
#[derive(Debug, Error)]
pub enum TokenKeyError {
    #[error("failed to read key file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid {class} {role} key: {source}")]
    Parse {
        class: TokenClass,
        role: &'static str,
        #[source]
        source: jsonwebtoken::errors::Error,
    },
}

impl From<TokenKeyError> for AuthError {
    fn from(err: TokenKeyError) -> Self {
        Self::Configuration(err.to_string())
    }
}

fn read_pem(path: &Path) -> Result<Vec<u8>, TokenKeyError> {
    std::fs::read(path).map_err(|source| TokenKeyError::Io {
        path: path.display().to_string(),
        source,
    })
}

fn parse_private(class: TokenClass, pem: &[u8]) -> Result<EncodingKey, TokenKeyError> {
    EncodingKey::from_rsa_pem(pem).map_err(|source| TokenKeyError::Parse {
        class,
        role: "private",
        source,
    })
}

fn parse_public(class: TokenClass, pem: &[u8]) -> Result<DecodingKey, TokenKeyError> {
    DecodingKey::from_rsa_pem(pem).map_err(|source| TokenKeyError::Parse {
        class,
        role: "public",
        source,
    })
}

/// Public verification keys for both classes
#[derive(Clone)]
pub struct PublicKeys {
    pub access: DecodingKey,
    pub refresh: DecodingKey,
}

impl PublicKeys {
    pub fn from_pem(access_pem: &[u8], refresh_pem: &[u8]) -> Result<Self, TokenKeyError> {
        Ok(Self {
            access: parse_public(TokenClass::Access, access_pem)?,
            refresh: parse_public(TokenClass::Refresh, refresh_pem)?,
        })
    }

    pub fn from_pem_files(
        access_path: impl AsRef<Path>,
        refresh_path: impl AsRef<Path>,
    ) -> Result<Self, TokenKeyError> {
        Self::from_pem(
            &read_pem(access_path.as_ref())?,
            &read_pem(refresh_path.as_ref())?,
        )
    }
}

impl std::fmt::Debug for PublicKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublicKeys").finish_non_exhaustive()
    }
}

/// Signing and verification keys for both classes
#[derive(Clone)]
pub struct TokenKeys {
    pub access_private: EncodingKey,
    pub refresh_private: EncodingKey,
    pub public: PublicKeys,
}

impl TokenKeys {
    pub fn from_pem(
        access_private_pem: &[u8],
        access_public_pem: &[u8],
        refresh_private_pem: &[u8],
        refresh_public_pem: &[u8],
    ) -> Result<Self, TokenKeyError> {
        Ok(Self {
            access_private: parse_private(TokenClass::Access, access_private_pem)?,
            refresh_private: parse_private(TokenClass::Refresh, refresh_private_pem)?,
            public: PublicKeys::from_pem(access_public_pem, refresh_public_pem)?,
        })
    }

    pub fn from_pem_files(paths: &KeyPaths) -> Result<Self, TokenKeyError> {
        Self::from_pem(
            &read_pem(&paths.access_private)?,
            &read_pem(&paths.access_public)?,
            &read_pem(&paths.refresh_private)?,
            &read_pem(&paths.refresh_public)?,
        )
    }
}

impl std::fmt::Debug for TokenKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenKeys").finish_non_exhaustive()
    }
}

/// Locations of the four PEM files
#[derive(Debug, Clone)]
pub struct KeyPaths {
    pub access_private: std::path::PathBuf,
    pub access_public: std::path::PathBuf,
    pub refresh_private: std::path::PathBuf,
    pub refresh_public: std::path::PathBuf,
}

#[derive(Clone)]
struct ClassKey {
    kid: String,
    key: DecodingKey,
}

/// Verifies tokens of either class with public keys only.
///
/// Used by the auth core and by the gateway, which never holds signing keys.
#[derive(Clone)]
pub struct TokenVerifier {
    access: ClassKey,
    refresh: ClassKey,
}

impl TokenVerifier {
    pub fn new(config: &AuthConfig, keys: PublicKeys) -> Self {
        Self {
            access: ClassKey {
                kid: config.access_kid.clone(),
                key: keys.access,
            },
            refresh: ClassKey {
                kid: config.refresh_kid.clone(),
                key: keys.refresh,
            },
        }
    }

    fn class_key(&self, class: TokenClass) -> &ClassKey {
        match class {
            TokenClass::Access => &self.access,
            TokenClass::Refresh => &self.refresh,
        }
    }

    /// Verify signature, key id, and expiry for the given class
    pub fn verify(&self, token: &str, class: TokenClass) -> AuthResult<TokenClaims> {
        let header = decode_header(token).map_err(|e| {
            tracing::debug!("Failed to decode token header: {}", e);
            AuthError::InvalidToken
        })?;

        let kid = header.kid.ok_or_else(|| {
            tracing::debug!("Token missing kid");
            AuthError::InvalidToken
        })?;

        let expected = self.class_key(class);
        if !bool::from(kid.as_bytes().ct_eq(expected.kid.as_bytes())) {
            tracing::debug!(%class, "Unknown key ID '{}'", kid);
            return Err(AuthError::InvalidToken);
        }

        let mut validation = Validation::new(Algorithm::RS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let claims = decode::<TokenClaims>(token, &expected.key, &validation)
            .map_err(|e| {
                tracing::debug!(%class, "Token validation failed: {}", e);
                match e.kind() {
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                    _ => AuthError::InvalidToken,
                }
            })?
            .claims;

        if class == TokenClass::Refresh && claims.jti.is_none() {
            tracing::debug!("Refresh token without jti");
            return Err(AuthError::InvalidToken);
        }

        Ok(claims)
    }

    /// Read claims without checking signature or expiry.
    ///
    /// Only for cheap pre-filtering; never an authorization decision.
    pub fn decode_unverified(token: &str) -> AuthResult<UnverifiedClaims> {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        decode::<UnverifiedClaims>(token, &DecodingKey::from_secret(&[]), &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!("Failed to decode token payload: {}", e);
                AuthError::InvalidToken
            })
    }
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("access_kid", &self.access.kid)
            .field("refresh_kid", &self.refresh.kid)
            .finish_non_exhaustive()
    }
}

/// Newly signed pair plus the refresh token's id
#[derive(Debug, Clone)]
pub struct MintedPair {
    pub pair: TokenPair,
    pub refresh_jti: String,
}

/// Signs access and refresh tokens
#[derive(Clone)]
pub struct TokenIssuer {
    access_key: EncodingKey,
    refresh_key: EncodingKey,
    verifier: TokenVerifier,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenIssuer {
    pub fn new(config: &AuthConfig, keys: TokenKeys) -> Self {
        Self {
            access_key: keys.access_private,
            refresh_key: keys.refresh_private,
            verifier: TokenVerifier::new(config, keys.public),
            access_ttl: config.access_ttl,
            refresh_ttl: config.refresh_ttl,
        }
    }

    fn sign(&self, class: TokenClass, claims: &TokenClaims) -> AuthResult<String> {
        let (key, kid) = match class {
            TokenClass::Access => (&self.access_key, &self.verifier.access.kid),
            TokenClass::Refresh => (&self.refresh_key, &self.verifier.refresh.kid),
        };
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(kid.clone());

        encode(&header, claims, key).map_err(|e| {
            tracing::error!(%class, "Token signing failed: {}", e);
            AuthError::Internal("token signing failed".to_string())
        })
    }

    fn claims(account_id: AccountId, email: &str, jti: Option<String>, ttl: Duration) -> TokenClaims {
        let now = Utc::now().timestamp();
        TokenClaims {
            sub: account_id.to_string(),
            email: email.to_string(),
            jti,
            iat: now,
            exp: now + i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX / 2),
        }
    }

    /// Sign an access token
    pub fn sign_access(&self, account_id: AccountId, email: &str) -> AuthResult<String> {
        let claims = Self::claims(account_id, email, None, self.access_ttl);
        self.sign(TokenClass::Access, &claims)
    }

    /// Sign a refresh token with a fresh random jti. Returns `(token, jti)`.
    pub fn sign_refresh(&self, account_id: AccountId, email: &str) -> AuthResult<(String, String)> {
        let jti = Uuid::new_v4().to_string();
        let claims = Self::claims(account_id, email, Some(jti.clone()), self.refresh_ttl);
        let token = self.sign(TokenClass::Refresh, &claims)?;
        Ok((token, jti))
    }

    /// Sign a fresh access/refresh pair
    pub fn mint_pair(&self, account_id: AccountId, email: &str) -> AuthResult<MintedPair> {
        let access = self.sign_access(account_id, email)?;
        let (refresh, refresh_jti) = self.sign_refresh(account_id, email)?;
        Ok(MintedPair {
            pair: TokenPair::new(access, refresh, self.access_ttl.as_secs(), self.access_kid()),
            refresh_jti,
        })
    }

    pub fn verify(&self, token: &str, class: TokenClass) -> AuthResult<TokenClaims> {
        self.verifier.verify(token, class)
    }

    pub fn decode_unverified(&self, token: &str) -> AuthResult<UnverifiedClaims> {
        TokenVerifier::decode_unverified(token)
    }

    pub fn verifier(&self) -> &TokenVerifier {
        &self.verifier
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    pub fn access_kid(&self) -> &str {
        &self.verifier.access.kid
    }
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("verifier", &self.verifier)
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}
