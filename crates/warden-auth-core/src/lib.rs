//! Warden Auth Core - Token lifecycle business logic
//!
//! Credential verification, RS256 token issuance, single-use refresh-token
//! rotation with replay detection, revocation, and the cache-backed session
//! and rate-limit state that coordinates it.

pub mod cache;
pub mod config;
pub mod crypto;
pub mod dispatch;
pub mod error;
pub mod hasher;
pub mod rate_limit;
pub mod rotation;
pub mod service;
pub mod token;

pub use cache::{CacheConfig, CacheError, CacheResult, CachedAccount, MemoryCache, RevocationCache, SoftCache};
pub use config::AuthConfig;
pub use dispatch::Dispatcher;
pub use error::{AuthError, AuthResult, RefreshFailure};
pub use hasher::{Argon2Hasher, SecretHasher, Sha256TokenHasher};
pub use rate_limit::{RateLimiter, RatePolicy};
pub use rotation::RotationCoordinator;
pub use service::*;
pub use token::{
    KeyPaths, MintedPair, PublicKeys, TokenClaims, TokenClass, TokenIssuer, TokenKeyError,
    TokenKeys, TokenVerifier, UnverifiedClaims,
};
