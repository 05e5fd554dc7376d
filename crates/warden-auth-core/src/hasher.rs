//! One-way digests for secrets at rest
//!
//! Passwords go through Argon2id with a random salt. Refresh tokens are
//! already high-entropy signed blobs, so a SHA-256 digest compared in
//! constant time is enough and keeps refresh cheap.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};

use crate::crypto::{constant_time_str_eq, hash_token};
use crate::error::{AuthError, AuthResult};

/// Opaque `hash`/`compare` capability
pub trait SecretHasher: Send + Sync {
    /// Produce a digest suitable for storage
    fn hash(&self, plaintext: &str) -> AuthResult<String>;

    /// Whether `plaintext` produced `digest`. Malformed digests never match.
    fn verify(&self, plaintext: &str, digest: &str) -> bool;
}

/// Argon2id password hasher (PHC string output)
///
/// Verification reads the cost parameters from the stored digest, so
/// digests produced under older parameters keep verifying.
#[derive(Clone, Default)]
pub struct Argon2Hasher {
    argon: Argon2<'static>,
}

impl Argon2Hasher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Custom cost parameters (memory in KiB, iterations, lanes)
    pub fn with_params(m_cost: u32, t_cost: u32, p_cost: u32) -> AuthResult<Self> {
        let params = Params::new(m_cost, t_cost, p_cost, None)
            .map_err(|e| AuthError::Configuration(format!("argon2 params: {e}")))?;
        Ok(Self {
            argon: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }
}

impl std::fmt::Debug for Argon2Hasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Argon2Hasher").finish_non_exhaustive()
    }
}

impl SecretHasher for Argon2Hasher {
    fn hash(&self, plaintext: &str) -> AuthResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon
            .hash_password(plaintext.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| {
                tracing::error!(error = %e, "Password hashing failed");
                AuthError::Internal("password hashing failed".to_string())
            })
    }

    fn verify(&self, plaintext: &str, digest: &str) -> bool {
        match PasswordHash::new(digest) {
            Ok(parsed) => self
                .argon
                .verify_password(plaintext.as_bytes(), &parsed)
                .is_ok(),
            Err(e) => {
                tracing::warn!(error = %e, "Stored password digest is malformed");
                false
            }
        }
    }
}

/// SHA-256 token hasher with constant-time comparison
#[derive(Debug, Default, Clone)]
pub struct Sha256TokenHasher;

impl Sha256TokenHasher {
    pub fn new() -> Self {
        Self
    }
}

impl SecretHasher for Sha256TokenHasher {
    fn hash(&self, plaintext: &str) -> AuthResult<String> {
        Ok(hash_token(plaintext))
    }

    fn verify(&self, plaintext: &str, digest: &str) -> bool {
        constant_time_str_eq(&hash_token(plaintext), digest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argon2_roundtrip() {
        let hasher = Argon2Hasher::new();
        let digest = hasher.hash("pw123").unwrap();
        assert!(digest.starts_with("$argon2"));
        assert!(hasher.verify("pw123", &digest));
        assert!(!hasher.verify("pw124", &digest));
    }

    #[test]
    fn test_argon2_salted() {
        let hasher = Argon2Hasher::new();
        let a = hasher.hash("same").unwrap();
        let b = hasher.hash("same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_argon2_custom_params() {
        let cheap = Argon2Hasher::with_params(8, 1, 1).unwrap();
        let digest = cheap.hash("pw123").unwrap();
        assert!(digest.contains("m=8,t=1,p=1"));
        // default-cost hasher still verifies it
        assert!(Argon2Hasher::new().verify("pw123", &digest));

        assert!(Argon2Hasher::with_params(0, 0, 0).is_err());
    }

    #[test]
    fn test_argon2_malformed_digest() {
        assert!(!Argon2Hasher::new().verify("pw", "not-a-phc-string"));
    }

    #[test]
    fn test_sha256_token_hasher() {
        let hasher = Sha256TokenHasher::new();
        let digest = hasher.hash("a.b.c").unwrap();
        assert!(hasher.verify("a.b.c", &digest));
        assert!(!hasher.verify("a.b.d", &digest));
        assert!(!hasher.verify("a.b.c", ""));
    }
}
