//! Cryptographic utilities for secure operations
//!
//! Primitives whose correctness matters for side channels: constant-time
//! comparison and one-way token digests.

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Constant-time byte slice comparison.
///
/// Returns `false` immediately if lengths differ (length is not secret).
#[inline]
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && bool::from(a.ct_eq(b))
}

/// Constant-time string comparison.
#[inline]
pub fn constant_time_str_eq(a: &str, b: &str) -> bool {
    constant_time_eq(a.as_bytes(), b.as_bytes())
}

/// Securely hash a token for storage.
///
/// SHA-256, hex encoded. The token cannot be recovered from the digest.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_matches_known_vector() {
        assert_eq!(
            hash_token("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_digest_is_stable_per_token() {
        let digest = hash_token("eyJhbGciOiJSUzI1NiJ9.payload.sig");
        assert_eq!(digest, hash_token("eyJhbGciOiJSUzI1NiJ9.payload.sig"));
        assert_ne!(digest, hash_token("eyJhbGciOiJSUzI1NiJ9.payload.siG"));
        assert!(digest.bytes().all(|b| b.is_ascii_hexdigit()));
    }

    #[test]
    fn test_digest_comparison() {
        let stored = hash_token("refresh-a");
        assert!(constant_time_str_eq(&stored, &hash_token("refresh-a")));
        assert!(!constant_time_str_eq(&stored, &hash_token("refresh-b")));
        assert!(!constant_time_str_eq(&stored, &stored[..63]));
    }

    #[test]
    fn test_empty_inputs() {
        assert!(constant_time_eq(b"", b""));
        assert!(!constant_time_eq(b"", b"x"));
    }
}
