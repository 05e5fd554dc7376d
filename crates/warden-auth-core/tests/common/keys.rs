//! RSA key fixtures
//!
//! Two independent 2048-bit key pairs, one per token class.
//! Generated with: openssl genpkey -algorithm RSA -pkeyopt rsa_keygen_bits:2048

use std::sync::Arc;
use warden_auth_core::{AuthConfig, TokenIssuer, TokenKeys};

pub const ACCESS_PRIVATE_PEM: &str = include_str!("../fixtures/access_private.pem");
pub const ACCESS_PUBLIC_PEM: &str = include_str!("../fixtures/access_public.pem");
pub const REFRESH_PRIVATE_PEM: &str = include_str!("../fixtures/refresh_private.pem");
pub const REFRESH_PUBLIC_PEM: &str = include_str!("../fixtures/refresh_public.pem");

pub fn test_keys() -> TokenKeys {
    TokenKeys::from_pem(
        ACCESS_PRIVATE_PEM.as_bytes(),
        ACCESS_PUBLIC_PEM.as_bytes(),
        REFRESH_PRIVATE_PEM.as_bytes(),
        REFRESH_PUBLIC_PEM.as_bytes(),
    )
    .expect("fixture keys parse")
}

pub fn test_issuer(config: &AuthConfig) -> Arc<TokenIssuer> {
    Arc::new(TokenIssuer::new(config, test_keys()))
}
