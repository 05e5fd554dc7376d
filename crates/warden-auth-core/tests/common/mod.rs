//! Common test utilities for warden-auth-core integration tests

pub mod failing_cache;
pub mod keys;

use std::sync::Arc;
use warden_auth_core::{
    Argon2Hasher, AuthConfig, AuthCore, MemoryCache, RevocationCache, TokenIssuer,
};
use warden_db::MemoryAccountRepository;

#[allow(unused_imports)]
pub use failing_cache::FailingCache;
#[allow(unused_imports)]
pub use keys::{test_issuer, test_keys};

pub type TestCore = AuthCore<MemoryAccountRepository>;

/// Auth core over in-memory store and cache
pub struct Harness {
    pub core: Arc<TestCore>,
    pub accounts: Arc<MemoryAccountRepository>,
    pub cache: Arc<MemoryCache>,
}

#[allow(dead_code)]
impl Harness {
    pub fn new() -> Self {
        Self::with_config(AuthConfig::default())
    }

    pub fn with_config(config: AuthConfig) -> Self {
        let cache = Arc::new(MemoryCache::default());
        let accounts = Arc::new(MemoryAccountRepository::new());
        let core = build_core(config, Arc::clone(&accounts), cache.clone());
        Self {
            core: Arc::new(core),
            accounts,
            cache,
        }
    }

    pub fn issuer(&self) -> &Arc<TokenIssuer> {
        self.core.issuer()
    }
}

/// Core over an arbitrary cache backend
#[allow(dead_code)]
pub fn build_core(
    config: AuthConfig,
    accounts: Arc<MemoryAccountRepository>,
    cache: Arc<dyn RevocationCache>,
) -> TestCore {
    let issuer = test_issuer(&config);
    AuthCore::new(config, accounts, issuer, cache).with_password_hasher(Arc::new(cheap_hasher()))
}

/// Argon2id with minimal cost so tests stay fast
pub fn cheap_hasher() -> Argon2Hasher {
    Argon2Hasher::with_params(8, 1, 1).expect("valid argon2 params")
}
