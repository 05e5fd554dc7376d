//! Cache backend that is always down

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use warden_auth_core::{CacheError, CacheResult, RevocationCache};

#[derive(Default)]
pub struct FailingCache {
    calls: AtomicU64,
}

#[allow(dead_code)]
impl FailingCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of operations attempted against the cache
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    fn fail<T>(&self) -> CacheResult<T> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Err(CacheError::Unavailable("connection refused".to_string()))
    }
}

#[async_trait]
impl RevocationCache for FailingCache {
    async fn get(&self, _key: &str) -> CacheResult<Option<String>> {
        self.fail()
    }

    async fn set(&self, _key: &str, _value: String, _ttl: Duration) -> CacheResult<()> {
        self.fail()
    }

    async fn delete(&self, _key: &str) -> CacheResult<()> {
        self.fail()
    }

    async fn exists(&self, _key: &str) -> CacheResult<bool> {
        self.fail()
    }

    async fn increment(&self, _key: &str, _ttl: Duration) -> CacheResult<u64> {
        self.fail()
    }
}
