//! Revocation cache
//!
//! Key-value store with per-key TTL holding sessions, refresh metadata,
//! blacklist entries, rate-limit counters, and account snapshots. The cache is
//! never the sole source of truth: every operation is fallible, and
//! [`SoftCache`] turns failures into misses so that a degraded cache cannot
//! turn a valid request into a failure.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use moka::future::Cache;
use moka::Expiry;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use uuid::Uuid;
use warden_db::AccountRow;

/// Cache errors
#[derive(Debug, Error)]
pub enum CacheError {
    /// Backend unreachable or refused the operation
    #[error("cache unavailable: {0}")]
    Unavailable(String),

    /// Stored value is not what the caller expected
    #[error("cache value corrupt: {0}")]
    Corrupt(String),
}

pub type CacheResult<T> = Result<T, CacheError>;

/// Key-value store with per-key expiry
#[async_trait]
pub trait RevocationCache: Send + Sync {
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// Store `value`, replacing any previous value and its expiry
    async fn set(&self, key: &str, value: String, ttl: Duration) -> CacheResult<()>;

    async fn delete(&self, key: &str) -> CacheResult<()>;

    async fn exists(&self, key: &str) -> CacheResult<bool>;

    /// Add one to the integer at `key` (absent counts as 0) and reset its
    /// expiry to `ttl`. Returns the new value.
    async fn increment(&self, key: &str, ttl: Duration) -> CacheResult<u64>;
}

/// Cache key layout
pub mod keys {
    use warden_types::AccountId;

    pub fn session(id: AccountId) -> String {
        format!("session:{id}")
    }

    pub fn refresh(id: AccountId) -> String {
        format!("refresh:{id}")
    }

    pub fn blacklist(jti: &str) -> String {
        format!("blacklist:refresh:{jti}")
    }

    pub fn account(id: AccountId) -> String {
        format!("account:{id}")
    }

    pub fn account_email(email: &str) -> String {
        format!("account:email:{email}")
    }

    pub fn rate_limit(subject: &str) -> String {
        format!("ratelimit:{subject}")
    }
}

/// Account snapshot used by the cache-first credential lookup.
///
/// Carries no refresh state; refresh validation always reads the store.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedAccount {
    pub id: Uuid,
    pub email: String,
    pub password_digest: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&AccountRow> for CachedAccount {
    fn from(row: &AccountRow) -> Self {
        Self {
            id: row.id,
            email: row.email.clone(),
            password_digest: row.password_digest.clone(),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl std::fmt::Debug for CachedAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedAccount")
            .field("id", &self.id)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// In-memory implementation
// ============================================================================

/// In-memory cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// TTL used by callers that do not pick one
    pub default_ttl: Duration,
    /// Maximum number of entries
    pub max_capacity: u64,
    /// Prepended to every key, e.g. `"gateway:"`
    pub key_prefix: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(30 * 60),
            max_capacity: 100_000,
            key_prefix: String::new(),
        }
    }
}

impl CacheConfig {
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn with_max_capacity(mut self, max: u64) -> Self {
        self.max_capacity = max;
        self
    }
}

#[derive(Clone)]
struct Slot {
    value: String,
    ttl: Duration,
}

/// Every write resets the entry's lifetime to its own TTL
struct PerEntryTtl;

impl Expiry<String, Slot> for PerEntryTtl {
    fn expire_after_create(&self, _key: &String, value: &Slot, _created_at: Instant) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &Slot,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// Process-local TTL cache backed by moka
#[derive(Clone)]
pub struct MemoryCache {
    inner: Cache<String, Slot>,
    config: CacheConfig,
}

impl MemoryCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(config.max_capacity)
                .expire_after(PerEntryTtl)
                .build(),
            config,
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.config.default_ttl
    }

    /// Drop every entry
    pub fn clear(&self) {
        self.inner.invalidate_all();
    }

    fn key(&self, key: &str) -> String {
        format!("{}{}", self.config.key_prefix, key)
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl std::fmt::Debug for MemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCache")
            .field("config", &self.config)
            .field("entries", &self.inner.entry_count())
            .finish()
    }
}

#[async_trait]
impl RevocationCache for MemoryCache {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        Ok(self.inner.get(&self.key(key)).await.map(|slot| slot.value))
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> CacheResult<()> {
        self.inner.insert(self.key(key), Slot { value, ttl }).await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.inner.invalidate(&self.key(key)).await;
        Ok(())
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        Ok(self.inner.get(&self.key(key)).await.is_some())
    }

    async fn increment(&self, key: &str, ttl: Duration) -> CacheResult<u64> {
        let entry = self
            .inner
            .entry(self.key(key))
            .and_upsert_with(|existing| {
                let current = existing
                    .and_then(|e| e.into_value().value.parse::<u64>().ok())
                    .unwrap_or(0);
                std::future::ready(Slot {
                    value: current.saturating_add(1).to_string(),
                    ttl,
                })
            })
            .await;

        entry
            .into_value()
            .value
            .parse::<u64>()
            .map_err(|e| CacheError::Corrupt(e.to_string()))
    }
}

// ============================================================================
// Degrading wrapper
// ============================================================================

/// Typed cache access that logs failures and treats them as misses/no-ops
#[derive(Clone)]
pub struct SoftCache {
    inner: Arc<dyn RevocationCache>,
}

impl SoftCache {
    pub fn new(inner: Arc<dyn RevocationCache>) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &Arc<dyn RevocationCache> {
        &self.inner
    }

    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.inner.get(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                tracing::debug!(key, "Cache miss");
                return None;
            }
            Err(e) => {
                tracing::warn!(key, error = %e, "Cache read failed; treating as miss");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key, error = %e, "Cache entry undecodable; treating as miss");
                None
            }
        }
    }

    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(key, error = %e, "Cache entry unencodable; skipping write");
                return;
            }
        };
        if let Err(e) = self.inner.set(key, raw, ttl).await {
            tracing::warn!(key, error = %e, "Cache write failed");
        }
    }

    pub async fn delete(&self, key: &str) {
        if let Err(e) = self.inner.delete(key).await {
            tracing::warn!(key, error = %e, "Cache delete failed");
        }
    }

    /// Existence check; an unavailable cache reports `false`
    pub async fn exists(&self, key: &str) -> bool {
        self.inner.exists(key).await.unwrap_or_else(|e| {
            tracing::warn!(key, error = %e, "Cache exists check failed; assuming absent");
            false
        })
    }
}

impl std::fmt::Debug for SoftCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoftCache").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_delete() {
        let cache = MemoryCache::default();
        cache.set("k", "v".into(), Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("v"));
        assert!(cache.exists("k").await.unwrap());

        cache.delete("k").await.unwrap();
        assert!(cache.get("k").await.unwrap().is_none());
        assert!(!cache.exists("k").await.unwrap());
    }

    #[tokio::test]
    async fn test_entries_expire() {
        let cache = MemoryCache::default();
        cache.set("short", "v".into(), Duration::from_millis(50)).await.unwrap();
        cache.set("long", "v".into(), Duration::from_secs(60)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(cache.get("short").await.unwrap().is_none());
        assert!(cache.get("long").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_increment() {
        let cache = MemoryCache::default();
        let ttl = Duration::from_secs(60);
        assert_eq!(cache.increment("n", ttl).await.unwrap(), 1);
        assert_eq!(cache.increment("n", ttl).await.unwrap(), 2);
        assert_eq!(cache.get("n").await.unwrap().as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn test_key_prefix_isolates() {
        let gateway = MemoryCache::new(CacheConfig::default().with_key_prefix("gateway:"));
        gateway.set("k", "v".into(), Duration::from_secs(60)).await.unwrap();
        assert!(gateway.exists("k").await.unwrap());
        assert!(gateway.inner.get("gateway:k").await.is_some());
        assert!(gateway.inner.get("k").await.is_none());
    }

    #[tokio::test]
    async fn test_clear() {
        let cache = MemoryCache::default();
        cache.set("a", "1".into(), Duration::from_secs(60)).await.unwrap();
        cache.clear();
        assert!(cache.get("a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_soft_cache_json() {
        let cache = SoftCache::new(Arc::new(MemoryCache::default()));
        cache.set_json("n", &vec![1, 2, 3], Duration::from_secs(60)).await;
        assert_eq!(cache.get_json::<Vec<u32>>("n").await, Some(vec![1, 2, 3]));

        // wrong shape is a miss, not an error
        assert_eq!(cache.get_json::<String>("n").await, None);
    }

    #[test]
    fn test_key_layout() {
        let id = warden_types::AccountId::new();
        assert_eq!(keys::session(id), format!("session:{id}"));
        assert_eq!(keys::refresh(id), format!("refresh:{id}"));
        assert_eq!(keys::blacklist("j"), "blacklist:refresh:j");
        assert_eq!(keys::account_email("a@b.co"), "account:email:a@b.co");
        assert_eq!(keys::rate_limit("login:a@b.co"), "ratelimit:login:a@b.co");
    }
}
