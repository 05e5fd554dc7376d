//! Fixed-window rate limiting over the revocation cache
//!
//! A window starts at the first counted attempt and ends when the counter's
//! TTL expires. Cache failures fail open: throttling is abuse prevention,
//! never an authorization decision.

use std::sync::Arc;
use std::time::Duration;

use crate::cache::{keys, RevocationCache};

/// Attempt budget for one subject
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatePolicy {
    pub limit: u64,
    pub window: Duration,
}

impl RatePolicy {
    pub const fn new(limit: u64, window_secs: u64) -> Self {
        Self {
            limit,
            window: Duration::from_secs(window_secs),
        }
    }
}

/// Fixed-window attempt counters
#[derive(Clone)]
pub struct RateLimiter {
    cache: Arc<dyn RevocationCache>,
}

impl RateLimiter {
    pub fn new(cache: Arc<dyn RevocationCache>) -> Self {
        Self { cache }
    }

    /// Count an attempt against `subject` if the window still has budget.
    ///
    /// Returns `false` without counting once `limit` attempts were made, so a
    /// rejected attempt never extends the window. The read and the increment
    /// are separate cache calls: callers racing on one subject can all see
    /// the same count, and a concurrent burst may overshoot `limit` by up to
    /// its own size. Sequential callers are held to `limit` exactly.
    pub async fn allow(&self, subject: &str, limit: u64, window: Duration) -> bool {
        if self.count(subject).await >= limit {
            tracing::debug!(subject, limit, "Rate limit reached");
            return false;
        }
        self.record_failure(subject, window).await;
        true
    }

    pub async fn allow_policy(&self, subject: &str, policy: RatePolicy) -> bool {
        self.allow(subject, policy.limit, policy.window).await
    }

    /// Attempts counted in the current window
    ///
    /// A read followed by a later [`record_failure`](Self::record_failure) is
    /// not atomic; callers gating on this count may let a concurrent burst
    /// through before the counter catches up.
    pub async fn count(&self, subject: &str) -> u64 {
        let key = keys::rate_limit(subject);
        match self.cache.get(&key).await {
            Ok(Some(raw)) => raw.parse().unwrap_or_else(|_| {
                tracing::warn!(subject, "Rate counter is not an integer; treating as 0");
                0
            }),
            Ok(None) => 0,
            Err(e) => {
                tracing::warn!(subject, error = %e, "Rate counter unreadable; failing open");
                0
            }
        }
    }

    /// Count an attempt without gating; refreshes the window TTL.
    pub async fn record_failure(&self, subject: &str, window: Duration) -> u64 {
        let key = keys::rate_limit(subject);
        match self.cache.increment(&key, window).await {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!(subject, error = %e, "Rate counter not incremented");
                0
            }
        }
    }

    /// Forget all attempts for `subject`
    pub async fn reset(&self, subject: &str) {
        if let Err(e) = self.cache.delete(&keys::rate_limit(subject)).await {
            tracing::warn!(subject, error = %e, "Rate counter not reset");
        }
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter").finish_non_exhaustive()
    }
}
