//! Gateway-side throttling: per-IP request budget, registration cooldown,
//! and failed-login lockout.
//!
//! All counters live in the gateway's cache and use the fixed-window
//! [`RateLimiter`]; nothing here is forwarded to the auth core.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use warden_auth_core::{RateLimiter, RatePolicy, RevocationCache};
use warden_types::normalize_email;

use crate::error::ApiError;
use crate::state::AppState;

/// Thresholds for every throttle the gateway applies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottlePolicy {
    /// Failed logins per email before lockout, and the lockout window
    pub login_failures: RatePolicy,
    /// Registration attempts per email per cooldown
    pub registration: RatePolicy,
    /// Requests per client IP per window
    pub ip: RatePolicy,
}

impl Default for ThrottlePolicy {
    fn default() -> Self {
        Self {
            login_failures: RatePolicy::new(5, 30 * 60),
            registration: RatePolicy::new(1, 5 * 60),
            ip: RatePolicy::new(10, 60),
        }
    }
}

/// Throttle checks backed by a shared cache
#[derive(Clone, Debug)]
pub struct Throttle {
    limiter: RateLimiter,
    policy: ThrottlePolicy,
}

impl Throttle {
    pub fn new(cache: Arc<dyn RevocationCache>, policy: ThrottlePolicy) -> Self {
        Self {
            limiter: RateLimiter::new(cache),
            policy,
        }
    }

    pub fn policy(&self) -> &ThrottlePolicy {
        &self.policy
    }

    /// Count one request against the client's IP budget
    pub async fn check_ip(&self, ip: &str) -> Result<(), ApiError> {
        if self.limiter.allow_policy(&ip_key(ip), self.policy.ip).await {
            return Ok(());
        }
        tracing::warn!(ip, "IP rate limit exceeded");
        Err(ApiError::rate_limited(
            "Too many requests. Please slow down.",
            self.policy.ip.window.as_secs(),
        ))
    }

    /// Enforce the per-email registration cooldown.
    ///
    /// The attempt is counted before the core sees it, so a failed
    /// registration still starts the cooldown.
    pub async fn check_registration(&self, email: &str) -> Result<(), ApiError> {
        let email = normalize_email(email);
        if self
            .limiter
            .allow_policy(&register_key(&email), self.policy.registration)
            .await
        {
            return Ok(());
        }
        tracing::warn!(email = %email, "Registration attempt inside cooldown");
        Err(ApiError::rate_limited(
            "Registration attempt too recent. Please wait before trying again.",
            self.policy.registration.window.as_secs(),
        ))
    }

    /// Reject without counting once the email reached its failure budget
    ///
    /// Failures are recorded only after the core answers, so logins racing
    /// past this check together can exceed the budget by the size of the
    /// burst. Sequential attempts are locked out exactly at the limit.
    pub async fn check_login_lockout(&self, email: &str) -> Result<(), ApiError> {
        let email = normalize_email(email);
        let failures = self.limiter.count(&login_key(&email)).await;
        if failures < self.policy.login_failures.limit {
            return Ok(());
        }
        tracing::warn!(email = %email, failures, "Login locked out");
        Err(ApiError::rate_limited(
            "Too many failed login attempts. Please try again later.",
            self.policy.login_failures.window.as_secs(),
        ))
    }

    pub async fn record_login_failure(&self, email: &str) -> u64 {
        let email = normalize_email(email);
        let failures = self
            .limiter
            .record_failure(&login_key(&email), self.policy.login_failures.window)
            .await;
        tracing::warn!(
            email = %email,
            failures,
            limit = self.policy.login_failures.limit,
            "Failed login attempt"
        );
        failures
    }

    pub async fn clear_login_failures(&self, email: &str) {
        self.limiter.reset(&login_key(&normalize_email(email))).await;
    }
}

fn ip_key(ip: &str) -> String {
    format!("ip:{ip}")
}

fn register_key(email: &str) -> String {
    format!("register:{email}")
}

fn login_key(email: &str) -> String {
    format!("failed-login:{email}")
}

/// Best-effort client address: first `X-Forwarded-For` hop, then
/// `X-Real-IP`, then the socket peer.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let header_ip = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    let raw = header_ip("x-forwarded-for")
        .or_else(|| header_ip("x-real-ip"))
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string());

    match raw.strip_prefix("::ffff:") {
        Some(v4) => v4.to_string(),
        None => raw,
    }
}

/// Middleware applying the per-IP budget
pub async fn ip_throttle(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let ip = client_ip(request.headers(), peer);

    match state.throttle.check_ip(&ip).await {
        Ok(()) => next.run(request).await,
        Err(err) => err.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, StatusCode};
    use warden_auth_core::MemoryCache;

    fn throttle(policy: ThrottlePolicy) -> Throttle {
        Throttle::new(Arc::new(MemoryCache::default()), policy)
    }

    #[test]
    fn test_client_ip_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.2"));
        let peer: SocketAddr = "127.0.0.1:4000".parse().unwrap();
        assert_eq!(client_ip(&headers, Some(peer)), "203.0.113.7");
    }

    #[test]
    fn test_client_ip_fallbacks() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.2"));
        assert_eq!(client_ip(&headers, None), "198.51.100.2");

        let peer: SocketAddr = "[::ffff:192.0.2.9]:4000".parse().unwrap();
        assert_eq!(client_ip(&HeaderMap::new(), Some(peer)), "192.0.2.9");

        assert_eq!(client_ip(&HeaderMap::new(), None), "unknown");
    }

    #[test]
    fn test_client_ip_strips_mapped_prefix_from_header() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("::ffff:10.1.2.3"));
        assert_eq!(client_ip(&headers, None), "10.1.2.3");
    }

    #[tokio::test]
    async fn test_ip_budget() {
        let throttle = throttle(ThrottlePolicy {
            ip: RatePolicy::new(3, 60),
            ..ThrottlePolicy::default()
        });

        for _ in 0..3 {
            throttle.check_ip("192.0.2.1").await.unwrap();
        }
        let err = throttle.check_ip("192.0.2.1").await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::TOO_MANY_REQUESTS);

        // Other addresses keep their own budget
        throttle.check_ip("192.0.2.2").await.unwrap();
    }

    #[tokio::test]
    async fn test_registration_cooldown_is_per_normalized_email() {
        let throttle = throttle(ThrottlePolicy::default());

        throttle.check_registration("alice@example.com").await.unwrap();
        let err = throttle
            .check_registration("  ALICE@example.com ")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Registration attempt too recent"));

        throttle.check_registration("bob@example.com").await.unwrap();
    }

    #[tokio::test]
    async fn test_login_lockout_after_limit() {
        let throttle = throttle(ThrottlePolicy::default());
        let email = "alice@example.com";

        for attempt in 1..=5 {
            throttle.check_login_lockout(email).await.unwrap();
            assert_eq!(throttle.record_login_failure(email).await, attempt);
        }

        let err = throttle.check_login_lockout(email).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::TOO_MANY_REQUESTS);
        // Rejected checks are not failures
        throttle.check_login_lockout(email).await.unwrap_err();
        assert_eq!(throttle.record_login_failure(email).await, 6);

        throttle.clear_login_failures(email).await;
        throttle.check_login_lockout(email).await.unwrap();
    }
}
