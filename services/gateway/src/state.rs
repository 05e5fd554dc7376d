//! Application state

use std::sync::Arc;

use warden_auth_core::{RevocationCache, SoftCache, TokenVerifier};

use crate::config::Config;
use crate::throttle::Throttle;
use crate::upstream::Upstream;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Channel to the auth core
    pub upstream: Arc<dyn Upstream>,
    /// IP, registration and login throttles
    pub throttle: Throttle,
    /// Gateway-local cache (response caching)
    pub cache: SoftCache,
    /// Access/refresh verification with public keys only
    pub verifier: Arc<TokenVerifier>,
    /// Application configuration
    pub config: Arc<Config>,
}

impl AppState {
    /// Create new application state.
    ///
    /// `cache` backs both throttle counters and cached responses.
    pub fn new(
        upstream: Arc<dyn Upstream>,
        cache: Arc<dyn RevocationCache>,
        verifier: TokenVerifier,
        config: Config,
    ) -> Self {
        Self {
            upstream,
            throttle: Throttle::new(Arc::clone(&cache), config.throttle),
            cache: SoftCache::new(cache),
            verifier: Arc::new(verifier),
            config: Arc::new(config),
        }
    }
}
