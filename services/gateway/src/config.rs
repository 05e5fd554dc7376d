//! Configuration for the gateway service.

use std::path::PathBuf;
use std::time::Duration;

use warden_auth_core::{AuthConfig, CacheConfig, KeyPaths, RatePolicy};

use crate::throttle::ThrottlePolicy;

/// Gateway configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port
    pub http_port: u16,

    /// Postgres URL; accounts are kept in memory when unset
    pub database_url: Option<String>,

    /// PEM locations for both token classes
    pub keys: KeyPaths,

    /// Auth core configuration
    pub auth: AuthConfig,

    /// Cache sizing and default TTL
    pub cache: CacheConfig,

    /// Throttling thresholds
    pub throttle: ThrottlePolicy,

    /// Deadline for one upstream call
    pub upstream_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(&lookup);

        let http_port = vars.parse_or("HTTP_PORT", 8080)?;
        let database_url = vars.get("DATABASE_URL");

        let keys = KeyPaths {
            access_private: vars.path("JWT_ACCESS_PRIVATE_KEY_PATH")?,
            access_public: vars.path("JWT_ACCESS_PUBLIC_KEY_PATH")?,
            refresh_private: vars.path("JWT_REFRESH_PRIVATE_KEY_PATH")?,
            refresh_public: vars.path("JWT_REFRESH_PUBLIC_KEY_PATH")?,
        };

        let defaults = AuthConfig::default();
        let access_kid = vars.get("JWT_ACCESS_KID").unwrap_or(defaults.access_kid);
        let refresh_kid = vars.get("JWT_REFRESH_KID").unwrap_or(defaults.refresh_kid);
        if access_kid == refresh_kid {
            return Err(ConfigError::Invalid("JWT_REFRESH_KID"));
        }

        let access_ttl = vars.secs_or("ACCESS_TOKEN_TTL_SECS", defaults.access_ttl)?;
        let refresh_ttl = vars.secs_or("REFRESH_TOKEN_TTL_SECS", defaults.refresh_ttl)?;
        let auth = AuthConfig::new(access_kid, refresh_kid)
            .with_access_ttl(access_ttl)
            .with_refresh_ttl(refresh_ttl);

        let cache_defaults = CacheConfig::default();
        let cache = CacheConfig::default()
            .with_default_ttl(vars.secs_or("CACHE_DEFAULT_TTL_SECS", cache_defaults.default_ttl)?)
            .with_max_capacity(vars.parse_or("CACHE_MAX_CAPACITY", cache_defaults.max_capacity)?);

        let policy = ThrottlePolicy::default();
        let throttle = ThrottlePolicy {
            login_failures: RatePolicy {
                limit: vars.parse_or("LOGIN_MAX_FAILURES", policy.login_failures.limit)?,
                window: vars.secs_or("LOGIN_LOCKOUT_SECS", policy.login_failures.window)?,
            },
            registration: RatePolicy {
                limit: policy.registration.limit,
                window: vars.secs_or("REGISTER_COOLDOWN_SECS", policy.registration.window)?,
            },
            ip: RatePolicy {
                limit: vars.parse_or("IP_RATE_LIMIT", policy.ip.limit)?,
                window: vars.secs_or("IP_RATE_WINDOW_SECS", policy.ip.window)?,
            },
        };

        let upstream_timeout = vars.secs_or("UPSTREAM_TIMEOUT_SECS", Duration::from_secs(10))?;

        Ok(Self {
            http_port,
            database_url,
            keys,
            auth,
            cache,
            throttle,
            upstream_timeout,
        })
    }
}

struct Vars<'a, F>(&'a F);

impl<F> Vars<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, name: &str) -> Option<String> {
        (self.0)(name).filter(|v| !v.trim().is_empty())
    }

    fn path(&self, name: &'static str) -> Result<PathBuf, ConfigError> {
        self.get(name)
            .map(PathBuf::from)
            .ok_or(ConfigError::Missing(name))
    }

    fn parse_or<T: std::str::FromStr>(&self, name: &'static str, default: T) -> Result<T, ConfigError> {
        match self.get(name) {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(name)),
            None => Ok(default),
        }
    }

    // Zero-second windows and TTLs are rejected.
    fn secs_or(&self, name: &'static str, default: Duration) -> Result<Duration, ConfigError> {
        match self.parse_or::<u64>(name, default.as_secs())? {
            0 => Err(ConfigError::Invalid(name)),
            secs => Ok(Duration::from_secs(secs)),
        }
    }
}

/// Configuration error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Signing key error: {0}")]
    Keys(#[from] warden_auth_core::TokenKeyError),
}
