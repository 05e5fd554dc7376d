//! Common test utilities for gateway integration tests

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use serde_json::Value;
use tokio::sync::mpsc;
use tower::ServiceExt;

use gateway::config::Config;
use gateway::state::AppState;
use gateway::throttle::ThrottlePolicy;
use gateway::upstream::{self, ChannelUpstream, Frame};
use warden_auth_core::{
    Argon2Hasher, AuthConfig, AuthCore, CacheConfig, Dispatcher, KeyPaths, MemoryCache,
    RatePolicy, TokenIssuer, TokenKeys,
};
use warden_db::MemoryAccountRepository;

const ACCESS_PRIVATE_PEM: &str =
    include_str!("../../../../crates/warden-auth-core/tests/fixtures/access_private.pem");
const ACCESS_PUBLIC_PEM: &str =
    include_str!("../../../../crates/warden-auth-core/tests/fixtures/access_public.pem");
const REFRESH_PRIVATE_PEM: &str =
    include_str!("../../../../crates/warden-auth-core/tests/fixtures/refresh_private.pem");
const REFRESH_PUBLIC_PEM: &str =
    include_str!("../../../../crates/warden-auth-core/tests/fixtures/refresh_public.pem");

pub fn test_keys() -> TokenKeys {
    TokenKeys::from_pem(
        ACCESS_PRIVATE_PEM.as_bytes(),
        ACCESS_PUBLIC_PEM.as_bytes(),
        REFRESH_PRIVATE_PEM.as_bytes(),
        REFRESH_PUBLIC_PEM.as_bytes(),
    )
    .expect("fixture keys parse")
}

/// Throttles loose enough that only the test under study trips one
pub fn relaxed_policy() -> ThrottlePolicy {
    ThrottlePolicy {
        ip: RatePolicy::new(10_000, 60),
        ..ThrottlePolicy::default()
    }
}

fn test_config(throttle: ThrottlePolicy, upstream_timeout: Duration) -> Config {
    Config {
        http_port: 0,
        database_url: None,
        keys: KeyPaths {
            access_private: PathBuf::from("unused"),
            access_public: PathBuf::from("unused"),
            refresh_private: PathBuf::from("unused"),
            refresh_public: PathBuf::from("unused"),
        },
        auth: AuthConfig::default(),
        cache: CacheConfig::default(),
        throttle,
        upstream_timeout,
    }
}

/// Gateway wired to a live auth core over the in-process channel
pub struct TestGateway {
    pub app: Router,
    pub issuer: Arc<TokenIssuer>,
    pub accounts: Arc<MemoryAccountRepository>,
}

impl TestGateway {
    pub fn new() -> Self {
        Self::with_policy(relaxed_policy())
    }

    pub fn with_policy(policy: ThrottlePolicy) -> Self {
        let config = test_config(policy, Duration::from_secs(5));
        let keys = test_keys();
        let verifier = warden_auth_core::TokenVerifier::new(&config.auth, keys.public.clone());
        let issuer = Arc::new(TokenIssuer::new(&config.auth, keys));
        let accounts = Arc::new(MemoryAccountRepository::new());

        let hasher = Argon2Hasher::with_params(8, 1, 1).expect("valid argon2 params");
        let core = AuthCore::new(
            config.auth.clone(),
            Arc::clone(&accounts),
            Arc::clone(&issuer),
            Arc::new(MemoryCache::default()),
        )
        .with_password_hasher(Arc::new(hasher));

        let (client, rx) = ChannelUpstream::channel(64, config.upstream_timeout);
        tokio::spawn(upstream::serve(Arc::new(Dispatcher::new(Arc::new(core))), rx));

        let cache = Arc::new(MemoryCache::new(
            CacheConfig::default().with_key_prefix("gateway:"),
        ));
        let state = AppState::new(Arc::new(client), cache, verifier, config);

        Self {
            app: gateway::router(state),
            issuer,
            accounts,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.app.clone().oneshot(request).await.expect("router is infallible")
    }

    pub async fn post_json(&self, path: &str, body: Value) -> (StatusCode, Value) {
        read_json(self.send(post_json(path, body)).await).await
    }

    pub async fn get_with_token(&self, path: &str, token: &str) -> (StatusCode, Value) {
        let request = Request::get(path)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();
        read_json(self.send(request).await).await
    }
}

/// Gateway whose upstream accepts frames and never answers
pub struct SilentGateway {
    pub app: Router,
    // Held so the channel stays open.
    _frames: Arc<tokio::sync::Mutex<Vec<Frame>>>,
}

impl SilentGateway {
    pub fn new(timeout: Duration) -> Self {
        let config = test_config(relaxed_policy(), timeout);
        let verifier =
            warden_auth_core::TokenVerifier::new(&config.auth, test_keys().public);

        let (tx, mut rx) = mpsc::channel::<Frame>(16);
        let frames = Arc::new(tokio::sync::Mutex::new(Vec::new()));
        let held = Arc::clone(&frames);
        tokio::spawn(async move {
            while let Some(frame) = rx.recv().await {
                held.lock().await.push(frame);
            }
        });

        let client = ChannelUpstream::new(tx, config.upstream_timeout);
        let state = AppState::new(
            Arc::new(client),
            Arc::new(MemoryCache::default()),
            verifier,
            config,
        );
        Self {
            app: gateway::router(state),
            _frames: frames,
        }
    }
}

pub fn post_json(path: &str, body: Value) -> Request<Body> {
    Request::post(path)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn read_json(response: Response) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, value)
}
