//! Warden gateway
//!
//! Public HTTP façade for the auth core. Requests are throttled here and
//! forwarded over an [`upstream::Upstream`] channel.
//!
//! ## Endpoints
//!
//! - `POST /auth/register` - Create an account and receive a token pair
//! - `POST /auth/login` - Exchange credentials for a token pair
//! - `POST /auth/refresh` - Rotate a refresh token
//! - `POST /auth/logout` - Revoke every session of an account
//! - `GET /user/me` - Caller identity from the access token
//! - `GET /user/users` - Account listing (cached per caller)
//! - `GET /health` - Liveness check
//! - `GET /ready` - Readiness check

pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod state;
pub mod throttle;
pub mod upstream;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::state::AppState;

/// Build the HTTP router.
///
/// The per-IP budget applies to `/auth/*` and `/user/*` only.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/auth/register", post(handlers::register))
        .route("/auth/login", post(handlers::login))
        .route("/auth/refresh", post(handlers::refresh))
        .route("/auth/logout", post(handlers::logout))
        .route("/user/me", get(handlers::me))
        .route("/user/users", get(handlers::list_users))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            throttle::ip_throttle,
        ));

    let health_routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/ready", get(handlers::ready));

    let middleware = ServiceBuilder::new()
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        );

    Router::new()
        .merge(api)
        .merge(health_routes)
        .layer(middleware)
        .with_state(state)
}
