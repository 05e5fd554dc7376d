//! Health check handlers

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use std::time::{Duration, Instant};

use crate::state::AppState;

const READINESS_KEY: &str = "health:ready";

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub checks: ReadyChecks,
}

#[derive(Debug, Serialize)]
pub struct ReadyChecks {
    pub cache: CheckResult,
}

#[derive(Debug, Serialize)]
pub struct CheckResult {
    pub status: &'static str,
    pub latency_ms: u64,
}

/// GET /health - Liveness check (fast, no dependencies)
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "gateway",
    })
}

/// GET /ready - Readiness check (cache write/read round trip)
pub async fn ready(State(state): State<AppState>) -> Result<Json<ReadyResponse>, StatusCode> {
    let start = Instant::now();
    let cache = state.cache.inner();

    let stamp = chrono::Utc::now().timestamp_millis().to_string();
    let round_trip = match cache.set(READINESS_KEY, stamp.clone(), Duration::from_secs(10)).await {
        Ok(()) => cache.get(READINESS_KEY).await,
        Err(e) => Err(e),
    };
    let latency_ms = start.elapsed().as_millis() as u64;

    match round_trip {
        Ok(Some(value)) if value == stamp => Ok(Json(ReadyResponse {
            status: "ready",
            service: "gateway",
            checks: ReadyChecks {
                cache: CheckResult {
                    status: "ok",
                    latency_ms,
                },
            },
        })),
        other => {
            tracing::warn!(result = ?other, "Cache readiness check failed");
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}
