//! Authentication handlers (register, login, refresh, logout)

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use warden_auth_core::TokenClass;
use warden_types::{
    is_valid_email, normalize_email, patterns, Credentials, ErrorKind, LogoutRequest,
    LogoutResponse, RefreshRequest, TokenPair,
};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

type Created<T> = (StatusCode, Json<T>);

// ============================================================================
// Helpers
// ============================================================================

fn encode<T: Serialize>(body: &T) -> ApiResult<Value> {
    serde_json::to_value(body).map_err(|e| ApiError::Internal(format!("encode request: {e}")))
}

fn decode<T: DeserializeOwned>(value: Value) -> ApiResult<T> {
    serde_json::from_value(value).map_err(|e| ApiError::Internal(format!("decode reply: {e}")))
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /auth/register
///
/// One attempt per email per cooldown window, counted before forwarding.
pub async fn register(
    State(state): State<AppState>,
    body: Result<Json<Credentials>, JsonRejection>,
) -> ApiResult<Created<TokenPair>> {
    let Json(credentials) = body?;

    // Malformed emails go straight to the core for a 400.
    if is_valid_email(&normalize_email(&credentials.email)) {
        state.throttle.check_registration(&credentials.email).await?;
    }

    let reply = state
        .upstream
        .call(patterns::REGISTER, encode(&credentials)?)
        .await?;

    tracing::info!(email = %normalize_email(&credentials.email), "Registration completed");
    Ok((StatusCode::CREATED, Json(decode(reply)?)))
}

/// POST /auth/login
///
/// Locked out emails are rejected here. Only credential rejections count
/// toward the lockout.
pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<Credentials>, JsonRejection>,
) -> ApiResult<Created<TokenPair>> {
    let Json(credentials) = body?;
    state.throttle.check_login_lockout(&credentials.email).await?;

    match state
        .upstream
        .call(patterns::LOGIN, encode(&credentials)?)
        .await
    {
        Ok(reply) => {
            let pair: TokenPair = decode(reply)?;
            state.throttle.clear_login_failures(&credentials.email).await;
            Ok((StatusCode::CREATED, Json(pair)))
        }
        Err(err) => {
            if err.kind() == ErrorKind::Unauthorized {
                state.throttle.record_login_failure(&credentials.email).await;
            }
            Err(err.into())
        }
    }
}

/// POST /auth/refresh
///
/// The refresh token must verify against the refresh public key before the
/// core is asked to rotate it.
pub async fn refresh(
    State(state): State<AppState>,
    body: Result<Json<RefreshRequest>, JsonRejection>,
) -> ApiResult<Created<TokenPair>> {
    let Json(request) = body?;

    state
        .verifier
        .verify(&request.refresh_token, TokenClass::Refresh)
        .map_err(|e| {
            tracing::debug!(code = e.error_code(), "Refresh token rejected at gateway");
            ApiError::unauthorized("Invalid refresh token")
        })?;

    let reply = state
        .upstream
        .call(patterns::REFRESH, encode(&request)?)
        .await
        .map_err(|err| {
            tracing::warn!(code = err.status_code, "Failed refresh token attempt");
            ApiError::from(err)
        })?;

    Ok((StatusCode::CREATED, Json(decode(reply)?)))
}

/// POST /auth/logout
pub async fn logout(
    State(state): State<AppState>,
    body: Result<Json<LogoutRequest>, JsonRejection>,
) -> ApiResult<Created<LogoutResponse>> {
    let Json(request) = body?;

    let reply = state
        .upstream
        .call(patterns::LOGOUT, encode(&request)?)
        .await?;

    Ok((StatusCode::CREATED, Json(decode(reply)?)))
}
