//! Account handlers for authenticated callers

use std::time::Duration;

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use serde_json::json;

use warden_types::{patterns, AccountId, PublicAccount};

use crate::error::{ApiError, ApiResult};
use crate::extractors::AuthUser;
use crate::state::AppState;

/// How long a caller's account listing is served from cache
pub const ACCOUNT_LIST_TTL: Duration = Duration::from_secs(5 * 60);

fn account_list_key(caller: AccountId) -> String {
    format!("user_list:{caller}")
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub id: AccountId,
    pub email: String,
}

/// GET /user/me
pub async fn me(user: AuthUser) -> Json<MeResponse> {
    Json(MeResponse {
        id: user.account_id,
        email: user.email,
    })
}

/// GET /user/users
///
/// Cached per caller; a stale listing may be served for up to
/// [`ACCOUNT_LIST_TTL`].
pub async fn list_users(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<Vec<PublicAccount>>> {
    let key = account_list_key(user.account_id);
    if let Some(accounts) = state.cache.get_json::<Vec<PublicAccount>>(&key).await {
        return Ok(Json(accounts));
    }

    let reply = state
        .upstream
        .call(patterns::LIST_ACCOUNTS, json!({}))
        .await?;
    let accounts: Vec<PublicAccount> = serde_json::from_value(reply)
        .map_err(|e| ApiError::Internal(format!("decode reply: {e}")))?;

    state.cache.set_json(&key, &accounts, ACCOUNT_LIST_TTL).await;
    Ok(Json(accounts))
}
