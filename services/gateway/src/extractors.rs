//! Axum extractors for authentication

use axum::extract::{FromRef, FromRequestParts};
use axum::http::header;
use axum::http::request::Parts;

use warden_auth_core::{AuthError, TokenClass};
use warden_types::AccountId;

use crate::error::ApiError;
use crate::state::AppState;

/// Caller identified by a valid Bearer access token
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub account_id: AccountId,
    pub email: String,
}

impl<S> FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    fn from_request_parts<'life0, 'life1, 'async_trait>(
        parts: &'life0 mut Parts,
        state: &'life1 S,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self, Self::Rejection>> + Send + 'async_trait>,
    >
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        Box::pin(async move {
            let app_state = AppState::from_ref(state);
            let token = extract_bearer(parts)?;

            let claims = app_state
                .verifier
                .verify(token, TokenClass::Access)
                .map_err(|e| {
                    tracing::debug!(code = e.error_code(), "Access token rejected");
                    ApiError::unauthorized(e.public_message())
                })?;

            let account_id = claims.account_id().ok_or_else(|| {
                tracing::debug!("Access token subject is not an account id");
                ApiError::unauthorized(AuthError::InvalidToken.public_message())
            })?;

            Ok(AuthUser {
                account_id,
                email: claims.email,
            })
        })
    }
}

/// Extract the token from an `Authorization: Bearer` header
fn extract_bearer(parts: &Parts) -> Result<&str, ApiError> {
    let value = parts
        .headers
        .get(header::AUTHORIZATION)
        .ok_or_else(|| ApiError::unauthorized("No authentication token provided"))?;

    let value = value
        .to_str()
        .map_err(|_| ApiError::BadRequest("Invalid Authorization header encoding".into()))?;

    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::unauthorized("No authentication token provided"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_with(auth: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/user/me");
        if let Some(value) = auth {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_extract_bearer() {
        let parts = parts_with(Some("Bearer abc.def.ghi"));
        assert_eq!(extract_bearer(&parts).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn test_missing_or_wrong_scheme() {
        assert!(matches!(
            extract_bearer(&parts_with(None)),
            Err(ApiError::Unauthorized(_))
        ));
        assert!(matches!(
            extract_bearer(&parts_with(Some("Basic dXNlcjpwdw=="))),
            Err(ApiError::Unauthorized(_))
        ));
        assert!(matches!(
            extract_bearer(&parts_with(Some("Bearer   "))),
            Err(ApiError::Unauthorized(_))
        ));
    }
}
