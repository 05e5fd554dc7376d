//! Operation table served to the gateway
//!
//! Maps each request pattern to an input-validation predicate and a handler.
//! Payloads and results are JSON; failures leave as [`RpcError`] envelopes.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use warden_db::AccountRepository;
use warden_types::{
    patterns, AccountId, ErrorKind, LoginRequest, LogoutRequest, RefreshRequest, RegisterRequest,
    RpcError,
};

use crate::error::{AuthError, AuthResult};
use crate::service::{validate_credentials_input, AuthCore};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
type Validator = fn(&Value) -> AuthResult<()>;
type Handler<R> = for<'a> fn(&'a AuthCore<R>, Value) -> BoxFuture<'a, AuthResult<Value>>;

struct Route<R: AccountRepository> {
    validate: Validator,
    handle: Handler<R>,
}

/// Pattern-keyed dispatch over an [`AuthCore`]
pub struct Dispatcher<R: AccountRepository> {
    core: Arc<AuthCore<R>>,
    routes: BTreeMap<&'static str, Route<R>>,
}

impl<R: AccountRepository + 'static> Dispatcher<R> {
    pub fn new(core: Arc<AuthCore<R>>) -> Self {
        let mut routes = BTreeMap::new();
        routes.insert(
            patterns::REGISTER,
            Route {
                validate: validate_credentials,
                handle: register::<R>,
            },
        );
        routes.insert(
            patterns::LOGIN,
            Route {
                validate: validate_credentials,
                handle: login::<R>,
            },
        );
        routes.insert(
            patterns::REFRESH,
            Route {
                validate: validate_refresh,
                handle: refresh::<R>,
            },
        );
        routes.insert(
            patterns::LOGOUT,
            Route {
                validate: validate_logout,
                handle: logout::<R>,
            },
        );
        routes.insert(
            patterns::LIST_ACCOUNTS,
            Route {
                validate: accept_any,
                handle: list_accounts::<R>,
            },
        );
        Self { core, routes }
    }

    /// Patterns this dispatcher serves
    pub fn patterns(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.routes.keys().copied()
    }

    pub fn core(&self) -> &Arc<AuthCore<R>> {
        &self.core
    }

    /// Validate and run the operation registered for `pattern`
    pub async fn dispatch(&self, pattern: &str, payload: Value) -> Result<Value, RpcError> {
        let Some(route) = self.routes.get(pattern) else {
            tracing::debug!(pattern, "Unknown pattern");
            return Err(RpcError::new(
                ErrorKind::BadInput,
                format!("unknown pattern: {pattern}"),
            ));
        };

        (route.validate)(&payload).map_err(RpcError::from)?;

        (route.handle)(&self.core, payload).await.map_err(|e| {
            tracing::debug!(pattern, code = e.error_code(), "Operation failed");
            RpcError::from(e)
        })
    }
}

impl<R: AccountRepository> std::fmt::Debug for Dispatcher<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("patterns", &self.routes.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

fn decode<T: DeserializeOwned>(payload: Value) -> AuthResult<T> {
    serde_json::from_value(payload).map_err(|e| AuthError::bad_input(format!("malformed payload: {e}")))
}

fn encode<T: Serialize>(value: &T) -> AuthResult<Value> {
    serde_json::to_value(value).map_err(|e| {
        tracing::error!("Failed to encode response: {}", e);
        AuthError::Internal("response encoding failed".to_string())
    })
}

// ============================================================================
// Validators
// ============================================================================

fn require_object(payload: &Value) -> AuthResult<()> {
    if payload.is_object() {
        Ok(())
    } else {
        Err(AuthError::bad_input("payload must be an object"))
    }
}

fn validate_credentials(payload: &Value) -> AuthResult<()> {
    require_object(payload)?;
    let credentials: RegisterRequest = decode(payload.clone())?;
    validate_credentials_input(&credentials).map(|_| ())
}

fn validate_refresh(payload: &Value) -> AuthResult<()> {
    require_object(payload)?;
    let request: RefreshRequest = decode(payload.clone())?;
    if request.refresh_token.is_empty() {
        return Err(AuthError::bad_input("refreshToken is required"));
    }
    Ok(())
}

fn validate_logout(payload: &Value) -> AuthResult<()> {
    require_object(payload)?;
    let request: LogoutRequest = decode(payload.clone())?;
    AccountId::parse(&request.account_id)
        .map(|_| ())
        .map_err(|_| AuthError::bad_input("accountId must be a UUID"))
}

fn accept_any(_: &Value) -> AuthResult<()> {
    Ok(())
}

// ============================================================================
// Handlers
// ============================================================================

fn register<R: AccountRepository>(core: &AuthCore<R>, payload: Value) -> BoxFuture<'_, AuthResult<Value>> {
    Box::pin(async move {
        let request: RegisterRequest = decode(payload)?;
        let pair = core.register(&request.email, &request.password).await?;
        encode(&pair)
    })
}

fn login<R: AccountRepository>(core: &AuthCore<R>, payload: Value) -> BoxFuture<'_, AuthResult<Value>> {
    Box::pin(async move {
        let request: LoginRequest = decode(payload)?;
        let pair = core.login(&request.email, &request.password).await?;
        encode(&pair)
    })
}

fn refresh<R: AccountRepository>(core: &AuthCore<R>, payload: Value) -> BoxFuture<'_, AuthResult<Value>> {
    Box::pin(async move {
        let request: RefreshRequest = decode(payload)?;
        let pair = core.refresh_with_token(&request.refresh_token).await?;
        encode(&pair)
    })
}

fn logout<R: AccountRepository>(core: &AuthCore<R>, payload: Value) -> BoxFuture<'_, AuthResult<Value>> {
    Box::pin(async move {
        let request: LogoutRequest = decode(payload)?;
        let account_id = AccountId::parse(&request.account_id)
            .map_err(|_| AuthError::bad_input("accountId must be a UUID"))?;
        let response = core.logout(account_id).await?;
        encode(&response)
    })
}

fn list_accounts<R: AccountRepository>(core: &AuthCore<R>, _payload: Value) -> BoxFuture<'_, AuthResult<Value>> {
    Box::pin(async move {
        let accounts = core.list_accounts().await?;
        encode(&accounts)
    })
}
