//! Warden gateway binary
//!
//! Runs the HTTP gateway and the auth core in one process, joined by an
//! in-process request/response channel.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::connect_info::IntoMakeServiceWithConnectInfo;
use axum::Router;
use tokio::signal;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use gateway::config::Config;
use gateway::state::AppState;
use gateway::upstream::{self, ChannelUpstream, Frame};
use warden_auth_core::{
    AuthCore, Dispatcher, MemoryCache, RevocationCache, TokenIssuer, TokenKeys, TokenVerifier,
};
use warden_db::{AccountRepository, MemoryAccountRepository, PgAccountRepository};

/// Frames buffered between gateway and core
const UPSTREAM_BUFFER: usize = 1024;

const CORE_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive("gateway=info".parse()?))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Warden gateway");

    let config = Config::from_env()?;
    tracing::info!(
        http_port = config.http_port,
        access_kid = %config.auth.access_kid,
        refresh_kid = %config.auth.refresh_kid,
        persistent = config.database_url.is_some(),
        "Configuration loaded"
    );

    let keys = TokenKeys::from_pem_files(&config.keys)?;
    let verifier = TokenVerifier::new(&config.auth, keys.public.clone());

    let (client, rx) = ChannelUpstream::channel(UPSTREAM_BUFFER, config.upstream_timeout);
    let core_task = spawn_core(&config, keys, rx).await?;

    let gateway_cache: Arc<dyn RevocationCache> = Arc::new(MemoryCache::new(
        config.cache.clone().with_key_prefix("gateway:"),
    ));
    let addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    let state = AppState::new(Arc::new(client), gateway_cache, verifier, config);

    run_http_server(gateway::router(state), addr).await?;

    // Dropping the router dropped the last sender; let in-flight frames drain.
    match tokio::time::timeout(CORE_DRAIN_TIMEOUT, core_task).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!(error = ?e, "Auth core task failed"),
        Err(_) => tracing::warn!("Auth core did not drain in time"),
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Wire the auth core to its store and start serving frames from `rx`.
async fn spawn_core(
    config: &Config,
    keys: TokenKeys,
    rx: mpsc::Receiver<Frame>,
) -> anyhow::Result<JoinHandle<()>> {
    let cache: Arc<dyn RevocationCache> = Arc::new(MemoryCache::new(
        config.cache.clone().with_key_prefix("auth:"),
    ));
    let issuer = Arc::new(TokenIssuer::new(&config.auth, keys));

    match &config.database_url {
        Some(url) => {
            let pool = warden_db::create_pool(url).await?;
            let repo = PgAccountRepository::new(pool);
            repo.migrate().await?;
            tracing::info!("Database pool created");

            let core = AuthCore::new(config.auth.clone(), Arc::new(repo), issuer, cache);
            Ok(serve_core(core, rx))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; accounts are kept in memory");
            let repo = MemoryAccountRepository::new();
            let core = AuthCore::new(config.auth.clone(), Arc::new(repo), issuer, cache);
            Ok(serve_core(core, rx))
        }
    }
}

fn serve_core<R>(core: AuthCore<R>, rx: mpsc::Receiver<Frame>) -> JoinHandle<()>
where
    R: AccountRepository + 'static,
{
    let dispatcher = Dispatcher::new(Arc::new(core));
    tracing::info!(patterns = ?dispatcher.patterns().collect::<Vec<_>>(), "Auth core ready");
    tokio::spawn(upstream::serve(Arc::new(dispatcher), rx))
}

async fn run_http_server(app: Router, addr: SocketAddr) -> anyhow::Result<()> {
    tracing::info!("HTTP server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    let service: IntoMakeServiceWithConnectInfo<Router, SocketAddr> =
        app.into_make_service_with_connect_info();

    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
