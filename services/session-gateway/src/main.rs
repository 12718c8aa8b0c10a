//! GitHub Project Status Viewer session gateway
//!
//! Single-binary service that:
//! 1. Issues OAuth states and authorization URLs for the browser extension
//! 2. Exchanges the OAuth callback code for a GitHub token, kept server-side
//! 3. Hands out short-lived access tokens and rotating refresh tokens
//! 4. Resolves access tokens back to the GitHub token on demand

mod config;
mod error;
mod metrics;
mod routes;

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use anyhow::{Context, Result};
use github_auth::GitHubOAuthClient;
use session::{KvRestStore, MemoryStore, SessionManager, SessionStore, TokenCodec};
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{Config, StateVerification, StoreBackend};
use crate::metrics::ServiceMetrics;
use crate::routes::{AppState, build_router, extension_cors};

/// How long in-flight requests may run after a shutdown signal.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("starting status-viewer-gateway");

    let prometheus = metrics::install_recorder().context("failed to install metrics recorder")?;

    let args: Vec<String> = std::env::args().collect();
    let cli_config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());

    let config_path = Config::resolve_path(cli_config_path);
    info!(path = %config_path.display(), "loading configuration");

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(
        listen_addr = %config.server.listen_addr,
        store_backend = ?config.store.backend,
        state_verification = ?config.oauth.state_verification,
        cors = config.server.extension_id.is_some(),
        "configuration loaded"
    );

    if config.oauth.state_verification == StateVerification::Presence {
        warn!(
            "oauth state_verification = \"presence\": callbacks accept any non-empty state, \
             leaving the OAuth flow without CSRF protection"
        );
    }

    let (app, service_metrics) = build_app(&config, prometheus)?;

    let listener = TcpListener::bind(config.server.listen_addr)
        .await
        .with_context(|| format!("failed to bind to {}", config.server.listen_addr))?;
    info!(addr = %config.server.listen_addr, "accepting requests");

    serve(listener, app, service_metrics).await;

    info!("shutdown complete");
    Ok(())
}

/// Construct store, codec, exchanger and manager once, and wire the router.
fn build_app(
    config: &Config,
    prometheus: metrics_exporter_prometheus::PrometheusHandle,
) -> Result<(axum::Router, ServiceMetrics)> {
    let store: Arc<dyn SessionStore> = match config.store.backend {
        StoreBackend::Rest => {
            let url = config
                .store
                .url
                .clone()
                .context("store.url is required for the rest backend")?;
            let token = config
                .store
                .token
                .clone()
                .context("store token is required for the rest backend")?;
            Arc::new(
                KvRestStore::new(url, token, Duration::from_secs(config.store.timeout_secs))
                    .context("failed to build key-value store client")?,
            )
        }
        StoreBackend::Memory => {
            warn!("using in-memory session store: sessions are lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    let secret = config
        .tokens
        .secret
        .as_ref()
        .context("token signing secret is not configured")?;
    let codec = TokenCodec::new(secret, config.tokens.lifetimes())
        .context("failed to initialize token codec")?;

    let client_secret = config
        .oauth
        .client_secret
        .clone()
        .context("OAuth client secret is not configured")?;
    let github = Arc::new(
        GitHubOAuthClient::new(
            config.oauth.client_id.clone(),
            client_secret,
            Duration::from_secs(config.oauth.timeout_secs),
        )
        .context("failed to build GitHub OAuth client")?
        .with_scope(config.oauth.scope.clone())
        .with_redirect_uri(config.oauth.redirect_uri.clone()),
    );

    let manager = SessionManager::new(store, github.clone(), codec)
        .with_session_ttl(config.tokens.session_ttl());

    let cors = config
        .server
        .extension_id
        .as_deref()
        .map(extension_cors)
        .transpose()
        .context("invalid extension id for CORS origin")?;

    let metrics = ServiceMetrics::new();
    let state = AppState {
        manager: Arc::new(manager),
        github,
        state_verification: config.oauth.state_verification,
        metrics: metrics.clone(),
        prometheus,
    };

    Ok((
        build_router(state, config.server.max_connections, cors),
        metrics,
    ))
}

/// Serve until SIGINT/SIGTERM, then drain for at most `DRAIN_TIMEOUT`.
///
/// The drain timer starts when the signal fires, not when the server starts.
async fn serve(listener: TcpListener, app: axum::Router, metrics: ServiceMetrics) {
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    shutdown_signal().await;
    let _ = shutdown_tx.send(());

    match tokio::time::timeout(DRAIN_TIMEOUT, server_handle).await {
        Ok(Ok(Ok(()))) => info!("all in-flight requests drained"),
        Ok(Ok(Err(e))) => error!(error = %e, "server error during shutdown"),
        Ok(Err(e)) => error!(error = %e, "server task panicked"),
        Err(_) => {
            warn!(
                remaining = metrics.in_flight.load(Ordering::Relaxed),
                drain_timeout_secs = DRAIN_TIMEOUT.as_secs(),
                "drain timeout exceeded, forcing shutdown"
            );
        }
    }
}

/// Wait for SIGTERM or SIGINT.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
