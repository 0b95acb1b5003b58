//! PeopleSuite API
//!
//! Single-binary Rust service that:
//! 1. Issues bearer tokens for pre-provisioned API clients (client-credentials grant)
//! 2. Gates every employee route on a currently issued token
//! 3. Stores employee profiles in a key-value table
//! 4. Stores employee photos in an object store and hands out signed URLs

mod auth;
mod blobs;
mod config;
mod error;
mod metrics;
mod photo;
mod profile;
mod token;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::{DefaultBodyLimit, State};
use axum::middleware;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use rand::RngExt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use common::Secret;
use metrics_exporter_prometheus::PrometheusHandle;
use store::{
    BlobStore, ClientCredential, CredentialStore, EmployeeProfile, LocalBlobStore, ProfileStore,
    Table,
};

use crate::config::Config;

/// How long in-flight requests get to finish after a shutdown signal
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Counters backing the /health endpoint
#[derive(Debug, Clone)]
struct ServiceMetrics {
    requests_total: Arc<AtomicU64>,
    started_at: Instant,
}

impl ServiceMetrics {
    fn new() -> Self {
        Self {
            requests_total: Arc::new(AtomicU64::new(0)),
            started_at: Instant::now(),
        }
    }
}

/// Shared application state accessible from all handlers.
///
/// Store handles are built once at startup and shared by every request.
#[derive(Clone)]
struct AppState {
    credentials: Arc<dyn CredentialStore>,
    profiles: Arc<dyn ProfileStore>,
    photos: Arc<dyn BlobStore>,
    /// Verifies and serves the signed URLs handed out for `photos`
    signed_blobs: Arc<LocalBlobStore>,
    photo_url_expiry: Duration,
    metrics: ServiceMetrics,
    prometheus: PrometheusHandle,
}

/// Router limits taken from config
struct RouterLimits {
    path_prefix: String,
    max_connections: usize,
    max_upload_bytes: usize,
}

/// Build the axum router with all routes and shared state.
///
/// Employee routes sit behind the bearer gate; `/token` and the signed blob
/// route do not. `/health` and `/metrics` live outside the API prefix.
fn build_router(state: AppState, limits: &RouterLimits) -> Router {
    let protected = Router::new()
        .route(
            "/employees/{employee_id}/profile",
            post(profile::create_profile).get(profile::get_profile),
        )
        .route(
            "/employees/{employee_id}/photo",
            post(photo::upload_photo)
                .get(photo::get_photo)
                .layer(DefaultBodyLimit::max(limits.max_upload_bytes)),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_bearer,
        ));

    let api = Router::new()
        .route("/token", post(token::issue_token))
        .route("/blobs/{key}", get(blobs::get_blob))
        .merge(protected);

    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .nest(&limits.path_prefix, api)
        .layer(middleware::from_fn_with_state(
            state.metrics.requests_total.clone(),
            metrics::track_requests,
        ))
        .layer(tower::limit::ConcurrencyLimitLayer::new(limits.max_connections))
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("starting peoplesuite-api");

    // Install Prometheus metrics recorder before any metrics are emitted
    let prometheus_handle =
        metrics::install_recorder().context("failed to install Prometheus recorder")?;

    // CLI: simple --config flag parsing
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
        path_prefix = %config.server.path_prefix,
        photos_dir = %config.photos.dir.display(),
        "configuration loaded"
    );

    let credentials = Table::<ClientCredential>::load(config.storage.credentials_path.clone())
        .await
        .context("failed to open client credential table")?;
    if credentials.is_empty().await {
        warn!("client credential table is empty, no client can obtain a token");
    }
    let profiles = Table::<EmployeeProfile>::load(config.storage.employees_path.clone())
        .await
        .context("failed to open employee table")?;

    let signing_key = match &config.photos.signing_key {
        Some(key) => Secret::new(key.expose().as_bytes().to_vec()),
        None => {
            warn!(
                env = config::SIGNING_KEY_ENV,
                "no photo signing key configured, using an ephemeral key; photo URLs will not survive a restart"
            );
            ephemeral_signing_key()
        }
    };
    let blobs = Arc::new(
        LocalBlobStore::open(
            config.photos.dir.clone(),
            config.photos.public_url.clone(),
            signing_key,
        )
        .await
        .context("failed to open photo store")?,
    );

    let metrics = ServiceMetrics::new();
    let requests_total = metrics.requests_total.clone();

    let app_state = AppState {
        credentials: Arc::new(credentials),
        profiles: Arc::new(profiles),
        photos: blobs.clone(),
        signed_blobs: blobs,
        photo_url_expiry: Duration::from_secs(config.photos.url_expiry_secs),
        metrics,
        prometheus: prometheus_handle,
    };

    let limits = RouterLimits {
        path_prefix: config.server.path_prefix.clone(),
        max_connections: config.server.max_connections,
        max_upload_bytes: config.photos.max_upload_bytes,
    };
    let app = build_router(app_state, &limits);

    let listen_addr = config.server.listen_addr;
    let listener = TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind to {listen_addr}"))?;
    info!(addr = %listen_addr, "accepting requests");

    // The drain timeout starts when the shutdown signal fires, not when the
    // server starts: notify the server to drain, then race it against the timer.
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
        Ok(Ok(Ok(()))) => {
            info!("all in-flight requests drained");
        }
        Ok(Ok(Err(e))) => {
            error!(error = %e, "server error during shutdown");
        }
        Ok(Err(e)) => {
            error!(error = %e, "server task panicked");
        }
        Err(_) => {
            warn!(
                requests_served = requests_total.load(Ordering::Relaxed),
                drain_timeout_secs = DRAIN_TIMEOUT.as_secs(),
                "drain timeout exceeded, forcing shutdown"
            );
        }
    }

    info!("shutdown complete");
    Ok(())
}

fn ephemeral_signing_key() -> Secret<Vec<u8>> {
    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes);
    Secret::new(bytes.to_vec())
}

/// Health endpoint: status, uptime and requests served.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let body = serde_json::json!({
        "status": "healthy",
        "uptime_seconds": state.metrics.started_at.elapsed().as_secs(),
        "requests_served": state.metrics.requests_total.load(Ordering::Relaxed),
    });

    (
        axum::http::StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
}

/// Prometheus metrics endpoint, text exposition format.
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        axum::http::StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        state.prometheus.render(),
    )
}

/// Wait for SIGTERM or SIGINT for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
