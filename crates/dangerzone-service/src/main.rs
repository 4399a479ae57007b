//! Danger zone registry service binary.
//!
//! # Configuration
//!
//! See [`dangerzone_service_shared::config`] for the full list. The most
//! common variables:
//!
//! - `SERVICE_PORT` - HTTP port (default: 8080)
//! - `DANGERZONE_DB_PATH` - SQLite file, or `memory` (default)
//! - `APP_ENV` - `production` redacts internal error detail
//! - `RUST_LOG` - Log level (default: info)
//! - `LOG_FORMAT` - Log format: json (default) or text

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{error, info};

use dangerzone_lib::{connect_with_retry, Broadcaster, MemoryBackend, SqliteBackend, ZoneStore};
use dangerzone_service::{router, RouterConfig};
use dangerzone_service_shared::{
    init_logging, init_metrics, rate_limit::spawn_eviction, AppState, LoggingConfig,
    MetricsConfig, RateLimiter, ServiceConfig, StorageTarget,
};

/// How often expired rate limit windows are dropped.
const RATE_LIMIT_EVICTION_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let logging_config = LoggingConfig::from_env().with_service("dangerzone");
    init_logging(&logging_config).context("failed to initialise logging")?;

    let metrics_config = MetricsConfig::from_env();
    if let Err(e) = init_metrics(&metrics_config) {
        tracing::warn!(error = %e, "failed to initialize metrics, continuing without metrics");
    }

    let config = ServiceConfig::from_env();
    info!(
        port = config.port,
        storage = ?config.storage,
        environment = ?config.environment,
        "starting danger zone service"
    );

    let store = open_store(&config).await.map_err(|e| {
        error!(error = %e, "storage backend unavailable, shutting down");
        e
    })?;
    info!(backend = store.backend_name(), "zone store ready");

    let state = AppState::new(store, Broadcaster::default(), config.environment);

    let limiter = RateLimiter::with_system_clock(config.rate_limit.clone());
    let eviction = spawn_eviction(limiter.clone(), RATE_LIMIT_EVICTION_INTERVAL);

    let router_config = RouterConfig {
        cors_allow_origin: config.cors_allow_origin.clone(),
        metrics_path: metrics_config.path.clone(),
    };
    let app = router(state, limiter, &router_config);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!(addr = %addr, "listening on");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

    eviction.abort();
    info!("danger zone service stopped");
    Ok(())
}

/// Open the configured backend, retrying SQLite per the configured policy.
async fn open_store(config: &ServiceConfig) -> dangerzone_lib::Result<ZoneStore> {
    match &config.storage {
        StorageTarget::Memory => Ok(ZoneStore::new(
            Arc::new(MemoryBackend::new()),
            config.store.clone(),
        )),
        StorageTarget::Sqlite(path) => {
            let backend =
                connect_with_retry(&config.retry, || SqliteBackend::open(path.clone())).await?;
            Ok(ZoneStore::new(Arc::new(backend), config.store.clone()))
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl-c");
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
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
