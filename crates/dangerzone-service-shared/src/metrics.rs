//! Prometheus metrics for the danger zone service.
//!
//! - [`MetricsConfig`]: whether metrics are on and where they are served
//! - [`init_metrics`]: install the Prometheus recorder
//! - [`metrics_handler`]: axum handler for the exposition endpoint
//! - `record_*` helpers for zone and alert activity
//!
//! # Example
//!
//! ```no_run
//! use dangerzone_service_shared::metrics::{MetricsConfig, init_metrics, metrics_handler};
//! use axum::{Router, routing::get};
//!
//! let config = MetricsConfig::default();
//! init_metrics(&config).expect("failed to initialize metrics");
//!
//! let app: Router = Router::new()
//!     .route("/metrics", get(metrics_handler));
//! ```

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

static PROMETHEUS_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    /// Path of the exposition endpoint, e.g. "/metrics".
    pub path: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "/metrics".to_string(),
        }
    }
}

impl MetricsConfig {
    /// - `METRICS_ENABLED`: "true" or "false" (default: true)
    /// - `METRICS_PATH`: endpoint path (default: "/metrics")
    pub fn from_env() -> Self {
        let enabled = std::env::var("METRICS_ENABLED")
            .map(|v| v.to_lowercase() != "false")
            .unwrap_or(true);

        let path = std::env::var("METRICS_PATH").unwrap_or_else(|_| "/metrics".to_string());

        Self { enabled, path }
    }
}

/// Install the Prometheus recorder. Call once at startup.
///
/// # Errors
///
/// Fails when metrics are disabled, the recorder is already installed, or
/// the exporter cannot be built.
pub fn init_metrics(config: &MetricsConfig) -> Result<(), MetricsError> {
    if !config.enabled {
        return Err(MetricsError::Disabled);
    }

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| MetricsError::InstallFailed(e.to_string()))?;

    PROMETHEUS_HANDLE
        .set(handle)
        .map_err(|_| MetricsError::AlreadyInitialized)?;

    Ok(())
}

/// Returns `None` if [`init_metrics`] has not been called.
pub fn prometheus_handle() -> Option<&'static PrometheusHandle> {
    PROMETHEUS_HANDLE.get()
}

/// Render the Prometheus exposition text.
pub async fn metrics_handler() -> String {
    PROMETHEUS_HANDLE
        .get()
        .map(|h| h.render())
        .unwrap_or_else(|| "# Metrics not initialized\n".to_string())
}

#[derive(Debug, Clone)]
pub enum MetricsError {
    Disabled,
    AlreadyInitialized,
    InstallFailed(String),
}

impl std::fmt::Display for MetricsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricsError::Disabled => write!(f, "metrics are disabled"),
            MetricsError::AlreadyInitialized => write!(f, "metrics recorder already initialized"),
            MetricsError::InstallFailed(e) => {
                write!(f, "failed to install metrics recorder: {}", e)
            }
        }
    }
}

impl std::error::Error for MetricsError {}

// =============================================================================
// Business Metrics Helpers
// =============================================================================

/// Increments `dangerzone_zones_created_total`.
pub fn record_zone_created() {
    metrics::counter!("dangerzone_zones_created_total").increment(1);
}

/// Increments `dangerzone_zones_deleted_total`.
pub fn record_zone_deleted() {
    metrics::counter!("dangerzone_zones_deleted_total").increment(1);
}

/// Record a zone query and its result size.
///
/// Increments `dangerzone_zone_queries_total` and records to the
/// `dangerzone_zone_query_results` histogram.
///
/// # Arguments
///
/// * `kind` - Query type: "list", "nearby", "contains" or "within"
/// * `results` - Number of zones returned
pub fn record_zone_query(kind: &str, results: usize) {
    metrics::counter!(
        "dangerzone_zone_queries_total",
        "kind" => kind.to_string()
    )
    .increment(1);
    metrics::histogram!(
        "dangerzone_zone_query_results",
        "kind" => kind.to_string()
    )
    .record(results as f64);
}

/// Record one alert fan-out.
///
/// `dropped` counts connections unregistered because their queue refused the
/// event.
pub fn record_alert_broadcast(delivered: usize, dropped: usize) {
    metrics::counter!("dangerzone_alerts_broadcast_total").increment(1);
    metrics::counter!("dangerzone_alert_deliveries_total").increment(delivered as u64);
    if dropped > 0 {
        metrics::counter!("dangerzone_alert_dropped_connections_total").increment(dropped as u64);
    }
}

/// Adjust the `dangerzone_ws_connections` gauge by `delta`.
pub fn record_ws_connections(delta: i64) {
    let gauge = metrics::gauge!("dangerzone_ws_connections");
    if delta >= 0 {
        gauge.increment(delta as f64);
    } else {
        gauge.decrement(delta.unsigned_abs() as f64);
    }
}
