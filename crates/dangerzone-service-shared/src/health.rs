//! Health check handlers.
//!
//! `/health` reports uptime and storage reachability and answers `503` when
//! the storage backend is not connected. `/health/live` only proves the
//! process is serving requests.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use dangerzone_lib::BackendHealth;
use serde::{Deserialize, Serialize};

use crate::AppState;

/// Health status response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    /// "ok" or "degraded".
    pub status: String,

    pub service: String,

    pub version: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub uptime_seconds: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,

    /// Storage reachability: "connected", "disconnected" or "error".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,

    /// Backend error message when `database` is "error".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_error: Option<String>,
}

impl HealthStatus {
    /// Create a healthy liveness status.
    pub fn alive(service: &str, version: &str) -> Self {
        Self {
            status: "ok".to_string(),
            service: service.to_string(),
            version: version.to_string(),
            uptime_seconds: None,
            timestamp: None,
            database: None,
            database_error: None,
        }
    }

    /// Full status including storage reachability.
    pub fn with_database(
        service: &str,
        version: &str,
        uptime_seconds: f64,
        database: &BackendHealth,
    ) -> Self {
        let status = if database.is_connected() { "ok" } else { "degraded" };
        let database_error = match database {
            BackendHealth::Error(message) => Some(message.clone()),
            _ => None,
        };

        Self {
            status: status.to_string(),
            service: service.to_string(),
            version: version.to_string(),
            uptime_seconds: Some(uptime_seconds),
            timestamp: Some(Utc::now()),
            database: Some(database.label().to_string()),
            database_error,
        }
    }
}

/// Liveness probe handler.
///
/// ```text
/// GET /health/live
/// {"status":"ok","service":"dangerzone-service-shared","version":"0.1.0"}
/// ```
pub async fn health_live() -> impl IntoResponse {
    let status = HealthStatus::alive(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    (StatusCode::OK, Json(status))
}

/// Health probe handler.
///
/// ```text
/// GET /health
/// {"status":"ok","service":"...","version":"0.1.0","uptimeSeconds":12.5,
///  "timestamp":"2026-01-01T00:00:00Z","database":"connected"}
/// ```
pub async fn health_check(State(state): State<AppState>) -> Response {
    let database = state.store().health().await;
    let status = HealthStatus::with_database(
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        state.uptime_seconds(),
        &database,
    );

    if database.is_connected() {
        (StatusCode::OK, Json(status)).into_response()
    } else {
        tracing::warn!(database = database.label(), "health check degraded");
        (StatusCode::SERVICE_UNAVAILABLE, Json(status)).into_response()
    }
}
