//! Danger zone registry HTTP and WebSocket service.
//!
//! # Endpoints
//!
//! - `POST /api/zones` - Register a zone
//! - `GET /api/zones` - List zones
//! - `GET /api/zones/nearby?lat&lng&maxDistance` - Zones within a distance of a point
//! - `POST /api/zones/check` - Zones containing a point
//! - `GET /api/zones/within?minLat&minLng&maxLat&maxLng` - Zones inside a box
//! - `GET /api/zones/{id}` / `DELETE /api/zones/{id}` - Fetch or remove one zone
//! - `GET /ws` - Alert channel
//! - `GET /metrics` - Prometheus metrics endpoint
//! - `GET /health` - Uptime and storage reachability
//! - `GET /health/live` - Liveness probe

#![deny(warnings)]

pub mod ws;
pub mod zones;

use axum::{
    http::HeaderValue,
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use dangerzone_service_shared::{
    health_check, health_live, metrics_handler, rate_limit::rate_limit, AppState, MetricsLayer,
    RateLimiter,
};

/// Router settings that are not part of the shared state.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    pub cors_allow_origin: String,
    pub metrics_path: String,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            cors_allow_origin: "*".to_string(),
            metrics_path: "/metrics".to_string(),
        }
    }
}

/// CORS layer for the configured origin. `*` or an unparseable value allows any origin.
pub fn cors_layer(origin: &str) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origin.trim() == "*" {
        return layer.allow_origin(Any);
    }
    match HeaderValue::from_str(origin.trim()) {
        Ok(value) => layer.allow_origin(value),
        Err(e) => {
            tracing::warn!(origin, error = %e, "invalid CORS origin, allowing any");
            layer.allow_origin(Any)
        }
    }
}

/// Zone routes, rate limited per client.
fn api_routes(limiter: RateLimiter) -> Router<AppState> {
    Router::new()
        .route("/api/zones", post(zones::create_zone).get(zones::list_zones))
        .route("/api/zones/nearby", get(zones::nearby_zones))
        .route("/api/zones/check", post(zones::check_point))
        .route("/api/zones/within", get(zones::zones_within))
        .route(
            "/api/zones/{id}",
            get(zones::get_zone).delete(zones::delete_zone),
        )
        .route_layer(from_fn_with_state(limiter, rate_limit))
}

/// Build the complete application router.
pub fn router(state: AppState, limiter: RateLimiter, config: &RouterConfig) -> Router {
    Router::new()
        .merge(api_routes(limiter))
        .route("/ws", get(ws::alerts_ws))
        .route(&config.metrics_path, get(metrics_handler))
        .route("/health", get(health_check))
        .route("/health/live", get(health_live))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config.cors_allow_origin))
        .layer(MetricsLayer)
        .with_state(state)
}
