//! Test utilities for handler testing.
//!
//! Fresh in-memory state per call, so tests never observe each other's zones.

use dangerzone_lib::{Broadcaster, ZoneStore};
use serde_json::{json, Value};

use crate::config::Environment;
use crate::state::AppState;

/// In-memory application state in development mode.
pub fn test_state() -> AppState {
    AppState::new(
        ZoneStore::in_memory(),
        Broadcaster::default(),
        Environment::Development,
    )
}

/// State wrapping an existing store, e.g. one backed by a failing backend.
pub fn test_state_with_store(store: ZoneStore, environment: Environment) -> AppState {
    AppState::new(store, Broadcaster::default(), environment)
}

/// GeoJSON polygon for an axis-aligned square with its south-west corner at
/// `(lng, lat)`.
pub fn square_geometry(lng: f64, lat: f64, size: f64) -> Value {
    json!({
        "type": "Polygon",
        "coordinates": [[
            [lng, lat],
            [lng + size, lat],
            [lng + size, lat + size],
            [lng, lat + size],
            [lng, lat]
        ]]
    })
}

/// Body for `POST /api/zones`.
pub fn create_zone_body(name: &str, geometry: Value) -> Value {
    json!({ "name": name, "geometry": geometry })
}

/// Generate a unique request ID for testing.
pub fn test_request_id() -> String {
    format!("test-{}", uuid::Uuid::now_v7())
}
