//! Application state for the HTTP service.
//!
//! Holds the zone store, the alert broadcaster and the process start time
//! that axum handlers share.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use dangerzone_lib::{Broadcaster, ZoneStore};

use crate::config::Environment;

/// Shared application state for all axum handlers.
///
/// Cheaply cloneable (`Arc` inside); share it via axum's `State` extractor.
///
/// # Example
///
/// ```ignore
/// use axum::{Router, routing::get, extract::State};
/// use dangerzone_service_shared::AppState;
///
/// async fn handler(State(state): State<AppState>) {
///     let zones = state.store().list().await;
/// }
///
/// let state = AppState::new(ZoneStore::in_memory(), Broadcaster::default(), Environment::Development);
/// let app = Router::new()
///     .route("/api/zones", get(handler))
///     .with_state(state);
/// ```
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    store: ZoneStore,
    broadcaster: Broadcaster,
    environment: Environment,
    started: Instant,
    started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(store: ZoneStore, broadcaster: Broadcaster, environment: Environment) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                store,
                broadcaster,
                environment,
                started: Instant::now(),
                started_at: Utc::now(),
            }),
        }
    }

    pub fn store(&self) -> &ZoneStore {
        &self.inner.store
    }

    pub fn broadcaster(&self) -> &Broadcaster {
        &self.inner.broadcaster
    }

    pub fn environment(&self) -> Environment {
        self.inner.environment
    }

    /// Wall-clock time the state was created.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.inner.started_at
    }

    /// Seconds elapsed since the state was created, from a monotonic clock.
    pub fn uptime_seconds(&self) -> f64 {
        self.inner.started.elapsed().as_secs_f64()
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("backend", &self.inner.store.backend_name())
            .field("connections", &self.inner.broadcaster.len())
            .field("environment", &self.inner.environment)
            .finish()
    }
}
