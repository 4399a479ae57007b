//! Shared helpers for service integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum_test::TestServer;
use dangerzone_lib::{
    BoundingBox, Error, Result, StorageBackend, StoreConfig, StoredZone, WriteGate, Zone, ZoneId,
    ZoneStore,
};
use dangerzone_service::{router, RouterConfig};
use dangerzone_service_shared::test_utils::{test_state, test_state_with_store};
use dangerzone_service_shared::{
    AppState, Environment, ManualClock, RateLimitConfig, RateLimiter,
};

/// Limiter generous enough that ordinary tests never hit it.
pub fn relaxed_limiter() -> RateLimiter {
    RateLimiter::new(
        RateLimitConfig {
            max_requests: 10_000,
            window: Duration::from_secs(900),
        },
        Arc::new(ManualClock::new()),
    )
}

pub fn server_for(state: AppState, limiter: RateLimiter) -> TestServer {
    TestServer::new(router(state, limiter, &RouterConfig::default())).expect("test server")
}

/// Server over a fresh in-memory store.
pub fn server() -> TestServer {
    server_for(test_state(), relaxed_limiter())
}

/// Server over a store whose backend always fails with an internal error.
pub fn broken_server(environment: Environment) -> TestServer {
    let store = ZoneStore::new(
        Arc::new(BrokenBackend),
        StoreConfig {
            operation_timeout: Duration::from_millis(200),
        },
    );
    server_for(test_state_with_store(store, environment), relaxed_limiter())
}

pub struct BrokenBackend;

#[async_trait]
impl StorageBackend for BrokenBackend {
    fn name(&self) -> &'static str {
        "broken"
    }

    async fn ping(&self) -> Result<()> {
        Err(Error::internal("page checksum mismatch"))
    }

    async fn insert(&self, _zone: StoredZone, _gate: WriteGate) -> Result<()> {
        Err(Error::internal("page checksum mismatch"))
    }

    async fn all(&self) -> Result<Vec<Zone>> {
        Err(Error::internal("page checksum mismatch"))
    }

    async fn get(&self, _id: ZoneId) -> Result<Option<Zone>> {
        Err(Error::internal("page checksum mismatch"))
    }

    async fn remove(&self, _id: ZoneId, _gate: WriteGate) -> Result<Option<Zone>> {
        Err(Error::internal("page checksum mismatch"))
    }

    async fn candidates(&self, _bbox: BoundingBox) -> Result<Vec<Zone>> {
        Err(Error::internal("page checksum mismatch"))
    }
}
