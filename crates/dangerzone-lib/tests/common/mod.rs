//! Shared fixtures for zone store integration tests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dangerzone_lib::{
    BoundingBox, Error, NewZone, PolygonGeometry, Position, Result, SqliteBackend,
    StorageBackend, StoreConfig, StoredZone, WriteGate, Zone, ZoneId, ZoneStore,
};
use tempfile::TempDir;

/// Axis-aligned square ring with its south-west corner at `(lng, lat)`.
pub fn square(lng: f64, lat: f64, size: f64) -> PolygonGeometry {
    let ring: Vec<Position> = vec![
        [lng, lat],
        [lng + size, lat],
        [lng + size, lat + size],
        [lng, lat + size],
        [lng, lat],
    ];
    PolygonGeometry::from_ring(ring)
}

/// Square of side `size` centred on `(lng, lat)`.
#[allow(dead_code)]
pub fn centred_square(lng: f64, lat: f64, size: f64) -> PolygonGeometry {
    square(lng - size / 2.0, lat - size / 2.0, size)
}

#[allow(dead_code)]
pub fn new_zone(name: &str, geometry: PolygonGeometry) -> NewZone {
    NewZone::new(name, geometry)
}

/// SQLite-backed store in a temporary directory.
///
/// The `TempDir` must be kept alive for as long as the store is used.
#[allow(dead_code)]
pub async fn sqlite_store() -> (ZoneStore, TempDir) {
    let dir = tempfile::tempdir().expect("temp dir");
    let backend = SqliteBackend::open(dir.path().join("zones.db"))
        .await
        .expect("sqlite opens");
    (
        ZoneStore::new(Arc::new(backend), StoreConfig::default()),
        dir,
    )
}

/// Backend that never answers, to exercise operation timeouts.
#[allow(dead_code)]
pub struct StalledBackend;

#[async_trait]
impl StorageBackend for StalledBackend {
    fn name(&self) -> &'static str {
        "stalled"
    }

    async fn ping(&self) -> Result<()> {
        std::future::pending().await
    }

    async fn insert(&self, _zone: StoredZone, _gate: WriteGate) -> Result<()> {
        std::future::pending().await
    }

    async fn all(&self) -> Result<Vec<Zone>> {
        std::future::pending().await
    }

    async fn get(&self, _id: ZoneId) -> Result<Option<Zone>> {
        std::future::pending().await
    }

    async fn remove(&self, _id: ZoneId, _gate: WriteGate) -> Result<Option<Zone>> {
        std::future::pending().await
    }

    async fn candidates(&self, _bbox: BoundingBox) -> Result<Vec<Zone>> {
        std::future::pending().await
    }
}

/// Backend whose every call fails with a non-retryable error.
#[allow(dead_code)]
pub struct BrokenBackend;

#[async_trait]
impl StorageBackend for BrokenBackend {
    fn name(&self) -> &'static str {
        "broken"
    }

    async fn ping(&self) -> Result<()> {
        Err(Error::internal("disk corrupted"))
    }

    async fn insert(&self, _zone: StoredZone, _gate: WriteGate) -> Result<()> {
        Err(Error::internal("disk corrupted"))
    }

    async fn all(&self) -> Result<Vec<Zone>> {
        Err(Error::internal("disk corrupted"))
    }

    async fn get(&self, _id: ZoneId) -> Result<Option<Zone>> {
        Err(Error::internal("disk corrupted"))
    }

    async fn remove(&self, _id: ZoneId, _gate: WriteGate) -> Result<Option<Zone>> {
        Err(Error::internal("disk corrupted"))
    }

    async fn candidates(&self, _bbox: BoundingBox) -> Result<Vec<Zone>> {
        Err(Error::internal("disk corrupted"))
    }
}

#[allow(dead_code)]
pub fn short_timeout() -> StoreConfig {
    StoreConfig {
        operation_timeout: Duration::from_millis(50),
    }
}
