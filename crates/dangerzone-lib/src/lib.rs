//! Danger zone library entry points.
//!
//! This crate holds the geometry engine, the zone store with its pluggable
//! storage backends, and the real-time alert broadcaster. HTTP services
//! should only depend on the items exported here instead of reimplementing
//! behavior.
//!

#![deny(warnings)]

pub mod alerts;
pub mod error;
pub mod geometry;
pub mod store;
pub mod zone;

pub use alerts::{
    AlertEvent, AlertSignal, Broadcaster, Connection, ConnectionId, ConnectionState,
    PublishReport, Severity, Subscription,
};
pub use error::{Error, ErrorKind, Result};
pub use geometry::{BoundingBox, Point, Position};
pub use store::{
    connect_with_retry, BackendHealth, MemoryBackend, RetryPolicy, SqliteBackend,
    StorageBackend, StoreConfig, StoredZone, WriteGate, ZoneStore, DEFAULT_MAX_DISTANCE_M,
};
pub use zone::{GeometryType, NewZone, PolygonGeometry, Properties, Zone, ZoneId};
