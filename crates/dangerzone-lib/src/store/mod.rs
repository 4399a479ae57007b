//! Zone store: validation and query translation over a pluggable backend.
//!
//! Queries are defined as pure filters over the full zone set. The store
//! pushes a bounding-box prefilter down to the backend's spatial index
//! ([`StorageBackend::candidates`]) and refines the candidates with the
//! geometry engine, so results are identical to a full scan.
//!
//! Every backend call runs under [`StoreConfig::operation_timeout`]; an
//! unreachable backend surfaces [`Error::Timeout`] instead of hanging. Live
//! queries are never retried here. Only initial connection establishment is
//! retried, see [`connect_with_retry`].

mod backend;
mod memory;
mod sqlite;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::geometry::{self, BoundingBox, Point};

pub use backend::{StorageBackend, StoredZone, WriteGate};
pub use memory::MemoryBackend;
pub use sqlite::SqliteBackend;

use crate::zone::{NewZone, Zone, ZoneId};

/// Default search radius for proximity queries, in meters.
pub const DEFAULT_MAX_DISTANCE_M: f64 = 5000.0;

/// Runtime settings for the zone store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Upper bound for any single backend call.
    pub operation_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            operation_timeout: Duration::from_secs(5),
        }
    }
}

/// Fixed back-off retry schedule for establishing the backend connection.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one.
    pub attempts: u32,
    /// Pause between consecutive attempts.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            backoff: Duration::from_secs(2),
        }
    }
}

/// Call `connect` until it succeeds or the policy is exhausted.
///
/// Each failure is logged; after the final failed attempt the last error is
/// returned as [`Error::Unavailable`].
pub async fn connect_with_retry<B, F, Fut>(policy: &RetryPolicy, mut connect: F) -> Result<B>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<B>>,
{
    let attempts = policy.attempts.max(1);
    let mut last_error = None;

    for attempt in 1..=attempts {
        match connect().await {
            Ok(backend) => {
                if attempt > 1 {
                    info!(attempt, "storage backend connected after retry");
                }
                return Ok(backend);
            }
            Err(e) => {
                warn!(
                    attempt,
                    max_attempts = attempts,
                    error = %e,
                    "storage backend connection failed"
                );
                last_error = Some(e);
                if attempt < attempts {
                    tokio::time::sleep(policy.backoff).await;
                }
            }
        }
    }

    let detail = last_error
        .map(|e| e.to_string())
        .unwrap_or_else(|| "no attempts made".to_string());
    Err(Error::unavailable(format!(
        "giving up after {} attempts: {}",
        attempts, detail
    )))
}

/// Reachability of the storage backend as reported by health probes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendHealth {
    Connected,
    Disconnected,
    Error(String),
}

impl BackendHealth {
    /// Label used on the wire: `connected`, `disconnected` or `error`.
    pub fn label(&self) -> &'static str {
        match self {
            BackendHealth::Connected => "connected",
            BackendHealth::Disconnected => "disconnected",
            BackendHealth::Error(_) => "error",
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, BackendHealth::Connected)
    }
}

/// Danger zone store.
///
/// Cheap to clone; clones share the same backend.
#[derive(Clone)]
pub struct ZoneStore {
    backend: Arc<dyn StorageBackend>,
    config: StoreConfig,
}

impl ZoneStore {
    pub fn new(backend: Arc<dyn StorageBackend>, config: StoreConfig) -> Self {
        Self { backend, config }
    }

    /// Store backed by a fresh [`MemoryBackend`].
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()), StoreConfig::default())
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    async fn call<T, Fut>(&self, operation: &'static str, fut: Fut) -> Result<T>
    where
        Fut: Future<Output = Result<T>>,
    {
        let after = self.config.operation_timeout;
        match tokio::time::timeout(after, fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!(operation, timeout_ms = after.as_millis() as u64, "storage operation timed out");
                Err(Error::Timeout { operation, after })
            }
        }
    }

    /// Like [`Self::call`] for writes, which must not land after a timeout.
    ///
    /// On expiry the write's [`WriteGate`] is cancelled. If the backend had
    /// already committed, its real outcome is awaited and returned instead.
    async fn call_write<T, F, Fut>(&self, operation: &'static str, write: F) -> Result<T>
    where
        F: FnOnce(WriteGate) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let gate = WriteGate::new();
        let mut pending = std::pin::pin!(write(gate.clone()));
        let after = self.config.operation_timeout;

        let outcome = tokio::time::timeout(after, pending.as_mut()).await;
        match outcome {
            Ok(result) => result,
            Err(_) => {
                if gate.cancel() {
                    warn!(
                        operation,
                        timeout_ms = after.as_millis() as u64,
                        "storage write timed out, abandoned"
                    );
                    Err(Error::Timeout { operation, after })
                } else {
                    debug!(operation, "storage write committed at its deadline");
                    pending.await
                }
            }
        }
    }

    /// Validate and persist a new zone.
    pub async fn create(&self, new: NewZone) -> Result<Zone> {
        let zone = Zone::from_new(new, Utc::now())?;
        let bounds = zone
            .bounds()
            .ok_or_else(|| Error::internal("validated geometry has no bounds"))?;

        let stored = StoredZone {
            zone: zone.clone(),
            bounds,
        };
        self.call_write("create", |gate| self.backend.insert(stored, gate)).await?;

        info!(zone_id = %zone.id, name = %zone.name, "zone created");
        Ok(zone)
    }

    /// All zones in insertion order.
    pub async fn list(&self) -> Result<Vec<Zone>> {
        self.call("list", self.backend.all()).await
    }

    pub async fn get(&self, id: &str) -> Result<Zone> {
        let zone_id = ZoneId::parse(id)?;
        self.call("get", self.backend.get(zone_id))
            .await?
            .ok_or_else(|| Error::NotFound { id: id.to_string() })
    }

    /// Zones within `max_distance_m` meters of `point`, nearest first.
    ///
    /// Distance is [`geometry::distance_to_polygon`], so a zone containing
    /// the point is at distance zero. Equal distances keep insertion order.
    pub async fn find_near(&self, point: Point, max_distance_m: Option<f64>) -> Result<Vec<Zone>> {
        ensure_finite_point(&point)?;
        let max_distance = max_distance_m.unwrap_or(DEFAULT_MAX_DISTANCE_M);
        if !max_distance.is_finite() || max_distance < 0.0 {
            return Err(Error::invalid_argument(
                "maxDistance must be a non-negative number",
            ));
        }

        let candidates = match geometry::expand_box(point, max_distance) {
            Some(search) => self.call("find_near", self.backend.candidates(search)).await?,
            None => self.call("find_near", self.backend.all()).await?,
        };

        let mut hits: Vec<(f64, Zone)> = candidates
            .into_iter()
            .filter_map(|zone| {
                let distance = geometry::distance_to_polygon(point, zone.geometry.outer_ring());
                (distance <= max_distance).then_some((distance, zone))
            })
            .collect();
        // stable sort keeps insertion order for ties
        hits.sort_by(|a, b| a.0.total_cmp(&b.0));

        debug!(lat = point.lat, lng = point.lng, max_distance, found = hits.len(), "proximity query");
        Ok(hits.into_iter().map(|(_, zone)| zone).collect())
    }

    /// Zones whose polygon contains `point`. Empty means the point is safe.
    pub async fn find_containing(&self, point: Point) -> Result<Vec<Zone>> {
        ensure_finite_point(&point)?;
        let candidates = self
            .call("find_containing", self.backend.candidates(BoundingBox::around(point)))
            .await?;

        Ok(candidates
            .into_iter()
            .filter(|zone| geometry::point_in_polygon(point, zone.geometry.outer_ring()))
            .collect())
    }

    /// Zones lying entirely inside `bbox`, boundaries included.
    pub async fn find_within(&self, bbox: BoundingBox) -> Result<Vec<Zone>> {
        if !bbox.is_well_formed() {
            return Err(Error::invalid_argument(
                "bounding box needs finite bounds with min <= max",
            ));
        }

        let candidates = self
            .call("find_within", self.backend.candidates(bbox))
            .await?;

        Ok(candidates
            .into_iter()
            .filter(|zone| {
                let ring = zone.geometry.outer_ring();
                !ring.is_empty()
                    && ring
                        .iter()
                        .all(|v| geometry::bounding_box_contains(Point::from(*v), &bbox))
            })
            .collect())
    }

    /// Remove a zone, returning the deleted record.
    ///
    /// A malformed id is `InvalidArgument`; an unknown id is `NotFound`.
    pub async fn delete_by_id(&self, id: &str) -> Result<Zone> {
        let zone_id = ZoneId::parse(id)?;
        let removed = self
            .call_write("delete", |gate| self.backend.remove(zone_id, gate))
            .await?
            .ok_or_else(|| Error::NotFound { id: id.to_string() })?;

        info!(zone_id = %removed.id, name = %removed.name, "zone deleted");
        Ok(removed)
    }

    /// Probe the backend under the operation timeout.
    pub async fn health(&self) -> BackendHealth {
        match self.call("ping", self.backend.ping()).await {
            Ok(()) => BackendHealth::Connected,
            Err(e) if e.is_retryable() => BackendHealth::Disconnected,
            Err(e) => BackendHealth::Error(e.to_string()),
        }
    }
}

impl std::fmt::Debug for ZoneStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZoneStore")
            .field("backend", &self.backend.name())
            .field("operation_timeout", &self.config.operation_timeout)
            .finish()
    }
}

fn ensure_finite_point(point: &Point) -> Result<()> {
    if point.is_finite() {
        Ok(())
    } else {
        Err(Error::invalid_argument("lat and lng must be finite numbers"))
    }
}
