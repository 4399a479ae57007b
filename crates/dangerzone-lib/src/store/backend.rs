use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::geometry::BoundingBox;
use crate::zone::{Zone, ZoneId};

/// A zone together with the index data derived from its geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredZone {
    pub zone: Zone,
    pub bounds: BoundingBox,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
enum GateState {
    #[default]
    Open,
    Committed,
    Cancelled,
}

/// Commit point shared between the zone store and a backend write.
///
/// A backend runs its final commit through [`WriteGate::commit`]; the store
/// calls [`WriteGate::cancel`] when the operation deadline passes. Both take
/// the same lock, so exactly one of them wins: either the write is durable
/// and the store reports it, or the write is abandoned and never becomes
/// visible.
#[derive(Debug, Clone, Default)]
pub struct WriteGate {
    state: Arc<Mutex<GateState>>,
}

impl WriteGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `commit` unless the gate was cancelled first.
    ///
    /// Returns [`Error::Unavailable`] without calling `commit` when the
    /// store has already given up on this write.
    pub fn commit<T>(&self, commit: impl FnOnce() -> Result<T>) -> Result<T> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state == GateState::Cancelled {
            return Err(Error::unavailable("write abandoned after its deadline"));
        }
        let result = commit()?;
        *state = GateState::Committed;
        Ok(result)
    }

    /// Abandon the write. `false` means it already committed.
    pub fn cancel(&self) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match *state {
            GateState::Committed => false,
            GateState::Open | GateState::Cancelled => {
                *state = GateState::Cancelled;
                true
            }
        }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) == GateState::Cancelled
    }
}

/// Persistence primitives the zone store builds on.
///
/// Backends own durability and the spatial index; they do not validate.
/// Every method that returns several zones returns them in insertion order.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Short backend name for logs and health output.
    fn name(&self) -> &'static str;

    /// Cheap reachability check.
    async fn ping(&self) -> Result<()>;

    /// Persist a zone and its index entry atomically.
    ///
    /// The commit must go through `gate`, so a cancelled insert leaves no record.
    async fn insert(&self, zone: StoredZone, gate: WriteGate) -> Result<()>;

    /// Every stored zone.
    async fn all(&self) -> Result<Vec<Zone>>;

    async fn get(&self, id: ZoneId) -> Result<Option<Zone>>;

    /// Remove a zone and its index entry, returning the removed record.
    ///
    /// The removal must commit through `gate`.
    async fn remove(&self, id: ZoneId, gate: WriteGate) -> Result<Option<Zone>>;

    /// Zones whose stored bounds intersect `bbox` (boundaries touching count).
    ///
    /// This is the index primitive: it may return a superset of what a query
    /// finally matches, but never omit a zone whose bounds intersect.
    async fn candidates(&self, bbox: BoundingBox) -> Result<Vec<Zone>>;
}
