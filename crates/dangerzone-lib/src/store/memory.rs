//! In-process storage backend.
//!
//! Zones live in a sharded concurrent map, so writers only lock the shard that
//! holds their record and readers of other shards are never blocked. There is
//! no spatial index: candidate lookups scan stored bounds.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::Result;
use crate::geometry::BoundingBox;
use crate::store::backend::{StorageBackend, StoredZone, WriteGate};
use crate::zone::{Zone, ZoneId};

#[derive(Debug)]
struct Entry {
    seq: u64,
    stored: StoredZone,
}

/// Volatile backend used for development and tests.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    zones: DashMap<ZoneId, Entry>,
    next_seq: AtomicU64,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    fn collect_sorted<F>(&self, mut keep: F) -> Vec<Zone>
    where
        F: FnMut(&StoredZone) -> bool,
    {
        let mut hits: Vec<(u64, Zone)> = self
            .zones
            .iter()
            .filter(|entry| keep(&entry.stored))
            .map(|entry| (entry.seq, entry.stored.zone.clone()))
            .collect();
        hits.sort_by_key(|(seq, _)| *seq);
        hits.into_iter().map(|(_, zone)| zone).collect()
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn insert(&self, zone: StoredZone, gate: WriteGate) -> Result<()> {
        gate.commit(|| {
            let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
            self.zones.insert(zone.zone.id, Entry { seq, stored: zone });
            Ok(())
        })
    }

    async fn all(&self) -> Result<Vec<Zone>> {
        Ok(self.collect_sorted(|_| true))
    }

    async fn get(&self, id: ZoneId) -> Result<Option<Zone>> {
        Ok(self.zones.get(&id).map(|entry| entry.stored.zone.clone()))
    }

    async fn remove(&self, id: ZoneId, gate: WriteGate) -> Result<Option<Zone>> {
        gate.commit(|| Ok(self.zones.remove(&id).map(|(_, entry)| entry.stored.zone)))
    }

    async fn candidates(&self, bbox: BoundingBox) -> Result<Vec<Zone>> {
        Ok(self.collect_sorted(|stored| stored.bounds.intersects(&bbox)))
    }
}
