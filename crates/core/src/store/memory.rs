//! In-memory snapshot store.

use super::SnapshotStore;
use crate::error::PriceError;
use crate::snapshot::PriceSnapshot;
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// Process-local snapshot map. Writes are per-entry, so concurrent
/// per-token refreshes never contend on a whole-map lock.
#[derive(Debug, Default)]
pub struct MemoryStore {
    snapshots: DashMap<String, PriceSnapshot>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

#[async_trait]
impl SnapshotStore for MemoryStore {
    async fn read(&self, symbol: &str) -> Result<Option<PriceSnapshot>, PriceError> {
        Ok(self.snapshots.get(symbol).map(|entry| entry.clone()))
    }

    async fn write(&self, symbol: &str, snapshot: &PriceSnapshot) -> Result<(), PriceError> {
        // Overlapping ticks can deliver an older observation after a
        // newer one; a token's timestamp must never move backwards.
        match self.snapshots.entry(symbol.to_string()) {
            Entry::Occupied(existing) if existing.get().timestamp > snapshot.timestamp => {}
            Entry::Occupied(mut existing) => {
                existing.insert(snapshot.clone());
            }
            Entry::Vacant(vacant) => {
                vacant.insert(snapshot.clone());
            }
        }
        Ok(())
    }
}
