//! Snapshot stores: where computed prices live.
//!
//! The aggregator is composed over a [`SnapshotStore`] capability
//! instead of subclassing: [`MemoryStore`] keeps snapshots local to
//! the process, [`RedisStore`] mirrors them through a shared backend
//! so one fetch process can serve many reader processes.

mod memory;
mod redis_store;

pub use memory::MemoryStore;
pub use redis_store::RedisStore;

use crate::error::PriceError;
use crate::snapshot::PriceSnapshot;
use async_trait::async_trait;
use std::fmt::Debug;

/// Storage capability the aggregator publishes snapshots through and
/// serves `get_price` reads from.
#[async_trait]
pub trait SnapshotStore: Send + Sync + Debug {
    /// Current snapshot for `symbol`, if one has ever been published.
    async fn read(&self, symbol: &str) -> Result<Option<PriceSnapshot>, PriceError>;

    /// Publish a snapshot for `symbol`.
    async fn write(&self, symbol: &str, snapshot: &PriceSnapshot) -> Result<(), PriceError>;
}

/// Shared-cache key for a token's snapshot.
pub fn snapshot_key(symbol: &str) -> String {
    format!("Price:{symbol}")
}
