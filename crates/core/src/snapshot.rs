//! Price snapshot model and staleness checks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A token's observed USD price and the moment it was observed.
///
/// Price and timestamp always travel together; a snapshot is replaced
/// whole on every successful fetch, never partially updated. Readers
/// get owned copies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSnapshot {
    /// USD price, always positive.
    pub price: f64,
    /// When the price was observed (RFC-3339 on the wire).
    pub timestamp: DateTime<Utc>,
}

impl PriceSnapshot {
    /// Snapshot observed right now.
    pub fn now(price: f64) -> Self {
        Self {
            price,
            timestamp: Utc::now(),
        }
    }

    /// Snapshot with an explicit observation time.
    pub fn at(price: f64, timestamp: DateTime<Utc>) -> Self {
        Self { price, timestamp }
    }

    /// Age of this snapshot relative to the wall clock.
    pub fn age(&self) -> Duration {
        (Utc::now() - self.timestamp).to_std().unwrap_or_default()
    }

    /// Whether this snapshot is older than `stale_after`.
    pub fn is_stale(&self, stale_after: Duration) -> bool {
        is_stale(self.timestamp, stale_after)
    }
}

/// `true` iff `timestamp` is older than `stale_after`.
pub fn is_stale(timestamp: DateTime<Utc>, stale_after: Duration) -> bool {
    is_stale_at(timestamp, Utc::now(), stale_after)
}

/// Staleness against an explicit `now`, for testability.
pub fn is_stale_at(timestamp: DateTime<Utc>, now: DateTime<Utc>, stale_after: Duration) -> bool {
    now.signed_duration_since(timestamp).num_milliseconds() > stale_after.as_millis() as i64
}
