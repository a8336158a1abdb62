//! Price feed core logic.
//!
//! This crate provides the multi-source price oracle:
//! - Token registry (fixed set of tokens to price)
//! - Price aggregator with per-token method pinning, retry/backoff
//!   and staleness tracking
//! - Snapshot stores (in-memory, Redis-mirrored)
//! - Heartbeat liveness signal
//! - Typed errors consumers must handle (no silent default price)
//!
//! Provider adapters live in `pricefeed-feeds`; the aggregator only
//! sees them through the [`PriceFeed`] trait.

mod config;
mod error;
mod feed;
mod heartbeat;
mod pricer;
mod snapshot;
pub mod store;
mod tokens;

pub use config::PricerConfig;
pub use error::PriceError;
pub use feed::PriceFeed;
pub use heartbeat::Heartbeat;
pub use pricer::Pricer;
pub use snapshot::{is_stale, is_stale_at, PriceSnapshot};
pub use store::{snapshot_key, MemoryStore, RedisStore, SnapshotStore};
pub use tokens::{mainnet_tokens, TokenInfo, TokenRegistry, AVNU_API_BASE_URL};
