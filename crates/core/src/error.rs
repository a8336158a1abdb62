//! Typed errors surfaced to price consumers.

use thiserror::Error;

/// Errors raised by the price aggregator and snapshot stores.
///
/// Callers must treat [`PriceError::Stale`] exactly like
/// [`PriceError::NotFound`]: the value behind it cannot be acted on.
/// There is no silent default price.
#[derive(Debug, Error)]
pub enum PriceError {
    /// No snapshot exists for the symbol.
    #[error("price of {symbol} not found")]
    NotFound { symbol: String },

    /// A snapshot exists but its age exceeds the staleness threshold.
    #[error("price of {symbol} is stale ({age_ms} ms old)")]
    Stale { symbol: String, age_ms: i64 },

    /// Every adapter failed and the outer retry budget ran out.
    /// Fatal for this token only; other tokens keep updating.
    #[error("no price achievable for {symbol} after {attempts} attempts")]
    Exhausted { symbol: String, attempts: u32 },

    /// Shared cache backend failure, reported distinctly from staleness.
    #[error("cache backend error: {0}")]
    Backend(#[from] redis::RedisError),

    /// A backend operation was attempted after `close()`.
    #[error("cache backend not connected")]
    BackendNotConnected,

    /// A snapshot payload in the shared cache could not be decoded.
    #[error("malformed snapshot for {symbol}")]
    Codec {
        symbol: String,
        #[source]
        source: serde_json::Error,
    },

    /// The caller-imposed deadline on `wait_until_ready` lapsed.
    #[error("timed out waiting for the price feed to become ready")]
    ReadyTimeout,
}
