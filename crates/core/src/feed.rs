//! Price feed adapter trait.

use crate::tokens::TokenInfo;
use anyhow::Result;
use async_trait::async_trait;
use std::fmt::Debug;

/// A single external price-fetching strategy for one provider.
///
/// Implementations translate one token into a USD price or fail. The
/// aggregator owns ordering, method pinning and retries across
/// implementations, so adapters stay free of fallback logic.
#[async_trait]
pub trait PriceFeed: Send + Sync + Debug {
    /// Short identifier used in logs and method pins.
    fn name(&self) -> &'static str;

    /// Fetch the current USD price of `token`.
    async fn fetch_usd_price(&self, token: &TokenInfo) -> Result<f64>;

    /// Sanity-check a fetched price before the aggregator accepts it.
    fn validate_price(&self, price: f64) -> bool {
        price.is_finite() && price > 0.0
    }
}
