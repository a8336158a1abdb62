//! HTTP price feed adapters for external providers.
//!
//! This crate provides one adapter per price source:
//! - Coinbase: spot quote API
//! - CoinMarketCap: aggregator index quotes
//! - Ekubo: on-chain DEX quoter (token -> USDC)
//!
//! Each adapter translates one token into a USD price or fails; the
//! aggregator in `pricefeed-core` owns ordering, pinning and retries.

mod coinbase;
mod coinmarketcap;
mod ekubo;

pub use coinbase::CoinbaseFeed;
pub use coinmarketcap::CoinMarketCapFeed;
pub use ekubo::EkuboFeed;

use pricefeed_core::PriceFeed;
use std::sync::Arc;

/// The canonical adapter chain, in the order the aggregator tries
/// them: quote API first, aggregator index second, DEX quoter last.
pub fn default_chain(coinmarketcap_key: impl Into<String>) -> Vec<Arc<dyn PriceFeed>> {
    vec![
        Arc::new(CoinbaseFeed::new()),
        Arc::new(CoinMarketCapFeed::new(coinmarketcap_key)),
        Arc::new(EkuboFeed::new()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_chain_order() {
        let chain = default_chain("test-key");
        let names: Vec<_> = chain.iter().map(|f| f.name()).collect();
        assert_eq!(names, ["coinbase", "coinmarketcap", "ekubo"]);
    }
}
