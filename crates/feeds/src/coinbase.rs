//! Coinbase spot price adapter.

use anyhow::{Context, Result};
use async_trait::async_trait;
use pricefeed_core::{PriceFeed, TokenInfo};
use serde::Deserialize;
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://api.coinbase.com";

/// Quote-API price source: `GET /v2/prices/{SYMBOL}-USD/buy`.
#[derive(Debug, Clone)]
pub struct CoinbaseFeed {
    client: reqwest::Client,
    base_url: String,
}

impl CoinbaseFeed {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

impl Default for CoinbaseFeed {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PriceFeed for CoinbaseFeed {
    fn name(&self) -> &'static str {
        "coinbase"
    }

    async fn fetch_usd_price(&self, token: &TokenInfo) -> Result<f64> {
        let url = format!("{}/v2/prices/{}-USD/buy", self.base_url, token.symbol);
        let response = self.client.get(&url).send().await?.error_for_status()?;
        let body: BuyPriceResponse = response.json().await?;

        let price = body
            .data
            .amount
            .parse::<f64>()
            .with_context(|| format!("non-numeric amount for {}", token.symbol))?;
        debug!(symbol = %token.symbol, price, "Coinbase buy price");
        Ok(price)
    }
}

/// `GET /v2/prices/{pair}/buy` response.
#[derive(Debug, Deserialize)]
struct BuyPriceResponse {
    data: BuyPrice,
}

#[derive(Debug, Deserialize)]
struct BuyPrice {
    /// Price as a decimal string
    amount: String,
    #[serde(default)]
    base: Option<String>,
    #[serde(default)]
    currency: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_buy_price() {
        // Actual response shape of the Coinbase prices endpoint
        let json = r#"{"data":{"base":"STRK","currency":"USD","amount":"0.7423"}}"#;

        let parsed: BuyPriceResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.data.amount.parse::<f64>().unwrap(), 0.7423);
        assert_eq!(parsed.data.base.as_deref(), Some("STRK"));
        assert_eq!(parsed.data.currency.as_deref(), Some("USD"));
    }

    #[test]
    fn test_deserialize_minimal_body() {
        let json = r#"{"data":{"amount":"1850.12"}}"#;
        let parsed: BuyPriceResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.data.amount, "1850.12");
    }
}
