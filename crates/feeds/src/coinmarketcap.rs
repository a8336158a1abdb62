//! CoinMarketCap quotes adapter (aggregator-index source).

use anyhow::{Context, Result};
use async_trait::async_trait;
use pricefeed_core::{PriceFeed, TokenInfo};
use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://pro-api.coinmarketcap.com";
const API_KEY_HEADER: &str = "X-CMC_PRO_API_KEY";

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "COINMARKETCAP_KEY";

/// Aggregator-index price source:
/// `GET /v1/cryptocurrency/quotes/latest?symbol={SYMBOL}`.
#[derive(Clone)]
pub struct CoinMarketCapFeed {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl std::fmt::Debug for CoinMarketCapFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // api_key deliberately omitted
        f.debug_struct("CoinMarketCapFeed")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl CoinMarketCapFeed {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    /// Build from the `COINMARKETCAP_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var(API_KEY_ENV)
            .with_context(|| format!("missing env var: {API_KEY_ENV}"))?;
        Ok(Self::new(api_key))
    }
}

#[async_trait]
impl PriceFeed for CoinMarketCapFeed {
    fn name(&self) -> &'static str {
        "coinmarketcap"
    }

    async fn fetch_usd_price(&self, token: &TokenInfo) -> Result<f64> {
        let url = format!("{}/v1/cryptocurrency/quotes/latest", self.base_url);
        let response = self
            .client
            .get(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .query(&[("symbol", token.symbol.as_str())])
            .send()
            .await?
            .error_for_status()?;

        let body: QuotesResponse = response.json().await?;
        let entry = body
            .data
            .get(&token.symbol)
            .with_context(|| format!("no quote returned for {}", token.symbol))?;

        let price = entry.quote.usd.price;
        debug!(symbol = %token.symbol, price, "CoinMarketCap quote");
        Ok(price)
    }
}

/// `quotes/latest` response, keyed by requested symbol.
#[derive(Debug, Deserialize)]
struct QuotesResponse {
    data: HashMap<String, TokenQuote>,
}

#[derive(Debug, Deserialize)]
struct TokenQuote {
    quote: QuoteCurrencies,
}

#[derive(Debug, Deserialize)]
struct QuoteCurrencies {
    #[serde(rename = "USD")]
    usd: UsdQuote,
}

#[derive(Debug, Deserialize)]
struct UsdQuote {
    price: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_quotes() {
        // Trimmed quotes/latest response
        let json = r#"{
            "status": {"error_code": 0},
            "data": {
                "STRK": {
                    "id": 22691,
                    "symbol": "STRK",
                    "quote": {
                        "USD": {
                            "price": 0.7312,
                            "volume_24h": 12345678.0,
                            "market_cap": 987654321.0
                        }
                    }
                }
            }
        }"#;

        let parsed: QuotesResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.data["STRK"].quote.usd.price, 0.7312);
    }

    #[test]
    fn test_debug_omits_api_key() {
        let feed = CoinMarketCapFeed::new("sekret");
        let rendered = format!("{feed:?}");
        assert!(!rendered.contains("sekret"));
    }
}
