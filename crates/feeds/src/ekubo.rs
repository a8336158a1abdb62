//! Ekubo quoter adapter (decentralized-exchange-quote source).
//!
//! Quotes the token into USDC through the Ekubo quoter API:
//! `GET /{amount}/{token_address}/{usdc_address}`. Sub-dust probes can
//! round to a zero quote, so a zero output re-probes with a 100x
//! larger amount before the adapter gives up.

use anyhow::Result;
use async_trait::async_trait;
use pricefeed_core::{PriceFeed, TokenInfo};
use serde::Deserialize;
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://quoter-mainnet-api.ekubo.org";

/// USDC on Starknet mainnet, the quote side of every probe.
const USDC_ADDRESS: &str = "0x053c91253bc9682c04929ca02ed00b3e423f6710d2ee7e0d5ebb06f3ecf368a8";
const QUOTE_DECIMALS: i32 = 6;

/// Inner retry budget for zero quotes, distinct from the aggregator's
/// outer retry loop.
const ZERO_QUOTE_RETRIES: u32 = 3;
const PROBE_MULTIPLIER: u64 = 100;

/// DEX quoter price source.
#[derive(Debug, Clone)]
pub struct EkuboFeed {
    client: reqwest::Client,
    base_url: String,
    quote_token: String,
}

impl EkuboFeed {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            quote_token: USDC_ADDRESS.to_string(),
        }
    }
}

impl Default for EkuboFeed {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PriceFeed for EkuboFeed {
    fn name(&self) -> &'static str {
        "ekubo"
    }

    async fn fetch_usd_price(&self, token: &TokenInfo) -> Result<f64> {
        let mut units = 1u64;
        for attempt in 0..=ZERO_QUOTE_RETRIES {
            let amount = probe_amount(units, token.decimals);
            let url = format!(
                "{}/{}/{}/{}",
                self.base_url, amount, token.address, self.quote_token
            );
            let response = self.client.get(&url).send().await?.error_for_status()?;
            let body: QuoteResponse = response.json().await?;

            debug!(
                symbol = %token.symbol,
                units,
                output = body.total_calculated,
                attempt,
                "Ekubo quote"
            );

            if body.total_calculated == 0.0 {
                if attempt < ZERO_QUOTE_RETRIES {
                    // Sub-dust quote; bump the probe size.
                    units = PROBE_MULTIPLIER;
                    continue;
                }
                anyhow::bail!(
                    "zero quote for {} after {} probes",
                    token.symbol,
                    attempt + 1
                );
            }

            return Ok(price_per_unit(body.total_calculated, units));
        }

        anyhow::bail!("zero quote for {}", token.symbol)
    }
}

/// Probe size in wei for `units` whole tokens.
fn probe_amount(units: u64, decimals: u8) -> u128 {
    units as u128 * 10u128.pow(decimals as u32)
}

/// USD price of one token unit implied by a raw USDC-wei quote.
fn price_per_unit(total_calculated: f64, units: u64) -> f64 {
    (total_calculated / 10f64.powi(QUOTE_DECIMALS)) / units as f64
}

/// Quoter API response; `total_calculated` is the USDC output in its
/// smallest unit, sometimes serialized as a string.
#[derive(Debug, Deserialize)]
struct QuoteResponse {
    #[serde(deserialize_with = "deserialize_f64_from_string")]
    total_calculated: f64,
}

fn deserialize_f64_from_string<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrNumber {
        String(String),
        Number(f64),
    }

    match StringOrNumber::deserialize(deserializer)? {
        StringOrNumber::String(s) => s.parse().map_err(serde::de::Error::custom),
        StringOrNumber::Number(n) => Ok(n),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned JSON body per request, recording the request
    /// paths so tests can assert the probe amounts.
    async fn serve_quotes(bodies: Vec<&'static str>) -> (String, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let paths = Arc::new(Mutex::new(Vec::new()));

        let recorded = paths.clone();
        tokio::spawn(async move {
            for body in bodies {
                let (mut stream, _) = listener.accept().await.unwrap();
                let mut buf = vec![0u8; 2048];
                let n = stream.read(&mut buf).await.unwrap();

                let request = String::from_utf8_lossy(&buf[..n]).to_string();
                let path = request
                    .split_whitespace()
                    .nth(1)
                    .unwrap_or_default()
                    .to_string();
                recorded.lock().unwrap().push(path);

                let response = format!(
                    "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                stream.write_all(response.as_bytes()).await.unwrap();
            }
        });

        (base_url, paths)
    }

    fn strk() -> TokenInfo {
        TokenInfo::new(
            "Starknet Token",
            "STRK",
            "0x04718f5a0fc34cc1af16a1cdee98ffb20c31f5cd61d6ab07201858f4287c938d",
            18,
        )
    }

    #[tokio::test]
    async fn test_zero_quote_reprobes_and_divides_by_probe_size() {
        // first probe rounds to zero, the bumped 100-unit probe quotes
        // 742.3 USDC; the reported price must be per single unit
        let (base_url, paths) = serve_quotes(vec![
            r#"{"total_calculated":"0"}"#,
            r#"{"total_calculated":"742300000"}"#,
        ])
        .await;

        let feed = EkuboFeed::with_base_url(base_url);
        let price = feed.fetch_usd_price(&strk()).await.unwrap();
        assert!((price - 7.423).abs() < 1e-9);

        let paths = paths.lock().unwrap();
        assert_eq!(paths.len(), 2);
        assert!(paths[0].starts_with("/1000000000000000000/"));
        assert!(paths[1].starts_with("/100000000000000000000/"));
    }

    #[tokio::test]
    async fn test_all_zero_quotes_error() {
        let zero = r#"{"total_calculated":"0"}"#;
        let (base_url, paths) = serve_quotes(vec![zero; 4]).await;

        let feed = EkuboFeed::with_base_url(base_url);
        let err = feed.fetch_usd_price(&strk()).await.unwrap_err();
        assert!(err.to_string().contains("zero quote"));
        assert_eq!(paths.lock().unwrap().len(), 4);
    }

    #[test]
    fn test_probe_amount() {
        assert_eq!(probe_amount(1, 18), 1_000_000_000_000_000_000);
        assert_eq!(probe_amount(100, 6), 100_000_000);
    }

    #[test]
    fn test_price_per_unit_divides_by_probe_size() {
        // 742.3 USDC out for a 100-unit probe -> 7.423 per unit
        assert!((price_per_unit(742_300_000.0, 100) - 7.423).abs() < 1e-9);
        // 0.74 USDC out for a single unit
        assert!((price_per_unit(740_000.0, 1) - 0.74).abs() < 1e-9);
    }

    #[test]
    fn test_deserialize_quote_string_or_number() {
        let from_string: QuoteResponse =
            serde_json::from_str(r#"{"total_calculated":"742300000"}"#).unwrap();
        assert_eq!(from_string.total_calculated, 742_300_000.0);

        let from_number: QuoteResponse =
            serde_json::from_str(r#"{"total_calculated":742300000}"#).unwrap();
        assert_eq!(from_number.total_calculated, 742_300_000.0);
    }
}
