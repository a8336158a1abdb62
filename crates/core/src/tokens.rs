//! Token registry: the fixed set of tokens the feed is responsible for.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

/// A token to price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenInfo {
    /// Human-readable name (e.g. "Starknet Token")
    pub name: String,
    /// Symbol, unique within a registry (e.g. "STRK")
    pub symbol: String,
    /// Token contract address as a hex string
    pub address: String,
    /// Token decimals
    pub decimals: u8,
}

impl TokenInfo {
    pub fn new(
        name: impl Into<String>,
        symbol: impl Into<String>,
        address: impl Into<String>,
        decimals: u8,
    ) -> Self {
        Self {
            name: name.into(),
            symbol: symbol.into(),
            address: address.into(),
            decimals,
        }
    }
}

/// Immutable token set, fixed at construction.
#[derive(Debug, Clone, Default)]
pub struct TokenRegistry {
    tokens: Vec<TokenInfo>,
}

impl TokenRegistry {
    pub fn new(tokens: Vec<TokenInfo>) -> Self {
        Self { tokens }
    }

    pub fn get(&self, symbol: &str) -> Option<&TokenInfo> {
        self.tokens.iter().find(|t| t.symbol == symbol)
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.get(symbol).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TokenInfo> {
        self.tokens.iter()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn symbols(&self) -> Vec<&str> {
        self.tokens.iter().map(|t| t.symbol.as_str()).collect()
    }

    /// Load the verified token list from the AVNU token API.
    ///
    /// Only entries tagged both `AVNU` and `Verified` are kept, which
    /// excludes unvetted meme tokens.
    pub async fn fetch_verified(base_url: &str) -> Result<Self> {
        let url = format!("{}/v1/starknet/tokens", base_url);
        let response = reqwest::get(&url)
            .await
            .with_context(|| format!("fetching token list from {url}"))?
            .error_for_status()?;
        let data: TokenListResponse = response.json().await?;

        let tokens: Vec<TokenInfo> = data
            .content
            .into_iter()
            .filter(|t| t.is_verified())
            .map(|t| TokenInfo::new(t.name, t.symbol, t.address, t.decimals))
            .collect();

        info!(token_count = tokens.len(), "Loaded verified token list");
        Ok(Self::new(tokens))
    }
}

/// Default AVNU API base URL for [`TokenRegistry::fetch_verified`].
pub const AVNU_API_BASE_URL: &str = "https://starknet.api.avnu.fi";

/// Builtin Starknet mainnet tokens.
pub fn mainnet_tokens() -> Vec<TokenInfo> {
    vec![
        TokenInfo::new(
            "Ether",
            "ETH",
            "0x049d36570d4e46f48e99674bd3fcc84644ddd6b96f7c741b1562b82f9e004dc7",
            18,
        ),
        TokenInfo::new(
            "Starknet Token",
            "STRK",
            "0x04718f5a0fc34cc1af16a1cdee98ffb20c31f5cd61d6ab07201858f4287c938d",
            18,
        ),
        TokenInfo::new(
            "USD Coin",
            "USDC",
            "0x053c91253bc9682c04929ca02ed00b3e423f6710d2ee7e0d5ebb06f3ecf368a8",
            6,
        ),
        TokenInfo::new(
            "Tether USD",
            "USDT",
            "0x068f5c6a61780768455de69077e07e89787839bf8166decfbf92b645209c0fb8",
            6,
        ),
    ]
}

/// One entry of the AVNU token list response.
#[derive(Debug, Deserialize)]
struct TokenListEntry {
    name: String,
    symbol: String,
    address: String,
    decimals: u8,
    #[serde(default)]
    tags: Vec<String>,
}

impl TokenListEntry {
    fn is_verified(&self) -> bool {
        self.tags.iter().any(|t| t == "AVNU") && self.tags.iter().any(|t| t == "Verified")
    }
}

#[derive(Debug, Deserialize)]
struct TokenListResponse {
    content: Vec<TokenListEntry>,
}
