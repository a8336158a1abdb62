//! Multi-source price feed service.
//!
//! Continuously refreshes USD prices for a fixed token set from
//! several independent providers, tracks freshness, and serves a
//! consistent ready snapshot. With `REDIS_URL` set, snapshots are
//! mirrored through Redis so one fetch process can serve many reader
//! processes.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use pricefeed_core::{
    mainnet_tokens, MemoryStore, Pricer, PricerConfig, RedisStore, SnapshotStore, TokenRegistry,
};
use pricefeed_feeds::default_chain;

/// Environment variable names.
mod env {
    pub const REDIS_URL: &str = "REDIS_URL";
    pub const COINMARKETCAP_KEY: &str = "COINMARKETCAP_KEY";
    pub const READY_TIMEOUT_SECS: &str = "READY_TIMEOUT_SECS";
}

#[tokio::main]
async fn main() -> Result<()> {
    print_banner();

    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("info,pricefeed_core=debug,pricefeed_feeds=debug")
        }))
        .init();

    let config = PricerConfig::from_env();
    config.log_config();

    let tokens = Arc::new(TokenRegistry::new(mainnet_tokens()));
    info!(
        token_count = tokens.len(),
        symbols = ?tokens.symbols(),
        "Token registry loaded"
    );

    let api_key = std::env::var(env::COINMARKETCAP_KEY).unwrap_or_else(|_| {
        warn!("COINMARKETCAP_KEY not set, the index adapter will be rejected");
        String::new()
    });
    let feeds = default_chain(api_key);

    // With a Redis URL the store doubles as a shared mirror; reader
    // processes serve get_price from the same keys.
    let mut redis_store: Option<Arc<RedisStore>> = None;
    let store: Arc<dyn SnapshotStore> = match std::env::var(env::REDIS_URL) {
        Ok(url) => {
            let shared = Arc::new(RedisStore::new(url));
            if let Err(err) = shared.connect().await {
                warn!(error = %err, "Redis connect failed, reconnecting on the next publish");
            }
            redis_store = Some(shared.clone());
            shared
        }
        Err(_) => Arc::new(MemoryStore::new()),
    };

    let pricer = Arc::new(Pricer::new(tokens, feeds, store, config));
    let refresh_handle = pricer.start();

    let ready_timeout = std::env::var(env::READY_TIMEOUT_SECS)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .map(Duration::from_secs);
    pricer.wait_until_ready(ready_timeout).await?;

    for token in pricer.tokens().iter() {
        let snapshot = pricer.get_price(&token.symbol).await?;
        info!(symbol = %token.symbol, price = snapshot.price, "Initial price");
    }

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    refresh_handle.abort();
    if let Some(shared) = redis_store {
        shared.close().await;
    }

    Ok(())
}

/// Print startup banner.
fn print_banner() {
    println!(
        r#"
    ╔═╗┬─┐┬┌─┐┌─┐  ╔═╗┌─┐┌─┐┌┬┐
    ╠═╝├┬┘││  ├┤   ╠╣ ├┤ ├┤  ││
    ╩  ┴└─┴└─┘└─┘  ╚  └─┘└─┘─┴┘
    Price Feed Service v0.1.0
    "#
    );
}
