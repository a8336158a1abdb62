//! Multi-source price aggregator.
//!
//! Orchestrates one adapter chain per token: tries providers in
//! canonical order starting from the last one that succeeded, retries
//! transient failures with linear backoff, tracks freshness and
//! exposes a consistent ready snapshot to callers. Owns its state as
//! an instance so several independent aggregators can coexist under
//! test.

use crate::config::PricerConfig;
use crate::error::PriceError;
use crate::feed::PriceFeed;
use crate::heartbeat::Heartbeat;
use crate::snapshot::PriceSnapshot;
use crate::store::SnapshotStore;
use crate::tokens::{TokenInfo, TokenRegistry};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

/// The price aggregator.
pub struct Pricer {
    tokens: Arc<TokenRegistry>,
    /// Adapter chain in canonical order.
    feeds: Vec<Arc<dyn PriceFeed>>,
    store: Arc<dyn SnapshotStore>,
    /// Index into `feeds` of the last adapter that succeeded per
    /// token. Cleared only by process restart.
    method_pins: DashMap<String, usize>,
    /// Tokens whose outer retry budget ran out. Fatal per token; the
    /// caller decides whether the process can continue.
    exhausted: DashMap<String, u32>,
    heartbeat: Option<Heartbeat>,
    config: PricerConfig,
}

impl std::fmt::Debug for Pricer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pricer")
            .field("token_count", &self.tokens.len())
            .field("feeds", &self.feeds.iter().map(|f| f.name()).collect::<Vec<_>>())
            .field("pinned", &self.method_pins.len())
            .finish()
    }
}

impl Pricer {
    pub fn new(
        tokens: Arc<TokenRegistry>,
        feeds: Vec<Arc<dyn PriceFeed>>,
        store: Arc<dyn SnapshotStore>,
        config: PricerConfig,
    ) -> Self {
        let heartbeat = config.heartbeat_url.clone().map(Heartbeat::new);
        Self {
            tokens,
            feeds,
            store,
            method_pins: DashMap::new(),
            exhausted: DashMap::new(),
            heartbeat,
            config,
        }
    }

    pub fn tokens(&self) -> &TokenRegistry {
        &self.tokens
    }

    pub fn config(&self) -> &PricerConfig {
        &self.config
    }

    /// Begin periodic refresh: one immediate cycle, then one per
    /// configured interval.
    ///
    /// Ticks are spawned without awaiting the previous tick, so a
    /// token still draining its retry budget never delays the
    /// schedule. That overlap is safe: snapshot writes are per-token
    /// and timestamp-ordered.
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let pricer = Arc::clone(self);
        info!(
            token_count = pricer.tokens.len(),
            interval_secs = pricer.config.refresh_interval_secs,
            "Starting price refresh loop"
        );
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(pricer.config.refresh_interval());
            loop {
                ticker.tick().await;
                let tick = Arc::clone(&pricer);
                tokio::spawn(async move {
                    if let Err(err) = tick.refresh_all().await {
                        error!(error = %err, "Refresh cycle ended with a token-fatal failure");
                    }
                });
            }
        })
    }

    /// Run one refresh cycle across all tokens concurrently.
    ///
    /// A slow or failing token never blocks the others. Returns the
    /// first token-level fatal error, if any, so embedding contexts
    /// can decide whether to abort.
    pub async fn refresh_all(self: &Arc<Self>) -> Result<(), PriceError> {
        let mut tasks = JoinSet::new();
        for token in self.tokens.iter() {
            let pricer = Arc::clone(self);
            let token = token.clone();
            tasks.spawn(async move { pricer.refresh_token(&token).await });
        }

        let mut fatal: Option<PriceError> = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    error!(error = %err, "Token refresh failed permanently");
                    fatal.get_or_insert(err);
                }
                Err(err) => {
                    error!(error = %err, "Token refresh task panicked");
                }
            }
        }

        if self.is_ready().await {
            if let Some(heartbeat) = &self.heartbeat {
                heartbeat.beat().await;
            }
        }

        match fatal {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Refresh one token: the adapter chain inside a linear-backoff
    /// retry loop. Exhausting the budget is fatal for this token only.
    async fn refresh_token(&self, token: &TokenInfo) -> Result<(), PriceError> {
        for attempt in 1..=self.config.max_retries {
            match self.fetch_price(token).await {
                Ok(price) => {
                    let snapshot = PriceSnapshot::now(price);
                    // Publish failures must not interrupt the cycle.
                    if let Err(err) = self.store.write(&token.symbol, &snapshot).await {
                        warn!(symbol = %token.symbol, error = %err, "Failed to publish snapshot");
                    }
                    self.exhausted.remove(&token.symbol);
                    debug!(symbol = %token.symbol, price, "Fetched price");
                    return Ok(());
                }
                Err(err) => {
                    warn!(symbol = %token.symbol, attempt, error = %err, "Price fetch failed");
                    if attempt < self.config.max_retries {
                        tokio::time::sleep(self.config.retry_backoff(attempt)).await;
                    }
                }
            }
        }

        self.exhausted
            .insert(token.symbol.clone(), self.config.max_retries);
        Err(PriceError::Exhausted {
            symbol: token.symbol.clone(),
            attempts: self.config.max_retries,
        })
    }

    /// One pass through the adapter chain for `token`.
    async fn fetch_price(&self, token: &TokenInfo) -> anyhow::Result<f64> {
        // The stable reference asset is hard-pinned, no network call.
        if token.symbol == self.config.reference_symbol {
            return Ok(1.0);
        }

        let start = self
            .method_pins
            .get(&token.symbol)
            .map(|pin| *pin)
            .unwrap_or(0);

        if let Some(price) = self.try_chain(token, start).await {
            return Ok(price);
        }

        // A previously good provider can degrade permanently; walk the
        // chain once more from the canonical first adapter.
        if start > 0 {
            if let Some(price) = self.try_chain(token, 0).await {
                return Ok(price);
            }
        }

        anyhow::bail!(
            "all {} price feeds failed for {}",
            self.feeds.len(),
            token.symbol
        )
    }

    /// Try adapters strictly in sequence from `start`; each failure is
    /// swallowed and falls through to the next. The first success
    /// updates the token's method pin.
    async fn try_chain(&self, token: &TokenInfo, start: usize) -> Option<f64> {
        for (index, feed) in self.feeds.iter().enumerate().skip(start) {
            match feed.fetch_usd_price(token).await {
                Ok(price) if feed.validate_price(price) => {
                    debug!(symbol = %token.symbol, feed = feed.name(), price, "Feed returned price");
                    self.method_pins.insert(token.symbol.clone(), index);
                    return Some(price);
                }
                Ok(price) => {
                    warn!(symbol = %token.symbol, feed = feed.name(), price, "Feed returned invalid price");
                }
                Err(err) => {
                    warn!(symbol = %token.symbol, feed = feed.name(), error = %err, "Feed error, falling through");
                }
            }
        }
        None
    }

    /// `true` iff every registered token has a snapshot and none is
    /// stale. Pure read, no side effects on aggregator state.
    pub async fn is_ready(&self) -> bool {
        for token in self.tokens.iter() {
            match self.store.read(&token.symbol).await {
                Ok(Some(snapshot)) => {
                    if snapshot.is_stale(self.config.stale_after()) {
                        warn!(
                            symbol = %token.symbol,
                            age_secs = snapshot.age().as_secs(),
                            "Snapshot is stale"
                        );
                        return false;
                    }
                }
                Ok(None) => return false,
                Err(err) => {
                    warn!(symbol = %token.symbol, error = %err, "Snapshot read failed in readiness check");
                    return false;
                }
            }
        }
        true
    }

    /// Suspend until every token is fresh, polling on the configured
    /// interval.
    ///
    /// Returns early with the underlying fatal error when any token
    /// has exhausted its retry budget (a ready state is no longer
    /// achievable) and with [`PriceError::ReadyTimeout`] when the
    /// caller-imposed `timeout` lapses. `None` waits indefinitely.
    pub async fn wait_until_ready(&self, timeout: Option<Duration>) -> Result<(), PriceError> {
        let deadline = timeout.map(|t| tokio::time::Instant::now() + t);
        loop {
            if let Some(entry) = self.exhausted.iter().next() {
                return Err(PriceError::Exhausted {
                    symbol: entry.key().clone(),
                    attempts: *entry.value(),
                });
            }
            if self.is_ready().await {
                info!("Price feed ready");
                return Ok(());
            }
            if let Some(deadline) = deadline {
                if tokio::time::Instant::now() >= deadline {
                    return Err(PriceError::ReadyTimeout);
                }
            }
            debug!("Waiting for price feed to initialise");
            tokio::time::sleep(self.config.ready_poll_interval()).await;
        }
    }

    /// Current snapshot for `symbol`, as an owned copy.
    pub async fn get_price(&self, symbol: &str) -> Result<PriceSnapshot, PriceError> {
        let snapshot = self
            .store
            .read(symbol)
            .await?
            .ok_or_else(|| PriceError::NotFound {
                symbol: symbol.to_string(),
            })?;

        if snapshot.is_stale(self.config.stale_after()) {
            return Err(PriceError::Stale {
                symbol: symbol.to_string(),
                age_ms: (Utc::now() - snapshot.timestamp).num_milliseconds(),
            });
        }

        Ok(snapshot)
    }

    /// Staleness of a raw timestamp under this aggregator's threshold.
    pub fn is_stale(&self, timestamp: DateTime<Utc>) -> bool {
        crate::snapshot::is_stale(timestamp, self.config.stale_after())
    }

    /// Name of the pinned adapter for `symbol`, if any.
    pub fn method_pin(&self, symbol: &str) -> Option<&'static str> {
        let index = *self.method_pins.get(symbol)?;
        self.feeds.get(index).map(|feed| feed.name())
    }

    /// Tokens whose retry budget is exhausted.
    pub fn failed_tokens(&self) -> Vec<String> {
        self.exhausted.iter().map(|e| e.key().clone()).collect()
    }
}
