//! Aggregator configuration with per-field serde defaults.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

/// Configuration for the price aggregator.
///
/// Every field has a default so partial TOML files work; an empty
/// config is the production profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricerConfig {
    /// Seconds between refresh ticks.
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,

    /// Maximum snapshot age before it must not be used.
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,

    /// Poll interval for `wait_until_ready`, in milliseconds.
    #[serde(default = "default_ready_poll_interval_ms")]
    pub ready_poll_interval_ms: u64,

    /// Outer retry budget per token per cycle.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Linear backoff step between outer retries, in seconds.
    #[serde(default = "default_retry_backoff_secs")]
    pub retry_backoff_secs: u64,

    /// Stable reference asset hard-pinned to 1.0 USD, no network call.
    #[serde(default = "default_reference_symbol")]
    pub reference_symbol: String,

    /// Liveness ping fired when every token is simultaneously fresh.
    #[serde(default)]
    pub heartbeat_url: Option<String>,
}

fn default_refresh_interval_secs() -> u64 {
    30
}

fn default_stale_after_secs() -> u64 {
    60
}

fn default_ready_poll_interval_ms() -> u64 {
    1_000
}

fn default_max_retries() -> u32 {
    10
}

fn default_retry_backoff_secs() -> u64 {
    2
}

fn default_reference_symbol() -> String {
    "USDT".to_string()
}

impl Default for PricerConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: default_refresh_interval_secs(),
            stale_after_secs: default_stale_after_secs(),
            ready_poll_interval_ms: default_ready_poll_interval_ms(),
            max_retries: default_max_retries(),
            retry_backoff_secs: default_retry_backoff_secs(),
            reference_symbol: default_reference_symbol(),
            heartbeat_url: None,
        }
    }
}

impl PricerConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_secs)
    }

    pub fn ready_poll_interval(&self) -> Duration {
        Duration::from_millis(self.ready_poll_interval_ms)
    }

    /// Backoff before the next outer retry: `attempt * step`.
    pub fn retry_backoff(&self, attempt: u32) -> Duration {
        Duration::from_secs(self.retry_backoff_secs * attempt as u64)
    }

    /// Load from a TOML file; missing fields fall back to defaults.
    pub fn from_toml_file(path: &str) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }

    /// Build from the environment.
    ///
    /// `PRICER_CONFIG` selects a TOML file (defaults apply when unset
    /// or unreadable); `HEARTBEAT_URL` overrides the heartbeat target.
    pub fn from_env() -> Self {
        let mut config = match std::env::var("PRICER_CONFIG") {
            Ok(path) => Self::from_toml_file(&path).unwrap_or_else(|err| {
                warn!(path = %path, error = %err, "Failed to load config file, using defaults");
                Self::default()
            }),
            Err(_) => Self::default(),
        };

        if let Ok(url) = std::env::var("HEARTBEAT_URL") {
            config.heartbeat_url = Some(url);
        }

        config
    }

    /// Log the effective configuration at startup.
    pub fn log_config(&self) {
        info!(
            refresh_interval_secs = self.refresh_interval_secs,
            stale_after_secs = self.stale_after_secs,
            max_retries = self.max_retries,
            retry_backoff_secs = self.retry_backoff_secs,
            reference_symbol = %self.reference_symbol,
            heartbeat = self.heartbeat_url.is_some(),
            "Pricer configuration"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PricerConfig::default();
        assert_eq!(config.refresh_interval(), Duration::from_secs(30));
        assert_eq!(config.stale_after(), Duration::from_secs(60));
        assert_eq!(config.max_retries, 10);
        assert_eq!(config.reference_symbol, "USDT");
        assert!(config.heartbeat_url.is_none());
    }

    #[test]
    fn test_linear_backoff() {
        let config = PricerConfig::default();
        assert_eq!(config.retry_backoff(1), Duration::from_secs(2));
        assert_eq!(config.retry_backoff(5), Duration::from_secs(10));
    }

    #[test]
    fn test_partial_toml() {
        let config: PricerConfig = toml::from_str(
            r#"
            stale_after_secs = 120
            heartbeat_url = "https://hb.example.com/ping"
            "#,
        )
        .unwrap();

        assert_eq!(config.stale_after_secs, 120);
        assert_eq!(
            config.heartbeat_url.as_deref(),
            Some("https://hb.example.com/ping")
        );
        // untouched fields keep defaults
        assert_eq!(config.refresh_interval_secs, 30);
        assert_eq!(config.max_retries, 10);
    }
}
