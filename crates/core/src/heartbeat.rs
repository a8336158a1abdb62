//! Liveness heartbeat ping.

use tracing::{debug, warn};

/// Fires a GET against a configured URL once per refresh tick, but
/// only while every tracked token is simultaneously fresh. Delivery
/// failures are logged and never interrupt the fetch cycle.
#[derive(Debug, Clone)]
pub struct Heartbeat {
    client: reqwest::Client,
    url: String,
}

impl Heartbeat {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Send one beat.
    pub async fn beat(&self) {
        match self.client.get(&self.url).send().await {
            Ok(response) if response.status().is_success() => {
                debug!(url = %self.url, "Heartbeat sent");
            }
            Ok(response) => {
                warn!(url = %self.url, status = %response.status(), "Heartbeat rejected");
            }
            Err(err) => {
                warn!(url = %self.url, error = %err, "Heartbeat failed");
            }
        }
    }
}
