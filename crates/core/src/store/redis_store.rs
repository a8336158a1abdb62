//! Redis-backed snapshot store.
//!
//! Mirrors every computed snapshot under `Price:{SYMBOL}` as a JSON
//! `{price, timestamp}` payload. The mirror is eventually consistent:
//! writers are best-effort and there is no transactional guarantee
//! between processes.
//!
//! The multiplexed connection does not heal itself, so operations dial
//! on demand: an empty connection slot (startup connect failed, or a
//! command error dropped the link) is refilled on the next read or
//! write once the backend is reachable again.

use super::{snapshot_key, SnapshotStore};
use crate::error::PriceError;
use crate::snapshot::PriceSnapshot;
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Snapshot store over a shared Redis backend.
pub struct RedisStore {
    url: String,
    connection: RwLock<Option<MultiplexedConnection>>,
    closed: AtomicBool,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore").field("url", &self.url).finish()
    }
}

impl RedisStore {
    /// Create an unconnected store. [`RedisStore::connect`] dials
    /// eagerly; otherwise the first read or write dials on demand.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            connection: RwLock::new(None),
            closed: AtomicBool::new(false),
        }
    }

    /// Establish the backend connection and verify it with a PING.
    pub async fn connect(&self) -> Result<(), PriceError> {
        let connection = self.dial().await?;
        self.closed.store(false, Ordering::SeqCst);
        *self.connection.write().await = Some(connection);
        Ok(())
    }

    /// Release the backend connection and stop redialing. Safe to call
    /// when never connected, and again after a previous close.
    pub async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        if self.connection.write().await.take().is_some() {
            info!("Redis snapshot store closed");
        }
    }

    pub async fn is_connected(&self) -> bool {
        self.connection.read().await.is_some()
    }

    async fn dial(&self) -> Result<MultiplexedConnection, PriceError> {
        let client = redis::Client::open(self.url.as_str())?;
        let connection = client.get_multiplexed_async_connection().await?;

        let mut probe = connection.clone();
        let _: String = redis::cmd("PING").query_async(&mut probe).await?;

        info!(url = %self.url, "Connected to Redis snapshot store");
        Ok(connection)
    }

    /// Current connection, dialing if the slot is empty.
    async fn connection(&self) -> Result<MultiplexedConnection, PriceError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(PriceError::BackendNotConnected);
        }
        if let Some(connection) = self.connection.read().await.clone() {
            return Ok(connection);
        }

        let mut slot = self.connection.write().await;
        // another caller may have dialed while we waited for the lock
        if let Some(connection) = slot.as_ref() {
            return Ok(connection.clone());
        }
        let connection = self.dial().await?;
        *slot = Some(connection.clone());
        Ok(connection)
    }

    /// Drop a connection that just failed a command so the next
    /// operation redials.
    async fn discard(&self, err: redis::RedisError) -> PriceError {
        self.connection.write().await.take();
        warn!(error = %err, "Redis command failed, dropping the connection");
        PriceError::Backend(err)
    }
}

#[async_trait]
impl SnapshotStore for RedisStore {
    async fn read(&self, symbol: &str) -> Result<Option<PriceSnapshot>, PriceError> {
        let mut conn = self.connection().await?;
        let raw: Option<String> = match conn.get(snapshot_key(symbol)).await {
            Ok(raw) => raw,
            Err(err) => return Err(self.discard(err).await),
        };

        let Some(raw) = raw else {
            return Ok(None);
        };
        debug!(symbol, payload = %raw, "Read snapshot from Redis");

        let snapshot = serde_json::from_str(&raw).map_err(|source| PriceError::Codec {
            symbol: symbol.to_string(),
            source,
        })?;
        Ok(Some(snapshot))
    }

    async fn write(&self, symbol: &str, snapshot: &PriceSnapshot) -> Result<(), PriceError> {
        let mut conn = self.connection().await?;
        let payload = serde_json::to_string(snapshot).map_err(|source| PriceError::Codec {
            symbol: symbol.to_string(),
            source,
        })?;

        match conn.set(snapshot_key(symbol), payload).await {
            Ok(()) => Ok(()),
            Err(err) => Err(self.discard(err).await),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Minimal RESP responder: answers PING, stores SET payloads,
    /// serves them back on GET. One client connection.
    async fn serve_resp(listener: TcpListener) {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut values: HashMap<String, String> = HashMap::new();
        let mut buf = vec![0u8; 4096];

        loop {
            let n = match stream.read(&mut buf).await {
                Ok(0) | Err(_) => return,
                Ok(n) => n,
            };
            // commands arrive as RESP arrays; the argument values are
            // the lines that carry neither a '*' nor a '$' prefix
            let frame = String::from_utf8_lossy(&buf[..n]);
            let args: Vec<&str> = frame
                .split("\r\n")
                .filter(|line| !line.is_empty() && !line.starts_with('*') && !line.starts_with('$'))
                .collect();

            let reply = match args.as_slice() {
                ["PING"] => "+PONG\r\n".to_string(),
                ["SET", key, value] => {
                    values.insert(key.to_string(), value.to_string());
                    "+OK\r\n".to_string()
                }
                ["GET", key] => match values.get(*key) {
                    Some(value) => format!("${}\r\n{}\r\n", value.len(), value),
                    None => "$-1\r\n".to_string(),
                },
                other => panic!("unexpected command: {other:?}"),
            };
            stream.write_all(reply.as_bytes()).await.unwrap();
        }
    }

    async fn bound_listener() -> (TcpListener, String) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("redis://{}", listener.local_addr().unwrap());
        (listener, url)
    }

    #[tokio::test]
    async fn test_write_dials_on_demand() {
        let (listener, url) = bound_listener().await;
        tokio::spawn(serve_resp(listener));

        let store = RedisStore::new(url);
        assert!(!store.is_connected().await);

        store.write("STRK", &PriceSnapshot::now(0.74)).await.unwrap();
        assert!(store.is_connected().await);

        let snapshot = store.read("STRK").await.unwrap().unwrap();
        assert_eq!(snapshot.price, 0.74);
    }

    #[tokio::test]
    async fn test_write_succeeds_after_backend_comes_back() {
        // reserve a port, then bring the backend up only after the
        // startup connect has already failed against it
        let (listener, url) = bound_listener().await;
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let store = RedisStore::new(url);
        let err = store.connect().await.unwrap_err();
        assert!(matches!(err, PriceError::Backend(_)));

        let err = store
            .write("STRK", &PriceSnapshot::now(0.74))
            .await
            .unwrap_err();
        assert!(matches!(err, PriceError::Backend(_)));

        let listener = TcpListener::bind(addr).await.unwrap();
        tokio::spawn(serve_resp(listener));

        store.write("STRK", &PriceSnapshot::now(0.74)).await.unwrap();
        assert!(store.is_connected().await);
    }

    #[tokio::test]
    async fn test_unreachable_backend_reports_backend_error() {
        let (listener, url) = bound_listener().await;
        drop(listener);

        let store = RedisStore::new(url);
        let err = store.read("STRK").await.unwrap_err();
        assert!(matches!(err, PriceError::Backend(_)));
    }

    #[tokio::test]
    async fn test_closed_store_does_not_redial() {
        let (listener, url) = bound_listener().await;
        tokio::spawn(serve_resp(listener));

        let store = RedisStore::new(url);
        store.connect().await.unwrap();
        store.close().await;
        store.close().await;
        assert!(!store.is_connected().await);

        let err = store
            .write("STRK", &PriceSnapshot::now(0.74))
            .await
            .unwrap_err();
        assert!(matches!(err, PriceError::BackendNotConnected));
    }

    #[test]
    fn test_wire_payload_shape() {
        // The mirrored value is plain JSON other processes can parse.
        let timestamp: chrono::DateTime<chrono::Utc> = "2025-08-01T12:00:00.123Z".parse().unwrap();
        let snapshot = PriceSnapshot::at(0.7423, timestamp);

        let payload = serde_json::to_string(&snapshot).unwrap();
        assert!(payload.contains("\"price\":0.7423"));
        assert!(payload.contains("2025-08-01T12:00:00.123Z"));

        let round_tripped: PriceSnapshot = serde_json::from_str(&payload).unwrap();
        assert_eq!(round_tripped, snapshot);
    }
}
