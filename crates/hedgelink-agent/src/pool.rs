//! Shared outbound HTTP client with connection pooling.
//!
//! One `reqwest::Client` serves every agent call so TCP connections are
//! reused across requests (the handshake to a cross-region VPS costs
//! 150-300 ms). The client is built lazily on first use and dropped on
//! `close()`; a later call rebuilds it, matching the create-if-closed
//! contract callers expect across a reload.

use std::sync::Mutex;
use std::time::Duration;

use tracing::info;

use crate::client::AgentCallError;

/// Time to establish a TCP/TLS connection.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Time to receive a response body.
pub const READ_TIMEOUT: Duration = Duration::from_secs(30);
/// Idle connections kept per agent host.
pub const MAX_IDLE_PER_HOST: usize = 50;
/// How long an idle connection stays pooled.
pub const KEEPALIVE: Duration = Duration::from_secs(30);
/// Per-call ceiling for trade, quote and refresh operations.
pub const TRADE_TIMEOUT: Duration = Duration::from_secs(30);

pub struct HttpPool {
    client: Mutex<Option<reqwest::Client>>,
}

impl HttpPool {
    pub fn new() -> Self {
        Self {
            client: Mutex::new(None),
        }
    }

    /// The shared client, built on first use. `reqwest::Client` is an `Arc`
    /// internally, so the returned handle is a cheap clone.
    pub fn get_client(&self) -> Result<reqwest::Client, AgentCallError> {
        let mut guard = self
            .client
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(client) = guard.as_ref() {
            return Ok(client.clone());
        }
        info!(
            max_idle = MAX_IDLE_PER_HOST,
            keepalive_secs = KEEPALIVE.as_secs(),
            "building pooled HTTP client"
        );
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .read_timeout(READ_TIMEOUT)
            .pool_max_idle_per_host(MAX_IDLE_PER_HOST)
            .pool_idle_timeout(KEEPALIVE)
            .build()
            .map_err(|e| AgentCallError::Internal(format!("building HTTP client: {e}")))?;
        *guard = Some(client.clone());
        Ok(client)
    }

    /// Drop the shared client, releasing pooled connections. The next
    /// `get_client` rebuilds from scratch.
    pub fn close(&self) {
        let mut guard = self
            .client
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if guard.take().is_some() {
            info!("HTTP client closed");
        }
    }
}

impl Default for HttpPool {
    fn default() -> Self {
        Self::new()
    }
}
