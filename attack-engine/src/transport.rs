//! Shared HTTP transport: client construction and per-host connection limits

use crate::config::AttackerConfig;
use crate::error::{AttackError, AttackResult};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

const TCP_KEEPALIVE: Duration = Duration::from_secs(30);

/// Build the client every worker of an attacker shares.
pub fn build_client(config: &AttackerConfig) -> AttackResult<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .timeout(config.timeout)
        .redirect(if config.redirects == 0 {
            reqwest::redirect::Policy::none()
        } else {
            reqwest::redirect::Policy::limited(config.redirects)
        });

    builder = if config.keepalive {
        builder
            .pool_max_idle_per_host(config.connections)
            .tcp_keepalive(TCP_KEEPALIVE)
    } else {
        builder.pool_max_idle_per_host(0).tcp_keepalive(None)
    };

    // Binding to the unspecified address would pin the address family.
    if !config.local_addr.is_unspecified() {
        builder = builder.local_address(config.local_addr);
    }

    debug!(
        connections = config.connections,
        keepalive = config.keepalive,
        local_addr = %config.local_addr,
        timeout_ms = config.timeout.as_millis() as u64,
        "Building HTTP client"
    );

    builder
        .build()
        .map_err(|e| AttackError::configuration("http client", &e.to_string()))
}

/// Caps concurrent requests per destination (`host:port`).
#[derive(Debug, Clone)]
pub struct ConnectionLimiter {
    max_per_host: usize,
    hosts: Arc<DashMap<String, Arc<Semaphore>>>,
}

impl ConnectionLimiter {
    /// `max_per_host == 0` disables limiting.
    pub fn new(max_per_host: usize) -> Self {
        Self {
            max_per_host,
            hosts: Arc::new(DashMap::new()),
        }
    }

    pub fn is_unlimited(&self) -> bool {
        self.max_per_host == 0
    }

    /// Wait for a connection slot to `url`'s host. The slot is held until the
    /// returned permit is dropped.
    pub async fn acquire(&self, url: &reqwest::Url) -> Option<OwnedSemaphorePermit> {
        if self.is_unlimited() {
            return None;
        }
        let key = format!(
            "{}:{}",
            url.host_str().unwrap_or_default(),
            url.port_or_known_default().unwrap_or_default()
        );
        let semaphore = self
            .hosts
            .entry(key)
            .or_insert_with(|| Arc::new(Semaphore::new(self.max_per_host)))
            .clone();
        // The semaphore is never closed, so acquiring only fails if it were.
        semaphore.acquire_owned().await.ok()
    }
}
