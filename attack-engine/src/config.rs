//! Attacker configuration

use crate::error::{AttackError, AttackResult};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

pub const DEFAULT_WORKERS: u64 = 10;
pub const DEFAULT_MAX_WORKERS: u64 = u64::MAX;
pub const DEFAULT_CONNECTIONS: usize = 10_000;
pub const DEFAULT_MAX_CONNECTIONS: usize = 0;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_REDIRECTS: usize = 10;
pub const DEFAULT_EXTRACT_FIELD: &str = "id";

/// Settings applied once when an [`crate::Attacker`] is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttackerConfig {
    /// Workers spawned when an attack starts
    pub workers: u64,
    /// Hard ceiling the pool may grow to under saturation
    pub max_workers: u64,
    /// Idle connections kept per destination host
    pub connections: usize,
    /// Concurrent connections per destination host, 0 for no limit
    pub max_connections: usize,
    /// Reuse connections between requests
    pub keepalive: bool,
    /// Local address outgoing connections bind to
    pub local_addr: IpAddr,
    /// Overall timeout of one request, body included
    pub timeout: Duration,
    /// Redirects followed per request, 0 to never follow
    pub redirects: usize,
    /// JSON field of a response body carried into the next step's URL
    pub extract_field: String,
}

impl Default for AttackerConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            max_workers: DEFAULT_MAX_WORKERS,
            connections: DEFAULT_CONNECTIONS,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            keepalive: true,
            local_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            timeout: DEFAULT_TIMEOUT,
            redirects: DEFAULT_REDIRECTS,
            extract_field: DEFAULT_EXTRACT_FIELD.to_string(),
        }
    }
}

impl AttackerConfig {
    /// Set the number of workers spawned at start.
    pub fn with_workers(mut self, workers: u64) -> Self {
        self.workers = workers;
        self
    }

    /// Set the ceiling the pool may grow to.
    pub fn with_max_workers(mut self, max_workers: u64) -> Self {
        self.max_workers = max_workers;
        self
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Workers actually spawned at start: never above the ceiling.
    pub fn initial_workers(&self) -> u64 {
        self.workers.min(self.max_workers)
    }

    /// Reject settings the attacker cannot run with.
    pub fn validate(&self) -> AttackResult<()> {
        if self.max_workers == 0 {
            return Err(AttackError::configuration("attacker", "max_workers must be at least 1"));
        }
        if self.timeout.is_zero() {
            return Err(AttackError::configuration("attacker", "timeout must be positive"));
        }
        if self.extract_field.trim().is_empty() {
            return Err(AttackError::configuration("attacker", "extract_field must not be empty"));
        }
        Ok(())
    }
}
