//! Per-hit results and their aggregation

use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

/// Response headers, keyed by lowercase name, values in arrival order.
pub type Headers = BTreeMap<String, Vec<String>>;

/// Outcome of one chain traversal.
///
/// Method, URL, code, headers and body describe the last step attempted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HitResult {
    pub attack: String,
    pub seq: u64,
    pub code: u16,
    pub timestamp: DateTime<Utc>,
    #[serde(serialize_with = "as_nanos")]
    pub latency: Duration,
    pub bytes_out: u64,
    pub bytes_in: u64,
    #[serde(serialize_with = "as_string_or_empty")]
    pub error: Option<String>,
    #[serde(serialize_with = "as_base64")]
    pub body: Vec<u8>,
    pub method: String,
    pub url: String,
    pub headers: Headers,
}

impl HitResult {
    /// An empty result stamped with its place in the attack.
    pub fn new(attack: impl Into<String>, seq: u64, timestamp: DateTime<Utc>) -> Self {
        Self {
            attack: attack.into(),
            seq,
            code: 0,
            timestamp,
            latency: Duration::ZERO,
            bytes_out: 0,
            bytes_in: 0,
            error: None,
            body: Vec::new(),
            method: String::new(),
            url: String::new(),
            headers: Headers::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none() && (200..400).contains(&self.code)
    }

    /// Instant the last byte was recorded.
    pub fn end(&self) -> DateTime<Utc> {
        self.timestamp + chrono::Duration::from_std(self.latency).unwrap_or_else(|_| chrono::Duration::zero())
    }
}

fn as_nanos<S: Serializer>(latency: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(u64::try_from(latency.as_nanos()).unwrap_or(u64::MAX))
}

fn as_string_or_empty<S: Serializer>(error: &Option<String>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(error.as_deref().unwrap_or_default())
}

fn as_base64<S: Serializer>(body: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(body))
}

/// Running summary over the results of an attack.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AttackStatistics {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub bytes_in: u64,
    pub bytes_out: u64,
    #[serde(serialize_with = "as_nanos")]
    pub min_latency: Duration,
    #[serde(serialize_with = "as_nanos")]
    pub max_latency: Duration,
    #[serde(skip)]
    total_latency: Duration,
    pub status_code_distribution: HashMap<u16, u64>,
    pub error_distribution: HashMap<String, u64>,
}

impl AttackStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, result: &HitResult) {
        if self.total_requests == 0 || result.latency < self.min_latency {
            self.min_latency = result.latency;
        }
        self.max_latency = self.max_latency.max(result.latency);
        self.total_latency += result.latency;
        self.total_requests += 1;
        self.bytes_in += result.bytes_in;
        self.bytes_out += result.bytes_out;

        if result.is_success() {
            self.successful_requests += 1;
        } else {
            self.failed_requests += 1;
        }

        *self.status_code_distribution.entry(result.code).or_insert(0) += 1;
        if let Some(error) = &result.error {
            *self.error_distribution.entry(error.clone()).or_insert(0) += 1;
        }
    }

    /// Average latency over every recorded hit.
    pub fn mean_latency(&self) -> Duration {
        if self.total_requests == 0 {
            Duration::ZERO
        } else {
            let mean = self.total_latency.as_nanos() / u128::from(self.total_requests);
            Duration::from_nanos(u64::try_from(mean).unwrap_or(u64::MAX))
        }
    }

    /// Calculate success rate as percentage
    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            (self.successful_requests as f64 / self.total_requests as f64) * 100.0
        }
    }

    /// Get the most common status code
    pub fn most_common_status_code(&self) -> Option<u16> {
        self.status_code_distribution
            .iter()
            .max_by_key(|(code, count)| (**count, std::cmp::Reverse(**code)))
            .map(|(code, _)| *code)
    }

    /// Get the most common error
    pub fn most_common_error(&self) -> Option<&String> {
        self.error_distribution
            .iter()
            .max_by_key(|(_, count)| *count)
            .map(|(error, _)| error)
    }
}
