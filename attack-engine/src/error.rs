//! Error types for the attack engine

use thiserror::Error;

/// Main error type for attack engine operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AttackError {
    #[error("no targets to attack")]
    NoTargets,

    #[error("invalid target: {reason}")]
    InvalidTarget { reason: String },

    #[error("invalid rate {value:?}: {reason}")]
    InvalidRate { value: String, reason: String },

    #[error("invalid duration {value:?}: {reason}")]
    InvalidDuration { value: String, reason: String },

    #[error("configuration error: {component} - {reason}")]
    ConfigurationError { component: String, reason: String },

    #[error("failed to build request: {details}")]
    RequestBuild { details: String },

    #[error("{details}")]
    NetworkError { details: String },

    #[error("{operation} timed out after {duration_ms}ms")]
    Timeout { operation: String, duration_ms: u64 },

    #[error("failed to read response body: {details}")]
    BodyRead { details: String },

    #[error("{status}")]
    Status { status: String },
}

impl AttackError {
    /// Create a configuration error
    pub fn configuration(component: &str, reason: &str) -> Self {
        Self::ConfigurationError {
            component: component.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn invalid_rate(value: &str, reason: &str) -> Self {
        Self::InvalidRate {
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn invalid_duration(value: &str, reason: &str) -> Self {
        Self::InvalidDuration {
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Map a transport failure onto the per-request taxonomy.
    pub fn from_transport(error: &reqwest::Error, timeout: std::time::Duration) -> Self {
        if error.is_timeout() {
            AttackError::Timeout {
                operation: "request".to_string(),
                duration_ms: timeout.as_millis() as u64,
            }
        } else if error.is_builder() {
            AttackError::RequestBuild {
                details: error.to_string(),
            }
        } else if error.is_body() || error.is_decode() {
            AttackError::BodyRead {
                details: error.to_string(),
            }
        } else {
            AttackError::NetworkError {
                details: error.to_string(),
            }
        }
    }

    /// Get error category for grouping and filtering
    pub fn category(&self) -> ErrorCategory {
        match self {
            AttackError::NoTargets => ErrorCategory::Targeting,
            AttackError::InvalidTarget { .. } => ErrorCategory::Targeting,

            AttackError::InvalidRate { .. } => ErrorCategory::Configuration,
            AttackError::InvalidDuration { .. } => ErrorCategory::Configuration,
            AttackError::ConfigurationError { .. } => ErrorCategory::Configuration,

            AttackError::RequestBuild { .. } => ErrorCategory::Request,
            AttackError::NetworkError { .. } => ErrorCategory::Request,
            AttackError::Timeout { .. } => ErrorCategory::Request,
            AttackError::BodyRead { .. } => ErrorCategory::Request,

            AttackError::Status { .. } => ErrorCategory::Status,
        }
    }

    /// Whether this error terminates the whole attack rather than a single hit.
    ///
    /// Only targeter failures escalate; everything raised while executing a
    /// chain is recorded on its result and the attack carries on.
    pub fn ends_attack(&self) -> bool {
        self.category() == ErrorCategory::Targeting
    }
}

/// Error categories for grouping and filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Rejected before any traffic is sent
    Configuration,
    /// The targeter could not supply a chain
    Targeting,
    /// Building, sending or reading a single request failed
    Request,
    /// The server answered outside `[200, 400)`
    Status,
}

/// Result type for attack engine operations
pub type AttackResult<T> = Result<T, AttackError>;
