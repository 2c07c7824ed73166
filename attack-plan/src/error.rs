use thiserror::Error;

/// Why a plan document could not be turned into target chains.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("failed to read plan: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse YAML plan: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("failed to parse JSON plan: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown plan format {0:?}, expected yaml or json")]
    UnknownFormat(String),

    #[error("plan contains no target plans")]
    NoPlans,

    #[error("plan {plan:?} has no targets")]
    EmptyPlan { plan: String },

    #[error("plan {plan:?} step {step}: required method is missing")]
    MissingMethod { plan: String, step: usize },

    #[error("plan {plan:?} step {step}: invalid method {method:?}")]
    InvalidMethod { plan: String, step: usize, method: String },

    #[error("plan {plan:?} step {step}: required url is missing")]
    MissingUrl { plan: String, step: usize },

    #[error("plan {plan:?} step {step}: invalid header {name:?}: {reason}")]
    InvalidHeader {
        plan: String,
        step: usize,
        name: String,
        reason: String,
    },
}

pub type PlanResult<T> = Result<T, PlanError>;
