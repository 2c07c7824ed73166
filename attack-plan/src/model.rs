//! Plan document types
//!
//! A plan file names one or more plans; each plan is a list of request steps
//! that are fired in order as one chain.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanFile {
    #[serde(default)]
    pub api_version: Option<String>,
    #[serde(default)]
    pub config: PlanConfig,
    #[serde(default)]
    pub target_plan: Vec<Plan>,
}

impl PlanFile {
    /// Worker count requested by the plan, if any.
    pub fn workers(&self) -> Option<u64> {
        self.config
            .workers
            .and_then(|workers| u64::try_from(workers).ok())
            .filter(|workers| *workers > 0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanConfig {
    #[serde(default)]
    pub workers: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub targets: Vec<TargetSetup>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetSetup {
    /// Accepted for compatibility, not executed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_run: Option<serde_json::Value>,
    #[serde(default)]
    pub run: RequestConfig,
    /// Accepted for compatibility, not executed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_run: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestConfig {
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub headers: BTreeMap<String, HeaderScalar>,
    /// Serialized to JSON as the request body.
    #[serde(default)]
    pub body: Option<serde_json::Value>,
    /// Accepted for compatibility, not used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

/// A header value as written in the plan: YAML lets bare numbers and
/// booleans through where a string is meant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HeaderScalar {
    Text(String),
    Number(serde_json::Number),
    Bool(bool),
}

impl fmt::Display for HeaderScalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeaderScalar::Text(text) => f.write_str(text),
            HeaderScalar::Number(number) => write!(f, "{}", number),
            HeaderScalar::Bool(flag) => write!(f, "{}", flag),
        }
    }
}
