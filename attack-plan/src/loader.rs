//! Reading plan documents and turning them into target chains

use crate::error::{PlanError, PlanResult};
use crate::model::{Plan, PlanFile, RequestConfig};
use attack_engine::{Target, TargetChain};
use bytes::Bytes;
use reqwest::header::{HeaderName, HeaderValue};
use reqwest::Method;
use std::fmt;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PlanFormat {
    #[default]
    Yaml,
    Json,
}

impl PlanFormat {
    /// Guess the format from a file extension, defaulting to YAML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => PlanFormat::Json,
            _ => PlanFormat::Yaml,
        }
    }
}

impl FromStr for PlanFormat {
    type Err = PlanError;

    fn from_str(value: &str) -> PlanResult<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "yaml" | "yml" => Ok(PlanFormat::Yaml),
            "json" => Ok(PlanFormat::Json),
            _ => Err(PlanError::UnknownFormat(value.to_string())),
        }
    }
}

impl fmt::Display for PlanFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanFormat::Yaml => f.write_str("yaml"),
            PlanFormat::Json => f.write_str("json"),
        }
    }
}

/// Read a whole plan document from `reader`.
pub fn load_plan<R: Read>(mut reader: R, format: PlanFormat) -> PlanResult<PlanFile> {
    let mut raw = String::new();
    reader.read_to_string(&mut raw)?;
    parse_plan(&raw, format)
}

/// Parse a plan document already held in memory.
pub fn parse_plan(raw: &str, format: PlanFormat) -> PlanResult<PlanFile> {
    let plan: PlanFile = match format {
        PlanFormat::Yaml => serde_yaml::from_str(raw)?,
        PlanFormat::Json => serde_json::from_str(raw)?,
    };
    debug!(
        format = %format,
        plans = plan.target_plan.len(),
        api_version = plan.api_version.as_deref().unwrap_or_default(),
        "Parsed plan"
    );
    Ok(plan)
}

impl PlanFile {
    /// One chain per plan, steps in declaration order.
    pub fn chains(&self) -> PlanResult<Vec<TargetChain>> {
        if self.target_plan.is_empty() {
            return Err(PlanError::NoPlans);
        }
        self.target_plan.iter().map(Plan::chain).collect()
    }
}

impl Plan {
    pub fn chain(&self) -> PlanResult<TargetChain> {
        if self.targets.is_empty() {
            return Err(PlanError::EmptyPlan {
                plan: self.name.clone(),
            });
        }
        self.targets
            .iter()
            .enumerate()
            .map(|(step, setup)| setup.run.to_target(&self.name, step))
            .collect()
    }
}

impl RequestConfig {
    pub fn to_target(&self, plan: &str, step: usize) -> PlanResult<Target> {
        let method = self
            .method
            .as_deref()
            .map(str::trim)
            .filter(|method| !method.is_empty())
            .ok_or_else(|| PlanError::MissingMethod {
                plan: plan.to_string(),
                step,
            })?;
        let method =
            Method::from_bytes(method.to_ascii_uppercase().as_bytes()).map_err(|_| PlanError::InvalidMethod {
                plan: plan.to_string(),
                step,
                method: method.to_string(),
            })?;

        let url = self
            .url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or_else(|| PlanError::MissingUrl {
                plan: plan.to_string(),
                step,
            })?;

        let mut target = Target::new(method, url);

        for (name, value) in &self.headers {
            let invalid = |reason: String| PlanError::InvalidHeader {
                plan: plan.to_string(),
                step,
                name: name.clone(),
                reason,
            };
            let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| invalid(e.to_string()))?;
            let header_value = HeaderValue::from_str(&value.to_string()).map_err(|e| invalid(e.to_string()))?;
            target = target.with_header(header_name, header_value);
        }

        target.body = match &self.body {
            None | Some(serde_json::Value::Null) => Bytes::new(),
            Some(body) => Bytes::from(serde_json::to_vec(body)?),
        };

        Ok(target)
    }
}
