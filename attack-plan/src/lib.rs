//! Attack plan documents
//!
//! Loads YAML or JSON plan files and turns every named plan into a
//! [`attack_engine::TargetChain`] whose steps run in declaration order.

pub mod error;
pub mod loader;
pub mod model;

pub use error::{PlanError, PlanResult};
pub use loader::{load_plan, parse_plan, PlanFormat};
pub use model::{HeaderScalar, Plan, PlanConfig, PlanFile, RequestConfig, TargetSetup};
