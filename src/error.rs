//! Top-level error and the load-validate-build pipeline

use crate::core::{ParseError, WorkflowDocument};
use crate::plan::{build_plan, CycleError, ExecutionPlan};
use crate::validation::{ActionRegistry, ValidationReport, Validator};
use thiserror::Error;

/// Any reason a document did not become a plan
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("{0}")]
    Schema(ValidationReport),

    #[error(transparent)]
    Cycle(#[from] CycleError),
}

impl From<ValidationReport> for WorkflowError {
    fn from(report: ValidationReport) -> Self {
        WorkflowError::Schema(report)
    }
}

pub type Result<T> = std::result::Result<T, WorkflowError>;

/// Parse, validate and plan a YAML document
pub fn load_plan(yaml: &str, registry: &ActionRegistry) -> Result<ExecutionPlan> {
    load_plan_with(yaml, registry, false)
}

/// Like `load_plan`, optionally treating warnings as errors
pub fn load_plan_with(yaml: &str, registry: &ActionRegistry, strict: bool) -> Result<ExecutionPlan> {
    let document = WorkflowDocument::from_yaml(yaml)?;
    let validated = Validator::new(registry).strict(strict).validate(&document)?;
    Ok(build_plan(&validated)?)
}
