//! ciflow - validate CI workflow definitions and turn them into executable job plans

pub mod cli;
pub mod core;
pub mod error;
pub mod execution;
pub mod plan;
pub mod settings;
pub mod validation;

// Re-export commonly used types
pub use crate::core::{ExecutionStatus, Guard, ParseError, RunState, WorkflowDocument};
pub use error::{load_plan, load_plan_with, WorkflowError};
pub use execution::{ExecutionEngine, ExecutionEvent, RunReport, SchedulingStrategy, StepRunner};
pub use plan::{build_plan, CycleError, ExecutionPlan, PlanBuilder};
pub use settings::ToolSettings;
pub use validation::{validate, ActionRegistry, ValidatedWorkflow, ValidationReport, Validator};
