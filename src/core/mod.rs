//! Core domain models
//!
//! This module defines the workflow document as loaded from YAML and the
//! building blocks shared by validation, planning and execution.

pub mod condition;
pub mod context;
pub mod document;
pub mod loader;
pub mod state;
pub mod step;
pub mod trigger;

pub use condition::{Guard, GuardTrigger};
pub use context::GuardContext;
pub use document::{JobDefinition, RunsOn, StepDefinition, TriggerSpec, WorkflowDocument};
pub use loader::ParseError;
pub use state::{ExecutionStatus, RunState, RunSummary};
pub use step::{ActionKind, ActionRef, StepAction, StepParams};
pub use trigger::{EventKind, TriggerRule};
