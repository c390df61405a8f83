//! Plan execution: walking a plan against a step runner

pub mod engine;
pub mod runner;
pub mod scheduler;

pub use engine::{EventHandler, ExecutionEngine, ExecutionEvent, JobReport, RunReport, StepReport};
pub use runner::{DryRunRunner, JobContext, RunnerError, ScriptedRunner, StepOutcome, StepRunner};
pub use scheduler::{ExecutionScheduler, FailurePolicy, SchedulingStrategy};
