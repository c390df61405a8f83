//! Step runners: the seam between a plan and whatever executes it

use crate::plan::PlannedStep;
use async_trait::async_trait;
use indexmap::IndexMap;
use std::collections::HashSet;
use std::sync::Mutex;
use thiserror::Error;

/// Error types for runner operations
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("runner `{0}` is not available")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// What a runner knows about the job a step belongs to
#[derive(Debug, Clone)]
pub struct JobContext {
    pub job_id: String,

    /// Runner environment identifier, e.g. `ubuntu-latest`
    pub runner: String,

    /// Workflow env overlaid with job env
    pub env: IndexMap<String, String>,
}

/// Result of running one step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Success,
    Failure(String),
}

/// Trait for step execution - allows for different implementations
#[async_trait]
pub trait StepRunner: Send + Sync {
    async fn run_step(&self, job: &JobContext, step: &PlannedStep) -> Result<StepOutcome, RunnerError>;
}

/// Runner that succeeds every step without doing anything
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunRunner;

#[async_trait]
impl StepRunner for DryRunRunner {
    async fn run_step(&self, _job: &JobContext, _step: &PlannedStep) -> Result<StepOutcome, RunnerError> {
        Ok(StepOutcome::Success)
    }
}

/// Runner that fails a chosen set of steps and records every call
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    failures: HashSet<(String, usize)>,
    calls: Mutex<Vec<(String, usize)>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make step `index` of `job` fail
    pub fn fail_step(mut self, job: impl Into<String>, index: usize) -> Self {
        self.failures.insert((job.into(), index));
        self
    }

    /// Steps run so far, in call order
    pub fn calls(&self) -> Vec<(String, usize)> {
        match self.calls.lock() {
            Ok(calls) => calls.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl StepRunner for ScriptedRunner {
    async fn run_step(&self, job: &JobContext, step: &PlannedStep) -> Result<StepOutcome, RunnerError> {
        let key = (job.job_id.clone(), step.index);
        self.calls
            .lock()
            .map_err(|_| RunnerError::Internal("call log poisoned".to_string()))?
            .push(key.clone());

        if self.failures.contains(&key) {
            Ok(StepOutcome::Failure(format!("step `{}` failed", step.label)))
        } else {
            Ok(StepOutcome::Success)
        }
    }
}
