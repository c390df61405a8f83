//! Execution state models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Overall status of a plan walk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStatus {
    /// Walk has not started
    Pending,
    /// Walk is in progress
    Running,
    /// Every job succeeded or was skipped
    Completed,
    /// At least one job failed
    Failed,
}

/// Rejected state transition
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot move from {from} to {to}")]
pub struct TransitionError {
    pub from: &'static str,
    pub to: &'static str,
}

/// State of a job or a step: `Pending -> Running -> {Succeeded, Failed, Skipped}`.
/// A pending node may also go straight to `Skipped`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunState {
    /// Waiting for predecessors
    Pending,
    /// Currently running
    Running { started_at: DateTime<Utc> },
    /// Finished successfully
    Succeeded {
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
    },
    /// Finished with an error
    Failed {
        error: String,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
    },
    /// Never ran, e.g. its guard evaluated false
    Skipped { reason: String },
}

impl RunState {
    pub fn name(&self) -> &'static str {
        match self {
            RunState::Pending => "pending",
            RunState::Running { .. } => "running",
            RunState::Succeeded { .. } => "succeeded",
            RunState::Failed { .. } => "failed",
            RunState::Skipped { .. } => "skipped",
        }
    }

    /// Check if the state is terminal
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunState::Succeeded { .. } | RunState::Failed { .. } | RunState::Skipped { .. }
        )
    }

    pub fn is_succeeded(&self) -> bool {
        matches!(self, RunState::Succeeded { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, RunState::Failed { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, RunState::Skipped { .. })
    }

    pub fn start(&mut self) -> Result<(), TransitionError> {
        match self {
            RunState::Pending => {
                *self = RunState::Running {
                    started_at: Utc::now(),
                };
                Ok(())
            }
            other => Err(TransitionError {
                from: other.name(),
                to: "running",
            }),
        }
    }

    pub fn succeed(&mut self) -> Result<(), TransitionError> {
        match self {
            RunState::Running { started_at } => {
                let started_at = *started_at;
                *self = RunState::Succeeded {
                    started_at,
                    finished_at: Utc::now(),
                };
                Ok(())
            }
            other => Err(TransitionError {
                from: other.name(),
                to: "succeeded",
            }),
        }
    }

    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), TransitionError> {
        match self {
            RunState::Running { started_at } => {
                let started_at = *started_at;
                *self = RunState::Failed {
                    error: error.into(),
                    started_at,
                    finished_at: Utc::now(),
                };
                Ok(())
            }
            other => Err(TransitionError {
                from: other.name(),
                to: "failed",
            }),
        }
    }

    pub fn skip(&mut self, reason: impl Into<String>) -> Result<(), TransitionError> {
        match self {
            RunState::Pending => {
                *self = RunState::Skipped {
                    reason: reason.into(),
                };
                Ok(())
            }
            other => Err(TransitionError {
                from: other.name(),
                to: "skipped",
            }),
        }
    }
}

/// Bookkeeping for one plan walk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// Unique run ID
    pub run_id: Uuid,

    pub status: ExecutionStatus,

    pub started_at: Option<DateTime<Utc>>,

    pub finished_at: Option<DateTime<Utc>>,

    pub total_jobs: usize,

    pub succeeded_jobs: usize,

    pub failed_jobs: usize,

    pub skipped_jobs: usize,
}

impl RunSummary {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            status: ExecutionStatus::Pending,
            started_at: None,
            finished_at: None,
            total_jobs: 0,
            succeeded_jobs: 0,
            failed_jobs: 0,
            skipped_jobs: 0,
        }
    }

    /// Mark the walk as started
    pub fn start(&mut self, total_jobs: usize) {
        self.status = ExecutionStatus::Running;
        self.started_at = Some(Utc::now());
        self.total_jobs = total_jobs;
    }

    /// Record a job's terminal state
    pub fn record(&mut self, state: &RunState) {
        match state {
            RunState::Succeeded { .. } => self.succeeded_jobs += 1,
            RunState::Failed { .. } => self.failed_jobs += 1,
            RunState::Skipped { .. } => self.skipped_jobs += 1,
            _ => {}
        }
    }

    /// Close the walk; the status follows from the recorded counts
    pub fn finish(&mut self) {
        self.status = if self.failed_jobs > 0 {
            ExecutionStatus::Failed
        } else {
            ExecutionStatus::Completed
        };
        self.finished_at = Some(Utc::now());
    }

    /// Calculate progress (0.0 to 1.0)
    pub fn progress(&self) -> f64 {
        if self.total_jobs == 0 {
            return 0.0;
        }
        (self.succeeded_jobs + self.failed_jobs + self.skipped_jobs) as f64
            / self.total_jobs as f64
    }
}

impl Default for RunSummary {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_is_terminal() {
        assert!(!RunState::Pending.is_terminal());
        assert!(!RunState::Running {
            started_at: Utc::now()
        }
        .is_terminal());
        assert!(RunState::Skipped {
            reason: "test".to_string()
        }
        .is_terminal());
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut state = RunState::Pending;
        state.start().unwrap();
        assert_eq!(state.name(), "running");
        state.succeed().unwrap();
        assert!(state.is_succeeded());
    }

    #[test]
    fn test_failed_is_terminal() {
        let mut state = RunState::Pending;
        state.start().unwrap();
        state.fail("exit code 1").unwrap();
        assert!(state.is_failed());

        assert_eq!(
            state.start().unwrap_err(),
            TransitionError {
                from: "failed",
                to: "running"
            }
        );
        assert!(state.succeed().is_err());
        assert!(state.skip("late").is_err());
    }

    #[test]
    fn test_skip_only_from_pending() {
        let mut state = RunState::Pending;
        state.skip("guard is false").unwrap();
        assert!(state.is_skipped());

        let mut running = RunState::Pending;
        running.start().unwrap();
        assert!(running.skip("too late").is_err());
    }

    #[test]
    fn test_summary_progress_and_status() {
        let mut summary = RunSummary::new();
        summary.start(4);
        assert_eq!(summary.progress(), 0.0);

        let mut ok = RunState::Pending;
        ok.start().unwrap();
        ok.succeed().unwrap();
        summary.record(&ok);
        summary.record(&RunState::Skipped {
            reason: "x".to_string(),
        });
        assert_eq!(summary.progress(), 0.5);

        summary.finish();
        assert_eq!(summary.status, ExecutionStatus::Completed);

        let mut failed = RunState::Pending;
        failed.start().unwrap();
        failed.fail("boom").unwrap();
        summary.record(&failed);
        summary.finish();
        assert_eq!(summary.status, ExecutionStatus::Failed);
    }
}
