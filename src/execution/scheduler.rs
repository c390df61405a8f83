//! Execution scheduler - determines which jobs to start next

use crate::core::RunState;
use crate::plan::ExecutionPlan;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Strategy for scheduling job execution
///
/// In settings files this is `sequential`, `parallel` or
/// `{ limited_parallel: N }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "StrategyRepr", into = "StrategyRepr")]
pub enum SchedulingStrategy {
    /// One job at a time, in declaration order
    Sequential,

    /// Every ready job at once
    #[default]
    Parallel,

    /// At most N jobs at once
    LimitedParallel(usize),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum StrategyRepr {
    Name(String),
    Limited { limited_parallel: usize },
}

impl TryFrom<StrategyRepr> for SchedulingStrategy {
    type Error = String;

    fn try_from(repr: StrategyRepr) -> Result<Self, Self::Error> {
        match repr {
            StrategyRepr::Name(name) => match name.as_str() {
                "sequential" => Ok(Self::Sequential),
                "parallel" => Ok(Self::Parallel),
                other => Err(format!(
                    "unknown strategy `{}`, expected `sequential`, `parallel` or `limited_parallel: N`",
                    other
                )),
            },
            StrategyRepr::Limited { limited_parallel } => Ok(Self::LimitedParallel(limited_parallel)),
        }
    }
}

impl From<SchedulingStrategy> for StrategyRepr {
    fn from(strategy: SchedulingStrategy) -> Self {
        match strategy {
            SchedulingStrategy::Sequential => Self::Name("sequential".to_string()),
            SchedulingStrategy::Parallel => Self::Name("parallel".to_string()),
            SchedulingStrategy::LimitedParallel(n) => Self::Limited { limited_parallel: n },
        }
    }
}

/// What a job failure does to jobs that have not started yet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Independent jobs keep going
    #[default]
    Continue,
    /// Jobs not yet started are skipped
    FailFast,
}

/// Scheduler for determining which jobs to run
#[derive(Debug, Clone)]
pub struct ExecutionScheduler {
    strategy: SchedulingStrategy,
}

impl ExecutionScheduler {
    pub fn new(strategy: SchedulingStrategy) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> SchedulingStrategy {
        self.strategy
    }

    fn capacity(&self, running: usize) -> usize {
        match self.strategy {
            SchedulingStrategy::Sequential => 1usize.saturating_sub(running),
            SchedulingStrategy::Parallel => usize::MAX,
            SchedulingStrategy::LimitedParallel(max) => max.max(1).saturating_sub(running),
        }
    }

    /// Pending jobs whose needs are all terminal, in declaration order,
    /// capped by how many more jobs the strategy lets run
    pub fn next_jobs(
        &self,
        plan: &ExecutionPlan,
        states: &IndexMap<String, RunState>,
        running: usize,
    ) -> Vec<String> {
        let capacity = self.capacity(running);
        if capacity == 0 {
            return vec![];
        }

        plan.jobs
            .values()
            .filter(|job| matches!(states.get(&job.id), Some(RunState::Pending)))
            .filter(|job| {
                job.needs
                    .iter()
                    .all(|need| states.get(need).is_some_and(RunState::is_terminal))
            })
            .take(capacity)
            .map(|job| job.id.clone())
            .collect()
    }
}
