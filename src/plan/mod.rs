//! Execution plans
//!
//! A plan is the DAG handed to an executor: jobs linked by their `needs`
//! edges and layered into stages, each job holding its strictly ordered
//! steps with their guards.

pub mod builder;
pub mod graph;

pub use builder::{build_plan, PlanBuilder};
pub use graph::CycleError;

use crate::core::condition::{Guard, GuardTrigger};
use crate::core::step::{Setting, StepAction};
use crate::core::trigger::TriggerRule;
use indexmap::IndexMap;
use serde::Serialize;

/// Executable job plan
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionPlan {
    pub name: Option<String>,

    pub triggers: Vec<TriggerRule>,

    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub env: IndexMap<String, String>,

    /// Jobs in declaration order
    pub jobs: IndexMap<String, PlannedJob>,

    /// `needs` edges, from the needed job to the dependent job
    pub edges: Vec<JobEdge>,

    /// Jobs grouped so that every job only needs jobs of earlier stages
    pub stages: Vec<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobEdge {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedJob {
    pub id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    pub runner: String,

    pub needs: Vec<String>,

    pub guard: Guard,

    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub env: IndexMap<String, String>,

    pub continue_on_error: Setting<bool>,

    pub steps: Vec<PlannedStep>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedStep {
    /// Position within the job
    pub index: usize,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub label: String,

    pub action: StepAction,

    pub guard: Guard,

    /// Incoming edge from the previous step of the job
    pub edge: StepEdge,

    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub env: IndexMap<String, String>,

    pub continue_on_error: Setting<bool>,
}

/// Edge from the previous step. Steps of a job run in sequence; the kind
/// says which outcome of what ran before lets this step run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StepEdge {
    /// Index of the preceding step; `None` for the first step
    pub after: Option<usize>,
    pub kind: GuardTrigger,
}

impl ExecutionPlan {
    pub fn job(&self, id: &str) -> Option<&PlannedJob> {
        self.jobs.get(id)
    }

    pub fn job_names(&self) -> impl Iterator<Item = &str> {
        self.jobs.keys().map(String::as_str)
    }

    /// Jobs that need nothing
    pub fn roots(&self) -> Vec<&str> {
        self.jobs
            .values()
            .filter(|j| j.needs.is_empty())
            .map(|j| j.id.as_str())
            .collect()
    }

    /// Jobs that directly need `id`
    pub fn dependents(&self, id: &str) -> Vec<&str> {
        self.edges
            .iter()
            .filter(|e| e.from == id)
            .map(|e| e.to.as_str())
            .collect()
    }

    pub fn step_count(&self) -> usize {
        self.jobs.values().map(|j| j.steps.len()).sum()
    }
}
