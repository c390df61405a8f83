//! Test utility functions for ciflow

#![allow(dead_code)]

use ciflow::core::{RunState, WorkflowDocument};
use ciflow::execution::{ExecutionEngine, FailurePolicy, RunReport, SchedulingStrategy, StepRunner};
use ciflow::plan::ExecutionPlan;
use ciflow::validation::{ActionRegistry, ValidationReport, Validator};
use ciflow::{load_plan, WorkflowError};
use std::path::PathBuf;

/// Read a YAML file from `tests/fixtures`
pub fn fixture(name: &str) -> String {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);
    std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("cannot read {}: {}", path.display(), e))
}

/// Load, validate and plan a document that is expected to be valid
pub fn plan_from_yaml(yaml: &str) -> ExecutionPlan {
    load_plan(yaml, &ActionRegistry::builtin()).unwrap_or_else(|e| panic!("expected a plan, got: {}", e))
}

/// Validate a document that is expected to be invalid
pub fn validation_errors(yaml: &str) -> ValidationReport {
    let document = WorkflowDocument::from_yaml(yaml).expect("document should parse");
    let registry = ActionRegistry::builtin();
    match Validator::new(&registry).validate(&document) {
        Ok(_) => panic!("expected validation to fail"),
        Err(report) => report,
    }
}

/// Plan a document and hand back whatever error stopped it
pub fn plan_error(yaml: &str) -> WorkflowError {
    match load_plan(yaml, &ActionRegistry::builtin()) {
        Ok(_) => panic!("expected planning to fail"),
        Err(e) => e,
    }
}

/// Walk a plan with the given runner
pub async fn simulate<R: StepRunner + 'static>(
    plan: &ExecutionPlan,
    runner: R,
    strategy: SchedulingStrategy,
    policy: FailurePolicy,
) -> RunReport {
    ExecutionEngine::new(runner, strategy)
        .failure_policy(policy)
        .execute(plan)
        .await
}

fn job_state<'a>(report: &'a RunReport, job: &str) -> &'a RunState {
    report
        .job_state(job)
        .unwrap_or_else(|| panic!("Job '{}' not found in report", job))
}

fn step_state<'a>(report: &'a RunReport, job: &str, index: usize) -> &'a RunState {
    report
        .step_state(job, index)
        .unwrap_or_else(|| panic!("Step {}.{} not found in report", job, index))
}

/// Assert a job ended in the named state
pub fn assert_job_state(report: &RunReport, job: &str, expected: &str) {
    let state = job_state(report, job);
    assert_eq!(
        state.name(),
        expected,
        "Job '{}' should be {}, but was in state: {:?}",
        job, expected, state
    );
}

/// Assert a step ended in the named state
pub fn assert_step_state(report: &RunReport, job: &str, index: usize, expected: &str) {
    let state = step_state(report, job, index);
    assert_eq!(
        state.name(),
        expected,
        "Step {}.{} should be {}, but was in state: {:?}",
        job, index, expected, state
    );
}

/// Assert a validation report has an error for `rule` at `path`
pub fn assert_error_at(report: &ValidationReport, path: &str, rule: &str) {
    assert!(
        report.errors_at(path).any(|e| e.rule == rule),
        "expected {} at {}, got:\n{}",
        rule, path, report
    );
}
