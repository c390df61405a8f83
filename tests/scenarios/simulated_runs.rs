//! Test: simulated plan walks - guards, failure propagation and policies

use crate::helpers::*;
use ciflow::core::ExecutionStatus;
use ciflow::execution::{
    ExecutionEngine, ExecutionEvent, FailurePolicy, SchedulingStrategy, ScriptedRunner,
};
use std::sync::{Arc, Mutex};

/// A failure()-guarded step does not run when the step before it succeeded
#[tokio::test]
async fn test_failure_guard_skipped_after_success() {
    let plan = plan_from_yaml(&fixture("sample.yml"));
    let report = simulate(
        &plan,
        ScriptedRunner::new(),
        SchedulingStrategy::Sequential,
        FailurePolicy::Continue,
    )
    .await;

    assert_step_state(&report, "build", 3, "succeeded");
    assert_step_state(&report, "build", 4, "skipped");
}

/// The mail step runs once the test step fails, and the steps in between are skipped
#[tokio::test]
async fn test_failure_guard_runs_after_failure() {
    let plan = plan_from_yaml(&fixture("sample.yml"));
    let report = simulate(
        &plan,
        ScriptedRunner::new().fail_step("build", 2),
        SchedulingStrategy::Parallel,
        FailurePolicy::Continue,
    )
    .await;

    assert_step_state(&report, "build", 2, "failed");
    assert_step_state(&report, "build", 3, "skipped");
    assert_step_state(&report, "build", 4, "succeeded");
    assert_job_state(&report, "build", "failed");

    // Independent job is not cancelled
    assert_job_state(&report, "job2", "succeeded");
    assert_eq!(report.summary.status, ExecutionStatus::Failed);
}

#[tokio::test]
async fn test_fail_fast_stops_dependents_and_unstarted_jobs() {
    let plan = plan_from_yaml(
        r#"
on: push
jobs:
  build:
    runs-on: ubuntu-latest
    steps: [{ run: make }]
  docs:
    runs-on: ubuntu-latest
    steps: [{ run: make docs }]
  test:
    runs-on: ubuntu-latest
    needs: build
    steps: [{ run: make test }]
"#,
    );

    let report = simulate(
        &plan,
        ScriptedRunner::new().fail_step("build", 0),
        SchedulingStrategy::Sequential,
        FailurePolicy::FailFast,
    )
    .await;

    assert_job_state(&report, "build", "failed");
    assert_job_state(&report, "docs", "skipped");
    assert_job_state(&report, "test", "skipped");
    assert_step_state(&report, "docs", 0, "skipped");
    assert_step_state(&report, "test", 0, "skipped");
}

#[tokio::test]
async fn test_continue_policy_runs_independent_jobs() {
    let plan = plan_from_yaml(
        r#"
on: push
jobs:
  build:
    runs-on: ubuntu-latest
    steps: [{ run: make }]
  docs:
    runs-on: ubuntu-latest
    steps: [{ run: make docs }]
  test:
    runs-on: ubuntu-latest
    needs: build
    steps: [{ run: make test }]
"#,
    );

    let report = simulate(
        &plan,
        ScriptedRunner::new().fail_step("build", 0),
        SchedulingStrategy::Sequential,
        FailurePolicy::Continue,
    )
    .await;

    assert_job_state(&report, "docs", "succeeded");
    assert_job_state(&report, "test", "skipped");
    assert_step_state(&report, "test", 0, "skipped");
    assert_eq!(report.summary.succeeded_jobs, 1);
    assert_eq!(report.summary.failed_jobs, 1);
    assert_eq!(report.summary.skipped_jobs, 1);
}

#[tokio::test]
async fn test_job_continue_on_error_keeps_dependents() {
    let plan = plan_from_yaml(
        r#"
on: push
jobs:
  experimental:
    runs-on: ubuntu-latest
    continue-on-error: true
    steps: [{ run: make nightly }]
  after:
    runs-on: ubuntu-latest
    needs: experimental
    steps: [{ run: make }]
"#,
    );

    let report = simulate(
        &plan,
        ScriptedRunner::new().fail_step("experimental", 0),
        SchedulingStrategy::Parallel,
        FailurePolicy::Continue,
    )
    .await;

    assert_step_state(&report, "experimental", 0, "failed");
    assert_job_state(&report, "experimental", "succeeded");
    assert_job_state(&report, "after", "succeeded");
    assert!(report.succeeded());
}

#[tokio::test]
async fn test_dependents_start_after_their_needs() {
    let plan = plan_from_yaml(
        r#"
on: push
jobs:
  deploy:
    runs-on: ubuntu-latest
    needs: [build, test]
    steps: [{ run: make deploy }]
  test:
    runs-on: ubuntu-latest
    needs: build
    steps: [{ run: make test }]
  build:
    runs-on: ubuntu-latest
    steps: [{ run: make }]
"#,
    );

    let order = Arc::new(Mutex::new(Vec::new()));
    let seen = order.clone();

    let mut engine = ExecutionEngine::new(ScriptedRunner::new(), SchedulingStrategy::Parallel);
    engine.add_event_handler(move |event| {
        if let ExecutionEvent::JobStarted { job } = event {
            seen.lock().unwrap().push(job);
        }
    });
    let report = engine.execute(&plan).await;

    assert!(report.succeeded());
    assert_eq!(*order.lock().unwrap(), vec!["build", "test", "deploy"]);
}
