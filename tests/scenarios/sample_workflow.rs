//! Test: the Python package sample workflow

use crate::helpers::*;
use ciflow::core::{ActionRef, EventKind, GuardTrigger, StepAction, StepParams, WorkflowDocument};
use ciflow::execution::{DryRunRunner, FailurePolicy, SchedulingStrategy};
use ciflow::validation::{validate, ActionRegistry};
use ciflow::build_plan;

#[test]
fn test_sample_has_two_independent_roots() {
    let plan = plan_from_yaml(&fixture("sample.yml"));

    assert_eq!(plan.name.as_deref(), Some("Python package"));
    assert_eq!(plan.roots(), vec!["build", "job2"]);
    assert!(plan.edges.is_empty());
    assert_eq!(plan.stages, vec![vec!["build", "job2"]]);
}

#[test]
fn test_plan_jobs_match_document_jobs() {
    let yaml = fixture("sample.yml");
    let document = WorkflowDocument::from_yaml(&yaml).unwrap();
    let plan = plan_from_yaml(&yaml);

    let document_jobs: Vec<&str> = document.jobs.keys().map(String::as_str).collect();
    let plan_jobs: Vec<&str> = plan.job_names().collect();
    assert_eq!(document_jobs, plan_jobs);
}

#[test]
fn test_planning_is_deterministic() {
    let yaml = fixture("sample.yml");
    let first = plan_from_yaml(&yaml);
    let second = plan_from_yaml(&yaml);

    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[test]
fn test_sample_steps_are_typed() {
    let plan = plan_from_yaml(&fixture("sample.yml"));
    let build = plan.job("build").unwrap();
    assert_eq!(build.steps.len(), 5);

    match &build.steps[0].action {
        StepAction::Uses { action, params } => {
            assert_eq!(action.name(), "actions/checkout");
            assert!(matches!(action, ActionRef::Remote { git_ref, .. } if git_ref == "v2"));
            assert!(matches!(params, StepParams::Checkout(_)));
        }
        other => panic!("expected uses step, got {:?}", other),
    }

    assert!(matches!(&build.steps[2].action, StepAction::Run { command, .. } if command.contains("pytest")));

    match &build.steps[4].action {
        StepAction::Uses {
            params: StepParams::SendMail(mail),
            ..
        } => {
            assert_eq!(mail.to, vec!["dev@example.com", "ops@example.com"]);
            assert_eq!(mail.subject.as_deref(), Some("Build failed"));
        }
        other => panic!("expected mail step, got {:?}", other),
    }
    assert_eq!(build.steps[4].edge.kind, GuardTrigger::OnFailure);
}

#[test]
fn test_sample_triggers() {
    let document = WorkflowDocument::from_yaml(&fixture("sample.yml")).unwrap();
    let validated = validate(&document, &ActionRegistry::builtin()).unwrap();
    let plan = build_plan(&validated).unwrap();

    let push = plan
        .triggers
        .iter()
        .find(|t| t.event == EventKind::Push)
        .unwrap();
    assert!(push.fires_on(&EventKind::Push, "main"));
    assert!(push.fires_on(&EventKind::Push, "release/v1/rc"));
    assert!(!push.fires_on(&EventKind::Push, "feature/x"));

    let pr = plan
        .triggers
        .iter()
        .find(|t| t.event == EventKind::PullRequest)
        .unwrap();
    assert!(pr.fires_on(&EventKind::PullRequest, "main"));
}

#[tokio::test]
async fn test_sample_dry_run_skips_mail() {
    let plan = plan_from_yaml(&fixture("sample.yml"));
    let report = simulate(
        &plan,
        DryRunRunner,
        SchedulingStrategy::Parallel,
        FailurePolicy::Continue,
    )
    .await;

    assert!(report.succeeded());
    assert_job_state(&report, "build", "succeeded");
    assert_job_state(&report, "job2", "succeeded");
    assert_step_state(&report, "build", 3, "succeeded");
    assert_step_state(&report, "build", 4, "skipped");
}
