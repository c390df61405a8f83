//! Test: job graph building - edges, stages and cycles

use crate::helpers::*;
use ciflow::WorkflowError;

#[test]
fn test_two_job_cycle_names_both_jobs() {
    let err = plan_error(
        r#"
on: push
jobs:
  A:
    runs-on: ubuntu-latest
    needs: B
    steps: [{ run: a }]
  B:
    runs-on: ubuntu-latest
    needs: A
    steps: [{ run: b }]
"#,
    );

    match err {
        WorkflowError::Cycle(cycle) => {
            let mut members = cycle.members.clone();
            members.sort();
            assert_eq!(members, vec!["A", "B"]);
            assert!(cycle.to_string().contains("A -> B -> A"));
        }
        other => panic!("expected a cycle, got {}", other),
    }
}

#[test]
fn test_diamond_layers_into_stages() {
    let plan = plan_from_yaml(
        r#"
on: push
jobs:
  build:
    runs-on: ubuntu-latest
    steps: [{ run: make }]
  unit:
    runs-on: ubuntu-latest
    needs: build
    steps: [{ run: make unit }]
  lint:
    runs-on: ubuntu-latest
    needs: [build]
    steps: [{ run: make lint }]
  release:
    runs-on: ubuntu-latest
    needs: [unit, lint]
    steps: [{ run: make release }]
"#,
    );

    assert_eq!(plan.roots(), vec!["build"]);
    assert_eq!(
        plan.stages,
        vec![vec!["build"], vec!["unit", "lint"], vec!["release"]]
    );
    assert_eq!(plan.dependents("build"), vec!["unit", "lint"]);
    assert_eq!(plan.edges.len(), 4);
}

#[test]
fn test_unknown_need_is_a_schema_error_not_a_cycle() {
    let err = plan_error(
        r#"
on: push
jobs:
  test:
    runs-on: ubuntu-latest
    needs: biuld
    steps: [{ run: make test }]
"#,
    );

    match err {
        WorkflowError::Schema(report) => assert_error_at(&report, "jobs.test.needs", "job.needs.unknown"),
        other => panic!("expected schema errors, got {}", other),
    }
}

#[test]
fn test_plan_serializes_to_json() {
    let plan = plan_from_yaml(&fixture("sample.yml"));
    let json = serde_json::to_value(&plan).unwrap();

    assert_eq!(json["jobs"]["build"]["steps"][4]["guard"], "failure()");
    assert_eq!(json["jobs"]["build"]["steps"][4]["edge"]["kind"], "on_failure");
    assert_eq!(json["jobs"]["build"]["steps"][0]["action"]["type"], "uses");
}
