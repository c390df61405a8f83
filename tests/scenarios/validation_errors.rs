//! Test: schema violations are collected with their paths

use crate::helpers::*;
use ciflow::core::WorkflowDocument;

#[test]
fn test_uses_and_run_are_exclusive() {
    let report = validation_errors(
        r#"
on: push
jobs:
  build:
    runs-on: ubuntu-latest
    steps:
      - uses: actions/checkout@v4
      - uses: actions/setup-python@v5
        run: python --version
"#,
    );

    assert_error_at(&report, "jobs.build.steps[1]", "step.action.exclusive");
    assert_eq!(report.errors.len(), 1);
}

#[test]
fn test_all_errors_reported_in_one_pass() {
    let report = validation_errors(
        r#"
on: push
jobs:
  build:
    steps:
      - name: nothing to do
  cache:
    runs-on: ubuntu-latest
    steps:
      - uses: actions/cache@v4
        with:
          path: ~/.cache
      - uses: not a reference
"#,
    );

    assert_error_at(&report, "jobs.build.runs-on", "job.runner.required");
    assert_error_at(&report, "jobs.build.steps[0]", "step.action.missing");
    assert!(report.errors.iter().any(|e| e.rule == "step.with.required"));
    assert!(report.errors.iter().any(|e| e.rule == "step.uses.format"));
}

#[test]
fn test_bad_guard_syntax() {
    let report = validation_errors(
        r#"
on: push
jobs:
  build:
    runs-on: ubuntu-latest
    steps:
      - run: make
        if: failure() &&
"#,
    );

    assert!(report.errors.iter().any(|e| e.rule == "step.if.syntax"));
}

#[test]
fn test_syntax_error_has_position() {
    let err = WorkflowDocument::from_yaml("on: push\njobs:\n  build: [\n").unwrap_err();
    assert!(err.line.is_some());
    assert!(err.to_string().starts_with("parse error at line"));
}

#[test]
fn test_duplicate_job_names_rejected_at_parse() {
    let yaml = r#"
on: push
jobs:
  build:
    runs-on: ubuntu-latest
    steps: [{ run: a }]
  build:
    runs-on: ubuntu-latest
    steps: [{ run: b }]
"#;
    assert!(WorkflowDocument::from_yaml(yaml).is_err());
}
