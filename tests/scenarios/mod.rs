//! Scenario-based tests for ciflow

mod job_graph;
mod sample_workflow;
mod simulated_runs;
mod validation_errors;
