//! Job graph builder: validated workflow to execution plan

use crate::plan::graph::{find_cycle, stages, CycleError};
use crate::plan::{ExecutionPlan, JobEdge, PlannedJob, PlannedStep, StepEdge};
use crate::validation::ValidatedWorkflow;
use indexmap::IndexMap;
use tracing::{debug, info};

/// Builds execution plans. Holds no state; one builder can serve any
/// number of documents, from any thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlanBuilder;

impl PlanBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Build the plan, stopping at the first cycle since a partial plan
    /// would not be safe to execute
    pub fn build(&self, workflow: &ValidatedWorkflow) -> Result<ExecutionPlan, CycleError> {
        let needs: IndexMap<String, Vec<String>> = workflow
            .jobs()
            .iter()
            .map(|(name, job)| (name.clone(), job.needs.clone()))
            .collect();

        find_cycle(&needs)?;

        let edges: Vec<JobEdge> = needs
            .iter()
            .flat_map(|(job, deps)| {
                deps.iter().map(move |dep| JobEdge {
                    from: dep.clone(),
                    to: job.clone(),
                })
            })
            .collect();

        let jobs: IndexMap<String, PlannedJob> = workflow
            .jobs()
            .iter()
            .map(|(name, job)| {
                let steps = job
                    .steps
                    .iter()
                    .enumerate()
                    .map(|(index, step)| PlannedStep {
                        index,
                        id: step.id.clone(),
                        label: step.label.clone(),
                        action: step.action.clone(),
                        guard: step.guard.clone(),
                        edge: StepEdge {
                            after: index.checked_sub(1),
                            kind: step.guard.trigger(),
                        },
                        env: step.env.clone(),
                        continue_on_error: step.continue_on_error.clone(),
                    })
                    .collect();

                let planned = PlannedJob {
                    id: name.clone(),
                    name: job.name.clone(),
                    runner: job.runner.clone(),
                    needs: job.needs.clone(),
                    guard: job.guard.clone(),
                    env: job.env.clone(),
                    continue_on_error: job.continue_on_error.clone(),
                    steps,
                };
                (name.clone(), planned)
            })
            .collect();

        let stages = stages(&needs);
        debug!(stages = stages.len(), edges = edges.len(), "Layered job graph");

        let plan = ExecutionPlan {
            name: workflow.name().map(str::to_string),
            triggers: workflow.triggers().to_vec(),
            env: workflow.env().clone(),
            jobs,
            edges,
            stages,
        };

        info!(
            "Built plan with {} jobs and {} steps",
            plan.jobs.len(),
            plan.step_count()
        );
        Ok(plan)
    }
}

/// Build a plan with a default builder
pub fn build_plan(workflow: &ValidatedWorkflow) -> Result<ExecutionPlan, CycleError> {
    PlanBuilder::new().build(workflow)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::condition::GuardTrigger;
    use crate::core::document::WorkflowDocument;
    use crate::validation::{validate, ActionRegistry};

    fn plan(yaml: &str) -> Result<ExecutionPlan, CycleError> {
        let document = WorkflowDocument::from_yaml(yaml).unwrap();
        let validated = validate(&document, &ActionRegistry::builtin()).unwrap();
        build_plan(&validated)
    }

    #[test]
    fn test_sequential_steps_and_guard_edges() {
        let plan = plan(
            r#"
on: push
jobs:
  build:
    runs-on: ubuntu-latest
    steps:
      - run: make
      - run: make test
      - name: Report
        if: failure()
        run: echo failed
      - name: Cleanup
        if: always()
        run: rm -rf target
"#,
        )
        .unwrap();

        let steps = &plan.job("build").unwrap().steps;
        assert_eq!(steps[0].edge.after, None);
        assert_eq!(steps[1].edge.after, Some(0));
        assert_eq!(steps[1].edge.kind, GuardTrigger::OnSuccess);
        assert_eq!(steps[2].edge.kind, GuardTrigger::OnFailure);
        assert_eq!(steps[3].edge.kind, GuardTrigger::Always);
        assert_eq!(steps[2].label, "Report");
    }

    #[test]
    fn test_needs_become_edges_and_stages() {
        let plan = plan(
            r#"
on: push
jobs:
  build:
    runs-on: ubuntu-latest
    steps: [{ run: make }]
  test:
    runs-on: ubuntu-latest
    needs: build
    steps: [{ run: make test }]
  deploy:
    runs-on: ubuntu-latest
    needs: [build, test]
    steps: [{ run: make deploy }]
"#,
        )
        .unwrap();

        assert_eq!(plan.roots(), vec!["build"]);
        assert_eq!(plan.dependents("build"), vec!["test", "deploy"]);
        assert_eq!(
            plan.stages,
            vec![vec!["build"], vec!["test"], vec!["deploy"]]
        );
        assert_eq!(plan.edges.len(), 3);
    }

    #[test]
    fn test_cycle_fails() {
        let err = plan(
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
        )
        .unwrap_err();

        let mut members = err.members.clone();
        members.sort();
        assert_eq!(members, vec!["A", "B"]);
    }
}
