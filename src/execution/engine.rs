//! Main execution engine - walks an execution plan

use crate::{
    core::{state::TransitionError, ExecutionStatus, GuardContext, RunState, RunSummary},
    execution::{
        FailurePolicy, JobContext, ExecutionScheduler, SchedulingStrategy, StepOutcome, StepRunner,
    },
    plan::{ExecutionPlan, PlannedJob},
};
use indexmap::IndexMap;
use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Events that can occur during a plan walk
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    RunStarted {
        run_id: Uuid,
        workflow: Option<String>,
    },
    JobStarted {
        job: String,
    },
    JobSkipped {
        job: String,
        reason: String,
    },
    JobFinished {
        job: String,
        succeeded: bool,
    },
    StepStarted {
        job: String,
        index: usize,
        label: String,
    },
    StepSkipped {
        job: String,
        index: usize,
        reason: String,
    },
    StepFinished {
        job: String,
        index: usize,
        succeeded: bool,
    },
    RunFinished {
        run_id: Uuid,
        status: ExecutionStatus,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(ExecutionEvent) + Send + Sync>;

#[derive(Clone, Default)]
struct EventSink {
    handlers: Vec<EventHandler>,
}

impl EventSink {
    fn emit(&self, event: ExecutionEvent) {
        for handler in &self.handlers {
            handler(event.clone());
        }
    }
}

/// Final state of one step
#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub label: String,
    pub state: RunState,
}

/// Final state of one job and its steps
#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub state: RunState,
    pub steps: Vec<StepReport>,
}

/// Outcome of a whole plan walk
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub summary: RunSummary,
    pub jobs: IndexMap<String, JobReport>,
}

impl RunReport {
    pub fn job_state(&self, job: &str) -> Option<&RunState> {
        self.jobs.get(job).map(|j| &j.state)
    }

    pub fn step_state(&self, job: &str, index: usize) -> Option<&RunState> {
        self.jobs
            .get(job)
            .and_then(|j| j.steps.get(index))
            .map(|s| &s.state)
    }

    pub fn succeeded(&self) -> bool {
        self.summary.status == ExecutionStatus::Completed
    }
}

/// What a finished job task hands back
struct JobRun {
    steps: Vec<RunState>,
    failure: Option<String>,
}

/// Plan execution engine
pub struct ExecutionEngine<R> {
    runner: Arc<R>,
    scheduler: ExecutionScheduler,
    policy: FailurePolicy,
    guards: GuardContext,
    events: EventSink,
}

impl<R: StepRunner + 'static> ExecutionEngine<R> {
    pub fn new(runner: R, strategy: SchedulingStrategy) -> Self {
        Self::with_runner(Arc::new(runner), strategy)
    }

    /// Share a runner the caller keeps a handle to
    pub fn with_runner(runner: Arc<R>, strategy: SchedulingStrategy) -> Self {
        Self {
            runner,
            scheduler: ExecutionScheduler::new(strategy),
            policy: FailurePolicy::default(),
            guards: GuardContext::default(),
            events: EventSink::default(),
        }
    }

    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Answers for guard operands the engine cannot evaluate itself
    pub fn guard_context(mut self, guards: GuardContext) -> Self {
        self.guards = guards;
        self
    }

    /// Add an event handler
    pub fn add_event_handler<F>(&mut self, handler: F)
    where
        F: Fn(ExecutionEvent) + Send + Sync + 'static,
    {
        self.events.handlers.push(Arc::new(handler));
    }

    /// Walk the plan. Runner failures become step failures; the walk itself
    /// always completes with a report.
    pub async fn execute(&self, plan: &ExecutionPlan) -> RunReport {
        let mut summary = RunSummary::new();
        let run_id = summary.run_id;

        info!(
            "Starting run {} ({} jobs)",
            run_id,
            plan.jobs.len()
        );
        self.events.emit(ExecutionEvent::RunStarted {
            run_id,
            workflow: plan.name.clone(),
        });
        summary.start(plan.jobs.len());

        let mut jobs: IndexMap<String, RunState> = plan
            .jobs
            .keys()
            .map(|id| (id.clone(), RunState::Pending))
            .collect();
        let mut steps: IndexMap<String, Vec<RunState>> = plan
            .jobs
            .values()
            .map(|job| (job.id.clone(), vec![RunState::Pending; job.steps.len()]))
            .collect();

        let mut running: JoinSet<(String, Result<JobRun, tokio::task::JoinError>)> = JoinSet::new();

        loop {
            if self.policy == FailurePolicy::FailFast && summary.failed_jobs > 0 {
                self.skip_pending(&mut jobs, &mut steps, &mut summary, "fail-fast: an earlier job failed");
            }

            let ready = self.scheduler.next_jobs(plan, &jobs, running.len());
            let mut settled = false;

            for id in ready {
                let Some(job) = plan.job(&id) else { continue };

                if let Some(reason) = self.blocked_reason(job, &jobs) {
                    self.settle_skip(&mut jobs, &mut steps, &mut summary, &id, reason);
                    settled = true;
                    continue;
                }

                if let Some(state) = jobs.get_mut(&id) {
                    log_transition(state.start(), &id);
                }
                debug!("Starting job {}", id);
                self.events.emit(ExecutionEvent::JobStarted { job: id.clone() });

                let context = JobContext {
                    job_id: id.clone(),
                    runner: job.runner.clone(),
                    env: merged_env(&plan.env, &job.env),
                };
                let task = run_job(
                    job.clone(),
                    context,
                    self.runner.clone(),
                    self.guards.clone(),
                    self.events.clone(),
                );
                running.spawn(async move { (id, tokio::spawn(task).await) });
            }

            // A skip may unblock dependents without anything finishing
            if settled {
                continue;
            }

            let Some(joined) = running.join_next().await else {
                break;
            };

            let (id, outcome) = match joined {
                Ok(done) => done,
                Err(e) => {
                    error!("Job supervisor task failed: {}", e);
                    continue;
                }
            };
            let run = outcome.unwrap_or_else(|e| JobRun {
                steps: Vec::new(),
                failure: Some(format!("job task panicked: {}", e)),
            });
            self.finish_job(plan, &id, run, &mut jobs, &mut steps, &mut summary);
        }

        // Only reachable if a job needs something that never settles
        self.skip_pending(&mut jobs, &mut steps, &mut summary, "dependencies never settled");

        summary.finish();
        info!(
            "Run {} finished: {} succeeded, {} failed, {} skipped",
            run_id, summary.succeeded_jobs, summary.failed_jobs, summary.skipped_jobs
        );
        self.events.emit(ExecutionEvent::RunFinished {
            run_id,
            status: summary.status,
        });

        let jobs = plan
            .jobs
            .values()
            .map(|job| {
                let state = jobs.get(&job.id).cloned().unwrap_or(RunState::Pending);
                let states = steps.get(&job.id).cloned().unwrap_or_default();
                let steps = job
                    .steps
                    .iter()
                    .zip(states)
                    .map(|(step, state)| StepReport {
                        label: step.label.clone(),
                        state,
                    })
                    .collect();
                (job.id.clone(), JobReport { state, steps })
            })
            .collect();

        RunReport { summary, jobs }
    }

    /// Why a job whose needs have all settled must not run, if it must not
    fn blocked_reason(&self, job: &PlannedJob, jobs: &IndexMap<String, RunState>) -> Option<String> {
        let unmet: Vec<&str> = job
            .needs
            .iter()
            .filter(|need| !jobs.get(*need).is_some_and(RunState::is_succeeded))
            .map(String::as_str)
            .collect();

        let view = self.guards.with_status(!unmet.is_empty(), false);
        if job.guard.evaluate(&view) {
            return None;
        }

        Some(if unmet.is_empty() {
            format!("condition `{}` is false", job.guard)
        } else {
            format!("needed job(s) did not succeed: {}", unmet.join(", "))
        })
    }

    /// Skip a job together with every step it never got to
    fn settle_skip(
        &self,
        jobs: &mut IndexMap<String, RunState>,
        steps: &mut IndexMap<String, Vec<RunState>>,
        summary: &mut RunSummary,
        id: &str,
        reason: String,
    ) {
        let Some(state) = jobs.get_mut(id) else { return };
        info!("Skipping job {}: {}", id, reason);
        log_transition(state.skip(reason.clone()), id);
        summary.record(state);

        let step_reason = format!("job skipped: {}", reason);
        for (index, step) in steps.get_mut(id).into_iter().flatten().enumerate() {
            if matches!(step, RunState::Pending) {
                log_transition(step.skip(step_reason.clone()), &format!("{}.{}", id, index));
            }
        }

        self.events.emit(ExecutionEvent::JobSkipped {
            job: id.to_string(),
            reason,
        });
    }

    fn skip_pending(
        &self,
        jobs: &mut IndexMap<String, RunState>,
        steps: &mut IndexMap<String, Vec<RunState>>,
        summary: &mut RunSummary,
        reason: &str,
    ) {
        let pending: Vec<String> = jobs
            .iter()
            .filter(|(_, state)| matches!(state, RunState::Pending))
            .map(|(id, _)| id.clone())
            .collect();
        for id in pending {
            self.settle_skip(jobs, steps, summary, &id, reason.to_string());
        }
    }

    fn finish_job(
        &self,
        plan: &ExecutionPlan,
        id: &str,
        run: JobRun,
        jobs: &mut IndexMap<String, RunState>,
        steps: &mut IndexMap<String, Vec<RunState>>,
        summary: &mut RunSummary,
    ) {
        let continue_on_error = plan
            .job(id)
            .is_some_and(|j| self.guards.flag(&j.continue_on_error));
        if !run.steps.is_empty() {
            steps.insert(id.to_string(), run.steps);
        }

        let Some(state) = jobs.get_mut(id) else { return };
        let succeeded = match run.failure {
            Some(error) if !continue_on_error => {
                warn!("Job {} failed: {}", id, error);
                log_transition(state.fail(error), id);
                false
            }
            Some(error) => {
                warn!("Job {} failed but continues on error: {}", id, error);
                log_transition(state.succeed(), id);
                true
            }
            None => {
                info!("Job {} succeeded", id);
                log_transition(state.succeed(), id);
                true
            }
        };
        summary.record(state);
        self.events.emit(ExecutionEvent::JobFinished {
            job: id.to_string(),
            succeeded,
        });
    }
}

fn merged_env(workflow: &IndexMap<String, String>, job: &IndexMap<String, String>) -> IndexMap<String, String> {
    let mut env = workflow.clone();
    env.extend(job.iter().map(|(k, v)| (k.clone(), v.clone())));
    env
}

fn log_transition(result: Result<(), TransitionError>, node: &str) {
    if let Err(e) = result {
        error!("Invalid state transition for {}: {}", node, e);
    }
}

/// Run a job's steps in order. A step whose guard is false is skipped; a
/// failing step marks the job failed unless it continues on error.
async fn run_job<R: StepRunner>(
    job: PlannedJob,
    context: JobContext,
    runner: Arc<R>,
    guards: GuardContext,
    events: EventSink,
) -> JobRun {
    let mut states = vec![RunState::Pending; job.steps.len()];
    let mut failure: Option<String> = None;

    for step in &job.steps {
        let node = format!("{}.{}", job.id, step.index);
        let state = &mut states[step.index];

        let view = guards.with_status(failure.is_some(), false);
        if !step.guard.evaluate(&view) {
            let reason = format!("condition `{}` is false", step.guard);
            debug!("Skipping step {}: {}", node, reason);
            log_transition(state.skip(reason.clone()), &node);
            events.emit(ExecutionEvent::StepSkipped {
                job: job.id.clone(),
                index: step.index,
                reason,
            });
            continue;
        }

        log_transition(state.start(), &node);
        events.emit(ExecutionEvent::StepStarted {
            job: job.id.clone(),
            index: step.index,
            label: step.label.clone(),
        });

        let error = match runner.run_step(&context, step).await {
            Ok(StepOutcome::Success) => None,
            Ok(StepOutcome::Failure(message)) => Some(message),
            Err(e) => Some(e.to_string()),
        };

        let succeeded = match error {
            None => {
                log_transition(state.succeed(), &node);
                true
            }
            Some(message) => {
                warn!("Step {} ({}) failed: {}", node, step.label, message);
                log_transition(state.fail(message.clone()), &node);
                if !guards.flag(&step.continue_on_error) && failure.is_none() {
                    failure = Some(format!("step `{}` failed: {}", step.label, message));
                }
                false
            }
        };
        events.emit(ExecutionEvent::StepFinished {
            job: job.id.clone(),
            index: step.index,
            succeeded,
        });
    }

    JobRun {
        steps: states,
        failure,
    }
}
