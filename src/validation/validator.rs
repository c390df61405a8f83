//! Schema validation of workflow documents
//!
//! Validation is total: every rule runs over the whole document and all
//! findings are returned together. While checking, the validator also
//! resolves what the plan builder needs (compiled guards, parsed action
//! references, typed parameters) so that nothing is parsed twice.

use crate::core::condition::Guard;
use crate::core::document::{JobDefinition, RunsOn, StepDefinition, TriggerSpec, UnknownKey, WorkflowDocument};
use crate::core::step::{ActionRef, Setting, StepAction, StepParams};
use crate::core::trigger::{BranchPattern, EventKind, TriggerRule};
use crate::validation::registry::ActionRegistry;
use crate::validation::report::{SchemaWarning, ValidationReport};
use indexmap::IndexMap;
use serde_yaml::Value;
use std::collections::HashSet;
use tracing::{debug, info};

/// A document that passed validation, with its resolved parts
#[derive(Debug, Clone)]
pub struct ValidatedWorkflow {
    document: WorkflowDocument,
    triggers: Vec<TriggerRule>,
    env: IndexMap<String, String>,
    jobs: IndexMap<String, ResolvedJob>,
    warnings: Vec<SchemaWarning>,
}

#[derive(Debug, Clone)]
pub(crate) struct ResolvedJob {
    pub name: Option<String>,
    pub runner: String,
    pub needs: Vec<String>,
    pub guard: Guard,
    pub env: IndexMap<String, String>,
    pub continue_on_error: Setting<bool>,
    pub steps: Vec<ResolvedStep>,
}

#[derive(Debug, Clone)]
pub(crate) struct ResolvedStep {
    pub id: Option<String>,
    pub label: String,
    pub action: StepAction,
    pub guard: Guard,
    pub env: IndexMap<String, String>,
    pub continue_on_error: Setting<bool>,
}

impl ValidatedWorkflow {
    pub fn document(&self) -> &WorkflowDocument {
        &self.document
    }

    pub fn name(&self) -> Option<&str> {
        self.document.name.as_deref()
    }

    pub fn triggers(&self) -> &[TriggerRule] {
        &self.triggers
    }

    pub fn warnings(&self) -> &[SchemaWarning] {
        &self.warnings
    }

    pub fn job_names(&self) -> impl Iterator<Item = &str> {
        self.jobs.keys().map(String::as_str)
    }

    pub(crate) fn env(&self) -> &IndexMap<String, String> {
        &self.env
    }

    pub(crate) fn jobs(&self) -> &IndexMap<String, ResolvedJob> {
        &self.jobs
    }
}

/// Validates documents against the schema and an action registry
#[derive(Debug, Clone)]
pub struct Validator<'a> {
    registry: &'a ActionRegistry,
    strict: bool,
}

impl<'a> Validator<'a> {
    pub fn new(registry: &'a ActionRegistry) -> Self {
        Self {
            registry,
            strict: false,
        }
    }

    /// Treat warnings as errors
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn validate(&self, document: &WorkflowDocument) -> Result<ValidatedWorkflow, ValidationReport> {
        let mut report = ValidationReport::new();

        let triggers = resolve_triggers(document.on.as_ref(), &mut report);
        let env = resolve_env(&document.env, "env", &mut report);

        if document.jobs.is_empty() {
            report.error("jobs", "workflow.jobs.required", "workflow must define at least one job");
        }

        let mut jobs = IndexMap::with_capacity(document.jobs.len());
        for (name, job) in &document.jobs {
            if let Some(resolved) = self.resolve_job(name, job, document, &mut report) {
                jobs.insert(name.clone(), resolved);
            }
        }

        report_unknown_keys(&document.unknown_keys, &mut report);

        if self.strict {
            report.promote_warnings();
        }

        if report.has_errors() {
            info!(
                errors = report.errors.len(),
                warnings = report.warnings.len(),
                "Workflow failed validation"
            );
            return Err(report);
        }

        debug!(jobs = jobs.len(), warnings = report.warnings.len(), "Workflow is valid");
        Ok(ValidatedWorkflow {
            document: document.clone(),
            triggers,
            env,
            jobs,
            warnings: report.warnings,
        })
    }

    fn resolve_job(
        &self,
        name: &str,
        job: &JobDefinition,
        document: &WorkflowDocument,
        report: &mut ValidationReport,
    ) -> Option<ResolvedJob> {
        let path = format!("jobs.{}", name);
        let errors_before = report.errors.len();

        let runner = job.runs_on.as_ref().map(RunsOn::render).unwrap_or_default();
        if runner.is_empty() {
            report.error(
                format!("{}.runs-on", path),
                "job.runner.required",
                format!("job `{}` has no runner identifier", name),
            );
        }

        if job.steps.is_empty() {
            report.error(
                format!("{}.steps", path),
                "job.steps.required",
                format!("job `{}` must have at least one step", name),
            );
        }

        for need in job.needs.iter() {
            if need == name {
                report.error(
                    format!("{}.needs", path),
                    "job.needs.self",
                    format!("job `{}` cannot need itself", name),
                );
            } else if !document.jobs.contains_key(need) {
                report.error(
                    format!("{}.needs", path),
                    "job.needs.unknown",
                    format!("job `{}` needs unknown job `{}`", name, need),
                );
            }
        }

        let guard = parse_guard(job.condition.as_deref(), &format!("{}.if", path), "job.if.syntax", report);
        let env = resolve_env(&job.env, &format!("{}.env", path), report);
        let continue_on_error = resolve_flag(
            job.continue_on_error.as_ref(),
            &format!("{}.continue-on-error", path),
            report,
        );

        let mut seen_ids = HashSet::new();
        let mut steps = Vec::with_capacity(job.steps.len());
        for (index, step) in job.steps.iter().enumerate() {
            let step_path = format!("{}.steps[{}]", path, index);
            if let Some(id) = &step.id {
                if !seen_ids.insert(id.as_str()) {
                    report.error(
                        format!("{}.id", step_path),
                        "step.id.duplicate",
                        format!("step id `{}` is already used in job `{}`", id, name),
                    );
                }
            }
            if let Some(resolved) = self.resolve_step(index, step, &step_path, report) {
                steps.push(resolved);
            }
        }

        if report.errors.len() > errors_before {
            return None;
        }

        let mut needs: Vec<String> = Vec::new();
        for need in job.needs.iter() {
            if !needs.contains(need) {
                needs.push(need.clone());
            }
        }

        Some(ResolvedJob {
            name: job.name.clone(),
            runner,
            needs,
            guard,
            env,
            continue_on_error,
            steps,
        })
    }

    fn resolve_step(
        &self,
        index: usize,
        step: &StepDefinition,
        path: &str,
        report: &mut ValidationReport,
    ) -> Option<ResolvedStep> {
        let errors_before = report.errors.len();

        let inputs = resolve_inputs(&step.with, &format!("{}.with", path), report);
        let guard = parse_guard(step.condition.as_deref(), &format!("{}.if", path), "step.if.syntax", report);
        let env = resolve_env(&step.env, &format!("{}.env", path), report);
        let continue_on_error = resolve_flag(
            step.continue_on_error.as_ref(),
            &format!("{}.continue-on-error", path),
            report,
        );

        let action = match (&step.uses, &step.run) {
            (Some(_), Some(_)) => {
                report.error(
                    path,
                    "step.action.exclusive",
                    "step has both `uses` and `run`; exactly one is allowed",
                );
                None
            }
            (None, None) => {
                report.error(path, "step.action.missing", "step needs either `uses` or `run`");
                None
            }
            (Some(uses), None) => self.resolve_uses(uses, &inputs, path, report),
            (None, Some(run)) => {
                if !step.with.is_empty() {
                    report.error(
                        format!("{}.with", path),
                        "step.with.requires-uses",
                        "`with` is only allowed on steps that use an action",
                    );
                }
                if run.trim().is_empty() {
                    report.error(format!("{}.run", path), "step.run.empty", "`run` command is empty");
                }
                Some(StepAction::Run {
                    command: run.clone(),
                    shell: step.shell.clone(),
                    working_directory: step.working_directory.clone(),
                })
            }
        };

        if report.errors.len() > errors_before {
            return None;
        }

        Some(ResolvedStep {
            id: step.id.clone(),
            label: step.label(index),
            action: action?,
            guard,
            env,
            continue_on_error,
        })
    }

    fn resolve_uses(
        &self,
        uses: &str,
        inputs: &IndexMap<String, String>,
        path: &str,
        report: &mut ValidationReport,
    ) -> Option<StepAction> {
        let action = match ActionRef::parse(uses.trim()) {
            Ok(action) => action,
            Err(message) => {
                report.error(
                    format!("{}.uses", path),
                    "step.uses.format",
                    format!("invalid action reference `{}`: {}", uses, message),
                );
                return None;
            }
        };

        let Some(schema) = self.registry.get(&action.name()) else {
            debug!(action = %action, "Action not in registry; inputs are not checked");
            return Some(StepAction::Uses {
                action,
                params: StepParams::Generic {
                    inputs: inputs.clone(),
                },
            });
        };

        for key in inputs.keys() {
            if !schema.accepts(key) {
                report.warn(
                    format!("{}.with.{}", path, key),
                    "step.with.unknown",
                    format!("`{}` is not a known input of `{}`", key, schema.name),
                );
            }
        }

        let mut complete = true;
        for required in schema.required_inputs() {
            if !inputs.contains_key(required) {
                complete = false;
                report.error(
                    format!("{}.with", path),
                    "step.with.required",
                    format!("`{}` requires input `{}`", schema.name, required),
                );
            }
        }

        match StepParams::from_inputs(schema.kind, inputs) {
            Ok(params) if complete => Some(StepAction::Uses { action, params }),
            Ok(_) => None,
            Err(issues) => {
                for issue in issues {
                    report.error(
                        format!("{}.with.{}", path, issue.key),
                        "step.with.type",
                        issue.message,
                    );
                }
                None
            }
        }
    }
}

/// Validate with the default (non-strict) settings
pub fn validate(
    document: &WorkflowDocument,
    registry: &ActionRegistry,
) -> Result<ValidatedWorkflow, ValidationReport> {
    Validator::new(registry).validate(document)
}

fn parse_guard(
    source: Option<&str>,
    path: &str,
    rule: &'static str,
    report: &mut ValidationReport,
) -> Guard {
    match source {
        None => Guard::success(),
        Some(source) => Guard::parse(source).unwrap_or_else(|err| {
            report.error(path, rule, format!("invalid guard `{}`: {}", source, err));
            Guard::success()
        }),
    }
}

/// A boolean flag, or a `${{ }}` expression resolved at run time
fn resolve_flag(flag: Option<&Setting<bool>>, path: &str, report: &mut ValidationReport) -> Setting<bool> {
    match flag {
        None => Setting::Value(false),
        Some(Setting::Value(value)) => Setting::Value(*value),
        Some(Setting::Expression(source)) => {
            let trimmed = source.trim();
            if !(trimmed.starts_with("${{") && trimmed.ends_with("}}")) {
                report.error(
                    path,
                    "continue-on-error.type",
                    format!("`{}` is neither a boolean nor a `${{{{ }}}}` expression", source),
                );
            } else if let Err(err) = Guard::parse(trimmed) {
                report.error(
                    path,
                    "continue-on-error.syntax",
                    format!("invalid expression `{}`: {}", source, err),
                );
            }
            Setting::Expression(trimmed.to_string())
        }
    }
}

/// Render a scalar as the string a runner would see
fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Null => Some(String::new()),
        _ => None,
    }
}

fn resolve_inputs(
    with: &IndexMap<String, Value>,
    path: &str,
    report: &mut ValidationReport,
) -> IndexMap<String, String> {
    let mut inputs = IndexMap::with_capacity(with.len());
    for (key, value) in with {
        match scalar_to_string(value) {
            Some(s) => {
                inputs.insert(key.clone(), s);
            }
            None => report.error(
                format!("{}.{}", path, key),
                "step.with.scalar",
                format!("input `{}` must be a string, number or boolean", key),
            ),
        }
    }
    inputs
}

fn resolve_env(
    env: &IndexMap<String, Value>,
    path: &str,
    report: &mut ValidationReport,
) -> IndexMap<String, String> {
    let mut resolved = IndexMap::with_capacity(env.len());
    for (key, value) in env {
        match scalar_to_string(value) {
            Some(s) => {
                resolved.insert(key.clone(), s);
            }
            None => report.error(
                format!("{}.{}", path, key),
                "env.scalar",
                format!("environment variable `{}` must be a scalar", key),
            ),
        }
    }
    resolved
}

fn resolve_triggers(spec: Option<&TriggerSpec>, report: &mut ValidationReport) -> Vec<TriggerRule> {
    let Some(spec) = spec else {
        report.warn("on", "workflow.on.missing", "workflow has no triggers and will never start");
        return Vec::new();
    };

    match spec {
        TriggerSpec::Event(event) => vec![TriggerRule::new(EventKind::parse(event))],
        TriggerSpec::Events(events) => events
            .iter()
            .map(|e| TriggerRule::new(EventKind::parse(e)))
            .collect(),
        TriggerSpec::Detailed(events) => events
            .iter()
            .filter_map(|(name, config)| resolve_trigger(name, config, report))
            .collect(),
    }
}

fn resolve_trigger(name: &str, config: &Value, report: &mut ValidationReport) -> Option<TriggerRule> {
    let path = format!("on.{}", name);
    let mut rule = TriggerRule::new(EventKind::parse(name));

    let mapping = match config {
        Value::Null => return Some(rule),
        Value::Mapping(mapping) => mapping,
        // e.g. `schedule: [{ cron: ... }]`; not interpreted here
        Value::Sequence(_) if !rule.event.supports_branch_filter() => return Some(rule),
        _ => {
            report.error(
                path,
                "trigger.shape",
                format!("`{}` trigger must be empty or a mapping", name),
            );
            return None;
        }
    };

    let errors_before = report.errors.len();
    let branches = mapping.get("branches");
    let ignore = mapping.get("branches-ignore");

    if branches.is_some() && ignore.is_some() {
        report.error(
            &path,
            "trigger.branches.conflict",
            "`branches` and `branches-ignore` cannot be combined for the same event",
        );
    }
    if (branches.is_some() || ignore.is_some()) && !rule.event.supports_branch_filter() {
        report.warn(
            &path,
            "trigger.branches.ignored",
            format!("`{}` events have no branch filter", name),
        );
    }

    if let Some(value) = branches {
        rule.branches = resolve_patterns(value, &format!("{}.branches", path), report);
    }
    if let Some(value) = ignore {
        rule.branches_ignore = resolve_patterns(value, &format!("{}.branches-ignore", path), report);
    }

    (report.errors.len() == errors_before).then_some(rule)
}

fn resolve_patterns(value: &Value, path: &str, report: &mut ValidationReport) -> Vec<BranchPattern> {
    let entries: Vec<(String, Option<&str>)> = match value {
        Value::String(s) => vec![(path.to_string(), Some(s.as_str()))],
        Value::Sequence(items) => items
            .iter()
            .enumerate()
            .map(|(i, item)| (format!("{}[{}]", path, i), item.as_str()))
            .collect(),
        _ => {
            report.error(
                path,
                "trigger.branches.shape",
                "branch filter must be a pattern or a list of patterns",
            );
            return Vec::new();
        }
    };

    let mut patterns = Vec::with_capacity(entries.len());
    for (entry_path, raw) in entries {
        let Some(raw) = raw else {
            report.error(entry_path, "trigger.branches.shape", "branch pattern must be a string");
            continue;
        };
        match BranchPattern::parse(raw) {
            Ok(pattern) => patterns.push(pattern),
            Err(message) => report.error(
                entry_path,
                "trigger.branches.pattern",
                format!("invalid branch pattern `{}`: {}", raw, message),
            ),
        }
    }
    patterns
}

fn report_unknown_keys(unknown: &[UnknownKey], report: &mut ValidationReport) {
    for key in unknown {
        let rule = if key.path == "workflow" {
            "workflow.unknown-key"
        } else if key.path.contains(".steps[") {
            "step.unknown-key"
        } else {
            "job.unknown-key"
        };
        report.warn(&key.path, rule, format!("unknown key `{}`", key.key));
    }
}
