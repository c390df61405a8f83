//! CLI output formatting

use crate::{
    core::{ExecutionStatus, RunState, StepAction},
    execution::{ExecutionEvent, RunReport},
    plan::ExecutionPlan,
    validation::ValidationReport,
};
use console::Emoji;
use std::fmt::Write;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "!");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");
pub static SKIP: Emoji<'_, '_> = Emoji("⏭️  ", "- ");

/// Format a job or step state for display
pub fn format_run_state(state: &RunState) -> String {
    match state {
        RunState::Pending => style("PENDING").dim().to_string(),
        RunState::Running { .. } => style("RUNNING").yellow().to_string(),
        RunState::Succeeded { .. } => style("SUCCEEDED").green().to_string(),
        RunState::Failed { .. } => style("FAILED").red().to_string(),
        RunState::Skipped { .. } => style("SKIPPED").dim().to_string(),
    }
}

/// Format an execution status for display
pub fn format_status(status: ExecutionStatus) -> String {
    match status {
        ExecutionStatus::Pending => style("PENDING").dim().to_string(),
        ExecutionStatus::Running => style("RUNNING").yellow().to_string(),
        ExecutionStatus::Completed => style("COMPLETED").green().to_string(),
        ExecutionStatus::Failed => style("FAILED").red().to_string(),
    }
}

fn describe_action(action: &StepAction) -> String {
    match action {
        StepAction::Uses { action, .. } => format!("uses {}", action),
        StepAction::Run { command, .. } => {
            let first = command.lines().next().unwrap_or_default();
            if command.lines().nth(1).is_some() {
                format!("run {} ...", first)
            } else {
                format!("run {}", first)
            }
        }
    }
}

/// Errors and warnings, one per line
pub fn format_validation(report: &ValidationReport) -> String {
    let mut out = String::new();
    for error in &report.errors {
        let _ = writeln!(out, "  {} {}", CROSS, style(error).red());
    }
    for warning in &report.warnings {
        let _ = writeln!(out, "  {} {}", WARN, style(warning).yellow());
    }
    out
}

/// Stages, jobs and steps of a plan
pub fn format_plan(plan: &ExecutionPlan) -> String {
    let mut out = String::new();

    for (number, stage) in plan.stages.iter().enumerate() {
        let _ = writeln!(out, "{}", style(format!("Stage {}", number + 1)).bold());

        for job in stage.iter().filter_map(|id| plan.job(id)) {
            let _ = write!(
                out,
                "  {} {}",
                style(&job.id).cyan().bold(),
                style(format!("({})", job.runner)).dim()
            );
            if !job.needs.is_empty() {
                let _ = write!(out, " needs {}", job.needs.join(", "));
            }
            if job.guard.expr().is_some() {
                let _ = write!(out, " if {}", style(&job.guard).yellow());
            }
            out.push('\n');

            for step in &job.steps {
                let _ = write!(
                    out,
                    "    {}. {} {}",
                    step.index,
                    step.label,
                    style(format!("[{}]", describe_action(&step.action))).dim()
                );
                if step.guard.expr().is_some() {
                    let _ = write!(out, " if {}", style(&step.guard).yellow());
                }
                out.push('\n');
            }
        }
    }
    out
}

/// Final state of every job and step of a simulated run
pub fn format_run_report(report: &RunReport) -> String {
    let mut out = String::new();

    for (id, job) in &report.jobs {
        let _ = writeln!(out, "  {} {}", style(id).bold(), format_run_state(&job.state));
        if let RunState::Skipped { reason } = &job.state {
            let _ = writeln!(out, "      {}", style(reason).dim());
        }
        for step in &job.steps {
            let _ = write!(out, "    {} {}", format_run_state(&step.state), step.label);
            if let RunState::Failed { error, .. } = &step.state {
                let _ = write!(out, ": {}", style(error).red());
            }
            out.push('\n');
        }
    }

    let summary = &report.summary;
    let _ = write!(
        out,
        "\n{} {} ({} succeeded, {} failed, {} skipped)",
        if summary.status == ExecutionStatus::Completed { CHECK } else { CROSS },
        format_status(summary.status),
        style(summary.succeeded_jobs).green(),
        style(summary.failed_jobs).red(),
        style(summary.skipped_jobs).dim()
    );
    out
}

/// Format an execution event for display
pub fn format_execution_event(event: &ExecutionEvent) -> String {
    match event {
        ExecutionEvent::RunStarted { run_id, workflow } => format!(
            "{} Starting {} ({})",
            ROCKET,
            style(workflow.as_deref().unwrap_or("workflow")).bold(),
            style(&run_id.to_string()[..8]).dim()
        ),
        ExecutionEvent::JobStarted { job } => format!("{} {}", SPINNER, style(job).cyan()),
        ExecutionEvent::JobSkipped { job, reason } => {
            format!("{} {} ({})", SKIP, style(job).dim(), style(reason).dim())
        }
        ExecutionEvent::JobFinished { job, succeeded } => {
            if *succeeded {
                format!("{} {}", CHECK, style(job).green())
            } else {
                format!("{} {}", CROSS, style(job).red())
            }
        }
        ExecutionEvent::StepStarted { job, index, label } => {
            format!("    {} {}.{} {}", SPINNER, style(job).dim(), index, label)
        }
        ExecutionEvent::StepSkipped { job, index, reason } => {
            format!("    {} {}.{} ({})", SKIP, style(job).dim(), index, style(reason).dim())
        }
        ExecutionEvent::StepFinished { job, index, succeeded } => {
            let icon = if *succeeded { CHECK } else { CROSS };
            format!("    {} {}.{}", icon, style(job).dim(), index)
        }
        ExecutionEvent::RunFinished { run_id, status } => {
            let status_str = match status {
                ExecutionStatus::Completed => format!("{} completed", style("successfully").green()),
                ExecutionStatus::Failed => style("failed").red().to_string(),
                _ => format!("{:?}", status),
            };
            format!(
                "{} Run ({}) {}",
                INFO,
                style(&run_id.to_string()[..8]).dim(),
                status_str
            )
        }
    }
}
