//! CLI command definitions

use clap::Args;
use crate::execution::SchedulingStrategy;

/// Validate a workflow document
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to workflow YAML file
    pub file: String,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,

    /// Treat warnings as errors
    #[arg(long)]
    pub strict: bool,
}

/// Build and show the execution plan
#[derive(Debug, Args, Clone)]
pub struct PlanCommand {
    /// Path to workflow YAML file
    pub file: String,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Walk the plan with a scripted runner
#[derive(Debug, Args, Clone)]
pub struct SimulateCommand {
    /// Path to workflow YAML file
    pub file: String,

    /// Step that should fail, as <job>.<step-index>
    #[arg(long, value_parser = parse_step_ref)]
    pub fail: Vec<(String, usize)>,

    /// Skip jobs not yet started once a job fails
    #[arg(long)]
    pub fail_fast: bool,

    /// Scheduling strategy
    #[arg(long, value_enum)]
    pub strategy: Option<SchedulingStrategyArg>,

    /// Job limit for parallel-limited
    #[arg(long, default_value_t = 4)]
    pub max_parallel: usize,

    /// Value of a guard operand (expr=true|false)
    #[arg(long, value_parser = parse_assumption)]
    pub assume: Vec<(String, bool)>,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Scheduling strategy argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SchedulingStrategyArg {
    Sequential,
    Parallel,
    #[clap(name = "parallel-limited")]
    ParallelLimited,
}

impl SchedulingStrategyArg {
    pub fn into_strategy(self, max_parallel: usize) -> SchedulingStrategy {
        match self {
            SchedulingStrategyArg::Sequential => SchedulingStrategy::Sequential,
            SchedulingStrategyArg::Parallel => SchedulingStrategy::Parallel,
            SchedulingStrategyArg::ParallelLimited => SchedulingStrategy::LimitedParallel(max_parallel),
        }
    }
}

/// Parse <job>.<step-index>
pub fn parse_step_ref(s: &str) -> Result<(String, usize), String> {
    let (job, index) = s
        .rsplit_once('.')
        .ok_or_else(|| format!("Invalid step reference (expected job.index): {}", s))?;
    if job.is_empty() {
        return Err(format!("Invalid step reference (empty job): {}", s));
    }
    let index = index
        .parse()
        .map_err(|_| format!("Invalid step index in {}", s))?;
    Ok((job.to_string(), index))
}

/// Parse expr=true|false, splitting at the last `=` so `==` stays in the expression
pub fn parse_assumption(s: &str) -> Result<(String, bool), String> {
    let (expr, value) = s
        .rsplit_once('=')
        .ok_or_else(|| format!("Invalid assumption (expected expr=bool): {}", s))?;
    let value = match value.trim() {
        "true" => true,
        "false" => false,
        other => return Err(format!("Invalid assumption value `{}`: expected true or false", other)),
    };
    if expr.trim().is_empty() {
        return Err(format!("Invalid assumption (empty expression): {}", s));
    }
    Ok((expr.to_string(), value))
}
