use anyhow::{Context, Result};
use ciflow::cli::commands::{PlanCommand, SimulateCommand, ValidateCommand};
use ciflow::cli::output::*;
use ciflow::cli::{Cli, Command};
use ciflow::core::{GuardContext, WorkflowDocument};
use ciflow::execution::{ExecutionEngine, FailurePolicy, ScriptedRunner};
use ciflow::plan::build_plan;
use ciflow::settings::ToolSettings;
use ciflow::validation::{ValidatedWorkflow, Validator};
use tracing::{debug, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    let settings = match &cli.config {
        Some(path) => ToolSettings::from_file(path).context("Failed to load settings")?,
        None => ToolSettings::default(),
    };

    let ok = match &cli.command {
        Command::Validate(cmd) => validate_workflow(cmd, &settings)?,
        Command::Plan(cmd) => show_plan(cmd, &settings)?,
        Command::Simulate(cmd) => simulate(cmd, &settings).await?,
    };

    if !ok {
        std::process::exit(1);
    }
    Ok(())
}

fn load_document(file: &str) -> Result<WorkflowDocument> {
    WorkflowDocument::from_file(file).with_context(|| format!("Failed to load workflow {}", file))
}

/// Validate and print the outcome; `None` when the document is invalid
fn check(
    document: &WorkflowDocument,
    settings: &ToolSettings,
    strict: bool,
    quiet: bool,
) -> Option<ValidatedWorkflow> {
    let registry = settings.registry();
    let validator = Validator::new(&registry).strict(strict || settings.strict);

    match validator.validate(document) {
        Ok(validated) => {
            if !quiet && !validated.warnings().is_empty() {
                for warning in validated.warnings() {
                    println!("  {} {}", WARN, style(warning).yellow());
                }
            }
            Some(validated)
        }
        Err(report) => {
            if !quiet {
                println!("{} Validation failed:", CROSS);
                print!("{}", format_validation(&report));
            }
            None
        }
    }
}

fn validate_workflow(cmd: &ValidateCommand, settings: &ToolSettings) -> Result<bool> {
    let document = load_document(&cmd.file)?;
    let registry = settings.registry();
    let result = Validator::new(&registry)
        .strict(cmd.strict || settings.strict)
        .validate(&document);

    if cmd.json {
        let json = match &result {
            Ok(validated) => serde_json::json!({
                "valid": true,
                "errors": [],
                "warnings": validated.warnings(),
            }),
            Err(report) => serde_json::json!({
                "valid": false,
                "errors": report.errors,
                "warnings": report.warnings,
            }),
        };
        println!("{}", serde_json::to_string_pretty(&json)?);
        return Ok(result.is_ok());
    }

    println!("{} Validating {}...", INFO, style(&cmd.file).bold());
    match result {
        Ok(validated) => {
            println!("{} Workflow is valid!", CHECK);
            if let Some(name) = validated.name() {
                println!("  Name: {}", style(name).bold());
            }
            println!("  Jobs: {}", style(validated.job_names().count()).cyan());
            for warning in validated.warnings() {
                println!("  {} {}", WARN, style(warning).yellow());
            }
            Ok(true)
        }
        Err(report) => {
            println!("{} Validation failed:", CROSS);
            print!("{}", format_validation(&report));
            Ok(false)
        }
    }
}

fn show_plan(cmd: &PlanCommand, settings: &ToolSettings) -> Result<bool> {
    let document = load_document(&cmd.file)?;
    let Some(validated) = check(&document, settings, false, cmd.json) else {
        return Ok(false);
    };
    let plan = match build_plan(&validated) {
        Ok(plan) => plan,
        Err(e) => {
            println!("{} {}", CROSS, style(e).red());
            return Ok(false);
        }
    };

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
    } else {
        println!(
            "{} Plan for {}",
            INFO,
            style(plan.name.as_deref().unwrap_or(&cmd.file)).bold()
        );
        print!("{}", format_plan(&plan));
    }
    Ok(true)
}

async fn simulate(cmd: &SimulateCommand, settings: &ToolSettings) -> Result<bool> {
    let document = load_document(&cmd.file)?;
    let Some(validated) = check(&document, settings, false, cmd.json) else {
        return Ok(false);
    };
    let plan = match build_plan(&validated) {
        Ok(plan) => plan,
        Err(e) => {
            println!("{} {}", CROSS, style(e).red());
            return Ok(false);
        }
    };

    let mut guards = GuardContext::new(settings.assume_unknown);
    for (expr, value) in &cmd.assume {
        guards
            .assume_source(expr, *value)
            .with_context(|| format!("Invalid assumption `{}`", expr))?;
    }

    let runner = cmd
        .fail
        .iter()
        .fold(ScriptedRunner::new(), |runner, (job, index)| runner.fail_step(job.clone(), *index));

    let strategy = cmd
        .strategy
        .map(|arg| arg.into_strategy(cmd.max_parallel))
        .unwrap_or(settings.strategy);
    let policy = if cmd.fail_fast {
        FailurePolicy::FailFast
    } else {
        settings.failure_policy
    };
    debug!(?strategy, ?policy, "Simulating run");

    let mut engine = ExecutionEngine::new(runner, strategy)
        .failure_policy(policy)
        .guard_context(guards);

    if !cmd.json {
        engine.add_event_handler(|event| println!("{}", format_execution_event(&event)));
    }

    let report = engine.execute(&plan).await;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!();
        println!("{}", format_run_report(&report));
    }
    Ok(report.succeeded())
}
