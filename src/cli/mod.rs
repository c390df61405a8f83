//! Command-line interface

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use commands::{PlanCommand, SimulateCommand, ValidateCommand};
use std::ffi::OsString;

/// CI workflow validator and planner
#[derive(Debug, Parser, Clone)]
#[command(name = "ciflow")]
#[command(version = "0.1.0")]
#[command(about = "Validate CI workflow definitions and build job plans", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to settings file
    #[arg(short, long, global = true)]
    pub config: Option<String>,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Validate a workflow document
    Validate(ValidateCommand),

    /// Show the execution plan of a workflow
    Plan(PlanCommand),

    /// Walk the plan without running anything
    Simulate(SimulateCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulate_args() {
        let cli = Cli::try_parse_from([
            "ciflow",
            "-v",
            "simulate",
            "ci.yml",
            "--fail",
            "build.1",
            "--fail-fast",
            "--strategy",
            "parallel-limited",
            "--assume",
            "env.DEPLOY=true",
        ])
        .unwrap();

        assert!(cli.verbose);
        let Command::Simulate(cmd) = cli.command else {
            panic!("expected simulate");
        };
        assert_eq!(cmd.file, "ci.yml");
        assert_eq!(cmd.fail, vec![("build".to_string(), 1)]);
        assert!(cmd.fail_fast);
        assert_eq!(cmd.assume, vec![("env.DEPLOY".to_string(), true)]);
    }

    #[test]
    fn test_validate_requires_file() {
        assert!(Cli::try_parse_from(["ciflow", "validate"]).is_err());
    }
}
