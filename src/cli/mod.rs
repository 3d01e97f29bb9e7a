//! CLI command definitions and handlers

mod check;
mod files;
mod fix;
mod restore;
mod rules;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Parse and validate workers count (0-64, 0 = one per core)
fn parse_workers(s: &str) -> Result<usize, String> {
    let n: usize = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;
    if n > 64 {
        Err("workers cannot exceed 64".to_string())
    } else {
        Ok(n)
    }
}

/// archfix - architecture conventions for Python, with safe auto-fixes
#[derive(Parser, Debug)]
#[command(name = "archfix")]
#[command(
    version,
    about = "Architecture-convention linter for Python with a gated, test-validated fix pipeline",
    after_help = "\
Examples:
  archfix . check                     Report violations (exit 1 if any)
  archfix . check --format json       JSON output for scripting
  archfix . fix                       Run all fix passes, validated by the test suite
  archfix . fix --no-validate         Apply fixes without running tests
  archfix . restore                   Roll back edits left by an interrupted run
  archfix rules                       List the rule catalogue"
)]
pub struct Cli {
    /// Path to the project root (default: current directory)
    #[arg(global = true, default_value = ".")]
    pub path: PathBuf,

    /// Log level (error, warn, info, debug, trace); RUST_LOG takes precedence
    #[arg(long, global = true, default_value = "warn", value_parser = ["error", "warn", "info", "debug", "trace"])]
    pub log_level: String,

    /// Evaluation threads (0 = one per core, default from config)
    #[arg(long, global = true, value_parser = parse_workers)]
    pub workers: Option<usize>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Report violations without changing anything
    Check {
        /// Output format: text or json
        #[arg(long, short = 'f', default_value = "text", value_parser = ["text", "json"])]
        format: String,
    },

    /// Run the remediation pipeline
    Fix {
        /// Do not run the test suite after each edit
        #[arg(long)]
        no_validate: bool,

        /// Skip file snapshots when tests are not run. Validated runs always
        /// snapshot to disk so an interrupted run can be restored.
        #[arg(long)]
        no_backup: bool,

        /// Ask before editing each file
        #[arg(long, short = 'i')]
        interactive: bool,

        /// Treat a timed-out or unavailable test run as a regression
        #[arg(long)]
        strict_oracle: bool,

        /// Skip the external formatter passes
        #[arg(long)]
        no_format: bool,

        /// Output format: text or json
        #[arg(long, short = 'f', default_value = "text", value_parser = ["text", "json"])]
        format: String,
    },

    /// Restore files from snapshots left by an interrupted `fix`
    Restore,

    /// List available rules
    Rules,
}

/// Options of the `fix` command
#[derive(Debug, Clone, Default)]
pub struct FixOptions {
    pub no_validate: bool,
    pub no_backup: bool,
    pub interactive: bool,
    pub strict_oracle: bool,
    pub no_format: bool,
    pub json: bool,
}

pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Some(Commands::Check { format }) => check::run(&cli.path, &format, cli.workers),
        Some(Commands::Fix {
            no_validate,
            no_backup,
            interactive,
            strict_oracle,
            no_format,
            format,
        }) => fix::run(
            &cli.path,
            FixOptions {
                no_validate,
                no_backup,
                interactive,
                strict_oracle,
                no_format,
                json: format == "json",
            },
            cli.workers,
        ),
        Some(Commands::Restore) => restore::run(&cli.path),
        Some(Commands::Rules) => rules::run(&cli.path),
        None => check::run(&cli.path, "text", cli.workers),
    }
}
