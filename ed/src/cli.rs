//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// elevatord - multi-elevator dispatch coordinator
#[derive(Parser, Debug)]
#[command(
    name = "ed",
    author,
    version,
    about = "Multi-elevator dispatch coordinator with simulated cars and floors"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log at DEBUG instead of INFO
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR), overrides --verbose
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the coordinator against simulated cars and floors
    Run {
        /// Scenario file (defaults to scenario.file from the config)
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        /// Ignore any scenario file and generate a fresh scenario
        #[arg(short, long)]
        generate: bool,

        /// Seed for scenario generation
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Work with scenario files
    Scenario {
        #[command(subcommand)]
        command: ScenarioCommand,
    },

    /// Print the effective configuration as YAML
    Config,
}

/// Scenario subcommands
#[derive(Debug, Subcommand)]
pub enum ScenarioCommand {
    /// Validate a scenario file against the building
    Check {
        /// Scenario file to validate
        file: PathBuf,
    },

    /// Write a generated scenario
    Generate {
        /// Output file (defaults to scenario.file from the config)
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Seed for the random generator
        #[arg(long)]
        seed: Option<u64>,
    },
}

/// Resolve the tracing level from the CLI flags
pub fn log_level(verbose: bool, log_level: Option<&str>) -> tracing::Level {
    match log_level.map(str::to_uppercase).as_deref() {
        Some("TRACE") => tracing::Level::TRACE,
        Some("DEBUG") => tracing::Level::DEBUG,
        Some("INFO") => tracing::Level::INFO,
        Some("WARN") | Some("WARNING") => tracing::Level::WARN,
        Some("ERROR") => tracing::Level::ERROR,
        Some(other) => {
            eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", other);
            tracing::Level::INFO
        }
        None if verbose => tracing::Level::DEBUG,
        None => tracing::Level::INFO,
    }
}
