// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `jobdag`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "jobdag",
    version,
    about = "Run a dependency graph of jobs on a work-stealing thread pool.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the job-graph file (TOML).
    ///
    /// Default: `Jobdag.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "Jobdag.toml")]
    pub config: String,

    /// Parse + validate, print the graph, but don't run any job.
    #[arg(long)]
    pub dry_run: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `JOBDAG_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Override the worker count resolved from `[scheduler]`.
    #[arg(long, value_name = "N")]
    pub workers: Option<usize>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
