// src/logging.rs

//! `tracing` subscriber for the `jobdag` binary.
//!
//! `--log-level` sets one level for everything. Without it, `JOBDAG_LOG`
//! is read as a full filter directive, so scheduler internals can be
//! turned up on their own, e.g. `JOBDAG_LOG=info,jobdag::engine=debug`.
//! Anything unparsable falls back to `info`.
//!
//! Thread names are always printed: job logs interleave across the
//! `jobdag-worker-N` threads and the client thread.

use anyhow::{Result, anyhow};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt};

use crate::cli::LogLevel;

const ENV_VAR: &str = "JOBDAG_LOG";

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

/// Build the filter: CLI level, then `JOBDAG_LOG`, then `info`.
pub fn build_filter(cli_level: Option<LogLevel>) -> EnvFilter {
    if let Some(level) = cli_level {
        return EnvFilter::default().add_directive(LevelFilter::from(level).into());
    }

    EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .with_env_var(ENV_VAR)
        .try_from_env()
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber on stderr; stdout carries the run report.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    fmt()
        .with_env_filter(build_filter(cli_level))
        .with_target(true)
        .with_thread_names(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow!("failed to initialise logging: {err}"))
}
