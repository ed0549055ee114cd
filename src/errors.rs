// src/errors.rs

//! Crate-wide error type and result alias.

use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("Cyclic dependency: job '{dependant}' cannot depend on '{dependency}'")]
    CyclicDependency {
        dependant: String,
        dependency: String,
    },

    #[error("Job '{0}' is no longer pending and cannot accept new dependencies")]
    NotPending(String),

    #[error("Job '{0}' was interrupted")]
    Interrupted(String),

    #[error("Scheduler is not active")]
    Inactive,

    #[error("No client thread is bound to the scheduler")]
    NoClientThread,

    #[error("Deadlock detected while waiting {waited:?} on job '{label}'")]
    Deadlock { label: String, waited: Duration },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Cycle detected in job graph: {0}")]
    GraphCycle(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SchedulerError {
    /// Whether this error represents a cooperative interruption rather than a
    /// real failure.
    pub fn is_interruption(&self) -> bool {
        matches!(self, SchedulerError::Interrupted(_))
    }
}

/// Returns `true` if a job body's error is the interruption raised by
/// `JobContext::check_cancelled` (possibly wrapped in context).
pub fn is_interruption(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<SchedulerError>()
            .is_some_and(SchedulerError::is_interruption)
    })
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, SchedulerError>;
