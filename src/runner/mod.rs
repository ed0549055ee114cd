// src/runner/mod.rs

//! Runs a job-graph file on a scheduler. This is what the `jobdag` binary
//! drives.
//!
//! - [`graph`] builds jobs and groups from a validated [`GraphFile`].
//! - [`host`] is the channel-backed [`Host`](crate::engine::Host).
//! - [`client_loop`] is the dedicated client thread.
//! - [`runtime`] is the async event loop that collects outcomes.

pub mod client_loop;
pub mod graph;
pub mod host;
pub mod runtime;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

pub use client_loop::ClientLoop;
pub use graph::GraphJobs;
pub use host::ChannelHost;
pub use runtime::Runner;

use crate::config::GraphFile;
use crate::engine::{DeadlockReport, SchedulerStats};
use crate::job::Job;

/// How a job of the graph ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Completed,
    /// The body returned an error or panicked.
    Failed,
    Cancelled,
    /// The wait gave up (deadlock timeout).
    Stalled,
}

impl JobOutcome {
    /// Classify `job` after a wait that returned `finished`.
    pub fn of(job: &Job, finished: bool) -> Self {
        if !finished {
            JobOutcome::Stalled
        } else if job.was_cancelled() {
            JobOutcome::Cancelled
        } else if job.encountered_error() {
            JobOutcome::Failed
        } else if job.ran_to_completion() {
            JobOutcome::Completed
        } else {
            JobOutcome::Cancelled
        }
    }
}

impl fmt::Display for JobOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobOutcome::Completed => "completed",
            JobOutcome::Failed => "failed",
            JobOutcome::Cancelled => "cancelled",
            JobOutcome::Stalled => "stalled",
        };
        f.write_str(s)
    }
}

/// Events flowing into the runtime from waiters, timers, the host and
/// signal handlers.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    /// A waiter observed the end of a job.
    JobFinished { job: String, outcome: JobOutcome },
    /// A `cancel_after_ms` timer fired.
    CancelRequested { job: String },
    /// The scheduler detected a deadlock and asked the application to stop.
    StopRequested { report: DeadlockReport },
    /// Graceful shutdown requested (e.g. Ctrl-C).
    ShutdownRequested,
}

/// Result of running a graph.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub outcomes: BTreeMap<String, JobOutcome>,
    pub elapsed: Duration,
    /// Scheduler counters just before shutdown.
    pub stats: SchedulerStats,
    pub stop_request: Option<DeadlockReport>,
}

impl RunReport {
    pub fn outcome(&self, job: &str) -> Option<JobOutcome> {
        self.outcomes.get(job).copied()
    }

    pub fn count(&self, outcome: JobOutcome) -> usize {
        self.outcomes.values().filter(|o| **o == outcome).count()
    }

    pub fn all_completed(&self) -> bool {
        self.outcomes.values().all(|o| *o == JobOutcome::Completed)
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "jobdag report ({:?})", self.elapsed)?;
        for (name, outcome) in &self.outcomes {
            writeln!(f, "  {name:<24} {outcome}")?;
        }
        writeln!(
            f,
            "completed={} failed={} cancelled={} stalled={}",
            self.count(JobOutcome::Completed),
            self.count(JobOutcome::Failed),
            self.count(JobOutcome::Cancelled),
            self.count(JobOutcome::Stalled)
        )?;
        if let Some(report) = &self.stop_request {
            writeln!(f, "stop requested: deadlock, {report}")?;
        }
        Ok(())
    }
}

/// Run `graph` to the end on a fresh scheduler.
pub async fn run_graph(graph: GraphFile) -> crate::errors::Result<RunReport> {
    Runner::new(Arc::new(graph)).run().await
}

pub(crate) fn event_channel() -> (mpsc::Sender<RuntimeEvent>, mpsc::Receiver<RuntimeEvent>) {
    mpsc::channel(256)
}
