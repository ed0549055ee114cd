// src/engine/host.rs

//! Hooks into the application hosting the scheduler.
//!
//! The scheduler never drives the client thread itself. It asks the host to
//! schedule a client tick when callbacks are waiting, and asks it to stop
//! when a wait has exceeded the deadlock timeout.
//!
//! - [`NoopHost`] ignores both; the client thread is expected to call
//!   [`Scheduler::process_client_callbacks`](super::Scheduler::process_client_callbacks)
//!   on its own schedule.
//! - The `jobdag` binary uses a channel-backed host (see `runner::host`).

use std::fmt;
use std::time::Duration;

/// Details of a detected deadlock, handed to [`Host::request_stop`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadlockReport {
    /// Label of the job that was being waited on.
    pub job: String,
    pub waited: Duration,
    /// Name of the thread that was waiting.
    pub waiting_thread: String,
    /// Worker that owned the job at the time, if it was running.
    pub worker: Option<String>,
}

impl fmt::Display for DeadlockReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "thread '{}' waited {:?} on job '{}'",
            self.waiting_thread, self.waited, self.job
        )?;
        if let Some(worker) = &self.worker {
            write!(f, " (running on {worker})")?;
        }
        Ok(())
    }
}

/// Application side of the scheduler.
pub trait Host: Send + Sync {
    /// Schedule one run of the client thread's callback processing.
    ///
    /// Called at most once until the next full
    /// [`process_client_callbacks`](super::Scheduler::process_client_callbacks).
    fn wake_client(&self) {}

    /// A deadlock was detected; the application should stop in an orderly
    /// way. Deadlocks are programming errors and are not retried.
    fn request_stop(&self, report: &DeadlockReport) {
        let _ = report;
    }
}

/// Host that ignores wake-ups and stop requests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHost;

impl Host for NoopHost {}
