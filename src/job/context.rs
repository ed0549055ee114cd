// src/job/context.rs

//! What a running job body can see and do.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::engine::{Scheduler, Shared};
use crate::errors::{Result, SchedulerError};
use crate::job::JobCore;

/// Longest uninterrupted sleep inside [`JobContext::sleep`].
const SLEEP_SLICE: Duration = Duration::from_millis(5);

/// Handed to a job's work function for the duration of one run.
pub struct JobContext<'a> {
    core: &'a Arc<JobCore>,
    shared: &'a Arc<Shared>,
    worker: Option<usize>,
}

impl<'a> JobContext<'a> {
    pub(crate) fn new(core: &'a Arc<JobCore>, shared: &'a Arc<Shared>, worker: Option<usize>) -> Self {
        Self { core, shared, worker }
    }

    pub fn label(&self) -> &str {
        self.core.label()
    }

    /// Index of the worker running the job, `None` for inline jobs.
    pub fn worker_index(&self) -> Option<usize> {
        self.worker
    }

    pub fn scheduler(&self) -> Scheduler {
        Scheduler::from_shared(Arc::clone(self.shared))
    }

    /// Whether the job has been cancelled or its worker interrupted.
    pub fn is_cancelled(&self) -> bool {
        self.core.is_cancelled()
            || self
                .worker
                .is_some_and(|index| self.shared.is_worker_interrupted(index))
            || !self.shared.is_active()
    }

    /// Cancellation point. Returns [`SchedulerError::Interrupted`] once the
    /// job has been cancelled; propagate it with `?` to unwind promptly.
    pub fn check_cancelled(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(SchedulerError::Interrupted(self.label().to_string()))
        } else {
            Ok(())
        }
    }

    /// Sleep for `duration`, waking early with `Interrupted` on cancellation.
    pub fn sleep(&self, duration: Duration) -> Result<()> {
        let deadline = Instant::now() + duration;
        loop {
            self.check_cancelled()?;
            let now = Instant::now();
            if now >= deadline {
                return Ok(());
            }
            thread::sleep((deadline - now).min(SLEEP_SLICE));
        }
    }

    /// Run `callback` on the client thread and return its value.
    ///
    /// Inline jobs always ask for an immediate callback.
    pub fn invoke_on_client<R, F>(&self, immediate: bool, callback: F) -> Result<R>
    where
        R: Send + 'static,
        F: FnOnce() -> R + Send + 'static,
    {
        let immediate = immediate || !self.core.execute_async();
        self.shared.invoke_on_client(immediate, callback)
    }
}
