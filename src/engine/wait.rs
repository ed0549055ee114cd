// src/engine/wait.rs

//! Waiting on a node, and what happens when a wait takes too long.
//!
//! How a thread waits depends on who it is:
//! - the client thread never blocks outright. It polls the node's latch in
//!   short slices and runs immediate client callbacks in between, since a
//!   worker may be blocked on one of those.
//! - a worker waits in slices so a cancellation of its own job interrupts
//!   the wait.
//! - any other thread blocks on the latch.
//!
//! A wait that exceeds the deadlock timeout is reported to the host as a
//! fatal condition, whatever timeout the caller asked for.

use std::backtrace::Backtrace;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::Shared;
use super::host::DeadlockReport;
use crate::dag::ScheduleNode;
use crate::errors::SchedulerError;

/// Slice a worker blocks for before re-checking its interrupt flag.
const WORKER_WAIT_SLICE: Duration = Duration::from_millis(5);

/// How a wait on a node ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Completed,
    /// The caller's timeout elapsed first.
    TimedOut,
    /// The waiting worker's own job was cancelled.
    Interrupted,
    /// The deadlock timeout elapsed; the host has been asked to stop.
    Deadlock,
}

impl Shared {
    pub(crate) fn await_node(&self, node: &Arc<ScheduleNode>, timeout: Option<Duration>) -> WaitOutcome {
        if node.latch().is_open() {
            return WaitOutcome::Completed;
        }

        if self.client.is_client_thread() {
            self.await_on_client(node, timeout)
        } else if let Some(worker) = self.current_worker_index() {
            self.await_on_worker(node, worker, timeout)
        } else {
            self.await_blocking(node, timeout)
        }
    }

    fn await_on_client(&self, node: &Arc<ScheduleNode>, timeout: Option<Duration>) -> WaitOutcome {
        let start = Instant::now();
        let poll = self.config.client_poll_interval;
        let mut logged_seconds = 0u64;

        loop {
            if node.latch().wait_for(poll) {
                return WaitOutcome::Completed;
            }

            self.client.process(true);
            thread::yield_now();

            let elapsed = start.elapsed();
            let seconds = elapsed.as_secs();
            if seconds > logged_seconds {
                logged_seconds = seconds;
                debug!(
                    job = %node,
                    state = ?node.state(),
                    elapsed_secs = seconds,
                    "client thread still waiting on job"
                );
                self.log_worker_states();
            }

            if let Some(outcome) = self.check_elapsed(node, elapsed, timeout) {
                return outcome;
            }
        }
    }

    fn await_on_worker(&self, node: &Arc<ScheduleNode>, worker: usize, timeout: Option<Duration>) -> WaitOutcome {
        let start = Instant::now();

        loop {
            if node.latch().wait_for(WORKER_WAIT_SLICE) {
                return WaitOutcome::Completed;
            }

            if self.is_worker_interrupted(worker) {
                debug!(worker, job = %node, "wait interrupted");
                return WaitOutcome::Interrupted;
            }

            if let Some(outcome) = self.check_elapsed(node, start.elapsed(), timeout) {
                return outcome;
            }
        }
    }

    fn await_blocking(&self, node: &Arc<ScheduleNode>, timeout: Option<Duration>) -> WaitOutcome {
        let start = Instant::now();
        let deadlock = self.config.deadlock_timeout;
        let limit = timeout.map_or(deadlock, |t| t.min(deadlock));

        if node.latch().wait_for(limit) {
            return WaitOutcome::Completed;
        }

        match timeout {
            Some(t) if t < deadlock => WaitOutcome::TimedOut,
            _ => {
                self.handle_deadlock(node, start.elapsed());
                WaitOutcome::Deadlock
            }
        }
    }

    fn check_elapsed(
        &self,
        node: &Arc<ScheduleNode>,
        elapsed: Duration,
        timeout: Option<Duration>,
    ) -> Option<WaitOutcome> {
        if timeout.is_some_and(|t| elapsed >= t) {
            return Some(WaitOutcome::TimedOut);
        }
        if elapsed >= self.config.deadlock_timeout {
            self.handle_deadlock(node, elapsed);
            return Some(WaitOutcome::Deadlock);
        }
        None
    }

    /// Log everything known about a wait that took too long and ask the host
    /// to stop. A scheduler that is already shutting down stays quiet.
    pub(crate) fn handle_deadlock(&self, node: &Arc<ScheduleNode>, waited: Duration) {
        if !self.is_active() {
            return;
        }

        let current = thread::current();
        let waiting_thread = current.name().unwrap_or("<unnamed>").to_string();
        let worker = node.worker().and_then(|index| self.slots.get(index));

        let err = SchedulerError::Deadlock {
            label: node.label(),
            waited,
        };
        warn!(
            error = %err,
            thread = %waiting_thread,
            worker = ?worker.map(|slot| slot.name.as_str()),
            "deadlock detected, requesting stop"
        );
        warn!(
            thread = %waiting_thread,
            "waiting thread backtrace:\n{}",
            Backtrace::force_capture()
        );
        if let Some(slot) = worker {
            warn!(
                worker = %slot.name,
                job = ?slot.current_label(),
                inflight = slot.inflight.load(std::sync::atomic::Ordering::Acquire),
                "worker owning the awaited job"
            );
        }

        let report = DeadlockReport {
            job: node.label(),
            waited,
            waiting_thread,
            worker: worker.map(|slot| slot.name.clone()),
        };
        self.host.request_stop(&report);
    }
}
