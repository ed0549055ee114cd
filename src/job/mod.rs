// src/job/mod.rs

//! Units of work and their public contract.
//!
//! A [`Job`] is a labelled closure plus the flags callers poll after waiting
//! on it. Jobs are created through [`Scheduler::job`](crate::engine::Scheduler::job)
//! or [`Scheduler::build_job`](crate::engine::Scheduler::build_job), so every
//! job carries an explicit reference to the scheduler that runs it.
//!
//! - [`context`] is what a running job body sees ([`JobContext`]).
//! - [`group`] is the bulk wait/cancel handle ([`WorkGroup`]).

pub mod context;
pub mod group;

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

pub use context::JobContext;
pub use group::WorkGroup;

use crate::dag::{JobState, ScheduleNode, would_create_cycle};
use crate::engine::{Scheduler, Shared, WaitOutcome};
use crate::errors::{Result, SchedulerError, is_interruption};
use crate::types::Priority;
use group::GroupInner;

/// Work function signature.
pub type WorkFn = Box<dyn FnMut(&JobContext<'_>) -> anyhow::Result<()> + Send>;

/// Lifecycle hook signature (`on_cancel`, `on_released`, `on_completion`).
pub type Hook = Box<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct Hooks {
    on_cancel: Option<Hook>,
    on_released: Option<Hook>,
    on_completion: Option<Hook>,
}

/// Shared state of a job. Reached from its schedule node while outstanding.
pub struct JobCore {
    label: String,
    work: Mutex<WorkFn>,
    hooks: Hooks,
    execute_async: bool,

    done: AtomicBool,
    cancelled: AtomicBool,
    errored: AtomicBool,
    ran_to_completion: AtomicBool,
    queued: AtomicBool,
    released: AtomicBool,
    high_priority: AtomicBool,

    node: Mutex<Option<Arc<ScheduleNode>>>,
    group: Mutex<Option<Weak<GroupInner>>>,
}

impl JobCore {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    pub(crate) fn execute_async(&self) -> bool {
        self.execute_async
    }

    pub(crate) fn mark_cancelled(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub(crate) fn mark_done(&self) {
        self.done.store(true, Ordering::Release);
    }

    pub(crate) fn node(&self) -> Option<Arc<ScheduleNode>> {
        self.node.lock().clone()
    }

    fn group(&self) -> Option<Arc<GroupInner>> {
        self.group.lock().as_ref().and_then(Weak::upgrade)
    }

    pub(crate) fn run_cancel_hook(&self) {
        self.run_hook("on_cancel", self.hooks.on_cancel.as_ref());
    }

    pub(crate) fn run_completion_hook(&self) {
        self.run_hook("on_completion", self.hooks.on_completion.as_ref());
    }

    fn run_released_hook(&self) {
        self.run_hook("on_released", self.hooks.on_released.as_ref());
    }

    fn run_hook(&self, name: &str, hook: Option<&Hook>) {
        let Some(hook) = hook else { return };
        if panic::catch_unwind(AssertUnwindSafe(|| hook())).is_err() {
            warn!(job = %self.label, hook = name, "job hook panicked");
        }
    }

    /// Clear the per-submission flags before the job is submitted again.
    fn rearm(&self, high_priority: bool) {
        self.done.store(false, Ordering::Release);
        self.cancelled.store(false, Ordering::Release);
        self.errored.store(false, Ordering::Release);
        self.ran_to_completion.store(false, Ordering::Release);
        self.released.store(false, Ordering::Release);
        self.high_priority.store(high_priority, Ordering::Release);
        self.queued.store(true, Ordering::Release);
    }

    /// Run the work function once on the current thread.
    ///
    /// Failures are contained here: an error or panic marks the job as
    /// errored and leaves `ran_to_completion` unset, an interruption is
    /// treated as cancellation.
    pub(crate) fn execute(self: &Arc<Self>, shared: &Arc<Shared>, worker: Option<usize>) {
        if self.is_cancelled() {
            trace!(job = %self.label, "skipping cancelled job");
            return;
        }

        let ctx = JobContext::new(self, shared, worker);
        let result = {
            let mut work = self.work.lock();
            panic::catch_unwind(AssertUnwindSafe(|| (*work)(&ctx)))
        };

        match result {
            Ok(Ok(())) => {
                if !self.is_cancelled() {
                    self.ran_to_completion.store(true, Ordering::Release);
                }
            }
            Ok(Err(err)) if is_interruption(&err) => {
                // Interrupted by shutdown counts as cancelled too.
                self.mark_cancelled();
                debug!(job = %self.label, "job interrupted");
            }
            Ok(Err(err)) => {
                self.errored.store(true, Ordering::Release);
                if self.is_cancelled() {
                    debug!(job = %self.label, error = %format!("{err:#}"), "cancelled job returned an error");
                } else {
                    warn!(job = %self.label, error = %format!("{err:#}"), "job failed");
                }
            }
            Err(payload) => {
                self.errored.store(true, Ordering::Release);
                warn!(job = %self.label, panic = %panic_message(payload.as_ref()), "job panicked");
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "<non-string panic payload>".to_string()
    }
}

impl fmt::Debug for JobCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobCore")
            .field("label", &self.label)
            .field("execute_async", &self.execute_async)
            .field("done", &self.done.load(Ordering::Relaxed))
            .field("cancelled", &self.cancelled.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

/// Builder for jobs with lifecycle hooks or synchronous execution.
pub struct JobBuilder {
    shared: Arc<Shared>,
    label: String,
    work: WorkFn,
    hooks: Hooks,
    execute_async: bool,
}

impl JobBuilder {
    pub(crate) fn new(shared: Arc<Shared>, label: String, work: WorkFn) -> Self {
        Self {
            shared,
            label,
            work,
            hooks: Hooks::default(),
            execute_async: true,
        }
    }

    /// Called once when a submission of the job is cancelled.
    pub fn on_cancel(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.hooks.on_cancel = Some(Box::new(hook));
        self
    }

    /// Called after every completed or cancelled submission.
    pub fn on_completion(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.hooks.on_completion = Some(Box::new(hook));
        self
    }

    /// Called by [`Job::release`], at most once per submission.
    pub fn on_released(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.hooks.on_released = Some(Box::new(hook));
        self
    }

    /// `false` runs the job inline on the submitting thread, bypassing the
    /// worker pool.
    pub fn execute_async(mut self, execute_async: bool) -> Self {
        self.execute_async = execute_async;
        self
    }

    pub fn build(self) -> Job {
        let core = JobCore {
            label: self.label,
            work: Mutex::new(self.work),
            hooks: self.hooks,
            execute_async: self.execute_async,
            done: AtomicBool::new(false),
            cancelled: AtomicBool::new(false),
            errored: AtomicBool::new(false),
            ran_to_completion: AtomicBool::new(false),
            queued: AtomicBool::new(false),
            released: AtomicBool::new(false),
            high_priority: AtomicBool::new(false),
            node: Mutex::new(None),
            group: Mutex::new(None),
        };
        Job {
            core: Arc::new(core),
            shared: self.shared,
        }
    }
}

/// Handle to a unit of work. Cloning is cheap and every clone refers to the
/// same job.
#[derive(Clone)]
pub struct Job {
    core: Arc<JobCore>,
    shared: Arc<Shared>,
}

impl Job {
    pub fn label(&self) -> &str {
        self.core.label()
    }

    pub fn scheduler(&self) -> Scheduler {
        Scheduler::from_shared(Arc::clone(&self.shared))
    }

    /// Submit the job with `priority`, to run after every job in `deps`.
    ///
    /// Dependencies that were never submitted, or whose current submission
    /// has already finished, do not hold the job back. A dependency that
    /// would close a cycle is rejected and nothing is submitted.
    pub fn submit(&self, priority: Priority, deps: &[&Job]) -> Result<&Self> {
        self.submit_with(priority.is_high(), None, deps)
    }

    /// Like [`Job::submit`], inheriting the group's priority and registering
    /// the job with `group` so it can be completed or cancelled in bulk.
    pub fn submit_in(&self, group: &WorkGroup, deps: &[&Job]) -> Result<&Self> {
        self.submit_with(group.is_high_priority(), Some(group), deps)
    }

    fn submit_with(&self, high: bool, group: Option<&WorkGroup>, deps: &[&Job]) -> Result<&Self> {
        if !self.shared.is_active() {
            return Err(SchedulerError::Inactive);
        }

        // Re-submission waits for the previous run to finish first.
        if self.core.node().is_some() {
            self.wait_for_completion(None);
        }

        if !self.core.execute_async() {
            self.core.rearm(high);
            self.run_inline(deps);
            return Ok(self);
        }

        // Registered up front so a waiter racing the submission still
        // finds the group to leave.
        if let Some(group) = group {
            *self.core.group.lock() = Some(group.downgrade());
            group.register(self.clone());
        }

        // Flags are only reset once the cycle check has passed.
        let queued = self.shared.queue(&self.core, high, deps, || self.core.rearm(high));
        if let Err(err) = queued {
            if group.is_some() {
                self.detach_from_group();
            }
            return Err(err);
        }

        Ok(self)
    }

    fn run_inline(&self, deps: &[&Job]) {
        for dep in deps {
            if !Arc::ptr_eq(&dep.core, &self.core) {
                dep.wait_for_completion(None);
            }
        }

        trace!(job = %self.label(), "running job inline");
        self.core.execute(&self.shared, None);
        self.core.mark_done();
        if self.core.is_cancelled() {
            self.core.run_cancel_hook();
        }
        self.core.run_completion_hook();
    }

    /// Add `dep` as a dependency of this job after it has been submitted.
    ///
    /// Only valid while the job is still waiting on at least one other
    /// dependency. Returns `Ok(false)` if `dep` no longer blocks anything
    /// (never submitted or already finished).
    pub fn add_dependency(&self, dep: &Job) -> Result<bool> {
        let node = self
            .core
            .node()
            .ok_or_else(|| SchedulerError::NotPending(self.label().to_string()))?;

        if !node.is_idle() || !node.try_hold_pending() {
            return Err(SchedulerError::NotPending(self.label().to_string()));
        }

        let result = {
            let _graph = self.shared.graph_lock();
            match dep.core.node() {
                Some(dep_node) if would_create_cycle(&node, &dep_node) => {
                    Err(SchedulerError::CyclicDependency {
                        dependant: self.label().to_string(),
                        dependency: dep.label().to_string(),
                    })
                }
                Some(dep_node) => Ok(dep_node.add_dependant(&node)),
                None => Ok(false),
            }
        };

        // The extra hold may have been the last pending reference.
        self.shared.release_submission_guard(&node);
        result
    }

    /// Block until the current submission has finished.
    ///
    /// `timeout` bounds the wait for the caller; waits longer than the
    /// scheduler's deadlock timeout are always treated as a deadlock. Returns
    /// `true` if the job finished (completed or cancelled) in time.
    pub fn wait_for_completion(&self, timeout: Option<Duration>) -> bool {
        let Some(node) = self.core.node() else {
            return self.is_done();
        };

        match self.shared.await_node(&node, timeout) {
            WaitOutcome::Completed => {
                self.detach_node(&node);
                self.detach_from_group();
                true
            }
            outcome => {
                debug!(job = %self.label(), ?outcome, "wait did not complete");
                false
            }
        }
    }

    /// Cancel the current submission and wait until the cancellation has
    /// taken effect. Dependants are cancelled transitively.
    ///
    /// A job cancelling itself from its own body does not wait.
    pub fn cancel(&self) {
        let Some(node) = self.core.node() else {
            return;
        };

        if node.cancel(&self.shared) {
            debug!(job = %self.label(), "job cancelled");
        }

        if self.shared.is_running_on_current_worker(&node) {
            return;
        }

        self.wait_for_completion(None);
    }

    /// Wait for the job and hand it back. Idempotent per submission.
    pub fn release(&self) {
        if self.core.released.swap(true, Ordering::AcqRel) {
            return;
        }
        self.core.queued.store(false, Ordering::Release);
        self.wait_for_completion(None);
        self.core.run_released_hook();
        self.detach_from_group();
    }

    fn detach_node(&self, node: &Arc<ScheduleNode>) {
        let taken = {
            let mut slot = self.core.node.lock();
            match slot.as_ref() {
                Some(current) if Arc::ptr_eq(current, node) => slot.take(),
                _ => None,
            }
        };
        if let Some(node) = taken {
            self.shared.recycle_node(node);
        }
    }

    fn detach_from_group(&self) {
        let group = self.core.group.lock().take().and_then(|weak| weak.upgrade());
        if let Some(group) = group {
            group.remove(&self.core);
        }
    }

    pub fn is_queued(&self) -> bool {
        self.core.queued.load(Ordering::Acquire)
    }

    pub fn is_done(&self) -> bool {
        self.core.done.load(Ordering::Acquire)
    }

    pub fn was_cancelled(&self) -> bool {
        self.core.is_cancelled()
    }

    pub fn ran_to_completion(&self) -> bool {
        self.core.ran_to_completion.load(Ordering::Acquire)
    }

    pub fn encountered_error(&self) -> bool {
        self.core.errored.load(Ordering::Acquire)
    }

    pub fn is_released(&self) -> bool {
        self.core.released.load(Ordering::Acquire)
    }

    /// `true` if the job or its group is high priority.
    pub fn is_high_priority(&self) -> bool {
        self.core.high_priority.load(Ordering::Acquire)
            || self.core.group().is_some_and(|g| g.high_priority)
    }

    pub fn state(&self) -> JobState {
        self.core
            .node()
            .map_or(JobState::Unbound, |node| node.state().into())
    }

    pub(crate) fn core(&self) -> &Arc<JobCore> {
        &self.core
    }

    pub(crate) fn same_job(&self, core: &Arc<JobCore>) -> bool {
        Arc::ptr_eq(&self.core, core)
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("label", &self.label())
            .field("state", &self.state())
            .field("done", &self.is_done())
            .field("cancelled", &self.was_cancelled())
            .finish()
    }
}

/// Bind `core` to `node` for a new submission.
pub(crate) fn attach_node(core: &Arc<JobCore>, node: &Arc<ScheduleNode>) {
    *core.node.lock() = Some(Arc::clone(node));
}

/// Undo [`attach_node`] after a rejected submission.
pub(crate) fn detach_rejected(core: &Arc<JobCore>, node: &Arc<ScheduleNode>) {
    let mut slot = core.node.lock();
    if slot.as_ref().is_some_and(|current| Arc::ptr_eq(current, node)) {
        *slot = None;
    }
}
