// src/dag/node.rs

//! Per-submission scheduling record.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, AtomicUsize, Ordering};

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::dag::state::NodeState;
use crate::engine::Shared;
use crate::job::JobCore;
use crate::sync::Latch;

/// Mutable part of a node, guarded by one lock.
#[derive(Default)]
struct NodeInner {
    /// Nodes waiting on this one. Back-references only; they own nothing.
    dependants: Vec<Arc<ScheduleNode>>,
    /// The job this node schedules. Dropped once the node has resolved so
    /// that job -> node -> job never outlives the submission.
    item: Option<Arc<JobCore>>,
    /// Worker slot running the node while `Running`.
    worker: Option<usize>,
    /// Set exactly once, by whoever resolves the node.
    resolved: bool,
}

/// Scheduling record bound to one submission of a job.
///
/// Nodes are pooled: after a job has been waited on, its node goes back to
/// the scheduler's [`ObjectPool`](crate::sync::ObjectPool) and is only handed
/// out again once nothing else references it. Every reuse bumps the
/// generation counter.
pub struct ScheduleNode {
    state: AtomicU8,
    /// Unresolved dependencies, plus one while the submitting thread is
    /// still wiring edges.
    pending: AtomicUsize,
    high_priority: AtomicBool,
    generation: AtomicU64,
    latch: Latch,
    inner: Mutex<NodeInner>,
}

impl ScheduleNode {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(NodeState::None as u8),
            pending: AtomicUsize::new(0),
            high_priority: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            latch: Latch::new(),
            inner: Mutex::new(NodeInner::default()),
        }
    }

    /// Reset a fresh or recycled node for a new submission of `item`.
    ///
    /// The node starts with one pending "submission guard" so it cannot be
    /// queued before the submitter has finished adding its edges.
    pub(crate) fn bind(&self, item: Arc<JobCore>, high_priority: bool) {
        {
            let mut inner = self.inner.lock();
            inner.dependants.clear();
            inner.item = Some(item);
            inner.worker = None;
            inner.resolved = false;
        }
        self.state.store(NodeState::None as u8, Ordering::Release);
        self.pending.store(1, Ordering::Release);
        self.high_priority.store(high_priority, Ordering::Release);
        self.latch.reset();
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    /// Drop the job binding of a node that never got scheduled.
    pub(crate) fn unbind(&self) {
        let mut inner = self.inner.lock();
        inner.item = None;
        inner.dependants.clear();
        inner.resolved = true;
        drop(inner);
        self.state.store(NodeState::Completed as u8, Ordering::Release);
        self.latch.open();
    }

    pub fn state(&self) -> NodeState {
        NodeState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub fn is_high_priority(&self) -> bool {
        self.high_priority.load(Ordering::Acquire)
    }

    pub fn is_idle(&self) -> bool {
        self.state() == NodeState::None
    }

    pub fn is_cancelled(&self) -> bool {
        self.state() == NodeState::Cancelled
    }

    /// Whether completion has been published (latch opened).
    pub fn is_resolved(&self) -> bool {
        self.latch.is_open()
    }

    pub fn pending_dependencies(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    pub(crate) fn latch(&self) -> &Latch {
        &self.latch
    }

    pub(crate) fn item(&self) -> Option<Arc<JobCore>> {
        self.inner.lock().item.clone()
    }

    pub(crate) fn worker(&self) -> Option<usize> {
        self.inner.lock().worker
    }

    pub fn label(&self) -> String {
        self.inner
            .lock()
            .item
            .as_ref()
            .map(|item| item.label().to_string())
            .unwrap_or_else(|| "<unbound>".to_string())
    }

    pub(crate) fn dependants_snapshot(&self) -> Vec<Arc<ScheduleNode>> {
        self.inner.lock().dependants.clone()
    }

    /// Record `dependant` as waiting on this node.
    ///
    /// Returns `false` (and changes nothing) if this node has already
    /// resolved: the dependency is satisfied and the edge is a no-op. The
    /// cycle check is the caller's job and must run first.
    pub(crate) fn add_dependant(&self, dependant: &Arc<ScheduleNode>) -> bool {
        let mut inner = self.inner.lock();
        if inner.resolved {
            trace!(
                node = %self,
                dependant = %dependant,
                "dependency already resolved; edge is a no-op"
            );
            return false;
        }

        inner.dependants.push(Arc::clone(dependant));
        dependant.pending.fetch_add(1, Ordering::AcqRel);
        trace!(node = %self, dependant = %dependant, "added dependant");
        true
    }

    /// Take an extra pending reference on a node that is still waiting on
    /// at least one dependency. Fails once the count has reached zero.
    pub(crate) fn try_hold_pending(&self) -> bool {
        self.pending
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                if n > 0 { Some(n + 1) } else { None }
            })
            .is_ok()
    }

    /// Drop one pending reference; `true` if this was the last one.
    pub(crate) fn release_pending(&self) -> bool {
        self.pending.fetch_sub(1, Ordering::AcqRel) == 1
    }

    fn transition(&self, from: NodeState, to: NodeState) -> bool {
        let ok = self
            .state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if ok {
            trace!(node = %self, ?from, ?to, "node state transition");
        }
        ok
    }

    /// `None -> Queued`.
    pub(crate) fn mark_queued(&self) -> bool {
        self.transition(NodeState::None, NodeState::Queued)
    }

    /// `Queued -> Running`, recording the claiming worker. Only one caller
    /// can ever win.
    pub(crate) fn try_claim(&self, worker: usize) -> bool {
        let mut inner = self.inner.lock();
        if self.transition(NodeState::Queued, NodeState::Running) {
            inner.worker = Some(worker);
            true
        } else {
            false
        }
    }

    /// `Running -> Completed`, or `Running -> Cancelled` when the job body
    /// unwound on an interruption. Fails when the node was cancelled
    /// meanwhile.
    pub(crate) fn finish_running(&self) -> bool {
        let mut inner = self.inner.lock();
        let to = if inner.item.as_ref().is_some_and(|item| item.is_cancelled()) {
            NodeState::Cancelled
        } else {
            NodeState::Completed
        };
        let finished = self.transition(NodeState::Running, to);
        inner.worker = None;
        finished
    }

    /// Move any non-terminal state to `Cancelled`.
    ///
    /// Returns the state the node was cancelled from, or `None` if it was
    /// already terminal.
    fn request_cancel(&self) -> Option<NodeState> {
        loop {
            let current = self.state();
            if current.is_terminal() {
                return None;
            }
            if self.transition(current, NodeState::Cancelled) {
                return Some(current);
            }
        }
    }

    /// Cancel this node and resolve it if nothing else will.
    ///
    /// - `None`: resolved immediately, the job never runs.
    /// - `Queued`: pulled out of whichever queue holds it and resolved
    ///   immediately; if a worker already popped it, that worker observes
    ///   the cancellation when it tries to claim the node.
    /// - `Running`: the owning worker is interrupted; it resolves the node
    ///   once the job body unwinds.
    ///
    /// Returns `true` if this call performed the cancellation.
    pub(crate) fn cancel(self: &Arc<Self>, shared: &Shared) -> bool {
        match self.begin_cancel(shared) {
            Some(resolve_now) => {
                if resolve_now {
                    self.resolve(shared, None);
                }
                true
            }
            None => false,
        }
    }

    /// State change and queue removal half of [`cancel`](Self::cancel).
    ///
    /// `None` if the node was already terminal, otherwise whether the
    /// caller has to resolve it.
    fn begin_cancel(self: &Arc<Self>, shared: &Shared) -> Option<bool> {
        let previous = self.request_cancel()?;

        if let Some(item) = self.item() {
            item.mark_cancelled();
        }

        debug!(node = %self, from = ?previous, "cancelling node");

        let resolve_now = match previous {
            NodeState::None => true,
            NodeState::Queued => shared.remove_queued(self),
            NodeState::Running => {
                if let Some(worker) = self.worker() {
                    shared.interrupt_worker(worker, self);
                }
                false
            }
            NodeState::Cancelled | NodeState::Completed => false,
        };
        Some(resolve_now)
    }

    /// Publish completion and release dependants. Runs exactly once per
    /// submission, for completed and cancelled nodes alike.
    ///
    /// `origin` is the worker resolving the node, if any: dependants that
    /// become runnable are pushed onto its local deque so they stay hot.
    ///
    /// Cancellation cascades through an explicit work-list, so chains of
    /// any depth resolve in constant stack.
    pub(crate) fn resolve(self: &Arc<Self>, shared: &Shared, origin: Option<usize>) {
        let mut cascade = Vec::new();
        self.resolve_one(shared, origin, &mut cascade);
        while let Some(node) = cascade.pop() {
            node.resolve_one(shared, None, &mut cascade);
        }
    }

    fn resolve_one(
        self: &Arc<Self>,
        shared: &Shared,
        origin: Option<usize>,
        cascade: &mut Vec<Arc<ScheduleNode>>,
    ) {
        let (item, dependants) = {
            let mut inner = self.inner.lock();
            if inner.resolved {
                return;
            }
            inner.resolved = true;
            (inner.item.clone(), std::mem::take(&mut inner.dependants))
        };

        let cancelled = self.is_cancelled();

        if let Some(item) = &item {
            item.mark_done();
        }
        self.latch.open();

        if let Some(item) = &item {
            if cancelled {
                item.run_cancel_hook();
            }
            item.run_completion_hook();
        }

        trace!(node = %self, cancelled, dependants = dependants.len(), "node resolved");

        // Nothing will run newly released work once the pool is stopping.
        let cancel_dependants = cancelled || !shared.is_active();

        let mut runnable = 0usize;
        for dependant in dependants {
            if cancel_dependants {
                if dependant.begin_cancel(shared) == Some(true) {
                    cascade.push(dependant);
                }
                continue;
            }

            if dependant.is_idle() && dependant.release_pending() && dependant.mark_queued() {
                debug!(node = %self, dependant = %dependant, "dependant became runnable");
                shared.push_ready(dependant, origin);
                runnable += 1;
            }
        }

        // The resolving worker picks one of them up itself.
        let wake = if origin.is_some() { runnable.saturating_sub(1) } else { runnable };
        if wake > 0 {
            shared.signal_work_available(wake);
        }

        self.inner.lock().item = None;
    }
}

impl Default for ScheduleNode {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ScheduleNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = self
            .inner
            .try_lock()
            .and_then(|inner| inner.item.as_ref().map(|item| item.label().to_string()));
        match label {
            Some(label) => write!(f, "[{}#{}]", label, self.generation()),
            None => write!(f, "[node#{}]", self.generation()),
        }
    }
}

impl fmt::Debug for ScheduleNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduleNode")
            .field("generation", &self.generation())
            .field("state", &self.state())
            .field("pending", &self.pending_dependencies())
            .field("high_priority", &self.is_high_priority())
            .finish_non_exhaustive()
    }
}
