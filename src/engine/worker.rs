// src/engine/worker.rs

//! Worker threads and their work-stealing loop.

use std::collections::VecDeque;
use std::hint;
use std::sync::Arc;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, ThreadId};
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use tracing::{debug, trace};

use super::Shared;
use crate::dag::ScheduleNode;

/// Per-worker state shared with the rest of the scheduler.
#[derive(Debug)]
pub struct WorkerSlot {
    pub(crate) index: usize,
    pub(crate) name: String,
    /// Front: next to run (high priority goes here). Back: normal work.
    pub(crate) local: Mutex<VecDeque<Arc<ScheduleNode>>>,
    /// Set while the worker is executing a job.
    pub(crate) inflight: AtomicBool,
    /// Cooperative interrupt for the job currently running here.
    pub(crate) interrupted: AtomicBool,
    pub(crate) current: Mutex<Option<Arc<ScheduleNode>>>,
    pub(crate) thread: OnceLock<ThreadId>,
}

impl WorkerSlot {
    pub(crate) fn new(index: usize) -> Self {
        Self {
            index,
            name: format!("jobdag-worker-{index}"),
            local: Mutex::new(VecDeque::new()),
            inflight: AtomicBool::new(false),
            interrupted: AtomicBool::new(false),
            current: Mutex::new(None),
            thread: OnceLock::new(),
        }
    }

    pub(crate) fn is_current_thread(&self) -> bool {
        self.thread.get() == Some(&thread::current().id())
    }

    pub(crate) fn push(&self, node: Arc<ScheduleNode>, high_priority: bool) {
        let mut local = self.local.lock();
        if high_priority {
            local.push_front(node);
        } else {
            local.push_back(node);
        }
    }

    pub(crate) fn queued(&self) -> usize {
        self.local.lock().len()
    }

    /// Label of the job running here, for diagnostics.
    pub(crate) fn current_label(&self) -> Option<String> {
        self.current.lock().as_ref().map(|node| node.label())
    }
}

/// xorshift32; victim selection only needs to be cheap and spread out.
struct VictimRng(u32);

impl VictimRng {
    fn seeded(index: usize) -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.subsec_nanos())
            .unwrap_or(0);
        let seed = nanos ^ (index as u32).wrapping_mul(0x9E37_79B9);
        Self(if seed == 0 { 0x2545_F491 } else { seed })
    }

    fn next(&mut self) -> u32 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.0 = x;
        x
    }

    /// Uniform-ish index in `0..len`, never `skip`. `len` must be >= 2.
    fn victim(&mut self, len: usize, skip: usize) -> usize {
        let pick = self.next() as usize % (len - 1);
        if pick >= skip { pick + 1 } else { pick }
    }
}

/// Body of a worker thread. Returns once the scheduler is shut down.
pub(crate) fn run(shared: Arc<Shared>, index: usize) {
    let Some(slot) = shared.slots.get(index) else {
        return;
    };
    let _ = slot.thread.set(thread::current().id());
    let mut rng = VictimRng::seeded(index);

    debug!(worker = index, "worker started");

    while shared.is_active() {
        match find_work(&shared, slot, &mut rng) {
            Some(node) => process(&shared, slot, node),
            None => idle(&shared, slot),
        }
    }

    debug!(worker = index, "worker stopped");
}

/// Local deque, then a random peer, then the global queue.
fn find_work(shared: &Shared, slot: &WorkerSlot, rng: &mut VictimRng) -> Option<Arc<ScheduleNode>> {
    let local = slot.local.lock().pop_front();
    if let Some(node) = local {
        shared.note_dequeued(1);
        return Some(node);
    }

    if let Some(node) = steal(shared, slot, rng) {
        return Some(node);
    }

    let global = shared.global.lock().pop_front();
    if let Some(node) = global {
        shared.note_dequeued(1);
        return Some(node);
    }

    None
}

/// Take half (rounded up) of a random peer's deque. The first stolen node is
/// returned; the rest move to our own deque.
fn steal(shared: &Shared, slot: &WorkerSlot, rng: &mut VictimRng) -> Option<Arc<ScheduleNode>> {
    let workers = shared.slots.len();
    if workers < 2 {
        return None;
    }

    let victim = &shared.slots[rng.victim(workers, slot.index)];
    let mut stolen: Vec<Arc<ScheduleNode>> = {
        let mut theirs = victim.local.lock();
        let count = theirs.len().div_ceil(2);
        theirs.drain(..count).collect()
    };

    if stolen.is_empty() {
        return None;
    }

    trace!(worker = slot.index, victim = victim.index, count = stolen.len(), "stole work");

    let first = stolen.remove(0);
    shared.note_dequeued(1);

    if !stolen.is_empty() {
        let mut ours = slot.local.lock();
        for node in stolen {
            if node.is_high_priority() {
                ours.push_front(node);
            } else {
                ours.push_back(node);
            }
        }
    }

    Some(first)
}

fn idle(shared: &Shared, slot: &WorkerSlot) {
    slot.inflight.store(false, Ordering::Release);

    for _ in 0..shared.config.idle_spin_iterations {
        if shared.has_queued_work() || !shared.is_active() {
            return;
        }
        hint::spin_loop();
    }

    shared.park_idle();
}

/// Run one node to its terminal state and resolve it.
fn process(shared: &Arc<Shared>, slot: &WorkerSlot, node: Arc<ScheduleNode>) {
    if node.is_cancelled() {
        node.resolve(shared, Some(slot.index));
        return;
    }

    // Published before the claim: once the node is `Running`, a canceller
    // always finds it here and can raise the interrupt.
    *slot.current.lock() = Some(Arc::clone(&node));

    if !node.try_claim(slot.index) {
        *slot.current.lock() = None;
        // A concurrent cancel won; whoever holds the node last resolves it.
        if node.is_cancelled() {
            node.resolve(shared, Some(slot.index));
        }
        return;
    }

    slot.inflight.store(true, Ordering::Release);

    if let Some(item) = node.item() {
        trace!(worker = slot.index, job = %item.label(), "running job");
        item.execute(shared, Some(slot.index));
    }

    {
        let mut current = slot.current.lock();
        *current = None;
        slot.interrupted.store(false, Ordering::Release);
    }

    node.finish_running();
    node.resolve(shared, Some(slot.index));
}
