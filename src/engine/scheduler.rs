// src/engine/scheduler.rs

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::{debug, info, warn};

use super::client::ClientChannel;
use super::host::{Host, NoopHost};
use super::stats::SchedulerStats;
use super::worker::{self, WorkerSlot};
use crate::config::SchedulerConfig;
use crate::dag::{ScheduleNode, would_create_cycle};
use crate::errors::{Result, SchedulerError};
use crate::job::{self, Job, JobBuilder, JobContext, JobCore, WorkGroup};
use crate::sync::ObjectPool;

/// Upper bound on recycled nodes kept around for reuse.
const MAX_POOLED_NODES: usize = 4096;

/// State shared by the scheduler handle, its workers and every job.
pub struct Shared {
    pub(crate) config: SchedulerConfig,
    pub(crate) host: Arc<dyn Host>,
    active: AtomicBool,

    /// Front: high priority. Back: normal priority.
    pub(crate) global: Mutex<VecDeque<Arc<ScheduleNode>>>,
    pub(crate) slots: Vec<WorkerSlot>,
    /// Nodes sitting in any queue. Lets idle workers skip locking deques.
    queued_total: AtomicUsize,
    idle_lock: Mutex<()>,
    idle_cond: Condvar,

    /// Serialises edge insertion so cycle checks see a stable graph.
    graph: Mutex<()>,
    pool: ObjectPool<ScheduleNode>,
    pub(crate) client: ClientChannel,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Shared {
    fn new(config: SchedulerConfig, host: Arc<dyn Host>) -> Self {
        let slots = (0..config.worker_count).map(WorkerSlot::new).collect();
        Self {
            config,
            host,
            active: AtomicBool::new(true),
            global: Mutex::new(VecDeque::new()),
            slots,
            queued_total: AtomicUsize::new(0),
            idle_lock: Mutex::new(()),
            idle_cond: Condvar::new(),
            graph: Mutex::new(()),
            pool: ObjectPool::new(MAX_POOLED_NODES),
            client: ClientChannel::new(),
            handles: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub(crate) fn graph_lock(&self) -> MutexGuard<'_, ()> {
        self.graph.lock()
    }

    /// Bind a node to `core` and wire it after `deps`.
    ///
    /// Every edge is checked before any is added, so a rejected submission
    /// leaves the graph and the job exactly as they were. `accept` runs once
    /// the submission is known to be valid, before any edge exists.
    pub(crate) fn queue(
        &self,
        core: &Arc<JobCore>,
        high_priority: bool,
        deps: &[&Job],
        accept: impl FnOnce(),
    ) -> Result<()> {
        let (node, reused) = self.pool.obtain_with(ScheduleNode::new);
        node.bind(Arc::clone(core), high_priority);
        job::attach_node(core, &node);

        {
            let _graph = self.graph.lock();
            let dep_nodes: Vec<(&Job, Arc<ScheduleNode>)> = deps
                .iter()
                .filter_map(|dep| dep.core().node().map(|n| (*dep, n)))
                .collect();

            let cycle = dep_nodes
                .iter()
                .find(|(_, dep_node)| would_create_cycle(&node, dep_node))
                .map(|(dep, _)| dep.label().to_string());

            if let Some(dependency) = cycle {
                let err = SchedulerError::CyclicDependency {
                    dependant: core.label().to_string(),
                    dependency,
                };
                job::detach_rejected(core, &node);
                node.unbind();
                self.pool.recycle(node);
                warn!(job = %core.label(), error = %err, "rejected submission");
                return Err(err);
            }

            accept();

            for (_, dep_node) in &dep_nodes {
                dep_node.add_dependant(&node);
            }
        }

        debug!(
            job = %core.label(),
            high_priority,
            deps = deps.len(),
            reused,
            "job submitted"
        );

        self.release_submission_guard(&node);
        Ok(())
    }

    /// Drop a temporary pending reference; queue the node if it was the
    /// last one.
    pub(crate) fn release_submission_guard(&self, node: &Arc<ScheduleNode>) {
        if node.release_pending() && node.mark_queued() {
            self.push_ready(Arc::clone(node), None);
            self.signal_work_available(1);
        }
    }

    /// Queue a runnable node on worker `origin`'s deque, or globally.
    pub(crate) fn push_ready(&self, node: Arc<ScheduleNode>, origin: Option<usize>) {
        let high = node.is_high_priority();
        match origin.and_then(|index| self.slots.get(index)) {
            Some(slot) => slot.push(node, high),
            None => {
                let mut global = self.global.lock();
                if high {
                    global.push_front(node);
                } else {
                    global.push_back(node);
                }
            }
        }
        self.queued_total.fetch_add(1, Ordering::AcqRel);
    }

    /// Pull `node` out of whichever queue holds it.
    pub(crate) fn remove_queued(&self, node: &Arc<ScheduleNode>) -> bool {
        let removed = remove_from(&mut self.global.lock(), node)
            || self
                .slots
                .iter()
                .any(|slot| remove_from(&mut slot.local.lock(), node));
        if removed {
            self.note_dequeued(1);
        }
        removed
    }

    pub(crate) fn note_dequeued(&self, count: usize) {
        let _ = self
            .queued_total
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                Some(n.saturating_sub(count))
            });
    }

    pub(crate) fn has_queued_work(&self) -> bool {
        self.queued_total.load(Ordering::Acquire) > 0
    }

    /// Wake up to `count` parked workers.
    pub(crate) fn signal_work_available(&self, count: usize) {
        let _idle = self.idle_lock.lock();
        if count >= self.slots.len() {
            self.idle_cond.notify_all();
        } else {
            for _ in 0..count {
                self.idle_cond.notify_one();
            }
        }
    }

    /// Park the calling worker until work is signalled or the park bound
    /// elapses.
    pub(crate) fn park_idle(&self) {
        let mut idle = self.idle_lock.lock();
        if self.is_active() && !self.has_queued_work() {
            self.idle_cond.wait_for(&mut idle, self.config.idle_park);
        }
    }

    /// Interrupt worker `index` if it is still running `node`. A worker never
    /// interrupts itself.
    pub(crate) fn interrupt_worker(&self, index: usize, node: &Arc<ScheduleNode>) {
        let Some(slot) = self.slots.get(index) else {
            return;
        };
        if slot.is_current_thread() {
            return;
        }
        let current = slot.current.lock();
        if current.as_ref().is_some_and(|running| Arc::ptr_eq(running, node)) {
            slot.interrupted.store(true, Ordering::Release);
            debug!(worker = index, job = %node, "interrupted worker");
        }
    }

    pub(crate) fn is_worker_interrupted(&self, index: usize) -> bool {
        self.slots
            .get(index)
            .is_some_and(|slot| slot.interrupted.load(Ordering::Acquire))
    }

    pub(crate) fn current_worker_index(&self) -> Option<usize> {
        self.slots.iter().position(WorkerSlot::is_current_thread)
    }

    /// Whether the calling thread is the worker running `node`.
    pub(crate) fn is_running_on_current_worker(&self, node: &Arc<ScheduleNode>) -> bool {
        self.current_worker_index()
            .and_then(|index| self.slots.get(index))
            .is_some_and(|slot| {
                slot.current
                    .lock()
                    .as_ref()
                    .is_some_and(|running| Arc::ptr_eq(running, node))
            })
    }

    pub(crate) fn worker_job_label(&self, index: usize) -> String {
        self.slots
            .get(index)
            .map(|slot| slot.current_label().unwrap_or_else(|| slot.name.clone()))
            .unwrap_or_default()
    }

    pub(crate) fn recycle_node(&self, node: Arc<ScheduleNode>) {
        if node.is_resolved() {
            self.pool.recycle(node);
        }
    }

    pub(crate) fn log_worker_states(&self) {
        for slot in &self.slots {
            match slot.current_label() {
                Some(job) => debug!(worker = %slot.name, %job, queued = slot.queued(), "worker running"),
                None => debug!(worker = %slot.name, queued = slot.queued(), "worker idle"),
            }
        }
    }

    fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            workers: self.slots.len(),
            inflight: self.inflight_workers(),
            global_queued: self.global.lock().len(),
            local_queued: self.slots.iter().map(WorkerSlot::queued).sum(),
            pooled_nodes: self.pool.idle(),
            pending_client_callbacks: self.client.len(),
        }
    }

    fn inflight_workers(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.inflight.load(Ordering::Acquire))
            .count()
    }

    fn shutdown(&self) {
        if !self.active.swap(false, Ordering::AcqRel) {
            return;
        }
        info!(workers = self.slots.len(), "shutting down scheduler");

        // Cancel queued work rather than dropping it, so waiters wake up.
        let mut drained: Vec<Arc<ScheduleNode>> = self.global.lock().drain(..).collect();
        for slot in &self.slots {
            drained.extend(slot.local.lock().drain(..));
        }
        self.queued_total.store(0, Ordering::Release);

        debug!(count = drained.len(), "cancelling queued jobs");
        for node in drained {
            node.cancel(self);
            if node.is_cancelled() {
                node.resolve(self, None);
            }
        }

        for slot in &self.slots {
            slot.interrupted.store(true, Ordering::Release);
            let running = slot.current.lock().clone();
            if let Some(node) = running {
                node.cancel(self);
            }
        }

        {
            let _idle = self.idle_lock.lock();
            self.idle_cond.notify_all();
        }

        let handles: Vec<JoinHandle<()>> = self.handles.lock().drain(..).collect();
        let current = thread::current().id();
        for handle in handles {
            if handle.thread().id() == current {
                continue;
            }
            self.join_with_timeout(handle);
        }

        info!("scheduler shut down");
    }

    fn join_with_timeout(&self, handle: JoinHandle<()>) {
        let deadline = Instant::now() + self.config.shutdown_timeout;
        while !handle.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }

        let name = handle.thread().name().unwrap_or("<unnamed>").to_string();
        if handle.is_finished() {
            if handle.join().is_err() {
                warn!(worker = %name, "worker thread panicked");
            }
        } else {
            warn!(
                worker = %name,
                timeout = ?self.config.shutdown_timeout,
                "worker did not terminate within shutdown timeout"
            );
        }
    }
}

fn remove_from(queue: &mut VecDeque<Arc<ScheduleNode>>, node: &Arc<ScheduleNode>) -> bool {
    match queue.iter().position(|queued| Arc::ptr_eq(queued, node)) {
        Some(pos) => {
            queue.remove(pos);
            true
        }
        None => false,
    }
}

/// Handle to a running worker pool.
///
/// Cloning is cheap; every clone drives the same pool. The pool runs until
/// [`Scheduler::shutdown`] is called.
#[derive(Clone)]
pub struct Scheduler {
    shared: Arc<Shared>,
}

impl Scheduler {
    /// Start the worker pool and bind the calling thread as the client
    /// thread.
    pub fn initialize(config: SchedulerConfig) -> Result<Self> {
        Self::initialize_with_host(config, Arc::new(NoopHost))
    }

    pub fn initialize_with_host(config: SchedulerConfig, host: Arc<dyn Host>) -> Result<Self> {
        let worker_count = config.worker_count.max(1);
        let config = SchedulerConfig {
            worker_count,
            ..config
        };

        let shared = Arc::new(Shared::new(config, host));
        shared.client.bind_current_thread();
        let scheduler = Self { shared };

        for index in 0..worker_count {
            let worker_shared = Arc::clone(&scheduler.shared);
            let spawned = thread::Builder::new()
                .name(scheduler.shared.slots[index].name.clone())
                .spawn(move || worker::run(worker_shared, index));

            match spawned {
                Ok(handle) => scheduler.shared.handles.lock().push(handle),
                Err(err) => {
                    warn!(worker = index, error = %err, "failed to spawn worker thread");
                    scheduler.shutdown();
                    return Err(err.into());
                }
            }
        }

        info!(
            workers = worker_count,
            deadlock_timeout = ?scheduler.shared.config.deadlock_timeout,
            "scheduler initialized"
        );
        Ok(scheduler)
    }

    pub(crate) fn from_shared(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    /// Create an asynchronous job running `work`.
    pub fn job<F>(&self, label: impl Into<String>, work: F) -> Job
    where
        F: FnMut(&JobContext<'_>) -> anyhow::Result<()> + Send + 'static,
    {
        self.build_job(label, work).build()
    }

    /// Start building a job with hooks or inline execution.
    pub fn build_job<F>(&self, label: impl Into<String>, work: F) -> JobBuilder
    where
        F: FnMut(&JobContext<'_>) -> anyhow::Result<()> + Send + 'static,
    {
        JobBuilder::new(Arc::clone(&self.shared), label.into(), Box::new(work))
    }

    pub fn group(&self, high_priority: bool, auto_release: bool) -> WorkGroup {
        WorkGroup::new(high_priority, auto_release)
    }

    /// Make the calling thread the client thread.
    pub fn bind_client_thread(&self) {
        self.shared.client.bind_current_thread();
    }

    /// The client thread's scheduled tick: run every queued callback.
    pub fn process_client_callbacks(&self) -> usize {
        self.shared.client.process(false)
    }

    /// Run only the immediate callbacks, leaving the rest queued.
    pub fn process_pending_client_callbacks(&self) -> usize {
        self.shared.client.process(true)
    }

    /// Run `callback` on the client thread from any thread.
    pub fn invoke_on_client<R, F>(&self, immediate: bool, callback: F) -> Result<R>
    where
        R: Send + 'static,
        F: FnOnce() -> R + Send + 'static,
    {
        self.shared.invoke_on_client(immediate, callback)
    }

    /// Stop the pool: cancel queued work, interrupt running jobs and join
    /// every worker within the configured timeout. Idempotent.
    pub fn shutdown(&self) {
        self.shared.shutdown();
    }

    pub fn is_active(&self) -> bool {
        self.shared.is_active()
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.shared.config
    }

    pub fn worker_count(&self) -> usize {
        self.shared.slots.len()
    }

    pub fn inflight_worker_count(&self) -> usize {
        self.shared.inflight_workers()
    }

    pub fn has_idle_workers(&self) -> bool {
        self.inflight_worker_count() < self.worker_count()
    }

    /// Jobs queued in the global queue and every worker deque.
    pub fn work_queue_len(&self) -> usize {
        self.shared.stats().queued()
    }

    pub fn is_worker_thread(&self) -> bool {
        self.shared.current_worker_index().is_some()
    }

    pub fn is_client_thread(&self) -> bool {
        self.shared.client.is_client_thread()
    }

    /// Debug-log what every worker is doing.
    pub fn log_worker_states(&self) {
        self.shared.log_worker_states();
    }

    pub fn stats(&self) -> SchedulerStats {
        self.shared.stats()
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("active", &self.is_active())
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}
