// src/engine/stats.rs

use std::fmt;

/// Point-in-time snapshot of the scheduler's queues and workers.
///
/// Counters are read without a global lock, so they may be slightly
/// inconsistent with each other under load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SchedulerStats {
    pub workers: usize,
    /// Workers currently executing a job.
    pub inflight: usize,
    pub global_queued: usize,
    /// Nodes sitting in worker-local deques.
    pub local_queued: usize,
    /// Nodes parked in the free-list, ready for reuse.
    pub pooled_nodes: usize,
    pub pending_client_callbacks: usize,
}

impl SchedulerStats {
    pub fn queued(&self) -> usize {
        self.global_queued + self.local_queued
    }
}

impl fmt::Display for SchedulerStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "workers={} inflight={} queued={} (global={}, local={}) pooled={} client_callbacks={}",
            self.workers,
            self.inflight,
            self.queued(),
            self.global_queued,
            self.local_queued,
            self.pooled_nodes,
            self.pending_client_callbacks
        )
    }
}
