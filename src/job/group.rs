// src/job/group.rs

//! Bulk handle over a batch of submitted jobs.

use std::collections::VecDeque;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::debug;

use crate::job::{Job, JobCore};

#[derive(Debug)]
pub(crate) struct GroupInner {
    pending: Mutex<VecDeque<Job>>,
    pub(crate) high_priority: bool,
    auto_release: bool,
}

impl GroupInner {
    /// Drop `core` from the pending set once it has been waited on.
    pub(crate) fn remove(&self, core: &Arc<JobCore>) {
        self.pending.lock().retain(|job| !job.same_job(core));
    }

    fn pop(&self) -> Option<Job> {
        self.pending.lock().pop_front()
    }
}

/// A set of jobs submitted with [`Job::submit_in`] that can be completed or
/// cancelled together. Cloning is cheap and clones share the pending set.
#[derive(Debug, Clone)]
pub struct WorkGroup {
    inner: Arc<GroupInner>,
}

impl WorkGroup {
    pub fn new(high_priority: bool, auto_release: bool) -> Self {
        Self {
            inner: Arc::new(GroupInner {
                pending: Mutex::new(VecDeque::new()),
                high_priority,
                auto_release,
            }),
        }
    }

    pub fn is_high_priority(&self) -> bool {
        self.inner.high_priority
    }

    pub fn auto_release(&self) -> bool {
        self.inner.auto_release
    }

    pub fn pending_count(&self) -> usize {
        self.inner.pending.lock().len()
    }

    pub(crate) fn downgrade(&self) -> Weak<GroupInner> {
        Arc::downgrade(&self.inner)
    }

    pub(crate) fn register(&self, job: Job) {
        let mut pending = self.inner.pending.lock();
        if !pending.iter().any(|existing| existing.same_job(job.core())) {
            pending.push_back(job);
        }
    }

    /// Wait for every pending job, releasing each one when the group
    /// auto-releases. Jobs submitted concurrently are drained too.
    pub fn complete(&self) {
        let mut drained = 0usize;
        while let Some(job) = self.inner.pop() {
            job.wait_for_completion(None);
            if self.inner.auto_release {
                job.release();
            }
            drained += 1;
        }
        debug!(jobs = drained, "work group completed");
    }

    /// Cancel every pending job, releasing each one when the group
    /// auto-releases.
    pub fn cancel(&self) {
        let mut drained = 0usize;
        while let Some(job) = self.inner.pop() {
            job.cancel();
            if self.inner.auto_release {
                job.release();
            }
            drained += 1;
        }
        debug!(jobs = drained, "work group cancelled");
    }
}
