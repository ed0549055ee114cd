// src/sync/pool.rs

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

/// Shared free-list of reference-counted objects.
///
/// An entry is only handed out again once the pool holds the *last* strong
/// reference to it, so an object can never be recycled while another thread
/// still observes it. Entries that are still referenced are rotated to the
/// back and a fresh object is allocated instead.
#[derive(Debug)]
pub struct ObjectPool<T> {
    free: Mutex<VecDeque<Arc<T>>>,
    max_idle: usize,
}

impl<T> ObjectPool<T> {
    pub fn new(max_idle: usize) -> Self {
        Self {
            free: Mutex::new(VecDeque::new()),
            max_idle,
        }
    }

    /// Take a reusable object, or build a new one with `make`.
    ///
    /// The caller is responsible for resetting a reused object.
    pub fn obtain_with(&self, make: impl FnOnce() -> T) -> (Arc<T>, bool) {
        let mut free = self.free.lock();
        if let Some(candidate) = free.pop_front() {
            if Arc::strong_count(&candidate) == 1 {
                return (candidate, true);
            }
            free.push_back(candidate);
        }
        drop(free);
        (Arc::new(make()), false)
    }

    /// Return an object to the pool. Dropped instead when the pool is full.
    pub fn recycle(&self, item: Arc<T>) {
        let mut free = self.free.lock();
        if free.len() < self.max_idle {
            free.push_back(item);
        }
    }

    /// Number of objects currently parked in the pool.
    pub fn idle(&self) -> usize {
        self.free.lock().len()
    }
}
