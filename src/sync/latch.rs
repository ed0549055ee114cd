// src/sync/latch.rs

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Binary latch: closed until [`Latch::open`] is called, then every current
/// and future waiter passes until [`Latch::reset`] closes it again.
///
/// One thread opens it, any number of threads may wait on it.
#[derive(Debug, Default)]
pub struct Latch {
    open: Mutex<bool>,
    cond: Condvar,
}

impl Latch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the latch and wake every waiter.
    pub fn open(&self) {
        let mut open = self.open.lock();
        *open = true;
        self.cond.notify_all();
    }

    /// Close the latch for reuse. Must not race with waiters of the previous
    /// cycle; nodes only reset once no other reference to them remains.
    pub fn reset(&self) {
        *self.open.lock() = false;
    }

    pub fn is_open(&self) -> bool {
        *self.open.lock()
    }

    /// Block until the latch opens or `timeout` elapses.
    ///
    /// Returns `true` if the latch is open.
    pub fn wait_for(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut open = self.open.lock();
        while !*open {
            if self.cond.wait_until(&mut open, deadline).timed_out() {
                return *open;
            }
        }
        true
    }
}
