// src/engine/client.rs

//! Marshalling closures from worker threads onto the client thread.
//!
//! Workers enqueue a callback and block on a single-use channel until the
//! client thread has run it. The client thread drains the queue on its
//! scheduled tick ([`ClientChannel::process`] with `immediate_only = false`)
//! and, for immediate callbacks only, while it is itself waiting on a job.

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, ThreadId};
use std::time::Duration;

use anyhow::anyhow;
use crossbeam_channel::{RecvTimeoutError, bounded};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace, warn};

use super::Shared;
use crate::errors::{Result, SchedulerError};

/// Longest a worker blocks on its callback before checking for
/// interruption.
const CALLBACK_WAIT_SLICE: Duration = Duration::from_millis(5);

struct PendingCallback {
    id: u64,
    immediate: bool,
    run: Box<dyn FnOnce() + Send>,
}

/// Queue of callbacks waiting for the client thread.
#[derive(Default)]
pub struct ClientChannel {
    queue: Mutex<VecDeque<PendingCallback>>,
    next_id: AtomicU64,
    wake_scheduled: AtomicBool,
    client_thread: RwLock<Option<ThreadId>>,
}

impl ClientChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the calling thread the client thread.
    pub fn bind_current_thread(&self) {
        let id = thread::current().id();
        *self.client_thread.write() = Some(id);
        debug!(thread = ?id, "bound client thread");
    }

    pub fn is_client_thread(&self) -> bool {
        *self.client_thread.read() == Some(thread::current().id())
    }

    pub fn has_client_thread(&self) -> bool {
        self.client_thread.read().is_some()
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    fn push(&self, immediate: bool, run: Box<dyn FnOnce() + Send>) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let entry = PendingCallback { id, immediate, run };
        let mut queue = self.queue.lock();
        if immediate {
            queue.push_front(entry);
        } else {
            queue.push_back(entry);
        }
        id
    }

    /// Take callback `id` back out of the queue if the client thread has not
    /// picked it up yet.
    fn remove(&self, id: u64) -> bool {
        let mut queue = self.queue.lock();
        match queue.iter().position(|entry| entry.id == id) {
            Some(pos) => {
                queue.remove(pos);
                true
            }
            None => false,
        }
    }

    /// `true` if the caller should ask the host for a client tick.
    fn schedule_wake(&self) -> bool {
        !self.wake_scheduled.swap(true, Ordering::AcqRel)
    }

    /// Run queued callbacks on the calling thread.
    ///
    /// With `immediate_only`, non-immediate callbacks are rotated to the back
    /// of the queue untouched. Callbacks queued while processing wait for
    /// the next call. Returns the number of callbacks run.
    pub fn process(&self, immediate_only: bool) -> usize {
        if !immediate_only {
            self.wake_scheduled.store(false, Ordering::Release);
        }

        let budget = self.queue.lock().len();
        let mut ran = 0;

        for _ in 0..budget {
            let Some(entry) = self.queue.lock().pop_front() else {
                break;
            };

            if immediate_only && !entry.immediate {
                self.queue.lock().push_back(entry);
                continue;
            }

            trace!(id = entry.id, immediate = entry.immediate, "running client callback");
            if panic::catch_unwind(AssertUnwindSafe(entry.run)).is_err() {
                warn!(id = entry.id, "client callback panicked");
            }
            ran += 1;
        }

        ran
    }
}

impl Shared {
    /// Run `callback` on the client thread and hand back its value.
    ///
    /// On the client thread itself the callback runs inline, followed by any
    /// other immediate callbacks. Elsewhere the caller blocks until the
    /// client thread has run it; a worker whose job is cancelled meanwhile
    /// withdraws the callback and gets [`SchedulerError::Interrupted`].
    pub(crate) fn invoke_on_client<R, F>(&self, immediate: bool, callback: F) -> Result<R>
    where
        R: Send + 'static,
        F: FnOnce() -> R + Send + 'static,
    {
        if !self.is_active() {
            return Err(SchedulerError::Inactive);
        }

        if self.client.is_client_thread() {
            let value = callback();
            self.client.process(true);
            return Ok(value);
        }

        if !self.client.has_client_thread() {
            return Err(SchedulerError::NoClientThread);
        }

        let (tx, rx) = bounded::<R>(1);
        let id = self.client.push(
            immediate,
            Box::new(move || {
                let _ = tx.send(callback());
            }),
        );

        if self.client.schedule_wake() {
            self.host.wake_client();
        }

        let worker = self.current_worker_index();

        loop {
            match rx.recv_timeout(CALLBACK_WAIT_SLICE) {
                Ok(value) => return Ok(value),
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(SchedulerError::Other(anyhow!(
                        "client callback {id} panicked before producing a value"
                    )));
                }
                Err(RecvTimeoutError::Timeout) => {
                    let interrupted = worker.is_some_and(|index| self.is_worker_interrupted(index));
                    if !interrupted && self.is_active() {
                        continue;
                    }
                    // Once the client thread has taken the callback, wait
                    // for it to finish instead.
                    if self.client.remove(id) {
                        debug!(id, interrupted, "withdrew client callback");
                        return Err(match worker {
                            Some(index) if interrupted => {
                                SchedulerError::Interrupted(self.worker_job_label(index))
                            }
                            _ => SchedulerError::Inactive,
                        });
                    }
                }
            }
        }
    }
}
