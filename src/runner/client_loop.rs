// src/runner/client_loop.rs

//! Dedicated client thread for the `jobdag` binary.
//!
//! The thread binds itself as the scheduler's client thread and runs the
//! queued client callbacks whenever the host wakes it, and on a fixed tick
//! in case a wake-up was coalesced away.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};
use tracing::{debug, warn};

use crate::engine::Scheduler;
use crate::errors::{Result, SchedulerError};

const CLIENT_TICK: Duration = Duration::from_millis(16);

pub struct ClientLoop {
    handle: JoinHandle<()>,
    stop: Arc<AtomicBool>,
    wake_tx: Sender<()>,
}

impl ClientLoop {
    /// Spawn the client thread and wait until it has bound itself.
    pub fn spawn(scheduler: Scheduler, wake_tx: Sender<()>, wake_rx: Receiver<()>) -> Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = bounded::<()>(1);

        let thread_stop = Arc::clone(&stop);
        let handle = thread::Builder::new()
            .name("jobdag-client".to_string())
            .spawn(move || {
                scheduler.bind_client_thread();
                let _ = ready_tx.send(());
                run(scheduler, wake_rx, thread_stop);
            })?;

        ready_rx.recv().map_err(|_| {
            SchedulerError::Other(anyhow::anyhow!("client thread exited before binding"))
        })?;

        Ok(Self {
            handle,
            stop,
            wake_tx,
        })
    }

    /// Stop the client thread after one final pass over the queue.
    pub fn stop(self) {
        self.stop.store(true, Ordering::Release);
        let _ = self.wake_tx.try_send(());
        if self.handle.join().is_err() {
            warn!("client thread panicked");
        }
    }
}

fn run(scheduler: Scheduler, wake_rx: Receiver<()>, stop: Arc<AtomicBool>) {
    debug!("client loop started");
    loop {
        match wake_rx.recv_timeout(CLIENT_TICK) {
            Ok(()) | Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        let ran = scheduler.process_client_callbacks();
        if ran > 0 {
            debug!(callbacks = ran, "processed client callbacks");
        }

        if stop.load(Ordering::Acquire) {
            break;
        }
    }
    debug!("client loop stopped");
}
