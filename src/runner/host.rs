// src/runner/host.rs

use crossbeam_channel::Sender;
use tokio::sync::mpsc;
use tracing::warn;

use super::RuntimeEvent;
use crate::engine::{DeadlockReport, Host};

/// Host used by the `jobdag` binary.
///
/// Client wake-ups go to the dedicated client thread over a crossbeam
/// channel; deadlock stop requests go to the async runtime.
#[derive(Debug, Clone)]
pub struct ChannelHost {
    wake_tx: Sender<()>,
    events: mpsc::Sender<RuntimeEvent>,
}

impl ChannelHost {
    pub fn new(wake_tx: Sender<()>, events: mpsc::Sender<RuntimeEvent>) -> Self {
        Self { wake_tx, events }
    }
}

impl Host for ChannelHost {
    fn wake_client(&self) {
        // A full channel already has a wake-up pending.
        let _ = self.wake_tx.try_send(());
    }

    fn request_stop(&self, report: &DeadlockReport) {
        let event = RuntimeEvent::StopRequested {
            report: report.clone(),
        };
        if let Err(err) = self.events.try_send(event) {
            warn!(error = %err, "failed to deliver stop request to runtime");
        }
    }
}
