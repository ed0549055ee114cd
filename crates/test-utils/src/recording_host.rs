use std::sync::atomic::{AtomicUsize, Ordering};

use jobdag::{DeadlockReport, Host};
use parking_lot::Mutex;

/// A host that:
/// - counts client wake-ups
/// - records every stop request instead of stopping anything.
#[derive(Debug, Default)]
pub struct RecordingHost {
    wakes: AtomicUsize,
    stops: Mutex<Vec<DeadlockReport>>,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn wake_count(&self) -> usize {
        self.wakes.load(Ordering::SeqCst)
    }

    pub fn stop_requests(&self) -> Vec<DeadlockReport> {
        self.stops.lock().clone()
    }
}

impl Host for RecordingHost {
    fn wake_client(&self) {
        self.wakes.fetch_add(1, Ordering::SeqCst);
    }

    fn request_stop(&self, report: &DeadlockReport) {
        self.stops.lock().push(report.clone());
    }
}
