pub mod builders;
pub mod recording_host;

use std::sync::{Arc, Once};
use std::thread;
use std::time::{Duration, Instant};

use jobdag::{JobContext, Scheduler, SchedulerConfig};
use parking_lot::Mutex;
use tracing_subscriber::{EnvFilter, fmt};

pub use recording_host::RecordingHost;

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// - Uses `with_test_writer()`, so logs are captured per-test.
/// - The Rust test harness only prints captured output for **failing** tests
///   (unless you run with `-- --nocapture`).
///
/// Enable levels with e.g.:
/// `RUST_LOG=debug cargo test`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer() // print only for failing tests unless --nocapture
            .with_target(true)
            .with_thread_names(true)
            .init();
    });
}

/// Scheduler settings for tests: four workers and a short shutdown bound.
pub fn test_config() -> SchedulerConfig {
    SchedulerConfig::default()
        .with_worker_count(4)
        .with_shutdown_timeout(Duration::from_millis(500))
}

/// Start a scheduler with [`test_config`], binding the calling thread as the
/// client thread.
pub fn small_scheduler() -> Scheduler {
    init_tracing();
    Scheduler::initialize(test_config()).expect("failed to start scheduler")
}

/// Keep the worker busy for `ms`, honouring cancellation every millisecond.
pub fn busy_work(ctx: &JobContext<'_>, ms: u64) -> anyhow::Result<()> {
    let deadline = Instant::now() + Duration::from_millis(ms);
    while Instant::now() < deadline {
        ctx.check_cancelled()?;
        thread::sleep(Duration::from_millis(1));
    }
    ctx.check_cancelled()?;
    Ok(())
}

/// Thread-safe, append-only record of events (usually job labels).
#[derive(Debug, Clone, Default)]
pub struct OrderLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl OrderLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: impl Into<String>) {
        self.entries.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn contains(&self, entry: &str) -> bool {
        self.entries.lock().iter().any(|e| e == entry)
    }

    /// Position of the first occurrence of `entry`.
    pub fn index_of(&self, entry: &str) -> Option<usize> {
        self.entries.lock().iter().position(|e| e == entry)
    }

    /// Panics unless `before` was recorded ahead of `after`.
    pub fn assert_before(&self, before: &str, after: &str) {
        let entries = self.entries();
        let b = entries.iter().position(|e| e == before);
        let a = entries.iter().position(|e| e == after);
        match (b, a) {
            (Some(b), Some(a)) => assert!(
                b < a,
                "expected '{before}' before '{after}', got {entries:?}"
            ),
            _ => panic!("expected both '{before}' and '{after}' in {entries:?}"),
        }
    }
}

/// Run a future with a 10-second timeout.
#[allow(dead_code)]
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(Duration::from_secs(10), f)
        .await
        .expect("Test timed out after 10 seconds")
}
