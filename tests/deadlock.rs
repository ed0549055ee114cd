use std::error::Error;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use jobdag::{Priority, Scheduler};
use jobdag_test_utils::{RecordingHost, busy_work, init_tracing, test_config};

type TestResult = Result<(), Box<dyn Error>>;

fn scheduler_with_deadlock_timeout(ms: u64) -> Result<(Scheduler, Arc<RecordingHost>), Box<dyn Error>> {
    init_tracing();
    let host = Arc::new(RecordingHost::new());
    let config = test_config().with_deadlock_timeout(Duration::from_millis(ms));
    let scheduler = Scheduler::initialize_with_host(config, host.clone())?;
    Ok((scheduler, host))
}

#[test]
fn client_wait_past_deadlock_timeout_requests_stop() -> TestResult {
    let (scheduler, host) = scheduler_with_deadlock_timeout(200)?;

    let stuck = scheduler.job("stuck", |ctx| busy_work(ctx, 5_000));
    stuck.submit(Priority::Normal, &[])?;

    let started = Instant::now();
    assert!(!stuck.wait_for_completion(None));
    let waited = started.elapsed();
    assert!(waited >= Duration::from_millis(200));
    assert!(waited < Duration::from_secs(2), "wait overran: {waited:?}");

    let stops = host.stop_requests();
    assert_eq!(stops.len(), 1);
    assert_eq!(stops[0].job, "stuck");
    assert!(stops[0].waited >= Duration::from_millis(200));
    assert!(
        stops[0].worker.as_deref().is_some_and(|w| w.starts_with("jobdag-worker-")),
        "expected the owning worker in {:?}",
        stops[0]
    );
    assert!(!stuck.is_done());

    scheduler.shutdown();
    assert!(stuck.wait_for_completion(None));
    assert!(stuck.was_cancelled());
    assert_eq!(host.stop_requests().len(), 1);
    Ok(())
}

#[test]
fn blocking_wait_past_deadlock_timeout_requests_stop() -> TestResult {
    let (scheduler, host) = scheduler_with_deadlock_timeout(200)?;

    let gate = scheduler.job("gate", |ctx| busy_work(ctx, 5_000));
    let blocked = scheduler.job("blocked", |_| Ok(()));
    gate.submit(Priority::Normal, &[])?;
    blocked.submit(Priority::Normal, &[&gate])?;

    let waiter = {
        let blocked = blocked.clone();
        thread::Builder::new()
            .name("outside-waiter".to_string())
            .spawn(move || blocked.wait_for_completion(Some(Duration::from_secs(5))))?
    };
    let finished = waiter.join().map_err(|_| "waiter panicked")?;
    assert!(!finished);

    let stops = host.stop_requests();
    assert_eq!(stops.len(), 1);
    assert_eq!(stops[0].job, "blocked");
    assert_eq!(stops[0].waiting_thread, "outside-waiter");
    assert_eq!(stops[0].worker, None);

    scheduler.shutdown();
    Ok(())
}

#[test]
fn caller_timeout_below_deadlock_timeout_is_not_a_deadlock() -> TestResult {
    let (scheduler, host) = scheduler_with_deadlock_timeout(1_000)?;

    let slow = scheduler.job("slow", |ctx| busy_work(ctx, 300));
    slow.submit(Priority::Normal, &[])?;

    assert!(!slow.wait_for_completion(Some(Duration::from_millis(50))));
    assert!(host.stop_requests().is_empty());

    assert!(slow.wait_for_completion(None));
    assert!(slow.ran_to_completion());
    assert!(host.stop_requests().is_empty());

    scheduler.shutdown();
    Ok(())
}
