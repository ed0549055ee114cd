use std::error::Error;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use jobdag::dag::JobState;
use jobdag::{Job, Priority, SchedulerError};
use jobdag_test_utils::{busy_work, small_scheduler};

type TestResult = Result<(), Box<dyn Error>>;

#[test]
fn shutdown_cancels_outstanding_work_promptly() -> TestResult {
    let scheduler = small_scheduler();

    let running: Vec<Job> = (0..scheduler.worker_count())
        .map(|i| scheduler.job(format!("long{i}"), |ctx| busy_work(ctx, 10_000)))
        .collect();
    for job in &running {
        job.submit(Priority::Normal, &[])?;
    }

    let queued: Vec<Job> = (0..8)
        .map(|i| scheduler.job(format!("queued{i}"), |ctx| busy_work(ctx, 10)))
        .collect();
    for job in &queued {
        job.submit(Priority::Normal, &[])?;
    }

    let pending = scheduler.job("pending", |_| Ok(()));
    let deps: Vec<&Job> = running.iter().collect();
    pending.submit(Priority::Normal, &deps)?;

    thread::sleep(Duration::from_millis(50));

    let started = Instant::now();
    scheduler.shutdown();
    assert!(
        started.elapsed() < Duration::from_secs(2),
        "shutdown took {:?}",
        started.elapsed()
    );
    assert!(!scheduler.is_active());

    for job in running.iter().chain(&queued).chain([&pending]) {
        assert!(job.wait_for_completion(None), "{} never finished", job.label());
        assert!(job.is_done());
        assert!(job.was_cancelled(), "{} should be cancelled", job.label());
        assert!(!job.ran_to_completion());
    }

    Ok(())
}

#[test]
fn submit_after_shutdown_is_rejected() -> TestResult {
    let scheduler = small_scheduler();
    scheduler.shutdown();

    let job = scheduler.job("late", |_| Ok(()));
    let err = job.submit(Priority::Normal, &[]).err().ok_or("expected an error")?;
    assert!(matches!(err, SchedulerError::Inactive));
    assert_eq!(job.state(), JobState::Unbound);
    assert!(!job.is_queued());
    Ok(())
}

#[test]
fn shutdown_is_idempotent() -> TestResult {
    let scheduler = small_scheduler();
    let job = scheduler.job("quick", |_| Ok(()));
    job.submit(Priority::Normal, &[])?;
    assert!(job.wait_for_completion(None));

    scheduler.shutdown();
    scheduler.shutdown();
    scheduler.clone().shutdown();

    assert!(!scheduler.is_active());
    assert!(job.ran_to_completion());
    Ok(())
}

#[test]
fn running_job_sees_shutdown_as_cancellation() -> TestResult {
    let scheduler = small_scheduler();
    let observed = Arc::new(AtomicBool::new(false));

    let flag = Arc::clone(&observed);
    let job = scheduler.job("observer", move |ctx| {
        while !ctx.is_cancelled() {
            thread::sleep(Duration::from_millis(1));
        }
        flag.store(true, Ordering::SeqCst);
        Ok(())
    });
    job.submit(Priority::Normal, &[])?;
    thread::sleep(Duration::from_millis(20));

    scheduler.shutdown();

    assert!(job.wait_for_completion(None));
    assert!(job.is_done());
    assert!(observed.load(Ordering::SeqCst));
    Ok(())
}
