use std::error::Error;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use jobdag::{Priority, Scheduler, SchedulerError};
use jobdag_test_utils::{OrderLog, RecordingHost, busy_work, init_tracing, small_scheduler, test_config};
use parking_lot::Mutex;

type TestResult = Result<(), Box<dyn Error>>;

fn eventually(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    cond()
}

fn pending_callbacks(scheduler: &Scheduler) -> usize {
    scheduler.stats().pending_client_callbacks
}

#[test]
fn immediate_callback_runs_while_client_waits() -> TestResult {
    let scheduler = small_scheduler();
    let client = thread::current().id();
    let seen = Arc::new(Mutex::new(None));

    let slot = Arc::clone(&seen);
    let job = scheduler.job("marshal", move |ctx| {
        let ran_on = ctx.invoke_on_client(true, || thread::current().id())?;
        *slot.lock() = Some(ran_on);
        Ok(())
    });

    job.submit(Priority::Normal, &[])?;
    assert!(job.wait_for_completion(None));

    assert!(job.ran_to_completion());
    assert_eq!(*seen.lock(), Some(client));

    scheduler.shutdown();
    Ok(())
}

#[test]
fn queued_callback_waits_for_client_tick() -> TestResult {
    init_tracing();
    let host = Arc::new(RecordingHost::new());
    let scheduler = Scheduler::initialize_with_host(test_config(), host.clone())?;

    let job = scheduler.job("tick", |ctx| {
        let value = ctx.invoke_on_client(false, || 21 * 2)?;
        anyhow::ensure!(value == 42, "unexpected value {value}");
        Ok(())
    });
    job.submit(Priority::Normal, &[])?;

    assert!(eventually(|| pending_callbacks(&scheduler) == 1));
    assert_eq!(host.wake_count(), 1);

    // A wait on the client thread only runs immediate callbacks.
    assert!(!job.wait_for_completion(Some(Duration::from_millis(50))));
    assert_eq!(pending_callbacks(&scheduler), 1);

    assert_eq!(scheduler.process_client_callbacks(), 1);
    assert!(job.wait_for_completion(None));
    assert!(job.ran_to_completion());

    scheduler.shutdown();
    Ok(())
}

#[test]
fn client_thread_runs_callbacks_inline() -> TestResult {
    let scheduler = small_scheduler();
    assert!(scheduler.is_client_thread());

    let value = scheduler.invoke_on_client(false, || "inline")?;
    assert_eq!(value, "inline");
    assert_eq!(pending_callbacks(&scheduler), 0);

    scheduler.shutdown();
    Ok(())
}

#[test]
fn callbacks_can_reenter_the_client() -> TestResult {
    let scheduler = small_scheduler();

    let job = scheduler.job("reenter", |ctx| {
        let scheduler = ctx.scheduler();
        let inner = ctx.invoke_on_client(true, move || scheduler.invoke_on_client(true, || 7))??;
        anyhow::ensure!(inner == 7, "nested callback returned the wrong value");
        Ok(())
    });

    job.submit(Priority::Normal, &[])?;
    assert!(job.wait_for_completion(None));
    assert!(job.ran_to_completion());
    assert!(!job.encountered_error());

    scheduler.shutdown();
    Ok(())
}

#[test]
fn immediate_callbacks_jump_the_queue() -> TestResult {
    let scheduler = small_scheduler();
    let log = OrderLog::new();

    let normal = {
        let scheduler = scheduler.clone();
        let log = log.clone();
        thread::spawn(move || scheduler.invoke_on_client(false, move || log.push("normal")))
    };
    assert!(eventually(|| pending_callbacks(&scheduler) == 1));

    let immediate = {
        let scheduler = scheduler.clone();
        let log = log.clone();
        thread::spawn(move || scheduler.invoke_on_client(true, move || log.push("immediate")))
    };
    assert!(eventually(|| pending_callbacks(&scheduler) == 2));

    assert_eq!(scheduler.process_client_callbacks(), 2);

    normal.join().map_err(|_| "normal caller panicked")??;
    immediate.join().map_err(|_| "immediate caller panicked")??;
    assert_eq!(log.entries(), vec!["immediate", "normal"]);

    scheduler.shutdown();
    Ok(())
}

#[test]
fn pending_processing_skips_normal_callbacks() -> TestResult {
    let scheduler = small_scheduler();
    let log = OrderLog::new();

    let normal = {
        let scheduler = scheduler.clone();
        let log = log.clone();
        thread::spawn(move || scheduler.invoke_on_client(false, move || log.push("normal")))
    };
    let immediate = {
        let scheduler = scheduler.clone();
        let log = log.clone();
        thread::spawn(move || scheduler.invoke_on_client(true, move || log.push("immediate")))
    };
    assert!(eventually(|| pending_callbacks(&scheduler) == 2));

    assert_eq!(scheduler.process_pending_client_callbacks(), 1);
    assert_eq!(log.entries(), vec!["immediate"]);
    assert_eq!(pending_callbacks(&scheduler), 1);

    assert_eq!(scheduler.process_client_callbacks(), 1);
    assert_eq!(log.entries(), vec!["immediate", "normal"]);

    normal.join().map_err(|_| "normal caller panicked")??;
    immediate.join().map_err(|_| "immediate caller panicked")??;

    scheduler.shutdown();
    Ok(())
}

#[test]
fn cancelling_a_job_withdraws_its_callback() -> TestResult {
    let scheduler = small_scheduler();
    let ran = Arc::new(AtomicBool::new(false));
    let result = Arc::new(Mutex::new(None));

    let flag = Arc::clone(&ran);
    let slot = Arc::clone(&result);
    let job = scheduler.job("withdrawn", move |ctx| {
        let flag = Arc::clone(&flag);
        let outcome = ctx.invoke_on_client(false, move || flag.store(true, Ordering::SeqCst));
        let interrupted = matches!(outcome, Err(SchedulerError::Interrupted(_)));
        *slot.lock() = Some(interrupted);
        outcome?;
        Ok(())
    });

    job.submit(Priority::Normal, &[])?;
    assert!(eventually(|| pending_callbacks(&scheduler) == 1));

    job.cancel();

    assert!(job.was_cancelled());
    assert!(!job.ran_to_completion());
    assert!(!job.encountered_error());
    assert_eq!(*result.lock(), Some(true));
    assert_eq!(pending_callbacks(&scheduler), 0);

    scheduler.process_client_callbacks();
    assert!(!ran.load(Ordering::SeqCst));

    scheduler.shutdown();
    Ok(())
}

#[test]
fn inline_job_callbacks_run_on_the_submitting_thread() -> TestResult {
    let scheduler = small_scheduler();
    let client = thread::current().id();
    let seen = Arc::new(Mutex::new(None));

    let slot = Arc::clone(&seen);
    let job = scheduler
        .build_job("inline", move |ctx| {
            // Asks for a queued callback; inline jobs are always immediate.
            let ran_on = ctx.invoke_on_client(false, || thread::current().id())?;
            *slot.lock() = Some(ran_on);
            Ok(())
        })
        .execute_async(false)
        .build();

    job.submit(Priority::Normal, &[])?;

    assert!(job.ran_to_completion());
    assert_eq!(*seen.lock(), Some(client));

    scheduler.shutdown();
    Ok(())
}

#[test]
fn panicking_callback_fails_the_job() -> TestResult {
    let scheduler = small_scheduler();

    let job = scheduler.job("boom", |ctx| {
        let value = ctx.invoke_on_client(true, || -> u32 { panic!("callback exploded") })?;
        anyhow::ensure!(value == 0, "unreachable");
        Ok(())
    });

    job.submit(Priority::Normal, &[])?;
    assert!(job.wait_for_completion(None));

    assert!(job.encountered_error());
    assert!(!job.ran_to_completion());
    assert!(!job.was_cancelled());

    // The client thread survives the panic.
    let after = scheduler.job("after", |ctx| busy_work(ctx, 1));
    after.submit(Priority::Normal, &[])?;
    assert!(after.wait_for_completion(None));
    assert!(after.ran_to_completion());

    scheduler.shutdown();
    Ok(())
}

#[test]
fn callbacks_fail_without_a_live_scheduler() -> TestResult {
    let scheduler = small_scheduler();
    scheduler.shutdown();

    let err = scheduler.invoke_on_client(true, || ()).err().ok_or("expected an error")?;
    assert!(matches!(err, SchedulerError::Inactive));
    Ok(())
}
