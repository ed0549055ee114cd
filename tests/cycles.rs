use std::error::Error;

use jobdag::dag::JobState;
use jobdag::{Priority, SchedulerError};
use jobdag_test_utils::{OrderLog, busy_work, small_scheduler};

type TestResult = Result<(), Box<dyn Error>>;

#[test]
fn self_dependency_is_rejected() -> TestResult {
    let scheduler = small_scheduler();
    let job = scheduler.job("loop", |_| Ok(()));

    let err = job.submit(Priority::Normal, &[&job]).err().ok_or("expected an error")?;
    match err {
        SchedulerError::CyclicDependency {
            dependant,
            dependency,
        } => {
            assert_eq!(dependant, "loop");
            assert_eq!(dependency, "loop");
        }
        other => panic!("expected CyclicDependency, got {other:?}"),
    }

    assert_eq!(job.state(), JobState::Unbound);
    assert!(!job.is_queued());
    assert!(!job.is_done());

    // The rejected job can still be submitted properly afterwards.
    job.submit(Priority::Normal, &[])?;
    assert!(job.wait_for_completion(None));
    assert!(job.ran_to_completion());

    scheduler.shutdown();
    Ok(())
}

#[test]
fn late_edge_closing_a_cycle_is_rejected() -> TestResult {
    let scheduler = small_scheduler();
    let log = OrderLog::new();

    let gate = scheduler.job("gate", |ctx| busy_work(ctx, 150));
    let a_log = log.clone();
    let a = scheduler.job("A", move |_| {
        a_log.push("A");
        Ok(())
    });
    let b_log = log.clone();
    let b = scheduler.job("B", move |_| {
        b_log.push("B");
        Ok(())
    });

    gate.submit(Priority::Normal, &[])?;
    a.submit(Priority::Normal, &[&gate])?;
    b.submit(Priority::Normal, &[&a])?;

    let err = a.add_dependency(&b).err().ok_or("expected an error")?;
    assert!(
        matches!(err, SchedulerError::CyclicDependency { .. }),
        "unexpected error: {err}"
    );

    // The graph is unchanged: the existing edges still drive execution.
    assert!(b.wait_for_completion(None));
    assert!(a.ran_to_completion());
    assert!(b.ran_to_completion());
    log.assert_before("A", "B");

    scheduler.shutdown();
    Ok(())
}

#[test]
fn late_edge_is_honoured() -> TestResult {
    let scheduler = small_scheduler();
    let log = OrderLog::new();

    let gate = scheduler.job("gate", |ctx| busy_work(ctx, 100));
    let extra_log = log.clone();
    let extra = scheduler.job("extra", move |ctx| {
        busy_work(ctx, 200)?;
        extra_log.push("extra");
        Ok(())
    });
    let job_log = log.clone();
    let job = scheduler.job("job", move |_| {
        job_log.push("job");
        Ok(())
    });

    gate.submit(Priority::Normal, &[])?;
    job.submit(Priority::Normal, &[&gate])?;
    extra.submit(Priority::Normal, &[])?;

    assert!(job.add_dependency(&extra)?);

    assert!(job.wait_for_completion(None));
    log.assert_before("extra", "job");

    scheduler.shutdown();
    Ok(())
}

#[test]
fn late_edge_on_a_finished_dependency_is_a_no_op() -> TestResult {
    let scheduler = small_scheduler();

    let gate = scheduler.job("gate", |ctx| busy_work(ctx, 100));
    let finished = scheduler.job("finished", |_| Ok(()));
    let never = scheduler.job("never", |_| Ok(()));
    let job = scheduler.job("job", |_| Ok(()));

    finished.submit(Priority::Normal, &[])?;
    assert!(finished.wait_for_completion(None));

    gate.submit(Priority::Normal, &[])?;
    job.submit(Priority::Normal, &[&gate])?;

    assert!(!job.add_dependency(&finished)?);
    assert!(!job.add_dependency(&never)?);

    assert!(job.wait_for_completion(None));
    assert!(job.ran_to_completion());

    scheduler.shutdown();
    Ok(())
}

#[test]
fn late_edge_needs_a_pending_job() -> TestResult {
    let scheduler = small_scheduler();

    let running = scheduler.job("running", |ctx| busy_work(ctx, 200));
    let other = scheduler.job("other", |_| Ok(()));
    let unsubmitted = scheduler.job("unsubmitted", |_| Ok(()));

    running.submit(Priority::Normal, &[])?;

    let err = running.add_dependency(&other).err().ok_or("expected an error")?;
    assert!(matches!(err, SchedulerError::NotPending(ref label) if label == "running"));

    let err = unsubmitted.add_dependency(&other).err().ok_or("expected an error")?;
    assert!(matches!(err, SchedulerError::NotPending(_)));

    assert!(running.wait_for_completion(None));
    assert!(running.ran_to_completion());

    scheduler.shutdown();
    Ok(())
}

#[test]
fn rejected_resubmission_keeps_the_previous_outcome() -> TestResult {
    let scheduler = small_scheduler();
    let job = scheduler.job("again", |_| Ok(()));

    job.submit(Priority::Normal, &[])?;
    assert!(job.wait_for_completion(None));
    assert!(job.is_done());
    assert!(job.ran_to_completion());

    let err = job.submit(Priority::Normal, &[&job]).err().ok_or("expected an error")?;
    assert!(matches!(err, SchedulerError::CyclicDependency { .. }), "unexpected error: {err}");

    assert!(job.is_done());
    assert!(job.ran_to_completion());
    assert!(!job.was_cancelled());
    assert!(job.is_queued());
    assert_eq!(job.state(), JobState::Unbound);
    assert!(job.wait_for_completion(None));

    scheduler.shutdown();
    Ok(())
}
