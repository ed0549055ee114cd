use std::error::Error;
use std::time::Duration;

use jobdag::runner::{JobOutcome, run_graph};
use jobdag_test_utils::builders::{GraphFileBuilder, JobConfigBuilder};
use jobdag_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn runs_a_chain_to_completion() -> TestResult {
    init_tracing();
    let graph = GraphFileBuilder::new()
        .with_job("a", JobConfigBuilder::new(20).build())
        .with_job("b", JobConfigBuilder::new(20).after("a").build())
        .with_job("c", JobConfigBuilder::new(20).after("a").after("b").build())
        .build();

    let report = with_timeout(run_graph(graph)).await?;

    assert_eq!(report.outcomes.len(), 3);
    assert!(report.all_completed(), "{report}");
    assert!(report.stop_request.is_none());
    assert!(report.elapsed >= Duration::from_millis(60));
    assert_eq!(report.stats.workers, 4);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn reports_failures_and_cancellations() -> TestResult {
    init_tracing();
    let graph = GraphFileBuilder::new()
        .with_job("broken", JobConfigBuilder::new(5).fail(true).build())
        .with_job("after_broken", JobConfigBuilder::new(5).after("broken").build())
        .with_job("endless", JobConfigBuilder::new(60_000).cancel_after_ms(50).build())
        .with_job("after_endless", JobConfigBuilder::new(5).after("endless").build())
        .build();

    let report = with_timeout(run_graph(graph)).await?;

    assert_eq!(report.outcome("broken"), Some(JobOutcome::Failed));
    assert_eq!(report.outcome("after_broken"), Some(JobOutcome::Completed));
    assert_eq!(report.outcome("endless"), Some(JobOutcome::Cancelled));
    assert_eq!(report.outcome("after_endless"), Some(JobOutcome::Cancelled));
    assert_eq!(report.count(JobOutcome::Cancelled), 2);
    assert!(!report.all_completed());

    let rendered = report.to_string();
    assert!(rendered.contains("failed=1"), "{rendered}");
    assert!(rendered.contains("cancelled=2"), "{rendered}");
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn runs_client_callbacks_groups_and_inline_jobs() -> TestResult {
    init_tracing();
    let graph = GraphFileBuilder::new()
        .with_group("tiles", true, true)
        .with_job("load", JobConfigBuilder::new(10).build())
        .with_job(
            "tile1",
            JobConfigBuilder::new(10).after("load").group("tiles").client_callback(true).build(),
        )
        .with_job(
            "tile2",
            JobConfigBuilder::new(10).after("load").group("tiles").build(),
        )
        .with_job(
            "stitch",
            JobConfigBuilder::new(1)
                .after("tile1")
                .after("tile2")
                .execute_async(false)
                .client_callback(true)
                .build(),
        )
        .build();

    let report = with_timeout(run_graph(graph)).await?;

    assert!(report.all_completed(), "{report}");
    assert_eq!(report.stats.pending_client_callbacks, 0);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn short_deadlock_timeout_stops_the_run() -> TestResult {
    init_tracing();
    let graph = GraphFileBuilder::new()
        .with_deadlock_timeout_ms(100)
        .with_job("slow", JobConfigBuilder::new(5_000).build())
        .with_job("blocked", JobConfigBuilder::new(1).after("slow").build())
        .build();

    let report = with_timeout(run_graph(graph)).await?;

    let stop = report.stop_request.as_ref().ok_or("expected a stop request")?;
    assert!(stop.waited >= Duration::from_millis(100));
    assert!(report.to_string().contains("stop requested"));
    assert!(!report.all_completed());
    Ok(())
}
