// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod job;
pub mod logging;
pub mod runner;
pub mod sync;
pub mod types;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Result, bail};
use tracing::debug;

pub use crate::config::SchedulerConfig;
pub use crate::engine::{DeadlockReport, Host, NoopHost, Scheduler, SchedulerStats};
pub use crate::errors::SchedulerError;
pub use crate::job::{Job, JobBuilder, JobContext, WorkGroup};
pub use crate::types::{CpuUsageLimit, Priority};

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::model::GraphFile;
use crate::runner::{RuntimeEvent, Runner};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - graph loading and validation
/// - the scheduler, its client thread and the async runtime
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let mut graph = load_and_validate(&config_path)?;

    if let Some(workers) = args.workers {
        graph.scheduler.worker_count = Some(workers.max(1));
    }

    if args.dry_run {
        print_dry_run(&graph);
        return Ok(());
    }

    let runner = Runner::new(Arc::new(graph));

    // Ctrl-C → graceful shutdown.
    {
        let tx = runner.event_sender();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            let _ = tx.send(RuntimeEvent::ShutdownRequested).await;
        });
    }

    let report = runner.run().await?;
    print!("{report}");

    if let Some(stop) = &report.stop_request {
        bail!("deadlock detected: {stop}");
    }
    Ok(())
}

/// Print scheduler settings, groups and jobs without running anything.
fn print_dry_run(graph: &GraphFile) {
    let settings = SchedulerConfig::from_section(&graph.scheduler);

    println!("jobdag dry-run");
    println!("  scheduler.cpu_usage = {:?}", graph.scheduler.cpu_usage);
    println!("  scheduler.workers = {}", settings.worker_count);
    println!("  scheduler.deadlock_timeout = {:?}", settings.deadlock_timeout);
    println!("  scheduler.shutdown_timeout = {:?}", settings.shutdown_timeout);
    println!();

    if !graph.group.is_empty() {
        println!("groups ({}):", graph.group.len());
        for (name, group) in graph.group.iter() {
            println!(
                "  - {name} (high_priority: {}, auto_release: {})",
                group.high_priority, group.auto_release
            );
        }
        println!();
    }

    println!("jobs ({}), in submission order:", graph.order.len());
    for name in graph.order.iter() {
        let Some(job) = graph.job.get(name) else {
            continue;
        };
        println!("  - {name}");
        println!("      work_ms: {}", job.work_ms);
        if !job.after.is_empty() {
            println!("      after: {:?}", job.after);
        }
        if let Some(ref group) = job.group {
            println!("      group: {group}");
        }
        if job.high_priority {
            println!("      high_priority: true");
        }
        if !job.execute_async {
            println!("      execute_async: false");
        }
        if job.client_callback {
            println!("      client_callback: true");
        }
        if job.fail {
            println!("      fail: true");
        }
        if let Some(ms) = job.cancel_after_ms {
            println!("      cancel_after_ms: {ms}");
        }
    }

    debug!("dry-run complete (no execution)");
}
