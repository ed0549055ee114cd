// src/runner/runtime.rs

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::task;
use tracing::{debug, info, warn};

use super::{ChannelHost, ClientLoop, GraphJobs, JobOutcome, RunReport, RuntimeEvent, event_channel};
use crate::config::{GraphFile, SchedulerConfig};
use crate::engine::Scheduler;
use crate::errors::{Result, SchedulerError};

/// Async shell around one run of a job graph.
///
/// Blocking scheduler calls (submission, waits, cancellation, shutdown) run
/// on tokio's blocking pool; the event loop itself only reacts to
/// [`RuntimeEvent`]s.
pub struct Runner {
    graph: Arc<GraphFile>,
    events_tx: mpsc::Sender<RuntimeEvent>,
    events_rx: mpsc::Receiver<RuntimeEvent>,
}

impl fmt::Debug for Runner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runner")
            .field("jobs", &self.graph.job.len())
            .finish_non_exhaustive()
    }
}

impl Runner {
    pub fn new(graph: Arc<GraphFile>) -> Self {
        let (events_tx, events_rx) = event_channel();
        Self {
            graph,
            events_tx,
            events_rx,
        }
    }

    /// Sender for injecting events, e.g. `ShutdownRequested` on Ctrl-C.
    pub fn event_sender(&self) -> mpsc::Sender<RuntimeEvent> {
        self.events_tx.clone()
    }

    pub async fn run(self) -> Result<RunReport> {
        let Runner {
            graph,
            events_tx,
            mut events_rx,
        } = self;

        let started = Instant::now();
        let config = SchedulerConfig::from_section(&graph.scheduler);
        let (wake_tx, wake_rx) = crossbeam_channel::bounded::<()>(1);
        let host = Arc::new(ChannelHost::new(wake_tx.clone(), events_tx.clone()));

        let scheduler = Scheduler::initialize_with_host(config, host)?;
        let client = match ClientLoop::spawn(scheduler.clone(), wake_tx, wake_rx) {
            Ok(client) => client,
            Err(err) => {
                scheduler.shutdown();
                return Err(err);
            }
        };

        let jobs = Arc::new(GraphJobs::build(&scheduler, &graph));

        let submit_jobs = Arc::clone(&jobs);
        let submitted = task::spawn_blocking(move || submit_jobs.submit_all())
            .await
            .map_err(|err| SchedulerError::Other(err.into()))
            .and_then(|result| result);
        if let Err(err) = submitted {
            warn!(error = %err, "failed to submit job graph");
            teardown(scheduler, client, jobs).await?;
            return Err(err);
        }

        spawn_waiters(&jobs, &events_tx);
        spawn_cancel_timers(&graph, &events_tx);

        info!(jobs = jobs.jobs.len(), workers = scheduler.worker_count(), "runtime started");

        let expected = jobs.jobs.len();
        let mut outcomes = BTreeMap::new();
        let mut stop_request = None;

        while outcomes.len() < expected {
            let Some(event) = events_rx.recv().await else {
                info!("runtime event channel closed; exiting");
                break;
            };

            debug!(?event, "runtime received event");

            match event {
                RuntimeEvent::JobFinished { job, outcome } => {
                    info!(%job, %outcome, "job finished");
                    outcomes.insert(job, outcome);
                }
                RuntimeEvent::CancelRequested { job } => {
                    if let Some(handle) = jobs.get(&job).cloned() {
                        info!(%job, "cancel timer fired");
                        task::spawn_blocking(move || handle.cancel());
                    }
                }
                RuntimeEvent::StopRequested { report } => {
                    warn!(%report, "deadlock reported; cancelling all jobs");
                    if stop_request.is_none() {
                        stop_request = Some(report);
                        cancel_all(&jobs);
                    }
                }
                RuntimeEvent::ShutdownRequested => {
                    info!("shutdown requested; cancelling all jobs");
                    cancel_all(&jobs);
                }
            }
        }

        let stats = scheduler.stats();
        teardown(scheduler, client, jobs).await?;
        info!("runtime exiting");

        Ok(RunReport {
            outcomes,
            elapsed: started.elapsed(),
            stats,
            stop_request,
        })
    }
}

/// One blocking waiter per job, reporting its outcome.
fn spawn_waiters(jobs: &Arc<GraphJobs>, events: &mpsc::Sender<RuntimeEvent>) {
    for (name, job) in &jobs.jobs {
        let name = name.clone();
        let job = job.clone();
        let tx = events.clone();
        task::spawn_blocking(move || {
            let finished = job.wait_for_completion(None);
            let outcome = JobOutcome::of(&job, finished);
            let _ = tx.blocking_send(RuntimeEvent::JobFinished { job: name, outcome });
        });
    }
}

fn spawn_cancel_timers(graph: &GraphFile, events: &mpsc::Sender<RuntimeEvent>) {
    for (name, cfg) in &graph.job {
        let Some(after_ms) = cfg.cancel_after_ms else {
            continue;
        };
        let job = name.clone();
        let tx = events.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(after_ms)).await;
            let _ = tx.send(RuntimeEvent::CancelRequested { job }).await;
        });
    }
}

fn cancel_all(jobs: &Arc<GraphJobs>) {
    let jobs = Arc::clone(jobs);
    task::spawn_blocking(move || jobs.cancel_all());
}

/// Complete groups, stop the pool and the client thread.
async fn teardown(scheduler: Scheduler, client: ClientLoop, jobs: Arc<GraphJobs>) -> Result<()> {
    task::spawn_blocking(move || {
        jobs.complete_groups();
        scheduler.shutdown();
        client.stop();
    })
    .await
    .map_err(|err| SchedulerError::Other(err.into()))
}
