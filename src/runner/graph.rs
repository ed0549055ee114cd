// src/runner/graph.rs

//! Turning a validated graph file into scheduler jobs.

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::bail;
use tracing::{debug, info};

use crate::config::{GraphFile, JobConfig};
use crate::engine::Scheduler;
use crate::errors::Result;
use crate::job::{Job, WorkGroup};
use crate::types::Priority;

/// Jobs and groups built from a [`GraphFile`], keyed by name.
#[derive(Debug)]
pub struct GraphJobs {
    pub jobs: BTreeMap<String, Job>,
    pub groups: BTreeMap<String, WorkGroup>,
    order: Vec<String>,
    after: BTreeMap<String, Vec<String>>,
    job_groups: BTreeMap<String, String>,
    priorities: BTreeMap<String, Priority>,
}

impl GraphJobs {
    pub fn build(scheduler: &Scheduler, graph: &GraphFile) -> Self {
        let groups = graph
            .group
            .iter()
            .map(|(name, cfg)| {
                (name.clone(), scheduler.group(cfg.high_priority, cfg.auto_release))
            })
            .collect();

        let jobs = graph
            .job
            .iter()
            .map(|(name, cfg)| (name.clone(), build_job(scheduler, name, cfg)))
            .collect();

        Self {
            jobs,
            groups,
            order: graph.order.clone(),
            after: graph
                .job
                .iter()
                .map(|(name, cfg)| (name.clone(), cfg.after.clone()))
                .collect(),
            job_groups: graph
                .job
                .iter()
                .filter_map(|(name, cfg)| cfg.group.clone().map(|g| (name.clone(), g)))
                .collect(),
            priorities: graph
                .job
                .iter()
                .map(|(name, cfg)| (name.clone(), Priority::from(cfg.high_priority)))
                .collect(),
        }
    }

    /// Submit every job, dependencies first.
    ///
    /// Inline jobs run during this call, so it blocks.
    pub fn submit_all(&self) -> Result<()> {
        for name in &self.order {
            let Some(job) = self.jobs.get(name) else {
                continue;
            };

            let deps: Vec<&Job> = self
                .after
                .get(name)
                .into_iter()
                .flatten()
                .filter_map(|dep| self.jobs.get(dep))
                .collect();

            match self.job_groups.get(name).and_then(|g| self.groups.get(g)) {
                Some(group) => job.submit_in(group, &deps)?,
                None => {
                    let priority = self.priorities.get(name).copied().unwrap_or_default();
                    job.submit(priority, &deps)?
                }
            };

            debug!(job = %name, deps = deps.len(), "submitted graph job");
        }

        info!(jobs = self.jobs.len(), "job graph submitted");
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Job> {
        self.jobs.get(name)
    }

    /// Cancel every job. Dependants are cancelled transitively anyway; this
    /// also catches jobs that are already running.
    pub fn cancel_all(&self) {
        for job in self.jobs.values() {
            job.cancel();
        }
    }

    /// Wait on every group, releasing members of auto-release groups.
    pub fn complete_groups(&self) {
        for (name, group) in &self.groups {
            debug!(group = %name, pending = group.pending_count(), "completing group");
            group.complete();
        }
    }
}

fn build_job(scheduler: &Scheduler, name: &str, cfg: &JobConfig) -> Job {
    let label = name.to_string();
    let work = Duration::from_millis(cfg.work_ms);
    let fail = cfg.fail;
    let client_callback = cfg.client_callback;

    scheduler
        .build_job(name, move |ctx| {
            ctx.sleep(work)?;

            if client_callback {
                let worker = ctx.worker_index();
                let callback_label = label.clone();
                ctx.invoke_on_client(false, move || {
                    debug!(job = %callback_label, ?worker, "client callback");
                })?;
            }

            if fail {
                bail!("job '{label}' is configured to fail");
            }
            Ok(())
        })
        .execute_async(cfg.execute_async)
        .build()
}
