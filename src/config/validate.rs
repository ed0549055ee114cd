// src/config/validate.rs

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{GraphFile, RawGraphFile};
use crate::errors::{Result, SchedulerError};

impl TryFrom<RawGraphFile> for GraphFile {
    type Error = SchedulerError;

    fn try_from(raw: RawGraphFile) -> std::result::Result<Self, Self::Error> {
        ensure_has_jobs(&raw)?;
        validate_scheduler_section(&raw)?;
        validate_references(&raw)?;
        let order = dependency_order(&raw)?;
        Ok(GraphFile::new_unchecked(raw, order))
    }
}

/// Validate `raw` and return it as a [`GraphFile`].
pub fn validate_graph(raw: RawGraphFile) -> Result<GraphFile> {
    GraphFile::try_from(raw)
}

fn ensure_has_jobs(cfg: &RawGraphFile) -> Result<()> {
    if cfg.job.is_empty() {
        return Err(SchedulerError::Config(
            "job graph must contain at least one [job.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_scheduler_section(cfg: &RawGraphFile) -> Result<()> {
    if cfg.scheduler.deadlock_timeout_ms == 0 {
        return Err(SchedulerError::Config(
            "[scheduler].deadlock_timeout_ms must be >= 1 (got 0)".to_string(),
        ));
    }
    if cfg.scheduler.worker_count == Some(0) {
        return Err(SchedulerError::Config(
            "[scheduler].worker_count must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_references(cfg: &RawGraphFile) -> Result<()> {
    for (name, job) in cfg.job.iter() {
        for dep in job.after.iter() {
            if dep == name {
                return Err(SchedulerError::Config(format!(
                    "job '{name}' cannot depend on itself in `after`"
                )));
            }
            if !cfg.job.contains_key(dep) {
                return Err(SchedulerError::Config(format!(
                    "job '{name}' has unknown dependency '{dep}' in `after`"
                )));
            }
        }

        if let Some(group) = &job.group {
            if !cfg.group.contains_key(group) {
                return Err(SchedulerError::Config(format!(
                    "job '{name}' refers to unknown group '{group}'"
                )));
            }
        }
    }
    Ok(())
}

/// Topological order of the jobs, dependencies first.
///
/// Edge direction is dependency -> dependant: `after = ["A"]` on `B` adds
/// `A -> B`.
fn dependency_order(cfg: &RawGraphFile) -> Result<Vec<String>> {
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in cfg.job.keys() {
        graph.add_node(name.as_str());
    }

    for (name, job) in cfg.job.iter() {
        for dep in job.after.iter() {
            graph.add_edge(dep.as_str(), name.as_str(), ());
        }
    }

    match toposort(&graph, None) {
        Ok(order) => Ok(order.into_iter().map(str::to_string).collect()),
        Err(cycle) => Err(SchedulerError::GraphCycle(format!(
            "cycle detected in job graph involving job '{}'",
            cycle.node_id()
        ))),
    }
}
