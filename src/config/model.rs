// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::types::CpuUsageLimit;

/// Raw job-graph file as deserialised from TOML.
///
/// ```toml
/// [scheduler]
/// cpu_usage = "half"
/// deadlock_timeout_ms = 10000
///
/// [group.tiles]
/// high_priority = true
///
/// [job.load]
/// work_ms = 200
///
/// [job.upload]
/// work_ms = 50
/// after = ["load"]
/// group = "tiles"
/// client_callback = true
/// ```
///
/// All sections are optional at this level; [`GraphFile`] is only produced
/// after validation.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawGraphFile {
    #[serde(default)]
    pub scheduler: SchedulerSection,

    #[serde(default)]
    pub group: BTreeMap<String, GroupConfig>,

    #[serde(default)]
    pub job: BTreeMap<String, JobConfig>,
}

/// Validated job-graph file.
///
/// Only constructed via `TryFrom<RawGraphFile>`, which guarantees every
/// `after`/`group` reference resolves and the job graph is acyclic.
#[derive(Debug, Clone)]
pub struct GraphFile {
    pub scheduler: SchedulerSection,
    pub group: BTreeMap<String, GroupConfig>,
    pub job: BTreeMap<String, JobConfig>,
    /// Job names in dependency order (dependencies first).
    pub order: Vec<String>,
}

impl GraphFile {
    pub(crate) fn new_unchecked(raw: RawGraphFile, order: Vec<String>) -> Self {
        Self {
            scheduler: raw.scheduler,
            group: raw.group,
            job: raw.job,
            order,
        }
    }
}

/// `[scheduler]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulerSection {
    /// `"max"`, `"half"`, `"quarter"` or `"single"`.
    pub cpu_usage: CpuUsageLimit,

    /// Explicit worker count; overrides `cpu_usage` when set.
    pub worker_count: Option<usize>,

    /// Any wait longer than this is treated as a deadlock.
    pub deadlock_timeout_ms: u64,

    /// Per-worker bound on joining threads at shutdown.
    pub shutdown_timeout_ms: u64,

    /// Slice the client thread polls in while it waits on a job.
    pub client_poll_interval_ms: u64,

    /// Spin-loop hints an idle worker issues before parking.
    pub idle_spin_iterations: u32,

    /// How long an idle worker parks before looking for work again.
    pub idle_park_us: u64,
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            cpu_usage: CpuUsageLimit::default(),
            worker_count: None,
            deadlock_timeout_ms: 10_000,
            shutdown_timeout_ms: 1_000,
            client_poll_interval_ms: 1,
            idle_spin_iterations: 64,
            idle_park_us: 500,
        }
    }
}

/// `[group.<name>]` section.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct GroupConfig {
    pub high_priority: bool,
    /// Release each job as the group is completed or cancelled.
    pub auto_release: bool,
}

/// `[job.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    /// Simulated work, spent in cancellable slices.
    pub work_ms: u64,

    /// Jobs that must finish before this one starts.
    pub after: Vec<String>,

    /// Ignored when the job belongs to a group; the group's priority wins.
    pub high_priority: bool,

    pub group: Option<String>,

    /// Return an error from the job body after the work is done.
    pub fail: bool,

    /// Cancel the job this long after the graph has been submitted.
    pub cancel_after_ms: Option<u64>,

    /// Round-trip through the client thread once the work is done.
    pub client_callback: bool,

    /// `false` runs the job inline on the submitting thread.
    pub execute_async: bool,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            work_ms: 0,
            after: Vec::new(),
            high_priority: false,
            group: None,
            fail: false,
            cancel_after_ms: None,
            client_callback: false,
            execute_async: true,
        }
    }
}
