#![allow(dead_code)]

use jobdag::config::{GraphFile, GroupConfig, JobConfig, RawGraphFile, SchedulerSection};

/// Builder for `GraphFile` to simplify test setup.
pub struct GraphFileBuilder {
    graph: RawGraphFile,
}

impl GraphFileBuilder {
    pub fn new() -> Self {
        Self {
            graph: RawGraphFile {
                scheduler: SchedulerSection {
                    worker_count: Some(4),
                    shutdown_timeout_ms: 500,
                    ..SchedulerSection::default()
                },
                ..RawGraphFile::default()
            },
        }
    }

    pub fn with_job(mut self, name: &str, job: JobConfig) -> Self {
        self.graph.job.insert(name.to_string(), job);
        self
    }

    pub fn with_group(mut self, name: &str, high_priority: bool, auto_release: bool) -> Self {
        self.graph.group.insert(
            name.to_string(),
            GroupConfig {
                high_priority,
                auto_release,
            },
        );
        self
    }

    pub fn with_deadlock_timeout_ms(mut self, ms: u64) -> Self {
        self.graph.scheduler.deadlock_timeout_ms = ms;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.graph.scheduler.worker_count = Some(workers);
        self
    }

    pub fn raw(self) -> RawGraphFile {
        self.graph
    }

    pub fn build(self) -> GraphFile {
        GraphFile::try_from(self.graph).expect("Failed to build valid graph from builder")
    }
}

impl Default for GraphFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `JobConfig`.
pub struct JobConfigBuilder {
    job: JobConfig,
}

impl JobConfigBuilder {
    pub fn new(work_ms: u64) -> Self {
        Self {
            job: JobConfig {
                work_ms,
                ..JobConfig::default()
            },
        }
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.job.after.push(dep.to_string());
        self
    }

    pub fn group(mut self, group: &str) -> Self {
        self.job.group = Some(group.to_string());
        self
    }

    pub fn high_priority(mut self, val: bool) -> Self {
        self.job.high_priority = val;
        self
    }

    pub fn fail(mut self, val: bool) -> Self {
        self.job.fail = val;
        self
    }

    pub fn cancel_after_ms(mut self, ms: u64) -> Self {
        self.job.cancel_after_ms = Some(ms);
        self
    }

    pub fn client_callback(mut self, val: bool) -> Self {
        self.job.client_callback = val;
        self
    }

    pub fn execute_async(mut self, val: bool) -> Self {
        self.job.execute_async = val;
        self
    }

    pub fn build(self) -> JobConfig {
        self.job
    }
}
