// src/config/settings.rs

//! Resolved scheduler settings.

use std::time::Duration;

use crate::config::model::SchedulerSection;
use crate::types::CpuUsageLimit;

/// Runtime form of the `[scheduler]` section.
///
/// Built from a config file with [`SchedulerConfig::from_section`], or in code
/// starting from [`SchedulerConfig::default`] and the `with_*` methods.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub worker_count: usize,
    pub deadlock_timeout: Duration,
    pub shutdown_timeout: Duration,
    pub client_poll_interval: Duration,
    pub idle_spin_iterations: u32,
    pub idle_park: Duration,
}

impl SchedulerConfig {
    pub fn from_section(section: &SchedulerSection) -> Self {
        let worker_count = match section.worker_count {
            Some(count) => count.max(1),
            None => section.cpu_usage.worker_count(available_processors()),
        };

        Self {
            worker_count,
            deadlock_timeout: Duration::from_millis(section.deadlock_timeout_ms),
            shutdown_timeout: Duration::from_millis(section.shutdown_timeout_ms),
            client_poll_interval: Duration::from_millis(section.client_poll_interval_ms.max(1)),
            idle_spin_iterations: section.idle_spin_iterations,
            idle_park: Duration::from_micros(section.idle_park_us.max(1)),
        }
    }

    /// Worker count for `policy` on this machine.
    pub fn with_cpu_usage(mut self, policy: CpuUsageLimit) -> Self {
        self.worker_count = policy.worker_count(available_processors());
        self
    }

    pub fn with_worker_count(mut self, count: usize) -> Self {
        self.worker_count = count.max(1);
        self
    }

    pub fn with_deadlock_timeout(mut self, timeout: Duration) -> Self {
        self.deadlock_timeout = timeout;
        self
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    pub fn with_client_poll_interval(mut self, interval: Duration) -> Self {
        self.client_poll_interval = interval.max(Duration::from_micros(100));
        self
    }

    pub fn with_idle_spin_iterations(mut self, iterations: u32) -> Self {
        self.idle_spin_iterations = iterations;
        self
    }

    pub fn with_idle_park(mut self, park: Duration) -> Self {
        self.idle_park = park.max(Duration::from_micros(1));
        self
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::from_section(&SchedulerSection::default())
    }
}

/// Logical processors, falling back to one when the platform can't tell.
pub fn available_processors() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
