use std::str::FromStr;
use serde::Deserialize;

/// Scheduling priority of a submitted job.
///
/// High-priority work is pushed to the *front* of the global queue and of a
/// worker's local deque; normal work goes to the back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Priority {
    #[default]
    Normal,
    High,
}

impl Priority {
    pub fn is_high(self) -> bool {
        matches!(self, Priority::High)
    }
}

impl From<bool> for Priority {
    fn from(high: bool) -> Self {
        if high { Priority::High } else { Priority::Normal }
    }
}

/// How much of the machine the worker pool may use.
///
/// The policy only resolves a processor budget; see
/// [`CpuUsageLimit::worker_count`] for how that budget becomes a thread count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CpuUsageLimit {
    Max,
    Half,
    Quarter,
    Single,
}

impl Default for CpuUsageLimit {
    fn default() -> Self {
        CpuUsageLimit::Max
    }
}

impl CpuUsageLimit {
    /// Number of logical processors this policy grants out of `available`.
    pub fn processors(self, available: usize) -> usize {
        match self {
            CpuUsageLimit::Max => available,
            CpuUsageLimit::Half => available / 2,
            CpuUsageLimit::Quarter => available / 4,
            CpuUsageLimit::Single => 1,
        }
    }

    /// Worker thread count for `available` logical processors.
    ///
    /// One processor is left for the client thread, and the pool never drops
    /// below two workers so that work stealing stays meaningful.
    pub fn worker_count(self, available: usize) -> usize {
        self.processors(available).saturating_sub(1).max(2)
    }
}

impl FromStr for CpuUsageLimit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "max" => Ok(CpuUsageLimit::Max),
            "half" => Ok(CpuUsageLimit::Half),
            "quarter" => Ok(CpuUsageLimit::Quarter),
            "single" => Ok(CpuUsageLimit::Single),
            other => Err(format!(
                "invalid cpu_usage: {other} (expected \"max\", \"half\", \"quarter\" or \"single\")"
            )),
        }
    }
}
