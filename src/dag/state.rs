// src/dag/state.rs

//! Node states and their public read-only view.

/// State of a [`ScheduleNode`](crate::dag::ScheduleNode).
///
/// Transitions:
/// - `None -> Queued` once every dependency has resolved.
/// - `Queued -> Running` when a worker claims the node (exactly one wins).
/// - `Running -> Completed` when the job body returns, successfully or not.
/// - `Running -> Cancelled` when the body unwound on an interruption.
/// - `None | Queued | Running -> Cancelled` on a cancel request.
///
/// `Cancelled` and `Completed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum NodeState {
    None = 0,
    Queued = 1,
    Running = 2,
    Cancelled = 3,
    Completed = 4,
}

impl NodeState {
    pub(crate) fn from_u8(raw: u8) -> Self {
        match raw {
            1 => NodeState::Queued,
            2 => NodeState::Running,
            3 => NodeState::Cancelled,
            4 => NodeState::Completed,
            _ => NodeState::None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, NodeState::Cancelled | NodeState::Completed)
    }
}

/// Public, read-only view of where a job is in its lifecycle.
///
/// This is exposed for tests and diagnostics without leaking node internals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// Never submitted, or its node has already been handed back after a
    /// completed wait.
    Unbound,
    /// Submitted, waiting on unresolved dependencies.
    Pending,
    Queued,
    Running,
    Cancelled,
    Completed,
}

impl From<NodeState> for JobState {
    fn from(state: NodeState) -> Self {
        match state {
            NodeState::None => JobState::Pending,
            NodeState::Queued => JobState::Queued,
            NodeState::Running => JobState::Running,
            NodeState::Cancelled => JobState::Cancelled,
            NodeState::Completed => JobState::Completed,
        }
    }
}
