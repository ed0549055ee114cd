// src/dag/mod.rs

//! Dependency graph of submitted jobs.
//!
//! - [`node`] holds the per-submission [`ScheduleNode`]: its state machine,
//!   its outgoing dependant edges and its completion latch.
//! - [`state`] defines the node states and the public [`JobState`] view.
//! - [`cycle`] contains the reachability check run before any edge is added.

pub mod cycle;
pub mod node;
pub mod state;

pub use cycle::would_create_cycle;
pub use node::ScheduleNode;
pub use state::{JobState, NodeState};
