// src/engine/mod.rs

//! The scheduler: worker pool, queues and the client-thread channel.
//!
//! - [`scheduler`] owns the pool ([`Scheduler`]) and the state shared with
//!   workers and jobs.
//! - [`worker`] is the work-stealing loop every worker thread runs.
//! - [`wait`] implements waiting on a job and deadlock handling.
//! - [`client`] marshals callbacks onto the client thread.
//! - [`host`] is the seam to the hosting application ([`Host`]).
//! - [`stats`] is the diagnostics snapshot.

pub mod client;
pub mod host;
pub mod scheduler;
pub mod stats;
pub mod wait;
pub mod worker;

pub use client::ClientChannel;
pub use host::{DeadlockReport, Host, NoopHost};
pub use scheduler::Scheduler;
pub(crate) use scheduler::Shared;
pub use stats::SchedulerStats;
pub use wait::WaitOutcome;
