// src/config/mod.rs

//! Configuration for the scheduler and the `jobdag` binary.
//!
//! - [`model`] is the TOML-backed data model (`[scheduler]`, `[group.*]`,
//!   `[job.*]`).
//! - [`settings`] resolves `[scheduler]` into a [`SchedulerConfig`].
//! - [`loader`] reads graph files from disk.
//! - [`validate`] checks references and acyclicity.

pub mod loader;
pub mod model;
pub mod settings;
pub mod validate;

pub use loader::{load_and_validate, load_from_path, load_from_str};
pub use model::{GraphFile, GroupConfig, JobConfig, RawGraphFile, SchedulerSection};
pub use settings::SchedulerConfig;
pub use validate::validate_graph;
