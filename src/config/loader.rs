// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{GraphFile, RawGraphFile};
use crate::errors::Result;

/// Read and deserialise a job-graph file without semantic validation.
///
/// Use [`load_and_validate`] for anything that is going to be executed.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawGraphFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;
    let raw = load_from_str(&contents)?;
    debug!(path = %path.display(), jobs = raw.job.len(), "loaded job graph");
    Ok(raw)
}

pub fn load_from_str(contents: &str) -> Result<RawGraphFile> {
    Ok(toml::from_str(contents)?)
}

/// Read a job-graph file and validate it.
///
/// Checks that there is at least one job, that every `after`/`group`
/// reference resolves, that no job depends on itself, that the scheduler
/// settings are usable and that the job graph is acyclic.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<GraphFile> {
    let raw = load_from_path(path)?;
    GraphFile::try_from(raw)
}

/// `Jobdag.toml` in the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Jobdag.toml")
}
