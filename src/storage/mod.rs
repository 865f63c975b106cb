//! Storage adapters
//!
//! A storage adapter resolves one job run to a physical location and prunes
//! run directories that have outlived the retention window.

pub mod filesystem;

use crate::config::{Job, StorageConfig, StorageType};
use chrono::{DateTime, Utc};
use std::path::PathBuf;

pub use filesystem::FilesystemStorage;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Failed to create {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Job name '{0}' cannot be used as a directory name")]
    InvalidJobName(String),

    #[error("Failed to read {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Locations for one job execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPaths {
    /// Artifact directory for the run
    pub root: PathBuf,
    /// `root/metadata`
    pub metadata_dir: PathBuf,
}

/// Storage backend contract
pub trait StorageAdapter: Send + Sync {
    /// Create (or reuse) the directories for a run starting at `started_at`
    fn prepare_run(&self, job: &Job, started_at: DateTime<Utc>) -> Result<RunPaths, StorageError>;

    /// Delete run directories older than `retention_days`; returns how many were removed
    fn enforce_retention(&self, job: &Job, retention_days: i64) -> Result<usize, StorageError>;
}

/// Build the adapter for a configured storage target
pub fn build_storage_adapter(
    name: &str,
    config: &StorageConfig,
) -> Result<Box<dyn StorageAdapter>, StorageError> {
    match config.storage_type {
        StorageType::Filesystem => Ok(Box::new(FilesystemStorage::create(name, &config.base_path)?)),
    }
}
