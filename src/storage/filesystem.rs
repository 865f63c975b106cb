//! Filesystem storage adapter
//!
//! Layout: `<base_path>/<job name>/<YYYY-MM-DD>/{manifest.json, metadata/, *.tar.gz}`

use super::{RunPaths, StorageAdapter, StorageError};
use crate::config::{expand_tilde, is_path_segment, Job};
use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const RUN_DIR_FORMAT: &str = "%Y-%m-%d";

/// Stores artifacts under a host-mounted directory
#[derive(Debug, Clone)]
pub struct FilesystemStorage {
    name: String,
    base_path: PathBuf,
}

impl FilesystemStorage {
    /// Create the adapter, making sure the base directory exists
    pub fn create(name: &str, base_path: &Path) -> Result<Self, StorageError> {
        let base_path = expand_tilde(base_path);
        fs::create_dir_all(&base_path).map_err(|source| StorageError::CreateDir {
            path: base_path.clone(),
            source,
        })?;

        Ok(Self {
            name: name.to_string(),
            base_path,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn job_root(&self, job: &Job) -> Result<PathBuf, StorageError> {
        if !is_path_segment(&job.name) {
            return Err(StorageError::InvalidJobName(job.name.clone()));
        }
        Ok(self.base_path.join(&job.name))
    }

    /// Remove dated run directories strictly older than `today - retention_days`
    fn prune(&self, job_root: &Path, retention_days: i64, today: NaiveDate) -> Result<usize, StorageError> {
        if retention_days <= 0 || !job_root.is_dir() {
            return Ok(0);
        }

        // A window reaching past the calendar range expires nothing
        let cutoff = match TimeDelta::try_days(retention_days)
            .and_then(|window| today.checked_sub_signed(window))
        {
            Some(cutoff) => cutoff,
            None => return Ok(0),
        };
        let entries = fs::read_dir(job_root).map_err(|source| StorageError::ReadDir {
            path: job_root.to_path_buf(),
            source,
        })?;

        let mut removed = 0;
        for entry in entries.filter_map(|e| e.ok()) {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }

            let file_name = entry.file_name();
            let dir_name = file_name.to_string_lossy();
            let run_date = match NaiveDate::parse_from_str(&dir_name, RUN_DIR_FORMAT) {
                Ok(date) => date,
                Err(_) => {
                    debug!("Skipping non-date directory {:?}", path);
                    continue;
                }
            };

            if run_date < cutoff {
                info!("Removing expired backup {:?}", path);
                match fs::remove_dir_all(&path) {
                    Ok(()) => removed += 1,
                    Err(e) => warn!("Failed to remove expired backup {:?}: {}", path, e),
                }
            }
        }

        Ok(removed)
    }
}

impl StorageAdapter for FilesystemStorage {
    fn prepare_run(&self, job: &Job, started_at: DateTime<Utc>) -> Result<RunPaths, StorageError> {
        let root = self
            .job_root(job)?
            .join(started_at.format(RUN_DIR_FORMAT).to_string());
        let metadata_dir = root.join("metadata");

        fs::create_dir_all(&metadata_dir).map_err(|source| StorageError::CreateDir {
            path: metadata_dir.clone(),
            source,
        })?;

        debug!("Prepared run directory {:?} on storage '{}'", root, self.name);
        Ok(RunPaths { root, metadata_dir })
    }

    fn enforce_retention(&self, job: &Job, retention_days: i64) -> Result<usize, StorageError> {
        self.prune(&self.job_root(job)?, retention_days, Utc::now().date_naive())
    }
}
