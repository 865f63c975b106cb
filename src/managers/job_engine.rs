//! Job engine - runs one job through the service lifecycle

use crate::config::Job;
use crate::services::{BackupService, JobContext, ServiceError};
use crate::storage::{StorageAdapter, StorageError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, info_span, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Success,
    Failed,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Success => write!(f, "success"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Outcome of one job execution
#[derive(Debug, Clone, Serialize)]
pub struct JobResult {
    pub job_name: String,
    pub status: JobStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    /// Non-empty exactly when `status` is `Failed`
    pub errors: Vec<String>,
}

impl JobResult {
    /// A failure that happened before the lifecycle could start
    pub fn failed(job_name: &str, message: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            job_name: job_name.to_string(),
            status: JobStatus::Failed,
            started_at: now,
            completed_at: now,
            errors: vec![message.into()],
        }
    }

    pub fn success(&self) -> bool {
        self.status == JobStatus::Success
    }

    pub fn duration_secs(&self) -> u64 {
        (self.completed_at - self.started_at).num_seconds().max(0) as u64
    }
}

/// Runs jobs against one storage adapter
pub struct JobEngine<'a> {
    storage: &'a dyn StorageAdapter,
    workspace_root: Option<PathBuf>,
}

impl<'a> JobEngine<'a> {
    pub fn new(storage: &'a dyn StorageAdapter) -> Self {
        Self {
            storage,
            workspace_root: None,
        }
    }

    /// Create workspaces under `root` instead of the system temp directory
    pub fn with_workspace_root(mut self, root: &Path) -> Self {
        self.workspace_root = Some(root.to_path_buf());
        self
    }

    /// Run `job` through prepare, execute and finalize
    ///
    /// Lifecycle failures are folded into the returned result. The only error
    /// returned is a failure to prepare the run directory, in which case no
    /// lifecycle step and no retention runs.
    pub fn run(
        &self,
        job: &Job,
        service: &mut dyn BackupService,
        retention_days: i64,
    ) -> Result<JobResult, StorageError> {
        let span = info_span!("job", job = %job.name);
        let _enter = span.enter();

        let started_at = Utc::now();
        info!("Starting job '{}' ({})", job.name, job.service);

        let prefix = format!("{}-", job.name);
        let mut builder = tempfile::Builder::new();
        builder.prefix(&prefix);
        let created = match &self.workspace_root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        };
        let workspace = match created {
            Ok(dir) => dir,
            Err(e) => {
                error!("Failed to create workspace: {}", e);
                return Ok(JobResult {
                    job_name: job.name.clone(),
                    status: JobStatus::Failed,
                    started_at,
                    completed_at: Utc::now(),
                    errors: vec![format!("Failed to create workspace: {}", e)],
                });
            }
        };

        let paths = self.storage.prepare_run(job, started_at)?;

        let ctx = JobContext {
            job: job.clone(),
            started_at,
            paths,
            retention_days,
            workspace: workspace.path().to_path_buf(),
        };

        let errors = run_lifecycle(service, &ctx);

        let workspace_path = ctx.workspace.clone();
        if let Err(e) = workspace.close() {
            warn!("Failed to remove workspace {:?}: {}", workspace_path, e);
        }

        match self.storage.enforce_retention(job, retention_days) {
            Ok(0) => debug!("No expired backups for '{}'", job.name),
            Ok(removed) => info!("Removed {} expired backup(s) for '{}'", removed, job.name),
            Err(e) => warn!("Retention enforcement failed for '{}': {}", job.name, e),
        }

        let status = if errors.is_empty() {
            JobStatus::Success
        } else {
            JobStatus::Failed
        };

        let result = JobResult {
            job_name: job.name.clone(),
            status,
            started_at,
            completed_at: Utc::now(),
            errors,
        };

        match result.status {
            JobStatus::Success => info!(
                "Job '{}' completed in {}s",
                job.name,
                result.duration_secs()
            ),
            JobStatus::Failed => error!(
                "Job '{}' failed with {} error(s)",
                job.name,
                result.errors.len()
            ),
        }

        Ok(result)
    }
}

/// prepare -> execute -> finalize; finalize is skipped only when prepare failed
fn run_lifecycle(service: &mut dyn BackupService, ctx: &JobContext) -> Vec<String> {
    let mut errors = Vec::new();

    debug!("Preparing");
    if let Err(e) = service.prepare(ctx) {
        record(&mut errors, "prepare", e);
        return errors;
    }

    debug!("Executing");
    if let Err(e) = service.execute(ctx) {
        record(&mut errors, "execute", e);
    }

    debug!("Finalizing");
    if let Err(e) = service.finalize(ctx) {
        record(&mut errors, "finalize", e);
    }

    errors
}

fn record(errors: &mut Vec<String>, step: &str, e: ServiceError) {
    error!("{} failed: {}", step, e);
    errors.extend(e.messages());
}
