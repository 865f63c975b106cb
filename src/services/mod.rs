//! Backup service connectors
//!
//! A service owns one job's backup work through a three-step lifecycle:
//! `prepare` (credentials and clients), `execute` (produce artifacts and the
//! manifest) and `finalize` (release what `prepare` acquired).

pub mod github;

use crate::config::Job;
use crate::storage::RunPaths;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

pub use github::GitHubBackupService;

/// Error raised by a service lifecycle step
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Structured failure carrying every message the step collected
    #[error("{summary}")]
    Failed {
        summary: String,
        messages: Vec<String>,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ServiceError {
    /// Structured failure with a single message
    pub fn new(message: impl Into<String>) -> Self {
        let message = message.into();
        ServiceError::Failed {
            summary: message.clone(),
            messages: vec![message],
        }
    }

    /// Structured failure with a summary and its individual messages
    pub fn with_messages(summary: impl Into<String>, messages: Vec<String>) -> Self {
        ServiceError::Failed {
            summary: summary.into(),
            messages,
        }
    }

    /// Messages to record on the job result
    pub fn messages(&self) -> Vec<String> {
        match self {
            ServiceError::Failed { summary, messages } if messages.is_empty() => {
                vec![summary.clone()]
            }
            ServiceError::Failed { messages, .. } => messages.clone(),
            ServiceError::Other(e) => vec![format!("{:#}", e)],
        }
    }
}

/// Everything a service needs to know about the current run
#[derive(Debug, Clone)]
pub struct JobContext {
    pub job: Job,
    pub started_at: DateTime<Utc>,
    pub paths: RunPaths,
    pub retention_days: i64,
    /// Scratch directory owned by this run only; removed when the run ends
    pub workspace: PathBuf,
}

/// Backup service lifecycle
#[cfg_attr(test, mockall::automock)]
pub trait BackupService: Send {
    fn prepare(&mut self, ctx: &JobContext) -> Result<(), ServiceError>;
    fn execute(&mut self, ctx: &JobContext) -> Result<(), ServiceError>;
    fn finalize(&mut self, ctx: &JobContext) -> Result<(), ServiceError>;
}

pub type ServiceConstructor =
    Arc<dyn Fn(&Job) -> anyhow::Result<Box<dyn BackupService>> + Send + Sync>;

/// Maps service type names to constructors
#[derive(Clone, Default)]
pub struct ServiceRegistry {
    constructors: HashMap<String, ServiceConstructor>,
}

impl ServiceRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in connectors
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("github", |job| {
            Ok(Box::new(GitHubBackupService::new(job)?) as Box<dyn BackupService>)
        });
        registry
    }

    /// Register (or replace) the constructor for a service type
    pub fn register<F>(&mut self, service_type: &str, constructor: F)
    where
        F: Fn(&Job) -> anyhow::Result<Box<dyn BackupService>> + Send + Sync + 'static,
    {
        self.constructors
            .insert(service_type.to_string(), Arc::new(constructor));
    }

    /// Build a service instance for a job
    pub fn create(&self, job: &Job) -> anyhow::Result<Box<dyn BackupService>> {
        match self.constructors.get(&job.service) {
            Some(constructor) => constructor(job),
            None => anyhow::bail!("No service connector registered for '{}'", job.service),
        }
    }

    pub fn service_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }
}

impl std::fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("service_types", &self.service_types())
            .finish()
    }
}
