//! Fluent API for building test configurations
//!
//! Provides a builder pattern for creating test configurations with sensible defaults.

use core_backup::config::{
    Config, Job, LoggingSettings, NotificationConfig, SchedulerConfig, StorageConfig, StorageType,
};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Builder for creating test configurations
pub struct ConfigBuilder {
    temp_dir: TempDir,
    jobs: Vec<Job>,
    storage: HashMap<String, StorageConfig>,
    default_retention_days: i64,
    scheduler: Option<SchedulerConfig>,
    notifications: NotificationConfig,
}

impl ConfigBuilder {
    /// Create a new ConfigBuilder with no storage and no jobs
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("Failed to create temp dir"),
            jobs: Vec::new(),
            storage: HashMap::new(),
            default_retention_days: 30,
            scheduler: None,
            notifications: NotificationConfig::default(),
        }
    }

    /// Create a config with a `default` filesystem storage under the temp dir
    pub fn minimal() -> Self {
        let builder = Self::new();
        let backup_path = builder.temp_dir.path().join("backups");
        fs::create_dir_all(&backup_path).expect("Failed to create backup dir");
        builder.add_storage("default", &backup_path)
    }

    /// Add a filesystem storage target
    pub fn add_storage(mut self, name: &str, path: &Path) -> Self {
        self.storage.insert(
            name.to_string(),
            StorageConfig {
                storage_type: StorageType::Filesystem,
                base_path: path.to_path_buf(),
            },
        );
        self
    }

    /// Add a job with default storage and no options
    pub fn add_job(self, name: &str, service: &str) -> Self {
        self.add_job_config(Job {
            name: name.to_string(),
            service: service.to_string(),
            target_storage: "default".to_string(),
            schedule: None,
            retention_days: None,
            options: serde_json::Value::Null,
        })
    }

    /// Add a `github` job with the given options
    pub fn add_github_job(self, name: &str, options: serde_json::Value) -> Self {
        self.add_job_config(Job {
            name: name.to_string(),
            service: "github".to_string(),
            target_storage: "default".to_string(),
            schedule: Some("0 2 * * *".to_string()),
            retention_days: None,
            options,
        })
    }

    /// Add a job with full configuration
    pub fn add_job_config(mut self, job: Job) -> Self {
        self.jobs.push(job);
        self
    }

    /// Set the global default retention
    pub fn with_retention(mut self, days: i64) -> Self {
        self.default_retention_days = days;
        self
    }

    /// Enable the scheduler section
    pub fn with_scheduler(mut self, cron: &str, timezone: &str, run_on_startup: bool) -> Self {
        self.scheduler = Some(SchedulerConfig {
            cron: cron.to_string(),
            timezone: timezone.to_string(),
            run_on_startup,
        });
        self
    }

    /// Set notification configuration
    pub fn with_notifications(mut self, config: NotificationConfig) -> Self {
        self.notifications = config;
        self
    }

    /// Get the temp directory path
    pub fn temp_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Get a storage base path
    pub fn storage_path(&self, name: &str) -> Option<PathBuf> {
        self.storage.get(name).map(|s| s.base_path.clone())
    }

    fn into_parts(self) -> (Config, TempDir) {
        let config = Config {
            jobs: self.jobs,
            storage: self.storage,
            default_retention_days: self.default_retention_days,
            scheduler: self.scheduler,
            notifications: self.notifications,
            logging: LoggingSettings::default(),
        };
        (config, self.temp_dir)
    }

    /// Build the Config (the temp directory is removed)
    pub fn build(self) -> Config {
        self.into_parts().0
    }

    /// Keep the temp directory alive alongside the config
    pub fn persist(self) -> (Config, TempDir) {
        self.into_parts()
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
