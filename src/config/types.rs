use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Backup jobs, in the order they run
    pub jobs: Vec<Job>,

    /// Storage targets keyed by name
    pub storage: HashMap<String, StorageConfig>,

    /// Retention applied when neither the job nor its options override it
    #[serde(default = "default_retention_days")]
    pub default_retention_days: i64,

    /// Present when the process should run as a long-lived scheduler
    #[serde(default)]
    pub scheduler: Option<SchedulerConfig>,

    #[serde(default)]
    pub notifications: NotificationConfig,

    #[serde(default)]
    pub logging: LoggingSettings,
}

/// One named backup job
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Job {
    pub name: String,

    /// Service connector type (e.g. "github")
    pub service: String,

    /// Name of the storage target receiving artifacts
    #[serde(default = "default_target_storage")]
    pub target_storage: String,

    /// Cron expression hint (informational, shown by --list-jobs)
    #[serde(default)]
    pub schedule: Option<String>,

    /// Retention override in days
    #[serde(default)]
    pub retention_days: Option<i64>,

    /// Service-specific options, interpreted only by the service connector
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub options: serde_json::Value,
}

impl Job {
    /// Resolve retention: job override, then `options.retention_days`, then the fallback.
    ///
    /// An explicit `retention_days: 0` is an override like any other: it wins over
    /// the fallback and disables pruning for the job.
    pub fn effective_retention(&self, fallback: i64) -> i64 {
        self.retention_days
            .or_else(|| {
                self.options
                    .get("retention_days")
                    .and_then(serde_json::Value::as_i64)
            })
            .unwrap_or(fallback)
    }
}

/// Storage target configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(rename = "type")]
    pub storage_type: StorageType,
    pub base_path: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    Filesystem,
}

/// Scheduler settings for the long-running mode
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SchedulerConfig {
    /// Cron expression (5 fields, or 6/7 with seconds/years)
    pub cron: String,

    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Run once immediately instead of waiting for the first cron tick
    #[serde(default = "default_run_on_startup")]
    pub run_on_startup: bool,
}

/// Reference to a secret held in an environment variable or a file
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct SecretRef {
    #[serde(default)]
    pub env: Option<String>,
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl SecretRef {
    /// Resolve the secret, preferring the environment variable over the file.
    /// Empty values count as unresolved.
    pub fn resolve(&self) -> Option<String> {
        if let Some(ref var) = self.env {
            if let Ok(value) = std::env::var(var) {
                if !value.is_empty() {
                    return Some(value);
                }
            }
        }

        if let Some(ref path) = self.file {
            if let Ok(contents) = std::fs::read_to_string(super::expand_tilde(path)) {
                let trimmed = contents.trim();
                if !trimmed.is_empty() {
                    return Some(trimmed.to_string());
                }
            }
        }

        None
    }

    pub fn is_empty(&self) -> bool {
        self.env.is_none() && self.file.is_none()
    }
}

/// Webhook notification configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NotificationConfig {
    /// Incoming webhook URL (Slack-compatible), never stored inline
    #[serde(default)]
    pub webhook: Option<SecretRef>,

    #[serde(default = "default_notify_on")]
    pub notify_on: Vec<NotifyEvent>,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            webhook: None,
            notify_on: default_notify_on(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NotifyEvent {
    Failure,
    Success,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingSettings {
    /// Directory for rotated log files; console-only logging when unset
    #[serde(default)]
    pub directory: Option<PathBuf>,

    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_max_files")]
    pub max_files: u32,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            directory: None,
            level: default_log_level(),
            max_files: default_log_max_files(),
        }
    }
}

// Default value functions

fn default_retention_days() -> i64 { 30 }
fn default_target_storage() -> String { "default".to_string() }
fn default_timezone() -> String { "UTC".to_string() }
fn default_run_on_startup() -> bool { true }
fn default_notify_on() -> Vec<NotifyEvent> { vec![NotifyEvent::Failure] }
fn default_log_level() -> String { "info".to_string() }
fn default_log_max_files() -> u32 { 10 }
