//! Core Backup Library
//!
//! Job orchestration for periodic GitHub backups: declarative jobs run
//! through a prepare/execute/finalize lifecycle against pluggable storage
//! and service connectors, optionally on a cron schedule.

pub mod config;
pub mod managers;
pub mod services;
pub mod storage;
pub mod utils;

// Re-export commonly used types
pub use config::{load_config, Config, ConfigError, Job};
pub use managers::job_engine::{JobEngine, JobResult, JobStatus};
pub use managers::logging::{init_console_logging, init_logging, LogGuard, LoggingConfig};
pub use managers::notification::NotificationManager;
pub use managers::orchestrator::Orchestrator;
pub use managers::scheduler::{Scheduler, SchedulerError};
pub use services::{BackupService, JobContext, ServiceError, ServiceRegistry};
pub use storage::{FilesystemStorage, RunPaths, StorageAdapter, StorageError};
