//! Test utilities for core-backup
//!
//! This crate provides shared test utilities, scripted service and storage
//! doubles, and helper functions for testing the core-backup application.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use test_utils::{ConfigBuilder, ScriptedServices, TestContext};
//!
//! #[test]
//! fn my_test() {
//!     let services = ScriptedServices::new();
//!     let ctx = TestContext::from_builder(ConfigBuilder::minimal().add_job("nightly", "scripted"));
//!     // ... test code
//! }
//! ```

pub mod config_builder;
pub mod fixtures;
pub mod test_context;

// Re-export commonly used items
pub use config_builder::ConfigBuilder;
pub use fixtures::*;
pub use test_context::{ResultAssertions, TestContext};

// Re-export types from the main crate for convenience
pub use core_backup::config::{Config, Job, SchedulerConfig, StorageConfig, StorageType};
pub use core_backup::{
    BackupService, JobContext, JobResult, JobStatus, Orchestrator, ServiceError, ServiceRegistry,
    StorageAdapter,
};

// Re-export mock implementations from the main crate
pub use core_backup::services::github::api::mock::MockGitHubClient;
pub use core_backup::utils::executor::mock::{MockExecutor, MockResponse};
pub use core_backup::utils::executor::CommandExecutor;

/// Common test result type
pub type TestResult<T = ()> = anyhow::Result<T>;
