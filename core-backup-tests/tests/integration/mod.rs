//! Integration tests for core-backup
//!
//! Full job runs through the orchestrator and filesystem storage with git and
//! the GitHub API mocked, plus the scheduler loop on a real tokio runtime.

mod common;
mod github_e2e;
mod scheduler;
