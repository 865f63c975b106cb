//! Configuration module for core-backup
//!
//! This module handles loading and validating the job configuration from YAML
//! (or TOML) files.
//!
//! ## Retention Resolution
//!
//! The retention applied to a job is the first value found in:
//! 1. The job's `retention_days`
//! 2. The service options' `retention_days`
//! 3. The global `default_retention_days`
//!
//! ## Example Usage
//!
//! ```no_run
//! use core_backup::config;
//!
//! let config = config::load_config("core-backup.yaml")?;
//! for job in config::select_jobs(&config, None)? {
//!     println!("Job: {} -> {}", job.name, job.target_storage);
//! }
//! # Ok::<(), config::ConfigError>(())
//! ```

mod loader;
mod types;

pub use loader::{load_config, select_jobs, validate_config, ConfigError, Result};
pub use types::*;

/// Expand tilde (~) in path
pub fn expand_tilde(path: &std::path::Path) -> std::path::PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    path.to_path_buf()
}

/// True when `name` is exactly one normal path component, so joining it onto
/// a base directory stays directly under that directory
pub fn is_path_segment(name: &str) -> bool {
    if name.contains(['/', '\\']) {
        return false;
    }
    let mut components = std::path::Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(std::path::Component::Normal(_)), None)
    )
}
