use super::types::*;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to parse config file: {0}")]
    YamlError(#[from] serde_yml::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Job '{job}' references unknown storage '{storage}'")]
    StorageNotFound { job: String, storage: String },

    #[error("Unknown job(s) requested: {0}")]
    UnknownJobs(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Load and validate configuration from a YAML or TOML file
///
/// Files ending in `.toml` are parsed as TOML; everything else as YAML.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ConfigError::NotFound(path.display().to_string()));
    }

    let contents = fs::read_to_string(path)?;
    let is_toml = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("toml"))
        .unwrap_or(false);

    let config: Config = if is_toml {
        toml::from_str(&contents)?
    } else {
        serde_yml::from_str(&contents)?
    };

    validate_config(&config)?;
    Ok(config)
}

/// Validate the configuration
pub fn validate_config(config: &Config) -> Result<()> {
    if config.jobs.is_empty() {
        return Err(ConfigError::ValidationError(
            "At least one job must be configured".to_string(),
        ));
    }

    if config.storage.is_empty() {
        return Err(ConfigError::ValidationError(
            "At least one storage target must be configured".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for job in &config.jobs {
        validate_job(job, config)?;
        if !seen.insert(job.name.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "Duplicate job name: {}",
                job.name
            )));
        }
    }

    if let Some(ref scheduler) = config.scheduler {
        validate_scheduler(scheduler)?;
    }

    Ok(())
}

fn validate_job(job: &Job, config: &Config) -> Result<()> {
    if job.name.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "Job name must not be empty".to_string(),
        ));
    }

    if !super::is_path_segment(&job.name) {
        return Err(ConfigError::ValidationError(format!(
            "Job name '{}' must be a single path segment (no separators, '.' or '..')",
            job.name
        )));
    }

    if job.service.trim().is_empty() {
        return Err(ConfigError::ValidationError(format!(
            "Job '{}': service type must not be empty",
            job.name
        )));
    }

    if !config.storage.contains_key(&job.target_storage) {
        return Err(ConfigError::StorageNotFound {
            job: job.name.clone(),
            storage: job.target_storage.clone(),
        });
    }

    if let Some(ref schedule) = job.schedule {
        crate::utils::cron::parse_schedule(schedule).map_err(|e| {
            ConfigError::ValidationError(format!("Job '{}': {}", job.name, e))
        })?;
    }

    Ok(())
}

fn validate_scheduler(scheduler: &SchedulerConfig) -> Result<()> {
    crate::utils::cron::parse_schedule(&scheduler.cron)
        .map_err(|e| ConfigError::ValidationError(format!("Scheduler: {}", e)))?;
    crate::utils::cron::parse_timezone(&scheduler.timezone)
        .map_err(|e| ConfigError::ValidationError(format!("Scheduler: {}", e)))?;
    Ok(())
}

/// Select jobs to run, preserving configuration order
///
/// An empty or missing selection means every configured job. Any unknown name
/// fails the whole selection.
pub fn select_jobs<'a>(config: &'a Config, job_names: Option<&[String]>) -> Result<Vec<&'a Job>> {
    let requested: HashSet<&str> = match job_names {
        Some(names) if !names.is_empty() => names.iter().map(String::as_str).collect(),
        _ => return Ok(config.jobs.iter().collect()),
    };

    let known: HashSet<&str> = config.jobs.iter().map(|j| j.name.as_str()).collect();
    let mut missing: Vec<&str> = requested.difference(&known).copied().collect();
    if !missing.is_empty() {
        missing.sort_unstable();
        return Err(ConfigError::UnknownJobs(missing.join(", ")));
    }

    Ok(config
        .jobs
        .iter()
        .filter(|job| requested.contains(job.name.as_str()))
        .collect())
}
