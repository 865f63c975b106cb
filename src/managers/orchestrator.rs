//! Orchestrator - runs a batch of jobs from one configuration

use crate::config::{select_jobs, Config, ConfigError, Job};
use crate::managers::job_engine::{JobEngine, JobResult};
use crate::services::ServiceRegistry;
use crate::storage::{build_storage_adapter, StorageAdapter, StorageError};
use std::collections::HashMap;
use tracing::{error, info};

pub struct Orchestrator {
    config: Config,
    registry: ServiceRegistry,
    storages: HashMap<String, Box<dyn StorageAdapter>>,
}

impl Orchestrator {
    /// Build one storage adapter per configured storage target
    pub fn new(config: Config, registry: ServiceRegistry) -> Result<Self, StorageError> {
        let mut storages = HashMap::new();
        for (name, storage_config) in &config.storage {
            storages.insert(name.clone(), build_storage_adapter(name, storage_config)?);
        }

        Ok(Self::with_storages(config, registry, storages))
    }

    /// Orchestrator with pre-built storage adapters
    pub fn with_storages(
        config: Config,
        registry: ServiceRegistry,
        storages: HashMap<String, Box<dyn StorageAdapter>>,
    ) -> Self {
        Self {
            config,
            registry,
            storages,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run the named jobs (all jobs when `None` or empty) in config order
    ///
    /// Unknown job names fail the whole call before anything runs. Every
    /// other failure is reported on the job's result.
    pub fn run(&self, job_names: Option<&[String]>) -> Result<Vec<JobResult>, ConfigError> {
        let jobs = select_jobs(&self.config, job_names)?;
        info!("Running {} job(s)", jobs.len());

        let results: Vec<JobResult> = jobs.into_iter().map(|job| self.run_job(job)).collect();

        let failed = results.iter().filter(|r| !r.success()).count();
        if failed == 0 {
            info!("All {} job(s) succeeded", results.len());
        } else {
            error!("{} of {} job(s) failed", failed, results.len());
        }

        Ok(results)
    }

    fn run_job(&self, job: &Job) -> JobResult {
        let retention_days = job.effective_retention(self.config.default_retention_days);

        let storage = match self.storages.get(&job.target_storage) {
            Some(storage) => storage.as_ref(),
            None => {
                error!("Job '{}' targets unknown storage '{}'", job.name, job.target_storage);
                return JobResult::failed(
                    &job.name,
                    format!("Storage '{}' is not configured", job.target_storage),
                );
            }
        };

        let mut service = match self.registry.create(job) {
            Ok(service) => service,
            Err(e) => {
                error!("Failed to create service for job '{}': {:#}", job.name, e);
                return JobResult::failed(
                    &job.name,
                    format!("Service instantiation failed: {:#}", e),
                );
            }
        };

        match JobEngine::new(storage).run(job, service.as_mut(), retention_days) {
            Ok(result) => result,
            Err(e) => {
                error!("Storage preparation failed for job '{}': {}", job.name, e);
                JobResult::failed(&job.name, format!("Storage preparation failed: {}", e))
            }
        }
    }
}
