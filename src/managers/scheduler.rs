//! Scheduler loop - runs the orchestrator on a cron schedule
//!
//! The configuration file is reloaded before every run. Cancellation is
//! cooperative: the token is checked at the top of every cycle and interrupts
//! sleeps, but an in-flight batch always runs to completion.

use crate::config::{load_config, Config};
use crate::managers::job_engine::JobResult;
use crate::managers::notification::notify_results;
use crate::managers::orchestrator::Orchestrator;
use crate::services::ServiceRegistry;
use crate::utils::cron::{next_run, parse_schedule, parse_timezone, ScheduleError};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("Configuration has no scheduler section")]
    NotConfigured,

    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    #[error("Cron expression '{0}' has no upcoming run")]
    NoUpcomingRun(String),
}

/// Parsed cron expression bound to its timezone
struct CronSchedule {
    expr: String,
    schedule: Schedule,
    tz: Tz,
}

impl CronSchedule {
    fn from_config(config: &Config) -> Result<Self, SchedulerError> {
        let scheduler = config.scheduler.as_ref().ok_or(SchedulerError::NotConfigured)?;
        Ok(Self {
            expr: scheduler.cron.clone(),
            schedule: parse_schedule(&scheduler.cron)?,
            tz: parse_timezone(&scheduler.timezone)?,
        })
    }

    fn next_after(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>, SchedulerError> {
        next_run(&self.schedule, &now.with_timezone(&self.tz))
            .map(|at| at.with_timezone(&Utc))
            .ok_or_else(|| SchedulerError::NoUpcomingRun(self.expr.clone()))
    }
}

pub struct Scheduler {
    config_path: PathBuf,
    config: Config,
    registry: ServiceRegistry,
    job_names: Option<Vec<String>>,
    poll_interval: Duration,
}

impl Scheduler {
    pub fn new(config_path: &Path, config: Config, registry: ServiceRegistry) -> Self {
        Self {
            config_path: config_path.to_path_buf(),
            config,
            registry,
            job_names: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Restrict every run to these jobs
    pub fn with_jobs(mut self, job_names: Option<Vec<String>>) -> Self {
        self.job_names = job_names.filter(|names| !names.is_empty());
        self
    }

    /// Upper bound on a single sleep
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Run until `token` is cancelled or the scheduler section disappears
    pub async fn run(mut self, token: CancellationToken) -> Result<(), SchedulerError> {
        let mut cron = CronSchedule::from_config(&self.config)?;
        let run_on_startup = self
            .config
            .scheduler
            .as_ref()
            .map(|s| s.run_on_startup)
            .unwrap_or(false);

        let mut next = if run_on_startup {
            Utc::now()
        } else {
            cron.next_after(Utc::now())?
        };
        info!("Scheduler started ({}, {}); next run at {}", cron.expr, cron.tz, next);

        loop {
            if token.is_cancelled() {
                info!("Scheduler stopped");
                return Ok(());
            }

            let now = Utc::now();
            if now >= next {
                if !self.reload(&mut cron) {
                    warn!("Scheduler section removed from configuration; exiting");
                    return Ok(());
                }

                self.run_batch().await;

                next = cron.next_after(Utc::now())?;
                info!("Next run at {}", next.with_timezone(&cron.tz));
                continue;
            }

            let remaining = (next - now).to_std().unwrap_or_default();
            tokio::select! {
                _ = token.cancelled() => {
                    info!("Scheduler stopped");
                    return Ok(());
                }
                _ = tokio::time::sleep(remaining.min(self.poll_interval)) => {}
            }
        }
    }

    /// Reload the configuration file; keeps the previous configuration when
    /// it cannot be loaded. Returns false when the scheduler section is gone.
    fn reload(&mut self, cron: &mut CronSchedule) -> bool {
        let config = match load_config(&self.config_path) {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to reload configuration, keeping previous: {}", e);
                return true;
            }
        };

        if config.scheduler.is_none() {
            return false;
        }

        match CronSchedule::from_config(&config) {
            Ok(updated) => *cron = updated,
            Err(e) => {
                error!("Invalid scheduler settings, keeping previous: {}", e);
                return true;
            }
        }

        self.config = config;
        true
    }

    /// One orchestrator batch on a blocking thread
    async fn run_batch(&self) {
        let config = self.config.clone();
        let registry = self.registry.clone();
        let job_names = self.job_names.clone();

        let outcome = tokio::task::spawn_blocking(move || -> anyhow::Result<Vec<JobResult>> {
            let orchestrator = Orchestrator::new(config, registry)?;
            let results = orchestrator.run(job_names.as_deref())?;
            notify_results(orchestrator.config(), &results);
            Ok(results)
        })
        .await;

        match outcome {
            Ok(Ok(results)) => {
                let failed = results.iter().filter(|r| !r.success()).count();
                info!("Scheduled run finished: {} job(s), {} failed", results.len(), failed);
            }
            Ok(Err(e)) => error!("Scheduled run failed: {:#}", e),
            Err(e) => error!("Scheduled run aborted: {}", e),
        }
    }
}
