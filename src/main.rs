use clap::Parser;
use core_backup::config::{self, Config};
use core_backup::managers::logging::{init_console_logging, init_logging, LoggingConfig};
use core_backup::managers::notification::notify_results;
use core_backup::{JobResult, Orchestrator, Scheduler, ServiceRegistry};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

const DEFAULT_CONFIG_PATH: &str = "/opt/core-backup/config/core-backup.yaml";

/// Exit code for configuration and other fatal startup errors
const EXIT_FATAL: u8 = 2;
/// Exit code when at least one job failed
const EXIT_JOB_FAILED: u8 = 1;

#[derive(Parser)]
#[command(name = "core-backup")]
#[command(about = "Scheduled GitHub backup orchestration", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to configuration file (YAML, or TOML with a .toml extension)
    #[arg(short, long, env = "CORE_BACKUP_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Run only this job (can be used multiple times)
    #[arg(short, long = "job", value_name = "NAME")]
    jobs: Vec<String>,

    /// List configured jobs and exit
    #[arg(long)]
    list_jobs: bool,

    /// Override the configured log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL")]
    log_level: Option<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match config::load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            init_console_logging(cli.log_level.as_deref());
            error!("{}", e);
            return ExitCode::from(EXIT_FATAL);
        }
    };

    if cli.list_jobs {
        print_jobs(&config);
        return ExitCode::SUCCESS;
    }

    // Setup logging (must keep guard alive)
    let logging_config = LoggingConfig::from_settings(&config.logging, cli.log_level.as_deref());
    let _log_guard = match init_logging(&logging_config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {:#}", e);
            return ExitCode::from(EXIT_FATAL);
        }
    };

    let job_names = (!cli.jobs.is_empty()).then(|| cli.jobs.clone());
    if let Err(e) = config::select_jobs(&config, job_names.as_deref()) {
        error!("{}", e);
        return ExitCode::from(EXIT_FATAL);
    }

    if config.scheduler.is_some() {
        run_scheduler(&cli.config, config, job_names)
    } else {
        run_once(config, job_names)
    }
}

fn print_jobs(config: &Config) {
    println!("Configured jobs:");
    println!();
    for job in &config.jobs {
        println!("  {} ({})", job.name, job.service);
        println!("    Storage:   {}", job.target_storage);
        println!(
            "    Retention: {} days",
            job.effective_retention(config.default_retention_days)
        );
        if let Some(ref schedule) = job.schedule {
            println!("    Schedule:  {}", schedule);
        }
        println!();
    }
}

/// Run the selected jobs once; exit 0 when all succeed, 1 otherwise
fn run_once(config: Config, job_names: Option<Vec<String>>) -> ExitCode {
    let orchestrator = match Orchestrator::new(config, ServiceRegistry::with_defaults()) {
        Ok(orchestrator) => orchestrator,
        Err(e) => {
            error!("Failed to initialize storage: {}", e);
            return ExitCode::from(EXIT_FATAL);
        }
    };

    let results = match orchestrator.run(job_names.as_deref()) {
        Ok(results) => results,
        Err(e) => {
            error!("{}", e);
            return ExitCode::from(EXIT_FATAL);
        }
    };

    notify_results(orchestrator.config(), &results);

    for result in &results {
        if result.success() {
            info!("{}: {}", result.job_name, result.status);
        } else {
            error!("{}: {} ({})", result.job_name, result.status, result.errors.join("; "));
        }
    }

    if results.iter().all(JobResult::success) {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_JOB_FAILED)
    }
}

/// Run the scheduler until SIGINT/SIGTERM
fn run_scheduler(config_path: &Path, config: Config, job_names: Option<Vec<String>>) -> ExitCode {
    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to start async runtime: {}", e);
            return ExitCode::from(EXIT_FATAL);
        }
    };

    let token = CancellationToken::new();
    let scheduler = Scheduler::new(config_path, config, ServiceRegistry::with_defaults())
        .with_jobs(job_names);

    let outcome = runtime.block_on(async {
        let signal_token = token.clone();
        tokio::spawn(async move {
            wait_for_shutdown_signal().await;
            info!("Shutdown signal received, stopping scheduler");
            signal_token.cancel();
        });

        scheduler.run(token).await
    });

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Scheduler failed: {}", e);
            ExitCode::from(EXIT_FATAL)
        }
    }
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = terminate.recv() => {}
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
