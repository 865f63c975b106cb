//! Tests for a one-shot run
//!
//! A run loads the config file, executes the selected jobs in order and
//! reports one result per job.

use core_backup::config::{load_config, NotificationConfig, NotifyEvent, SecretRef};
use core_backup::managers::notification::notify_results;
use core_backup::{JobStatus, NotificationManager, Orchestrator};
use test_utils::{ConfigBuilder, ScriptedServices, ServiceScript, TestContext, SCRIPTED};

fn context(jobs: &[&str]) -> TestContext {
    let builder = jobs
        .iter()
        .fold(ConfigBuilder::minimal(), |b, name| b.add_job(name, SCRIPTED));
    TestContext::from_builder(builder)
}

#[test]
fn test_run_all_jobs_from_config_file() {
    let ctx = context(&["alpha", "beta"]);
    let config = load_config(ctx.config_path()).unwrap();
    let services = ScriptedServices::new();

    let results = Orchestrator::new(config, services.registry())
        .unwrap()
        .run(None)
        .unwrap();

    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.success()));

    let date = chrono::Utc::now().format("%Y-%m-%d").to_string();
    assert!(ctx.file_exists(&format!("backups/alpha/{}/artifact.txt", date)));
    assert!(ctx.file_exists(&format!("backups/beta/{}/metadata", date)));
}

#[test]
fn test_run_selected_job_only() {
    let ctx = context(&["alpha", "beta", "gamma"]);
    let config = load_config(ctx.config_path()).unwrap();
    let services = ScriptedServices::new();

    let requested = vec!["gamma".to_string(), "alpha".to_string()];
    let results = Orchestrator::new(config, services.registry())
        .unwrap()
        .run(Some(&requested))
        .unwrap();

    let names: Vec<_> = results.iter().map(|r| r.job_name.as_str()).collect();
    assert_eq!(names, vec!["alpha", "gamma"]);
    assert!(services.calls_for("beta").is_empty());
    assert!(!ctx.file_exists("backups/beta"));
}

#[test]
fn test_run_unknown_job_runs_nothing() {
    let ctx = context(&["alpha"]);
    let config = load_config(ctx.config_path()).unwrap();
    let services = ScriptedServices::new();

    let requested = vec!["omega".to_string()];
    let outcome = Orchestrator::new(config, services.registry())
        .unwrap()
        .run(Some(&requested));

    assert!(outcome.is_err());
    assert!(services.log().is_empty());
    assert!(!ctx.file_exists("backups/alpha"));
}

#[test]
fn test_run_reports_failures_per_job() {
    let ctx = context(&["alpha", "beta"]);
    let config = load_config(ctx.config_path()).unwrap();
    let services = ScriptedServices::new()
        .script("alpha", ServiceScript::failing_execute(&["Repository acme/api backup failed: clone"]));

    let results = Orchestrator::new(config, services.registry())
        .unwrap()
        .run(None)
        .unwrap();

    assert_eq!(results[0].status, JobStatus::Failed);
    assert_eq!(results[1].status, JobStatus::Success);
    assert_eq!(NotificationManager::batch_event(&results), NotifyEvent::Failure);
    assert_eq!(NotificationManager::batch_event(&results[1..]), NotifyEvent::Success);
}

#[test]
fn test_results_serialize_for_reporting() {
    let ctx = context(&["alpha"]);
    let config = load_config(ctx.config_path()).unwrap();
    let services = ScriptedServices::new();

    let results = Orchestrator::new(config, services.registry())
        .unwrap()
        .run(None)
        .unwrap();
    let json = serde_json::to_value(&results).unwrap();

    assert_eq!(json[0]["job_name"], "alpha");
    assert_eq!(json[0]["status"], "success");
    assert_eq!(json[0]["errors"], serde_json::json!([]));
}

#[test]
fn test_unresolvable_webhook_disables_notifications() {
    let config = NotificationConfig {
        webhook: Some(SecretRef {
            env: Some("CORE_BACKUP_TEST_WEBHOOK_UNSET".to_string()),
            file: None,
        }),
        notify_on: vec![NotifyEvent::Failure],
    };
    assert!(NotificationManager::from_config(&config).is_none());

    let ctx = context(&["alpha"]);
    let mut full = load_config(ctx.config_path()).unwrap();
    full.notifications = config;
    // No webhook to call; must not panic or block
    notify_results(&full, &[]);
}
