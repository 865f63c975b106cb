//! Unit tests for batch orchestration

use core_backup::config::{ConfigError, Job};
use core_backup::{JobStatus, Orchestrator, StorageAdapter};
use std::collections::HashMap;
use test_utils::{
    ConfigBuilder, RecordingStorage, ScriptedServices, ServiceScript, SCRIPTED,
};

fn job_on(name: &str, storage: &str) -> Job {
    Job {
        name: name.to_string(),
        service: SCRIPTED.to_string(),
        target_storage: storage.to_string(),
        schedule: None,
        retention_days: None,
        options: serde_json::Value::Null,
    }
}

#[test]
fn test_runs_jobs_in_config_order() {
    let (config, _temp_dir) = ConfigBuilder::minimal()
        .add_job("b", SCRIPTED)
        .add_job("a", SCRIPTED)
        .add_job("c", SCRIPTED)
        .persist();
    let services = ScriptedServices::new();
    let orchestrator = Orchestrator::new(config, services.registry()).unwrap();

    let results = orchestrator.run(None).unwrap();

    let names: Vec<_> = results.iter().map(|r| r.job_name.as_str()).collect();
    assert_eq!(names, vec!["b", "a", "c"]);
    let executes: Vec<_> = services
        .log()
        .into_iter()
        .filter(|entry| entry.ends_with(":execute"))
        .collect();
    assert_eq!(executes, vec!["b:execute", "a:execute", "c:execute"]);
}

#[test]
fn test_one_failure_does_not_stop_the_batch() {
    let (config, _temp_dir) = ConfigBuilder::minimal()
        .add_job("first", SCRIPTED)
        .add_job("second", SCRIPTED)
        .persist();
    let services =
        ScriptedServices::new().script("first", ServiceScript::failing_execute(&["boom"]));
    let orchestrator = Orchestrator::new(config, services.registry()).unwrap();

    let results = orchestrator.run(None).unwrap();

    assert_eq!(results[0].status, JobStatus::Failed);
    assert_eq!(results[0].errors, vec!["boom"]);
    assert_eq!(results[1].status, JobStatus::Success);
}

#[test]
fn test_unknown_service_type() {
    let (config, _temp_dir) = ConfigBuilder::minimal()
        .add_job("mystery", "gitlab")
        .add_job("fine", SCRIPTED)
        .persist();
    let services = ScriptedServices::new();
    let orchestrator = Orchestrator::new(config, services.registry()).unwrap();

    let results = orchestrator.run(None).unwrap();

    assert_eq!(results[0].status, JobStatus::Failed);
    assert_eq!(
        results[0].errors,
        vec!["Service instantiation failed: No service connector registered for 'gitlab'"]
    );
    assert!(results[1].success());
}

#[test]
fn test_constructor_failure_is_contained() {
    let (config, _temp_dir) = ConfigBuilder::minimal()
        .add_job("broken", SCRIPTED)
        .persist();
    let services = ScriptedServices::new().fail_construction("broken", "bad options");
    let orchestrator = Orchestrator::new(config, services.registry()).unwrap();

    let results = orchestrator.run(None).unwrap();

    assert_eq!(results[0].errors, vec!["Service instantiation failed: bad options"]);
    assert!(services.log().is_empty());
}

#[test]
fn test_github_job_with_invalid_options_fails_instantiation() {
    let (config, _temp_dir) = ConfigBuilder::minimal()
        .add_github_job("gh", serde_json::json!({"organization": "acme"}))
        .persist();
    let orchestrator = Orchestrator::new(config, ScriptedServices::new().registry()).unwrap();

    let results = orchestrator.run(None).unwrap();

    assert_eq!(results[0].status, JobStatus::Failed);
    assert!(results[0].errors[0].starts_with("Service instantiation failed:"));
}

#[test]
fn test_unknown_job_names_fail_before_running() {
    let (config, _temp_dir) = ConfigBuilder::minimal().add_job("a", SCRIPTED).persist();
    let services = ScriptedServices::new();
    let orchestrator = Orchestrator::new(config, services.registry()).unwrap();

    let requested = vec!["a".to_string(), "ghost".to_string()];
    let outcome = orchestrator.run(Some(&requested));

    assert!(matches!(outcome, Err(ConfigError::UnknownJobs(ref names)) if names == "ghost"));
    assert!(services.log().is_empty());
}

#[test]
fn test_storage_preparation_failure_is_reported_per_job() {
    let (config, temp_dir) = ConfigBuilder::minimal()
        .add_job_config(job_on("readonly", "readonly"))
        .add_job_config(job_on("ok", "default"))
        .persist();
    let readonly = RecordingStorage::new(&temp_dir.path().join("ro")).failing_prepare();
    let default = RecordingStorage::new(&temp_dir.path().join("backups"));

    let mut storages: HashMap<String, Box<dyn StorageAdapter>> = HashMap::new();
    storages.insert("readonly".to_string(), Box::new(readonly));
    storages.insert("default".to_string(), Box::new(default.clone()));

    let services = ScriptedServices::new();
    let orchestrator = Orchestrator::with_storages(config, services.registry(), storages);
    let results = orchestrator.run(None).unwrap();

    assert_eq!(results[0].status, JobStatus::Failed);
    assert!(results[0].errors[0].starts_with("Storage preparation failed:"));
    assert!(results[1].success());
    assert_eq!(services.calls_for("readonly"), Vec::<String>::new());
    assert_eq!(default.retention_calls(), vec![("ok".to_string(), 30)]);
}

#[test]
fn test_missing_storage_adapter() {
    let (config, _temp_dir) = ConfigBuilder::minimal().add_job("a", SCRIPTED).persist();
    let orchestrator =
        Orchestrator::with_storages(config, ScriptedServices::new().registry(), HashMap::new());

    let results = orchestrator.run(None).unwrap();

    assert_eq!(results[0].errors, vec!["Storage 'default' is not configured"]);
}

#[test]
fn test_retention_override_reaches_storage() {
    let mut job = job_on("short", "default");
    job.retention_days = Some(2);
    let (config, temp_dir) = ConfigBuilder::minimal()
        .add_job_config(job)
        .with_retention(90)
        .persist();
    let storage = RecordingStorage::new(&temp_dir.path().join("backups"));
    let mut storages: HashMap<String, Box<dyn StorageAdapter>> = HashMap::new();
    storages.insert("default".to_string(), Box::new(storage.clone()));

    Orchestrator::with_storages(config, ScriptedServices::new().registry(), storages)
        .run(None)
        .unwrap();

    assert_eq!(storage.retention_calls(), vec![("short".to_string(), 2)]);
}
