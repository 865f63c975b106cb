//! End-to-end GitHub backup through the orchestrator
//!
//! git is replaced by a mock executor that materializes clone directories and
//! the REST API by canned responses; archives, metadata and the manifest are
//! written to a real filesystem storage.

use super::common::{github_registry, today};
use core_backup::services::github::manifest::{BackupStatus, Manifest, MANIFEST_FILE};
use core_backup::{JobStatus, Orchestrator};
use serde_json::json;
use std::fs;
use test_utils::{
    sample_github_options, write_dated_run, ConfigBuilder, MockExecutor, MockGitHubClient,
    MockResponse,
};

fn api_client() -> MockGitHubClient {
    MockGitHubClient::new()
        .route("/repos/acme/api", json!({"full_name": "acme/api", "private": true}))
        .route("/repos/acme/api/issues", json!([{"number": 1}, {"number": 2}]))
        .route("/repos/acme/api/pulls", json!([{"number": 3}]))
        .route("/repos/acme/api/releases", json!([{"tag_name": "v1.0.0"}]))
        .route("/orgs/acme/members", json!([{"login": "octocat"}, {"login": "hubot"}]))
}

fn executor() -> MockExecutor {
    MockExecutor::new()
        .with_default_response(MockResponse::Materialize)
        .expect_arg_containing(
            "broken",
            MockResponse::Failure {
                stderr: "fatal: repository not found".to_string(),
                exit_code: 128,
            },
        )
}

#[test]
fn test_partial_failure_is_recorded_in_manifest_and_result() {
    let (config, temp_dir) = ConfigBuilder::minimal()
        .add_github_job("acme-nightly", sample_github_options("acme", &["api", "broken"]))
        .persist();
    let executor = executor();
    let client = api_client();
    let orchestrator =
        Orchestrator::new(config, github_registry(executor.clone(), client.clone())).unwrap();

    let results = orchestrator.run(None).unwrap();

    assert_eq!(results.len(), 1);
    let result = &results[0];
    assert_eq!(result.status, JobStatus::Failed);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].starts_with("Repository acme/broken backup failed:"));
    assert!(result.errors[0].contains("repository not found"));

    let run_dir = temp_dir.path().join("backups").join("acme-nightly").join(today());
    let manifest = Manifest::read(&run_dir.join(MANIFEST_FILE)).unwrap();
    assert_eq!(manifest.schema_version, "1.0.0");
    assert_eq!(manifest.retention_days, 30);
    assert_eq!(manifest.repositories.len(), 2);

    let api = &manifest.repositories[0];
    assert_eq!(api.name, "acme/api");
    assert_eq!(api.backup_status, BackupStatus::Success);
    assert!(api.archive_path.ends_with(".tar.gz"));
    let archive = std::path::Path::new(&api.archive_path);
    assert!(archive.is_file());
    assert_eq!(archive.parent(), Some(run_dir.as_path()));
    assert!(archive
        .file_name()
        .unwrap()
        .to_string_lossy()
        .starts_with("acme_api_"));
    assert_eq!(api.metadata_counts.get("issues"), Some(&2));
    assert_eq!(api.metadata_counts.get("pull_requests"), Some(&1));
    assert_eq!(api.metadata_counts.get("releases"), Some(&1));

    let broken = &manifest.repositories[1];
    assert_eq!(broken.name, "acme/broken");
    assert_eq!(broken.backup_status, BackupStatus::Failed);
    assert!(!broken.error.is_empty());

    assert_eq!(manifest.errors, result.errors);
    assert_eq!(manifest.organization_exports.get("org_members"), Some(&2));
    assert!(run_dir.join("metadata").join("acme_api").join("issues.json").is_file());
}

#[test]
fn test_token_reaches_git_only_through_environment() {
    let (config, _temp_dir) = ConfigBuilder::minimal()
        .add_github_job("acme-nightly", sample_github_options("acme", &["api"]))
        .persist();
    let executor = executor();
    let orchestrator =
        Orchestrator::new(config, github_registry(executor.clone(), api_client())).unwrap();

    let results = orchestrator.run(None).unwrap();
    assert!(results[0].success(), "errors: {:?}", results[0].errors);

    let calls = executor.get_calls();
    assert_eq!(calls.len(), 1);
    let clone = &calls[0];
    assert_eq!(clone.program, "git");
    assert_eq!(clone.args[0..2], ["clone", "--mirror"]);
    assert_eq!(clone.args[2], "https://github.com/acme/api.git");
    assert!(clone.args.iter().all(|a| !a.contains("ghp_test_token")));
    assert!(clone.env_keys.contains(&"GIT_CONFIG_VALUE_0".to_string()));
    assert!(clone.env_keys.contains(&"GIT_TERMINAL_PROMPT".to_string()));
}

#[test]
fn test_workspace_is_cleaned_after_run() {
    let (config, _temp_dir) = ConfigBuilder::minimal()
        .add_github_job("acme-nightly", sample_github_options("acme", &["api"]))
        .persist();
    let executor = executor();
    let orchestrator =
        Orchestrator::new(config, github_registry(executor.clone(), api_client())).unwrap();

    orchestrator.run(None).unwrap();

    let dest = executor.get_calls()[0].args[3].clone();
    assert!(!std::path::Path::new(&dest).exists());
}

#[test]
fn test_discovery_backs_up_every_org_repository() {
    let options = json!({
        "organization": "acme",
        "auth": {"token": "ghp_test_token"},
    });
    let (config, temp_dir) = ConfigBuilder::minimal()
        .add_github_job("acme-all", options)
        .persist();
    let client = api_client()
        .route(
            "/orgs/acme/repos",
            json!([{"full_name": "acme/api"}, {"full_name": "acme/web"}]),
        )
        .route("/repos/acme/web", json!({"full_name": "acme/web"}));
    let executor = executor();
    let orchestrator = Orchestrator::new(config, github_registry(executor.clone(), client)).unwrap();

    let results = orchestrator.run(None).unwrap();

    assert!(results[0].success(), "errors: {:?}", results[0].errors);
    assert_eq!(executor.call_count("git"), 2);
    let run_dir = temp_dir.path().join("backups").join("acme-all").join(today());
    let manifest = Manifest::read(&run_dir.join(MANIFEST_FILE)).unwrap();
    let names: Vec<_> = manifest.repositories.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["acme/api", "acme/web"]);
}

#[test]
fn test_empty_organization_fails_the_job() {
    let options = json!({
        "organization": "ghost",
        "auth": {"token": "ghp_test_token"},
    });
    let (config, _temp_dir) = ConfigBuilder::minimal()
        .add_github_job("ghost", options)
        .persist();
    let client = MockGitHubClient::new().route("/orgs/ghost/repos", json!([]));
    let orchestrator =
        Orchestrator::new(config, github_registry(MockExecutor::new(), client)).unwrap();

    let results = orchestrator.run(None).unwrap();

    assert_eq!(
        results[0].errors,
        vec!["No repositories found for organization 'ghost'."]
    );
}

#[test]
fn test_expired_runs_are_pruned_after_backup() {
    let (config, temp_dir) = ConfigBuilder::minimal()
        .with_retention(30)
        .add_github_job("acme-nightly", sample_github_options("acme", &["api"]))
        .persist();
    let base = temp_dir.path().join("backups");
    let expired_date = (chrono::Utc::now().date_naive() - chrono::Duration::days(45))
        .format("%Y-%m-%d")
        .to_string();
    let expired = write_dated_run(&base, "acme-nightly", &expired_date);
    let unrelated = base.join("acme-nightly").join("notes");
    fs::create_dir_all(&unrelated).unwrap();

    let orchestrator =
        Orchestrator::new(config, github_registry(executor(), api_client())).unwrap();
    let results = orchestrator.run(None).unwrap();

    assert!(results[0].success());
    assert!(!expired.exists());
    assert!(unrelated.exists());
    assert!(base.join("acme-nightly").join(today()).join(MANIFEST_FILE).is_file());
}
