//! Unit tests for configuration loading and validation
//!
//! These tests verify YAML/TOML parsing, validation, retention resolution and
//! job selection.

use core_backup::config::{load_config, select_jobs, ConfigError};
use core_backup::services::github::options::GitHubJobOptions;
use rstest::rstest;
use test_utils::{
    render_config, sample_config_toml, sample_config_yaml, ConfigBuilder, ResultAssertions,
    TestContext,
};

#[rstest]
#[case("core-backup.yaml", sample_config_yaml())]
#[case("core-backup.toml", sample_config_toml())]
fn test_sample_configs_load(#[case] file_name: &str, #[case] template: &str) {
    let ctx = TestContext::new();
    let backups = ctx.create_subdir("backups");
    let path = ctx.create_file(file_name, &render_config(template, &backups));

    let config = load_config(&path).assert_ok();

    assert_eq!(config.default_retention_days, 14);
    assert_eq!(config.storage["local"].base_path, backups);
    let names: Vec<_> = config.jobs.iter().map(|j| j.name.as_str()).collect();
    assert_eq!(names, vec!["acme-nightly", "docs"]);
    assert!(config.scheduler.is_none());
}

#[test]
fn test_retention_resolution_from_file() {
    let ctx = TestContext::new();
    let backups = ctx.create_subdir("backups");
    let path = ctx.create_file(
        "core-backup.yaml",
        &render_config(sample_config_yaml(), &backups),
    );
    let config = load_config(&path).unwrap();

    assert_eq!(config.jobs[0].effective_retention(config.default_retention_days), 14);
    assert_eq!(config.jobs[1].effective_retention(config.default_retention_days), 3);
}

#[test]
fn test_job_options_stay_opaque_until_the_service_reads_them() {
    let ctx = TestContext::new();
    let backups = ctx.create_subdir("backups");
    let path = ctx.create_file(
        "core-backup.toml",
        &render_config(sample_config_toml(), &backups),
    );
    let config = load_config(&path).unwrap();

    let options = GitHubJobOptions::from_job(&config.jobs[0]).unwrap();
    assert_eq!(options.organization.as_deref(), Some("acme"));
    assert_eq!(options.repositories.len(), 2);
    assert!(options.repositories[0].include_wiki);
    assert_eq!(options.auth.token_env.as_deref(), Some("GITHUB_TOKEN"));
    assert_eq!(options.resolve_slug("api").unwrap(), "acme/api");
}

#[test]
fn test_missing_file() {
    let ctx = TestContext::new();
    let result = load_config(ctx.temp_dir().join("absent.yaml"));
    assert!(matches!(result, Err(ConfigError::NotFound(_))));
}

#[test]
fn test_malformed_yaml() {
    let ctx = TestContext::new();
    let path = ctx.create_file("core-backup.yaml", "jobs: [unterminated\n");
    assert!(matches!(load_config(&path), Err(ConfigError::YamlError(_))));
}

#[test]
fn test_unknown_storage_reference() {
    let ctx = TestContext::new();
    let backups = ctx.create_subdir("backups");
    let yaml = render_config(sample_config_yaml(), &backups).replace(
        "target_storage: local\n    retention_days: 3",
        "target_storage: offsite\n    retention_days: 3",
    );
    let path = ctx.create_file("core-backup.yaml", &yaml);

    load_config(&path).assert_err_contains("unknown storage 'offsite'");
}

#[test]
fn test_empty_jobs_rejected() {
    let ctx = TestContext::new();
    let path = ctx.create_file(
        "core-backup.yaml",
        "storage:\n  default:\n    type: filesystem\n    base_path: /tmp\njobs: []\n",
    );

    load_config(&path).assert_err_contains("At least one job");
}

#[test]
fn test_scheduler_section_defaults() {
    let ctx = TestContext::new();
    let backups = ctx.create_subdir("backups");
    let yaml = format!(
        "{}\nscheduler:\n  cron: \"*/15 * * * *\"\n",
        render_config(sample_config_yaml(), &backups)
    );
    let path = ctx.create_file("core-backup.yaml", &yaml);

    let config = load_config(&path).unwrap();
    let scheduler = config.scheduler.unwrap();
    assert_eq!(scheduler.timezone, "UTC");
    assert!(scheduler.run_on_startup);
}

#[test]
fn test_invalid_scheduler_timezone() {
    let ctx = TestContext::from_builder(
        ConfigBuilder::minimal()
            .add_job("nightly", "github")
            .with_scheduler("0 3 * * *", "Nowhere/Special", true),
    );

    load_config(ctx.config_path()).assert_err_contains("Scheduler");
}

#[test]
fn test_builder_config_round_trips_through_yaml() {
    let ctx = TestContext::from_builder(
        ConfigBuilder::minimal()
            .add_job("a", "github")
            .add_job("b", "github")
            .with_retention(5),
    );

    let loaded = load_config(ctx.config_path()).unwrap();
    assert_eq!(loaded.default_retention_days, 5);
    assert_eq!(loaded.jobs.len(), 2);
    assert_eq!(loaded.jobs, ctx.config().unwrap().jobs);
}

#[test]
fn test_select_jobs_filters_and_rejects_unknown() {
    let config = ConfigBuilder::minimal()
        .add_job("a", "github")
        .add_job("b", "github")
        .build();

    let only_b = vec!["b".to_string()];
    let selected = select_jobs(&config, Some(&only_b)).unwrap();
    assert_eq!(selected.len(), 1);
    assert_eq!(selected[0].name, "b");

    let empty: Vec<String> = Vec::new();
    assert_eq!(select_jobs(&config, Some(&empty)).unwrap().len(), 2);

    let unknown = vec!["b".to_string(), "nope".to_string()];
    select_jobs(&config, Some(&unknown)).assert_err_contains("nope");
}
