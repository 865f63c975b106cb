//! Test fixtures and sample data
//!
//! Scripted service connectors, a recording storage adapter and config
//! templates shared by the command and integration suites.

use chrono::{DateTime, Utc};
use core_backup::config::Job;
use core_backup::storage::{FilesystemStorage, RunPaths, StorageAdapter, StorageError};
use core_backup::{BackupService, JobContext, ServiceError, ServiceRegistry};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Service type under which [`ScriptedServices`] registers itself
pub const SCRIPTED: &str = "scripted";

/// Shared, ordered record of `<job>:<step>` entries
pub type CallLog = Arc<Mutex<Vec<String>>>;

type Hook = Arc<dyn Fn(&JobContext) + Send + Sync>;

/// What a lifecycle step does when called
#[derive(Debug, Clone, Default)]
pub enum StepOutcome {
    #[default]
    Ok,
    /// Structured failure with these messages
    Fail(Vec<String>),
    /// Unstructured failure
    Error(String),
}

impl StepOutcome {
    fn to_result(&self) -> Result<(), ServiceError> {
        match self {
            StepOutcome::Ok => Ok(()),
            StepOutcome::Fail(messages) => Err(ServiceError::with_messages(
                messages.join("; "),
                messages.clone(),
            )),
            StepOutcome::Error(message) => {
                Err(ServiceError::Other(anyhow::anyhow!("{}", message)))
            }
        }
    }
}

/// Outcomes for the three lifecycle steps of one job
#[derive(Debug, Clone, Default)]
pub struct ServiceScript {
    pub prepare: StepOutcome,
    pub execute: StepOutcome,
    pub finalize: StepOutcome,
}

impl ServiceScript {
    pub fn failing_prepare(message: &str) -> Self {
        Self {
            prepare: StepOutcome::Fail(vec![message.to_string()]),
            ..Self::default()
        }
    }

    pub fn failing_execute(messages: &[&str]) -> Self {
        Self {
            execute: StepOutcome::Fail(messages.iter().map(|m| m.to_string()).collect()),
            ..Self::default()
        }
    }

    pub fn failing_finalize(message: &str) -> Self {
        Self {
            finalize: StepOutcome::Error(message.to_string()),
            ..Self::default()
        }
    }
}

/// Service that follows a [`ServiceScript`] and logs every step
///
/// A successful `execute` writes `artifact.txt` into the run directory.
pub struct ScriptedService {
    job_name: String,
    script: ServiceScript,
    log: CallLog,
    on_execute: Option<Hook>,
}

impl ScriptedService {
    fn step(&self, step: &str, outcome: &StepOutcome) -> Result<(), ServiceError> {
        self.log.lock().push(format!("{}:{}", self.job_name, step));
        outcome.to_result()
    }
}

impl BackupService for ScriptedService {
    fn prepare(&mut self, _ctx: &JobContext) -> Result<(), ServiceError> {
        self.step("prepare", &self.script.prepare)
    }

    fn execute(&mut self, ctx: &JobContext) -> Result<(), ServiceError> {
        if let Some(ref hook) = self.on_execute {
            hook(ctx);
        }
        self.step("execute", &self.script.execute)?;
        std::fs::write(ctx.paths.root.join("artifact.txt"), &self.job_name)
            .map_err(|e| ServiceError::Other(e.into()))
    }

    fn finalize(&mut self, _ctx: &JobContext) -> Result<(), ServiceError> {
        self.step("finalize", &self.script.finalize)
    }
}

/// Factory for scripted services, registered as the `scripted` type
#[derive(Clone, Default)]
pub struct ScriptedServices {
    scripts: Arc<Mutex<HashMap<String, ServiceScript>>>,
    construction_failures: Arc<Mutex<HashMap<String, String>>>,
    log: CallLog,
    on_execute: Option<Hook>,
}

impl ScriptedServices {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the lifecycle of `job`; unscripted jobs succeed
    pub fn script(self, job: &str, script: ServiceScript) -> Self {
        self.scripts.lock().insert(job.to_string(), script);
        self
    }

    /// Make the constructor fail for `job`
    pub fn fail_construction(self, job: &str, message: &str) -> Self {
        self.construction_failures
            .lock()
            .insert(job.to_string(), message.to_string());
        self
    }

    /// Run `hook` at the start of every `execute`
    pub fn on_execute<F>(mut self, hook: F) -> Self
    where
        F: Fn(&JobContext) + Send + Sync + 'static,
    {
        self.on_execute = Some(Arc::new(hook));
        self
    }

    /// Every step called so far, in order
    pub fn log(&self) -> Vec<String> {
        self.log.lock().clone()
    }

    /// Steps called for one job
    pub fn calls_for(&self, job: &str) -> Vec<String> {
        let prefix = format!("{}:", job);
        self.log
            .lock()
            .iter()
            .filter_map(|entry| entry.strip_prefix(&prefix).map(str::to_string))
            .collect()
    }

    /// Registry with the built-in connectors plus `scripted`
    pub fn registry(&self) -> ServiceRegistry {
        let mut registry = ServiceRegistry::with_defaults();
        let factory = self.clone();
        registry.register(SCRIPTED, move |job| factory.build(job));
        registry
    }

    fn build(&self, job: &Job) -> anyhow::Result<Box<dyn BackupService>> {
        if let Some(message) = self.construction_failures.lock().get(&job.name) {
            anyhow::bail!("{}", message);
        }

        let script = self
            .scripts
            .lock()
            .get(&job.name)
            .cloned()
            .unwrap_or_default();

        Ok(Box::new(ScriptedService {
            job_name: job.name.clone(),
            script,
            log: self.log.clone(),
            on_execute: self.on_execute.clone(),
        }))
    }
}

/// Filesystem storage that records retention calls and can refuse to prepare
#[derive(Clone)]
pub struct RecordingStorage {
    inner: FilesystemStorage,
    fail_prepare: bool,
    retention_calls: Arc<Mutex<Vec<(String, i64)>>>,
}

impl RecordingStorage {
    pub fn new(base_path: &Path) -> Self {
        Self {
            inner: FilesystemStorage::create("recording", base_path)
                .expect("Failed to create storage"),
            fail_prepare: false,
            retention_calls: Arc::default(),
        }
    }

    /// Every `prepare_run` fails as if the base path were read-only
    pub fn failing_prepare(mut self) -> Self {
        self.fail_prepare = true;
        self
    }

    /// `(job, retention_days)` for every `enforce_retention` call
    pub fn retention_calls(&self) -> Vec<(String, i64)> {
        self.retention_calls.lock().clone()
    }
}

impl StorageAdapter for RecordingStorage {
    fn prepare_run(&self, job: &Job, started_at: DateTime<Utc>) -> Result<RunPaths, StorageError> {
        if self.fail_prepare {
            return Err(StorageError::CreateDir {
                path: self.inner.base_path().join(&job.name),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
            });
        }
        self.inner.prepare_run(job, started_at)
    }

    fn enforce_retention(&self, job: &Job, retention_days: i64) -> Result<usize, StorageError> {
        self.retention_calls
            .lock()
            .push((job.name.clone(), retention_days));
        self.inner.enforce_retention(job, retention_days)
    }
}

/// Create `<base>/<job>/<date>/manifest.json` as a past run would have
pub fn write_dated_run(base: &Path, job: &str, date: &str) -> PathBuf {
    let dir = base.join(job).join(date);
    std::fs::create_dir_all(dir.join("metadata")).expect("Failed to create run dir");
    std::fs::write(dir.join("manifest.json"), "{}").expect("Failed to write manifest");
    dir
}

/// GitHub options with an inline token and the given repositories
pub fn sample_github_options(organization: &str, repositories: &[&str]) -> serde_json::Value {
    let repositories: Vec<serde_json::Value> = repositories
        .iter()
        .map(|name| serde_json::json!({ "name": name, "include_releases": true }))
        .collect();

    serde_json::json!({
        "organization": organization,
        "repositories": repositories,
        "auth": { "token": "ghp_test_token" },
        "organization_exports": { "members": true, "teams": false, "projects": false },
    })
}

/// Minimal valid YAML config; replace `{backup_path}`
pub fn sample_config_yaml() -> &'static str {
    r#"
default_retention_days: 14

storage:
  local:
    type: filesystem
    base_path: "{backup_path}"

jobs:
  - name: acme-nightly
    service: github
    target_storage: local
    schedule: "0 2 * * *"
    options:
      organization: acme
      repositories:
        - name: api
          include_wiki: true
        - name: acme/web
      auth:
        token_env: GITHUB_TOKEN
  - name: docs
    service: github
    target_storage: local
    retention_days: 3
    options:
      repositories:
        - name: acme/docs
      auth:
        token_file: /run/secrets/github_token
"#
}

/// The same configuration in TOML; replace `{backup_path}`
pub fn sample_config_toml() -> &'static str {
    r#"
default_retention_days = 14

[storage.local]
type = "filesystem"
base_path = "{backup_path}"

[[jobs]]
name = "acme-nightly"
service = "github"
target_storage = "local"
schedule = "0 2 * * *"

[jobs.options]
organization = "acme"
repositories = [{ name = "api", include_wiki = true }, { name = "acme/web" }]
auth = { token_env = "GITHUB_TOKEN" }

[[jobs]]
name = "docs"
service = "github"
target_storage = "local"
retention_days = 3

[jobs.options]
repositories = [{ name = "acme/docs" }]
auth = { token_file = "/run/secrets/github_token" }
"#
}

/// Fill `{backup_path}` in a template
pub fn render_config(template: &str, backup_path: &Path) -> String {
    template.replace("{backup_path}", &backup_path.display().to_string())
}
