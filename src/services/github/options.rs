//! GitHub job options, parsed from a job's opaque `options` value

use crate::config::{expand_tilde, Job};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_API_URL: &str = "https://api.github.com";
pub const DEFAULT_CLONE_BASE_URL: &str = "https://github.com";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GitHubJobOptions {
    /// Organization used for discovery, org exports and short repository names
    #[serde(default)]
    pub organization: Option<String>,

    #[serde(default)]
    pub repositories: Vec<RepositoryOptions>,

    /// Back up every organization repository in addition to the listed ones
    #[serde(default)]
    pub include_all_repositories: bool,

    #[serde(default)]
    pub organization_exports: OrganizationExports,

    pub auth: AuthOptions,

    #[serde(default)]
    pub retention_days: Option<i64>,

    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default = "default_clone_base_url")]
    pub clone_base_url: String,

    #[serde(default = "default_clone_timeout_seconds")]
    pub clone_timeout_seconds: u64,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct RepositoryOptions {
    /// `owner/repo`, or a bare name resolved against the organization
    pub name: String,
    #[serde(default)]
    pub include_wiki: bool,
    #[serde(default)]
    pub include_releases: bool,
    #[serde(default)]
    pub include_projects: bool,
    #[serde(default, alias = "include_actions_artifacts")]
    pub include_artifacts: bool,
}

impl RepositoryOptions {
    /// Options for a discovered repository: git data, issues and pull requests only
    pub fn discovered(full_name: &str) -> Self {
        Self {
            name: full_name.to_string(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OrganizationExports {
    #[serde(default)]
    pub members: bool,
    #[serde(default)]
    pub teams: bool,
    #[serde(default)]
    pub projects: bool,
}

#[derive(Clone, Default, Deserialize, Serialize)]
pub struct AuthOptions {
    /// Inline token (discouraged)
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub token_env: Option<String>,
    #[serde(default)]
    pub token_file: Option<PathBuf>,
    /// Clone over SSH with this key instead of HTTPS
    #[serde(default)]
    pub ssh_key_path: Option<PathBuf>,
}

impl AuthOptions {
    pub fn has_token_source(&self) -> bool {
        self.token.is_some() || self.token_env.is_some() || self.token_file.is_some()
    }

    /// Resolve the API token: inline value, then environment variable, then file
    pub fn resolve_token(&self) -> Option<String> {
        if let Some(token) = self.token.as_deref().filter(|t| !t.is_empty()) {
            return Some(token.to_string());
        }

        if let Some(ref var) = self.token_env {
            if let Ok(value) = std::env::var(var) {
                if !value.trim().is_empty() {
                    return Some(value.trim().to_string());
                }
            }
        }

        if let Some(ref path) = self.token_file {
            if let Ok(contents) = std::fs::read_to_string(expand_tilde(path)) {
                let trimmed = contents.trim();
                if !trimmed.is_empty() {
                    return Some(trimmed.to_string());
                }
            }
        }

        None
    }
}

impl std::fmt::Debug for AuthOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthOptions")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("token_env", &self.token_env)
            .field("token_file", &self.token_file)
            .field("ssh_key_path", &self.ssh_key_path)
            .finish()
    }
}

impl GitHubJobOptions {
    /// Parse and check the options of a `github` job
    pub fn from_job(job: &Job) -> Result<Self> {
        if job.service != "github" {
            anyhow::bail!("GitHub service cannot handle service '{}'", job.service);
        }
        if job.options.is_null() {
            anyhow::bail!("Job '{}' has no GitHub options", job.name);
        }

        let options: GitHubJobOptions = serde_json::from_value(job.options.clone())
            .with_context(|| format!("Invalid GitHub options for job '{}'", job.name))?;

        if !options.auth.has_token_source() {
            anyhow::bail!("Either token, token_env or token_file must be provided for GitHub auth");
        }
        if options.include_all_repositories && options.organization.is_none() {
            anyhow::bail!("include_all_repositories requires an organization");
        }

        Ok(options)
    }

    /// Expand a repository name to `owner/repo`
    pub fn resolve_slug(&self, name: &str) -> Result<String> {
        if name.contains('/') {
            return Ok(name.to_string());
        }
        match self.organization {
            Some(ref org) => Ok(format!("{}/{}", org, name)),
            None => anyhow::bail!("Repository '{}' missing organization context", name),
        }
    }
}

fn default_api_url() -> String { DEFAULT_API_URL.to_string() }
fn default_clone_base_url() -> String { DEFAULT_CLONE_BASE_URL.to_string() }
fn default_clone_timeout_seconds() -> u64 { 3600 }
