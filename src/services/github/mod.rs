//! GitHub backup connector
//!
//! Mirrors repositories with `git clone --mirror`, exports issues, pull
//! requests and friends through the REST API, and writes `manifest.json`
//! into the run directory.

pub mod api;
pub mod manifest;
pub mod metadata;
pub mod options;
pub mod repo_backup;

use super::{BackupService, JobContext, ServiceError};
use crate::config::Job;
use crate::utils::{CommandExecutor, RealExecutor};
use anyhow::Context;
use api::{GitHubClient, HttpGitHubClient};
use chrono::Utc;
use manifest::{Manifest, RepositoryEntry, MANIFEST_FILE};
use options::{GitHubJobOptions, RepositoryOptions};
use repo_backup::GitMirror;
use std::collections::HashSet;
use std::fs;
use std::sync::Arc;
use tracing::{error, info, info_span, warn};

/// Builds a REST client from a resolved token and the API base URL
pub type ClientConnector =
    Box<dyn Fn(&str, &str) -> anyhow::Result<Box<dyn GitHubClient>> + Send + Sync>;

pub struct GitHubBackupService {
    job_name: String,
    options: GitHubJobOptions,
    executor: Arc<dyn CommandExecutor>,
    connector: ClientConnector,
    client: Option<Box<dyn GitHubClient>>,
    token: Option<String>,
}

impl GitHubBackupService {
    /// Service using the real `git` binary and the GitHub REST API
    pub fn new(job: &Job) -> anyhow::Result<Self> {
        Self::with_backends(job, Arc::new(RealExecutor::new()), |token, api_url| {
            Ok(Box::new(HttpGitHubClient::new(token, api_url)?) as Box<dyn GitHubClient>)
        })
    }

    /// Service with injected command execution and API client construction
    pub fn with_backends<F>(
        job: &Job,
        executor: Arc<dyn CommandExecutor>,
        connector: F,
    ) -> anyhow::Result<Self>
    where
        F: Fn(&str, &str) -> anyhow::Result<Box<dyn GitHubClient>> + Send + Sync + 'static,
    {
        let options = GitHubJobOptions::from_job(job)?;
        Ok(Self {
            job_name: job.name.clone(),
            options,
            executor,
            connector: Box::new(connector),
            client: None,
            token: None,
        })
    }

    pub fn options(&self) -> &GitHubJobOptions {
        &self.options
    }

    /// Listed repositories, plus organization discovery when nothing is listed
    /// or `include_all_repositories` is set; deduplicated by `owner/repo`
    fn resolve_repositories(
        &self,
        client: &dyn GitHubClient,
    ) -> Result<Vec<RepositoryOptions>, ServiceError> {
        let mut repositories = self.options.repositories.clone();
        if !repositories.is_empty() && !self.options.include_all_repositories {
            return Ok(repositories);
        }

        let org = match self.options.organization {
            Some(ref org) => org,
            None => {
                return Err(ServiceError::new(
                    "Cannot determine repositories to back up: no repositories listed and no organization provided.",
                ))
            }
        };

        let discovered: Vec<String> = client
            .iterate(&format!("/orgs/{}/repos", org), &[("type", "all")])
            .filter_map(|item| match item {
                Ok(repo) => repo
                    .get("full_name")
                    .and_then(|v| v.as_str())
                    .map(|s| Ok(s.to_string())),
                Err(e) => Some(Err(e)),
            })
            .collect::<Result<Vec<String>, _>>()
            .map_err(|e| {
                ServiceError::new(format!(
                    "Failed to list repositories for organization '{}': {}",
                    org, e
                ))
            })?;

        info!("Discovered {} repositories in '{}'", discovered.len(), org);

        let mut seen: HashSet<String> = repositories
            .iter()
            .map(|r| self.options.resolve_slug(&r.name).unwrap_or_else(|_| r.name.clone()))
            .collect();
        for full_name in discovered {
            if seen.insert(full_name.clone()) {
                repositories.push(RepositoryOptions::discovered(&full_name));
            }
        }

        if repositories.is_empty() {
            return Err(ServiceError::new(format!(
                "No repositories found for organization '{}'.",
                org
            )));
        }

        Ok(repositories)
    }

    /// Back up one repository, recording the outcome in its manifest entry
    fn backup_repository(
        &self,
        client: &dyn GitHubClient,
        mirror: &GitMirror<'_>,
        repo: &RepositoryOptions,
        ctx: &JobContext,
    ) -> Result<RepositoryEntry, (RepositoryEntry, anyhow::Error)> {
        let slug = match self.options.resolve_slug(&repo.name) {
            Ok(slug) => slug,
            Err(e) => return Err((RepositoryEntry::new(&repo.name), e)),
        };
        let mut entry = RepositoryEntry::new(&slug);

        let archive = match mirror.backup_repository(
            &slug,
            repo,
            &ctx.paths.root,
            &ctx.workspace,
            ctx.started_at,
        ) {
            Ok(archive) => archive,
            Err(e) => return Err((entry, e)),
        };
        entry.set_archives(&archive.archive_path, archive.wiki_archive_path.as_ref());

        match metadata::export_repository_metadata(client, &slug, repo, &ctx.paths.metadata_dir) {
            Ok(counts) => {
                entry.metadata_counts = counts;
                Ok(entry)
            }
            Err(e) => Err((entry, e)),
        }
    }
}

impl BackupService for GitHubBackupService {
    fn prepare(&mut self, _ctx: &JobContext) -> Result<(), ServiceError> {
        let token = self.options.auth.resolve_token().ok_or_else(|| {
            ServiceError::new("GitHub token could not be resolved from configuration or environment.")
        })?;

        let client = (self.connector)(&token, &self.options.api_url)
            .map_err(|e| ServiceError::new(format!("{:#}", e)))?;

        self.client = Some(client);
        self.token = Some(token);
        Ok(())
    }

    fn execute(&mut self, ctx: &JobContext) -> Result<(), ServiceError> {
        let (client, token) = match (self.client.as_deref(), self.token.as_deref()) {
            (Some(client), Some(token)) => (client, token),
            _ => return Err(ServiceError::new("GitHub service not prepared.")),
        };

        fs::create_dir_all(&ctx.paths.metadata_dir)
            .with_context(|| format!("Failed to create {}", ctx.paths.metadata_dir.display()))?;

        let repositories = self.resolve_repositories(client)?;
        let mirror = GitMirror::new(self.executor.as_ref(), &self.options, token);

        let mut manifest = Manifest::new(ctx.started_at, ctx.retention_days);
        for repo in &repositories {
            let span = info_span!("repository", repo = %repo.name);
            let _enter = span.enter();

            match self.backup_repository(client, &mirror, repo, ctx) {
                Ok(entry) => {
                    info!("Repository {} backed up", entry.name);
                    manifest.repositories.push(entry);
                }
                Err((mut entry, e)) => {
                    error!("Repository {} backup failed: {:#}", entry.name, e);
                    manifest
                        .errors
                        .push(format!("Repository {} backup failed: {:#}", entry.name, e));
                    entry.mark_failed(format!("{:#}", e));
                    manifest.repositories.push(entry);
                }
            }
        }

        manifest.organization_exports = metadata::export_organization_metadata(
            client,
            self.options.organization.as_deref(),
            &self.options.organization_exports,
            &ctx.paths.metadata_dir,
        );
        manifest.completed_at = Utc::now();
        manifest.write(&ctx.paths.root.join(MANIFEST_FILE))?;

        if manifest.errors.is_empty() {
            info!(
                "Job '{}' backed up {} repositories",
                self.job_name,
                manifest.repositories.len()
            );
            Ok(())
        } else {
            warn!(
                "Job '{}' completed with {} error(s)",
                self.job_name,
                manifest.errors.len()
            );
            Err(ServiceError::with_messages(
                "GitHub backup completed with errors.",
                manifest.errors,
            ))
        }
    }

    fn finalize(&mut self, _ctx: &JobContext) -> Result<(), ServiceError> {
        self.client = None;
        self.token = None;
        Ok(())
    }
}
