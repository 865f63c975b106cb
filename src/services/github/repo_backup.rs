//! Mirror clones and archive packaging

use super::options::{GitHubJobOptions, RepositoryOptions};
use crate::utils::archive::package_directory;
use crate::utils::CommandExecutor;
use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

const ARCHIVE_TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// Archives produced for one repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryArchive {
    pub archive_path: PathBuf,
    pub wiki_archive_path: Option<PathBuf>,
}

enum GitAuth {
    /// HTTPS with the token sent as a basic-auth header
    Token(String),
    /// SSH with a private key file
    SshKey(PathBuf),
}

/// Runs `git clone --mirror` with credentials scoped to each invocation
pub struct GitMirror<'a> {
    executor: &'a dyn CommandExecutor,
    auth: GitAuth,
    clone_base_url: String,
    timeout: Duration,
}

impl<'a> GitMirror<'a> {
    pub fn new(executor: &'a dyn CommandExecutor, options: &GitHubJobOptions, token: &str) -> Self {
        let auth = match options.auth.ssh_key_path {
            Some(ref key) => GitAuth::SshKey(crate::config::expand_tilde(key)),
            None => GitAuth::Token(token.to_string()),
        };

        Self {
            executor,
            auth,
            clone_base_url: options.clone_base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(options.clone_timeout_seconds),
        }
    }

    /// Clone URL for `owner/repo`; never carries credentials
    pub fn clone_url(&self, slug: &str) -> String {
        match self.auth {
            GitAuth::Token(_) => format!("{}/{}.git", self.clone_base_url, slug),
            GitAuth::SshKey(_) => {
                let host = self
                    .clone_base_url
                    .trim_start_matches("https://")
                    .trim_start_matches("http://");
                format!("git@{}:{}.git", host, slug)
            }
        }
    }

    /// Environment for one git invocation
    fn git_env(&self) -> Vec<(String, String)> {
        let mut env = vec![("GIT_TERMINAL_PROMPT".to_string(), "0".to_string())];
        match self.auth {
            GitAuth::Token(ref token) => {
                let credentials = STANDARD.encode(format!("x-access-token:{}", token));
                env.push(("GIT_CONFIG_COUNT".to_string(), "1".to_string()));
                env.push(("GIT_CONFIG_KEY_0".to_string(), "http.extraHeader".to_string()));
                env.push((
                    "GIT_CONFIG_VALUE_0".to_string(),
                    format!("Authorization: Basic {}", credentials),
                ));
            }
            GitAuth::SshKey(ref key) => {
                env.push((
                    "GIT_SSH_COMMAND".to_string(),
                    format!(
                        "ssh -i {} -o IdentitiesOnly=yes -o StrictHostKeyChecking=accept-new",
                        key.display()
                    ),
                ));
            }
        }
        env
    }

    /// `git clone --mirror <url> <destination>`
    pub fn clone_mirror(&self, url: &str, destination: &Path) -> Result<()> {
        let env = self.git_env();
        let env_refs: Vec<(&str, &str)> = env.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        let dest = destination.to_string_lossy();

        info!("Cloning {} to {}", url, destination.display());
        self.executor
            .run_command(
                "git",
                &["clone", "--mirror", url, &dest],
                &env_refs,
                None,
                Some(self.timeout),
            )
            .with_context(|| format!("Failed to clone {}", url))?;

        Ok(())
    }

    /// Mirror, package and (optionally) wiki-package one repository
    ///
    /// Mirrors are cloned into a scratch directory under `workspace` that is
    /// removed before returning; archives land in `execution_dir`.
    pub fn backup_repository(
        &self,
        slug: &str,
        repo: &RepositoryOptions,
        execution_dir: &Path,
        workspace: &Path,
        timestamp: DateTime<Utc>,
    ) -> Result<RepositoryArchive> {
        let flat_name = slug.replace('/', "_");
        let stamp = timestamp.format(ARCHIVE_TIMESTAMP_FORMAT);
        let archive_path = execution_dir.join(format!("{}_{}.tar.gz", flat_name, stamp));

        let scratch = tempfile::Builder::new()
            .prefix("mirror-")
            .tempdir_in(workspace)
            .context("Failed to create mirror directory")?;

        let clone_url = self.clone_url(slug);
        let repo_path = scratch.path().join(format!("{}.git", flat_name));
        self.clone_mirror(&clone_url, &repo_path)?;
        package_directory(&repo_path, &archive_path)?;

        let mut wiki_archive_path = None;
        if repo.include_wiki {
            let wiki_url = match clone_url.strip_suffix(".git") {
                Some(base) => format!("{}.wiki.git", base),
                None => format!("{}.wiki.git", clone_url),
            };
            let wiki_path = scratch.path().join(format!("{}.wiki.git", flat_name));

            match self.clone_mirror(&wiki_url, &wiki_path) {
                Ok(()) if wiki_path.is_dir() => {
                    let wiki_archive =
                        execution_dir.join(format!("{}_{}.wiki.tar.gz", flat_name, stamp));
                    package_directory(&wiki_path, &wiki_archive)?;
                    wiki_archive_path = Some(wiki_archive);
                }
                Ok(()) => {}
                Err(e) => warn!("Wiki clone for {} skipped: {:#}", slug, e),
            }
        }

        Ok(RepositoryArchive {
            archive_path,
            wiki_archive_path,
        })
    }
}
