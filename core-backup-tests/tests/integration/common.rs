//! Common utilities for integration tests

use core_backup::services::github::api::GitHubClient;
use core_backup::services::GitHubBackupService;
use core_backup::{BackupService, ServiceRegistry};
use std::sync::Arc;
use test_utils::{MockExecutor, MockGitHubClient};

/// Registry whose `github` connector runs against the given mocks
pub fn github_registry(executor: MockExecutor, client: MockGitHubClient) -> ServiceRegistry {
    let mut registry = ServiceRegistry::new();
    registry.register("github", move |job| {
        let client = client.clone();
        let service = GitHubBackupService::with_backends(
            job,
            Arc::new(executor.clone()),
            move |_token, _api_url| Ok(Box::new(client.clone()) as Box<dyn GitHubClient>),
        )?;
        Ok(Box::new(service) as Box<dyn BackupService>)
    });
    registry
}

/// Today's run directory name
pub fn today() -> String {
    chrono::Utc::now().format("%Y-%m-%d").to_string()
}
