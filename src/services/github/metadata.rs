//! Repository and organization metadata exports

use super::api::{GitHubClient, GitHubError};
use super::options::{OrganizationExports, RepositoryOptions};
use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

const STATE_ALL: &[(&str, &str)] = &[("state", "all")];

/// Export one repository's metadata into `<metadata_root>/<owner>_<repo>/`
///
/// Returns item counts keyed by export name.
pub fn export_repository_metadata(
    client: &dyn GitHubClient,
    slug: &str,
    repo: &RepositoryOptions,
    metadata_root: &Path,
) -> Result<BTreeMap<String, usize>> {
    let repo_dir = metadata_root.join(slug.replace('/', "_"));
    fs::create_dir_all(&repo_dir)
        .with_context(|| format!("Failed to create {}", repo_dir.display()))?;

    let mut counts = BTreeMap::new();

    let repository = client.get(&format!("/repos/{}", slug), &[])?;
    write_json(&repo_dir.join("repository.json"), &repository)?;

    let issues = client.list_all(&format!("/repos/{}/issues", slug), STATE_ALL)?;
    write_json(&repo_dir.join("issues.json"), &issues)?;
    counts.insert("issues".to_string(), issues.len());

    let pulls = client.list_all(&format!("/repos/{}/pulls", slug), STATE_ALL)?;
    write_json(&repo_dir.join("pull_requests.json"), &pulls)?;
    counts.insert("pull_requests".to_string(), pulls.len());

    if repo.include_releases {
        let releases = client.list_all(&format!("/repos/{}/releases", slug), &[])?;
        write_json(&repo_dir.join("releases.json"), &releases)?;
        counts.insert("releases".to_string(), releases.len());
    }

    if repo.include_projects {
        let projects = classic_projects(client, &format!("/repos/{}/projects", slug), slug)?;
        write_json(&repo_dir.join("projects.json"), &projects)?;
        counts.insert("projects".to_string(), projects.len());
    }

    if repo.include_artifacts {
        let artifacts = client.list_all(&format!("/repos/{}/actions/artifacts", slug), &[])?;
        write_json(&repo_dir.join("actions_artifacts.json"), &artifacts)?;
        counts.insert("actions_artifacts".to_string(), artifacts.len());
    }

    Ok(counts)
}

/// Export organization members, teams and projects into `<metadata_root>/<org>/`
///
/// A failing export is logged and recorded as empty.
pub fn export_organization_metadata(
    client: &dyn GitHubClient,
    organization: Option<&str>,
    exports: &OrganizationExports,
    metadata_root: &Path,
) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    let org = match organization {
        Some(org) => org,
        None => return counts,
    };
    if !(exports.members || exports.teams || exports.projects) {
        return counts;
    }

    let org_dir = metadata_root.join(org);
    if let Err(e) = fs::create_dir_all(&org_dir) {
        warn!("Failed to create {}: {}", org_dir.display(), e);
        return counts;
    }

    let wanted = [
        (exports.members, "members", "org_members"),
        (exports.teams, "teams", "org_teams"),
        (exports.projects, "projects", "org_projects"),
    ];

    for (enabled, export, count_key) in wanted {
        if !enabled {
            continue;
        }

        let path = format!("/orgs/{}/{}", org, export);
        let fetched = if export == "projects" {
            classic_projects(client, &path, org)
        } else {
            client.list_all(&path, &[])
        };

        let items = fetched.unwrap_or_else(|e| {
            warn!("Organization {} export for '{}' failed: {}", export, org, e);
            Vec::new()
        });

        if let Err(e) = write_json(&org_dir.join(format!("{}.json", export)), &items) {
            warn!("{:#}", e);
        }
        counts.insert(count_key.to_string(), items.len());
    }

    counts
}

/// Classic Projects were sunset; a 410 means "nothing to export"
fn classic_projects(
    client: &dyn GitHubClient,
    path: &str,
    owner: &str,
) -> std::result::Result<Vec<Value>, GitHubError> {
    match client.list_all(path, &[]) {
        Err(e) if e.status() == Some(410) => {
            info!("Skipping classic projects for '{}': API returned 410", owner);
            Ok(Vec::new())
        }
        other => other,
    }
}

fn write_json<T: Serialize + ?Sized>(path: &Path, payload: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(payload)?;
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}
