//! Per-run backup manifest

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const SCHEMA_VERSION: &str = "1.0.0";
pub const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackupStatus {
    Success,
    Failed,
}

/// Outcome for one repository
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct RepositoryEntry {
    pub name: String,
    pub archive_path: String,
    pub wiki_archive_path: String,
    pub backup_status: BackupStatus,
    pub metadata_counts: BTreeMap<String, usize>,
    pub error: String,
}

impl RepositoryEntry {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            archive_path: String::new(),
            wiki_archive_path: String::new(),
            backup_status: BackupStatus::Success,
            metadata_counts: BTreeMap::new(),
            error: String::new(),
        }
    }

    pub fn set_archives(&mut self, archive: &Path, wiki_archive: Option<&PathBuf>) {
        self.archive_path = archive.display().to_string();
        self.wiki_archive_path = wiki_archive
            .map(|p| p.display().to_string())
            .unwrap_or_default();
    }

    pub fn mark_failed(&mut self, error: impl Into<String>) {
        self.backup_status = BackupStatus::Failed;
        self.error = error.into();
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Manifest {
    pub schema_version: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub retention_days: i64,
    pub repositories: Vec<RepositoryEntry>,
    pub organization_exports: BTreeMap<String, usize>,
    pub errors: Vec<String>,
}

impl Manifest {
    pub fn new(started_at: DateTime<Utc>, retention_days: i64) -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            started_at,
            completed_at: started_at,
            retention_days,
            repositories: Vec::new(),
            organization_exports: BTreeMap::new(),
            errors: Vec::new(),
        }
    }

    /// Write as 2-space indented JSON
    pub fn write(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize manifest")?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write manifest: {}", path.display()))
    }

    pub fn read(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest: {}", path.display()))?;
        serde_json::from_str(&contents).context("Failed to parse manifest")
    }
}
