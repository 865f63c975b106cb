//! Gzip-compressed tar packaging

use anyhow::{Context, Result};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::path::Path;
use tracing::info;

/// Package `source_dir` into a `.tar.gz` at `archive_path`
///
/// The directory is stored under its own name inside the archive.
pub fn package_directory(source_dir: &Path, archive_path: &Path) -> Result<()> {
    if !source_dir.is_dir() {
        anyhow::bail!("Cannot package missing directory: {}", source_dir.display());
    }

    let dir_name = source_dir
        .file_name()
        .context("Source directory has no name")?;

    info!("Creating archive {}", archive_path.display());

    let file = File::create(archive_path)
        .with_context(|| format!("Failed to create archive: {}", archive_path.display()))?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = tar::Builder::new(encoder);

    builder
        .append_dir_all(dir_name, source_dir)
        .with_context(|| format!("Failed to add {} to archive", source_dir.display()))?;

    let encoder = builder.into_inner().context("Failed to finish tar stream")?;
    encoder.finish().context("Failed to finish gzip stream")?;

    Ok(())
}
