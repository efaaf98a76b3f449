//! Archive acquisition via the external zip/tar extractors.
//!
//! Entries are listed before extraction and any entry whose normalized path
//! would escape the scratch directory aborts the ingest.

use crate::error::ScanError;
use crate::ingest::context::{IngestContext, SourceKind, SourceMetadata};
use crate::ingest::walker::SourceWalker;
use crate::ingest::IngestOptions;
use std::path::{Component, Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    Tar,
    TarGz,
}

impl ArchiveFormat {
    /// Format detection by suffix. `.tar.gz` must be tested before `.tar`.
    pub fn detect(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_string_lossy().to_lowercase();
        if name.ends_with(".zip") {
            Some(Self::Zip)
        } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(Self::TarGz)
        } else if name.ends_with(".tar") {
            Some(Self::Tar)
        } else {
            None
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Zip => "zip",
            Self::Tar => "tar",
            Self::TarGz => "tar.gz",
        }
    }
}

pub async fn ingest_archive(
    path: &Path,
    options: &IngestOptions,
    walker: &SourceWalker,
) -> Result<IngestContext, ScanError> {
    if !path.exists() {
        return Err(ScanError::SourceNotFound(path.to_path_buf()));
    }
    let format = ArchiveFormat::detect(path)
        .ok_or_else(|| ScanError::UnsupportedArchive(path.display().to_string()))?;

    let scratch = options.scratch_dir("skillgate-archive-")?;
    let dest = scratch.path().to_path_buf();

    let extraction = extract(path, format, &dest);
    match tokio::time::timeout(options.timeout, extraction).await {
        Ok(result) => result?,
        Err(_) => return Err(ScanError::IngestTimeout(options.timeout.as_secs())),
    }

    info!(path = %path.display(), format = format.label(), "archive extracted");

    let walk_root = dest.clone();
    let walker = walker.clone();
    let files = tokio::task::spawn_blocking(move || walker.walk(&walk_root))
        .await
        .map_err(|e| ScanError::Io(std::io::Error::other(e)))??;

    let mut metadata = SourceMetadata::new(SourceKind::Archive, path.display().to_string());
    metadata.archive_format = Some(format.label().to_string());

    Ok(IngestContext::new(dest, files, metadata).with_scratch(scratch))
}

async fn extract(path: &Path, format: ArchiveFormat, dest: &Path) -> Result<(), ScanError> {
    for entry in list_entries(path, format).await? {
        if !entry_is_confined(&entry) {
            return Err(ScanError::ArchiveTraversal(entry));
        }
    }

    let archive = path.to_string_lossy();
    let dest_str = dest.to_string_lossy();
    let output = match format {
        ArchiveFormat::Zip => {
            Command::new("unzip")
                .args(["-q", &archive, "-d", &dest_str])
                .output()
                .await
        }
        ArchiveFormat::Tar | ArchiveFormat::TarGz => {
            Command::new("tar")
                .args(["-xf", &archive, "-C", &dest_str])
                .output()
                .await
        }
    }
    .map_err(|e| ScanError::CorruptArchive {
        path: path.to_path_buf(),
        reason: format!("failed to spawn extractor: {e}"),
    })?;

    if !output.status.success() {
        return Err(ScanError::CorruptArchive {
            path: path.to_path_buf(),
            reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(())
}

async fn list_entries(path: &Path, format: ArchiveFormat) -> Result<Vec<String>, ScanError> {
    let archive = path.to_string_lossy();
    let output = match format {
        ArchiveFormat::Zip => Command::new("unzip").args(["-Z1", &archive]).output().await,
        ArchiveFormat::Tar | ArchiveFormat::TarGz => {
            Command::new("tar").args(["-tf", &archive]).output().await
        }
    }
    .map_err(|e| ScanError::CorruptArchive {
        path: path.to_path_buf(),
        reason: format!("failed to spawn lister: {e}"),
    })?;

    if !output.status.success() {
        return Err(ScanError::CorruptArchive {
            path: path.to_path_buf(),
            reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    let entries = String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(|l| l.to_string())
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>();
    debug!(count = entries.len(), "archive entries listed");
    Ok(entries)
}

/// True when the entry's normalized path stays inside the extraction root:
/// no absolute paths, and no `..` step that climbs above the root.
fn entry_is_confined(entry: &str) -> bool {
    let path = PathBuf::from(entry);
    let mut depth: i64 = 0;
    for component in path.components() {
        match component {
            Component::RootDir | Component::Prefix(_) => return false,
            Component::ParentDir => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
        }
    }
    true
}
