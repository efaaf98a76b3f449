use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// One file in a normalized source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEntry {
    /// Path relative to the source root, forward slashes.
    pub path: String,
    pub absolute_path: PathBuf,
    pub size_bytes: u64,
    /// SHA-256 over the raw file bytes, lowercase hex.
    pub content_hash: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Local,
    Git,
    Archive,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Git => write!(f, "git"),
            Self::Archive => write!(f, "archive"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceMetadata {
    pub kind: SourceKind,
    pub original_location: String,
    pub ingested_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vcs_commit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vcs_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive_format: Option<String>,
}

impl SourceMetadata {
    pub fn new(kind: SourceKind, original_location: impl Into<String>) -> Self {
        Self {
            kind,
            original_location: original_location.into(),
            ingested_at: Utc::now(),
            vcs_commit: None,
            vcs_ref: None,
            archive_format: None,
        }
    }
}

/// Aggregate source hash: a pure function of the sorted sequence of
/// (relative path, content hash) pairs. Independent of traversal order,
/// timestamps, and on-disk layout.
pub fn source_hash(files: &[FileEntry]) -> String {
    let mut pairs: Vec<(&str, &str)> = files
        .iter()
        .map(|f| (f.path.as_str(), f.content_hash.as_str()))
        .collect();
    pairs.sort();

    let mut hasher = Sha256::new();
    for (path, hash) in pairs {
        hasher.update(path.as_bytes());
        hasher.update(hash.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// The normalized, content-addressed view of a scan source.
///
/// Owns the scratch directory its ingestor created (if any); the scratch is
/// released when the context is dropped, which the pipeline arranges to
/// happen only after the report has been emitted.
#[derive(Debug)]
pub struct IngestContext {
    pub root_dir: PathBuf,
    pub source_hash: String,
    pub files: Vec<FileEntry>,
    pub metadata: SourceMetadata,
    pub total_size: u64,
    pub file_count: usize,
    scratch: Option<TempDir>,
}

impl IngestContext {
    pub fn new(root_dir: impl Into<PathBuf>, files: Vec<FileEntry>, metadata: SourceMetadata) -> Self {
        let total_size = files.iter().map(|f| f.size_bytes).sum();
        let file_count = files.len();
        Self {
            root_dir: root_dir.into(),
            source_hash: source_hash(&files),
            files,
            metadata,
            total_size,
            file_count,
            scratch: None,
        }
    }

    /// Transfer ownership of the scratch directory into the context so it
    /// outlives every stage that reads from it.
    pub fn with_scratch(mut self, scratch: TempDir) -> Self {
        self.scratch = Some(scratch);
        self
    }

    pub fn file_paths(&self) -> Vec<PathBuf> {
        self.files.iter().map(|f| f.absolute_path.clone()).collect()
    }

    /// Relative path of `abs` within this source, when it belongs to it.
    pub fn relative_of(&self, abs: &Path) -> Option<String> {
        abs.strip_prefix(&self.root_dir)
            .ok()
            .map(|p| p.to_string_lossy().replace('\\', "/"))
    }
}
