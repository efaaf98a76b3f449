//! Source acquisition and normalization.
//!
//! Three variants (local directory, remote VCS, archive file) share one exit
//! contract: an [`IngestContext`] holding the content-addressed file set.
//! Dispatch between them is a string heuristic over the source descriptor.

pub mod archive;
pub mod context;
pub mod git;
pub mod local;
pub mod walker;

pub use context::{FileEntry, IngestContext, SourceKind, SourceMetadata};
pub use walker::{SourceWalker, DEFAULT_EXCLUDES, MAX_FILE_SIZE};

use crate::error::ScanError;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// Default ceiling for VCS clone and archive extraction.
pub const DEFAULT_INGEST_TIMEOUT: Duration = Duration::from_secs(60);

const VCS_URL_PREFIXES: &[&str] = &[
    "https://github.com/",
    "https://gitlab.com/",
    "https://bitbucket.org/",
    "git@",
];

const ARCHIVE_SUFFIXES: &[&str] = &[".zip", ".tar", ".tar.gz", ".tgz"];

/// What kind of source a descriptor string names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceDescriptor {
    Local(PathBuf),
    Git(String),
    Archive(PathBuf),
}

impl SourceDescriptor {
    /// Pattern dispatch in fixed order: VCS URL shapes, then archive
    /// suffixes, then local path as the fallback.
    pub fn detect(spec: &str) -> Self {
        if VCS_URL_PREFIXES.iter().any(|p| spec.starts_with(p)) || spec.ends_with(".git") {
            return Self::Git(spec.to_string());
        }
        if ARCHIVE_SUFFIXES.iter().any(|s| spec.ends_with(s)) {
            return Self::Archive(PathBuf::from(spec));
        }
        Self::Local(PathBuf::from(spec))
    }
}

#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Parent directory for scratch checkouts; the OS temp dir when unset.
    pub work_dir: Option<PathBuf>,
    pub timeout: Duration,
    /// Branch, tag, or commit to check out for VCS sources.
    pub git_ref: Option<String>,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            work_dir: None,
            timeout: DEFAULT_INGEST_TIMEOUT,
            git_ref: None,
        }
    }
}

impl IngestOptions {
    pub(crate) fn scratch_dir(&self, prefix: &str) -> Result<TempDir, ScanError> {
        let parent = self
            .work_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir);
        std::fs::create_dir_all(&parent)?;
        Ok(tempfile::Builder::new().prefix(prefix).tempdir_in(parent)?)
    }
}

/// Result wrapper carrying acquisition timing alongside success or failure.
#[derive(Debug)]
pub struct IngestOutcome {
    pub context: Result<IngestContext, ScanError>,
    pub duration_ms: u64,
}

impl IngestOutcome {
    pub fn success(&self) -> bool {
        self.context.is_ok()
    }
}

/// Acquire and normalize a source. Never panics; every failure mode comes
/// back as the error half of the outcome.
pub async fn ingest(source: &str, options: &IngestOptions) -> IngestOutcome {
    let walker = SourceWalker::new();
    let started = Instant::now();

    let context = match SourceDescriptor::detect(source) {
        SourceDescriptor::Local(path) => local::ingest_local(&path, &walker).await,
        SourceDescriptor::Git(url) => git::ingest_git(&url, options, &walker).await,
        SourceDescriptor::Archive(path) => archive::ingest_archive(&path, options, &walker).await,
    };

    IngestOutcome {
        context,
        duration_ms: started.elapsed().as_millis() as u64,
    }
}

/// Convenience used by analyzers and tests: ingest a local directory only.
pub async fn ingest_dir(path: &Path) -> Result<IngestContext, ScanError> {
    local::ingest_local(path, &SourceWalker::new()).await
}
