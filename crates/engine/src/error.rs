//! Error taxonomy for the scan pipeline.
//!
//! Only ingest and policy load are fatal; everything downstream is recovered
//! locally (per-file drops, per-analyzer isolation) and surfaces through the
//! artifact's `errors` list instead.

use std::path::PathBuf;

/// Exit code reported when the pipeline fails before a decision is reached.
pub const EXIT_SCAN_FAILED: i32 = 3;

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("source not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("source is not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("vcs clone failed for {url}: {reason}")]
    CloneFailed { url: String, reason: String },

    #[error("unknown ref '{vcs_ref}' in {url}")]
    UnknownRef { url: String, vcs_ref: String },

    #[error("ingest timed out after {0} s")]
    IngestTimeout(u64),

    #[error("unsupported archive format: {0}")]
    UnsupportedArchive(String),

    #[error("corrupt archive {}: {reason}", .path.display())]
    CorruptArchive { path: PathBuf, reason: String },

    #[error("archive entry escapes extraction root: {0}")]
    ArchiveTraversal(String),

    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error("report serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("report could not be written to {}: {source}", .path.display())]
    ReportWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("policy file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("policy yaml syntax error in {}: {reason}", .path.display())]
    Yaml { path: PathBuf, reason: String },

    #[error("policy schema violation in {}: {}", .path.display(), .violations.join("; "))]
    Schema {
        path: PathBuf,
        violations: Vec<String>,
    },

    #[error("policy extends cycle detected at {}", .0.display())]
    ExtendsCycle(PathBuf),
}
