//! Deterministic file enumeration under a source root.
//!
//! Depth-first with directory entries sorted by name, so two walks over the
//! same tree always yield the same order. Symlinks are never followed.

use crate::error::ScanError;
use crate::ingest::context::FileEntry;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Files strictly larger than this are skipped.
pub const MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

/// Directory names never descended into.
pub const DEFAULT_EXCLUDES: &[&str] = &[
    "node_modules",
    ".git",
    "__pycache__",
    ".pytest_cache",
    "dist",
    "build",
    ".next",
    "coverage",
];

#[derive(Debug, Clone)]
pub struct SourceWalker {
    excludes: HashSet<String>,
    max_file_size: u64,
}

impl Default for SourceWalker {
    fn default() -> Self {
        Self {
            excludes: DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect(),
            max_file_size: MAX_FILE_SIZE,
        }
    }
}

impl SourceWalker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_exclude(mut self, name: impl Into<String>) -> Self {
        self.excludes.insert(name.into());
        self
    }

    #[cfg(test)]
    fn with_max_file_size(mut self, max: u64) -> Self {
        self.max_file_size = max;
        self
    }

    /// Enumerate the files under `root` and hash each one.
    ///
    /// A single unreadable entry is dropped, never fatal; a missing or
    /// non-directory root is.
    pub fn walk(&self, root: &Path) -> Result<Vec<FileEntry>, ScanError> {
        if !root.exists() {
            return Err(ScanError::SourceNotFound(root.to_path_buf()));
        }
        if !root.is_dir() {
            return Err(ScanError::NotADirectory(root.to_path_buf()));
        }

        let mut entries = Vec::new();
        let iter = WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || self.keep(e.file_name().to_string_lossy().as_ref(), e.file_type().is_dir()));

        for item in iter {
            let entry = match item {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(error = %err, "skipping unreadable walk entry");
                    continue;
                }
            };

            // Symlinks report their own file type here and fall through.
            if !entry.file_type().is_file() {
                continue;
            }

            let size = match entry.metadata() {
                Ok(meta) => meta.len(),
                Err(err) => {
                    warn!(path = %entry.path().display(), error = %err, "skipping unstatable file");
                    continue;
                }
            };

            if size > self.max_file_size {
                debug!(path = %entry.path().display(), size, "skipping oversized file");
                continue;
            }

            let bytes = match fs::read(entry.path()) {
                Ok(bytes) => bytes,
                Err(err) => {
                    warn!(path = %entry.path().display(), error = %err, "skipping unreadable file");
                    continue;
                }
            };

            let relative = entry
                .path()
                .strip_prefix(root)
                .expect("walk entries live under the root")
                .to_string_lossy()
                .replace('\\', "/");

            entries.push(FileEntry {
                path: relative,
                absolute_path: entry.path().to_path_buf(),
                size_bytes: size,
                content_hash: hex::encode(Sha256::digest(&bytes)),
            });
        }

        Ok(entries)
    }

    fn keep(&self, name: &str, is_dir: bool) -> bool {
        if name.starts_with('.') && name != ".github" {
            return false;
        }
        if is_dir && self.excludes.contains(name) {
            return false;
        }
        true
    }
}
