use crate::error::ScanError;
use crate::ingest::context::{IngestContext, SourceKind, SourceMetadata};
use crate::ingest::walker::SourceWalker;
use std::path::Path;
use tracing::info;

/// Ingest a directory already present on disk. The provided path becomes the
/// source root; no scratch directory is created.
pub async fn ingest_local(path: &Path, walker: &SourceWalker) -> Result<IngestContext, ScanError> {
    if !path.exists() {
        return Err(ScanError::SourceNotFound(path.to_path_buf()));
    }
    if !path.is_dir() {
        return Err(ScanError::NotADirectory(path.to_path_buf()));
    }

    let root = path.to_path_buf();
    let walker = walker.clone();
    let files = tokio::task::spawn_blocking(move || walker.walk(&root))
        .await
        .map_err(|e| ScanError::Io(std::io::Error::other(e)))??;

    info!(path = %path.display(), files = files.len(), "local source ingested");

    let metadata = SourceMetadata::new(SourceKind::Local, path.display().to_string());
    Ok(IngestContext::new(path, files, metadata))
}
