//! Remote VCS acquisition.
//!
//! Clones into a fresh scratch directory under the configured work dir. A
//! requested ref forces a full clone plus checkout; otherwise a shallow
//! depth-1 clone of the default branch suffices. The concrete commit id is
//! resolved after checkout and recorded in the source metadata.

use crate::error::ScanError;
use crate::ingest::context::{IngestContext, SourceKind, SourceMetadata};
use crate::ingest::walker::SourceWalker;
use crate::ingest::IngestOptions;
use std::path::Path;
use tokio::process::Command;
use tracing::{debug, info};

pub async fn ingest_git(
    url: &str,
    options: &IngestOptions,
    walker: &SourceWalker,
) -> Result<IngestContext, ScanError> {
    let scratch = options.scratch_dir("skillgate-git-")?;
    let dest = scratch.path().to_path_buf();

    let acquisition = acquire(url, options.git_ref.as_deref(), &dest);
    let commit = match tokio::time::timeout(options.timeout, acquisition).await {
        Ok(result) => result?,
        Err(_) => return Err(ScanError::IngestTimeout(options.timeout.as_secs())),
    };

    info!(url, commit = %commit, "repository cloned");

    let walk_root = dest.clone();
    let walker = walker.clone();
    let files = tokio::task::spawn_blocking(move || walker.walk(&walk_root))
        .await
        .map_err(|e| ScanError::Io(std::io::Error::other(e)))??;

    let mut metadata = SourceMetadata::new(SourceKind::Git, url);
    metadata.vcs_commit = Some(commit);
    metadata.vcs_ref = options.git_ref.clone();

    Ok(IngestContext::new(dest, files, metadata).with_scratch(scratch))
}

/// Clone (and check out, when a ref is requested), then resolve HEAD.
async fn acquire(url: &str, git_ref: Option<&str>, dest: &Path) -> Result<String, ScanError> {
    match git_ref {
        Some(vcs_ref) => {
            git(None, &["clone", url, &dest.to_string_lossy()])
                .await
                .map_err(|reason| ScanError::CloneFailed {
                    url: url.to_string(),
                    reason,
                })?;
            git(Some(dest), &["checkout", vcs_ref])
                .await
                .map_err(|_| ScanError::UnknownRef {
                    url: url.to_string(),
                    vcs_ref: vcs_ref.to_string(),
                })?;
        }
        None => {
            git(None, &["clone", "--depth", "1", url, &dest.to_string_lossy()])
                .await
                .map_err(|reason| ScanError::CloneFailed {
                    url: url.to_string(),
                    reason,
                })?;
        }
    }

    let head = git(Some(dest), &["rev-parse", "HEAD"])
        .await
        .map_err(|reason| ScanError::CloneFailed {
            url: url.to_string(),
            reason,
        })?;
    Ok(head.trim().to_string())
}

/// Run one git command, returning stdout on success and trimmed stderr on
/// failure.
async fn git(cwd: Option<&Path>, args: &[&str]) -> Result<String, String> {
    debug!(?args, "running git");
    let mut cmd = Command::new("git");
    cmd.args(args);
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }

    let output = cmd
        .output()
        .await
        .map_err(|e| format!("failed to spawn git: {e}"))?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    } else {
        Err(String::from_utf8_lossy(&output.stderr).trim().to_string())
    }
}
