//! Local filesystem adapter
//!
//! ## Design Decisions
//!
//! - **Atomic writes**: downloads stream into `<name>.part` in the target
//!   directory, get their mtime set, and are then renamed over the target.
//!   A crash leaves at most a stray `.part` file, never a torn document.
//! - **mtime contract**: a written document carries exactly the remote
//!   change timestamp as its mtime; [`LocalFileState::matches`] compares
//!   against that on the next run.
//! - **Versioning**: [`preserve_version`] moves an outdated local copy to
//!   the first free `_vN` name in the same commit step that renames the
//!   new content into place, never earlier.

use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use coursesync_conflict::versioned_name;
use coursesync_core::domain::{DocumentNode, EpochSeconds};
use coursesync_core::ports::DocumentStream;
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument, warn};

/// Suffix of in-progress downloads
const PART_SUFFIX: &str = ".part";

// ============================================================================
// Probing
// ============================================================================

/// What is on disk at a document's target path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalFileState {
    pub is_file: bool,
    pub size: u64,
    pub modified: Option<SystemTime>,
}

impl LocalFileState {
    /// Size and mtime both equal the node's recorded values
    pub fn matches(&self, document: &DocumentNode) -> bool {
        self.is_file
            && self.size == document.size
            && self.modified == Some(to_system_time(document.changed))
    }
}

/// Stats `path`; `None` when nothing exists there
pub async fn probe(path: &Path) -> io::Result<Option<LocalFileState>> {
    match tokio::fs::metadata(path).await {
        Ok(metadata) => Ok(Some(LocalFileState {
            is_file: metadata.is_file(),
            size: metadata.len(),
            modified: metadata.modified().ok(),
        })),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

// ============================================================================
// Mutation
// ============================================================================

/// Renames the file at `path` to the first free `_vN` sibling name.
///
/// Blocking; called from the commit step of [`write_document`].
pub fn preserve_version(path: &Path) -> io::Result<PathBuf> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;

    let mut n = 1u32;
    let target = loop {
        let candidate = path.with_file_name(versioned_name(file_name, n));
        if !candidate.try_exists()? {
            break candidate;
        }
        n += 1;
    };

    std::fs::rename(path, &target)?;
    debug!(path = %path.display(), to = %target.display(), "Preserved previous local version");
    Ok(target)
}

/// Streams a document to `path` and stamps it with `changed` as mtime.
///
/// With `keep_previous`, an existing file at `path` is moved to its `_vN`
/// name right before the new content is renamed into place. The commit
/// (mtime, preservation, rename) runs on the blocking pool and completes
/// even if the caller is dropped, so the target is never left without a
/// file once preservation started.
///
/// Returns the number of bytes written.
#[instrument(skip(stream), fields(path = %path.display()))]
pub async fn write_document(
    path: &Path,
    mut stream: DocumentStream,
    changed: EpochSeconds,
    keep_previous: bool,
) -> io::Result<u64> {
    let tmp_path = {
        let mut p = path.as_os_str().to_owned();
        p.push(PART_SUFFIX);
        PathBuf::from(p)
    };

    let result: io::Result<u64> = async {
        let mut file = tokio::fs::File::create(&tmp_path).await?;
        let written = tokio::io::copy(&mut stream, &mut file).await?;
        file.flush().await?;

        let file = file.into_std().await;
        let mtime = to_system_time(changed);
        let (staged, target) = (tmp_path.clone(), path.to_path_buf());
        tokio::task::spawn_blocking(move || {
            file.set_modified(mtime)?;
            drop(file);
            if keep_previous && target.try_exists()? {
                preserve_version(&target)?;
            }
            std::fs::rename(&staged, &target)
        })
        .await
        .map_err(io::Error::other)??;

        Ok(written)
    }
    .await;

    match result {
        Ok(written) => {
            debug!(bytes = written, "Document written");
            Ok(written)
        }
        Err(e) => {
            if let Err(cleanup) = tokio::fs::remove_file(&tmp_path).await {
                if cleanup.kind() != io::ErrorKind::NotFound {
                    warn!(path = %tmp_path.display(), error = %cleanup, "Could not remove partial download");
                }
            }
            Err(e)
        }
    }
}

// ============================================================================
// Time conversion
// ============================================================================

pub fn to_system_time(secs: EpochSeconds) -> SystemTime {
    if secs >= 0 {
        UNIX_EPOCH + Duration::from_secs(secs.unsigned_abs())
    } else {
        UNIX_EPOCH - Duration::from_secs(secs.unsigned_abs())
    }
}
