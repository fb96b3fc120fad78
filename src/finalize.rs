use std::path::{Path, PathBuf};
use tempfile::TempPath;
use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::{debug, info};

use crate::error::FinalizeError;
use crate::utils::destination_for;

/// Moves fetched content into `dir`, replacing whatever sits at the
/// destination in one rename.
///
/// `content` must live on the same filesystem as `dir`. On failure the
/// temporary file is removed.
pub fn place_artifact(
    content: TempPath,
    dir: &Path,
    suggested_filename: Option<&str>,
) -> Result<PathBuf, FinalizeError> {
    std::fs::create_dir_all(dir).map_err(|source| FinalizeError::CreateDir {
        path: dir.to_path_buf(),
        source,
    })?;

    let destination = destination_for(dir, suggested_filename);
    debug!(from = ?content, to = ?destination, "Replacing destination");

    content
        .persist(&destination)
        .map_err(|err| FinalizeError::Replace {
            path: destination.clone(),
            source: err.error,
        })?;

    sync_dir(dir);
    info!(path = ?destination, "Download placed");
    Ok(destination)
}

/// Runs filesystem work that may block. On a multi-threaded runtime the
/// worker hands its other tasks off first; elsewhere it simply runs.
pub fn run_blocking<R>(work: impl FnOnce() -> R) -> R {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(work)
        }
        _ => work(),
    }
}

#[cfg(unix)]
fn sync_dir(dir: &Path) {
    if let Ok(handle) = std::fs::File::open(dir) {
        let _ = handle.sync_all();
    }
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) {}
