//! Filesystem operations
//!
//! Handles file and directory operations, including the best-effort buffer
//! flushing used while writing to slow removable media.

use std::path::Path;
use std::process::Command;

use crate::error::SyncError;

/// Create a directory and all parent directories
pub fn create_dir_all(path: &Path) -> Result<(), SyncError> {
    std::fs::create_dir_all(path).map_err(|e| SyncError::CreateDir {
        path: path.to_path_buf(),
        error: e.to_string(),
    })
}

/// Remove a directory and all its contents
///
/// Read-only entries (common on FAT media copied from Windows) are made
/// writable and the removal retried once.
pub fn remove_dir_all(path: &Path) -> Result<(), SyncError> {
    if !path.exists() {
        return Ok(());
    }
    match std::fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            tracing::debug!("Clearing read-only flags under {}", path.display());
            clear_readonly(path);
            std::fs::remove_dir_all(path).map_err(|e| SyncError::Remove {
                path: path.to_path_buf(),
                error: e.to_string(),
            })
        }
        Err(e) => Err(SyncError::Remove {
            path: path.to_path_buf(),
            error: e.to_string(),
        }),
    }
}

/// Remove a single file, clearing the read-only flag if needed
pub fn remove_file(path: &Path) -> Result<(), SyncError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            make_writable(path);
            std::fs::remove_file(path).map_err(|e| SyncError::Remove {
                path: path.to_path_buf(),
                error: e.to_string(),
            })
        }
        Err(e) => Err(SyncError::Remove {
            path: path.to_path_buf(),
            error: e.to_string(),
        }),
    }
}

fn clear_readonly(root: &Path) {
    for entry in walkdir::WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_map(Result::ok)
    {
        make_writable(entry.path());
    }
}

fn make_writable(path: &Path) {
    if let Ok(meta) = std::fs::metadata(path) {
        let mut perms = meta.permissions();
        if perms.readonly() {
            #[allow(clippy::permissions_set_readonly_false)]
            perms.set_readonly(false);
            let _ = std::fs::set_permissions(path, perms);
        }
    }
}

/// Count regular files below `root`, optionally only those ending in `ext`
pub fn count_files(root: &Path, ext: Option<&str>) -> u64 {
    walkdir::WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| ext.map_or(true, |x| has_suffix(e.path(), x)))
        .count() as u64
}

/// Check whether a file name ends with `suffix` (e.g. `.lua`)
pub fn has_suffix(path: &Path, suffix: &str) -> bool {
    path.file_name()
        .map(|n| n.to_string_lossy().ends_with(suffix))
        .unwrap_or(false)
}

/// Best-effort flush of filesystem buffers
///
/// Runs the platform `sync` utility where one exists. Failures are logged and
/// otherwise ignored.
pub fn flush_buffers() {
    let Ok(sync) = which::which("sync") else {
        tracing::trace!("No sync utility available, skipping flush");
        return;
    };
    match Command::new(sync).status() {
        Ok(status) if status.success() => {}
        Ok(status) => tracing::warn!("sync exited with {status}"),
        Err(e) => tracing::warn!("sync failed: {e}"),
    }
}
