//! Working-file bookkeeping for normalized audio.

use crate::error::{ServiceError, ServiceResult};
use std::path::{Path, PathBuf};
use tracing::warn;
use uuid::Uuid;

/// Reserve a unique path under `dir` for a normalized audio file, creating
/// the directory if needed.
pub fn create_temp_path(dir: &Path, suffix: &str) -> ServiceResult<PathBuf> {
    std::fs::create_dir_all(dir).map_err(|source| ServiceError::FileSystem {
        operation: "create-dir",
        path: dir.to_path_buf(),
        source,
    })?;
    Ok(dir.join(format!("whisperrr_{}.{}", Uuid::new_v4(), suffix)))
}

/// Remove a temp file, logging rather than failing when it is already gone.
/// Cleanup runs after the response is already determined, so a leftover file
/// is a disk-space nuisance, not a request failure.
pub fn cleanup_temp_file(path: &Path) {
    if let Err(err) = std::fs::remove_file(path) {
        if err.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %err, "failed to remove temp file");
        }
    }
}
