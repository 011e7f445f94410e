//! Filesystem helpers shared by the generators.

use std::path::Path;
use tokio::fs;

use crate::error::MediaResult;

/// Create the parent directory of `path` if it does not exist yet.
pub async fn ensure_parent_dir(path: &Path) -> MediaResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).await?;
        }
    }
    Ok(())
}

/// Size of `path` when it is a regular, non-empty file.
///
/// This is the success signal for every engine step: the exit code alone
/// is not trusted.
pub async fn non_empty_file(path: &Path) -> Option<u64> {
    match fs::metadata(path).await {
        Ok(meta) if meta.is_file() && meta.len() > 0 => Some(meta.len()),
        _ => None,
    }
}

/// Remove a file, treating absence as success.
///
/// Returns `true` when a file was actually deleted.
pub async fn remove_file_if_exists(path: &Path) -> MediaResult<bool> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}
