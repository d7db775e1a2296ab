//! Local filesystem manipulation of the replayed working tree.

use std::path::Path;

use tracing::debug;

use crate::errors::ReplayError;

/// Directory of the git repository, never touched by a wipe.
const GIT_DIR: &str = ".git";

/// Remove a file, symlink, or directory tree at `path` if anything is there.
pub fn remove_path(path: &Path) -> Result<(), ReplayError> {
    let metadata = match std::fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(ReplayError::fs(path, e)),
    };
    if metadata.is_dir() {
        std::fs::remove_dir_all(path).map_err(|e| ReplayError::fs(path, e))?;
    } else {
        std::fs::remove_file(path).map_err(|e| ReplayError::fs(path, e))?;
    }
    debug!(path = %path.display(), "removed");
    Ok(())
}

/// Delete every entry of `dir` except `.git`. Returns the number of entries
/// removed.
pub fn wipe_content(dir: &Path) -> Result<usize, ReplayError> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(ReplayError::fs(dir, e)),
    };

    let mut removed = 0;
    for entry in entries {
        let entry = entry.map_err(|e| ReplayError::fs(dir, e))?;
        if entry.file_name() == GIT_DIR {
            continue;
        }
        remove_path(&entry.path())?;
        removed += 1;
    }
    Ok(removed)
}
