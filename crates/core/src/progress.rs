//! Replay checkpoint stored in `.git/info/progress`.
//!
//! The file holds the number of the last fully replayed revision. It is
//! rewritten through a temp file in the same directory followed by a
//! rename, so a crash leaves either the old or the new value behind.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

use crate::errors::ReplayError;

const PROGRESS_FILE: &str = "progress";

/// Handle on the checkpoint file of one git repository.
#[derive(Debug, Clone)]
pub struct Checkpoint {
    path: PathBuf,
}

impl Checkpoint {
    /// Checkpoint for the repository whose `.git` directory is `git_dir`.
    pub fn new(git_dir: &Path) -> Self {
        Self {
            path: git_dir.join("info").join(PROGRESS_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Last replayed revision, or `None` when no run has completed one.
    pub fn load(&self) -> Result<Option<i64>, ReplayError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.error(e.to_string())),
        };
        let trimmed = contents.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        trimmed
            .parse::<i64>()
            .map(Some)
            .map_err(|_| self.error(format!("not a revision number: '{}'", trimmed)))
    }

    /// Durably record `revision` as the last replayed one.
    pub fn save(&self, revision: i64) -> Result<(), ReplayError> {
        let dir = self
            .path
            .parent()
            .ok_or_else(|| self.error("checkpoint path has no parent".into()))?;
        std::fs::create_dir_all(dir).map_err(|e| self.error(e.to_string()))?;

        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| self.error(e.to_string()))?;
        writeln!(tmp, "{}", revision).map_err(|e| self.error(e.to_string()))?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| self.error(e.to_string()))?;
        tmp.persist(&self.path)
            .map_err(|e| self.error(e.error.to_string()))?;

        debug!(revision, "checkpoint saved");
        Ok(())
    }

    fn error(&self, detail: String) -> ReplayError {
        ReplayError::Checkpoint {
            path: self.path.display().to_string(),
            detail,
        }
    }
}
