//! Identity mapping file reader.
//!
//! Two formats are accepted. The plain format has one mapping per line:
//!
//! ```text
//! # comments and blank lines are ignored
//! jdoe = John Doe <jdoe@example.com>
//! alice = Alice Smith <alice@example.com>
//! ```
//!
//! A file whose name ends in `.toml` is read as an `[authors]` table:
//!
//! ```toml
//! [authors]
//! jdoe = { name = "John Doe", email = "jdoe@example.com" }
//! ```

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::mapper::GitIdentity;
use crate::errors::IdentityError;

/// A single author entry in the TOML mapping file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorEntry {
    /// Git display name.
    pub name: String,
    /// Git email address.
    pub email: String,
}

/// Wrapper around the TOML mapping file structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MappingFileData {
    /// The `[authors]` table mapping SVN username -> AuthorEntry.
    #[serde(default)]
    pub authors: HashMap<String, AuthorEntry>,
}

/// Utilities for loading the identity mapping file.
pub struct MappingFile;

impl MappingFile {
    /// Load the mapping file from disk, picking the format from the extension.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<HashMap<String, GitIdentity>, IdentityError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading identity mapping file");

        if !path.exists() {
            return Err(IdentityError::MappingFileError {
                path: path.display().to_string(),
                detail: "file not found".into(),
            });
        }

        let contents = std::fs::read_to_string(path)?;
        let is_toml = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("toml"))
            .unwrap_or(false);

        let map = if is_toml {
            Self::parse_toml(&contents)?
        } else {
            Self::parse_lines(&contents)?
        };

        debug!(count = map.len(), "loaded author mappings");
        Ok(map)
    }

    /// Parse the plain `svn-user = Name <email>` format.
    pub fn parse_lines(contents: &str) -> Result<HashMap<String, GitIdentity>, IdentityError> {
        let mut map = HashMap::new();
        for (idx, raw) in contents.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let bad_line = || IdentityError::BadLine {
                line_no: idx + 1,
                line: line.to_string(),
            };
            let (user, identity) = line.split_once('=').ok_or_else(bad_line)?;
            let user = user.trim();
            if user.is_empty() {
                return Err(bad_line());
            }
            let identity = GitIdentity::parse(identity.trim()).ok_or_else(bad_line)?;
            map.insert(user.to_string(), identity);
        }
        Ok(map)
    }

    /// Parse the TOML `[authors]` format.
    pub fn parse_toml(contents: &str) -> Result<HashMap<String, GitIdentity>, IdentityError> {
        let data: MappingFileData =
            toml::from_str(contents).map_err(|e| IdentityError::ParseError(e.to_string()))?;
        Ok(data
            .authors
            .into_iter()
            .map(|(user, entry)| {
                (
                    user,
                    GitIdentity {
                        name: entry.name,
                        email: entry.email,
                    },
                )
            })
            .collect())
    }
}
