//! Lookup of Git identities by SVN username.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::mapping_file::MappingFile;
use crate::errors::IdentityError;

/// A Git author/committer identity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GitIdentity {
    /// Display name.
    pub name: String,
    /// Email address.
    pub email: String,
}

impl GitIdentity {
    /// Parse `Display Name <email>`. The name may be empty, the email may not.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        let open = s.rfind('<')?;
        let rest = &s[open + 1..];
        let close = rest.find('>')?;
        if !rest[close + 1..].trim().is_empty() {
            return None;
        }
        let email = rest[..close].trim();
        if email.is_empty() {
            return None;
        }
        Some(Self {
            name: s[..open].trim().to_string(),
            email: email.to_string(),
        })
    }
}

impl std::fmt::Display for GitIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.name.is_empty() {
            write!(f, "<{}>", self.email)
        } else {
            write!(f, "{} <{}>", self.name, self.email)
        }
    }
}

/// Immutable SVN username -> Git identity table.
#[derive(Debug, Clone, Default)]
pub struct IdentityMap {
    entries: HashMap<String, GitIdentity>,
}

impl IdentityMap {
    pub fn new(entries: HashMap<String, GitIdentity>) -> Self {
        Self { entries }
    }

    /// Load the map from a mapping file (see [`MappingFile`] for formats).
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, IdentityError> {
        Ok(Self::new(MappingFile::load(path)?))
    }

    /// Look up the Git identity for an SVN username.
    pub fn lookup(&self, svn_username: &str) -> Option<&GitIdentity> {
        let found = self.entries.get(svn_username);
        if found.is_none() {
            debug!(svn_username, "no identity mapping");
        }
        found
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, GitIdentity)> for IdentityMap {
    fn from_iter<T: IntoIterator<Item = (String, GitIdentity)>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
