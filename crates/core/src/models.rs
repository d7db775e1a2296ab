//! Domain models shared across the replay pipeline.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// One subversion revision, ready to be turned into a git commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revision {
    pub number: i64,
    /// Mapped git identity, `Name <email>`.
    pub author: String,
    /// Timestamp exactly as printed by `svn log`, e.g.
    /// `2013-04-19 01:13:18 -0700`.
    pub timestamp: String,
    pub message: String,
}

/// What an external points at, as resolved against the upstream repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExternalKind {
    /// A directory: materialized as a checkout and recursed into.
    Directory,
    /// A single file: materialized as a flat export.
    File,
    /// The target cannot be located at the resolved revision.
    Broken,
}

/// A single `svn:externals` definition, fully resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalReference {
    /// Path of the materialized object, relative to the working copy whose
    /// property defined it.
    pub local_path: PathBuf,
    pub url: String,
    pub operative_rev: i64,
    pub peg_rev: i64,
    pub kind: ExternalKind,
}

impl ExternalReference {
    pub fn is_directory(&self) -> bool {
        self.kind == ExternalKind::Directory
    }

    pub fn is_broken(&self) -> bool {
        self.kind == ExternalKind::Broken
    }
}

/// Outcome of updating the root working copy to a revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootUpdate {
    Updated,
    /// The replayed path is unreachable at this revision.
    Ignored,
}

/// Outcome of replaying one revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevisionOutcome {
    Committed(String),
    NothingToCommit,
    Ignored,
}

impl std::fmt::Display for RevisionOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Committed(sha) => write!(f, "committed {}", &sha[..8.min(sha.len())]),
            Self::NothingToCommit => write!(f, "nothing to commit"),
            Self::Ignored => write!(f, "ignored"),
        }
    }
}

/// How a run found its starting point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStart {
    Fresh,
    Resumed { checkpoint: i64 },
}

/// The inclusive range of revisions a run will replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunPlan {
    pub first: i64,
    pub last: i64,
    pub start: RunStart,
}

impl RunPlan {
    pub fn revisions(&self) -> std::ops::RangeInclusive<i64> {
        self.first..=self.last
    }

    pub fn is_empty(&self) -> bool {
        self.first > self.last
    }
}

/// Totals reported at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplayStats {
    pub committed: usize,
    pub unchanged: usize,
    pub ignored: usize,
    /// Set when the run stopped early on an interrupt.
    pub interrupted: bool,
}

impl ReplayStats {
    pub fn record(&mut self, outcome: &RevisionOutcome) {
        match outcome {
            RevisionOutcome::Committed(_) => self.committed += 1,
            RevisionOutcome::NothingToCommit => self.unchanged += 1,
            RevisionOutcome::Ignored => self.ignored += 1,
        }
    }
}
