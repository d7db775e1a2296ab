//! Git side of the replay: the commit sink.

pub mod client;

pub use client::GitClient;

use crate::errors::GitError;
use crate::models::Revision;

/// Records one replayed revision as a commit.
pub trait CommitSink {
    /// Stage every addition, modification and deletion in the working tree,
    /// leaving subversion metadata out of the index.
    fn stage_all(&self) -> Result<(), GitError>;

    /// Commit the staged tree with the revision's author and date. Returns
    /// `None` when the tree is unchanged.
    fn commit(&self, revision: &Revision, message: &str) -> Result<Option<String>, GitError>;
}
