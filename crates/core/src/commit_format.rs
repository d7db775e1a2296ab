//! Commit message formatting for replayed revisions.

use crate::config::ReplayConfig;
use crate::models::Revision;

/// Formats commit messages from a configurable template.
///
/// Placeholders: `{original_message}`, `{svn_rev}`, `{svn_url}`.
pub struct CommitFormatter {
    template: String,
    svn_url: String,
}

impl CommitFormatter {
    /// Create a formatter for the replayed tree described by `config`.
    pub fn new(config: &ReplayConfig) -> Self {
        Self {
            template: config.commit_template.clone(),
            svn_url: config.repo_url(),
        }
    }

    pub fn format(&self, revision: &Revision) -> String {
        self.template
            .replace("{svn_rev}", &revision.number.to_string())
            .replace("{svn_url}", &self.svn_url)
            // Last, so placeholders inside the message itself stay literal.
            .replace("{original_message}", revision.message.trim_end())
    }
}
