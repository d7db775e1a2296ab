//! Error types for the svnreplay core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and a
//! top-level [`CoreError`] enum unifies them all for callers that want a
//! single error type.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Svn(#[from] SvnError),

    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error(transparent)]
    LogEntry(#[from] LogEntryError),

    #[error(transparent)]
    Externals(#[from] ExternalsError),

    #[error(transparent)]
    Replay(#[from] ReplayError),
}

// ---------------------------------------------------------------------------
// SVN errors
// ---------------------------------------------------------------------------

/// Messages printed by `svn` when a node does not exist at the requested
/// revision/peg combination.
const MISSING_PATH_MARKERS: &[&str] = &[
    "non-existent in revision",
    "path not found",
    "Unable to find repository location",
];

/// Errors from SVN CLI operations.
#[derive(Debug, Error)]
pub enum SvnError {
    /// The `svn` binary was not found on `$PATH`.
    #[error("svn binary not found: {0}")]
    BinaryNotFound(String),

    /// An `svn` command exited with a non-zero status.
    #[error("svn command failed (exit {exit_code}): {stderr}")]
    CommandFailed { exit_code: i32, stderr: String },

    /// An `svn` command did not finish within its deadline.
    #[error("svn command '{command}' timed out after {seconds} seconds")]
    Timeout { command: String, seconds: u64 },

    /// `svn info` output lacked a field we need.
    #[error("no '{field}' found in svn info output")]
    InfoFieldMissing { field: String },

    /// Generic I/O wrapper.
    #[error("svn I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl SvnError {
    fn stderr(&self) -> &str {
        match self {
            Self::CommandFailed { stderr, .. } => stderr,
            _ => "",
        }
    }

    /// The node does not exist at the requested revision (deleted, moved,
    /// or outside its ancestry).
    pub fn is_missing_path(&self) -> bool {
        let stderr = self.stderr();
        MISSING_PATH_MARKERS.iter().any(|m| stderr.contains(m))
    }

    /// The operative revision falls into a gap of the path's copy history.
    pub fn is_location_not_found(&self) -> bool {
        self.stderr().contains("Unable to find repository location")
    }

    /// A switch/update ran into a tree conflict it cannot resolve itself.
    pub fn is_tree_conflict(&self) -> bool {
        self.stderr().contains("Tree conflict can only be resolved")
    }

    /// The checkout target is already a working copy of another URL.
    pub fn is_wrong_url_working_copy(&self) -> bool {
        self.stderr()
            .contains("is already a working copy for a different URL")
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

// ---------------------------------------------------------------------------
// Git errors
// ---------------------------------------------------------------------------

/// Errors from local Git (git2) operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// The repository path does not exist or is not a git repo.
    #[error("git repository not found at '{0}'")]
    RepositoryNotFound(String),

    /// A `git2` library error.
    #[error("git2 error: {0}")]
    Git2Error(#[from] git2::Error),

    /// The author string is not of the form `Name <email>`.
    #[error("invalid git identity '{0}', expected 'Name <email>'")]
    InvalidIdentity(String),

    /// The revision timestamp could not be turned into a git time.
    #[error("invalid commit timestamp '{timestamp}': {detail}")]
    InvalidTimestamp { timestamp: String, detail: String },

    /// Generic I/O wrapper.
    #[error("git I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A required setting was given neither on the command line nor in the file.
    #[error("missing required setting '{0}'")]
    Missing(String),

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue { field: String, detail: String },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Identity errors
// ---------------------------------------------------------------------------

/// Errors from loading the identity map.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// The mapping file could not be loaded.
    #[error("identity mapping file error at '{path}': {detail}")]
    MappingFileError { path: String, detail: String },

    /// A line of the mapping file is not `svn-user = Name <email>`.
    #[error("couldn't parse user line {line_no}: {line}")]
    BadLine { line_no: usize, line: String },

    /// TOML parse error when reading a `.toml` mapping file.
    #[error("identity mapping parse error: {0}")]
    ParseError(String),

    /// Generic I/O error.
    #[error("identity I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Log entry errors
// ---------------------------------------------------------------------------

/// Errors from parsing one `svn log` record.
#[derive(Debug, Error)]
pub enum LogEntryError {
    /// The header line is not `r<N> | <author> | <date> (<day>, ...) | <n> lines`.
    #[error("not a valid log from 'svn log', cannot parse:\n{0}")]
    Malformed(String),

    /// The author has no entry in the identity map.
    #[error("no git user found for {author} at line:\n{line}")]
    UnknownAuthor { author: String, line: String },
}

// ---------------------------------------------------------------------------
// Externals errors
// ---------------------------------------------------------------------------

/// Errors from parsing and resolving `svn:externals` definitions.
#[derive(Debug, Error)]
pub enum ExternalsError {
    /// A definition line could not be interpreted.
    #[error("malformed svn:externals line '{line}': {reason}")]
    Malformed { line: String, reason: String },

    /// The node-kind query failed for a reason other than a missing path.
    #[error("failed to look up external {url} -r {rev} @{peg}: {source}")]
    Lookup {
        url: String,
        rev: i64,
        peg: i64,
        #[source]
        source: SvnError,
    },
}

// ---------------------------------------------------------------------------
// Replay errors
// ---------------------------------------------------------------------------

/// Errors from the revision replay loop.
#[derive(Debug, Error)]
pub enum ReplayError {
    /// A tree conflict persisted after wiping the working copy once.
    #[error("r{revision}: tree conflict persisted after wiping the working copy: {source}")]
    TreeConflict {
        revision: i64,
        #[source]
        source: SvnError,
    },

    /// A checkout/switch/export/query against subversion failed.
    #[error("working tree operation failed at r{revision}: {source}")]
    WorkingTreeOperation {
        revision: i64,
        #[source]
        source: SvnError,
    },

    /// A history query outside any single revision (planning, ancestry).
    #[error("subversion history query failed: {0}")]
    History(#[source] SvnError),

    #[error(transparent)]
    LogEntry(#[from] LogEntryError),

    #[error(transparent)]
    Externals(#[from] ExternalsError),

    #[error(transparent)]
    Git(#[from] GitError),

    /// The checkpoint file could not be read or written.
    #[error("checkpoint file '{path}': {detail}")]
    Checkpoint { path: String, detail: String },

    /// Local filesystem manipulation of the working tree failed.
    #[error("filesystem error at '{path}': {source}")]
    Fs {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl ReplayError {
    pub(crate) fn fs(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Fs {
            path: path.display().to_string(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failed(stderr: &str) -> SvnError {
        SvnError::CommandFailed {
            exit_code: 1,
            stderr: stderr.into(),
        }
    }

    #[test]
    fn test_error_display_messages() {
        let err = SvnError::Timeout {
            command: "svn diff -c 4".into(),
            seconds: 10,
        };
        assert_eq!(
            err.to_string(),
            "svn command 'svn diff -c 4' timed out after 10 seconds"
        );

        let err = LogEntryError::UnknownAuthor {
            author: "bob".into(),
            line: "r1 | bob | ...".into(),
        };
        assert!(err.to_string().starts_with("no git user found for bob"));

        let err = ReplayError::TreeConflict {
            revision: 12,
            source: failed("svn: E155027: Tree conflict"),
        };
        assert!(err.to_string().starts_with("r12: tree conflict"));
    }

    #[test]
    fn test_svn_error_classification() {
        let err = failed("svn: warning: W170000: URL 'file:///r/lib' non-existent in revision 3");
        assert!(err.is_missing_path());
        assert!(!err.is_tree_conflict());

        let err = failed("svn: E195012: Unable to find repository location for 'x' in revision 9");
        assert!(err.is_location_not_found());
        assert!(err.is_missing_path());

        let err = failed("svn: E155000: 'vendor' is already a working copy for a different URL");
        assert!(err.is_wrong_url_working_copy());

        let err = failed("svn: E155027: Tree conflict can only be resolved to 'working' state");
        assert!(err.is_tree_conflict());

        let err = failed("svn: E170013: Unable to connect to a repository");
        assert!(!err.is_missing_path());
        assert!(!err.is_timeout());
    }

    #[test]
    fn test_core_error_from_subsystem() {
        let core_err: CoreError = SvnError::BinaryNotFound("svn".into()).into();
        assert!(matches!(core_err, CoreError::Svn(_)));

        let core_err: CoreError = ReplayError::History(SvnError::BinaryNotFound("svn".into())).into();
        assert!(matches!(core_err, CoreError::Replay(_)));
    }
}
