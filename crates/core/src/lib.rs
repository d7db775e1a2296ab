//! svnreplay core library.
//!
//! This crate replays the history of a subversion repository, including
//! nested `svn:externals`, into a git repository with one commit per
//! revision: configuration, identity mapping, the subversion and git
//! clients, the externals parser and reconciler, and the replay loop.

pub mod ancestry;
pub mod commit_format;
pub mod config;
pub mod errors;
pub mod git;
pub mod identity;
pub mod models;
pub mod progress;
pub mod reconcile;
pub mod replay;
pub mod svn;
pub mod worktree;

// Re-exports for convenience.
pub use config::ReplayConfig;
pub use git::GitClient;
pub use identity::IdentityMap;
pub use replay::Replayer;
pub use svn::SvnClient;
