//! SVN side of the replay: the CLI wrapper, output parsers, and the
//! `svn:externals` grammar.
//!
//! The replay engine talks to subversion through two traits so that the
//! reconciler and the replay loop can be driven by an in-memory fake in
//! tests: [`HistorySource`] answers questions about history and
//! [`WorkingCopy`] mutates on-disk trees. [`SvnClient`] implements both by
//! shelling out to `svn`.

pub mod client;
pub mod externals;
pub mod parser;

#[cfg(test)]
pub(crate) mod fake;

use std::path::Path;

pub use client::SvnClient;
pub use externals::{ExternalDefinition, ExternalsContext, ExternalsParser};
pub use parser::*;

use crate::errors::SvnError;

/// Which log entry of a path to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogQuery {
    /// Oldest revision that touched the path.
    First,
    /// Youngest revision that touched the path.
    Last,
    At(i64),
}

/// How a working copy is switched to a new URL/revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchMode {
    /// The replayed root: resolve any local conflict with the incoming side.
    AcceptTheirs,
    /// An external directory that may previously have held unrelated content.
    IgnoreAncestry,
}

/// Read-only queries against the subversion history.
#[allow(async_fn_in_trait)]
pub trait HistorySource {
    /// Raw `svn log` text for one entry of `target`.
    async fn log_entry(&self, target: &str, query: LogQuery) -> Result<String, SvnError>;

    /// `svn info` for a URL at an operative revision and/or peg revision.
    async fn url_info(
        &self,
        url: &str,
        rev: Option<i64>,
        peg: Option<i64>,
    ) -> Result<SvnInfo, SvnError>;

    /// `svn info` for a local working copy.
    async fn wc_info(&self, wc: &Path) -> Result<SvnInfo, SvnError>;

    /// Recursive `svn:externals` property text of a working copy at `rev`.
    async fn externals_property(&self, wc: &Path, rev: i64) -> Result<String, SvnError>;

    /// Full diff of one revision (`svn diff -c`). May fail with
    /// [`SvnError::Timeout`].
    async fn revision_diff(&self, url: &str, rev: i64) -> Result<String, SvnError>;
}

/// Mutations of local working trees.
#[allow(async_fn_in_trait)]
pub trait WorkingCopy {
    async fn checkout(
        &self,
        url: &str,
        rev: i64,
        peg: Option<i64>,
        dest: &Path,
    ) -> Result<(), SvnError>;

    async fn switch(
        &self,
        wc: &Path,
        url: &str,
        rev: i64,
        peg: Option<i64>,
        mode: SwitchMode,
    ) -> Result<(), SvnError>;

    /// Unversioned copy of `url@peg` at `rev`, overwriting `dest`.
    async fn export(&self, url: &str, rev: i64, peg: i64, dest: &Path) -> Result<(), SvnError>;
}
