//! In-memory subversion service for unit tests.
//!
//! History is a map of URL to per-revision node states; a lookup at revision
//! N sees the latest state recorded at or before N. Working copies are real
//! directories whose `.svn/` holds the bound URL, revision, and list of
//! versioned files, so reconciliation and git staging can be observed on
//! disk.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::Mutex;

use super::parser::{NodeKind, SvnInfo};
use super::{HistorySource, LogQuery, SwitchMode, WorkingCopy};
use crate::errors::SvnError;

#[derive(Debug, Clone)]
pub(crate) enum FakeNode {
    Dir(Vec<(String, String)>),
    File(String),
    Deleted,
}

#[derive(Debug, Clone)]
enum FakeDiff {
    Text(String),
    Timeout,
}

#[derive(Default)]
pub(crate) struct FakeSvn {
    nodes: HashMap<String, BTreeMap<i64, FakeNode>>,
    externals: HashMap<String, BTreeMap<i64, String>>,
    log: BTreeMap<i64, (String, String)>,
    first_rev: Option<i64>,
    diffs: HashMap<i64, FakeDiff>,
    conflicts_once: Mutex<HashSet<(String, i64)>>,
    conflicts_always: HashSet<(String, i64)>,
    stale: HashSet<String>,
    unreachable: HashSet<String>,
    calls: Mutex<Vec<String>>,
}

fn failed(stderr: impl Into<String>) -> SvnError {
    SvnError::CommandFailed {
        exit_code: 1,
        stderr: stderr.into(),
    }
}

impl FakeSvn {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dir(&mut self, url: &str, rev: i64, files: &[(&str, &str)]) -> &mut Self {
        let files = files
            .iter()
            .map(|(p, c)| (p.to_string(), c.to_string()))
            .collect();
        self.node(url, rev, FakeNode::Dir(files))
    }

    pub fn file(&mut self, url: &str, rev: i64, content: &str) -> &mut Self {
        self.node(url, rev, FakeNode::File(content.into()))
    }

    pub fn delete(&mut self, url: &str, rev: i64) -> &mut Self {
        self.node(url, rev, FakeNode::Deleted)
    }

    fn node(&mut self, url: &str, rev: i64, node: FakeNode) -> &mut Self {
        self.nodes.entry(url.into()).or_default().insert(rev, node);
        self
    }

    pub fn externals(&mut self, url: &str, rev: i64, text: &str) -> &mut Self {
        self.externals
            .entry(url.into())
            .or_default()
            .insert(rev, text.into());
        self
    }

    pub fn log(&mut self, rev: i64, author: &str, message: &str) -> &mut Self {
        self.log.insert(rev, (author.into(), message.into()));
        self
    }

    /// First revision reported for the replayed path, when it differs from
    /// the first revision of the whole log.
    pub fn first_rev(&mut self, rev: i64) -> &mut Self {
        self.first_rev = Some(rev);
        self
    }

    pub fn diff(&mut self, rev: i64, text: &str) -> &mut Self {
        self.diffs.insert(rev, FakeDiff::Text(text.into()));
        self
    }

    pub fn diff_timeout(&mut self, rev: i64) -> &mut Self {
        self.diffs.insert(rev, FakeDiff::Timeout);
        self
    }

    /// Make the next checkout/switch of `url` at `rev` hit a tree conflict.
    pub fn tree_conflict_once(&mut self, url: &str, rev: i64) -> &mut Self {
        self.conflicts_once
            .get_mut()
            .unwrap()
            .insert((url.into(), rev));
        self
    }

    pub fn tree_conflict_always(&mut self, url: &str, rev: i64) -> &mut Self {
        self.conflicts_always.insert((url.into(), rev));
        self
    }

    /// Checkouts of `url` fail as if the target were already a working copy
    /// of another URL.
    pub fn stale_working_copy(&mut self, url: &str) -> &mut Self {
        self.stale.insert(url.into());
        self
    }

    /// Info queries for `url` fail as if the server could not be reached.
    pub fn unreachable(&mut self, url: &str) -> &mut Self {
        self.unreachable.insert(url.into());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn node_at(&self, url: &str, rev: i64) -> Option<&FakeNode> {
        self.nodes
            .get(url)?
            .range(..=rev)
            .next_back()
            .map(|(_, node)| node)
            .filter(|node| !matches!(node, FakeNode::Deleted))
    }

    fn check_conflict(&self, url: &str, rev: i64) -> Result<(), SvnError> {
        let key = (url.to_string(), rev);
        if self.conflicts_always.contains(&key) || self.conflicts_once.lock().unwrap().remove(&key)
        {
            return Err(failed(
                "svn: E155027: Tree conflict can only be resolved to 'working' state",
            ));
        }
        Ok(())
    }

    fn log_text(&self, rev: i64) -> Result<String, SvnError> {
        let (author, message) = self
            .log
            .get(&rev)
            .ok_or_else(|| failed(format!("svn: E160006: No such revision {}", rev)))?;
        let lines = message.lines().count();
        Ok(format!(
            "{sep}\nr{rev} | {author} | 2020-01-{day:02} 10:00:00 -0700 (Wed, 01 Jan 2020) | {lines} line{s}\n\n{message}\n{sep}\n",
            sep = "-".repeat(72),
            day = (rev % 28) + 1,
            s = if lines == 1 { "" } else { "s" },
        ))
    }

    /// Bring the working copy at `dest` to `url@rev`.
    fn materialize(&self, url: &str, rev: i64, dest: &Path) -> Result<(), SvnError> {
        let files = match self.node_at(url, rev) {
            Some(FakeNode::Dir(files)) => files.clone(),
            Some(_) => return Err(failed(format!("svn: E170000: URL '{}' refers to a file", url))),
            None => {
                return Err(failed(format!(
                    "svn: E195012: Unable to find repository location for '{}' in revision {}",
                    url, rev
                )))
            }
        };

        let meta = dest.join(".svn");
        std::fs::create_dir_all(&meta)?;
        if let Ok(previous) = std::fs::read_to_string(meta.join("files")) {
            for path in previous.lines() {
                let _ = std::fs::remove_file(dest.join(path));
            }
        }
        for (path, content) in &files {
            let target = dest.join(path);
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(target, content)?;
        }
        let listing: Vec<&str> = files.iter().map(|(p, _)| p.as_str()).collect();
        std::fs::write(meta.join("files"), listing.join("\n"))?;
        std::fs::write(meta.join("url"), format!("{}\n{}", url, rev))?;
        Ok(())
    }

    fn bound(&self, wc: &Path) -> Result<(String, i64), SvnError> {
        let text = std::fs::read_to_string(wc.join(".svn").join("url"))
            .map_err(|_| failed(format!("svn: E155007: '{}' is not a working copy", wc.display())))?;
        let mut lines = text.lines();
        let url = lines.next().unwrap_or_default().to_string();
        let rev = lines.next().and_then(|r| r.parse().ok()).unwrap_or(0);
        Ok((url, rev))
    }
}

impl HistorySource for FakeSvn {
    async fn log_entry(&self, _target: &str, query: LogQuery) -> Result<String, SvnError> {
        let rev = match query {
            LogQuery::First => self.first_rev.or_else(|| self.log.keys().next().copied()),
            LogQuery::Last => self.log.keys().next_back().copied(),
            LogQuery::At(rev) => Some(rev),
        }
        .ok_or_else(|| failed("svn: E160006: empty log"))?;
        self.log_text(rev)
    }

    async fn url_info(
        &self,
        url: &str,
        rev: Option<i64>,
        peg: Option<i64>,
    ) -> Result<SvnInfo, SvnError> {
        if self.unreachable.contains(url) {
            return Err(failed(format!(
                "svn: E170013: Unable to connect to a repository at URL '{}'",
                url
            )));
        }
        let at = rev.or(peg).unwrap_or(i64::MAX);
        let kind = match self.node_at(url, at) {
            Some(FakeNode::Dir(_)) => NodeKind::Directory,
            Some(_) => NodeKind::File,
            None => {
                return Err(failed(format!(
                    "svn: E170000: URL '{}' non-existent in revision {}",
                    url, at
                )))
            }
        };
        Ok(SvnInfo {
            url: Some(url.to_string()),
            revision: Some(at),
            node_kind: Some(kind),
        })
    }

    async fn wc_info(&self, wc: &Path) -> Result<SvnInfo, SvnError> {
        let (url, rev) = self.bound(wc)?;
        Ok(SvnInfo {
            url: Some(url),
            revision: Some(rev),
            node_kind: Some(NodeKind::Directory),
        })
    }

    async fn externals_property(&self, wc: &Path, rev: i64) -> Result<String, SvnError> {
        let (url, bound_rev) = self.bound(wc)?;
        if rev > bound_rev {
            return Err(failed(format!(
                "svn: E195012: Unable to find repository location for '{}' in revision {}",
                url, rev
            )));
        }
        Ok(self
            .externals
            .get(&url)
            .and_then(|history| history.range(..=rev).next_back())
            .map(|(_, text)| text.clone())
            .unwrap_or_default())
    }

    async fn revision_diff(&self, _url: &str, rev: i64) -> Result<String, SvnError> {
        self.record(format!("diff -c {}", rev));
        match self.diffs.get(&rev) {
            Some(FakeDiff::Text(text)) => Ok(text.clone()),
            Some(FakeDiff::Timeout) => Err(SvnError::Timeout {
                command: format!("svn diff -c {}", rev),
                seconds: 10,
            }),
            None => Ok(String::new()),
        }
    }
}

impl WorkingCopy for FakeSvn {
    async fn checkout(
        &self,
        url: &str,
        rev: i64,
        peg: Option<i64>,
        dest: &Path,
    ) -> Result<(), SvnError> {
        self.record(format!("checkout {} -r{} @{:?}", url, rev, peg));
        let bound = self.bound(dest).ok().map(|(bound, _)| bound);
        if self.stale.contains(url) || bound.is_some_and(|bound| bound != url) {
            return Err(failed(format!(
                "svn: E155000: '{}' is already a working copy for a different URL",
                dest.display()
            )));
        }
        self.check_conflict(url, rev)?;
        self.materialize(url, rev, dest)
    }

    async fn switch(
        &self,
        wc: &Path,
        url: &str,
        rev: i64,
        peg: Option<i64>,
        mode: SwitchMode,
    ) -> Result<(), SvnError> {
        self.record(format!("switch {} -r{} @{:?} {:?}", url, rev, peg, mode));
        self.check_conflict(url, rev)?;
        self.materialize(url, rev, wc)
    }

    async fn export(&self, url: &str, rev: i64, peg: i64, dest: &Path) -> Result<(), SvnError> {
        self.record(format!("export {} -r{} @{}", url, rev, peg));
        match self.node_at(url, rev) {
            Some(FakeNode::File(content)) => {
                std::fs::write(dest, content)?;
                Ok(())
            }
            _ => Err(failed(format!(
                "svn: E170000: URL '{}' non-existent in revision {}",
                url, rev
            ))),
        }
    }
}
