//! Local Git repository operations via `git2`.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use chrono::DateTime;
use git2::{IndexAddOption, Repository, Signature, Time};
use tracing::{debug, info, instrument};

use super::CommitSink;
use crate::errors::GitError;
use crate::identity::GitIdentity;
use crate::models::Revision;

/// Metadata directory of subversion working copies.
const SVN_METADATA_DIR: &str = ".svn";

/// Pattern appended to `.git/info/exclude` of a new repository.
const SVN_EXCLUDE_PATTERN: &str = "**/.svn/**";

/// Format of the timestamp printed by `svn log`.
const SVN_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S %z";

/// High-level Git client wrapping a `git2::Repository`.
pub struct GitClient {
    repo: Repository,
    repo_path: PathBuf,
}

impl GitClient {
    /// Open an existing Git repository at `repo_path`.
    pub fn new<P: AsRef<Path>>(repo_path: P) -> Result<Self, GitError> {
        let path = repo_path.as_ref();
        info!(path = %path.display(), "opening git repository");
        let repo = Repository::open(path)
            .map_err(|_| GitError::RepositoryNotFound(path.display().to_string()))?;
        Ok(Self {
            repo,
            repo_path: path.to_path_buf(),
        })
    }

    /// Open the repository at `repo_path`, initializing it (and the directory)
    /// first if needed.
    pub fn init_or_open<P: AsRef<Path>>(repo_path: P) -> Result<Self, GitError> {
        let path = repo_path.as_ref();
        if path.join(".git").exists() {
            return Self::new(path);
        }

        std::fs::create_dir_all(path)?;
        info!(path = %path.display(), "initializing git repository");
        let repo = Repository::init(path)?;

        let info_dir = repo.path().join("info");
        std::fs::create_dir_all(&info_dir)?;
        let mut exclude = OpenOptions::new()
            .create(true)
            .append(true)
            .open(info_dir.join("exclude"))?;
        writeln!(exclude, "{}", SVN_EXCLUDE_PATTERN)?;

        Ok(Self {
            repo,
            repo_path: path.to_path_buf(),
        })
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    /// The `.git` directory.
    pub fn git_dir(&self) -> &Path {
        self.repo.path()
    }

    pub fn repo(&self) -> &Repository {
        &self.repo
    }

    /// Return the SHA of HEAD.
    pub fn get_head_sha(&self) -> Result<String, GitError> {
        let head = self.repo.head()?;
        let commit = head.peel_to_commit()?;
        Ok(commit.id().to_string())
    }
}

/// Whether a repository-relative path lies inside a `.svn` directory.
fn is_svn_metadata(path: &Path) -> bool {
    path.components()
        .any(|c| matches!(c, Component::Normal(part) if part == SVN_METADATA_DIR))
}

/// Convert an `svn log` timestamp into a git time, keeping its UTC offset.
fn parse_svn_time(timestamp: &str) -> Result<Time, GitError> {
    let parsed = DateTime::parse_from_str(timestamp.trim(), SVN_DATE_FORMAT).map_err(|e| {
        GitError::InvalidTimestamp {
            timestamp: timestamp.to_string(),
            detail: e.to_string(),
        }
    })?;
    Ok(Time::new(
        parsed.timestamp(),
        parsed.offset().local_minus_utc() / 60,
    ))
}

fn signature<'a>(identity: &'a GitIdentity, when: &Time) -> Result<Signature<'a>, GitError> {
    let name = if identity.name.is_empty() {
        identity.email.as_str()
    } else {
        identity.name.as_str()
    };
    Ok(Signature::new(name, &identity.email, when)?)
}

impl CommitSink for GitClient {
    #[instrument(skip(self), fields(path = %self.repo_path.display()))]
    fn stage_all(&self) -> Result<(), GitError> {
        let mut index = self.repo.index()?;

        // Drop anything under .svn that an earlier run may have staged.
        index.remove_all(
            ["*"].iter(),
            Some(&mut |path: &Path, _: &[u8]| if is_svn_metadata(path) { 0 } else { 1 }),
        )?;
        // FORCE: versioned .gitignore files must not hide replayed content.
        index.add_all(
            ["*"].iter(),
            IndexAddOption::DEFAULT | IndexAddOption::FORCE,
            Some(&mut |path: &Path, _: &[u8]| if is_svn_metadata(path) { 1 } else { 0 }),
        )?;
        index.update_all(
            ["*"].iter(),
            Some(&mut |path: &Path, _: &[u8]| if is_svn_metadata(path) { 1 } else { 0 }),
        )?;
        index.write()?;

        debug!(entries = index.len(), "staged working tree");
        Ok(())
    }

    #[instrument(skip(self, revision, message), fields(rev = revision.number))]
    fn commit(&self, revision: &Revision, message: &str) -> Result<Option<String>, GitError> {
        let mut index = self.repo.index()?;
        let tree_oid = index.write_tree()?;

        let parent_commit = match self.repo.head() {
            Ok(head) => Some(head.peel_to_commit()?),
            Err(_) => None,
        };
        let unchanged = match &parent_commit {
            Some(parent) => parent.tree_id() == tree_oid,
            None => index.is_empty(),
        };
        if unchanged {
            debug!("nothing to commit");
            return Ok(None);
        }

        let identity = GitIdentity::parse(&revision.author)
            .ok_or_else(|| GitError::InvalidIdentity(revision.author.clone()))?;
        let when = parse_svn_time(&revision.timestamp)?;
        let sig = signature(&identity, &when)?;

        let tree = self.repo.find_tree(tree_oid)?;
        let parents: Vec<&git2::Commit> = parent_commit.iter().collect();
        let oid = self
            .repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)?;
        info!(sha = %oid, "created commit");
        Ok(Some(oid.to_string()))
    }
}
