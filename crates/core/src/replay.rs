//! The revision replay loop.
//!
//! Each revision goes through the same steps: fetch and parse its log entry,
//! wipe the tree when the externals definitions changed, bring the root
//! working copy to the revision, reconcile externals, commit, and persist
//! the checkpoint. A revision at which the replayed path is unreachable is
//! skipped but still checkpointed.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info, warn};

use crate::commit_format::CommitFormatter;
use crate::config::ReplayConfig;
use crate::errors::{ReplayError, SvnError};
use crate::git::CommitSink;
use crate::identity::IdentityMap;
use crate::models::{ReplayStats, RevisionOutcome, RootUpdate, RunPlan, RunStart};
use crate::progress::Checkpoint;
use crate::reconcile::ExternalsReconciler;
use crate::svn::{
    diff_touches_externals, parse_log_entry, HistorySource, LogQuery, SwitchMode, WorkingCopy,
};
use crate::worktree;

/// Replays subversion revisions into the git repository at the configured
/// target directory.
pub struct Replayer<'a, S, C> {
    svn: &'a S,
    sink: &'a C,
    config: &'a ReplayConfig,
    identities: &'a IdentityMap,
    formatter: CommitFormatter,
    checkpoint: Checkpoint,
    workdir: PathBuf,
    repo_url: String,
}

impl<'a, S, C> Replayer<'a, S, C>
where
    S: HistorySource + WorkingCopy,
    C: CommitSink,
{
    pub fn new(
        svn: &'a S,
        sink: &'a C,
        config: &'a ReplayConfig,
        identities: &'a IdentityMap,
    ) -> Self {
        let workdir = config.target_dir.clone();
        Self {
            svn,
            sink,
            config,
            identities,
            formatter: CommitFormatter::new(config),
            checkpoint: Checkpoint::new(&workdir.join(".git")),
            workdir,
            repo_url: config.repo_url(),
        }
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    pub fn checkpoint(&self) -> &Checkpoint {
        &self.checkpoint
    }

    /// Work out which revisions this run replays.
    ///
    /// A fresh run starts at the first revision of the replayed path; a
    /// resumed one right after the checkpoint. Both end at the youngest
    /// revision of the repository root.
    pub async fn plan(&self) -> Result<RunPlan, ReplayError> {
        let (first, start) = match self.checkpoint.load()? {
            Some(checkpoint) => (checkpoint + 1, RunStart::Resumed { checkpoint }),
            None => (
                self.query_revision(&self.repo_url, LogQuery::First).await?,
                RunStart::Fresh,
            ),
        };
        let last = self
            .query_revision(self.config.root(), LogQuery::Last)
            .await?;
        Ok(RunPlan { first, last, start })
    }

    async fn query_revision(&self, target: &str, query: LogQuery) -> Result<i64, ReplayError> {
        let text = self
            .svn
            .log_entry(target, query)
            .await
            .map_err(ReplayError::History)?;
        Ok(parse_log_entry(&text, self.identities)?.number)
    }

    /// Replay every planned revision, stopping early (between revisions)
    /// once `shutdown` is set.
    pub async fn run(&self, shutdown: &AtomicBool) -> Result<ReplayStats, ReplayError> {
        let plan = self.plan().await?;
        match plan.start {
            RunStart::Fresh => info!(
                from = plan.first,
                to = plan.last,
                "starting from scratch"
            ),
            RunStart::Resumed { checkpoint } => info!(
                checkpoint,
                from = plan.first,
                to = plan.last,
                "continuing from checkpoint"
            ),
        }

        let mut stats = ReplayStats::default();
        if plan.is_empty() {
            info!("nothing to replay");
            return Ok(stats);
        }

        // Resumed runs rebuild the tree from scratch just like fresh ones.
        worktree::wipe_content(&self.workdir)?;

        for revision in plan.revisions() {
            if shutdown.load(Ordering::SeqCst) {
                warn!(revision, "shutdown requested, stopping before revision");
                stats.interrupted = true;
                break;
            }

            info!(revision, "replaying revision");
            let outcome = self.replay_revision(revision).await?;
            self.checkpoint.save(revision)?;
            info!(revision, %outcome, "revision done");
            stats.record(&outcome);
        }

        Ok(stats)
    }

    /// Replay a single revision, without touching the checkpoint.
    pub async fn replay_revision(&self, number: i64) -> Result<RevisionOutcome, ReplayError> {
        let text = self
            .svn
            .log_entry(self.config.root(), LogQuery::At(number))
            .await
            .map_err(|source| ReplayError::WorkingTreeOperation {
                revision: number,
                source,
            })?;
        let revision = parse_log_entry(&text, self.identities)?;

        // Rebuilding from scratch saves working out which externals went away.
        if self.config.externals && self.externals_changed(number).await? {
            warn!(revision = number, "externals changed, rebuilding the working tree");
            worktree::wipe_content(&self.workdir)?;
        }

        if self.update_root(number).await? == RootUpdate::Ignored {
            return Ok(RevisionOutcome::Ignored);
        }

        if self.config.externals {
            let reconciler =
                ExternalsReconciler::new(self.svn, self.config.root(), &self.config.remotes);
            let handled = reconciler.reconcile(&self.workdir, number).await?;
            debug!(revision = number, externals = handled, "externals reconciled");
        }

        self.sink.stage_all()?;
        let message = self.formatter.format(&revision);
        Ok(match self.sink.commit(&revision, &message)? {
            Some(sha) => RevisionOutcome::Committed(sha),
            None => RevisionOutcome::NothingToCommit,
        })
    }

    /// Whether revision `number` touched any `svn:externals` property. A
    /// diff that does not finish in time counts as a change.
    async fn externals_changed(&self, number: i64) -> Result<bool, ReplayError> {
        match self.svn.revision_diff(self.config.root(), number).await {
            Ok(diff) => Ok(diff_touches_externals(&diff)),
            Err(e) if e.is_timeout() => {
                warn!(revision = number, error = %e, "diff timed out, assuming externals changed");
                Ok(true)
            }
            Err(source) => Err(ReplayError::WorkingTreeOperation {
                revision: number,
                source,
            }),
        }
    }

    /// Bring the root working copy to `number`, wiping and retrying once on
    /// a tree conflict.
    async fn update_root(&self, number: i64) -> Result<RootUpdate, ReplayError> {
        let err = match self.switch_or_checkout(number).await {
            Ok(()) => return Ok(RootUpdate::Updated),
            Err(e) => e,
        };
        if err.is_location_not_found() {
            return Ok(self.ancestry_gap(number));
        }
        if !err.is_tree_conflict() {
            return Err(ReplayError::WorkingTreeOperation {
                revision: number,
                source: err,
            });
        }

        warn!(revision = number, "tree conflict, wiping the working tree and retrying");
        worktree::wipe_content(&self.workdir)?;
        match self.switch_or_checkout(number).await {
            Ok(()) => Ok(RootUpdate::Updated),
            Err(e) if e.is_location_not_found() => Ok(self.ancestry_gap(number)),
            Err(e) if e.is_tree_conflict() => Err(ReplayError::TreeConflict {
                revision: number,
                source: e,
            }),
            Err(source) => Err(ReplayError::WorkingTreeOperation {
                revision: number,
                source,
            }),
        }
    }

    fn ancestry_gap(&self, number: i64) -> RootUpdate {
        warn!(
            revision = number,
            url = %self.repo_url,
            "operative-revision ancestry has a gap here, ignoring this revision"
        );
        RootUpdate::Ignored
    }

    async fn switch_or_checkout(&self, number: i64) -> Result<(), SvnError> {
        if self.workdir.join(".svn").exists() {
            self.svn
                .switch(
                    &self.workdir,
                    &self.repo_url,
                    number,
                    None,
                    SwitchMode::AcceptTheirs,
                )
                .await
        } else {
            self.svn
                .checkout(&self.repo_url, number, None, &self.workdir)
                .await
        }
    }
}
