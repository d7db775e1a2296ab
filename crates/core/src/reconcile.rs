//! Drives a working copy's externals toward what its `svn:externals`
//! property says at the revision the working copy is bound to.
//!
//! For every definition found in the property dump of a working copy:
//!
//! - a broken reference is removed and never fetched;
//! - a directory is checked out (or switched, when it is already a working
//!   copy) and then reconciled recursively;
//! - a file is exported flat, replacing whatever file was there.
//!
//! Nothing here changes the process working directory; every subversion
//! call gets the directory it operates on.

use std::path::Path;

use tracing::{debug, info, warn};

use crate::errors::{ReplayError, SvnError};
use crate::models::{ExternalKind, ExternalReference};
use crate::svn::externals::{self, ExternalsContext, ExternalsParser};
use crate::svn::{HistorySource, SwitchMode, WorkingCopy};
use crate::worktree;

/// Reconciles the externals of a working copy tree.
pub struct ExternalsReconciler<'a, S> {
    svn: &'a S,
    root_url: &'a str,
    remotes: &'a [String],
}

impl<'a, S> ExternalsReconciler<'a, S>
where
    S: HistorySource + WorkingCopy,
{
    pub fn new(svn: &'a S, root_url: &'a str, remotes: &'a [String]) -> Self {
        Self {
            svn,
            root_url,
            remotes,
        }
    }

    /// Reconcile the externals of `wc` and, depth-first, of every directory
    /// external below it. `top_rev` fills in revisions a definition leaves
    /// out. Returns the number of references handled.
    pub async fn reconcile(&self, wc: &Path, top_rev: i64) -> Result<usize, ReplayError> {
        let svn_err = |source: SvnError| ReplayError::WorkingTreeOperation {
            revision: top_rev,
            source,
        };

        let info = self.svn.wc_info(wc).await.map_err(svn_err)?;
        let base_url = info.url().map_err(svn_err)?.to_string();
        // A pinned external carries the nested definitions of its own revision.
        let wc_rev = info.revision().map_err(svn_err)?;
        let text = self
            .svn
            .externals_property(wc, wc_rev)
            .await
            .map_err(svn_err)?;

        let ctx = ExternalsContext {
            base_url: &base_url,
            root_url: self.root_url,
            remotes: self.remotes,
            top_level_rev: top_rev,
        };

        let mut handled = 0;
        for definition in ExternalsParser::new(&text, ctx) {
            let reference = externals::resolve(self.svn, definition?).await?;
            handled += self.apply(wc, &reference, top_rev).await?;
        }
        Ok(handled)
    }

    async fn apply(
        &self,
        wc: &Path,
        reference: &ExternalReference,
        top_rev: i64,
    ) -> Result<usize, ReplayError> {
        let svn_err = |source: SvnError| ReplayError::WorkingTreeOperation {
            revision: top_rev,
            source,
        };
        let target = wc.join(&reference.local_path);

        match reference.kind {
            ExternalKind::Broken => {
                warn!(path = %target.display(), url = %reference.url, "removing broken external");
                worktree::remove_path(&target)?;
                Ok(1)
            }
            ExternalKind::Directory => {
                std::fs::create_dir_all(&target).map_err(|e| ReplayError::fs(&target, e))?;
                self.fetch_directory(&target, reference)
                    .await
                    .map_err(svn_err)?;
                let nested = Box::pin(self.reconcile(&target, top_rev)).await?;
                Ok(1 + nested)
            }
            ExternalKind::File => {
                if target.is_file() || target.is_symlink() {
                    worktree::remove_path(&target)?;
                }
                if let Some(parent) = target.parent() {
                    std::fs::create_dir_all(parent).map_err(|e| ReplayError::fs(parent, e))?;
                }
                self.svn
                    .export(
                        &reference.url,
                        reference.operative_rev,
                        reference.peg_rev,
                        &target,
                    )
                    .await
                    .map_err(svn_err)?;
                debug!(path = %target.display(), url = %reference.url, "exported file external");
                Ok(1)
            }
        }
    }

    /// Check out a directory external, or switch it when `target` is already
    /// a working copy.
    async fn fetch_directory(
        &self,
        target: &Path,
        reference: &ExternalReference,
    ) -> Result<(), SvnError> {
        let url = reference.url.as_str();
        let (rev, peg) = (reference.operative_rev, reference.peg_rev);

        if !target.join(".svn").exists() {
            match self.svn.checkout(url, rev, Some(peg), target).await {
                Ok(()) => {
                    info!(path = %target.display(), url, rev, peg, "checked out external");
                    return Ok(());
                }
                Err(e) if e.is_wrong_url_working_copy() => {
                    warn!(
                        path = %target.display(),
                        url,
                        "working copy / external conflict, switching instead"
                    );
                }
                Err(e) => return Err(e),
            }
        }

        self.svn
            .switch(target, url, rev, Some(peg), SwitchMode::IgnoreAncestry)
            .await?;
        debug!(path = %target.display(), url, rev, peg, "switched external");
        Ok(())
    }
}
