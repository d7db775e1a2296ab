//! URL lineage of the replayed path across revisions.
//!
//! A debugging aid for paths with a branchy history: for every revision it
//! asks subversion where the path lives when addressed by operative
//! revision (`svn info -r N`) and by peg revision (`svn info URL@N`), and
//! reports the revisions at which either answer changes.

use tracing::{debug, info};

use crate::errors::{LogEntryError, ReplayError, SvnError};
use crate::svn::{HistorySource, LogQuery, SvnInfo};

/// Stand-in URL for a revision at which the path does not exist.
pub const NOT_PRESENT: &str = "Not present in repo";

/// Which lookup an [`AncestryEvent`] line comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    Operative,
    Peg,
}

impl Lookup {
    fn tag(self) -> &'static str {
        match self {
            Self::Operative => "r",
            Self::Peg => "p",
        }
    }
}

/// One revision at which the URL of the path changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AncestryEvent {
    pub revision: i64,
    /// Changed lookups with their new URL, operative first.
    pub changes: Vec<(Lookup, String)>,
    /// Raw `svn log` text of the revision, when it could be fetched.
    pub log: Option<String>,
}

impl AncestryEvent {
    /// Report lines, `####\t<N> r:\t<url>` and `####\t<N> p:\t<url>`.
    pub fn lines(&self) -> Vec<String> {
        self.changes
            .iter()
            .map(|(lookup, url)| format!("####\t{} {}:\t{}", self.revision, lookup.tag(), url))
            .collect()
    }
}

/// Trace the URL of `repo_url` from revision 0 to its youngest revision.
pub async fn trace<S: HistorySource>(
    svn: &S,
    root_url: &str,
    repo_url: &str,
) -> Result<Vec<AncestryEvent>, ReplayError> {
    let last_text = svn
        .log_entry(repo_url, LogQuery::Last)
        .await
        .map_err(ReplayError::History)?;
    let last = log_revision_number(&last_text)
        .ok_or_else(|| LogEntryError::Malformed(last_text.clone()))?;
    info!(repo = repo_url, from = last, to = 0, "tracing ancestry");

    let mut events = Vec::new();
    let mut prev_rev_url = String::new();
    let mut prev_peg_url = String::new();

    for revision in 0..=last {
        let mut changes = Vec::new();

        let by_rev = url_or_absent(svn.url_info(repo_url, Some(revision), None).await)?;
        if by_rev != prev_rev_url {
            changes.push((Lookup::Operative, by_rev.clone()));
            prev_rev_url = by_rev;
        }

        let by_peg = url_or_absent(svn.url_info(repo_url, None, Some(revision)).await)?;
        if by_peg != prev_peg_url {
            changes.push((Lookup::Peg, by_peg.clone()));
            prev_peg_url = by_peg;
        }

        if changes.is_empty() {
            continue;
        }
        let log = match svn.log_entry(root_url, LogQuery::At(revision)).await {
            Ok(text) => Some(text),
            Err(e) => {
                debug!(revision, error = %e, "no log for revision");
                None
            }
        };
        events.push(AncestryEvent {
            revision,
            changes,
            log,
        });
    }
    Ok(events)
}

fn url_or_absent(result: Result<SvnInfo, SvnError>) -> Result<String, ReplayError> {
    match result {
        Ok(info) => Ok(info.url().map_err(ReplayError::History)?.to_string()),
        Err(e) if e.is_missing_path() => Ok(NOT_PRESENT.to_string()),
        Err(e) => Err(ReplayError::History(e)),
    }
}

/// Revision number from the header of raw `svn log` text, without mapping
/// the author.
fn log_revision_number(text: &str) -> Option<i64> {
    text.lines()
        .map(str::trim)
        .find(|line| line.starts_with('r'))
        .and_then(|line| line.split(" | ").next())
        .and_then(|field| field.strip_prefix('r'))
        .and_then(|n| n.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::svn::fake::FakeSvn;

    const APP: &str = "file:///svn/trunk/app";

    #[test]
    fn test_log_revision_number() {
        let text = "-----\nr17 | somebody-unmapped | 2020-01-01 10:00:00 -0700 (Wed, 01 Jan 2020) | 1 line\n\nx\n-----\n";
        assert_eq!(log_revision_number(text), Some(17));
        assert_eq!(log_revision_number("garbage"), None);
    }

    #[test]
    fn test_event_lines() {
        let event = AncestryEvent {
            revision: 4,
            changes: vec![
                (Lookup::Operative, APP.to_string()),
                (Lookup::Peg, NOT_PRESENT.to_string()),
            ],
            log: None,
        };
        assert_eq!(
            event.lines(),
            vec![
                format!("####\t4 r:\t{}", APP),
                "####\t4 p:\tNot present in repo".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_trace_reports_changes_only() {
        let mut svn = FakeSvn::new();
        svn.dir(APP, 2, &[("a", "a")])
            .delete(APP, 4)
            .dir(APP, 5, &[("a", "b")])
            .log(2, "alice", "create")
            .log(4, "alice", "remove")
            .log(5, "alice", "restore");

        let events = trace(&svn, "file:///svn", APP).await.unwrap();
        let revisions: Vec<i64> = events.iter().map(|e| e.revision).collect();
        assert_eq!(revisions, vec![0, 2, 4, 5]);

        assert_eq!(events[0].changes[0], (Lookup::Operative, NOT_PRESENT.to_string()));
        assert_eq!(events[1].changes[0], (Lookup::Operative, APP.to_string()));
        assert!(events[1].log.as_deref().unwrap().contains("create"));
        // Revision 0 has no log entry in the fake.
        assert!(events[0].log.is_none());
    }
}
