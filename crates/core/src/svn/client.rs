//! Asynchronous SVN CLI client.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

use super::parser::{parse_svn_info, SvnInfo};
use super::{HistorySource, LogQuery, SwitchMode, WorkingCopy};
use crate::config::SvnAuthConfig;
use crate::errors::SvnError;

/// Warning printed by `svn propget` when the property is absent.
const PROPERTY_NOT_FOUND: &str = "W200017";

/// Asynchronous client for a subversion repository via the `svn` CLI.
#[derive(Debug, Clone)]
pub struct SvnClient {
    username: Option<String>,
    password: Option<String>,
    diff_timeout: Duration,
}

impl SvnClient {
    /// Create a client. `diff_timeout` bounds [`HistorySource::revision_diff`].
    pub fn new(auth: &SvnAuthConfig, diff_timeout: Duration) -> Self {
        let client = Self {
            username: auth.username.clone(),
            password: auth.password.clone(),
            diff_timeout,
        };
        info!(
            username = client.username.as_deref().unwrap_or("<default>"),
            diff_timeout_secs = diff_timeout.as_secs(),
            "created SvnClient"
        );
        client
    }

    async fn run_svn(
        &self,
        dir: Option<&Path>,
        args: &[&str],
        timeout: Option<Duration>,
    ) -> Result<String, SvnError> {
        let mut cmd = Command::new("svn");
        if let Some(dir) = dir {
            cmd.current_dir(dir);
        }
        cmd.args(args).arg("--non-interactive");
        if let Some(username) = &self.username {
            cmd.arg("--username").arg(username);
        }
        if let Some(password) = &self.password {
            cmd.arg("--password").arg(password).arg("--no-auth-cache");
        }
        cmd.stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let command_line = format!("svn {}", args.join(" "));
        debug!(cmd = %command_line, "running svn command");

        let output = match timeout {
            Some(limit) => match tokio::time::timeout(limit, cmd.output()).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(cmd = %command_line, secs = limit.as_secs(), "svn command timed out");
                    return Err(SvnError::Timeout {
                        command: command_line,
                        seconds: limit.as_secs(),
                    });
                }
            },
            None => cmd.output().await,
        }
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SvnError::BinaryNotFound("svn".into())
            } else {
                SvnError::IoError(e)
            }
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            let exit_code = output.status.code().unwrap_or(-1);
            debug!(exit_code, %stderr, "svn command failed");
            return Err(SvnError::CommandFailed { exit_code, stderr });
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

/// `url@peg`, or `url@` when the URL itself contains an `@` that svn would
/// otherwise read as a peg separator.
fn pegged(url: &str, peg: Option<i64>) -> String {
    match peg {
        Some(peg) => format!("{}@{}", url, peg),
        None if url.contains('@') => format!("{}@", url),
        None => url.to_string(),
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

impl HistorySource for SvnClient {
    #[instrument(skip(self))]
    async fn log_entry(&self, target: &str, query: LogQuery) -> Result<String, SvnError> {
        let target = pegged(target, None);
        match query {
            LogQuery::First => {
                self.run_svn(None, &["log", "-r0:HEAD", "--limit", "1", &target], None)
                    .await
            }
            LogQuery::Last => {
                self.run_svn(None, &["log", "--limit", "1", &target], None)
                    .await
            }
            LogQuery::At(rev) => {
                let rev = rev.to_string();
                self.run_svn(None, &["log", "-r", &rev, "--limit", "1", &target], None)
                    .await
            }
        }
    }

    #[instrument(skip(self))]
    async fn url_info(
        &self,
        url: &str,
        rev: Option<i64>,
        peg: Option<i64>,
    ) -> Result<SvnInfo, SvnError> {
        let target = pegged(url, peg);
        let output = match rev {
            Some(rev) => {
                let rev = rev.to_string();
                self.run_svn(None, &["info", "-r", &rev, &target], None)
                    .await?
            }
            None => self.run_svn(None, &["info", &target], None).await?,
        };
        Ok(parse_svn_info(&output))
    }

    #[instrument(skip(self), fields(wc = %wc.display()))]
    async fn wc_info(&self, wc: &Path) -> Result<SvnInfo, SvnError> {
        let output = self.run_svn(Some(wc), &["info"], None).await?;
        Ok(parse_svn_info(&output))
    }

    #[instrument(skip(self), fields(wc = %wc.display()))]
    async fn externals_property(&self, wc: &Path, rev: i64) -> Result<String, SvnError> {
        let rev = rev.to_string();
        match self
            .run_svn(
                Some(wc),
                &["propget", "svn:externals", "-r", &rev, "-R", "."],
                None,
            )
            .await
        {
            Err(SvnError::CommandFailed { stderr, .. }) if stderr.contains(PROPERTY_NOT_FOUND) => {
                Ok(String::new())
            }
            other => other,
        }
    }

    #[instrument(skip(self))]
    async fn revision_diff(&self, url: &str, rev: i64) -> Result<String, SvnError> {
        let rev = rev.to_string();
        let target = pegged(url, None);
        self.run_svn(None, &["diff", "-c", &rev, &target], Some(self.diff_timeout))
            .await
    }
}

impl WorkingCopy for SvnClient {
    #[instrument(skip(self), fields(dest = %dest.display()))]
    async fn checkout(
        &self,
        url: &str,
        rev: i64,
        peg: Option<i64>,
        dest: &Path,
    ) -> Result<(), SvnError> {
        let rev_str = rev.to_string();
        let target = pegged(url, peg);
        let dest_str = path_arg(dest);
        let output = self
            .run_svn(
                None,
                &[
                    "checkout",
                    "--ignore-externals",
                    "-r",
                    &rev_str,
                    &target,
                    &dest_str,
                ],
                None,
            )
            .await?;
        debug!(lines = output.lines().count(), "svn checkout output");
        info!(url, rev, "svn checkout completed");
        Ok(())
    }

    #[instrument(skip(self), fields(wc = %wc.display()))]
    async fn switch(
        &self,
        wc: &Path,
        url: &str,
        rev: i64,
        peg: Option<i64>,
        mode: SwitchMode,
    ) -> Result<(), SvnError> {
        let rev_str = rev.to_string();
        let target = pegged(url, peg);
        let wc_str = path_arg(wc);
        let mode_args: &[&str] = match mode {
            SwitchMode::AcceptTheirs => &["--accept", "theirs-full"],
            SwitchMode::IgnoreAncestry => &["--ignore-ancestry"],
        };
        let mut args = vec!["switch", "--ignore-externals"];
        args.extend_from_slice(mode_args);
        args.extend_from_slice(&["-r", &rev_str, &target, &wc_str]);

        let output = self.run_svn(None, &args, None).await?;
        if !output.trim().starts_with("At revision") {
            debug!(output = %output.trim(), "svn switch changed files");
        }
        Ok(())
    }

    #[instrument(skip(self), fields(dest = %dest.display()))]
    async fn export(&self, url: &str, rev: i64, peg: i64, dest: &Path) -> Result<(), SvnError> {
        let rev_str = rev.to_string();
        let target = pegged(url, Some(peg));
        let dest_str = path_arg(dest);
        self.run_svn(
            None,
            &["export", "--force", "-r", &rev_str, &target, &dest_str],
            None,
        )
        .await?;
        info!(url, rev, peg, "svn export completed");
        Ok(())
    }
}
