//! svnreplay: replay a subversion repository's history, externals
//! included, into a git repository with one commit per revision.
//!
//! The run can be interrupted with Ctrl+C and resumed later; progress is
//! kept in `<target>/.git/info/progress`.

mod signals;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use svnreplay_core::ancestry;
use svnreplay_core::{GitClient, IdentityMap, ReplayConfig, Replayer, SvnClient};

/// Replay svn history (with externals) into a git repository.
#[derive(Parser, Debug)]
#[command(name = "svnreplay", version, about)]
struct Cli {
    /// Root URL of the subversion repository (e.g. file:///srv/svn/main).
    #[arg(long)]
    root: Option<String>,

    /// Path of the replayed tree below the root (e.g. /trunk/app).
    #[arg(long)]
    repo: Option<String>,

    /// Remote repository URL mirrored locally at the root. Repeatable.
    #[arg(long = "remote", value_name = "URL")]
    remotes: Vec<String>,

    /// Identity map file [default: gitusers.txt].
    #[arg(long)]
    users: Option<String>,

    /// Print the URL lineage of the repo path across revisions and exit.
    #[arg(long)]
    ancestry: bool,

    /// Do not materialize svn:externals.
    #[arg(long)]
    no_externals: bool,

    /// Optional TOML file supplying the same settings.
    #[arg(short, long)]
    config: Option<String>,

    /// Seconds before the externals change check assumes a change.
    #[arg(long, value_name = "SECS")]
    diff_timeout: Option<u64>,

    /// Tracing filter (e.g. debug, svnreplay_core=trace).
    #[arg(long, value_name = "FILTER")]
    log_level: Option<String>,

    /// Directory of the git repository to write [default: export].
    target: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match build_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    // --log-level, then RUST_LOG, then the config file.
    let filter = match &cli.log_level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let result = if cli.ancestry {
        cmd_ancestry(&config).await
    } else {
        cmd_replay(&config).await
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Merge the optional config file with command-line flags, which win.
fn build_config(cli: &Cli) -> Result<ReplayConfig> {
    let mut config = match &cli.config {
        Some(path) => ReplayConfig::load_from_file(expand_tilde(path))
            .context("failed to load configuration file")?,
        None => ReplayConfig::default(),
    };

    if let Some(root) = &cli.root {
        config.root_url = root.clone();
    }
    if let Some(repo) = &cli.repo {
        config.repo = repo.clone();
    }
    if !cli.remotes.is_empty() {
        config.remotes = cli.remotes.clone();
    }
    if let Some(users) = &cli.users {
        config.users_file = PathBuf::from(expand_tilde(users));
    }
    if cli.no_externals {
        config.externals = false;
    }
    if let Some(secs) = cli.diff_timeout {
        config.diff_timeout_secs = secs;
    }
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    if let Some(target) = &cli.target {
        config.target_dir = target.clone();
    }

    config
        .resolve_env_vars()
        .context("failed to resolve environment variables")?;
    config.validate().context("invalid configuration")?;
    Ok(config)
}

async fn cmd_replay(config: &ReplayConfig) -> Result<()> {
    let identities = IdentityMap::load(&config.users_file).with_context(|| {
        format!(
            "failed to load identity map from {}",
            config.users_file.display()
        )
    })?;
    info!(users = identities.len(), "loaded identity map");

    let svn = SvnClient::new(&config.svn, config.diff_timeout());
    let git = GitClient::init_or_open(&config.target_dir).with_context(|| {
        format!(
            "failed to open git repository at {}",
            config.target_dir.display()
        )
    })?;

    info!(
        repo = %config.repo_url(),
        target = %config.target_dir.display(),
        externals = config.externals,
        "converting"
    );

    let shutdown = signals::setup_signal_handlers();
    let replayer = Replayer::new(&svn, &git, config, &identities);
    let stats = replayer.run(&shutdown).await.context("replay failed")?;

    if stats.interrupted {
        let last = replayer.checkpoint().load()?;
        println!(
            "Interrupted after {} commits; progress saved at revision {}.",
            stats.committed,
            last.map(|r| r.to_string()).unwrap_or_else(|| "none".into())
        );
    } else {
        println!(
            "Completed conversion of {} to {}: {} commits, {} unchanged, {} ignored.",
            config.repo_url(),
            config.target_dir.display(),
            stats.committed,
            stats.unchanged,
            stats.ignored
        );
    }
    Ok(())
}

async fn cmd_ancestry(config: &ReplayConfig) -> Result<()> {
    let svn = SvnClient::new(&config.svn, config.diff_timeout());
    let repo_url = config.repo_url();

    let events = ancestry::trace(&svn, config.root(), &repo_url)
        .await
        .context("failed to trace ancestry")?;

    println!("-- Ancestry for {} --", repo_url);
    for event in &events {
        for line in event.lines() {
            println!("{}", line);
        }
        if let Some(log) = &event.log {
            print!("{}", log);
        }
    }
    Ok(())
}

/// Expand `~` to the user's home directory.
fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return format!("{}/{}", home.display(), rest);
        }
    }
    path.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("svnreplay").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_flags_build_config() {
        let cli = parse(&[
            "--root",
            "file:///srv/svn/main",
            "--repo",
            "/trunk/app",
            "--remote",
            "https://a.example.com/svn",
            "--remote",
            "https://b.example.com/svn",
            "--no-externals",
            "--diff-timeout",
            "30",
            "out",
        ]);
        let config = build_config(&cli).unwrap();
        assert_eq!(config.repo_url(), "file:///srv/svn/main/trunk/app");
        assert_eq!(config.remotes.len(), 2);
        assert!(!config.externals);
        assert_eq!(config.diff_timeout_secs, 30);
        assert_eq!(config.target_dir, PathBuf::from("out"));
        assert_eq!(config.users_file, PathBuf::from("gitusers.txt"));
    }

    #[test]
    fn test_missing_root_is_rejected() {
        let cli = parse(&["--repo", "/trunk"]);
        assert!(build_config(&cli).is_err());
    }

    #[test]
    fn test_flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("replay.toml");
        std::fs::write(
            &path,
            r#"
root_url = "file:///srv/svn/main"
repo = "/trunk/old"
target_dir = "from-file"
externals = false
"#,
        )
        .unwrap();

        let path_str = path.to_string_lossy().to_string();
        let cli = parse(&["--config", &path_str, "--repo", "/trunk/new"]);
        let config = build_config(&cli).unwrap();
        assert_eq!(config.repo, "/trunk/new");
        assert_eq!(config.target_dir, PathBuf::from("from-file"));
        assert!(!config.externals);
    }

    #[test]
    fn test_expand_tilde() {
        assert_eq!(expand_tilde("/abs/path"), "/abs/path");
        if let Some(home) = dirs::home_dir() {
            assert_eq!(
                expand_tilde("~/users.txt"),
                format!("{}/users.txt", home.display())
            );
        }
    }
}
