//! TOML-based configuration for svnreplay.
//!
//! Every setting can come from an optional config file; the command line
//! overrides whatever the file provides. The SVN password is never stored
//! in the file itself: `svn.password_env` names the environment variable
//! that holds it, resolved at runtime via [`ReplayConfig::resolve_env_vars`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::ConfigError;

/// Placeholder that must appear in [`ReplayConfig::commit_template`].
pub const MESSAGE_PLACEHOLDER: &str = "{original_message}";

/// Top-level replay configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayConfig {
    /// Root URL of the subversion repository (e.g. `file:///srv/svn/main`).
    #[serde(default)]
    pub root_url: String,

    /// Path of the replayed tree below the root (e.g. `/trunk/src/app`).
    #[serde(default)]
    pub repo: String,

    /// Remote repository URLs mirrored locally at `root_url`. Externals
    /// pointing at one of these are fetched from the root instead.
    #[serde(default)]
    pub remotes: Vec<String>,

    /// Identity map file (`svn-user = Name <email>` per line).
    #[serde(default = "default_users_file")]
    pub users_file: PathBuf,

    /// Directory that becomes the git repository.
    #[serde(default = "default_target_dir")]
    pub target_dir: PathBuf,

    /// Materialize `svn:externals` into the replayed tree.
    #[serde(default = "default_true")]
    pub externals: bool,

    /// Seconds before the per-revision externals change check gives up and
    /// assumes the externals changed.
    #[serde(default = "default_diff_timeout")]
    pub diff_timeout_secs: u64,

    /// Minimum tracing level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Commit message template. Placeholders: `{original_message}`,
    /// `{svn_rev}`, `{svn_url}`.
    #[serde(default = "default_commit_template")]
    pub commit_template: String,

    /// Optional subversion credentials.
    #[serde(default)]
    pub svn: SvnAuthConfig,
}

/// Credentials passed to every `svn` invocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SvnAuthConfig {
    pub username: Option<String>,

    /// Environment variable holding the SVN password.
    pub password_env: Option<String>,

    /// Resolved password (populated at runtime, never serialized).
    #[serde(skip)]
    pub password: Option<String>,
}

fn default_users_file() -> PathBuf {
    PathBuf::from("gitusers.txt")
}
fn default_target_dir() -> PathBuf {
    PathBuf::from("export")
}
fn default_true() -> bool {
    true
}
fn default_diff_timeout() -> u64 {
    10
}
fn default_log_level() -> String {
    "info".into()
}
fn default_commit_template() -> String {
    "{original_message}\n\nExported from rev {svn_rev} {svn_url}".into()
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            root_url: String::new(),
            repo: String::new(),
            remotes: Vec::new(),
            users_file: default_users_file(),
            target_dir: default_target_dir(),
            externals: default_true(),
            diff_timeout_secs: default_diff_timeout(),
            log_level: default_log_level(),
            commit_template: default_commit_template(),
            svn: SvnAuthConfig::default(),
        }
    }
}

impl ReplayConfig {
    /// Load configuration from a TOML file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        debug!(root = %config.root_url, repo = %config.repo, "parsed configuration");
        Ok(config)
    }

    /// Resolve `svn.password_env` into `svn.password`.
    pub fn resolve_env_vars(&mut self) -> Result<(), ConfigError> {
        if let Some(var) = self.svn.password_env.as_deref() {
            match std::env::var(var) {
                Ok(val) if !val.is_empty() => {
                    debug!(env_name = var, "resolved svn password");
                    self.svn.password = Some(val);
                }
                Ok(_) => warn!(env_name = var, "svn password env var is set but empty"),
                Err(_) => warn!(env_name = var, "svn password env var not set"),
            }
        }
        Ok(())
    }

    /// Validate that all required fields are present and sane.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.root_url.trim().is_empty() {
            return Err(ConfigError::Missing("root".into()));
        }
        if !self.root_url.contains("://") {
            return Err(ConfigError::InvalidValue {
                field: "root".into(),
                detail: format!("'{}' is not a URL", self.root_url),
            });
        }
        if self.repo.trim().is_empty() {
            return Err(ConfigError::Missing("repo".into()));
        }
        for remote in &self.remotes {
            if !remote.contains("://") {
                return Err(ConfigError::InvalidValue {
                    field: "remote".into(),
                    detail: format!("'{}' is not a URL", remote),
                });
            }
        }
        if self.diff_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "diff_timeout_secs".into(),
                detail: "timeout must be > 0".into(),
            });
        }
        if !self.commit_template.contains(MESSAGE_PLACEHOLDER) {
            return Err(ConfigError::InvalidValue {
                field: "commit_template".into(),
                detail: format!("template must contain {}", MESSAGE_PLACEHOLDER),
            });
        }
        Ok(())
    }

    /// Root URL without a trailing slash.
    pub fn root(&self) -> &str {
        self.root_url.trim_end_matches('/')
    }

    /// Full URL of the replayed tree: root URL joined with the repo path.
    pub fn repo_url(&self) -> String {
        let repo = self.repo.trim_matches('/');
        if repo.is_empty() {
            self.root().to_string()
        } else {
            format!("{}/{}", self.root(), repo)
        }
    }

    pub fn diff_timeout(&self) -> Duration {
        Duration::from_secs(self.diff_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_toml() -> &'static str {
        r#"
root_url = "file:///srv/svn/main"
repo = "/trunk/src/app/"
remotes = ["https://svn.example.com/main"]
users_file = "authors.txt"
target_dir = "out"
externals = false
diff_timeout_secs = 30

[svn]
username = "builder"
password_env = "SVNREPLAY_TEST_PASSWORD_UNSET"
"#
    }

    #[test]
    fn test_parse_full_config() {
        let config = ReplayConfig::from_toml(sample_toml()).unwrap();
        assert_eq!(config.root_url, "file:///srv/svn/main");
        assert_eq!(config.remotes.len(), 1);
        assert_eq!(config.users_file, PathBuf::from("authors.txt"));
        assert!(!config.externals);
        assert_eq!(config.diff_timeout(), Duration::from_secs(30));
        assert_eq!(config.svn.username.as_deref(), Some("builder"));
        config.validate().unwrap();
    }

    #[test]
    fn test_defaults() {
        let config = ReplayConfig::from_toml("root_url = \"file:///r\"\nrepo = \"trunk\"").unwrap();
        assert_eq!(config.users_file, PathBuf::from("gitusers.txt"));
        assert_eq!(config.target_dir, PathBuf::from("export"));
        assert!(config.externals);
        assert_eq!(config.diff_timeout_secs, 10);
        assert!(config.commit_template.contains(MESSAGE_PLACEHOLDER));
    }

    #[test]
    fn test_repo_url_joins_with_single_slash() {
        let mut config = ReplayConfig {
            root_url: "file:///srv/svn/main/".into(),
            repo: "/trunk/src/app/".into(),
            ..Default::default()
        };
        assert_eq!(config.repo_url(), "file:///srv/svn/main/trunk/src/app");

        config.repo = "/".into();
        assert_eq!(config.repo_url(), "file:///srv/svn/main");
    }

    #[test]
    fn test_validate_rejects_missing_root() {
        let config = ReplayConfig {
            repo: "trunk".into(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Missing(ref f)) if f == "root"));
    }

    #[test]
    fn test_validate_rejects_relative_root() {
        let config = ReplayConfig {
            root_url: "/srv/svn".into(),
            repo: "trunk".into(),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let config = ReplayConfig {
            root_url: "file:///r".into(),
            repo: "trunk".into(),
            diff_timeout_secs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_template_without_message() {
        let config = ReplayConfig {
            root_url: "file:///r".into(),
            repo: "trunk".into(),
            commit_template: "r{svn_rev}".into(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_file_not_found() {
        let result = ReplayConfig::load_from_file("/nonexistent/svnreplay.toml");
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_resolve_env_vars_leaves_password_unset() {
        let mut config = ReplayConfig::from_toml(sample_toml()).unwrap();
        config.resolve_env_vars().unwrap();
        assert!(config.svn.password.is_none());
    }
}
