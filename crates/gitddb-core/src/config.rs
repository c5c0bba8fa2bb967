//! Database and remote configuration (`gitddb.toml`).

use std::fmt;
use std::path::Path;

use serde::Deserialize;

// ---------------------------------------------------------------------------
// DatabaseOptions
// ---------------------------------------------------------------------------

/// Top-level database configuration, parsed from a `gitddb.toml` file.
///
/// Missing fields use sensible defaults; a missing file is not an error.
#[derive(Clone, Debug, PartialEq, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct DatabaseOptions {
    /// Human-readable database name. Required on first creation.
    pub db_name: Option<String>,

    /// The default branch name.
    #[serde(default = "default_branch")]
    pub default_branch: String,

    /// Author identity used for all commits, `"Name <email>"`.
    pub author: Option<String>,

    /// Committer identity, defaults to `author` when unset.
    pub committer: Option<String>,

    /// Remotes this database synchronizes with, keyed by remote name.
    #[serde(default)]
    pub remotes: std::collections::BTreeMap<String, RemoteOptions>,
}

fn default_branch() -> String {
    "main".to_owned()
}

impl DatabaseOptions {
    /// Load configuration from a TOML file, returning defaults if missing.
    ///
    /// # Errors
    /// Returns [`ConfigError`] on I/O errors (other than not-found) or parse errors.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(ConfigError {
                    path: Some(path.to_owned()),
                    message: format!("could not read file: {e}"),
                });
            }
        };
        Self::parse(&contents).map_err(|mut e| {
            e.path = Some(path.to_owned());
            e
        })
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    /// Returns [`ConfigError`] on invalid TOML or unknown fields.
    pub fn parse(toml_str: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml_str).map_err(|e| {
            let mut message = e.message().to_owned();
            if let Some(span) = e.span() {
                let line = toml_str[..span.start].chars().filter(|&c| c == '\n').count() + 1;
                message = format!("line {line}: {message}");
            }
            ConfigError { path: None, message }
        })
    }
}

// ---------------------------------------------------------------------------
// RemoteOptions
// ---------------------------------------------------------------------------

/// Per-remote synchronization settings.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RemoteOptions {
    /// The remote's URL.
    pub remote_url: String,

    /// Which direction(s) this remote synchronizes.
    #[serde(default)]
    pub sync_direction: SyncDirection,

    /// Authentication method for this remote.
    #[serde(default)]
    pub connection: Connection,

    /// Whether to run sync automatically on a timer (`live` sync).
    #[serde(default)]
    pub live: bool,

    /// Interval between live sync ticks, in milliseconds.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Maximum retry attempts for a transient sync/push failure.
    #[serde(default = "default_retry")]
    pub retry: u32,

    /// Delay between retries, in milliseconds.
    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,

    /// Conflict resolution strategy used during three-way merge.
    #[serde(default)]
    pub conflict_resolution_strategy: ConflictResolutionStrategy,

    /// Recovery strategy when no merge base exists between local and remote.
    #[serde(default)]
    pub combine_db_strategy: CombineDbStrategy,

    /// Whether sync results should include the full commit list.
    #[serde(default)]
    pub include_commits: bool,
}

impl RemoteOptions {
    /// The minimum allowed live-sync interval.
    pub const MIN_INTERVAL_MS: u64 = 1000;

    /// Validate the interval/retry relationship invariants from the spec:
    /// `interval > retryInterval`, and `interval >= MIN_INTERVAL_MS`.
    ///
    /// # Errors
    /// Returns [`crate::error::GitDdbError::IntervalTooSmall`] or
    /// [`crate::error::GitDdbError::SyncIntervalLessThanOrEqualToRetryInterval`].
    pub fn validate(&self) -> Result<(), crate::error::GitDdbError> {
        if self.live && self.interval_ms < Self::MIN_INTERVAL_MS {
            return Err(crate::error::GitDdbError::IntervalTooSmall {
                interval_ms: self.interval_ms,
                minimum_ms: Self::MIN_INTERVAL_MS,
            });
        }
        if self.interval_ms <= self.retry_interval_ms {
            return Err(crate::error::GitDdbError::SyncIntervalLessThanOrEqualToRetryInterval {
                interval_ms: self.interval_ms,
                retry_interval_ms: self.retry_interval_ms,
            });
        }
        Ok(())
    }
}

fn default_interval_ms() -> u64 {
    10_000
}

fn default_retry() -> u32 {
    2
}

fn default_retry_interval_ms() -> u64 {
    2_000
}

/// Which direction(s) a remote synchronizes in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncDirection {
    /// Only fetch and merge from the remote; never push.
    Pull,
    /// Only push to the remote; never fetch.
    Push,
    /// Both fetch and push.
    #[default]
    Both,
}

/// Remote authentication configuration.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "kind")]
pub enum Connection {
    /// No authentication (public remote, or local filesystem).
    #[default]
    None,
    /// HTTPS with a personal access token.
    Github {
        /// The personal access token.
        pat: String,
        /// Whether the remote repository is private.
        #[serde(default)]
        private: bool,
    },
    /// SSH key pair authentication.
    Ssh {
        /// Path to the public key.
        public_key_path: std::path::PathBuf,
        /// Path to the private key.
        private_key_path: std::path::PathBuf,
        /// Optional passphrase for the private key.
        passphrase: Option<String>,
    },
}

/// Strategy used to resolve concurrent edits during three-way merge.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictResolutionStrategy {
    /// Prefer the local diff wholesale on scalar conflicts.
    Ours,
    /// Prefer the remote diff wholesale on scalar conflicts.
    Theirs,
    /// Prefer local on scalar conflicts; update wins over concurrent remove.
    #[default]
    OursDiff,
    /// Prefer remote on scalar conflicts.
    TheirsDiff,
}

/// Recovery strategy when local and remote share no merge base.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CombineDbStrategy {
    /// Refuse to combine; surface [`crate::error::GitDdbError::NoMergeBaseFound`].
    #[default]
    ThrowError,
    /// Combine, keeping local HEAD as the base and folding in theirs.
    CombineHeadWithTheirs,
    /// Discard remote history, keep local as-is.
    ReplaceWithOurs,
    /// Discard local history, replace with remote.
    ReplaceWithTheirs,
}

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Error loading or parsing a gitddb configuration file.
#[derive(Debug)]
pub struct ConfigError {
    /// The path that was being loaded, if known.
    pub path: Option<std::path::PathBuf>,
    /// Human-readable message, including a line number when available.
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(p) = &self.path {
            write!(f, "{}: {}", p.display(), self.message)
        } else {
            write!(f, "config error: {}", self.message)
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for crate::error::GitDdbError {
    fn from(err: ConfigError) -> Self {
        Self::CannotOpenRepository {
            path: err.path.unwrap_or_default(),
            message: err.message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = DatabaseOptions::default();
        assert_eq!(cfg.default_branch, "");
    }

    #[test]
    fn parse_empty_uses_defaults_for_branch() {
        let cfg = DatabaseOptions::parse("").unwrap();
        assert_eq!(cfg.default_branch, "main");
    }

    #[test]
    fn parse_remote_block() {
        let toml = r#"
db_name = "notes"

[remotes.origin]
remote_url = "https://example.com/notes.git"
sync_direction = "both"
live = true
interval_ms = 30000
retry_interval_ms = 2000
conflict_resolution_strategy = "ours-diff"
"#;
        let cfg = DatabaseOptions::parse(toml).unwrap();
        assert_eq!(cfg.db_name.as_deref(), Some("notes"));
        let origin = &cfg.remotes["origin"];
        assert_eq!(origin.remote_url, "https://example.com/notes.git");
        assert_eq!(origin.sync_direction, SyncDirection::Both);
        assert!(origin.live);
        origin.validate().unwrap();
    }

    #[test]
    fn validate_rejects_interval_leq_retry_interval() {
        let opts = RemoteOptions {
            remote_url: "https://example.com/x.git".to_owned(),
            sync_direction: SyncDirection::Both,
            connection: Connection::None,
            live: false,
            interval_ms: 1000,
            retry: 2,
            retry_interval_ms: 1000,
            conflict_resolution_strategy: ConflictResolutionStrategy::OursDiff,
            combine_db_strategy: CombineDbStrategy::ThrowError,
            include_commits: false,
        };
        assert!(opts.validate().is_err());
    }

    #[test]
    fn validate_rejects_too_small_live_interval() {
        let opts = RemoteOptions {
            remote_url: "https://example.com/x.git".to_owned(),
            sync_direction: SyncDirection::Both,
            connection: Connection::None,
            live: true,
            interval_ms: 500,
            retry: 2,
            retry_interval_ms: 100,
            conflict_resolution_strategy: ConflictResolutionStrategy::OursDiff,
            combine_db_strategy: CombineDbStrategy::ThrowError,
            include_commits: false,
        };
        assert!(opts.validate().is_err());
    }

    #[test]
    fn rejects_unknown_field() {
        let err = DatabaseOptions::parse("unknown_field = true").unwrap_err();
        assert!(err.message.contains("unknown field"));
    }
}
