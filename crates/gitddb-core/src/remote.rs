//! Remote engine: an abstract `{fetch, push, clone}` adapter, plus the
//! default `gitddb-git`-backed implementation that wires up the three
//! [`Connection`](crate::config::Connection) authentication kinds.
//!
//! Mirrors `gitddb_git::remote_impl`'s CLI-subprocess shape for the one
//! operation ([`RemoteEngine::clone_repo`]) that needs to run before any
//! [`GitRepo`] handle exists; `fetch`/`push` go through the trait since an
//! open repository is always available by then.

use std::path::Path;
use std::process::Command;

use gitddb_git::{GitOid, GitRepo, RefName};

use crate::config::{Connection, RemoteOptions};
use crate::error::GitDdbError;

/// An abstract adapter over git's network operations, parameterized by a
/// remote's configured authentication.
pub trait RemoteEngine: Send + Sync {
    /// Fetch `remote_ref` from `remote_name` into the local tracking ref.
    ///
    /// # Errors
    /// Returns a `GitDdbError` sync-category variant on authentication,
    /// connectivity, or git-layer failure.
    fn fetch(
        &self,
        repo: &dyn GitRepo,
        opts: &RemoteOptions,
        remote_name: &str,
        local_ref: &RefName,
        remote_ref: &RefName,
    ) -> Result<(), GitDdbError>;

    /// Push `local_ref` to `remote_ref` on `remote_name`.
    ///
    /// # Errors
    /// Returns [`GitDdbError::PushNotAllowed`] if `opts.sync_direction`
    /// forbids pushing, or a sync-category error on failure.
    fn push(
        &self,
        repo: &dyn GitRepo,
        opts: &RemoteOptions,
        remote_name: &str,
        local_ref: &RefName,
        remote_ref: &RefName,
        force: bool,
    ) -> Result<(), GitDdbError>;

    /// Clone the remote described by `opts` into `dest`, which must not yet
    /// exist.
    ///
    /// # Errors
    /// Returns a sync-category `GitDdbError` on authentication or
    /// connectivity failure.
    fn clone_repo(&self, opts: &RemoteOptions, dest: &Path) -> Result<(), GitDdbError>;
}

/// The default [`RemoteEngine`], backed by the system `git` binary via
/// [`GitRepo`]'s remote methods (fetch/push) and a raw subprocess (clone,
/// which runs before any repository handle exists).
#[derive(Clone, Copy, Debug, Default)]
pub struct GitBackedRemoteEngine;

impl GitBackedRemoteEngine {
    /// Construct the default engine.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl RemoteEngine for GitBackedRemoteEngine {
    fn fetch(
        &self,
        repo: &dyn GitRepo,
        opts: &RemoteOptions,
        remote_name: &str,
        local_ref: &RefName,
        remote_ref: &RefName,
    ) -> Result<(), GitDdbError> {
        apply_connection(repo, remote_name, opts)?;
        let refspec = format!("+{remote_ref}:{local_ref}");
        repo.fetch(remote_name, std::slice::from_ref(&refspec)).map_err(|e| GitDdbError::SyncWorkerFetch { message: e.to_string() })
    }

    fn push(
        &self,
        repo: &dyn GitRepo,
        opts: &RemoteOptions,
        remote_name: &str,
        local_ref: &RefName,
        remote_ref: &RefName,
        force: bool,
    ) -> Result<(), GitDdbError> {
        if matches!(opts.sync_direction, crate::config::SyncDirection::Pull) {
            return Err(GitDdbError::PushNotAllowed);
        }
        apply_connection(repo, remote_name, opts)?;
        repo.push_branch(remote_name, local_ref.as_str(), remote_ref.as_str(), force).map_err(|e| {
            GitDdbError::RemoteRepositoryConnect { url: opts.remote_url.clone(), message: e.to_string() }
        })
    }

    fn clone_repo(&self, opts: &RemoteOptions, dest: &Path) -> Result<(), GitDdbError> {
        let url = authenticated_url(opts)?;
        let mut cmd = Command::new("git");
        cmd.arg("clone").arg(&url).arg(dest);
        if let Some(ssh_command) = ssh_command_env(opts)? {
            cmd.env("GIT_SSH_COMMAND", ssh_command);
        }
        let output = cmd.output().map_err(|e| GitDdbError::RemoteRepositoryConnect { url: opts.remote_url.clone(), message: e.to_string() })?;
        if !output.status.success() {
            return Err(GitDdbError::RemoteRepositoryNotFound { url: opts.remote_url.clone() });
        }
        Ok(())
    }
}

/// Configure `repo`'s git-level remote settings (URL, SSH command) so that a
/// subsequent `fetch`/`push_branch` call authenticates correctly.
fn apply_connection(repo: &dyn GitRepo, remote_name: &str, opts: &RemoteOptions) -> Result<(), GitDdbError> {
    let url = authenticated_url(opts)?;
    repo.write_config(&format!("remote.{remote_name}.url"), &url)?;
    if let Some(ssh_command) = ssh_command_env(opts)? {
        repo.write_config("core.sshCommand", &ssh_command)?;
    }
    Ok(())
}

/// Rewrite `opts.remote_url` to embed a personal access token, if the
/// connection calls for one. SSH connections pass the URL through verbatim
/// (authentication is carried by `core.sshCommand` instead).
fn authenticated_url(opts: &RemoteOptions) -> Result<String, GitDdbError> {
    match &opts.connection {
        Connection::None | Connection::Ssh { .. } => Ok(opts.remote_url.clone()),
        Connection::Github { pat, .. } => {
            if pat.is_empty() {
                return Err(GitDdbError::UndefinedPersonalAccessToken { remote: opts.remote_url.clone() });
            }
            if !opts.remote_url.starts_with("https://") {
                return Err(GitDdbError::HttpProtocolRequired { url: opts.remote_url.clone() });
            }
            let rest = opts.remote_url.trim_start_matches("https://");
            Ok(format!("https://{pat}@{rest}"))
        }
    }
}

/// Build a `GIT_SSH_COMMAND`-style override for SSH connections carrying a
/// non-default key pair. Passphrase-protected keys still need an
/// `ssh-agent` (or `SSH_ASKPASS`) to actually unlock; gitddb doesn't manage
/// that itself.
fn ssh_command_env(opts: &RemoteOptions) -> Result<Option<String>, GitDdbError> {
    let Connection::Ssh { private_key_path, .. } = &opts.connection else {
        return Ok(None);
    };
    if !private_key_path.exists() {
        return Err(GitDdbError::InvalidSshKeyPath { path: private_key_path.clone() });
    }
    Ok(Some(format!("ssh -i {} -o IdentitiesOnly=yes", private_key_path.display())))
}

/// Result of a fetch: whether new commits arrived, and the fetched tip.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FetchOutcome {
    /// The remote-tracking ref's OID after the fetch, if it resolved.
    pub remote_oid: Option<GitOid>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SyncDirection;

    fn base_opts(connection: Connection) -> RemoteOptions {
        RemoteOptions {
            remote_url: "https://example.com/repo.git".to_owned(),
            sync_direction: SyncDirection::Both,
            connection,
            live: false,
            interval_ms: 10_000,
            retry: 2,
            retry_interval_ms: 2_000,
            conflict_resolution_strategy: crate::config::ConflictResolutionStrategy::OursDiff,
            combine_db_strategy: crate::config::CombineDbStrategy::ThrowError,
            include_commits: false,
        }
    }

    #[test]
    fn authenticated_url_embeds_pat_for_github() {
        let opts = base_opts(Connection::Github { pat: "tok".to_owned(), private: true });
        let url = authenticated_url(&opts).unwrap();
        assert_eq!(url, "https://tok@example.com/repo.git");
    }

    #[test]
    fn authenticated_url_rejects_missing_pat() {
        let opts = base_opts(Connection::Github { pat: String::new(), private: true });
        assert!(authenticated_url(&opts).is_err());
    }

    #[test]
    fn authenticated_url_rejects_non_https_for_github() {
        let mut opts = base_opts(Connection::Github { pat: "tok".to_owned(), private: false });
        opts.remote_url = "git://example.com/repo.git".to_owned();
        assert!(authenticated_url(&opts).is_err());
    }

    #[test]
    fn authenticated_url_passthrough_for_none() {
        let opts = base_opts(Connection::None);
        assert_eq!(authenticated_url(&opts).unwrap(), opts.remote_url);
    }

    #[test]
    fn ssh_command_env_rejects_missing_key() {
        let opts = base_opts(Connection::Ssh {
            public_key_path: "/nonexistent.pub".into(),
            private_key_path: "/nonexistent".into(),
            passphrase: None,
        });
        assert!(ssh_command_env(&opts).is_err());
    }

    #[test]
    fn ssh_command_env_none_for_non_ssh() {
        let opts = base_opts(Connection::None);
        assert_eq!(ssh_command_env(&opts).unwrap(), None);
    }
}
