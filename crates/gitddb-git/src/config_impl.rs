//! git config read/write.
//!
//! Reads go through gix's config snapshot. Writes fall back to the `git`
//! CLI, the same rationale as `remote_impl`: gix does not yet expose a
//! stable high-level config-mutation API.

use std::process::Command;

use crate::error::GitError;
use crate::gix_repo::GixRepo;

pub fn read_config(repo: &GixRepo, key: &str) -> Result<Option<String>, GitError> {
    let snapshot = repo.repo.config_snapshot();
    Ok(snapshot.string(key).map(|v| v.to_string()))
}

pub fn write_config(repo: &GixRepo, key: &str, value: &str) -> Result<(), GitError> {
    let git_dir = repo.repo.git_dir();
    let output = Command::new("git")
        .arg("--git-dir")
        .arg(git_dir)
        .arg("config")
        .arg(key)
        .arg(value)
        .output()
        .map_err(GitError::IoError)?;

    if !output.status.success() {
        return Err(GitError::BackendError {
            message: format!(
                "git config {key} {value} failed: {}",
                String::from_utf8_lossy(&output.stderr)
            ),
        });
    }
    Ok(())
}
