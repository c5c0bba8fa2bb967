//! Remote operations via git CLI fallback.
//!
//! Fetch, push, and clone are kept as CLI subprocesses because gix does not
//! yet provide a high-level, stable API for any of the three.

use std::path::Path;
use std::process::Command;

use crate::error::GitError;
use crate::gix_repo::GixRepo;

fn run_git(args: &[&str], git_dir: Option<&Path>) -> Result<std::process::Output, GitError> {
    let mut cmd = Command::new("git");
    if let Some(dir) = git_dir {
        cmd.arg("--git-dir").arg(dir);
    }
    cmd.args(args);
    cmd.output().map_err(GitError::IoError)
}

pub fn fetch(repo: &GixRepo, remote: &str, refspecs: &[String]) -> Result<(), GitError> {
    let mut args = vec!["fetch", remote];
    for spec in refspecs {
        args.push(spec.as_str());
    }
    let output = run_git(&args, Some(repo.repo.git_dir()))?;
    if !output.status.success() {
        return Err(GitError::FetchFailed {
            remote: remote.to_string(),
            message: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }
    Ok(())
}

pub fn push_branch(
    repo: &GixRepo,
    remote: &str,
    local_ref: &str,
    remote_ref: &str,
    force: bool,
) -> Result<(), GitError> {
    let refspec = format!("{local_ref}:{remote_ref}");
    let mut args = vec!["push"];
    if force {
        args.push("--force");
    }
    args.push(remote);
    args.push(&refspec);

    let output = run_git(&args, Some(repo.repo.git_dir()))?;
    if !output.status.success() {
        return Err(GitError::PushFailed {
            remote: remote.to_string(),
            message: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }
    Ok(())
}

pub fn push_tag(repo: &GixRepo, remote: &str, tag: &str) -> Result<(), GitError> {
    let output = run_git(&["push", remote, tag], Some(repo.repo.git_dir()))?;
    if !output.status.success() {
        return Err(GitError::PushFailed {
            remote: remote.to_string(),
            message: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }
    Ok(())
}

pub fn clone_repo(url: &str, path: &Path) -> Result<GixRepo, GitError> {
    let output = run_git(&["clone", url, &path.to_string_lossy()], None)?;
    if !output.status.success() {
        return Err(GitError::CloneFailed {
            url: url.to_string(),
            message: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }
    GixRepo::open_at(path)
}
