//! Working-directory writer: atomic single-file writes/removes, with
//! directory creation and pruning.
//!
//! Grounded on `gitddb_git::checkout_impl`'s write-then-remove-stale shape,
//! but operating at single-file granularity (the commit worker calls this
//! once per changed document rather than re-checking-out the whole tree).

use std::path::{Path, PathBuf};

use crate::error::GitDdbError;

/// Write `data` to `workdir.join(rel_path)` atomically: write to a sibling
/// temp file, then rename over the destination. Creates any missing parent
/// directories.
///
/// # Errors
/// Returns [`GitDdbError::CannotCreateDirectory`] or [`GitDdbError::Io`].
pub fn write_file(workdir: &Path, rel_path: &str, data: &[u8]) -> Result<(), GitDdbError> {
    let dest = workdir.join(rel_path);
    if let Some(parent) = dest.parent() {
        ensure_dir(parent)?;
    }
    let tmp = sibling_tmp_path(&dest);
    std::fs::write(&tmp, data)?;
    std::fs::rename(&tmp, &dest)?;
    Ok(())
}

/// Remove `workdir.join(rel_path)` if it exists, then prune any parent
/// directories left empty by the removal (stopping at `workdir`).
///
/// # Errors
/// Returns [`GitDdbError::CannotDeleteData`] if removal fails for a reason
/// other than the file already being absent.
pub fn remove_file(workdir: &Path, rel_path: &str) -> Result<(), GitDdbError> {
    let target = workdir.join(rel_path);
    match std::fs::remove_file(&target) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            return Err(GitDdbError::CannotDeleteData {
                path: target,
                message: e.to_string(),
            });
        }
    }
    if let Some(parent) = target.parent() {
        prune_empty_dirs(workdir, parent);
    }
    Ok(())
}

/// Ensure a directory (and its parents) exist.
///
/// # Errors
/// Returns [`GitDdbError::CannotCreateDirectory`] on failure.
pub fn ensure_dir(dir: &Path) -> Result<(), GitDdbError> {
    std::fs::create_dir_all(dir).map_err(|e| GitDdbError::CannotCreateDirectory {
        path: dir.to_owned(),
        message: e.to_string(),
    })
}

/// Remove `dir` and any of its ancestors (up to, but excluding, `stop_at`)
/// that are empty. Best-effort: errors (directory not empty, permissions)
/// simply stop the walk.
fn prune_empty_dirs(stop_at: &Path, dir: &Path) {
    let mut current = dir.to_path_buf();
    while current != stop_at && current.starts_with(stop_at) {
        match std::fs::remove_dir(&current) {
            Ok(()) => {}
            Err(_) => break,
        }
        let Some(parent) = current.parent() else { break };
        current = parent.to_path_buf();
    }
}

fn sibling_tmp_path(dest: &Path) -> PathBuf {
    let file_name = dest.file_name().map_or_else(|| "tmp".into(), |n| n.to_string_lossy().into_owned());
    let tmp_name = format!(".{file_name}.gitddb-tmp-{}", std::process::id());
    dest.with_file_name(tmp_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_creates_parent_dirs_and_content() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "notes/a.json", b"{}").unwrap();
        let content = std::fs::read(dir.path().join("notes/a.json")).unwrap();
        assert_eq!(content, b"{}");
    }

    #[test]
    fn write_overwrites_existing() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "a.json", b"one").unwrap();
        write_file(dir.path(), "a.json", b"two").unwrap();
        let content = std::fs::read(dir.path().join("a.json")).unwrap();
        assert_eq!(content, b"two");
    }

    #[test]
    fn remove_prunes_empty_parent() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "notes/a.json", b"{}").unwrap();
        remove_file(dir.path(), "notes/a.json").unwrap();
        assert!(!dir.path().join("notes/a.json").exists());
        assert!(!dir.path().join("notes").exists());
    }

    #[test]
    fn remove_keeps_nonempty_parent() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "notes/a.json", b"{}").unwrap();
        write_file(dir.path(), "notes/b.json", b"{}").unwrap();
        remove_file(dir.path(), "notes/a.json").unwrap();
        assert!(dir.path().join("notes").exists());
        assert!(dir.path().join("notes/b.json").exists());
    }

    #[test]
    fn remove_missing_file_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        remove_file(dir.path(), "never-existed.json").unwrap();
    }
}
