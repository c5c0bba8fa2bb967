//! gix-backed tree-to-tree diff.
//!
//! Walks both trees recursively into flat `path -> (oid, mode)` maps and
//! compares them. This mirrors `git diff-tree -r` output without rename
//! detection; gitddb only needs additions/modifications/deletions to derive
//! collection change sets (renames are represented as a delete + an add).

use std::collections::BTreeMap;

use crate::error::GitError;
use crate::gix_repo::GixRepo;
use crate::types::*;

fn to_gix_oid(oid: GitOid) -> gix::ObjectId {
    gix::ObjectId::from_bytes_or_panic(oid.as_bytes())
}

fn from_gix_entry_mode(mode: gix::objs::tree::EntryMode) -> EntryMode {
    match mode.kind() {
        gix::objs::tree::EntryKind::Tree => EntryMode::Tree,
        gix::objs::tree::EntryKind::Blob => EntryMode::Blob,
        gix::objs::tree::EntryKind::BlobExecutable => EntryMode::BlobExecutable,
        gix::objs::tree::EntryKind::Link => EntryMode::Link,
        gix::objs::tree::EntryKind::Commit => EntryMode::Commit,
    }
}

fn collect_entries(
    repo: &GixRepo,
    tree_oid: gix::ObjectId,
    prefix: &str,
    out: &mut BTreeMap<String, (GitOid, EntryMode)>,
) -> Result<(), GitError> {
    let tree = repo
        .repo
        .find_tree(tree_oid)
        .map_err(|e| GitError::NotFound {
            message: format!("tree {tree_oid}: {e}"),
        })?;

    for result in tree.iter() {
        let entry = result.map_err(|e| GitError::BackendError {
            message: format!("failed to decode tree entry: {e}"),
        })?;
        let name = entry.inner.filename.to_string();
        let path = if prefix.is_empty() {
            name
        } else {
            format!("{prefix}/{name}")
        };
        let mode = from_gix_entry_mode(entry.inner.mode);
        let oid_bytes: [u8; 20] = entry
            .inner
            .oid
            .as_bytes()
            .try_into()
            .expect("SHA1 is 20 bytes");
        let oid = GitOid::from_bytes(oid_bytes);

        if matches!(mode, EntryMode::Tree) {
            collect_entries(repo, entry.inner.oid.into(), &path, out)?;
        } else {
            out.insert(path, (oid, mode));
        }
    }
    Ok(())
}

pub fn diff_trees(
    repo: &GixRepo,
    old: Option<GitOid>,
    new: GitOid,
) -> Result<Vec<DiffEntry>, GitError> {
    let mut old_entries = BTreeMap::new();
    if let Some(old_oid) = old {
        collect_entries(repo, to_gix_oid(old_oid), "", &mut old_entries)?;
    }

    let mut new_entries = BTreeMap::new();
    collect_entries(repo, to_gix_oid(new), "", &mut new_entries)?;

    let mut out = Vec::new();

    for (path, (new_oid, new_mode)) in &new_entries {
        match old_entries.get(path) {
            None => out.push(DiffEntry {
                path: path.clone(),
                change_type: ChangeType::Added,
                old_oid: GitOid::ZERO,
                new_oid: *new_oid,
                old_mode: None,
                new_mode: Some(*new_mode),
            }),
            Some((old_oid, old_mode)) => {
                if old_oid != new_oid || old_mode != new_mode {
                    out.push(DiffEntry {
                        path: path.clone(),
                        change_type: ChangeType::Modified,
                        old_oid: *old_oid,
                        new_oid: *new_oid,
                        old_mode: Some(*old_mode),
                        new_mode: Some(*new_mode),
                    });
                }
            }
        }
    }

    for (path, (old_oid, old_mode)) in &old_entries {
        if !new_entries.contains_key(path) {
            out.push(DiffEntry {
                path: path.clone(),
                change_type: ChangeType::Deleted,
                old_oid: *old_oid,
                new_oid: GitOid::ZERO,
                old_mode: Some(*old_mode),
                new_mode: None,
            });
        }
    }

    out.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(out)
}
