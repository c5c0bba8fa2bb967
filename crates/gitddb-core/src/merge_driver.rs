//! Three-way merge driver: walks `base`/`ours`/`theirs` trees together and
//! rebuilds a merged tree, invoking the diff/patch/merge3 core to resolve
//! content conflicts.
//!
//! Tree rebuilding leans on [`GitRepo::edit_tree`] rather than a hand-rolled
//! bottom-up tree writer: every resolved path becomes one flat [`TreeEdit`]
//! applied against `ours`'s tree, and the git layer takes care of rewriting
//! the intermediate trees (mirroring how [`crate::commit`] composes the same
//! primitive for single-document writes).

use std::collections::{BTreeMap, BTreeSet};

use gitddb_git::{EntryMode, GitOid, GitRepo, TreeEdit, TreeEntry};
use serde_json::Value;

use crate::diffpatch::merge3::{self, Strategy};
use crate::docs::{AcceptedConflict, DocValue, FatDoc, MergeOperation};
use crate::error::GitDdbError;
use crate::id;
use crate::serialize;

/// The outcome of merging two trees derived from a shared base.
pub struct MergeResult {
    /// OID of the merged tree.
    pub tree_oid: GitOid,
    /// Every path where the strategy had to choose a winner.
    pub conflicts: Vec<AcceptedConflict>,
}

/// Merge `ours_tree` and `theirs_tree`, both derived from `base_tree`
/// (`None` for an empty tree), under `strategy`.
///
/// # Errors
/// Returns [`GitDdbError::Git`] on a read/write failure, or
/// [`GitDdbError::ThreeWayMerge`] if a document's content can't be
/// reconstructed well enough to merge.
pub fn merge_trees(
    repo: &dyn GitRepo,
    base_tree: Option<GitOid>,
    ours_tree: Option<GitOid>,
    theirs_tree: Option<GitOid>,
    strategy: Strategy,
) -> Result<MergeResult, GitDdbError> {
    let mut edits = Vec::new();
    let mut conflicts = Vec::new();
    walk(repo, "", base_tree, ours_tree, theirs_tree, strategy, &mut edits, &mut conflicts)?;

    let ours_tree = match ours_tree {
        Some(oid) => oid,
        None => repo.write_tree(&[])?,
    };
    let tree_oid = repo.edit_tree(ours_tree, &edits)?;
    Ok(MergeResult { tree_oid, conflicts })
}

fn read_tree_map(repo: &dyn GitRepo, oid: Option<GitOid>) -> Result<BTreeMap<String, TreeEntry>, GitDdbError> {
    match oid {
        None => Ok(BTreeMap::new()),
        Some(oid) => Ok(repo.read_tree(oid)?.into_iter().map(|e| (e.name.clone(), e)).collect()),
    }
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() { name.to_owned() } else { format!("{prefix}/{name}") }
}

#[allow(clippy::too_many_arguments)]
fn walk(
    repo: &dyn GitRepo,
    prefix: &str,
    base: Option<GitOid>,
    ours: Option<GitOid>,
    theirs: Option<GitOid>,
    strategy: Strategy,
    edits: &mut Vec<TreeEdit>,
    conflicts: &mut Vec<AcceptedConflict>,
) -> Result<(), GitDdbError> {
    let base_map = read_tree_map(repo, base)?;
    let ours_map = read_tree_map(repo, ours)?;
    let theirs_map = read_tree_map(repo, theirs)?;

    let names: BTreeSet<&String> = base_map.keys().chain(ours_map.keys()).chain(theirs_map.keys()).collect();

    for name in names {
        let path = join(prefix, name);
        if id::is_metadata_path(&path) {
            continue;
        }
        let b = base_map.get(name);
        let o = ours_map.get(name);
        let t = theirs_map.get(name);

        let is_tree = [b, o, t].into_iter().flatten().any(|e| matches!(e.mode, EntryMode::Tree));
        if is_tree {
            let b_oid = b.filter(|e| matches!(e.mode, EntryMode::Tree)).map(|e| e.oid);
            let o_oid = o.filter(|e| matches!(e.mode, EntryMode::Tree)).map(|e| e.oid);
            let t_oid = t.filter(|e| matches!(e.mode, EntryMode::Tree)).map(|e| e.oid);
            walk(repo, &path, b_oid, o_oid, t_oid, strategy, edits, conflicts)?;
        } else {
            merge_leaf(repo, &path, b, o, t, strategy, edits, conflicts)?;
        }
    }
    Ok(())
}

fn upsert(path: &str, entry: &TreeEntry) -> TreeEdit {
    TreeEdit::Upsert { path: path.to_owned(), mode: entry.mode, oid: entry.oid }
}

fn remove(path: &str) -> TreeEdit {
    TreeEdit::Remove { path: path.to_owned() }
}

enum Side {
    Ours,
    Theirs,
}

/// Resolve an update-vs-delete conflict per the §4.H composition rule:
/// under `OursDiff` the update always wins regardless of which side it came
/// from; otherwise the strategy's named side wins outright (even if that
/// side's state is "deleted").
fn resolve_presence_conflict<'a>(strategy: Strategy, deleted_side: &Side, update_entry: &'a TreeEntry) -> Option<&'a TreeEntry> {
    match (strategy, deleted_side) {
        (Strategy::OursDiff, _) => Some(update_entry),
        (Strategy::Ours, Side::Ours) | (Strategy::Theirs | Strategy::TheirsDiff, Side::Theirs) => None,
        (Strategy::Ours, Side::Theirs) | (Strategy::Theirs | Strategy::TheirsDiff, Side::Ours) => Some(update_entry),
    }
}

#[allow(clippy::too_many_arguments)]
fn merge_leaf(
    repo: &dyn GitRepo,
    path: &str,
    base: Option<&TreeEntry>,
    ours: Option<&TreeEntry>,
    theirs: Option<&TreeEntry>,
    strategy: Strategy,
    edits: &mut Vec<TreeEdit>,
    conflicts: &mut Vec<AcceptedConflict>,
) -> Result<(), GitDdbError> {
    match (base, ours, theirs) {
        (None, None, None) => {}
        (None, None, Some(t)) => edits.push(upsert(path, t)),
        (None, Some(o), None) => edits.push(upsert(path, o)),
        (None, Some(o), Some(t)) => {
            if o.oid == t.oid {
                edits.push(upsert(path, o));
            } else {
                let conflict = resolve_content_conflict(repo, path, None, o, t, strategy, MergeOperation::InsertMerge)?;
                edits.push(TreeEdit::Upsert { path: path.to_owned(), mode: o.mode, oid: conflict.fat_doc.file_oid });
                conflicts.push(conflict);
            }
        }
        (Some(_), None, None) => edits.push(remove(path)),
        (Some(b), None, Some(t)) => {
            if b.oid == t.oid {
                edits.push(remove(path));
            } else {
                match resolve_presence_conflict(strategy, &Side::Ours, t) {
                    Some(winner) => edits.push(upsert(path, winner)),
                    None => edits.push(remove(path)),
                }
                conflicts.push(presence_conflict_record(path, b, None, Some(t), strategy));
            }
        }
        (Some(b), Some(o), None) => {
            if b.oid == o.oid {
                edits.push(remove(path));
            } else {
                match resolve_presence_conflict(strategy, &Side::Theirs, o) {
                    Some(winner) => edits.push(upsert(path, winner)),
                    None => edits.push(remove(path)),
                }
                conflicts.push(presence_conflict_record(path, b, Some(o), None, strategy));
            }
        }
        (Some(b), Some(o), Some(t)) => {
            if o.oid == t.oid {
                edits.push(upsert(path, o));
            } else if b.oid == o.oid {
                edits.push(upsert(path, t));
            } else if b.oid == t.oid {
                edits.push(upsert(path, o));
            } else {
                let conflict = resolve_content_conflict(repo, path, Some(b), o, t, strategy, MergeOperation::UpdateMerge)?;
                edits.push(TreeEdit::Upsert { path: path.to_owned(), mode: o.mode, oid: conflict.fat_doc.file_oid });
                conflicts.push(conflict);
            }
        }
    }
    Ok(())
}

fn presence_conflict_record(path: &str, base: &TreeEntry, ours: Option<&TreeEntry>, theirs: Option<&TreeEntry>, strategy: Strategy) -> AcceptedConflict {
    let oid = match (ours, theirs) {
        (Some(o), None) => o.oid,
        (None, Some(t)) => t.oid,
        _ => base.oid,
    };
    AcceptedConflict {
        fat_doc: FatDoc { name: basename(path).to_owned(), short_id: None, file_oid: oid, value: DocValue::Binary(Vec::new()) },
        strategy,
        operation: MergeOperation::Update,
    }
}

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

#[allow(clippy::too_many_arguments)]
fn resolve_content_conflict(
    repo: &dyn GitRepo,
    path: &str,
    base: Option<&TreeEntry>,
    ours: &TreeEntry,
    theirs: &TreeEntry,
    strategy: Strategy,
    operation: MergeOperation,
) -> Result<AcceptedConflict, GitDdbError> {
    let base_bytes = base.map(|e| repo.read_blob(e.oid)).transpose()?;
    let ours_bytes = repo.read_blob(ours.oid)?;
    let theirs_bytes = repo.read_blob(theirs.oid)?;

    let as_json = |b: &[u8]| serde_json::from_slice::<Value>(b).ok();
    let (base_json, ours_json, theirs_json) = (
        base_bytes.as_deref().and_then(as_json).unwrap_or(Value::Null),
        as_json(&ours_bytes),
        as_json(&theirs_bytes),
    );

    let merged_bytes = match (ours_json, theirs_json) {
        (Some(ours_val), Some(theirs_val)) => {
            let (merged, _conflicts) = merge3::merge(&base_json, &ours_val, &theirs_val, strategy);
            match merged.as_object() {
                Some(obj) => serialize::canonical_json(obj).into_bytes(),
                None => serde_json::to_vec(&merged)?,
            }
        }
        _ => {
            // Not both sides are JSON (text or binary document): fall back to
            // a whole-value pick, no structural merge possible.
            let picked = if strategy.prefers_ours() { &ours_bytes } else { &theirs_bytes };
            picked.clone()
        }
    };

    let merged_oid = repo.write_blob(&merged_bytes)?;
    Ok(AcceptedConflict {
        fat_doc: FatDoc {
            name: basename(path).to_owned(),
            short_id: None,
            file_oid: merged_oid,
            value: DocValue::Binary(merged_bytes),
        },
        strategy,
        operation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_presence_conflict_ours_diff_keeps_update_either_side() {
        let entry = TreeEntry { name: "a".into(), mode: EntryMode::Blob, oid: GitOid::ZERO };
        assert!(resolve_presence_conflict(Strategy::OursDiff, &Side::Ours, &entry).is_some());
        assert!(resolve_presence_conflict(Strategy::OursDiff, &Side::Theirs, &entry).is_some());
    }

    #[test]
    fn resolve_presence_conflict_ours_strategy_deletes_when_ours_deleted() {
        let entry = TreeEntry { name: "a".into(), mode: EntryMode::Blob, oid: GitOid::ZERO };
        assert!(resolve_presence_conflict(Strategy::Ours, &Side::Ours, &entry).is_none());
        assert!(resolve_presence_conflict(Strategy::Ours, &Side::Theirs, &entry).is_some());
    }

    #[test]
    fn resolve_presence_conflict_theirs_strategy_deletes_when_theirs_deleted() {
        let entry = TreeEntry { name: "a".into(), mode: EntryMode::Blob, oid: GitOid::ZERO };
        assert!(resolve_presence_conflict(Strategy::Theirs, &Side::Theirs, &entry).is_none());
        assert!(resolve_presence_conflict(Strategy::Theirs, &Side::Ours, &entry).is_some());
    }

    #[test]
    fn basename_strips_directory() {
        assert_eq!(basename("notes/a.json"), "a.json");
        assert_eq!(basename("a.json"), "a.json");
    }
}
