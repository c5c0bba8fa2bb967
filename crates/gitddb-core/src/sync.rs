//! Sync engine: fetch, classify local/remote distance against the merge
//! base, then dispatch to fast-forward, push, three-way merge, or the
//! combine-databases recovery path.
//!
//! Composes [`crate::merge_driver`] for the merge step and
//! [`crate::remote::RemoteEngine`] for the network step, the same way
//! [`crate::commit`] composes `GitRepo` primitives for a single write.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use gitddb_git::{EntryMode, GitOid, GitRepo, RefName, Signature, TreeEdit};

use crate::config::RemoteOptions;
use crate::diffpatch::merge3::Strategy;
use crate::docs::{AcceptedConflict, ChangedFile, DuplicatedFile, FatDoc, MergeOperation};
use crate::docs::DocValue;
use crate::error::GitDdbError;
use crate::id::is_metadata_path;
use crate::merge_driver;
use crate::reader::Reader;
use crate::remote::RemoteEngine;
use crate::serialize::Serializer;

/// Which branch of the state machine a sync cycle took.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncAction {
    /// Local and remote already agree; nothing to do.
    Nop,
    /// Remote was strictly ahead; HEAD fast-forwarded to it.
    FastForward,
    /// Local was strictly ahead; pushed as-is.
    Push,
    /// Both sides had independent commits; merged and pushed.
    Merge,
    /// No common ancestor existed; resolved per `combineDbStrategy`.
    CombineDatabase,
}

/// The outcome of one sync cycle.
#[derive(Clone, Debug, PartialEq)]
pub struct SyncResult {
    /// Which branch of the state machine ran.
    pub action: SyncAction,
    /// Documents changed locally as a result of this cycle (e.g. by a
    /// fast-forward or merge).
    pub local_changes: Vec<ChangedFile>,
    /// Documents changed on the remote as a result of this cycle (e.g. by a
    /// push).
    pub remote_changes: Vec<ChangedFile>,
    /// Paths where the merge strategy had to choose a winner.
    pub conflicts: Vec<AcceptedConflict>,
    /// Local files renamed aside during a combine-databases recovery.
    pub duplicates: Vec<DuplicatedFile>,
}

fn empty_result(action: SyncAction) -> SyncResult {
    SyncResult { action, local_changes: Vec::new(), remote_changes: Vec::new(), conflicts: Vec::new(), duplicates: Vec::new() }
}

/// Where local HEAD sits relative to the remote-tracking ref, in terms of
/// their merge base.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Distance {
    Nop,
    FastForward,
    Push,
    Merge,
    NoMergeBase,
}

fn classify(repo: &dyn GitRepo, head: Option<GitOid>, remote: Option<GitOid>) -> Result<Distance, GitDdbError> {
    match (head, remote) {
        (None, None) => Ok(Distance::Nop),
        (None, Some(_)) => Ok(Distance::FastForward),
        (Some(_), None) => Ok(Distance::Push),
        (Some(h), Some(r)) if h == r => Ok(Distance::Nop),
        (Some(h), Some(r)) => match repo.merge_base(h, r)? {
            None => Ok(Distance::NoMergeBase),
            Some(base) if base == r => Ok(Distance::Push),
            Some(base) if base == h => Ok(Distance::FastForward),
            Some(_) => Ok(Distance::Merge),
        },
    }
}

pub(crate) fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Build a [`FatDoc`] for the blob at `path`/`oid`, inferring JSON/text/binary
/// kind from the extension the way [`crate::collection`]'s read paths do.
pub(crate) fn build_fat_doc(repo: &dyn GitRepo, path: &str, oid: GitOid) -> Result<FatDoc, GitDdbError> {
    let bytes = repo.read_blob(oid)?;
    let name = basename(path).to_owned();
    let ext_start = name.rfind('.');
    let extension = ext_start.map_or("", |i| &name[i..]);

    match Serializer::infer(extension) {
        Some(serializer) => {
            let short_id = &name[..name.len() - extension.len()];
            let value = serializer.decode(&bytes, short_id)?;
            Ok(FatDoc { name, short_id: Some(short_id.to_owned()), file_oid: oid, value: DocValue::Json(value) })
        }
        None => match String::from_utf8(bytes.clone()) {
            Ok(text) => Ok(FatDoc { name, short_id: None, file_oid: oid, value: DocValue::Text(text) }),
            Err(_) => Ok(FatDoc { name, short_id: None, file_oid: oid, value: DocValue::Binary(bytes) }),
        },
    }
}

/// Walk the diff between `old_tree` (`None` for an empty tree) and
/// `new_tree`, producing the `ChangedFile`s a `change`/`localChange`/
/// `remoteChange` event should carry.
///
/// # Errors
/// Returns [`GitDdbError::Git`] on a read/diff failure.
pub fn derive_change_set(repo: &dyn GitRepo, old_tree: Option<GitOid>, new_tree: GitOid) -> Result<Vec<ChangedFile>, GitDdbError> {
    let mut changes = Vec::new();
    for entry in repo.diff_trees(old_tree, new_tree)? {
        if is_metadata_path(&entry.path) {
            continue;
        }
        let change = match &entry.change_type {
            gitddb_git::ChangeType::Added => ChangedFile::Insert { new: build_fat_doc(repo, &entry.path, entry.new_oid)? },
            gitddb_git::ChangeType::Deleted => ChangedFile::Delete { old: build_fat_doc(repo, &entry.path, entry.old_oid)? },
            gitddb_git::ChangeType::Modified => ChangedFile::Update {
                old: build_fat_doc(repo, &entry.path, entry.old_oid)?,
                new: build_fat_doc(repo, &entry.path, entry.new_oid)?,
            },
            gitddb_git::ChangeType::Renamed { from } => ChangedFile::Update {
                old: build_fat_doc(repo, from, entry.old_oid)?,
                new: build_fat_doc(repo, &entry.path, entry.new_oid)?,
            },
        };
        changes.push(change);
    }
    Ok(changes)
}

fn operation_label(operation: MergeOperation) -> &'static str {
    match operation {
        MergeOperation::Insert => "insert",
        MergeOperation::Update => "update",
        MergeOperation::Delete => "delete",
        MergeOperation::InsertMerge => "insert-merge",
        MergeOperation::UpdateMerge => "update-merge",
    }
}

fn strategy_label(strategy: Strategy) -> &'static str {
    match strategy {
        Strategy::Ours => "ours",
        Strategy::Theirs => "theirs",
        Strategy::OursDiff => "ours-diff",
        Strategy::TheirsDiff => "theirs-diff",
    }
}

/// Render the merge commit message: `"merge"` when nothing conflicted, or a
/// `"resolve: <name>(<operation>,<short-oid>,<strategy>), …"` line (sorted by
/// name) when the strategy had to pick winners.
#[must_use]
pub fn render_merge_message(conflicts: &[AcceptedConflict]) -> String {
    if conflicts.is_empty() {
        return "merge".to_owned();
    }
    let mut sorted: Vec<&AcceptedConflict> = conflicts.iter().collect();
    sorted.sort_by(|a, b| a.fat_doc.name.cmp(&b.fat_doc.name));
    let parts: Vec<String> = sorted
        .iter()
        .map(|c| {
            let short_oid = &c.fat_doc.file_oid.to_string()[..7];
            format!("{}({},{},{})", c.fat_doc.name, operation_label(c.operation), short_oid, strategy_label(c.strategy))
        })
        .collect();
    format!("resolve: {}", parts.join(", "))
}

/// Run one sync cycle: fetch, classify, and dispatch.
///
/// `head_ref` is the local branch; `tracking_ref` mirrors the remote branch
/// after `fetch`.
///
/// # Errors
/// Returns a sync-category [`GitDdbError`] on fetch/push failure, or
/// [`GitDdbError::NoMergeBaseFound`] when `combine_db_strategy` is
/// `ThrowError` and histories share no ancestor.
#[allow(clippy::too_many_arguments)]
pub fn sync_once(
    repo: &dyn GitRepo,
    engine: &dyn RemoteEngine,
    workdir: &Path,
    head_ref: &RefName,
    tracking_ref: &RefName,
    remote_name: &str,
    opts: &RemoteOptions,
    local_db_id: &str,
    author: Option<&Signature>,
    committer: Option<&Signature>,
) -> Result<SyncResult, GitDdbError> {
    engine.fetch(repo, opts, remote_name, tracking_ref, head_ref)?;

    let head_oid = repo.read_ref(head_ref)?;
    let remote_oid = repo.read_ref(tracking_ref)?;

    match classify(repo, head_oid, remote_oid)? {
        Distance::Nop => Ok(empty_result(SyncAction::Nop)),
        Distance::FastForward => fast_forward(repo, workdir, head_ref, head_oid, remote_oid.expect("remote present in FastForward")),
        Distance::Push => push(repo, engine, head_ref, tracking_ref, remote_name, opts, head_oid.expect("head present in Push"), remote_oid),
        Distance::Merge => {
            let head = head_oid.expect("head present in Merge");
            let remote = remote_oid.expect("remote present in Merge");
            merge_and_push(repo, engine, workdir, head_ref, tracking_ref, remote_name, opts, head, remote, author, committer)
        }
        Distance::NoMergeBase => {
            let head = head_oid.expect("head present in NoMergeBase");
            let remote = remote_oid.expect("remote present in NoMergeBase");
            combine_database(repo, engine, workdir, head_ref, tracking_ref, remote_name, opts, head, remote, local_db_id, author, committer)
        }
    }
}

fn fast_forward(repo: &dyn GitRepo, workdir: &Path, head_ref: &RefName, head_oid: Option<GitOid>, remote_oid: GitOid) -> Result<SyncResult, GitDdbError> {
    let old_tree = match head_oid {
        Some(oid) => Some(repo.read_commit(oid)?.tree_oid),
        None => None,
    };
    let new_tree = repo.read_commit(remote_oid)?.tree_oid;
    repo.write_ref(head_ref, remote_oid, "gitddb: fast-forward sync")?;
    repo.checkout_tree(new_tree, workdir)?;
    let local_changes = derive_change_set(repo, old_tree, new_tree)?;
    Ok(SyncResult { action: SyncAction::FastForward, local_changes, remote_changes: Vec::new(), conflicts: Vec::new(), duplicates: Vec::new() })
}

#[allow(clippy::too_many_arguments)]
fn push(
    repo: &dyn GitRepo,
    engine: &dyn RemoteEngine,
    head_ref: &RefName,
    tracking_ref: &RefName,
    remote_name: &str,
    opts: &RemoteOptions,
    head_oid: GitOid,
    remote_oid: Option<GitOid>,
) -> Result<SyncResult, GitDdbError> {
    let old_tree = match remote_oid {
        Some(oid) => Some(repo.read_commit(oid)?.tree_oid),
        None => None,
    };
    let new_tree = repo.read_commit(head_oid)?.tree_oid;

    engine.push(repo, opts, remote_name, head_ref, head_ref, false)?;
    repo.write_ref(tracking_ref, head_oid, "gitddb: sync push")?;

    let remote_changes = derive_change_set(repo, old_tree, new_tree)?;
    Ok(SyncResult { action: SyncAction::Push, local_changes: Vec::new(), remote_changes, conflicts: Vec::new(), duplicates: Vec::new() })
}

#[allow(clippy::too_many_arguments)]
fn merge_and_push(
    repo: &dyn GitRepo,
    engine: &dyn RemoteEngine,
    workdir: &Path,
    head_ref: &RefName,
    tracking_ref: &RefName,
    remote_name: &str,
    opts: &RemoteOptions,
    head_oid: GitOid,
    remote_oid: GitOid,
    author: Option<&Signature>,
    committer: Option<&Signature>,
) -> Result<SyncResult, GitDdbError> {
    let base_oid = repo.merge_base(head_oid, remote_oid)?;
    let base_tree = base_oid.map(|oid| repo.read_commit(oid)).transpose()?.map(|c| c.tree_oid);
    let head_tree = repo.read_commit(head_oid)?.tree_oid;
    let remote_tree = repo.read_commit(remote_oid)?.tree_oid;

    let strategy: Strategy = opts.conflict_resolution_strategy.into();
    let merged = merge_driver::merge_trees(repo, base_tree, Some(head_tree), Some(remote_tree), strategy)?;

    let message = render_merge_message(&merged.conflicts);
    let merge_commit = repo.create_commit(merged.tree_oid, &[head_oid, remote_oid], &message, author, committer, Some(head_ref))?;
    repo.checkout_tree(merged.tree_oid, workdir)?;

    let local_changes = derive_change_set(repo, Some(head_tree), merged.tree_oid)?;

    engine.push(repo, opts, remote_name, head_ref, head_ref, false)?;
    repo.write_ref(tracking_ref, merge_commit, "gitddb: sync push after merge")?;

    Ok(SyncResult {
        action: SyncAction::Merge,
        local_changes,
        remote_changes: Vec::new(),
        conflicts: merged.conflicts,
        duplicates: Vec::new(),
    })
}

/// Resolve a missing merge base per `opts.combine_db_strategy`.
///
/// `ThrowError` surfaces [`GitDdbError::NoMergeBaseFound`] and leaves both
/// HEAD and the remote untouched. `ReplaceWithOurs`/`ReplaceWithTheirs`
/// discard one side's history outright. `CombineHeadWithTheirs` is the full
/// recovery path described in the sync engine's spec.
#[allow(clippy::too_many_arguments)]
fn combine_database(
    repo: &dyn GitRepo,
    engine: &dyn RemoteEngine,
    workdir: &Path,
    head_ref: &RefName,
    tracking_ref: &RefName,
    remote_name: &str,
    opts: &RemoteOptions,
    head_oid: GitOid,
    remote_oid: GitOid,
    local_db_id: &str,
    author: Option<&Signature>,
    committer: Option<&Signature>,
) -> Result<SyncResult, GitDdbError> {
    use crate::config::CombineDbStrategy;
    match opts.combine_db_strategy {
        CombineDbStrategy::ThrowError => Err(GitDdbError::NoMergeBaseFound { remote: remote_name.to_owned() }),
        CombineDbStrategy::ReplaceWithOurs => replace_with_ours(repo, engine, head_ref, tracking_ref, remote_name, opts, head_oid, remote_oid),
        CombineDbStrategy::ReplaceWithTheirs => replace_with_theirs(repo, workdir, head_ref, tracking_ref, head_oid, remote_oid),
        CombineDbStrategy::CombineHeadWithTheirs => {
            combine_head_with_theirs(repo, engine, workdir, head_ref, tracking_ref, remote_name, opts, head_oid, remote_oid, local_db_id, author, committer)
        }
    }
}

/// Discard the remote's history: force-push local HEAD as the new remote
/// tip. The local working directory is untouched since HEAD doesn't move.
#[allow(clippy::too_many_arguments)]
fn replace_with_ours(
    repo: &dyn GitRepo,
    engine: &dyn RemoteEngine,
    head_ref: &RefName,
    tracking_ref: &RefName,
    remote_name: &str,
    opts: &RemoteOptions,
    head_oid: GitOid,
    remote_oid: GitOid,
) -> Result<SyncResult, GitDdbError> {
    let remote_tree = repo.read_commit(remote_oid)?.tree_oid;
    let head_tree = repo.read_commit(head_oid)?.tree_oid;
    engine.push(repo, opts, remote_name, head_ref, head_ref, true)?;
    repo.write_ref(tracking_ref, head_oid, "gitddb: combine (replace-with-ours)")?;
    let remote_changes = derive_change_set(repo, Some(remote_tree), head_tree)?;
    Ok(SyncResult { action: SyncAction::CombineDatabase, local_changes: Vec::new(), remote_changes, conflicts: Vec::new(), duplicates: Vec::new() })
}

/// Discard local history: reset HEAD to the remote tip and check out its
/// tree. No push is needed since the remote already holds this state.
fn replace_with_theirs(
    repo: &dyn GitRepo,
    workdir: &Path,
    head_ref: &RefName,
    tracking_ref: &RefName,
    head_oid: GitOid,
    remote_oid: GitOid,
) -> Result<SyncResult, GitDdbError> {
    let head_tree = repo.read_commit(head_oid)?.tree_oid;
    let remote_tree = repo.read_commit(remote_oid)?.tree_oid;
    repo.write_ref(head_ref, remote_oid, "gitddb: combine (replace-with-theirs)")?;
    repo.write_ref(tracking_ref, remote_oid, "gitddb: combine (replace-with-theirs)")?;
    repo.checkout_tree(remote_tree, workdir)?;
    let local_changes = derive_change_set(repo, Some(head_tree), remote_tree)?;
    Ok(SyncResult { action: SyncAction::CombineDatabase, local_changes, remote_changes: Vec::new(), conflicts: Vec::new(), duplicates: Vec::new() })
}

/// Fold local documents onto the remote's lineage.
///
/// There's no common ancestor to three-way-merge against, so instead of
/// trying to reconcile two unrelated commit graphs this grafts the local
/// working set onto the remote's tree as a single new commit: any local
/// document whose path the remote tree already holds is renamed aside
/// (`-from-<dbId>` suffix, `_id` adjusted for JSON) and recorded as a
/// [`DuplicatedFile`]; everything else is carried over verbatim. The new
/// commit's sole parent is the remote tip, so the result pushes as an
/// ordinary fast-forward of the remote.
///
/// This reaches the same document-level outcome as cloning the remote into
/// a sibling directory and physically swapping working directories (the
/// spec's literal recipe), but does it as tree/commit plumbing in the one
/// repository both tips already live in — `fetch` already pulled every
/// object the remote tip reaches into the local object database, so no
/// second checkout is needed to read it.
#[allow(clippy::too_many_arguments)]
fn combine_head_with_theirs(
    repo: &dyn GitRepo,
    engine: &dyn RemoteEngine,
    workdir: &Path,
    head_ref: &RefName,
    tracking_ref: &RefName,
    remote_name: &str,
    opts: &RemoteOptions,
    head_oid: GitOid,
    remote_oid: GitOid,
    local_db_id: &str,
    author: Option<&Signature>,
    committer: Option<&Signature>,
) -> Result<SyncResult, GitDdbError> {
    let head_tree = repo.read_commit(head_oid)?.tree_oid;
    let remote_tree = repo.read_commit(remote_oid)?.tree_oid;

    let reader = Reader::new(repo);
    let local_docs = reader.list(head_tree, "", true, crate::reader::Order::Ascending)?;

    let mut edits = Vec::with_capacity(local_docs.len());
    let mut duplicates = Vec::new();

    for (path, oid, mode) in local_docs {
        if !matches!(mode, EntryMode::Blob | EntryMode::BlobExecutable) {
            continue;
        }
        let collides = reader.read_path(remote_tree, &path)?.is_some();
        if !collides {
            edits.push(TreeEdit::Upsert { path, mode, oid });
            continue;
        }
        let renamed_path = suffix_path_with_db_id(&path, local_db_id);
        let bytes = repo.read_blob(oid)?;
        let new_bytes = rewrite_id_if_json(&path, &bytes, &renamed_path)?;
        let new_oid = if new_bytes == bytes { oid } else { repo.write_blob(&new_bytes)? };
        duplicates.push(DuplicatedFile { original: path, duplicate: renamed_path.clone() });
        edits.push(TreeEdit::Upsert { path: renamed_path, mode, oid: new_oid });
    }

    let merged_tree = repo.edit_tree(remote_tree, &edits)?;
    let message = format!("combine: merge local documents from {local_db_id}");
    let commit_oid = repo.create_commit(merged_tree, &[remote_oid], &message, author, committer, Some(head_ref))?;
    repo.checkout_tree(merged_tree, workdir)?;

    engine.push(repo, opts, remote_name, head_ref, head_ref, false)?;
    repo.write_ref(tracking_ref, commit_oid, "gitddb: combine (combine-head-with-theirs)")?;

    let local_changes = derive_change_set(repo, Some(head_tree), merged_tree)?;
    let remote_changes = derive_change_set(repo, Some(remote_tree), merged_tree)?;

    Ok(SyncResult { action: SyncAction::CombineDatabase, local_changes, remote_changes, conflicts: Vec::new(), duplicates })
}

/// Insert `-from-<dbId>` before the final path component's extension (the
/// part after its last `.`), or append it if there is no extension.
fn suffix_path_with_db_id(path: &str, db_id: &str) -> String {
    let (dir, name) = path.rsplit_once('/').map_or(("", path), |(d, n)| (d, n));
    let suffixed = match name.rfind('.') {
        Some(i) => format!("{}-from-{db_id}{}", &name[..i], &name[i..]),
        None => format!("{name}-from-{db_id}"),
    };
    if dir.is_empty() { suffixed } else { format!("{dir}/{suffixed}") }
}

/// If `original_path` names a JSON document, decode it, set `_id` to the
/// renamed short id, and re-encode canonically. Any other document kind (or
/// a front-matter `.md` document, whose `_id` isn't stored in the body) is
/// passed through unchanged.
fn rewrite_id_if_json(original_path: &str, bytes: &[u8], renamed_path: &str) -> Result<Vec<u8>, GitDdbError> {
    let name = basename(original_path);
    let Some(ext_start) = name.rfind('.') else { return Ok(bytes.to_vec()) };
    let extension = &name[ext_start..];
    if extension != ".json" {
        return Ok(bytes.to_vec());
    }
    let new_name = basename(renamed_path);
    let new_short_id = &new_name[..new_name.len() - extension.len()];
    let mut value: serde_json::Value = serde_json::from_slice(bytes)?;
    if let Some(obj) = value.as_object_mut() {
        obj.insert("_id".to_owned(), serde_json::Value::String(new_short_id.to_owned()));
    }
    Serializer::Json.encode(&value)
}

/// Run [`sync_once`] under the retry/backoff loop described by `opts`: on a
/// retryable error, sleep `retry_interval_ms` and try again, up to
/// `opts.retry` attempts total (the first attempt counts toward the
/// budget). `cancelled` going true at any point aborts with
/// [`GitDdbError::TaskCancel`] instead of consuming further budget.
#[allow(clippy::too_many_arguments)]
pub fn sync_with_retry(
    repo: &dyn GitRepo,
    engine: &dyn RemoteEngine,
    workdir: &Path,
    head_ref: &RefName,
    tracking_ref: &RefName,
    remote_name: &str,
    opts: &RemoteOptions,
    local_db_id: &str,
    author: Option<&Signature>,
    committer: Option<&Signature>,
    cancelled: &AtomicBool,
) -> Result<SyncResult, GitDdbError> {
    let mut attempts_left = opts.retry.max(1);
    loop {
        if cancelled.load(Ordering::SeqCst) {
            return Err(GitDdbError::TaskCancel);
        }
        match sync_once(repo, engine, workdir, head_ref, tracking_ref, remote_name, opts, local_db_id, author, committer) {
            Ok(result) => return Ok(result),
            Err(err) if err.is_retryable() && attempts_left > 1 => {
                attempts_left -= 1;
                std::thread::sleep(Duration::from_millis(opts.retry_interval_ms));
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_nop_when_both_absent() {
        assert_eq!(classify(&NoopRepo, None, None).unwrap(), Distance::Nop);
    }

    #[test]
    fn classify_fast_forward_when_head_absent() {
        let remote = oid(1);
        assert_eq!(classify(&NoopRepo, None, Some(remote)).unwrap(), Distance::FastForward);
    }

    #[test]
    fn classify_push_when_remote_absent() {
        let head = oid(1);
        assert_eq!(classify(&NoopRepo, Some(head), None).unwrap(), Distance::Push);
    }

    #[test]
    fn render_merge_message_trivial_when_no_conflicts() {
        assert_eq!(render_merge_message(&[]), "merge");
    }

    #[test]
    fn render_merge_message_sorted_by_name() {
        let conflicts = vec![
            AcceptedConflict {
                fat_doc: FatDoc { name: "b.json".into(), short_id: Some("b".into()), file_oid: oid(2), value: DocValue::Binary(Vec::new()) },
                strategy: Strategy::OursDiff,
                operation: MergeOperation::UpdateMerge,
            },
            AcceptedConflict {
                fat_doc: FatDoc { name: "a.json".into(), short_id: Some("a".into()), file_oid: oid(1), value: DocValue::Binary(Vec::new()) },
                strategy: Strategy::TheirsDiff,
                operation: MergeOperation::Update,
            },
        ];
        let message = render_merge_message(&conflicts);
        assert!(message.starts_with("resolve: a.json(update,"));
        assert!(message.contains("), b.json(update-merge,"));
    }

    #[test]
    fn suffix_path_with_db_id_inserts_before_extension() {
        assert_eq!(suffix_path_with_db_id("notes/a.json", "01ARZ"), "notes/a-from-01ARZ.json");
    }

    #[test]
    fn suffix_path_with_db_id_appends_when_no_extension() {
        assert_eq!(suffix_path_with_db_id("a", "01ARZ"), "a-from-01ARZ");
    }

    #[test]
    fn suffix_path_with_db_id_at_root() {
        assert_eq!(suffix_path_with_db_id("a.json", "01ARZ"), "a-from-01ARZ.json");
    }

    #[test]
    fn rewrite_id_if_json_sets_new_short_id() {
        let bytes = br#"{"_id":"a","title":"hi"}"#;
        let rewritten = rewrite_id_if_json("a.json", bytes, "a-from-01ARZ.json").unwrap();
        let value: serde_json::Value = serde_json::from_slice(&rewritten).unwrap();
        assert_eq!(value["_id"], "a-from-01ARZ");
        assert_eq!(value["title"], "hi");
    }

    #[test]
    fn rewrite_id_if_json_passes_through_non_json() {
        let bytes = b"---\ntitle: hi\n---\nbody";
        let rewritten = rewrite_id_if_json("a.md", bytes, "a-from-01ARZ.md").unwrap();
        assert_eq!(rewritten, bytes);
    }

    fn oid(n: u8) -> GitOid {
        let mut bytes = [0u8; 20];
        bytes[19] = n;
        GitOid::from_bytes(bytes)
    }

    /// A `GitRepo` whose only implemented method is `merge_base`, for
    /// exercising `classify` without a real repository.
    struct NoopRepo;

    impl GitRepo for NoopRepo {
        fn read_ref(&self, _name: &RefName) -> Result<Option<GitOid>, gitddb_git::GitError> {
            unimplemented!()
        }
        fn write_ref(&self, _name: &RefName, _oid: GitOid, _log_message: &str) -> Result<(), gitddb_git::GitError> {
            unimplemented!()
        }
        fn delete_ref(&self, _name: &RefName) -> Result<(), gitddb_git::GitError> {
            unimplemented!()
        }
        fn atomic_ref_update(&self, _edits: &[gitddb_git::RefEdit]) -> Result<(), gitddb_git::GitError> {
            unimplemented!()
        }
        fn list_refs(&self, _prefix: &str) -> Result<Vec<(RefName, GitOid)>, gitddb_git::GitError> {
            unimplemented!()
        }
        fn rev_parse(&self, _spec: &str) -> Result<GitOid, gitddb_git::GitError> {
            unimplemented!()
        }
        fn rev_parse_opt(&self, _spec: &str) -> Result<Option<GitOid>, gitddb_git::GitError> {
            unimplemented!()
        }
        fn read_blob(&self, _oid: GitOid) -> Result<Vec<u8>, gitddb_git::GitError> {
            unimplemented!()
        }
        fn read_tree(&self, _oid: GitOid) -> Result<Vec<gitddb_git::TreeEntry>, gitddb_git::GitError> {
            unimplemented!()
        }
        fn read_commit(&self, _oid: GitOid) -> Result<gitddb_git::CommitInfo, gitddb_git::GitError> {
            unimplemented!()
        }
        fn write_blob(&self, _data: &[u8]) -> Result<GitOid, gitddb_git::GitError> {
            unimplemented!()
        }
        fn write_tree(&self, _entries: &[gitddb_git::TreeEntry]) -> Result<GitOid, gitddb_git::GitError> {
            unimplemented!()
        }
        fn create_commit(
            &self,
            _tree: GitOid,
            _parents: &[GitOid],
            _message: &str,
            _author: Option<&Signature>,
            _committer: Option<&Signature>,
            _update_ref: Option<&RefName>,
        ) -> Result<GitOid, gitddb_git::GitError> {
            unimplemented!()
        }
        fn edit_tree(&self, _base: GitOid, _edits: &[gitddb_git::TreeEdit]) -> Result<GitOid, gitddb_git::GitError> {
            unimplemented!()
        }
        fn read_index(&self) -> Result<Vec<gitddb_git::IndexEntry>, gitddb_git::GitError> {
            unimplemented!()
        }
        fn write_index(&self, _entries: &[gitddb_git::IndexEntry]) -> Result<(), gitddb_git::GitError> {
            unimplemented!()
        }
        fn checkout_tree(&self, _oid: GitOid, _workdir: &Path) -> Result<(), gitddb_git::GitError> {
            unimplemented!()
        }
        fn diff_trees(&self, _old: Option<GitOid>, _new: GitOid) -> Result<Vec<gitddb_git::DiffEntry>, gitddb_git::GitError> {
            unimplemented!()
        }
        fn fetch(&self, _remote: &str, _refspecs: &[String]) -> Result<(), gitddb_git::GitError> {
            unimplemented!()
        }
        fn push_branch(&self, _remote: &str, _local_ref: &str, _remote_ref: &str, _force: bool) -> Result<(), gitddb_git::GitError> {
            unimplemented!()
        }
        fn push_tag(&self, _remote: &str, _tag: &str) -> Result<(), gitddb_git::GitError> {
            unimplemented!()
        }
        fn clone_repo(_url: &str, _path: &Path) -> Result<Self, gitddb_git::GitError> {
            unimplemented!()
        }
        fn read_config(&self, _key: &str) -> Result<Option<String>, gitddb_git::GitError> {
            unimplemented!()
        }
        fn write_config(&self, _key: &str, _value: &str) -> Result<(), gitddb_git::GitError> {
            unimplemented!()
        }
        fn is_ancestor(&self, _ancestor: GitOid, _descendant: GitOid) -> Result<bool, gitddb_git::GitError> {
            unimplemented!()
        }
        fn merge_base(&self, _a: GitOid, _b: GitOid) -> Result<Option<GitOid>, gitddb_git::GitError> {
            Ok(None)
        }
    }
}
