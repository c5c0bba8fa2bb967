//! Commit worker: stage → write-tree → commit(HEAD) with templated messages.
//!
//! Composes `GitRepo::{write_blob, edit_tree, create_commit}` exactly as
//! `gitddb_git::objects_impl` does internally, plus the working-directory
//! mirror maintained by [`crate::workdir`].

use gitddb_git::{EntryMode, GitOid, GitRepo, RefName, Signature, TreeEdit};

use crate::error::GitDdbError;
use crate::workdir;

/// A commit produced by the commit worker, normalized for event payloads.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NormalizedCommit {
    /// The commit's OID.
    pub oid: GitOid,
    /// The final commit message, after placeholder substitution.
    pub message: String,
    /// Parent commit OIDs (empty for the first commit).
    pub parents: Vec<GitOid>,
}

/// The result of a single put or delete operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitResult {
    /// OID of the written blob. [`GitOid::ZERO`] for a delete.
    pub file_oid: GitOid,
    /// The commit that recorded this change.
    pub commit: NormalizedCommit,
    /// The full path that was written or removed.
    pub name: String,
}

/// Substitute `<%file_oid%>` and `<%short_oid%>` placeholders in a commit
/// message template, then splice in the path.
///
/// Defaults (when `template` is `None`) are `"insert: <path>(<short-oid>)"`
/// for inserts/updates and `"delete: <path>(<short-oid>)"` for deletes,
/// selected by the caller.
#[must_use]
pub fn render_template(template: &str, path: &str, file_oid: GitOid) -> String {
    let short_oid = &file_oid.to_string()[..7];
    template
        .replace("<%file_oid%>", &file_oid.to_string())
        .replace("<%short_oid%>", short_oid)
        .replace("<path>", path)
}

/// Default put message template for an id that did not already exist.
pub const DEFAULT_INSERT_TEMPLATE: &str = "insert: <path>(<%short_oid%>)";
/// Default put message template for an id that already existed.
pub const DEFAULT_UPDATE_TEMPLATE: &str = "update: <path>(<%short_oid%>)";
/// Default delete message template.
pub const DEFAULT_DELETE_TEMPLATE: &str = "delete: <path>(<%short_oid%>)";

/// Resolve `head_ref`'s current commit (`None` on an empty repository) and
/// its tree OID (the empty tree's analogue, `None`, on an empty repository).
fn resolve_head(repo: &dyn GitRepo, head_ref: &RefName) -> Result<(Option<GitOid>, Option<GitOid>), GitDdbError> {
    let Some(head_oid) = repo.read_ref(head_ref)? else {
        return Ok((None, None));
    };
    let commit = repo.read_commit(head_oid)?;
    Ok((Some(head_oid), Some(commit.tree_oid)))
}

/// Put (insert or update) a document at `full_path`.
///
/// Writes `data` to the working directory, writes the blob and an updated
/// tree, then commits on `head_ref` with `author`/`committer` and a message
/// rendered from `message_template`.
///
/// # Errors
/// Returns [`GitDdbError::Git`] on any underlying git operation failure.
#[allow(clippy::too_many_arguments)]
pub fn put(
    repo: &dyn GitRepo,
    workdir: &std::path::Path,
    head_ref: &RefName,
    full_path: &str,
    data: &[u8],
    message_template: &str,
    author: Option<&Signature>,
    committer: Option<&Signature>,
) -> Result<CommitResult, GitDdbError> {
    workdir::write_file(workdir, full_path, data)?;

    let file_oid = repo.write_blob(data)?;
    let (parent_oid, base_tree) = resolve_head(repo, head_ref)?;

    let base_tree = match base_tree {
        Some(tree) => tree,
        None => repo.write_tree(&[])?,
    };
    let edit = TreeEdit::Upsert {
        path: full_path.to_owned(),
        mode: EntryMode::Blob,
        oid: file_oid,
    };
    let new_tree = repo.edit_tree(base_tree, &[edit])?;

    let message = render_template(message_template, full_path, file_oid);
    let parents: Vec<GitOid> = parent_oid.into_iter().collect();
    let commit_oid = repo.create_commit(new_tree, &parents, &message, author, committer, Some(head_ref))?;

    Ok(CommitResult {
        file_oid,
        commit: NormalizedCommit { oid: commit_oid, message, parents },
        name: full_path.to_owned(),
    })
}

/// Delete a document at `full_path`.
///
/// Fails with [`GitDdbError::DocumentNotFound`] if `full_path` does not
/// exist in `head_ref`'s tree. Commits the removal first, then removes the
/// working-directory file and prunes empty parent directories.
///
/// # Errors
/// Returns [`GitDdbError::DocumentNotFound`] or [`GitDdbError::Git`].
pub fn delete(
    repo: &dyn GitRepo,
    workdir: &std::path::Path,
    head_ref: &RefName,
    full_path: &str,
    message_template: &str,
    author: Option<&Signature>,
    committer: Option<&Signature>,
) -> Result<CommitResult, GitDdbError> {
    let (parent_oid, base_tree) = resolve_head(repo, head_ref)?;
    let Some(base_tree) = base_tree else {
        return Err(GitDdbError::DocumentNotFound { id: full_path.to_owned() });
    };

    let existing = crate::reader::Reader::new(repo).read_path(base_tree, full_path)?;
    let Some((old_oid, _mode)) = existing else {
        return Err(GitDdbError::DocumentNotFound { id: full_path.to_owned() });
    };

    let new_tree = repo.edit_tree(base_tree, &[TreeEdit::Remove { path: full_path.to_owned() }])?;
    let message = render_template(message_template, full_path, old_oid);
    let parents: Vec<GitOid> = parent_oid.into_iter().collect();
    let commit_oid = repo.create_commit(new_tree, &parents, &message, author, committer, Some(head_ref))?;

    workdir::remove_file(workdir, full_path)?;

    Ok(CommitResult {
        file_oid: GitOid::ZERO,
        commit: NormalizedCommit { oid: commit_oid, message, parents },
        name: full_path.to_owned(),
    })
}
