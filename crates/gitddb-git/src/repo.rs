//! The [`GitRepo`] trait — the single abstraction boundary between gitddb and git.
//!
//! All gitddb crates interact with git exclusively through this trait. The
//! trait is object-safe so callers can use `dyn GitRepo` or `Box<dyn GitRepo>`.
//!
//! Method groups, following the git operation categories identified for the
//! document-database workload:
//!
//! | Group        | Methods                                                |
//! |--------------|---------------------------------------------------------|
//! | Refs         | `read_ref`, `write_ref`, `delete_ref`, `atomic_ref_update`, `list_refs` |
//! | Rev-parse    | `rev_parse`, `rev_parse_opt`                            |
//! | Object read  | `read_blob`, `read_tree`, `read_commit`                 |
//! | Object write | `write_blob`, `write_tree`, `create_commit`             |
//! | Tree editing | `edit_tree`                                             |
//! | Index        | `read_index`, `write_index`                             |
//! | Checkout     | `checkout_tree`                                         |
//! | Diff         | `diff_trees`                                            |
//! | Remote       | `fetch`, `push_branch`, `push_tag`, `clone_repo`        |
//! | Config       | `read_config`, `write_config`                           |
//! | Ancestry     | `is_ancestor`, `merge_base`                             |

use std::path::Path;

use crate::error::GitError;
use crate::types::{
    CommitInfo, DiffEntry, GitOid, IndexEntry, RefEdit, RefName, Signature, TreeEdit, TreeEntry,
};

/// The git abstraction trait used by all gitddb crates.
///
/// Implementations may be backed by gix (the preferred backend), a git CLI
/// shim (for operations gix does not yet expose at a high level), or a test
/// double.
///
/// # Object safety
///
/// This trait is object-safe: no generic methods, no `Self` in return position
/// outside of `Result`. Callers may use `&dyn GitRepo` or `Box<dyn GitRepo>`.
pub trait GitRepo {
    // -----------------------------------------------------------------------
    // Refs
    //
    // Replaces: git rev-parse, git update-ref, git update-ref -d,
    //           git update-ref --stdin, git for-each-ref
    // -----------------------------------------------------------------------

    /// Resolve a ref to its OID, returning `None` if the ref does not exist.
    ///
    /// Replaces: `git rev-parse <ref>` (when used to resolve a known ref name).
    fn read_ref(&self, name: &RefName) -> Result<Option<GitOid>, GitError>;

    /// Create or overwrite a ref unconditionally.
    ///
    /// Replaces: `git update-ref <name> <oid>`.
    ///
    /// `log_message` is written to the reflog entry. Pass an empty string if
    /// no reflog message is needed.
    fn write_ref(&self, name: &RefName, oid: GitOid, log_message: &str) -> Result<(), GitError>;

    /// Delete a ref. No-op if the ref does not exist.
    ///
    /// Replaces: `git update-ref -d <name>`.
    fn delete_ref(&self, name: &RefName) -> Result<(), GitError>;

    /// Atomically apply a batch of ref updates with compare-and-swap semantics.
    ///
    /// All updates succeed or all fail. Each [`RefEdit`] carries an expected
    /// old OID; if any ref's current value differs, the entire transaction is
    /// aborted and [`GitError::RefConflict`] is returned.
    ///
    /// Replaces: `git update-ref --stdin` with `start`/`prepare`/`commit`.
    fn atomic_ref_update(&self, edits: &[RefEdit]) -> Result<(), GitError>;

    /// List refs matching a prefix (e.g., `"refs/gitddb/"`, `"refs/heads/"`).
    ///
    /// Returns `(ref_name, oid)` pairs sorted by ref name. The prefix is
    /// matched literally.
    ///
    /// Replaces: `git for-each-ref --format=... refs/some/prefix/`.
    fn list_refs(&self, prefix: &str) -> Result<Vec<(RefName, GitOid)>, GitError>;

    // -----------------------------------------------------------------------
    // Rev-parse
    //
    // Replaces: git rev-parse <spec>
    // -----------------------------------------------------------------------

    /// Resolve a revision specification to an OID.
    ///
    /// Supports the same syntax as `git rev-parse`: commit-ish references,
    /// `HEAD~3`, `@{u}`, etc.
    ///
    /// Returns [`GitError::NotFound`] if the spec cannot be resolved.
    ///
    /// Replaces: `git rev-parse <spec>` (general revspec resolution).
    fn rev_parse(&self, spec: &str) -> Result<GitOid, GitError>;

    /// Like [`rev_parse`](Self::rev_parse) but returns `None` instead of an
    /// error when the spec cannot be resolved.
    fn rev_parse_opt(&self, spec: &str) -> Result<Option<GitOid>, GitError>;

    // -----------------------------------------------------------------------
    // Object read
    //
    // Replaces: git cat-file blob, git ls-tree, git cat-file commit,
    //           git cat-file -t, git cat-file -p
    // -----------------------------------------------------------------------

    /// Read the contents of a blob object.
    ///
    /// Returns the raw byte content.
    ///
    /// Replaces: `git cat-file blob <oid>`.
    fn read_blob(&self, oid: GitOid) -> Result<Vec<u8>, GitError>;

    /// Read the entries of a tree object.
    ///
    /// Returns the flat list of entries (one level deep, not recursive).
    ///
    /// Replaces: `git ls-tree <oid>`.
    fn read_tree(&self, oid: GitOid) -> Result<Vec<TreeEntry>, GitError>;

    /// Read a commit object's metadata.
    ///
    /// Replaces: `git cat-file commit <oid>` / `git log -1 --format=...`.
    fn read_commit(&self, oid: GitOid) -> Result<CommitInfo, GitError>;

    // -----------------------------------------------------------------------
    // Object write
    //
    // Replaces: git hash-object -w, git mktree, git commit-tree
    // -----------------------------------------------------------------------

    /// Write a blob to the object store and return its OID.
    ///
    /// Replaces: `git hash-object -w --stdin` / writing a blob via the
    /// object database.
    fn write_blob(&self, data: &[u8]) -> Result<GitOid, GitError>;

    /// Write a tree object from a list of entries and return its OID.
    ///
    /// Replaces: `git mktree`.
    fn write_tree(&self, entries: &[TreeEntry]) -> Result<GitOid, GitError>;

    /// Create a commit object and optionally update a ref to point to it.
    ///
    /// If `update_ref` is `Some`, the given ref is updated to the new commit
    /// OID after the commit is written. `author`/`committer` default to the
    /// repository's configured identity when `None`.
    ///
    /// Replaces: `git commit-tree` + optional `git update-ref`.
    fn create_commit(
        &self,
        tree: GitOid,
        parents: &[GitOid],
        message: &str,
        author: Option<&Signature>,
        committer: Option<&Signature>,
        update_ref: Option<&RefName>,
    ) -> Result<GitOid, GitError>;

    // -----------------------------------------------------------------------
    // Tree editing
    //
    // Replaces: sequences of git ls-tree + git mktree for path-based edits
    // -----------------------------------------------------------------------

    /// Apply a set of edits to an existing tree and return the OID of the new tree.
    ///
    /// Edits may insert, update, or remove entries at arbitrary paths
    /// (including nested paths like `"collection/doc.json"`). Intermediate
    /// trees are created or updated as needed.
    ///
    /// Replaces: manual tree traversal + `git mktree` pipelines.
    fn edit_tree(&self, base: GitOid, edits: &[TreeEdit]) -> Result<GitOid, GitError>;

    // -----------------------------------------------------------------------
    // Index
    //
    // Replaces: git ls-files, git read-tree, git update-index
    // -----------------------------------------------------------------------

    /// Read the current index (staging area) entries.
    ///
    /// Replaces: `git ls-files --stage`.
    fn read_index(&self) -> Result<Vec<IndexEntry>, GitError>;

    /// Replace the index with the given entries.
    ///
    /// Replaces: `git read-tree` + `git update-index`.
    fn write_index(&self, entries: &[IndexEntry]) -> Result<(), GitError>;

    // -----------------------------------------------------------------------
    // Checkout
    //
    // Replaces: git checkout <branch>, git checkout <oid> -- .,
    //           git read-tree + checkout-index
    // -----------------------------------------------------------------------

    /// Check out a tree into the working directory.
    ///
    /// Materializes the tree at `oid` into `workdir`, updating the index
    /// to match. Existing working-tree files not in the tree are removed.
    ///
    /// Replaces: `git checkout <oid> -- .` / `git read-tree -u <oid>`.
    fn checkout_tree(&self, oid: GitOid, workdir: &Path) -> Result<(), GitError>;

    // -----------------------------------------------------------------------
    // Diff
    //
    // Replaces: git diff-tree --no-commit-id -r, git diff --name-status
    // -----------------------------------------------------------------------

    /// Diff two trees and return the list of changed files.
    ///
    /// If `old` is `None`, the diff is against an empty tree (i.e., all files
    /// in `new` appear as additions).
    ///
    /// Replaces: `git diff-tree -r <old> <new>`.
    fn diff_trees(&self, old: Option<GitOid>, new: GitOid) -> Result<Vec<DiffEntry>, GitError>;

    // -----------------------------------------------------------------------
    // Remote
    //
    // Replaces: git fetch, git push, git clone. gix does not yet expose a
    // high-level fetch/push/clone API, so these are implemented as git CLI
    // subprocess calls (see remote_impl).
    // -----------------------------------------------------------------------

    /// Fetch refs from a remote into the local ref namespace.
    ///
    /// `refspecs` follows the usual `git fetch` refspec syntax
    /// (`"+refs/heads/*:refs/remotes/origin/*"`).
    ///
    /// Replaces: `git fetch <remote> <refspecs...>`.
    fn fetch(&self, remote: &str, refspecs: &[String]) -> Result<(), GitError>;

    /// Push a local ref to a remote.
    ///
    /// If `force` is true, the push is a force-push (`git push --force`).
    ///
    /// Replaces: `git push <remote> <local_ref>:<remote_ref>` (or `--force`).
    fn push_branch(
        &self,
        remote: &str,
        local_ref: &str,
        remote_ref: &str,
        force: bool,
    ) -> Result<(), GitError>;

    /// Push a single tag to a remote.
    ///
    /// Replaces: `git push <remote> <tag>`.
    fn push_tag(&self, remote: &str, tag: &str) -> Result<(), GitError>;

    /// Clone a remote repository into `path`.
    ///
    /// Replaces: `git clone <url> <path>`.
    fn clone_repo(url: &str, path: &Path) -> Result<Self, GitError>
    where
        Self: Sized;

    // -----------------------------------------------------------------------
    // Config
    //
    // Replaces: git config <key>, git config <key> <value>
    // -----------------------------------------------------------------------

    /// Read a git config value. Returns `None` if the key is not set.
    ///
    /// Replaces: `git config --get <key>`.
    fn read_config(&self, key: &str) -> Result<Option<String>, GitError>;

    /// Set a git config value.
    ///
    /// Replaces: `git config <key> <value>`.
    fn write_config(&self, key: &str, value: &str) -> Result<(), GitError>;

    // -----------------------------------------------------------------------
    // Ancestry
    //
    // Replaces: git merge-base --is-ancestor, git merge-base
    // -----------------------------------------------------------------------

    /// Check if `ancestor` is an ancestor of `descendant`.
    ///
    /// Returns `true` if `ancestor` is reachable from `descendant` following
    /// parent links.
    ///
    /// Replaces: `git merge-base --is-ancestor <ancestor> <descendant>`.
    fn is_ancestor(&self, ancestor: GitOid, descendant: GitOid) -> Result<bool, GitError>;

    /// Find the best common ancestor (merge base) of two commits.
    ///
    /// Returns `None` if the commits have no common ancestor.
    ///
    /// Replaces: `git merge-base <a> <b>`.
    fn merge_base(&self, a: GitOid, b: GitOid) -> Result<Option<GitOid>, GitError>;
}
