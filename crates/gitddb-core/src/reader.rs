//! Blob & tree reader: resolves paths against a revision's tree without
//! touching the working directory.

use gitddb_git::{EntryMode, GitOid, GitRepo};

use crate::error::GitDdbError;
use crate::id::is_metadata_path;

/// Iteration order for [`Reader::list`], per the native tree order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Order {
    /// Ascending lexicographic order (git's native tree order).
    Ascending,
    /// Descending order, realized by reversing after prefix filtering.
    Descending,
}

/// Reads documents and directory listings out of a revision's tree.
pub struct Reader<'a> {
    repo: &'a dyn GitRepo,
}

impl<'a> Reader<'a> {
    /// Build a reader over the given repository.
    #[must_use]
    pub fn new(repo: &'a dyn GitRepo) -> Self {
        Self { repo }
    }

    /// Resolve a revision spec (branch name, `HEAD`, oid, etc.) to its tree OID.
    ///
    /// # Errors
    /// Returns [`GitDdbError::Git`] if the revision cannot be resolved.
    pub fn resolve_tree(&self, rev: &str) -> Result<GitOid, GitDdbError> {
        let commit_oid = self.repo.rev_parse(rev)?;
        let commit = self.repo.read_commit(commit_oid)?;
        Ok(commit.tree_oid)
    }

    /// Like [`resolve_tree`](Self::resolve_tree) but returns `None` if the
    /// revision does not exist (e.g. an empty repository with no commits yet).
    ///
    /// # Errors
    /// Returns [`GitDdbError::Git`] for errors other than "not found".
    pub fn resolve_tree_opt(&self, rev: &str) -> Result<Option<GitOid>, GitDdbError> {
        let Some(commit_oid) = self.repo.rev_parse_opt(rev)? else {
            return Ok(None);
        };
        let commit = self.repo.read_commit(commit_oid)?;
        Ok(Some(commit.tree_oid))
    }

    /// Walk a slash-separated path under `tree_oid`, returning the entry's
    /// OID and mode, or `None` if any path component is missing.
    ///
    /// # Errors
    /// Returns [`GitDdbError::Git`] on a tree-read failure.
    pub fn read_path(&self, tree_oid: GitOid, path: &str) -> Result<Option<(GitOid, EntryMode)>, GitDdbError> {
        let mut current = tree_oid;
        let mut mode = EntryMode::Tree;
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        if segments.is_empty() {
            return Ok(Some((tree_oid, EntryMode::Tree)));
        }
        for (i, segment) in segments.iter().enumerate() {
            let entries = self.repo.read_tree(current)?;
            let Some(entry) = entries.into_iter().find(|e| e.name == *segment) else {
                return Ok(None);
            };
            current = entry.oid;
            mode = entry.mode;
            if i + 1 < segments.len() && !matches!(mode, EntryMode::Tree) {
                // A non-directory entry mid-path: the requested path can't exist.
                return Ok(None);
            }
        }
        Ok(Some((current, mode)))
    }

    /// Read a document's raw blob bytes at `path` under `tree_oid`.
    ///
    /// # Errors
    /// Returns [`GitDdbError::Git`] on a read failure.
    pub fn get_blob(&self, tree_oid: GitOid, path: &str) -> Result<Option<Vec<u8>>, GitDdbError> {
        let Some((oid, mode)) = self.read_path(tree_oid, path)? else {
            return Ok(None);
        };
        if matches!(mode, EntryMode::Tree) {
            return Ok(None);
        }
        Ok(Some(self.repo.read_blob(oid)?))
    }

    /// List all blob paths under `prefix` (a collection path, possibly
    /// empty for the root), in the requested order.
    ///
    /// Metadata paths (`.gitddb/...`) are always excluded. When
    /// `recursive` is `false`, only direct children of `prefix` are
    /// returned (subdirectories are skipped, not recursed into).
    ///
    /// # Errors
    /// Returns [`GitDdbError::Git`] on a tree-read failure.
    pub fn list(
        &self,
        tree_oid: GitOid,
        prefix: &str,
        recursive: bool,
        order: Order,
    ) -> Result<Vec<(String, GitOid, EntryMode)>, GitDdbError> {
        let base = match self.read_path(tree_oid, prefix)? {
            Some((oid, EntryMode::Tree)) => oid,
            Some(_) => return Ok(Vec::new()),
            None => return Ok(Vec::new()),
        };
        let mut out = Vec::new();
        self.walk(base, prefix, recursive, &mut out)?;
        out.sort_by(|a, b| a.0.cmp(&b.0));
        if order == Order::Descending {
            out.reverse();
        }
        Ok(out)
    }

    fn walk(
        &self,
        tree_oid: GitOid,
        prefix: &str,
        recursive: bool,
        out: &mut Vec<(String, GitOid, EntryMode)>,
    ) -> Result<(), GitDdbError> {
        for entry in self.repo.read_tree(tree_oid)? {
            let full_path = if prefix.is_empty() {
                entry.name.clone()
            } else {
                format!("{prefix}{}", entry.name)
            };
            if is_metadata_path(&full_path) {
                continue;
            }
            match entry.mode {
                EntryMode::Tree => {
                    if recursive {
                        self.walk(entry.oid, &format!("{full_path}/"), recursive, out)?;
                    }
                }
                other => out.push((full_path, entry.oid, other)),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gitddb_git::{GitError, IndexEntry, RefEdit, RefName, Signature, TreeEdit, TreeEntry};
    use std::cell::RefCell;
    use std::collections::BTreeMap;
    use std::path::Path;

    /// A minimal in-memory `GitRepo` test double, just enough to exercise
    /// `Reader` without a real repository.
    struct FakeRepo {
        blobs: RefCell<BTreeMap<GitOid, Vec<u8>>>,
        trees: RefCell<BTreeMap<GitOid, Vec<TreeEntry>>>,
        next_oid: RefCell<u8>,
    }

    impl FakeRepo {
        fn new() -> Self {
            Self {
                blobs: RefCell::new(BTreeMap::new()),
                trees: RefCell::new(BTreeMap::new()),
                next_oid: RefCell::new(1),
            }
        }

        fn fresh_oid(&self) -> GitOid {
            let mut n = self.next_oid.borrow_mut();
            let mut bytes = [0u8; 20];
            bytes[19] = *n;
            *n += 1;
            GitOid::from_bytes(bytes)
        }

        fn add_blob(&self, data: &[u8]) -> GitOid {
            let oid = self.fresh_oid();
            self.blobs.borrow_mut().insert(oid, data.to_vec());
            oid
        }

        fn add_tree(&self, entries: Vec<TreeEntry>) -> GitOid {
            let oid = self.fresh_oid();
            self.trees.borrow_mut().insert(oid, entries);
            oid
        }
    }

    impl GitRepo for FakeRepo {
        fn read_ref(&self, _name: &RefName) -> Result<Option<GitOid>, GitError> {
            unimplemented!()
        }
        fn write_ref(&self, _name: &RefName, _oid: GitOid, _log_message: &str) -> Result<(), GitError> {
            unimplemented!()
        }
        fn delete_ref(&self, _name: &RefName) -> Result<(), GitError> {
            unimplemented!()
        }
        fn atomic_ref_update(&self, _edits: &[RefEdit]) -> Result<(), GitError> {
            unimplemented!()
        }
        fn list_refs(&self, _prefix: &str) -> Result<Vec<(RefName, GitOid)>, GitError> {
            unimplemented!()
        }
        fn rev_parse(&self, _spec: &str) -> Result<GitOid, GitError> {
            unimplemented!()
        }
        fn rev_parse_opt(&self, _spec: &str) -> Result<Option<GitOid>, GitError> {
            unimplemented!()
        }
        fn read_blob(&self, oid: GitOid) -> Result<Vec<u8>, GitError> {
            Ok(self.blobs.borrow().get(&oid).cloned().unwrap_or_default())
        }
        fn read_tree(&self, oid: GitOid) -> Result<Vec<TreeEntry>, GitError> {
            Ok(self.trees.borrow().get(&oid).cloned().unwrap_or_default())
        }
        fn read_commit(&self, _oid: GitOid) -> Result<gitddb_git::CommitInfo, GitError> {
            unimplemented!()
        }
        fn write_blob(&self, _data: &[u8]) -> Result<GitOid, GitError> {
            unimplemented!()
        }
        fn write_tree(&self, _entries: &[TreeEntry]) -> Result<GitOid, GitError> {
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
        ) -> Result<GitOid, GitError> {
            unimplemented!()
        }
        fn edit_tree(&self, _base: GitOid, _edits: &[TreeEdit]) -> Result<GitOid, GitError> {
            unimplemented!()
        }
        fn read_index(&self) -> Result<Vec<IndexEntry>, GitError> {
            unimplemented!()
        }
        fn write_index(&self, _entries: &[IndexEntry]) -> Result<(), GitError> {
            unimplemented!()
        }
        fn checkout_tree(&self, _oid: GitOid, _workdir: &Path) -> Result<(), GitError> {
            unimplemented!()
        }
        fn diff_trees(&self, _old: Option<GitOid>, _new: GitOid) -> Result<Vec<gitddb_git::DiffEntry>, GitError> {
            unimplemented!()
        }
        fn fetch(&self, _remote: &str, _refspecs: &[String]) -> Result<(), GitError> {
            unimplemented!()
        }
        fn push_branch(&self, _remote: &str, _local_ref: &str, _remote_ref: &str, _force: bool) -> Result<(), GitError> {
            unimplemented!()
        }
        fn push_tag(&self, _remote: &str, _tag: &str) -> Result<(), GitError> {
            unimplemented!()
        }
        fn clone_repo(_url: &str, _path: &Path) -> Result<Self, GitError> {
            unimplemented!()
        }
        fn read_config(&self, _key: &str) -> Result<Option<String>, GitError> {
            unimplemented!()
        }
        fn write_config(&self, _key: &str, _value: &str) -> Result<(), GitError> {
            unimplemented!()
        }
        fn is_ancestor(&self, _ancestor: GitOid, _descendant: GitOid) -> Result<bool, GitError> {
            unimplemented!()
        }
        fn merge_base(&self, _a: GitOid, _b: GitOid) -> Result<Option<GitOid>, GitError> {
            unimplemented!()
        }
    }

    fn build_fixture() -> (FakeRepo, GitOid) {
        let repo = FakeRepo::new();
        let blob_a = repo.add_blob(b"{\"n\":\"a\"}");
        let blob_b = repo.add_blob(b"{\"n\":\"b\"}");
        let meta_blob = repo.add_blob(b"{}");
        let notes_tree = repo.add_tree(vec![
            TreeEntry { name: "a.json".to_owned(), mode: EntryMode::Blob, oid: blob_a },
            TreeEntry { name: "b.json".to_owned(), mode: EntryMode::Blob, oid: blob_b },
        ]);
        let gitddb_tree = repo.add_tree(vec![TreeEntry {
            name: "info.json".to_owned(),
            mode: EntryMode::Blob,
            oid: meta_blob,
        }]);
        let root = repo.add_tree(vec![
            TreeEntry { name: "notes".to_owned(), mode: EntryMode::Tree, oid: notes_tree },
            TreeEntry { name: ".gitddb".to_owned(), mode: EntryMode::Tree, oid: gitddb_tree },
        ]);
        (repo, root)
    }

    #[test]
    fn read_path_finds_nested_blob() {
        let (repo, root) = build_fixture();
        let reader = Reader::new(&repo);
        let (oid, mode) = reader.read_path(root, "notes/a.json").unwrap().unwrap();
        assert_eq!(mode, EntryMode::Blob);
        assert_eq!(repo.read_blob(oid).unwrap(), b"{\"n\":\"a\"}");
    }

    #[test]
    fn read_path_missing_returns_none() {
        let (repo, root) = build_fixture();
        let reader = Reader::new(&repo);
        assert!(reader.read_path(root, "notes/missing.json").unwrap().is_none());
    }

    #[test]
    fn list_excludes_metadata_and_sorts_ascending() {
        let (repo, root) = build_fixture();
        let reader = Reader::new(&repo);
        let entries = reader.list(root, "notes/", false, Order::Ascending).unwrap();
        let names: Vec<&str> = entries.iter().map(|(p, _, _)| p.as_str()).collect();
        assert_eq!(names, vec!["notes/a.json", "notes/b.json"]);
    }

    #[test]
    fn list_descending_reverses() {
        let (repo, root) = build_fixture();
        let reader = Reader::new(&repo);
        let entries = reader.list(root, "notes/", false, Order::Descending).unwrap();
        let names: Vec<&str> = entries.iter().map(|(p, _, _)| p.as_str()).collect();
        assert_eq!(names, vec!["notes/b.json", "notes/a.json"]);
    }

    #[test]
    fn list_root_skips_metadata_directory() {
        let (repo, root) = build_fixture();
        let reader = Reader::new(&repo);
        let entries = reader.list(root, "", true, Order::Ascending).unwrap();
        let names: Vec<&str> = entries.iter().map(|(p, _, _)| p.as_str()).collect();
        assert!(!names.iter().any(|n| n.starts_with(".gitddb")));
        assert_eq!(names, vec!["notes/a.json", "notes/b.json"]);
    }
}
