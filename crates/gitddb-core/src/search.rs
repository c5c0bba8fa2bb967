//! Search hook: a lifecycle-bound plug-in the collection façade notifies
//! after each successful write (`add_index`/`update_index`/`delete_index`),
//! plus the one concrete implementation this crate ships — an in-memory
//! inverted index over JSON document string values.
//!
//! The index is opaque to the rest of the core: `Collection` only ever
//! talks to it through the [`SearchIndex`] trait.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::docs::{DocValue, FatDoc};
use crate::error::GitDdbError;

/// Where a search index persists itself, and what it's named.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchOptions {
    /// The index's name, passed back to [`SearchIndex::search`] callers as
    /// `indexName` identification (a database may run more than one index).
    pub name: String,
    /// Path [`SearchIndex::serialize`] persists a snapshot to.
    pub snapshot_path: std::path::PathBuf,
}

/// A lifecycle-bound, pluggable search index.
///
/// `open_or_create` lives on each concrete type rather than the trait
/// (it has no `self` to dispatch on); everything past construction is
/// trait-object-safe.
pub trait SearchIndex: Send {
    /// Index a freshly inserted document.
    ///
    /// # Errors
    /// Returns [`GitDdbError::InvalidDocType`] for a non-JSON document.
    fn add_index(&mut self, doc: &FatDoc) -> Result<(), GitDdbError>;

    /// Re-index a document whose content changed.
    ///
    /// # Errors
    /// Returns [`GitDdbError::InvalidDocType`] for a non-JSON document.
    fn update_index(&mut self, doc: &FatDoc) -> Result<(), GitDdbError>;

    /// Remove a document from the index.
    fn delete_index(&mut self, short_id: &str);

    /// Persist the index's current state to its configured snapshot path.
    ///
    /// # Errors
    /// Returns [`GitDdbError::Io`] or [`GitDdbError::Json`] on a write failure.
    fn serialize(&self) -> Result<(), GitDdbError>;

    /// Release any resources the index holds open. Idempotent.
    fn close(&mut self);

    /// Discard the index's persisted state entirely.
    ///
    /// # Errors
    /// Returns [`GitDdbError::Io`] if the snapshot file exists but can't be removed.
    fn destroy(&mut self) -> Result<(), GitDdbError>;

    /// Drop all entries and re-index every document in `docs` from scratch
    /// (used to recover from a HEAD that moved independently of the index).
    ///
    /// # Errors
    /// Returns [`GitDdbError::InvalidDocType`] if any document isn't JSON.
    fn rebuild(&mut self, docs: &[FatDoc]) -> Result<(), GitDdbError>;

    /// Search for `keyword` (whitespace-tokenized), returning matching short
    /// ids. `use_or` unions per-token postings instead of intersecting them.
    fn search(&self, keyword: &str, use_or: bool) -> Vec<String>;
}

/// An in-memory inverted index: lowercase word token → set of short ids
/// whose JSON string values contain it.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct InMemorySearchIndex {
    #[serde(skip)]
    options: Option<SearchOptions>,
    postings: BTreeMap<String, BTreeSet<String>>,
    tokens_by_id: BTreeMap<String, BTreeSet<String>>,
}

impl InMemorySearchIndex {
    /// Open the index at `options.snapshot_path` if a snapshot exists there,
    /// otherwise create a fresh empty one.
    ///
    /// # Errors
    /// Returns [`GitDdbError::Json`] if an existing snapshot is malformed.
    pub fn open_or_create(options: SearchOptions) -> Result<Self, GitDdbError> {
        let mut index = match std::fs::read(&options.snapshot_path) {
            Ok(bytes) => serde_json::from_slice::<Self>(&bytes)?,
            Err(_) => Self::default(),
        };
        index.options = Some(options);
        Ok(index)
    }

    fn short_id_of(doc: &FatDoc) -> Result<String, GitDdbError> {
        doc.short_id.clone().ok_or(GitDdbError::InvalidDocType { path: doc.name.clone() })
    }

    fn tokenize(value: &Value, out: &mut BTreeSet<String>) {
        match value {
            Value::String(s) => out.extend(tokenize_str(s)),
            Value::Object(map) => {
                for (k, v) in map {
                    if !k.starts_with('_') {
                        Self::tokenize(v, out);
                    }
                }
            }
            Value::Array(items) => items.iter().for_each(|v| Self::tokenize(v, out)),
            _ => {}
        }
    }

    fn index_tokens(&mut self, short_id: String, doc: &FatDoc) -> Result<(), GitDdbError> {
        let DocValue::Json(value) = &doc.value else {
            return Err(GitDdbError::InvalidDocType { path: doc.name.clone() });
        };
        let mut tokens = BTreeSet::new();
        Self::tokenize(value, &mut tokens);
        for token in &tokens {
            self.postings.entry(token.clone()).or_default().insert(short_id.clone());
        }
        self.tokens_by_id.insert(short_id, tokens);
        Ok(())
    }

    fn remove_tokens(&mut self, short_id: &str) {
        let Some(tokens) = self.tokens_by_id.remove(short_id) else { return };
        for token in tokens {
            if let Some(ids) = self.postings.get_mut(&token) {
                ids.remove(short_id);
                if ids.is_empty() {
                    self.postings.remove(&token);
                }
            }
        }
    }
}

fn tokenize_str(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

impl SearchIndex for InMemorySearchIndex {
    fn add_index(&mut self, doc: &FatDoc) -> Result<(), GitDdbError> {
        let short_id = Self::short_id_of(doc)?;
        self.index_tokens(short_id, doc)
    }

    fn update_index(&mut self, doc: &FatDoc) -> Result<(), GitDdbError> {
        let short_id = Self::short_id_of(doc)?;
        self.remove_tokens(&short_id);
        self.index_tokens(short_id, doc)
    }

    fn delete_index(&mut self, short_id: &str) {
        self.remove_tokens(short_id);
    }

    fn serialize(&self) -> Result<(), GitDdbError> {
        let Some(options) = &self.options else { return Ok(()) };
        let bytes = serde_json::to_vec(self)?;
        std::fs::write(&options.snapshot_path, bytes)?;
        Ok(())
    }

    fn close(&mut self) {
        self.options = None;
    }

    fn destroy(&mut self) -> Result<(), GitDdbError> {
        self.postings.clear();
        self.tokens_by_id.clear();
        if let Some(options) = self.options.take() {
            match std::fs::remove_file(&options.snapshot_path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    fn rebuild(&mut self, docs: &[FatDoc]) -> Result<(), GitDdbError> {
        self.postings.clear();
        self.tokens_by_id.clear();
        for doc in docs {
            let short_id = Self::short_id_of(doc)?;
            self.index_tokens(short_id, doc)?;
        }
        Ok(())
    }

    fn search(&self, keyword: &str, use_or: bool) -> Vec<String> {
        let tokens = tokenize_str(keyword);
        if tokens.is_empty() {
            return Vec::new();
        }
        let mut sets = tokens.iter().filter_map(|t| self.postings.get(t));
        let Some(first) = sets.next() else { return Vec::new() };
        let mut result = first.clone();
        for set in sets {
            if use_or {
                result = result.union(set).cloned().collect();
            } else {
                result = result.intersection(set).cloned().collect();
            }
        }
        result.into_iter().collect()
    }
}

/// Mirror of [`InMemorySearchIndex::open_or_create`], named per spec's
/// `openOrCreate(collection, options) → SearchIndex` signature (the
/// collection path itself isn't needed by this particular index, since
/// `snapshot_path` already identifies it uniquely).
///
/// # Errors
/// Returns [`GitDdbError::Json`] if an existing snapshot is malformed.
pub fn open_or_create(_collection_path: &str, options: SearchOptions) -> Result<InMemorySearchIndex, GitDdbError> {
    InMemorySearchIndex::open_or_create(options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gitddb_git::GitOid;
    use serde_json::json;

    fn doc(short_id: &str, value: Value) -> FatDoc {
        FatDoc { name: format!("{short_id}.json"), short_id: Some(short_id.to_owned()), file_oid: GitOid::ZERO, value: DocValue::Json(value) }
    }

    fn options(dir: &Path) -> SearchOptions {
        SearchOptions { name: "default".to_owned(), snapshot_path: dir.join("index.snapshot") }
    }

    #[test]
    fn add_then_search_finds_token() {
        let dir = tempfile::tempdir().unwrap();
        let mut index = InMemorySearchIndex::open_or_create(options(dir.path())).unwrap();
        index.add_index(&doc("a", json!({"title": "Hello World"}))).unwrap();
        assert_eq!(index.search("hello", false), vec!["a".to_owned()]);
    }

    #[test]
    fn delete_removes_from_postings() {
        let dir = tempfile::tempdir().unwrap();
        let mut index = InMemorySearchIndex::open_or_create(options(dir.path())).unwrap();
        index.add_index(&doc("a", json!({"title": "apple"}))).unwrap();
        index.delete_index("a");
        assert!(index.search("apple", false).is_empty());
    }

    #[test]
    fn and_search_requires_all_tokens() {
        let dir = tempfile::tempdir().unwrap();
        let mut index = InMemorySearchIndex::open_or_create(options(dir.path())).unwrap();
        index.add_index(&doc("a", json!({"title": "apple pie"}))).unwrap();
        index.add_index(&doc("b", json!({"title": "apple juice"}))).unwrap();
        assert_eq!(index.search("apple pie", false), vec!["a".to_owned()]);
    }

    #[test]
    fn or_search_unions_tokens() {
        let dir = tempfile::tempdir().unwrap();
        let mut index = InMemorySearchIndex::open_or_create(options(dir.path())).unwrap();
        index.add_index(&doc("a", json!({"title": "apple"}))).unwrap();
        index.add_index(&doc("b", json!({"title": "juice"}))).unwrap();
        let mut found = index.search("apple juice", true);
        found.sort();
        assert_eq!(found, vec!["a".to_owned(), "b".to_owned()]);
    }

    #[test]
    fn serialize_then_reopen_restores_postings() {
        let dir = tempfile::tempdir().unwrap();
        let opts = options(dir.path());
        let mut index = InMemorySearchIndex::open_or_create(opts.clone()).unwrap();
        index.add_index(&doc("a", json!({"title": "durable"}))).unwrap();
        index.serialize().unwrap();

        let reopened = InMemorySearchIndex::open_or_create(opts).unwrap();
        assert_eq!(reopened.search("durable", false), vec!["a".to_owned()]);
    }

    #[test]
    fn rebuild_replaces_prior_state() {
        let dir = tempfile::tempdir().unwrap();
        let mut index = InMemorySearchIndex::open_or_create(options(dir.path())).unwrap();
        index.add_index(&doc("a", json!({"title": "stale"}))).unwrap();
        index.rebuild(&[doc("b", json!({"title": "fresh"}))]).unwrap();
        assert!(index.search("stale", false).is_empty());
        assert_eq!(index.search("fresh", false), vec!["b".to_owned()]);
    }

    #[test]
    fn add_index_rejects_non_json_doc() {
        let dir = tempfile::tempdir().unwrap();
        let mut index = InMemorySearchIndex::open_or_create(options(dir.path())).unwrap();
        let text_doc = FatDoc { name: "a.txt".to_owned(), short_id: None, file_oid: GitOid::ZERO, value: DocValue::Text("hi".to_owned()) };
        assert!(index.add_index(&text_doc).is_err());
    }
}
