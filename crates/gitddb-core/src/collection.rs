//! Collection façade: `put`/`insert`/`update`/`delete`/`get`/`getHistory`/
//! `find`/`findFatDoc`, each composing validation, task enqueueing, and the
//! `commit`/`reader`/`history` workers underneath.
//!
//! Mutations run through the [`TaskQueue`] (single-writer FIFO); reads go
//! straight through [`Reader`], bypassing the queue entirely, matching the
//! queue module's own stated boundary.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};

use gitddb_git::{GitOid, GitRepo, RefName, Signature};
use serde_json::Value;

use crate::commit::{self, CommitResult, DEFAULT_DELETE_TEMPLATE, DEFAULT_INSERT_TEMPLATE, DEFAULT_UPDATE_TEMPLATE};
use crate::docs::{DocValue, FatDoc};
use crate::error::GitDdbError;
use crate::history::{self, CommitFilter};
use crate::id::{CollectionPath, ShortId};
use crate::queue::{Task, TaskLabel, TaskMeta, TaskQueue};
use crate::reader::{Order, Reader};
use crate::search::SearchIndex;
use crate::serialize::Serializer;
use crate::sync::build_fat_doc;

/// Shared, `Send + Sync` repository access plus identity, handed down from
/// the owning `Database` to every `Collection` (including nested ones).
pub struct RepoContext {
    /// The backing repository.
    pub repo: Arc<dyn GitRepo + Send + Sync>,
    /// The checked-out working directory mirroring `head_ref`'s tree.
    pub workdir: PathBuf,
    /// The branch this database's collections read/write.
    pub head_ref: RefName,
    /// The task queue mutations are funneled through.
    pub queue: Arc<TaskQueue>,
    /// Set once the database has started closing; new operations are rejected.
    pub closing: Arc<AtomicBool>,
    /// Commit author identity, if configured.
    pub author: Option<Signature>,
    /// Commit committer identity, if configured.
    pub committer: Option<Signature>,
    /// The search index writes are reported to, if one is attached.
    pub search_index: Option<Arc<Mutex<dyn SearchIndex>>>,
}

impl RepoContext {
    fn check_open(&self) -> Result<(), GitDdbError> {
        if self.closing.load(Ordering::SeqCst) {
            return Err(GitDdbError::DatabaseClosing);
        }
        Ok(())
    }
}

/// A view over one collection (directory prefix) of documents.
pub struct Collection {
    path: CollectionPath,
    serializer: Serializer,
    ctx: Arc<RepoContext>,
}

impl Collection {
    /// Build a façade over the root collection.
    #[must_use]
    pub fn root(ctx: Arc<RepoContext>) -> Self {
        Self { path: CollectionPath::root(), serializer: Serializer::Json, ctx }
    }

    /// Build a façade over a named collection, using `serializer` for its
    /// documents.
    ///
    /// # Errors
    /// Returns [`GitDdbError::InvalidCollectionPath`] if `path` is invalid.
    pub fn at(path: &str, serializer: Serializer, ctx: Arc<RepoContext>) -> Result<Self, GitDdbError> {
        Ok(Self { path: CollectionPath::new(path)?, serializer, ctx })
    }

    /// Return a façade nested under this one, per the spec's "collections
    /// may nest" allowance.
    ///
    /// # Errors
    /// Returns [`GitDdbError::InvalidCollectionPath`] if `sub_prefix` is invalid.
    pub fn collection(&self, sub_prefix: &str) -> Result<Self, GitDdbError> {
        Ok(Self { path: self.path.join(sub_prefix)?, serializer: self.serializer, ctx: Arc::clone(&self.ctx) })
    }

    fn short_name(&self, short_id: &ShortId) -> String {
        format!("{short_id}{}", self.serializer.extension())
    }

    fn head_tree(&self) -> Result<Option<GitOid>, GitDdbError> {
        Reader::new(self.ctx.repo.as_ref()).resolve_tree_opt(self.ctx.head_ref.as_str())
    }

    fn exists(&self, full_path: &str) -> Result<bool, GitDdbError> {
        let Some(tree) = self.head_tree()? else { return Ok(false) };
        Ok(Reader::new(self.ctx.repo.as_ref()).read_path(tree, full_path)?.is_some())
    }

    /// Run `op` on the task queue under `label`, blocking until it completes
    /// (or is cancelled by a `close({force:true})` drain).
    ///
    /// # Errors
    /// Propagates whatever `op` returns, or [`GitDdbError::TaskCancel`] if
    /// the task was cancelled before it ran.
    fn run_task<T, F>(&self, label: TaskLabel, op: F) -> Result<T, GitDdbError>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T, GitDdbError> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let tx_cancel = tx.clone();
        let task = Task::new(
            TaskMeta::new(label),
            move || {
                let result = op();
                let outcome = if result.is_ok() { Ok(()) } else { Err(GitDdbError::TaskCancel) };
                let _ = tx.send(result);
                outcome
            },
            move || {
                let _ = tx_cancel.send(Err(GitDdbError::TaskCancel));
            },
        );
        self.ctx.queue.push(task);
        rx.recv().map_err(|_| GitDdbError::TaskCancel)?
    }

    /// Shared write path for `put`/`insert`/`update`: encode, render the
    /// message template, and enqueue the commit under `label` (so each
    /// façade method's completions land in its own [`Statistics`](crate::queue::Statistics)
    /// counter). `is_insert` decides whether the search hook (if attached)
    /// sees `addIndex` or `updateIndex` once the commit lands.
    fn write_doc(
        &self,
        label: TaskLabel,
        short_id: &str,
        data: Value,
        message_template: Option<&str>,
        default_template: &'static str,
        is_insert: bool,
    ) -> Result<CommitResult, GitDdbError> {
        self.ctx.check_open()?;
        let id = ShortId::new(short_id)?;
        let short_name = self.short_name(&id);
        let full_path = self.path.full_path(&short_name)?;
        let bytes = self.serializer.encode(&data)?;
        let template = message_template.map(str::to_owned).unwrap_or_else(|| default_template.to_owned());

        let repo = Arc::clone(&self.ctx.repo);
        let workdir = self.ctx.workdir.clone();
        let head_ref = self.ctx.head_ref.clone();
        let author = self.ctx.author.clone();
        let committer = self.ctx.committer.clone();
        let search_index = self.ctx.search_index.clone();
        let short_id_owned = short_id.to_owned();
        self.run_task(label, move || {
            let result = commit::put(repo.as_ref(), &workdir, &head_ref, &full_path, &bytes, &template, author.as_ref(), committer.as_ref())?;
            if let Some(index) = &search_index {
                let fat_doc = FatDoc { name: short_name, short_id: Some(short_id_owned), file_oid: result.file_oid, value: DocValue::Json(data) };
                let mut index = index.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
                if is_insert { index.add_index(&fat_doc)?; } else { index.update_index(&fat_doc)?; }
            }
            Ok(result)
        })
    }

    /// Insert-or-update `short_id` with `data`, unconditionally.
    ///
    /// # Errors
    /// Returns [`GitDdbError::DatabaseClosing`], an id-validation error, or
    /// whatever the underlying commit worker returns.
    pub fn put(&self, short_id: &str, data: Value, message_template: Option<&str>) -> Result<CommitResult, GitDdbError> {
        self.ctx.check_open()?;
        let id = ShortId::new(short_id)?;
        let full_path = self.path.full_path(&self.short_name(&id))?;
        let is_insert = !self.exists(&full_path)?;
        let default_template = if is_insert { DEFAULT_INSERT_TEMPLATE } else { DEFAULT_UPDATE_TEMPLATE };
        self.write_doc(TaskLabel::Put, short_id, data, message_template, default_template, is_insert)
    }

    /// Insert `short_id` with `data`. Fails if the id already exists in HEAD.
    ///
    /// # Errors
    /// Returns [`GitDdbError::SameIdExists`] if `short_id` is already present,
    /// or whatever the underlying commit worker returns.
    pub fn insert(&self, short_id: &str, data: Value, message_template: Option<&str>) -> Result<CommitResult, GitDdbError> {
        self.ctx.check_open()?;
        let id = ShortId::new(short_id)?;
        let full_path = self.path.full_path(&self.short_name(&id))?;
        if self.exists(&full_path)? {
            return Err(GitDdbError::SameIdExists { id: short_id.to_owned() });
        }
        self.write_doc(TaskLabel::Insert, short_id, data, message_template, DEFAULT_INSERT_TEMPLATE, true)
    }

    /// Update `short_id` with `data`. Fails if the id does not yet exist.
    ///
    /// # Errors
    /// Returns [`GitDdbError::DocumentNotFound`] if `short_id` is absent, or
    /// whatever the underlying commit worker returns.
    pub fn update(&self, short_id: &str, data: Value, message_template: Option<&str>) -> Result<CommitResult, GitDdbError> {
        self.ctx.check_open()?;
        let id = ShortId::new(short_id)?;
        let full_path = self.path.full_path(&self.short_name(&id))?;
        if !self.exists(&full_path)? {
            return Err(GitDdbError::DocumentNotFound { id: short_id.to_owned() });
        }
        self.write_doc(TaskLabel::Update, short_id, data, message_template, DEFAULT_UPDATE_TEMPLATE, false)
    }

    /// Delete `short_id`.
    ///
    /// # Errors
    /// Returns [`GitDdbError::DocumentNotFound`] if `short_id` does not exist.
    pub fn delete(&self, short_id: &str, message_template: Option<&str>) -> Result<CommitResult, GitDdbError> {
        self.ctx.check_open()?;
        let id = ShortId::new(short_id)?;
        let full_path = self.path.full_path(&self.short_name(&id))?;
        let template = message_template.unwrap_or(DEFAULT_DELETE_TEMPLATE).to_owned();

        let repo = Arc::clone(&self.ctx.repo);
        let workdir = self.ctx.workdir.clone();
        let head_ref = self.ctx.head_ref.clone();
        let author = self.ctx.author.clone();
        let committer = self.ctx.committer.clone();
        let search_index = self.ctx.search_index.clone();
        let short_id_owned = short_id.to_owned();
        self.run_task(TaskLabel::Delete, move || {
            let result = commit::delete(repo.as_ref(), &workdir, &head_ref, &full_path, &template, author.as_ref(), committer.as_ref())?;
            if let Some(index) = &search_index {
                index.lock().unwrap_or_else(std::sync::PoisonError::into_inner).delete_index(&short_id_owned);
            }
            Ok(result)
        })
    }

    /// Read `short_id`'s current value, bypassing the task queue.
    ///
    /// # Errors
    /// Returns [`GitDdbError::DocumentNotFound`] if absent, or a decode error.
    pub fn get(&self, short_id: &str) -> Result<DocValue, GitDdbError> {
        let id = ShortId::new(short_id)?;
        let full_path = self.path.full_path(&self.short_name(&id))?;
        let Some(tree) = self.head_tree()? else {
            return Err(GitDdbError::DocumentNotFound { id: short_id.to_owned() });
        };
        let reader = Reader::new(self.ctx.repo.as_ref());
        let Some((oid, _mode)) = reader.read_path(tree, &full_path)? else {
            return Err(GitDdbError::DocumentNotFound { id: short_id.to_owned() });
        };
        Ok(build_fat_doc(self.ctx.repo.as_ref(), &full_path, oid)?.value)
    }

    /// Read `short_id`'s full fat-doc envelope, bypassing the task queue.
    ///
    /// # Errors
    /// Returns [`GitDdbError::DocumentNotFound`] if absent.
    pub fn get_fat_doc(&self, short_id: &str) -> Result<FatDoc, GitDdbError> {
        let id = ShortId::new(short_id)?;
        let full_path = self.path.full_path(&self.short_name(&id))?;
        let Some(tree) = self.head_tree()? else {
            return Err(GitDdbError::DocumentNotFound { id: short_id.to_owned() });
        };
        let reader = Reader::new(self.ctx.repo.as_ref());
        let Some((oid, _mode)) = reader.read_path(tree, &full_path)? else {
            return Err(GitDdbError::DocumentNotFound { id: short_id.to_owned() });
        };
        build_fat_doc(self.ctx.repo.as_ref(), &full_path, oid)
    }

    /// List every document's value directly in this collection.
    ///
    /// # Errors
    /// Returns [`GitDdbError::Git`] on a read failure.
    pub fn find(&self, recursive: bool) -> Result<Vec<DocValue>, GitDdbError> {
        Ok(self.find_fat_doc(recursive)?.into_iter().map(|doc| doc.value).collect())
    }

    /// List every document's fat-doc envelope directly in this collection.
    ///
    /// # Errors
    /// Returns [`GitDdbError::Git`] on a read failure.
    pub fn find_fat_doc(&self, recursive: bool) -> Result<Vec<FatDoc>, GitDdbError> {
        let Some(tree) = self.head_tree()? else { return Ok(Vec::new()) };
        let reader = Reader::new(self.ctx.repo.as_ref());
        let entries = reader.list(tree, self.path.as_str(), recursive, Order::Ascending)?;
        entries
            .into_iter()
            .map(|(path, oid, _mode)| build_fat_doc(self.ctx.repo.as_ref(), &path, oid))
            .collect()
    }

    /// Walk `short_id`'s history, most recent first, optionally filtered by
    /// author/committer identity.
    ///
    /// # Errors
    /// Returns [`GitDdbError::Git`] on a read failure.
    pub fn get_history(&self, short_id: &str, filters: &[CommitFilter]) -> Result<Vec<Option<GitOid>>, GitDdbError> {
        let id = ShortId::new(short_id)?;
        let full_path = self.path.full_path(&self.short_name(&id))?;
        let Some(head) = self.ctx.repo.read_ref(&self.ctx.head_ref)? else {
            return Ok(Vec::new());
        };
        history::get_history(self.ctx.repo.as_ref(), head, &full_path, filters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_name_appends_json_extension() {
        let path = CollectionPath::root();
        assert_eq!(path.full_path("a.json").unwrap(), "a.json");
    }
}
