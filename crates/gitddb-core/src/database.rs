//! Database lifecycle: open/create, remote registration, sync dispatch, the
//! live-sync ticker, and graceful close.
//!
//! One [`Database`] owns one [`GixRepo`] and one [`TaskQueue`], shared down
//! to every [`Collection`] through [`RepoContext`]. Grounded on
//! [`crate::info`]'s open-classification and [`crate::sync`]'s per-remote
//! sync cycle; [`commit::put`](crate::commit::put) already handles the
//! empty-repository bootstrap (writing against an empty base tree), so the
//! initial `.gitddb/info.json` commit reuses it rather than hand-rolling
//! tree construction.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::time::{Duration, Instant};

use gitddb_git::{GitRepo, GixRepo, RefName, Signature};

use crate::collection::{Collection, RepoContext};
use crate::commit;
use crate::config::{DatabaseOptions, RemoteOptions};
use crate::error::GitDdbError;
use crate::events::EventBus;
use crate::history::parse_identity;
use crate::info::{self, DatabaseInfo, OpenClassification, INFO_PATH};
use crate::queue::{Task, TaskLabel, TaskMeta, TaskQueue};
use crate::reader::Reader;
use crate::remote::{GitBackedRemoteEngine, RemoteEngine};
use crate::search::SearchIndex;
use crate::serialize::Serializer;
use crate::sync::{self, SyncResult};

fn signature_from_identity(identity: &str) -> Signature {
    let (name, email) = parse_identity(identity);
    Signature { name: name.to_owned(), email: email.to_owned() }
}

/// How to open (or create) a database at a given path.
pub struct OpenOptions {
    /// The working directory, also the git repository root.
    pub path: PathBuf,
    /// Create a fresh repository and `.gitddb/info.json` if none exists yet.
    pub create_if_not_exists: bool,
    /// Parsed `gitddb.toml` configuration.
    pub config: DatabaseOptions,
    /// A search index to notify after every successful write, if any.
    pub search_index: Option<Arc<Mutex<dyn SearchIndex>>>,
}

/// Shared state a live-sync tick needs, independent of the `Database`
/// object itself (so a background ticker thread can hold it without
/// borrowing the `Database`).
struct SyncState {
    ctx: Arc<RepoContext>,
    engine: Arc<dyn RemoteEngine>,
    events: EventBus,
    local_db_id: String,
}

impl SyncState {
    fn run_labeled<T, F>(&self, label: TaskLabel, op: F) -> Result<T, GitDdbError>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T, GitDdbError> + Send + 'static,
    {
        if self.ctx.closing.load(Ordering::SeqCst) {
            return Err(GitDdbError::DatabaseClosing);
        }
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

    fn sync_remote(&self, remote_name: &str, opts: &RemoteOptions, tracking_ref: &RefName) -> Result<SyncResult, GitDdbError> {
        let repo = Arc::clone(&self.ctx.repo);
        let engine = Arc::clone(&self.engine);
        let head_ref = self.ctx.head_ref.clone();
        let tracking_ref = tracking_ref.clone();
        let opts = opts.clone();
        let remote_name = remote_name.to_owned();
        let author = self.ctx.author.clone();
        let committer = self.ctx.committer.clone();
        let cancelled = AtomicBool::new(false);
        let workdir = self.ctx.workdir.clone();
        let local_db_id = self.local_db_id.clone();
        self.run_labeled(TaskLabel::Sync, move || {
            sync::sync_with_retry(
                repo.as_ref(),
                engine.as_ref(),
                &workdir,
                &head_ref,
                &tracking_ref,
                &remote_name,
                &opts,
                &local_db_id,
                author.as_ref(),
                committer.as_ref(),
                &cancelled,
            )
        })
    }

    fn push_remote(&self, remote_name: &str, opts: &RemoteOptions, force: bool) -> Result<(), GitDdbError> {
        let repo = Arc::clone(&self.ctx.repo);
        let engine = Arc::clone(&self.engine);
        let head_ref = self.ctx.head_ref.clone();
        let opts = opts.clone();
        let remote_name = remote_name.to_owned();
        self.run_labeled(TaskLabel::Push, move || engine.push(repo.as_ref(), &opts, &remote_name, &head_ref, &head_ref, force))
    }
}

/// A background ticker that periodically runs a sync cycle for one remote,
/// honoring `pause()`/`resume()`. Stopped (and joined) on drop.
struct LiveSync {
    paused: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
    handle: Option<std::thread::JoinHandle<()>>,
}

impl LiveSync {
    fn start(interval: Duration, tick: impl Fn() + Send + 'static) -> Self {
        let paused = Arc::new(AtomicBool::new(false));
        let stop = Arc::new(AtomicBool::new(false));
        let paused_thread = Arc::clone(&paused);
        let stop_thread = Arc::clone(&stop);
        let handle = std::thread::spawn(move || {
            while !stop_thread.load(Ordering::SeqCst) {
                std::thread::sleep(interval);
                if stop_thread.load(Ordering::SeqCst) {
                    break;
                }
                if !paused_thread.load(Ordering::SeqCst) {
                    tick();
                }
            }
        });
        Self { paused, stop, handle: Some(handle) }
    }

    fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }
}

impl Drop for LiveSync {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

struct RemoteHandle {
    options: RemoteOptions,
    tracking_ref: RefName,
    live: Option<LiveSync>,
}

/// A top-level gitddb handle: one repository, one task queue, any number of
/// collections and registered remotes.
pub struct Database {
    state: Arc<SyncState>,
    info: DatabaseInfo,
    remotes: Mutex<BTreeMap<String, RemoteHandle>>,
}

impl Database {
    /// Open (or, if `create_if_not_exists`, create) a database.
    ///
    /// # Errors
    /// Returns [`GitDdbError::RepositoryNotFound`] if nothing exists and
    /// creation wasn't requested, [`GitDdbError::VersionMismatch`] if an
    /// existing `.gitddb/info.json` was stamped by an incompatible creator,
    /// or a lifecycle/git-layer error on failure to open or initialize.
    pub fn open(opts: OpenOptions) -> Result<Self, GitDdbError> {
        let repo_exists = opts.path.join(".git").exists();
        let repo = if repo_exists {
            GixRepo::open_at(&opts.path)?
        } else if opts.create_if_not_exists {
            GixRepo::init(&opts.path)?
        } else {
            return Err(GitDdbError::RepositoryNotFound { path: opts.path.clone() });
        };

        let default_branch = if opts.config.default_branch.is_empty() { "main".to_owned() } else { opts.config.default_branch.clone() };
        let head_ref = RefName::new(&format!("refs/heads/{default_branch}"))?;

        let author = opts.config.author.as_deref().map(signature_from_identity);
        let committer = opts
            .config
            .committer
            .as_deref()
            .or(opts.config.author.as_deref())
            .map(signature_from_identity);

        let existing_info = match repo.read_ref(&head_ref)? {
            Some(head_oid) => {
                let tree = repo.read_commit(head_oid)?.tree_oid;
                Reader::new(&repo)
                    .get_blob(tree, INFO_PATH)?
            }
            None => None,
        };
        let classification = info::classify_existing(&opts.path, existing_info.as_deref())?;
        let info = classification.info().clone();

        if matches!(classification, OpenClassification::New(_)) {
            let bytes = info.to_bytes()?;
            commit::put(&repo, &opts.path, &head_ref, INFO_PATH, &bytes, "init: gitddb", author.as_ref(), committer.as_ref())?;
        }

        if let Some(head_oid) = repo.read_ref(&head_ref)? {
            let tree = repo.read_commit(head_oid)?.tree_oid;
            repo.checkout_tree(tree, &opts.path)?;
        }

        let ctx = Arc::new(RepoContext {
            repo: Arc::new(repo),
            workdir: opts.path.clone(),
            head_ref,
            queue: Arc::new(TaskQueue::new()),
            closing: Arc::new(AtomicBool::new(false)),
            author,
            committer,
            search_index: opts.search_index,
        });

        let state = Arc::new(SyncState {
            ctx,
            engine: Arc::new(GitBackedRemoteEngine::new()),
            events: EventBus::new(),
            local_db_id: info.db_id.clone(),
        });

        let mut remotes = BTreeMap::new();
        for (name, remote_opts) in &opts.config.remotes {
            remote_opts.validate()?;
            let tracking_ref = RefName::new(&format!("refs/remotes/{name}/{default_branch}"))?;
            let live = remote_opts.live.then(|| {
                let tick_state = Arc::clone(&state);
                let tick_opts = remote_opts.clone();
                let tick_name = name.clone();
                let tick_tracking = tracking_ref.clone();
                LiveSync::start(Duration::from_millis(remote_opts.interval_ms), move || {
                    if let Err(error) = tick_state.sync_remote(&tick_name, &tick_opts, &tick_tracking) {
                        tracing::warn!(?error, remote = %tick_name, "live sync tick failed");
                    }
                })
            });
            remotes.insert(name.clone(), RemoteHandle { options: remote_opts.clone(), tracking_ref, live });
        }

        Ok(Self { state, info, remotes: Mutex::new(remotes) })
    }

    /// The repository's stamped identity record.
    #[must_use]
    pub const fn info(&self) -> &DatabaseInfo {
        &self.info
    }

    /// The event bus this database and its collections report through.
    #[must_use]
    pub const fn events(&self) -> &EventBus {
        &self.state.events
    }

    /// A façade over the root collection.
    #[must_use]
    pub fn root_collection(&self) -> Collection {
        Collection::root(Arc::clone(&self.state.ctx))
    }

    /// A façade over a named collection.
    ///
    /// # Errors
    /// Returns [`GitDdbError::InvalidCollectionPath`] if `path` is invalid.
    pub fn collection(&self, path: &str, serializer: Serializer) -> Result<Collection, GitDdbError> {
        Collection::at(path, serializer, Arc::clone(&self.state.ctx))
    }

    /// Register a new remote, validating its options.
    ///
    /// # Errors
    /// Returns [`GitDdbError::RemoteAlreadyRegistered`] if `name` is already
    /// registered, or a config-validation error.
    pub fn add_remote(&self, name: &str, opts: RemoteOptions) -> Result<(), GitDdbError> {
        opts.validate()?;
        let mut remotes = self.remotes.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if remotes.contains_key(name) {
            return Err(GitDdbError::RemoteAlreadyRegistered { remote: name.to_owned() });
        }
        let default_branch = self.state.ctx.head_ref.as_str().rsplit('/').next().unwrap_or("main");
        let tracking_ref = RefName::new(&format!("refs/remotes/{name}/{default_branch}"))?;
        let live = opts.live.then(|| {
            let tick_state = Arc::clone(&self.state);
            let tick_opts = opts.clone();
            let tick_name = name.to_owned();
            let tick_tracking = tracking_ref.clone();
            LiveSync::start(Duration::from_millis(opts.interval_ms), move || {
                if let Err(error) = tick_state.sync_remote(&tick_name, &tick_opts, &tick_tracking) {
                    tracing::warn!(?error, remote = %tick_name, "live sync tick failed");
                }
            })
        });
        remotes.insert(name.to_owned(), RemoteHandle { options: opts, tracking_ref, live });
        Ok(())
    }

    /// Run one sync cycle against `remote_name` (fetch, classify, dispatch).
    ///
    /// # Errors
    /// Returns [`GitDdbError::UndefinedRemoteURL`]-category errors if the
    /// remote is unknown, or whatever [`crate::sync::sync_with_retry`] returns.
    pub fn sync(&self, remote_name: &str) -> Result<SyncResult, GitDdbError> {
        let remotes = self.remotes.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let handle = remotes.get(remote_name).ok_or_else(|| GitDdbError::UndefinedRemoteURL)?;
        self.state.sync_remote(remote_name, &handle.options, &handle.tracking_ref)
    }

    /// Push local HEAD to `remote_name` without fetching first.
    ///
    /// # Errors
    /// Returns [`GitDdbError::PushNotAllowed`] if the remote's configured
    /// direction forbids pushing.
    pub fn push(&self, remote_name: &str, force: bool) -> Result<(), GitDdbError> {
        let remotes = self.remotes.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let handle = remotes.get(remote_name).ok_or_else(|| GitDdbError::UndefinedRemoteURL)?;
        self.state.push_remote(remote_name, &handle.options, force)
    }

    /// Pause `remote_name`'s live-sync ticker, if it has one. No-op otherwise.
    pub fn pause(&self, remote_name: &str) {
        let remotes = self.remotes.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(handle) = remotes.get(remote_name) {
            if let Some(live) = &handle.live {
                live.pause();
            }
        }
    }

    /// Resume `remote_name`'s live-sync ticker, if it has one. No-op otherwise.
    pub fn resume(&self, remote_name: &str) {
        let remotes = self.remotes.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(handle) = remotes.get(remote_name) {
            if let Some(live) = &handle.live {
                live.resume();
            }
        }
    }

    /// Stop accepting new tasks and cancel everything still queued
    /// (mirroring [`TaskQueue::stop`]'s semantics); any task already running
    /// is allowed to finish. Live-sync tickers are stopped as part of
    /// dropping their registered remotes.
    pub fn close(&self) {
        self.state.ctx.closing.store(true, Ordering::SeqCst);
        self.state.ctx.queue.stop();
    }

    /// As [`Self::close`], but first waits up to `timeout` for the queue to
    /// drain on its own (letting already-queued tasks complete normally)
    /// before forcing a drain of whatever remains.
    pub fn close_with_timeout(&self, timeout: Duration) {
        self.state.ctx.closing.store(true, Ordering::SeqCst);
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline && self.state.ctx.queue.pending_count() > 0 {
            std::thread::sleep(Duration::from_millis(20));
        }
        self.state.ctx.queue.stop();
    }
}
