//! The unified error type for gitddb operations.
//!
//! [`GitDdbError`] is a closed taxonomy grouped by the area of the system
//! that raised it (lifecycle, validation, storage, sync, merge, task). Lower
//! level `gitddb-git` errors convert in via [`From`] at the storage/sync
//! boundary, mirroring how the teacher's workspace layer wraps git-layer
//! errors.

use std::path::PathBuf;

use thiserror::Error;

/// Errors returned by gitddb operations.
#[derive(Debug, Error)]
pub enum GitDdbError {
    // -- Lifecycle --
    /// The database is in the process of closing; no new tasks are accepted.
    #[error("database is closing")]
    DatabaseClosing,

    /// An operation was attempted on a database that is not open.
    #[error("repository is not open")]
    RepositoryNotOpen,

    /// No database name was supplied where one is required.
    #[error("database name is undefined")]
    UndefinedDatabaseName,

    /// The working directory path exceeds the platform's maximum length.
    #[error("working directory path length is invalid: {path}")]
    InvalidWorkingDirectoryPathLength {
        /// The offending path.
        path: PathBuf,
    },

    /// The working directory could not be created.
    #[error("cannot create directory {}: {message}", path.display())]
    CannotCreateDirectory {
        /// The directory that could not be created.
        path: PathBuf,
        /// Underlying cause.
        message: String,
    },

    /// `git init` (or equivalent repository bootstrap) failed.
    #[error("cannot create repository at {}: {message}", path.display())]
    CannotCreateRepository {
        /// The target directory.
        path: PathBuf,
        /// Underlying cause.
        message: String,
    },

    /// Opening an existing repository failed.
    #[error("cannot open repository at {}: {message}", path.display())]
    CannotOpenRepository {
        /// The directory that failed to open.
        path: PathBuf,
        /// Underlying cause.
        message: String,
    },

    /// `open` was called with `createIfNotExists = false` and no repository exists.
    #[error("repository not found at {}", path.display())]
    RepositoryNotFound {
        /// The directory that was checked.
        path: PathBuf,
    },

    /// The repository's `info.json` declares a dbId created by an incompatible version.
    #[error("repository at {} was created by gitddb version {found}, this build is {expected}", path.display())]
    VersionMismatch {
        /// The directory containing the mismatched repository.
        path: PathBuf,
        /// The version recorded in `info.json`.
        found: String,
        /// The version this build expects.
        expected: String,
    },

    // -- Validation --
    /// A short id failed general validation.
    #[error("invalid id '{id}': {reason}")]
    InvalidId {
        /// The offending id.
        id: String,
        /// Why it is invalid.
        reason: String,
    },

    /// A short id contains a forbidden character.
    #[error("id '{id}' contains forbidden character '{character}'")]
    InvalidIdCharacter {
        /// The offending id.
        id: String,
        /// The forbidden character found.
        character: char,
    },

    /// A collection path failed validation.
    #[error("invalid collection path '{path}': {reason}")]
    InvalidCollectionPath {
        /// The offending path.
        path: String,
        /// Why it is invalid.
        reason: String,
    },

    /// A document's JSON payload is not a JSON object.
    #[error("document is not a JSON object")]
    InvalidJsonObject,

    /// A write was attempted without a resolvable document id.
    #[error("document id is undefined")]
    UndefinedDocumentId,

    /// A blob's content could not be matched to the expected SHA.
    #[error("invalid file sha for '{path}'")]
    InvalidFileSha {
        /// The path whose blob hash didn't match.
        path: String,
    },

    /// `insert` was called but the id already exists in HEAD.
    #[error("document with id '{id}' already exists")]
    SameIdExists {
        /// The colliding id.
        id: String,
    },

    /// `update`/`delete`/`get` referenced a document that does not exist.
    #[error("document '{id}' not found")]
    DocumentNotFound {
        /// The missing id.
        id: String,
    },

    // -- Storage --
    /// Removing a file or directory failed.
    #[error("cannot delete data at {}: {message}", path.display())]
    CannotDeleteData {
        /// The path that could not be removed.
        path: PathBuf,
        /// Underlying cause.
        message: String,
    },

    /// A tree/blob entry could not be read.
    #[error("cannot get entry at '{path}': {message}")]
    CannotGetEntry {
        /// The path that could not be read.
        path: String,
        /// Underlying cause.
        message: String,
    },

    /// `getBackNumber` was called with an out-of-range depth.
    #[error("invalid back number {requested} for '{id}' (only {available} revision(s) exist)")]
    InvalidBackNumber {
        /// The document id.
        id: String,
        /// The requested depth.
        requested: usize,
        /// The number of distinct revisions that actually exist.
        available: usize,
    },

    // -- Sync --
    /// No remote URL was configured.
    #[error("remote URL is undefined")]
    UndefinedRemoteURL,

    /// The remote URL scheme must be `http(s)` but wasn't.
    #[error("remote URL '{url}' must use http or https")]
    HttpProtocolRequired {
        /// The offending URL.
        url: String,
    },

    /// The remote URL could not be parsed.
    #[error("invalid repository URL '{url}'")]
    InvalidRepositoryURL {
        /// The offending URL.
        url: String,
    },

    /// An SSH key path in the remote's connection settings does not exist.
    #[error("invalid SSH key path: {}", path.display())]
    InvalidSshKeyPath {
        /// The missing key path.
        path: PathBuf,
    },

    /// A GitHub-style connection was configured without a personal access token.
    #[error("personal access token is undefined for connection to '{remote}'")]
    UndefinedPersonalAccessToken {
        /// The remote name.
        remote: String,
    },

    /// The remote repository does not exist (or is inaccessible).
    #[error("remote repository '{url}' not found")]
    RemoteRepositoryNotFound {
        /// The remote URL.
        url: String,
    },

    /// Establishing a connection to the remote failed.
    #[error("cannot connect to remote repository '{url}': {message}")]
    RemoteRepositoryConnect {
        /// The remote URL.
        url: String,
        /// Underlying cause.
        message: String,
    },

    /// The sync worker's fetch step failed.
    #[error("sync worker fetch failed: {message}")]
    SyncWorkerFetch {
        /// Underlying cause.
        message: String,
    },

    /// A push was rejected because the remote has commits not yet fetched locally.
    #[error("unfetched commits exist on '{remote}'")]
    UnfetchedCommitExists {
        /// The remote name.
        remote: String,
    },

    /// The configured sync direction forbids pushing.
    #[error("push is not allowed (syncDirection=pull)")]
    PushNotAllowed,

    /// The remote rejected the push due to an authentication failure.
    #[error("push authentication failed for '{remote}'")]
    PushAuthenticationError {
        /// The remote name.
        remote: String,
    },

    /// The remote rejected the push due to insufficient permissions.
    #[error("push to '{remote}' was denied (insufficient permission)")]
    PushPermissionDenied {
        /// The remote name.
        remote: String,
    },

    /// No merge base exists between local and remote history.
    #[error("no merge base found between local and '{remote}'")]
    NoMergeBaseFound {
        /// The remote name.
        remote: String,
    },

    /// The combine-databases recovery path itself failed.
    #[error("combine database failed: {message}")]
    CombineDatabase {
        /// Underlying cause.
        message: String,
    },

    /// Push was refused because unfetched commits exist and no retry was possible.
    #[error("cannot push to '{remote}' because unfetched commits exist")]
    CannotPushBecauseUnfetchedCommitExists {
        /// The remote name.
        remote: String,
    },

    /// The configured sync interval is smaller than the minimum allowed.
    #[error("sync interval {interval_ms}ms is too small (minimum {minimum_ms}ms)")]
    IntervalTooSmall {
        /// The configured interval.
        interval_ms: u64,
        /// The minimum allowed interval.
        minimum_ms: u64,
    },

    /// `interval` must be strictly greater than `retryInterval`.
    #[error("sync interval ({interval_ms}ms) must be greater than retry interval ({retry_interval_ms}ms)")]
    SyncIntervalLessThanOrEqualToRetryInterval {
        /// The configured sync interval.
        interval_ms: u64,
        /// The configured retry interval.
        retry_interval_ms: u64,
    },

    /// A remote with this name is already registered on the database.
    #[error("remote '{remote}' is already registered")]
    RemoteAlreadyRegistered {
        /// The remote name.
        remote: String,
    },

    // -- Merge --
    /// The merge driver reached an internal state it cannot resolve.
    #[error("invalid conflict state: {message}")]
    InvalidConflictState {
        /// Description of the inconsistency.
        message: String,
    },

    /// A document's declared type was inconsistent across merge sides.
    #[error("invalid document type for '{path}' during merge")]
    InvalidDocType {
        /// The conflicting path.
        path: String,
    },

    /// An unrecognized conflict-resolution strategy was configured.
    #[error("invalid conflict resolution strategy: {strategy}")]
    InvalidConflictResolutionStrategy {
        /// The offending strategy name.
        strategy: String,
    },

    /// The three-way merge algorithm failed for a reason other than a
    /// resolvable content conflict.
    #[error("three-way merge failed for '{path}': {message}")]
    ThreeWayMerge {
        /// The path being merged.
        path: String,
        /// Underlying cause.
        message: String,
    },

    // -- Task --
    /// A task was cancelled before or during execution.
    #[error("task was cancelled")]
    TaskCancel,

    /// A task referenced a database handle that no longer exists.
    #[error("undefined database handle")]
    UndefinedDB,

    /// Removing a file during task cleanup exceeded its timeout.
    #[error("timed out removing file at {}", path.display())]
    FileRemoveTimeout {
        /// The path that could not be removed in time.
        path: PathBuf,
    },

    // -- Wrapped lower layers --
    /// An error from the `gitddb-git` abstraction layer.
    #[error("git layer error: {0}")]
    Git(#[from] gitddb_git::GitError),

    /// A constructed ref name failed validation.
    #[error("invalid ref name: {0}")]
    RefName(#[from] gitddb_git::RefNameError),

    /// A JSON (de)serialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A YAML (de)serialization error.
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A TOML (de)serialization error.
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// An I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GitDdbError {
    /// Returns `true` if the error represents a transient network/remote
    /// condition that the sync retry loop should retry.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::SyncWorkerFetch { .. }
                | Self::RemoteRepositoryConnect { .. }
                | Self::UnfetchedCommitExists { .. }
        )
    }
}
