//! Git-backed document database core.
//!
//! Documents live as files in a git working tree; every mutation is a
//! commit; replication is git fetch/push plus a three-way JSON merge for
//! divergent history. This crate owns everything above the raw git layer
//! (`gitddb-git`): canonical serialization, the task queue, the commit and
//! history workers, the structural diff/patch/merge core, the sync engine,
//! and the collection/database façade.

pub mod collection;
pub mod commit;
pub mod config;
pub mod database;
pub mod diffpatch;
pub mod docs;
pub mod error;
pub mod events;
pub mod history;
pub mod id;
pub mod info;
pub mod merge_driver;
pub mod queue;
pub mod reader;
pub mod remote;
pub mod search;
pub mod serialize;
pub mod sync;
pub mod workdir;

pub use database::{Database, OpenOptions};
pub use docs::{ChangedFile, DocValue, FatDoc};
pub use error::GitDdbError;
