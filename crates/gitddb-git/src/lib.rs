//! Git abstraction layer for gitddb.
//!
//! This crate defines the [`GitRepo`] trait — the single interface through
//! which the `gitddb-core` crate interacts with git. `gitddb-core` never
//! imports gix directly; it depends on `gitddb-git` and programs against the
//! trait.
//!
//! # Crate layout
//!
//! - [`repo`] — the [`GitRepo`] trait definition.
//! - [`types`] — value types used in trait signatures ([`GitOid`], [`RefName`],
//!   [`TreeEntry`], [`DiffEntry`], etc.).
//! - [`error`] — the [`GitError`] enum returned by all trait methods.
//! - [`gix_repo`] — the gix-backed implementation, [`GixRepo`].

pub mod error;
pub mod gix_repo;
pub mod repo;
pub mod types;

mod checkout_impl;
mod config_impl;
mod diff_impl;
mod objects_impl;
mod refs_impl;
mod remote_impl;

pub use error::GitError;
pub use gix_repo::GixRepo;
pub use repo::GitRepo;
pub use types::{
    ChangeType, CommitInfo, DiffEntry, EntryMode, GitOid, IndexEntry, OidParseError, RefEdit,
    RefName, RefNameError, Signature, TreeEdit, TreeEntry,
};
