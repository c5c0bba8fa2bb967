//! Structural JSON diff/patch core: a jsondiffpatch-style delta format, a
//! json1-family patch applier, and three-way patch composition.
//!
//! Split into `diff` (compute a delta between two values) and `patch`
//! (apply a delta to a value), mirroring the teacher's `model::diff` /
//! `model::patch` module split. `merge3` composes two diffs computed from a
//! shared base.

pub mod diff;
pub mod merge3;
pub mod patch;

pub use diff::{diff, DiffOptions};
pub use patch::apply;
