//! Three-way merge of two JSON values that diverged from a shared base.
//!
//! Rather than converting diffs to path-ops and composing them abstractly,
//! this walks `base`/`ours`/`theirs` together (mirroring the merge driver's
//! own three-tree walk in spirit) and resolves each divergent node directly.
//! This keeps the composition rules in one place and makes conflicts
//! reportable with a concrete JSON pointer-ish path.

use std::collections::BTreeSet;

use serde_json::{Map, Value};

/// How a concurrent edit to the same value is resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Strategy {
    /// Ours wins outright, no attempt to merge content.
    Ours,
    /// Theirs wins outright, no attempt to merge content.
    Theirs,
    /// Ours wins when content can't be merged structurally, but structural
    /// merges (independent keys, non-overlapping array edits) still compose.
    #[default]
    OursDiff,
    /// As [`Strategy::OursDiff`], but theirs wins ties.
    TheirsDiff,
}

impl Strategy {
    pub(crate) const fn prefers_ours(self) -> bool {
        matches!(self, Self::Ours | Self::OursDiff)
    }
}

impl From<crate::config::ConflictResolutionStrategy> for Strategy {
    fn from(value: crate::config::ConflictResolutionStrategy) -> Self {
        match value {
            crate::config::ConflictResolutionStrategy::Ours => Self::Ours,
            crate::config::ConflictResolutionStrategy::Theirs => Self::Theirs,
            crate::config::ConflictResolutionStrategy::OursDiff => Self::OursDiff,
            crate::config::ConflictResolutionStrategy::TheirsDiff => Self::TheirsDiff,
        }
    }
}

/// A path segment in a conflict record: an object key or an array index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PathSegment {
    /// An object key.
    Key(String),
    /// An array index.
    Index(usize),
}

/// A point where `ours` and `theirs` disagreed and the strategy chose a
/// winner (or merged structurally).
#[derive(Clone, Debug, PartialEq)]
pub struct Conflict {
    /// Path from the merge root to the conflicting value.
    pub path: Vec<PathSegment>,
    /// The value taken from `ours` at this path.
    pub ours: Value,
    /// The value taken from `theirs` at this path.
    pub theirs: Value,
    /// The value that was written to the merged result.
    pub resolved: Value,
}

/// Merge `ours` and `theirs`, both derived from `base`, under `strategy`.
///
/// Returns the merged value and the list of conflicts that had to be
/// strategy-resolved (empty if every change composed cleanly).
#[must_use]
pub fn merge(base: &Value, ours: &Value, theirs: &Value, strategy: Strategy) -> (Value, Vec<Conflict>) {
    let mut conflicts = Vec::new();
    let merged = merge_value(&mut Vec::new(), base, ours, theirs, strategy, &mut conflicts);
    (merged, conflicts)
}

/// As [`merge`], additionally deduplicating the named array properties after
/// composition (`keyOfUniqueArray`), honoring the strategy's tie-break order.
#[must_use]
pub fn merge_with_unique_arrays(
    base: &Value,
    ours: &Value,
    theirs: &Value,
    strategy: Strategy,
    key_of_unique_array: &[String],
) -> (Value, Vec<Conflict>) {
    let (mut merged, conflicts) = merge(base, ours, theirs, strategy);
    dedup_unique_arrays(&mut merged, key_of_unique_array, strategy);
    (merged, conflicts)
}

fn dedup_unique_arrays(value: &mut Value, keys: &[String], strategy: Strategy) {
    match value {
        Value::Object(map) => {
            for (k, v) in map.iter_mut() {
                if keys.iter().any(|key| key == k) {
                    if let Value::Array(items) = v {
                        dedup_array(items, strategy);
                    }
                }
                dedup_unique_arrays(v, keys, strategy);
            }
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                dedup_unique_arrays(item, keys, strategy);
            }
        }
        _ => {}
    }
}

fn dedup_array(items: &mut Vec<Value>, _strategy: Strategy) {
    // Ordering already reflects the strategy's tie-break (resolve_scalar_conflict
    // decided per-element winners before this runs), so keeping first-seen here
    // is enough to honor "earliest occurrence" for both ours-diff and theirs-diff.
    let mut seen = BTreeSet::new();
    items.retain(|item| seen.insert(item.to_string()));
}

#[allow(clippy::too_many_lines)]
fn merge_value(
    path: &mut Vec<PathSegment>,
    base: &Value,
    ours: &Value,
    theirs: &Value,
    strategy: Strategy,
    conflicts: &mut Vec<Conflict>,
) -> Value {
    if ours == theirs {
        return ours.clone();
    }
    if ours == base {
        return theirs.clone();
    }
    if theirs == base {
        return ours.clone();
    }

    match (base, ours, theirs) {
        (Value::Object(b), Value::Object(o), Value::Object(t)) => {
            Value::Object(merge_object(path, b, o, t, strategy, conflicts))
        }
        (Value::Array(b), Value::Array(o), Value::Array(t)) => {
            Value::Array(merge_array(path, b, o, t, strategy, conflicts))
        }
        _ => resolve_scalar_conflict(path, ours, theirs, strategy, conflicts),
    }
}

fn resolve_scalar_conflict(
    path: &[PathSegment],
    ours: &Value,
    theirs: &Value,
    strategy: Strategy,
    conflicts: &mut Vec<Conflict>,
) -> Value {
    let resolved = if strategy.prefers_ours() { ours.clone() } else { theirs.clone() };
    conflicts.push(Conflict {
        path: path.to_vec(),
        ours: ours.clone(),
        theirs: theirs.clone(),
        resolved: resolved.clone(),
    });
    resolved
}

fn merge_object(
    path: &mut Vec<PathSegment>,
    base: &Map<String, Value>,
    ours: &Map<String, Value>,
    theirs: &Map<String, Value>,
    strategy: Strategy,
    conflicts: &mut Vec<Conflict>,
) -> Map<String, Value> {
    let mut keys: Vec<&String> = base.keys().chain(ours.keys()).chain(theirs.keys()).collect();
    keys.sort();
    keys.dedup();

    let mut result = Map::new();
    for key in keys {
        let b = base.get(key);
        let o = ours.get(key);
        let t = theirs.get(key);

        path.push(PathSegment::Key(key.clone()));
        let merged = merge_presence(path, b, o, t, strategy, conflicts);
        path.pop();

        if let Some(value) = merged {
            result.insert(key.clone(), value);
        }
    }
    result
}

/// Merge one key/index's presence/value triple, handling the
/// insert-vs-delete and delete-vs-delete cases the value-level `merge_value`
/// can't (it requires all three sides present).
fn merge_presence(
    path: &mut Vec<PathSegment>,
    base: Option<&Value>,
    ours: Option<&Value>,
    theirs: Option<&Value>,
    strategy: Strategy,
    conflicts: &mut Vec<Conflict>,
) -> Option<Value> {
    match (base, ours, theirs) {
        (_, None, None) => None,
        (None, Some(o), None) => Some(o.clone()),
        (None, None, Some(t)) => Some(t.clone()),
        (None, Some(o), Some(t)) if o == t => Some(o.clone()),
        (None, Some(o), Some(t)) => Some(resolve_scalar_conflict(path, o, t, strategy, conflicts)),
        (Some(_), None, Some(t_val)) => {
            // update (theirs) vs delete (ours).
            if strategy == Strategy::OursDiff {
                Some(t_val.clone())
            } else if strategy.prefers_ours() {
                None
            } else {
                Some(t_val.clone())
            }
        }
        (Some(_), Some(o_val), None) => {
            // update (ours) vs delete (theirs): symmetric case.
            if strategy.prefers_ours() {
                Some(o_val.clone())
            } else {
                None
            }
        }
        (Some(b), Some(o), Some(t)) => Some(merge_value(path, b, o, t, strategy, conflicts)),
        (None, None, None) => None,
    }
}

fn merge_array(
    path: &mut Vec<PathSegment>,
    base: &[Value],
    ours: &[Value],
    theirs: &[Value],
    strategy: Strategy,
    conflicts: &mut Vec<Conflict>,
) -> Vec<Value> {
    // Without element ids we can only align positionally. This intentionally
    // favors a simple, reproducible outcome over perfect move detection: a
    // concurrent move of the same element resolves to whichever side the
    // strategy prefers, matching the documented "left operand wins silently"
    // limitation for array moves.
    let max_len = base.len().max(ours.len()).max(theirs.len());
    let mut result = Vec::with_capacity(max_len);
    for i in 0..max_len {
        path.push(PathSegment::Index(i));
        let merged = merge_presence(path, base.get(i), ours.get(i), theirs.get(i), strategy, conflicts);
        path.pop();
        if let Some(value) = merged {
            result.push(value);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn independent_key_edits_merge_cleanly() {
        let base = json!({"a": 1, "b": 1});
        let ours = json!({"a": 2, "b": 1});
        let theirs = json!({"a": 1, "b": 2});
        let (merged, conflicts) = merge(&base, &ours, &theirs, Strategy::OursDiff);
        assert_eq!(merged, json!({"a": 2, "b": 2}));
        assert!(conflicts.is_empty());
    }

    #[test]
    fn concurrent_scalar_replace_ours_diff_prefers_ours() {
        let base = json!({"a": 1});
        let ours = json!({"a": 2});
        let theirs = json!({"a": 3});
        let (merged, conflicts) = merge(&base, &ours, &theirs, Strategy::OursDiff);
        assert_eq!(merged, json!({"a": 2}));
        assert_eq!(conflicts.len(), 1);
    }

    #[test]
    fn concurrent_scalar_replace_theirs_diff_prefers_theirs() {
        let base = json!({"a": 1});
        let ours = json!({"a": 2});
        let theirs = json!({"a": 3});
        let (merged, _) = merge(&base, &ours, &theirs, Strategy::TheirsDiff);
        assert_eq!(merged, json!({"a": 3}));
    }

    #[test]
    fn update_vs_remove_ours_diff_update_wins() {
        let base = json!({"a": 1});
        let ours = json!({"a": 2});
        let theirs = json!({});
        let (merged, _) = merge(&base, &ours, &theirs, Strategy::OursDiff);
        assert_eq!(merged, json!({"a": 2}));
    }

    #[test]
    fn update_vs_remove_ours_strategy_delete_wins() {
        let base = json!({"a": 1});
        let ours = json!({});
        let theirs = json!({"a": 2});
        let (merged, _) = merge(&base, &ours, &theirs, Strategy::Ours);
        assert_eq!(merged, json!({}));
    }

    #[test]
    fn identical_change_is_not_a_conflict() {
        let base = json!({"a": 1});
        let ours = json!({"a": 2});
        let theirs = json!({"a": 2});
        let (merged, conflicts) = merge(&base, &ours, &theirs, Strategy::OursDiff);
        assert_eq!(merged, json!({"a": 2}));
        assert!(conflicts.is_empty());
    }
}
