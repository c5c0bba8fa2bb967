//! Patch application: `apply(doc, delta) -> doc'`.
//!
//! Interprets the delta shapes produced by [`super::diff`]. A `null`/absent
//! delta is a no-op.

use std::collections::{BTreeMap, HashSet};

use serde_json::{Map, Value};

use crate::error::GitDdbError;

/// Apply `delta` to `doc`, returning the transformed value.
///
/// # Errors
/// Returns [`GitDdbError::ThreeWayMerge`] if the delta is structurally
/// malformed (wrong arity, an array-delta applied to a non-array, etc.).
pub fn apply(doc: &Value, delta: &Value) -> Result<Value, GitDdbError> {
    match delta {
        Value::Null => Ok(doc.clone()),
        Value::Array(parts) => apply_leaf(doc, parts),
        Value::Object(map) if is_array_delta(map) => {
            let old = doc.as_array().cloned().unwrap_or_default();
            Ok(Value::Array(apply_array_delta(&old, map)?))
        }
        Value::Object(map) => {
            let old = doc.as_object().cloned().unwrap_or_default();
            Ok(Value::Object(apply_object_delta(&old, map)?))
        }
        other => malformed(&format!("unexpected delta shape: {other}")),
    }
}

fn is_array_delta(map: &Map<String, Value>) -> bool {
    matches!(map.get("_t"), Some(Value::String(t)) if t == "a")
}

fn malformed<T>(message: &str) -> Result<T, GitDdbError> {
    Err(GitDdbError::ThreeWayMerge { path: String::new(), message: message.to_owned() })
}

fn apply_leaf(doc: &Value, parts: &[Value]) -> Result<Value, GitDdbError> {
    match parts.len() {
        1 => Ok(parts[0].clone()),
        2 => Ok(parts[1].clone()),
        3 => {
            let marker = parts[2].as_u64();
            match marker {
                Some(0) => Ok(Value::Null), // delete; caller removes the key
                Some(2) => {
                    let Value::String(patch_text) = &parts[0] else {
                        return malformed("text patch delta's first element must be a string");
                    };
                    let Value::String(text) = doc else {
                        return malformed("text patch applied to a non-string value");
                    };
                    apply_text_patch(text, patch_text)
                }
                Some(3) => Ok(doc.clone()), // bare move marker with no content change
                _ => malformed("unrecognized 3-element delta marker"),
            }
        }
        n => malformed(&format!("delta array must have 1-3 elements, got {n}")),
    }
}

fn apply_text_patch(text: &str, patch_text: &str) -> Result<Value, GitDdbError> {
    let patch = diffy::Patch::from_str(patch_text)
        .map_err(|e| GitDdbError::ThreeWayMerge { path: String::new(), message: format!("malformed text patch: {e}") })?;
    let applied = diffy::apply(text, &patch)
        .map_err(|e| GitDdbError::ThreeWayMerge { path: String::new(), message: format!("text patch did not apply: {e}") })?;
    Ok(Value::String(applied))
}

fn apply_object_delta(old: &Map<String, Value>, delta: &Map<String, Value>) -> Result<Map<String, Value>, GitDdbError> {
    let mut result = old.clone();
    for (key, sub) in delta {
        match sub {
            Value::Array(parts) if parts.len() == 3 && parts[1] == Value::Number(0.into()) && parts[2] == Value::Number(0.into()) => {
                result.remove(key);
            }
            Value::Array(parts) if parts.len() == 1 => {
                result.insert(key.clone(), parts[0].clone());
            }
            Value::Array(parts) if parts.len() == 2 => {
                result.insert(key.clone(), parts[1].clone());
            }
            Value::Array(parts) if parts.len() == 3 => {
                let base = old.get(key).cloned().unwrap_or(Value::Null);
                result.insert(key.clone(), apply_leaf(&base, parts)?);
            }
            _ => {
                let base = old.get(key).cloned().unwrap_or(Value::Null);
                result.insert(key.clone(), apply(&base, sub)?);
            }
        }
    }
    Ok(result)
}

enum OldOp {
    Delete,
    MoveTo(usize),
}

fn apply_array_delta(old: &[Value], delta: &Map<String, Value>) -> Result<Vec<Value>, GitDdbError> {
    let mut old_ops: BTreeMap<usize, OldOp> = BTreeMap::new();
    let mut new_ops: BTreeMap<usize, Value> = BTreeMap::new();

    for (key, value) in delta {
        if key == "_t" {
            continue;
        }
        if let Some(idx_str) = key.strip_prefix('_') {
            let idx: usize = idx_str.parse().map_err(|_| malformed_err(&format!("bad array delta index '{key}'")))?;
            let parts = value.as_array().ok_or_else(|| malformed_err("array delta entry must be an array"))?;
            if parts.len() == 3 && parts[2] == Value::Number(3.into()) {
                let new_idx = parts[1].as_u64().ok_or_else(|| malformed_err("move marker missing target index"))? as usize;
                old_ops.insert(idx, OldOp::MoveTo(new_idx));
            } else {
                old_ops.insert(idx, OldOp::Delete);
            }
        } else {
            let idx: usize = key.parse().map_err(|_| malformed_err(&format!("bad array delta index '{key}'")))?;
            new_ops.insert(idx, value.clone());
        }
    }

    let deleted = old_ops.values().filter(|op| matches!(op, OldOp::Delete)).count();
    let inserted = new_ops
        .values()
        .filter(|v| v.as_array().is_some_and(|a| a.len() == 1))
        .count();
    let final_len = old.len() - deleted + inserted;

    let mut result: Vec<Option<Value>> = vec![None; final_len];
    let mut consumed_old: HashSet<usize> = HashSet::new();

    for (old_idx, op) in &old_ops {
        consumed_old.insert(*old_idx);
        if let OldOp::MoveTo(new_idx) = op {
            if *new_idx < result.len() {
                result[*new_idx] = Some(old[*old_idx].clone());
            }
        }
    }

    for (new_idx, value) in &new_ops {
        if *new_idx >= result.len() {
            continue;
        }
        let parts = value.as_array();
        match parts.map(Vec::len) {
            Some(1) => result[*new_idx] = Some(parts.unwrap()[0].clone()),
            Some(2) => result[*new_idx] = Some(parts.unwrap()[1].clone()),
            _ => {
                let base = result[*new_idx].clone().unwrap_or_else(|| old.get(*new_idx).cloned().unwrap_or(Value::Null));
                result[*new_idx] = Some(apply(&base, value)?);
                if !old_ops.contains_key(new_idx) {
                    consumed_old.insert(*new_idx);
                }
            }
        }
    }

    let mut remaining_old = (0..old.len()).filter(|i| !consumed_old.contains(i));
    for slot in &mut result {
        if slot.is_none() {
            if let Some(oi) = remaining_old.next() {
                *slot = Some(old[oi].clone());
            }
        }
    }

    Ok(result.into_iter().map(|v| v.unwrap_or(Value::Null)).collect())
}

fn malformed_err(message: &str) -> GitDdbError {
    GitDdbError::ThreeWayMerge { path: String::new(), message: message.to_owned() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diffpatch::diff::{diff, DiffOptions};
    use serde_json::json;

    #[test]
    fn apply_leaf_insert() {
        let delta = json!([1]);
        assert_eq!(apply(&Value::Null, &delta).unwrap(), json!(1));
    }

    #[test]
    fn roundtrip_object_diff_patch() {
        let old = json!({"a": 1, "b": 2});
        let new = json!({"a": 1, "b": 3, "c": 4});
        let delta = diff(&old, &new, &DiffOptions::default()).unwrap();
        let result = apply(&old, &delta).unwrap();
        assert_eq!(result, new);
    }

    #[test]
    fn roundtrip_nested_object() {
        let old = json!({"a": {"x": 1}});
        let new = json!({"a": {"x": 2, "y": 3}});
        let delta = diff(&old, &new, &DiffOptions::default()).unwrap();
        assert_eq!(apply(&old, &delta).unwrap(), new);
    }

    #[test]
    fn roundtrip_array_positional() {
        let old = json!([1, 2, 3]);
        let new = json!([1, 9, 3, 4]);
        let delta = diff(&old, &new, &DiffOptions::default()).unwrap();
        assert_eq!(apply(&old, &delta).unwrap(), new);
    }

    #[test]
    fn roundtrip_array_deletion() {
        let old = json!([1, 2, 3]);
        let new = json!([1, 3]);
        let delta = diff(&old, &new, &DiffOptions::default()).unwrap();
        assert_eq!(apply(&old, &delta).unwrap(), new);
    }

    #[test]
    fn roundtrip_text_patch() {
        let opts = DiffOptions { plain_text_properties: vec!["body".to_owned()], ..Default::default() };
        let old = json!({"body": "hello world, this is a test"});
        let new = json!({"body": "hello there, this is a test"});
        let delta = diff(&old, &new, &opts).unwrap();
        assert_eq!(apply(&old, &delta).unwrap(), new);
    }
}
