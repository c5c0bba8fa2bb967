//! Structural diff computation: produces a jsondiffpatch-style delta.
//!
//! Delta shapes, all plain [`Value`]:
//! - leaf insert: `[newValue]`
//! - leaf update: `[old, new]`
//! - leaf delete: `[old, 0, 0]`
//! - text patch (for `plainTextProperties`): `[patchText, 0, 2]`
//! - nested object: a `Value::Object` keyed by the object's own keys,
//!   recursively.
//! - nested array: a `Value::Object` carrying a `"_t": "a"` marker, with
//!   `"<newIndex>"` keys for inserts/in-place updates and `"_<oldIndex>"`
//!   keys for deletes/moves (`["", newIndex, 3]`).

use serde_json::{Map, Value};

/// Options controlling array element matching and text-property handling.
#[derive(Clone, Debug, Default)]
pub struct DiffOptions {
    /// Object key names tried, in order, to identify array elements across
    /// old/new. Empty means "match by index" (no move detection).
    pub id_of_subtree: Vec<String>,
    /// Object key names whose string values are diffed as text-unicode
    /// patches rather than whole-value replacement.
    pub plain_text_properties: Vec<String>,
}

const ARRAY_MARKER_KEY: &str = "_t";
const ARRAY_MARKER_VALUE: &str = "a";

/// Compute the delta transforming `old` into `new`, or `None` if they are
/// structurally equal.
#[must_use]
pub fn diff(old: &Value, new: &Value, opts: &DiffOptions) -> Option<Value> {
    diff_value(old, new, opts)
}

fn diff_value(old: &Value, new: &Value, opts: &DiffOptions) -> Option<Value> {
    if old == new {
        return None;
    }
    match (old, new) {
        (Value::Object(a), Value::Object(b)) => diff_object(a, b, opts).map(Value::Object),
        (Value::Array(a), Value::Array(b)) => diff_array(a, b, opts).map(Value::Object),
        _ => Some(Value::Array(vec![old.clone(), new.clone()])),
    }
}

fn diff_object(old: &Map<String, Value>, new: &Map<String, Value>, opts: &DiffOptions) -> Option<Map<String, Value>> {
    let mut delta = Map::new();
    let mut keys: Vec<&String> = old.keys().chain(new.keys()).collect();
    keys.sort();
    keys.dedup();

    for key in keys {
        match (old.get(key), new.get(key)) {
            (None, Some(new_val)) => {
                delta.insert(key.clone(), Value::Array(vec![new_val.clone()]));
            }
            (Some(old_val), None) => {
                delta.insert(
                    key.clone(),
                    Value::Array(vec![old_val.clone(), Value::Number(0.into()), Value::Number(0.into())]),
                );
            }
            (Some(old_val), Some(new_val)) if old_val == new_val => {}
            (Some(old_val), Some(new_val)) => {
                if opts.plain_text_properties.iter().any(|p| p == key) {
                    if let (Value::String(a), Value::String(b)) = (old_val, new_val) {
                        if let Some(patch_text) = text_diff(a, b) {
                            delta.insert(
                                key.clone(),
                                Value::Array(vec![Value::String(patch_text), Value::Number(0.into()), Value::Number(2.into())]),
                            );
                        }
                        continue;
                    }
                }
                if let Some(sub) = diff_value(old_val, new_val, opts) {
                    delta.insert(key.clone(), sub);
                }
            }
            (None, None) => unreachable!("key drawn from old or new's key set"),
        }
    }

    if delta.is_empty() {
        None
    } else {
        Some(delta)
    }
}

fn text_diff(old: &str, new: &str) -> Option<String> {
    let patch = diffy::create_patch(old, new);
    let text = patch.to_string();
    if old == new {
        None
    } else {
        Some(text)
    }
}

fn element_id(value: &Value, id_of_subtree: &[String]) -> Option<Value> {
    let obj = value.as_object()?;
    for key in id_of_subtree {
        if let Some(v) = obj.get(key) {
            return Some(v.clone());
        }
    }
    None
}

fn diff_array(old: &[Value], new: &[Value], opts: &DiffOptions) -> Option<Map<String, Value>> {
    if opts.id_of_subtree.is_empty() {
        diff_array_positional(old, new, opts)
    } else {
        diff_array_by_id(old, new, opts)
    }
}

fn diff_array_positional(old: &[Value], new: &[Value], opts: &DiffOptions) -> Option<Map<String, Value>> {
    let mut delta = Map::new();
    let max_len = old.len().max(new.len());
    for i in 0..max_len {
        match (old.get(i), new.get(i)) {
            (Some(o), Some(n)) => {
                if let Some(sub) = diff_value(o, n, opts) {
                    delta.insert(i.to_string(), sub);
                }
            }
            (Some(o), None) => {
                delta.insert(
                    format!("_{i}"),
                    Value::Array(vec![o.clone(), Value::Number(0.into()), Value::Number(0.into())]),
                );
            }
            (None, Some(n)) => {
                delta.insert(i.to_string(), Value::Array(vec![n.clone()]));
            }
            (None, None) => unreachable!("i < max(old.len(), new.len())"),
        }
    }
    finish_array_delta(delta)
}

fn diff_array_by_id(old: &[Value], new: &[Value], opts: &DiffOptions) -> Option<Map<String, Value>> {
    let mut delta = Map::new();

    let old_ids: Vec<Option<Value>> = old.iter().map(|v| element_id(v, &opts.id_of_subtree)).collect();
    let new_ids: Vec<Option<Value>> = new.iter().map(|v| element_id(v, &opts.id_of_subtree)).collect();

    for (oi, old_id) in old_ids.iter().enumerate() {
        let Some(old_id) = old_id else { continue };
        let matched = new_ids.iter().position(|id| id.as_ref() == Some(old_id));
        match matched {
            None => {
                delta.insert(
                    format!("_{oi}"),
                    Value::Array(vec![old[oi].clone(), Value::Number(0.into()), Value::Number(0.into())]),
                );
            }
            Some(ni) => {
                if ni != oi {
                    delta.insert(
                        format!("_{oi}"),
                        Value::Array(vec![Value::String(String::new()), Value::Number(ni.into()), Value::Number(3.into())]),
                    );
                }
                if let Some(sub) = diff_value(&old[oi], &new[ni], opts) {
                    delta.insert(ni.to_string(), sub);
                }
            }
        }
    }

    for (ni, new_id) in new_ids.iter().enumerate() {
        let is_new = match new_id {
            Some(id) => !old_ids.iter().any(|o| o.as_ref() == Some(id)),
            None => true,
        };
        if is_new && new_id.is_none() {
            // Elements without an id are matched positionally as a fallback.
            if old.get(ni).is_none() {
                delta.insert(ni.to_string(), Value::Array(vec![new[ni].clone()]));
            } else if let Some(sub) = diff_value(&old[ni], &new[ni], opts) {
                delta.insert(ni.to_string(), sub);
            }
        } else if is_new {
            delta.insert(ni.to_string(), Value::Array(vec![new[ni].clone()]));
        }
    }

    finish_array_delta(delta)
}

fn finish_array_delta(mut delta: Map<String, Value>) -> Option<Map<String, Value>> {
    if delta.is_empty() {
        None
    } else {
        delta.insert(ARRAY_MARKER_KEY.to_owned(), Value::String(ARRAY_MARKER_VALUE.to_owned()));
        Some(delta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn diff_equal_values_is_none() {
        assert_eq!(diff(&json!({"a": 1}), &json!({"a": 1}), &DiffOptions::default()), None);
    }

    #[test]
    fn diff_leaf_insert() {
        let delta = diff(&json!({}), &json!({"a": 1}), &DiffOptions::default()).unwrap();
        assert_eq!(delta, json!({"a": [1]}));
    }

    #[test]
    fn diff_leaf_update() {
        let delta = diff(&json!({"a": 1}), &json!({"a": 2}), &DiffOptions::default()).unwrap();
        assert_eq!(delta, json!({"a": [1, 2]}));
    }

    #[test]
    fn diff_leaf_delete() {
        let delta = diff(&json!({"a": 1}), &json!({}), &DiffOptions::default()).unwrap();
        assert_eq!(delta, json!({"a": [1, 0, 0]}));
    }

    #[test]
    fn diff_nested_object_recurses() {
        let old = json!({"a": {"b": 1}});
        let new = json!({"a": {"b": 2}});
        let delta = diff(&old, &new, &DiffOptions::default()).unwrap();
        assert_eq!(delta, json!({"a": {"b": [1, 2]}}));
    }

    #[test]
    fn diff_array_positional_insert_and_delete() {
        let old = json!([1, 2]);
        let new = json!([1, 2, 3]);
        let delta = diff(&old, &new, &DiffOptions::default()).unwrap();
        assert_eq!(delta, json!({"2": [3], "_t": "a"}));
    }

    #[test]
    fn diff_array_by_id_detects_move() {
        let opts = DiffOptions { id_of_subtree: vec!["id".to_owned()], ..Default::default() };
        let old = json!([{"id": "a"}, {"id": "b"}]);
        let new = json!([{"id": "b"}, {"id": "a"}]);
        let delta = diff(&old, &new, &opts).unwrap();
        let obj = delta.as_object().unwrap();
        assert_eq!(obj.get("_0"), Some(&json!(["", 1, 3])));
        assert_eq!(obj.get("_1"), Some(&json!(["", 0, 3])));
    }

    #[test]
    fn diff_plain_text_property_emits_patch() {
        let opts = DiffOptions { plain_text_properties: vec!["body".to_owned()], ..Default::default() };
        let old = json!({"body": "hello world"});
        let new = json!({"body": "hello there"});
        let delta = diff(&old, &new, &opts).unwrap();
        let arr = delta["body"].as_array().unwrap();
        assert_eq!(arr.len(), 3);
        assert_eq!(arr[1], json!(0));
        assert_eq!(arr[2], json!(2));
    }
}
