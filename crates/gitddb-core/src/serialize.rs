//! Document serialization: canonical JSON and front-matter encode/decode.

use serde_json::{Map, Value};

use crate::error::GitDdbError;

/// The kind of document a path resolves to, used both for extension
/// inference and for `forceDocType` overrides on read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DocType {
    /// A JSON object, canonically serialized.
    Json,
    /// UTF-8 text with no structural encoding.
    Text,
    /// An opaque byte sequence.
    Binary,
}

/// The policy mapping a JSON document to bytes + extension.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Serializer {
    /// Canonical sorted-key JSON, `.json` extension.
    Json,
    /// YAML front matter + Markdown body, `.md` extension. The document's
    /// `_body` property (or a configured alternate name) becomes the
    /// Markdown body; all other properties become front matter.
    FrontMatter {
        /// The property name used for the Markdown body. Defaults to `_body`.
        body_property: &'static str,
    },
}

impl Serializer {
    /// The default front-matter serializer (`body_property = "_body"`).
    #[must_use]
    pub const fn front_matter() -> Self {
        Self::FrontMatter { body_property: "_body" }
    }

    /// The file extension this serializer produces, including the leading dot.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Json => ".json",
            Self::FrontMatter { .. } => ".md",
        }
    }

    /// Infer the serializer (or non-JSON doc type) from a file extension.
    #[must_use]
    pub fn infer(extension: &str) -> Option<Self> {
        match extension {
            ".json" => Some(Self::Json),
            ".md" => Some(Self::front_matter()),
            _ => None,
        }
    }

    /// Encode a JSON document to bytes per this serializer.
    ///
    /// # Errors
    /// Returns [`GitDdbError::InvalidJsonObject`] if `doc` is not a JSON object.
    pub fn encode(self, doc: &Value) -> Result<Vec<u8>, GitDdbError> {
        let obj = doc.as_object().ok_or(GitDdbError::InvalidJsonObject)?;
        match self {
            Self::Json => Ok(canonical_json(obj).into_bytes()),
            Self::FrontMatter { body_property } => Ok(encode_front_matter(obj, body_property)?),
        }
    }

    /// Decode bytes into a JSON document per this serializer, injecting
    /// `_id` to be authoritative.
    ///
    /// # Errors
    /// Returns [`GitDdbError::Json`]/[`GitDdbError::Yaml`] on malformed input.
    pub fn decode(self, bytes: &[u8], short_id: &str) -> Result<Value, GitDdbError> {
        let mut value = match self {
            Self::Json => serde_json::from_slice(bytes)?,
            Self::FrontMatter { body_property } => decode_front_matter(bytes, body_property)?,
        };
        if let Some(obj) = value.as_object_mut() {
            obj.insert("_id".to_owned(), Value::String(short_id.to_owned()));
        }
        Ok(value)
    }
}

/// Encode a JSON value as canonical sorted-key JSON with 2-space indent.
///
/// Key ordering: UTF-16 code-unit order, except keys beginning with `_` sort
/// after all non-underscore keys (as if their leading `_` were `\u{ffff}`).
#[must_use]
pub fn canonical_json(obj: &Map<String, Value>) -> String {
    let sorted = sort_value(&Value::Object(obj.clone()));
    write_indented(&sorted, 0)
}

/// Recursively sort object keys per the canonical ordering rule. Arrays and
/// scalars pass through unchanged (only object key order is normative).
fn sort_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|(a, _), (b, _)| canonical_key_cmp(a, b));
            let mut out = Map::new();
            for (k, v) in entries {
                out.insert(k.clone(), sort_value(v));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_value).collect()),
        other => other.clone(),
    }
}

fn canonical_key_cmp(a: &str, b: &str) -> std::cmp::Ordering {
    fn key(s: &str) -> Vec<u16> {
        s.encode_utf16()
            .map(|u| if u == u16::from(b'_') { 0xffff } else { u })
            .collect()
    }
    // Only the *leading* underscore is demoted; re-derive by comparing the
    // first code unit specially, then falling back to raw order for the rest.
    let a_leads_underscore = a.starts_with('_');
    let b_leads_underscore = b.starts_with('_');
    match (a_leads_underscore, b_leads_underscore) {
        (true, false) => std::cmp::Ordering::Greater,
        (false, true) => std::cmp::Ordering::Less,
        _ => key(a).cmp(&key(b)),
    }
}

fn write_indented(value: &Value, depth: usize) -> String {
    let pad = "  ".repeat(depth + 1);
    let closing_pad = "  ".repeat(depth);
    match value {
        Value::Object(map) => {
            if map.is_empty() {
                return "{}".to_owned();
            }
            let mut out = String::from("{\n");
            let last = map.len() - 1;
            for (i, (k, v)) in map.iter().enumerate() {
                out.push_str(&pad);
                out.push_str(&serde_json::to_string(k).unwrap_or_default());
                out.push_str(": ");
                out.push_str(&write_indented(v, depth + 1));
                if i != last {
                    out.push(',');
                }
                out.push('\n');
            }
            out.push_str(&closing_pad);
            out.push('}');
            out
        }
        Value::Array(items) => {
            if items.is_empty() {
                return "[]".to_owned();
            }
            let mut out = String::from("[\n");
            let last = items.len() - 1;
            for (i, v) in items.iter().enumerate() {
                out.push_str(&pad);
                out.push_str(&write_indented(v, depth + 1));
                if i != last {
                    out.push(',');
                }
                out.push('\n');
            }
            out.push_str(&closing_pad);
            out.push(']');
            out
        }
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

fn encode_front_matter(obj: &Map<String, Value>, body_property: &str) -> Result<Vec<u8>, GitDdbError> {
    let mut front = obj.clone();
    let body = front
        .remove(body_property)
        .and_then(|v| v.as_str().map(str::to_owned))
        .unwrap_or_default();
    front.remove("_id");

    let yaml = serde_yaml::to_string(&Value::Object(front))?;
    let mut out = String::new();
    out.push_str("---\n");
    out.push_str(&yaml);
    out.push_str("---\n");
    out.push_str(&body);
    Ok(out.into_bytes())
}

fn decode_front_matter(bytes: &[u8], body_property: &str) -> Result<Value, GitDdbError> {
    let text = String::from_utf8_lossy(bytes);
    let (front_matter, body) = split_front_matter(&text);

    let mut value: Value = if front_matter.trim().is_empty() {
        Value::Object(Map::new())
    } else {
        serde_yaml::from_str(front_matter)?
    };

    if let Some(obj) = value.as_object_mut() {
        obj.insert(body_property.to_owned(), Value::String(body.to_owned()));
    }
    Ok(value)
}

/// Split `---\n<yaml>\n---\n<body>` into `(yaml, body)`. Text without a
/// front-matter delimiter is treated as an empty front matter with the
/// whole input as the body.
fn split_front_matter(text: &str) -> (&str, &str) {
    let Some(rest) = text.strip_prefix("---\n") else {
        return ("", text);
    };
    if let Some(end) = rest.find("\n---\n") {
        (&rest[..end], &rest[end + 5..])
    } else {
        ("", text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn canonical_json_sorts_keys_and_demotes_underscore() {
        let value = json!({"b": 1, "_id": "x", "a": 2});
        let obj = value.as_object().unwrap();
        let out = canonical_json(obj);
        assert_eq!(out, "{\n  \"a\": 2,\n  \"b\": 1,\n  \"_id\": \"x\"\n}");
    }

    #[test]
    fn canonical_json_is_idempotent() {
        let value = json!({"z": [3, 1, 2], "_a": true, "m": {"y": 1, "_x": 2}});
        let obj = value.as_object().unwrap();
        let once = canonical_json(obj);
        let reparsed: Value = serde_json::from_str(&once).unwrap();
        let twice = canonical_json(reparsed.as_object().unwrap());
        assert_eq!(once, twice);
    }

    #[test]
    fn json_roundtrip_via_serializer() {
        let value = json!({"n": "fromA"});
        let bytes = Serializer::Json.encode(&value).unwrap();
        let decoded = Serializer::Json.decode(&bytes, "1").unwrap();
        assert_eq!(decoded["_id"], "1");
        assert_eq!(decoded["n"], "fromA");
    }

    #[test]
    fn front_matter_roundtrip() {
        let value = json!({"title": "Hello", "_body": "# Heading\nbody text"});
        let bytes = Serializer::front_matter().encode(&value).unwrap();
        let text = String::from_utf8(bytes.clone()).unwrap();
        assert!(text.starts_with("---\n"));
        assert!(text.contains("title: Hello"));
        assert!(text.ends_with("# Heading\nbody text"));

        let decoded = Serializer::front_matter().decode(&bytes, "doc").unwrap();
        assert_eq!(decoded["title"], "Hello");
        assert_eq!(decoded["_body"], "# Heading\nbody text");
        assert_eq!(decoded["_id"], "doc");
    }

    #[test]
    fn infer_serializer_from_extension() {
        assert_eq!(Serializer::infer(".json"), Some(Serializer::Json));
        assert!(matches!(Serializer::infer(".md"), Some(Serializer::FrontMatter { .. })));
        assert_eq!(Serializer::infer(".bin"), None);
    }
}
