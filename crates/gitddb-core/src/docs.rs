//! Document value types: `JsonDoc`, `FatDoc`, and change-event payloads.

use serde_json::Value;

use crate::serialize::DocType;

/// The raw value of a document, tagged by storage kind.
#[derive(Clone, Debug, PartialEq)]
pub enum DocValue {
    /// A JSON object (already has `_id` injected on read).
    Json(Value),
    /// UTF-8 text content.
    Text(String),
    /// Opaque bytes.
    Binary(Vec<u8>),
}

impl DocValue {
    /// The [`DocType`] this value represents.
    #[must_use]
    pub const fn doc_type(&self) -> DocType {
        match self {
            Self::Json(_) => DocType::Json,
            Self::Text(_) => DocType::Text,
            Self::Binary(_) => DocType::Binary,
        }
    }
}

/// A document plus its storage metadata: `{ name, shortId, fileOid, type }`.
#[derive(Clone, Debug, PartialEq)]
pub struct FatDoc {
    /// The short name (`shortId + extension` for JSON, raw filename otherwise).
    pub name: String,
    /// The short id within the collection. `None` for non-JSON documents
    /// whose name already serves as the id, per spec `FatDoc` semantics
    /// (`shortId` is JSON-only).
    pub short_id: Option<String>,
    /// The git blob OID backing this document's current content.
    pub file_oid: gitddb_git::GitOid,
    /// The document's value and kind.
    pub value: DocValue,
}

/// A single changed document, as emitted on the `change`/`localChange`/
/// `remoteChange` event channels.
#[derive(Clone, Debug, PartialEq)]
pub enum ChangedFile {
    /// A document was created.
    Insert {
        /// The new document state.
        new: FatDoc,
    },
    /// A document's content changed.
    Update {
        /// The prior document state.
        old: FatDoc,
        /// The new document state.
        new: FatDoc,
    },
    /// A document was removed.
    Delete {
        /// The document state just before removal.
        old: FatDoc,
    },
}

impl ChangedFile {
    /// The path/name this change concerns.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Insert { new } | Self::Update { new, .. } => &new.name,
            Self::Delete { old } => &old.name,
        }
    }
}

/// The merge operation a strategy resolver performed for a single path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MergeOperation {
    /// Both sides agreed to insert; no real conflict, recorded for audit.
    Insert,
    /// Both sides updated the same path; the strategy chose a winner.
    Update,
    /// Both sides agreed to delete.
    Delete,
    /// Insert-vs-insert with differing content, merged via diff/patch.
    InsertMerge,
    /// Update-vs-update with differing content, merged via diff/patch.
    UpdateMerge,
}

/// A record of a path where the merge strategy had to choose a winner.
#[derive(Clone, Debug, PartialEq)]
pub struct AcceptedConflict {
    /// The resulting document after resolution.
    pub fat_doc: FatDoc,
    /// The strategy that was applied.
    pub strategy: crate::diffpatch::merge3::Strategy,
    /// What kind of merge operation this was.
    pub operation: MergeOperation,
}

/// A local-vs-remote duplicate produced by the combine-with-theirs recovery
/// path.
#[derive(Clone, Debug, PartialEq)]
pub struct DuplicatedFile {
    /// The path that already existed on the remote side.
    pub original: String,
    /// The renamed local copy (`-from-<dbId>` suffixed).
    pub duplicate: String,
}
