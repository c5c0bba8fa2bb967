//! The database info record (`.gitddb/info.json`) and open-classification.

use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::error::GitDdbError;
use crate::id::METADATA_DIR;

/// The build's own version, used to classify repositories on open.
pub const CURRENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Path, relative to the repository root, of the info record.
pub const INFO_PATH: &str = ".gitddb/info.json";

/// `{ dbId, creator, version }`, stamped into the repository on first open.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseInfo {
    /// Monotonic ULID identifying this database, assigned once and never
    /// reassigned.
    #[serde(rename = "dbId")]
    pub db_id: String,
    /// Name of the software that created the repository. Always `"gitddb"`
    /// for repositories this build creates; may differ for a repository
    /// created by the upstream implementation this was ported from.
    pub creator: String,
    /// The creator's version string at creation time.
    pub version: String,
}

impl DatabaseInfo {
    /// Stamp a fresh info record for a newly created database.
    #[must_use]
    pub fn new() -> Self {
        Self {
            db_id: Ulid::new().to_string(),
            creator: "gitddb".to_owned(),
            version: CURRENT_VERSION.to_owned(),
        }
    }

    /// Serialize to canonical-ish pretty JSON for commit to `.gitddb/info.json`.
    ///
    /// # Errors
    /// Returns [`GitDdbError::Json`] if serialization fails (it cannot, in practice).
    pub fn to_bytes(&self) -> Result<Vec<u8>, GitDdbError> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// Parse an info record from its on-disk bytes.
    ///
    /// # Errors
    /// Returns [`GitDdbError::Json`] on malformed content.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, GitDdbError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

impl Default for DatabaseInfo {
    fn default() -> Self {
        Self::new()
    }
}

/// How a repository's info record relates to this build, decided on open.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OpenClassification {
    /// No repository existed yet; a fresh one (and info record) was created.
    New(DatabaseInfo),
    /// A repository existed with no info record; this build is adopting it.
    GitddbCreated(DatabaseInfo),
    /// A repository existed with a matching info record.
    ValidVersion(DatabaseInfo),
}

impl OpenClassification {
    /// The info record for any classification outcome.
    #[must_use]
    pub const fn info(&self) -> &DatabaseInfo {
        match self {
            Self::New(info) | Self::GitddbCreated(info) | Self::ValidVersion(info) => info,
        }
    }
}

/// Classify an existing repository's info record against this build,
/// given the bytes read from `.gitddb/info.json` (`None` if the path does
/// not exist in HEAD).
///
/// # Errors
/// Returns [`GitDdbError::Json`] if the existing record is malformed, or
/// [`GitDdbError::VersionMismatch`] if the record's creator isn't `"gitddb"`
/// and this build cannot safely adopt it.
pub fn classify_existing(
    repo_path: &std::path::Path,
    existing: Option<&[u8]>,
) -> Result<OpenClassification, GitDdbError> {
    let Some(bytes) = existing else {
        return Ok(OpenClassification::New(DatabaseInfo::new()));
    };
    let info = DatabaseInfo::from_bytes(bytes)?;
    if info.creator != "gitddb" {
        return Err(GitDdbError::VersionMismatch {
            path: repo_path.to_owned(),
            found: format!("{}@{}", info.creator, info.version),
            expected: format!("gitddb@{CURRENT_VERSION}"),
        });
    }
    if info.version == CURRENT_VERSION {
        Ok(OpenClassification::ValidVersion(info))
    } else {
        Ok(OpenClassification::GitddbCreated(info))
    }
}

/// Returns `true` if `path` is the reserved info record path.
#[must_use]
pub fn is_info_path(path: &str) -> bool {
    path == INFO_PATH
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_info_has_26_char_ulid() {
        let info = DatabaseInfo::new();
        assert_eq!(info.db_id.len(), 26);
        assert_eq!(info.creator, "gitddb");
    }

    #[test]
    fn roundtrip_bytes() {
        let info = DatabaseInfo::new();
        let bytes = info.to_bytes().unwrap();
        let back = DatabaseInfo::from_bytes(&bytes).unwrap();
        assert_eq!(info, back);
    }

    #[test]
    fn classify_missing_is_new() {
        let path = std::path::Path::new("/tmp/nope");
        let classification = classify_existing(path, None).unwrap();
        assert!(matches!(classification, OpenClassification::New(_)));
    }

    #[test]
    fn classify_matching_version_is_valid() {
        let info = DatabaseInfo::new();
        let bytes = info.to_bytes().unwrap();
        let path = std::path::Path::new("/tmp/nope");
        let classification = classify_existing(path, Some(&bytes)).unwrap();
        assert!(matches!(classification, OpenClassification::ValidVersion(_)));
    }

    #[test]
    fn classify_older_version_is_gitddb_created() {
        let info = DatabaseInfo {
            db_id: Ulid::new().to_string(),
            creator: "gitddb".to_owned(),
            version: "0.0.1-older-than-anything".to_owned(),
        };
        let bytes = info.to_bytes().unwrap();
        let path = std::path::Path::new("/tmp/nope");
        let classification = classify_existing(path, Some(&bytes)).unwrap();
        assert!(matches!(classification, OpenClassification::GitddbCreated(_)));
    }

    #[test]
    fn classify_foreign_creator_errors() {
        let info = DatabaseInfo {
            db_id: Ulid::new().to_string(),
            creator: "git-documentdb".to_owned(),
            version: "1.0.0".to_owned(),
        };
        let bytes = info.to_bytes().unwrap();
        let path = std::path::Path::new("/tmp/nope");
        let err = classify_existing(path, Some(&bytes)).unwrap_err();
        assert!(matches!(err, GitDdbError::VersionMismatch { .. }));
    }

    #[test]
    fn info_path_recognized() {
        assert!(is_info_path(INFO_PATH));
        assert!(!is_info_path(".gitddb/other.json"));
    }
}
