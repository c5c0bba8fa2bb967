//! Id and collection-path validation.
//!
//! Mirrors the newtype-plus-`validate`-associated-fn shape used by
//! `gitddb_git::RefName`: a validated wrapper type that can only be
//! constructed through a fallible constructor.

use crate::error::GitDdbError;

/// OS-reserved characters that may not appear in a short id, even though the
/// database itself runs on any platform — kept forbidden so a repository
/// checked out on Windows stays usable.
const FORBIDDEN_CHARS: &[char] = &['<', '>', ':', '"', '|', '?', '*', '\\'];

/// Maximum byte length of a full path (`collectionPath + shortId + ext`).
pub const MAX_FULL_PATH_BYTES: usize = 255;

/// A validated document short id, unique within its collection.
///
/// May contain `/` as a path separator for nested document ids (e.g.
/// `"a/b"`), but may not start or end with `/`, be `.` or `..`, end with `.`
/// or whitespace, or contain control characters.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShortId(String);

impl ShortId {
    /// Validate and wrap a short id.
    ///
    /// # Errors
    /// Returns [`GitDdbError::InvalidId`] or [`GitDdbError::InvalidIdCharacter`].
    pub fn new(id: impl Into<String>) -> Result<Self, GitDdbError> {
        let id = id.into();
        validate_short_id(&id)?;
        Ok(Self(id))
    }

    /// Return the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ShortId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn validate_short_id(id: &str) -> Result<(), GitDdbError> {
    if id.is_empty() {
        return Err(GitDdbError::InvalidId {
            id: id.to_owned(),
            reason: "id must not be empty".to_owned(),
        });
    }
    if id == "." || id == ".." {
        return Err(GitDdbError::InvalidId {
            id: id.to_owned(),
            reason: "id must not be '.' or '..'".to_owned(),
        });
    }
    if id.starts_with('/') || id.ends_with('/') {
        return Err(GitDdbError::InvalidId {
            id: id.to_owned(),
            reason: "id must not start or end with '/'".to_owned(),
        });
    }
    if id.ends_with('.') || id.ends_with(char::is_whitespace) {
        return Err(GitDdbError::InvalidId {
            id: id.to_owned(),
            reason: "id must not end with '.' or whitespace".to_owned(),
        });
    }
    for c in id.chars() {
        if c.is_control() || c == '\0' {
            return Err(GitDdbError::InvalidIdCharacter {
                id: id.to_owned(),
                character: c,
            });
        }
        if FORBIDDEN_CHARS.contains(&c) {
            return Err(GitDdbError::InvalidIdCharacter {
                id: id.to_owned(),
                character: c,
            });
        }
    }
    Ok(())
}

/// A validated collection path: a `/`-terminated prefix (or empty, for the
/// root collection).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CollectionPath(String);

impl CollectionPath {
    /// Validate and normalize a collection path, ensuring it ends with `/`
    /// unless empty.
    ///
    /// # Errors
    /// Returns [`GitDdbError::InvalidCollectionPath`].
    pub fn new(path: impl Into<String>) -> Result<Self, GitDdbError> {
        let mut path = path.into();
        if path == "/" {
            return Err(GitDdbError::InvalidCollectionPath {
                path,
                reason: "collection path must not be bare '/'".to_owned(),
            });
        }
        if !path.is_empty() && !path.ends_with('/') {
            path.push('/');
        }
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            if segment == "." || segment == ".." {
                return Err(GitDdbError::InvalidCollectionPath {
                    path,
                    reason: format!("segment '{segment}' is not allowed"),
                });
            }
        }
        Ok(Self(path))
    }

    /// The root collection (empty prefix).
    #[must_use]
    pub fn root() -> Self {
        Self(String::new())
    }

    /// Return the path as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Join this collection path with a sub-collection path, for nested
    /// collections.
    ///
    /// # Errors
    /// Returns [`GitDdbError::InvalidCollectionPath`] if `sub` is invalid.
    pub fn join(&self, sub: &str) -> Result<Self, GitDdbError> {
        Self::new(format!("{}{}", self.0, sub))
    }

    /// Compose a full path from this collection path and a short name
    /// (`shortId + extension` for JSON documents, or a raw filename).
    ///
    /// # Errors
    /// Returns [`GitDdbError::InvalidId`] if the resulting full path exceeds
    /// [`MAX_FULL_PATH_BYTES`].
    pub fn full_path(&self, short_name: &str) -> Result<String, GitDdbError> {
        let full = format!("{}{}", self.0, short_name);
        if full.len() > MAX_FULL_PATH_BYTES {
            return Err(GitDdbError::InvalidId {
                id: full,
                reason: format!("full path exceeds {MAX_FULL_PATH_BYTES} bytes"),
            });
        }
        Ok(full)
    }
}

impl std::fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The reserved metadata directory name. Entries under this directory are
/// never returned by `find`/`allDocs`.
pub const METADATA_DIR: &str = ".gitddb";

/// Returns `true` if `path` lies under the reserved metadata directory.
#[must_use]
pub fn is_metadata_path(path: &str) -> bool {
    path == METADATA_DIR || path.starts_with(&format!("{METADATA_DIR}/"))
}
