//! Core types for marksync

use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::error::ValidationError;

/// Domain separator mixed into every topic derivation
const TOPIC_CONTEXT: &[u8] = b"marksync-bookmarks-topic";

/// Unique identifier for a bookmark
///
/// Assigned by the store at creation time and never changed afterwards.
/// Uses ULID so identifiers sort by creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BookmarkId(pub Ulid);

impl BookmarkId {
    /// Create a new BookmarkId with current timestamp
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Create a BookmarkId from a ULID
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self(ulid)
    }

    /// Get the underlying ULID
    pub fn as_ulid(&self) -> &Ulid {
        &self.0
    }

    /// Parse from string representation
    pub fn from_string(s: &str) -> Result<Self, ulid::DecodeError> {
        let ulid = Ulid::from_string(s.trim())?;
        Ok(Self(ulid))
    }
}

impl Default for BookmarkId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for BookmarkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of the user owning a bookmark list
///
/// Opaque to marksync; handed over by the authentication provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OwnerId(String);

impl OwnerId {
    /// Parse an owner id, rejecting blank input
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyOwner);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OwnerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for OwnerId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Identifier of one engine instance (one open tab)
///
/// Every broadcast frame carries the session that published it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Ulid);

impl SessionId {
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tab_{}", self.0)
    }
}

/// Broadcast topic shared by all sessions of one owner
///
/// Derived deterministically: `BLAKE3("marksync-bookmarks-topic" || owner_id)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TopicId(pub [u8; 32]);

impl TopicId {
    /// Derive the topic for an owner
    pub fn for_owner(owner: &OwnerId) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(TOPIC_CONTEXT);
        hasher.update(owner.as_str().as_bytes());
        Self(*hasher.finalize().as_bytes())
    }

    /// Get the raw bytes of the TopicId
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to base58 string for display/storage
    pub fn to_base58(&self) -> String {
        bs58::encode(&self.0).into_string()
    }
}

impl std::fmt::Display for TopicId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "bookmarks_{}", bs58::encode(&self.0[..8]).into_string())
    }
}

/// A saved link
///
/// Created once by the store, never mutated, removed by deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bookmark {
    /// Unique identifier, assigned by the store
    pub id: BookmarkId,
    /// Target URL (trimmed, non-empty)
    pub url: String,
    /// Display title (trimmed, non-empty)
    pub title: String,
    /// Unix timestamp in milliseconds, assigned by the store
    pub created_at: i64,
    /// Owning user
    pub owner_id: OwnerId,
}

impl Bookmark {
    /// Sort key for "newest first" ordering. Ties fall back to the id,
    /// which is itself time ordered.
    pub fn recency_key(&self) -> (i64, BookmarkId) {
        (self.created_at, self.id)
    }
}

/// Validated input for creating a bookmark
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBookmark {
    title: String,
    url: String,
}

impl NewBookmark {
    /// Trim both fields and reject either one being empty.
    ///
    /// The title is checked first, so `("", "")` reports `EmptyTitle`.
    pub fn parse(title: &str, url: &str) -> Result<Self, ValidationError> {
        let title = title.trim();
        let url = url.trim();
        if title.is_empty() {
            return Err(ValidationError::EmptyTitle);
        }
        if url.is_empty() {
            return Err(ValidationError::EmptyUrl);
        }
        Ok(Self {
            title: title.to_string(),
            url: url.to_string(),
        })
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}
