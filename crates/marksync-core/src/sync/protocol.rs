//! Broadcast protocol for bookmark changes
//!
//! Events are wrapped in a versioned [`WireMessage`], serialized with postcard
//! and published on the owner's topic.
//!
//! ## Event kinds
//!
//! | Kind               | Payload            |
//! |--------------------|--------------------|
//! | `bookmark_added`   | full [`Bookmark`]  |
//! | `bookmark_deleted` | `{ id }`           |
//!
//! Both are idempotent on the receiving side: an add for a known id and a
//! delete for an unknown id are no-ops.

use serde::{Deserialize, Serialize};

use crate::error::BusError;
use crate::types::{Bookmark, BookmarkId};

/// Wire name of [`BookmarkEvent::Added`]
pub const BOOKMARK_ADDED: &str = "bookmark_added";

/// Wire name of [`BookmarkEvent::Deleted`]
pub const BOOKMARK_DELETED: &str = "bookmark_deleted";

/// A change published to every session of the owner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookmarkEvent {
    /// A bookmark was persisted by some session
    Added(Bookmark),

    /// A bookmark was removed by some session
    Deleted {
        /// The removed bookmark
        id: BookmarkId,
    },
}

impl BookmarkEvent {
    /// Wire name of this event kind
    pub fn kind(&self) -> &'static str {
        match self {
            BookmarkEvent::Added(_) => BOOKMARK_ADDED,
            BookmarkEvent::Deleted { .. } => BOOKMARK_DELETED,
        }
    }

    /// Id of the bookmark this event is about
    pub fn bookmark_id(&self) -> BookmarkId {
        match self {
            BookmarkEvent::Added(bookmark) => bookmark.id,
            BookmarkEvent::Deleted { id } => *id,
        }
    }

    pub fn is_added(&self) -> bool {
        matches!(self, BookmarkEvent::Added(_))
    }

    pub fn is_deleted(&self) -> bool {
        matches!(self, BookmarkEvent::Deleted { .. })
    }
}

/// Wrapper for versioned messages
///
/// New versions are added as variants so older sessions can reject what they
/// do not understand instead of misreading it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WireMessage {
    /// Protocol version 1
    V1(BookmarkEvent),
}

impl From<BookmarkEvent> for WireMessage {
    fn from(event: BookmarkEvent) -> Self {
        WireMessage::V1(event)
    }
}

impl WireMessage {
    /// Postcard bytes for a bus frame
    pub fn to_bytes(&self) -> Result<Vec<u8>, BusError> {
        postcard::to_allocvec(self).map_err(|e| BusError::Encode(e.to_string()))
    }

    /// Parse a frame payload down to the event, whichever version carried it
    pub fn event_from_bytes(data: &[u8]) -> Result<BookmarkEvent, BusError> {
        let message: WireMessage =
            postcard::from_bytes(data).map_err(|e| BusError::Decode(e.to_string()))?;
        Ok(match message {
            WireMessage::V1(event) => event,
        })
    }
}
