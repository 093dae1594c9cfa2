//! Engine status and change notifications
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  EngineStatus: lifecycle of one engine (one tab)                │
//! │  ├── Idle: created, not initialized                             │
//! │  ├── Loading: subscribed, waiting for the store listing         │
//! │  ├── Ready: listing merged, live updates flowing                │
//! │  ├── Degraded: listing failed or the broadcast topic closed     │
//! │  └── Disposed: shut down, nothing is applied any more           │
//! │                                                                 │
//! │  EngineEvent: what changed in the visible list                  │
//! │  ├── Loaded: a store listing was merged                         │
//! │  ├── Added / Removed: one entry changed, with its origin        │
//! │  └── StatusChanged                                              │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

use std::fmt;

use crate::types::{BookmarkId, SessionId};

/// Lifecycle state of an engine
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EngineStatus {
    /// Not initialized yet
    #[default]
    Idle,
    /// Subscribed; store listing in flight
    Loading,
    /// Listing merged
    Ready,
    /// Listing failed, or the broadcast topic closed
    Degraded(String),
    /// Shut down
    Disposed,
}

impl EngineStatus {
    pub fn is_disposed(&self) -> bool {
        matches!(self, EngineStatus::Disposed)
    }
}

impl fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineStatus::Idle => write!(f, "Idle"),
            EngineStatus::Loading => write!(f, "Loading"),
            EngineStatus::Ready => write!(f, "Ready"),
            EngineStatus::Degraded(msg) => write!(f, "Degraded: {}", msg),
            EngineStatus::Disposed => write!(f, "Disposed"),
        }
    }
}

/// Where a change to the visible list came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// A user intent in this session
    Local,
    /// A broadcast frame published by another session (or echoed back)
    Remote(SessionId),
    /// A broadcast applied directly through the engine API, sender unknown
    Broadcast,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Local => write!(f, "local"),
            Origin::Remote(session) => write!(f, "remote({})", session),
            Origin::Broadcast => write!(f, "broadcast"),
        }
    }
}

/// Notifications for observers of an engine (the view layer)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// A store listing was merged into the list
    Loaded {
        /// Number of visible bookmarks after the merge
        count: usize,
    },
    /// A bookmark became visible
    Added { id: BookmarkId, origin: Origin },
    /// A bookmark stopped being visible
    Removed { id: BookmarkId, origin: Origin },
    /// The engine status changed
    StatusChanged(EngineStatus),
}

impl EngineEvent {
    /// Id of the bookmark this event is about, if any
    pub fn bookmark_id(&self) -> Option<BookmarkId> {
        match self {
            EngineEvent::Added { id, .. } | EngineEvent::Removed { id, .. } => Some(*id),
            EngineEvent::Loaded { .. } | EngineEvent::StatusChanged(_) => None,
        }
    }
}
