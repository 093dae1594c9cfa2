//! Cross-session synchronization layer
//!
//! ## Overview
//!
//! Every open session (tab) of a user subscribes to one topic derived from
//! the user's id. Sessions tell each other about changes by publishing
//! [`BookmarkEvent`]s on that topic; the durable store stays the source of
//! truth for cold loads.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  BroadcastBus (trait)                                           │
//! │  └── LocalBus: one tokio broadcast channel per topic            │
//! │                                                                 │
//! │  Subscription (per-session receiver)                            │
//! │  └── recv(): next Frame, skipping own frames when echo is off   │
//! │                                                                 │
//! │  WireMessage::V1(BookmarkEvent), postcard encoded               │
//! │  ├── bookmark_added { full record }                             │
//! │  └── bookmark_deleted { id }                                    │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let bus = LocalBus::default();
//! let topic = TopicId::for_owner(&owner);
//!
//! let mut sub = bus.subscribe(topic, session).await?;
//! bus.publish(topic, session, &BookmarkEvent::Deleted { id }).await?;
//!
//! while let Some(frame) = sub.recv().await {
//!     let event = frame.decode()?;
//! }
//! ```

mod bus;
mod events;
mod protocol;

pub use bus::{BroadcastBus, Frame, LocalBus, Subscription};
pub use events::{EngineEvent, EngineStatus, Origin};
pub use protocol::{BookmarkEvent, WireMessage, BOOKMARK_ADDED, BOOKMARK_DELETED};
