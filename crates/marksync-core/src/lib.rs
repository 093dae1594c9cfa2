//! marksync core library
//!
//! Multi-tab bookmark synchronization with optimistic local state.
//!
//! ## Overview
//!
//! Each open session (a browser tab, a CLI run) keeps its own replica of a
//! user's bookmark list. Replicas converge through two channels:
//!
//! - a durable store, read once on startup and written on every change
//! - a per-user broadcast topic, carrying adds and deletes between sessions
//!
//! Changes are applied by id, so replaying or reordering broadcasts never
//! duplicates or resurrects an entry.
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use marksync_core::{BookmarkSync, LocalBus, OwnerId, RedbStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(RedbStore::open("~/.marksync/data/marksync.redb")?);
//!     let bus = Arc::new(LocalBus::default());
//!
//!     let tab = BookmarkSync::new(store, bus);
//!     tab.initialize(OwnerId::parse("alice")?).await?;
//!
//!     tab.add_bookmark("Docs", "https://docs.example").await?;
//!
//!     for bookmark in tab.bookmarks() {
//!         println!("{}  {}", bookmark.title, bookmark.url);
//!     }
//!
//!     tab.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod list;
pub mod storage;
pub mod sync;
pub mod types;

// Re-exports
pub use config::{BusConfig, EngineConfig};
pub use engine::BookmarkSync;
pub use error::{BusError, StoreError, SyncError, SyncResult, ValidationError};
pub use list::{BookmarkList, LoadOutcome, LoadTicket};
pub use storage::{BookmarkStore, MemoryStore, RedbStore};
pub use sync::{
    BookmarkEvent, BroadcastBus, EngineEvent, EngineStatus, Frame, LocalBus, Origin,
    Subscription, WireMessage,
};
pub use types::*;
