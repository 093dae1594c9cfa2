//! Durable bookmark store
//!
//! The engine talks to its store only through [`BookmarkStore`]. The store is
//! a stateless pass-through from the engine's point of view: it assigns ids
//! and creation timestamps, and answers owner-scoped listings newest first.
//!
//! Two implementations ship with the crate:
//! - [`RedbStore`]: ACID, file backed (redb)
//! - [`MemoryStore`]: in-process, for tests and ephemeral sessions

use async_trait::async_trait;
use parking_lot::Mutex;
use ulid::Generator;

use crate::error::{StoreError, StoreResult};
use crate::types::{Bookmark, BookmarkId, NewBookmark, OwnerId};

mod memory;
mod redb_store;

pub use memory::MemoryStore;
pub use redb_store::RedbStore;

/// Remote collection of bookmarks
#[async_trait]
pub trait BookmarkStore: Send + Sync {
    /// All bookmarks of `owner`, newest first
    async fn list(&self, owner: &OwnerId) -> StoreResult<Vec<Bookmark>>;

    /// Persist a new bookmark; the store assigns `id` and `created_at`
    async fn create(&self, owner: &OwnerId, new: &NewBookmark) -> StoreResult<Bookmark>;

    /// Remove one of `owner`'s bookmarks. `NotFound` if `owner` has no such
    /// record; records of other owners are never touched.
    async fn delete(&self, owner: &OwnerId, id: &BookmarkId) -> StoreResult<()>;
}

/// Hands out monotonic ids together with their creation timestamps
pub(crate) struct IdAllocator {
    generator: Mutex<Generator>,
}

impl IdAllocator {
    pub(crate) fn new() -> Self {
        Self {
            generator: Mutex::new(Generator::new()),
        }
    }

    /// Build the record for a new bookmark
    pub(crate) fn allocate(&self, owner: &OwnerId, new: &NewBookmark) -> StoreResult<Bookmark> {
        let now = chrono::Utc::now();
        let ulid = self
            .generator
            .lock()
            .generate_from_datetime(now.into())
            .map_err(|e| StoreError::Unavailable(format!("id allocation failed: {}", e)))?;

        Ok(Bookmark {
            id: BookmarkId::from_ulid(ulid),
            url: new.url().to_string(),
            title: new.title().to_string(),
            created_at: now.timestamp_millis(),
            owner_id: owner.clone(),
        })
    }
}

/// Sort newest first, ties by id
pub(crate) fn sort_newest_first(bookmarks: &mut [Bookmark]) {
    bookmarks.sort_by(|a, b| b.recency_key().cmp(&a.recency_key()));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocated_ids_are_monotonic() {
        let alloc = IdAllocator::new();
        let owner = OwnerId::parse("alice").unwrap();
        let new = NewBookmark::parse("A", "https://a").unwrap();

        let ids: Vec<_> = (0..50)
            .map(|_| alloc.allocate(&owner, &new).unwrap().id)
            .collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
    }

    #[test]
    fn test_allocated_record_copies_input() {
        let alloc = IdAllocator::new();
        let owner = OwnerId::parse("alice").unwrap();
        let new = NewBookmark::parse(" Docs ", "https://docs.example").unwrap();

        let bookmark = alloc.allocate(&owner, &new).unwrap();
        assert_eq!(bookmark.title, "Docs");
        assert_eq!(bookmark.url, "https://docs.example");
        assert_eq!(bookmark.owner_id, owner);
        assert!(bookmark.created_at > 0);
    }
}
