//! In-memory bookmark store

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{sort_newest_first, BookmarkStore, IdAllocator};
use crate::error::{StoreError, StoreResult};
use crate::types::{Bookmark, BookmarkId, NewBookmark, OwnerId};

/// Store keeping records in a map; contents vanish with the process
pub struct MemoryStore {
    records: RwLock<HashMap<BookmarkId, Bookmark>>,
    ids: IdAllocator,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            ids: IdAllocator::new(),
        }
    }

    /// Start with the given records already persisted
    pub fn with_bookmarks(bookmarks: impl IntoIterator<Item = Bookmark>) -> Self {
        let store = Self::new();
        {
            let mut records = store.records.write();
            for bookmark in bookmarks {
                records.insert(bookmark.id, bookmark);
            }
        }
        store
    }

    /// Number of records across all owners
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    pub fn contains(&self, id: &BookmarkId) -> bool {
        self.records.read().contains_key(id)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BookmarkStore for MemoryStore {
    async fn list(&self, owner: &OwnerId) -> StoreResult<Vec<Bookmark>> {
        let mut bookmarks: Vec<Bookmark> = self
            .records
            .read()
            .values()
            .filter(|b| &b.owner_id == owner)
            .cloned()
            .collect();
        sort_newest_first(&mut bookmarks);
        Ok(bookmarks)
    }

    async fn create(&self, owner: &OwnerId, new: &NewBookmark) -> StoreResult<Bookmark> {
        let bookmark = self.ids.allocate(owner, new)?;
        self.records.write().insert(bookmark.id, bookmark.clone());
        Ok(bookmark)
    }

    async fn delete(&self, owner: &OwnerId, id: &BookmarkId) -> StoreResult<()> {
        let mut records = self.records.write();
        match records.get(id) {
            Some(existing) if &existing.owner_id == owner => {
                records.remove(id);
                Ok(())
            }
            _ => Err(StoreError::NotFound(*id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner(s: &str) -> OwnerId {
        OwnerId::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_create_then_list_newest_first() {
        let store = MemoryStore::new();
        let alice = owner("alice");

        let a = store
            .create(&alice, &NewBookmark::parse("A", "https://a").unwrap())
            .await
            .unwrap();
        let b = store
            .create(&alice, &NewBookmark::parse("B", "https://b").unwrap())
            .await
            .unwrap();

        let listed = store.list(&alice).await.unwrap();
        assert_eq!(listed, vec![b, a]);
    }

    #[tokio::test]
    async fn test_list_is_scoped_to_owner() {
        let store = MemoryStore::new();
        let new = NewBookmark::parse("A", "https://a").unwrap();
        store.create(&owner("alice"), &new).await.unwrap();
        store.create(&owner("bob"), &new).await.unwrap();

        assert_eq!(store.list(&owner("alice")).await.unwrap().len(), 1);
        assert_eq!(store.list(&owner("carol")).await.unwrap().len(), 0);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let store = MemoryStore::new();
        let id = BookmarkId::new();
        let err = store.delete(&owner("alice"), &id).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(missing) if missing == id));
    }

    #[tokio::test]
    async fn test_delete_removes_record() {
        let store = MemoryStore::new();
        let created = store
            .create(&owner("alice"), &NewBookmark::parse("A", "https://a").unwrap())
            .await
            .unwrap();

        store.delete(&owner("alice"), &created.id).await.unwrap();
        assert!(!store.contains(&created.id));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_delete_leaves_other_owners_records() {
        let store = MemoryStore::new();
        let bobs = store
            .create(&owner("bob"), &NewBookmark::parse("B", "https://b").unwrap())
            .await
            .unwrap();

        let err = store.delete(&owner("alice"), &bobs.id).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(id) if id == bobs.id));
        assert!(store.contains(&bobs.id));
        assert_eq!(store.list(&owner("bob")).await.unwrap(), vec![bobs]);
    }
}
