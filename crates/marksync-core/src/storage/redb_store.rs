//! Persistent bookmark store using redb
//!
//! One table, keyed by bookmark id (ULID string), holding JSON records.
//! Listings scan the table and filter by owner; personal lists are small.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use redb::{Database, ReadableTable, ReadableTableMetadata, TableDefinition};
use tracing::{debug, info};

use super::{sort_newest_first, BookmarkStore, IdAllocator};
use crate::error::{StoreError, StoreResult};
use crate::types::{Bookmark, BookmarkId, NewBookmark, OwnerId};

/// Bookmarks table (key: ULID string, value: JSON-serialized Bookmark)
const BOOKMARKS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("bookmarks");

/// Storage layer using redb for ACID-compliant persistence
#[derive(Clone)]
pub struct RedbStore {
    db: Arc<Database>,
    ids: Arc<IdAllocator>,
}

impl RedbStore {
    /// Open (or create) the store at the given path.
    ///
    /// This will:
    /// - Create the parent directory if it doesn't exist
    /// - Initialize the database file
    /// - Create the bookmarks table
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::create(path)?;

        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(BOOKMARKS_TABLE)?;
        }
        write_txn.commit()?;

        info!(?path, "Opened bookmark store");

        Ok(Self {
            db: Arc::new(db),
            ids: Arc::new(IdAllocator::new()),
        })
    }

    /// Load a single bookmark by id
    pub fn get(&self, id: &BookmarkId) -> StoreResult<Option<Bookmark>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(BOOKMARKS_TABLE)?;
        let key = id.to_string();

        match table.get(key.as_str())? {
            Some(v) => Ok(Some(decode(v.value())?)),
            None => Ok(None),
        }
    }

    /// Number of records across all owners
    pub fn count(&self) -> StoreResult<usize> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(BOOKMARKS_TABLE)?;
        Ok(table.len()? as usize)
    }
}

fn decode(bytes: &[u8]) -> StoreResult<Bookmark> {
    serde_json::from_slice(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
}

#[async_trait]
impl BookmarkStore for RedbStore {
    async fn list(&self, owner: &OwnerId) -> StoreResult<Vec<Bookmark>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(BOOKMARKS_TABLE)?;

        let mut bookmarks = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            let bookmark = decode(value.value())?;
            if &bookmark.owner_id == owner {
                bookmarks.push(bookmark);
            }
        }
        sort_newest_first(&mut bookmarks);

        debug!(%owner, count = bookmarks.len(), "Listed bookmarks");
        Ok(bookmarks)
    }

    async fn create(&self, owner: &OwnerId, new: &NewBookmark) -> StoreResult<Bookmark> {
        let bookmark = self.ids.allocate(owner, new)?;
        let data =
            serde_json::to_vec(&bookmark).map_err(|e| StoreError::Serialization(e.to_string()))?;
        let key = bookmark.id.to_string();

        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(BOOKMARKS_TABLE)?;
            table.insert(key.as_str(), data.as_slice())?;
        }
        write_txn.commit()?;

        debug!(%owner, id = %bookmark.id, "Created bookmark");
        Ok(bookmark)
    }

    async fn delete(&self, owner: &OwnerId, id: &BookmarkId) -> StoreResult<()> {
        let key = id.to_string();

        let write_txn = self.db.begin_write()?;
        let removed = {
            let mut table = write_txn.open_table(BOOKMARKS_TABLE)?;
            let owned = match table.get(key.as_str())? {
                Some(v) => &decode(v.value())?.owner_id == owner,
                None => false,
            };
            if owned {
                table.remove(key.as_str())?;
            }
            owned
        };
        write_txn.commit()?;

        if !removed {
            return Err(StoreError::NotFound(*id));
        }
        debug!(%owner, %id, "Deleted bookmark");
        Ok(())
    }
}
