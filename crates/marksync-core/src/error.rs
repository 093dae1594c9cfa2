//! Error types for marksync
//!
//! Three layers, one per collaborator:
//! - [`StoreError`]: reported by a [`BookmarkStore`](crate::storage::BookmarkStore)
//! - [`BusError`]: reported by a [`BroadcastBus`](crate::sync::BroadcastBus)
//! - [`SyncError`]: returned by the engine to its caller

use thiserror::Error;

use crate::types::BookmarkId;

/// Rejected user input. Raised before any store call is made.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Title is empty after trimming
    #[error("title must not be empty")]
    EmptyTitle,

    /// URL is empty after trimming
    #[error("url must not be empty")]
    EmptyUrl,

    /// Owner identifier is empty after trimming
    #[error("owner id must not be empty")]
    EmptyOwner,
}

/// Errors reported by the durable bookmark store
#[derive(Error, Debug)]
pub enum StoreError {
    /// The store could not be reached or is not serving requests
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// The caller is not allowed to perform the operation
    #[error("Not authorized: {0}")]
    Auth(String),

    /// The store refused the record (server-side validation)
    #[error("Rejected by store: {0}")]
    Rejected(String),

    /// No record with this id exists
    #[error("Bookmark not found: {0}")]
    NotFound(BookmarkId),

    /// Error during serialization/deserialization of a record
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Database creation/opening error
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    /// Transaction error
    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    /// Table error
    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    /// Storage operation error
    #[error("Storage operation error: {0}")]
    StorageOp(#[from] redb::StorageError),

    /// Commit error
    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    /// General I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors reported by the broadcast bus
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BusError {
    /// The bus (or the topic) is no longer accepting frames
    #[error("Broadcast bus closed")]
    Closed,

    /// An event could not be encoded for the wire
    #[error("Failed to encode event: {0}")]
    Encode(String),

    /// A received frame could not be decoded
    #[error("Failed to decode frame: {0}")]
    Decode(String),
}

/// Main error type for engine operations
#[derive(Error, Debug)]
pub enum SyncError {
    /// Input rejected locally; no state changed, nothing was sent
    #[error("Invalid bookmark: {0}")]
    Validation(#[from] ValidationError),

    /// Store create/delete failed
    #[error("Persistence failed: {0}")]
    Persistence(#[source] StoreError),

    /// Store reported itself unavailable while loading
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Store refused access while loading
    #[error("Not authorized: {0}")]
    Auth(String),

    /// Subscribing to the owner's topic failed
    #[error("Broadcast error: {0}")]
    Broadcast(#[from] BusError),

    /// Operation requires `initialize` to have succeeded
    #[error("Engine is not initialized")]
    NotInitialized,

    /// `initialize` was called twice
    #[error("Engine is already initialized")]
    AlreadyInitialized,

    /// The engine has been shut down
    #[error("Engine has been shut down")]
    Disposed,

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// General I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SyncError {
    /// Map a store failure that happened while loading the list.
    ///
    /// Transport and auth failures pass through unchanged; anything else is
    /// reported as a persistence failure.
    pub fn from_load(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) => SyncError::StoreUnavailable(msg),
            StoreError::Auth(msg) => SyncError::Auth(msg),
            other => SyncError::Persistence(other),
        }
    }

    /// Whether this error was raised by local input validation
    pub fn is_validation(&self) -> bool {
        matches!(self, SyncError::Validation(_))
    }

    /// Whether this error came from a failed store write
    pub fn is_persistence(&self) -> bool {
        matches!(self, SyncError::Persistence(_))
    }
}

/// Result type alias using SyncError
pub type SyncResult<T> = Result<T, SyncError>;

/// Result type alias using StoreError
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SyncError::Validation(ValidationError::EmptyTitle);
        assert_eq!(format!("{}", err), "Invalid bookmark: title must not be empty");

        let err = SyncError::Persistence(StoreError::Unavailable("timeout".to_string()));
        assert_eq!(
            format!("{}", err),
            "Persistence failed: Store unavailable: timeout"
        );
    }

    #[test]
    fn test_from_load_passes_transport_errors_through() {
        let err = SyncError::from_load(StoreError::Unavailable("down".into()));
        assert!(matches!(err, SyncError::StoreUnavailable(msg) if msg == "down"));

        let err = SyncError::from_load(StoreError::Auth("expired".into()));
        assert!(matches!(err, SyncError::Auth(msg) if msg == "expired"));

        let err = SyncError::from_load(StoreError::Serialization("bad row".into()));
        assert!(err.is_persistence());
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let sync_err: SyncError = io_err.into();
        assert!(matches!(sync_err, SyncError::Io(_)));
    }

    #[test]
    fn test_validation_from() {
        let err: SyncError = ValidationError::EmptyUrl.into();
        assert!(err.is_validation());
        assert!(!err.is_persistence());
    }
}
