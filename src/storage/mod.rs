//! Storage boundary consumed by the repair engine.
//!
//! The backend offers single-row operations and full scans only; no
//! multi-row transaction is assumed. Every table, primary or index, is seen
//! through the same [`Table`] trait.

mod file;
mod memory;

pub use file::{load_store, save_store, StoreDocument};
pub use memory::{
    FailureTimes, MemoryStore, MemoryTable, Operation, ReadBarrier, IMAP_UID_TABLE,
    MAILBOX_PATH_TABLE, MAILBOX_TABLE, MESSAGE_ID_TABLE,
};

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Store not found at {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Lazy, unordered stream of rows produced by a full table scan.
pub type RecordStream<'a, R> = BoxStream<'a, Result<R, StorageError>>;

/// A single table of the backend.
#[async_trait]
pub trait Table: Send + Sync {
    type Key: Send + Sync;
    type Record: Send;

    /// Point read
    async fn get(&self, key: &Self::Key) -> Result<Option<Self::Record>, StorageError>;

    /// Insert or overwrite the row keyed by the record's own key
    async fn put(&self, record: Self::Record) -> Result<(), StorageError>;

    /// Remove a row. Removing an absent row is not an error.
    async fn delete(&self, key: &Self::Key) -> Result<(), StorageError>;

    /// Stream every row of the table
    fn scan_all(&self) -> RecordStream<'_, Self::Record>;
}

/// Shared handle on a table.
pub type DynTable<K, R> = Arc<dyn Table<Key = K, Record = R>>;
