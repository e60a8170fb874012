//! JSON snapshot of a [`MemoryStore`] on disk.

use super::{MemoryStore, StorageError};
use crate::model::{Mailbox, MessageRecord, PathRegistration};
use crate::schema::SchemaVersion;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreDocument {
    pub schema_version: SchemaVersion,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub mailboxes: Vec<Mailbox>,
    #[serde(default)]
    pub mailbox_paths: Vec<PathRegistration>,
    #[serde(default)]
    pub imap_uids: Vec<MessageRecord>,
    #[serde(default)]
    pub message_ids: Vec<MessageRecord>,
}

impl StoreDocument {
    /// Capture the current content of `store`
    pub async fn capture(store: &MemoryStore) -> Self {
        Self {
            schema_version: store.schema_version.current(),
            updated_at: Some(Utc::now()),
            mailboxes: store.mailboxes.records().await,
            mailbox_paths: store.mailbox_paths.records().await,
            imap_uids: store.imap_uids.records().await,
            message_ids: store.message_ids.records().await,
        }
    }

    /// Build a store holding this document's rows
    pub async fn into_store(self) -> MemoryStore {
        let store = MemoryStore::new(self.schema_version);
        store.mailboxes.seed(self.mailboxes).await;
        store.mailbox_paths.seed(self.mailbox_paths).await;
        store.imap_uids.seed(self.imap_uids).await;
        store.message_ids.seed(self.message_ids).await;
        store
    }
}

/// Read a store from a JSON document
pub async fn load_store(path: &Path) -> Result<MemoryStore, StorageError> {
    if !path.exists() {
        return Err(StorageError::NotFound(path.display().to_string()));
    }

    let content = fs::read_to_string(path).await?;
    let document: StoreDocument = serde_json::from_str(&content)?;
    Ok(document.into_store().await)
}

/// Write the store back to disk with an atomic rename
pub async fn save_store(path: &Path, store: &MemoryStore) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }

    let document = StoreDocument::capture(store).await;
    let temp_path = path.with_extension("json.tmp");
    let content = serde_json::to_string_pretty(&document)?;
    fs::write(&temp_path, &content).await?;
    fs::rename(&temp_path, path).await?;

    Ok(())
}
