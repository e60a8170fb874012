//! In-process backend.
//!
//! Besides backing the CLI, it lets tests script backend misbehaviour: failing
//! a given operation a number of times, and parking a point read right after
//! it has observed the table so another writer can slip in.

use super::{RecordStream, StorageError, Table};
use crate::model::{
    Mailbox, MailboxId, MailboxPath, MessageId, MessageRecord, MessageUid, PathRegistration,
};
use crate::schema::{SchemaVersion, StaticSchemaVersion};
use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Notify, RwLock};

pub const MAILBOX_TABLE: &str = "mailbox";
pub const MAILBOX_PATH_TABLE: &str = "mailboxPathV3";
pub const IMAP_UID_TABLE: &str = "imapUidTable";
pub const MESSAGE_ID_TABLE: &str = "messageIdTable";

/// Table operation a failure can be attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Get,
    Put,
    Delete,
    Scan,
}

/// How many matching calls an injected failure applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureTimes {
    Times(u32),
    Forever,
}

struct FailurePlan<K> {
    operation: Operation,
    key: Option<K>,
    remaining: Option<u32>,
}

/// Handle on a parked point read.
///
/// The next `get` on the table computes its answer, then waits until
/// [`ReadBarrier::release_caller`] is called before returning it.
#[derive(Clone)]
pub struct ReadBarrier {
    reached: Arc<Notify>,
    release: Arc<Notify>,
}

impl ReadBarrier {
    /// Wait until the parked read has observed the table
    pub async fn await_caller(&self) {
        self.reached.notified().await;
    }

    /// Let the parked read return
    pub fn release_caller(&self) {
        self.release.notify_one();
    }
}

pub struct MemoryTable<K, R> {
    name: &'static str,
    key_of: fn(&R) -> K,
    rows: RwLock<HashMap<K, R>>,
    failures: Mutex<Vec<FailurePlan<K>>>,
    read_barrier: Mutex<Option<ReadBarrier>>,
    writes: AtomicU64,
}

impl<K, R> MemoryTable<K, R>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    R: Clone + Send + Sync + 'static,
{
    pub fn new(name: &'static str, key_of: fn(&R) -> K) -> Self {
        Self {
            name,
            key_of,
            rows: RwLock::new(HashMap::new()),
            failures: Mutex::new(Vec::new()),
            read_barrier: Mutex::new(None),
            writes: AtomicU64::new(0),
        }
    }

    /// Load rows without counting them as writes
    pub async fn seed(&self, records: impl IntoIterator<Item = R>) {
        let mut rows = self.rows.write().await;
        for record in records {
            rows.insert((self.key_of)(&record), record);
        }
    }

    /// All rows, in no particular order
    pub async fn records(&self) -> Vec<R> {
        self.rows.read().await.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }

    /// Number of successful `put` and `delete` calls since creation
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Fail the next matching calls of `operation`
    pub fn fail(&self, operation: Operation, times: FailureTimes) {
        self.push_failure(operation, None, times);
    }

    /// Fail the next matching calls of `operation` on `key` only
    pub fn fail_for_key(&self, operation: Operation, key: K, times: FailureTimes) {
        self.push_failure(operation, Some(key), times);
    }

    /// Park the next point read after it has observed the table
    pub fn pause_next_get(&self) -> ReadBarrier {
        let barrier = ReadBarrier {
            reached: Arc::new(Notify::new()),
            release: Arc::new(Notify::new()),
        };
        *self.read_barrier.lock().unwrap_or_else(PoisonError::into_inner) = Some(barrier.clone());
        barrier
    }

    fn push_failure(&self, operation: Operation, key: Option<K>, times: FailureTimes) {
        let remaining = match times {
            FailureTimes::Times(0) => return,
            FailureTimes::Times(n) => Some(n),
            FailureTimes::Forever => None,
        };
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(FailurePlan {
                operation,
                key,
                remaining,
            });
    }

    fn check_failure(&self, operation: Operation, key: Option<&K>) -> Result<(), StorageError> {
        let mut plans = self.failures.lock().unwrap_or_else(PoisonError::into_inner);

        let position = plans.iter().position(|plan| {
            plan.operation == operation
                && match (&plan.key, key) {
                    (None, _) => true,
                    (Some(expected), Some(actual)) => expected == actual,
                    (Some(_), None) => false,
                }
        });

        let Some(index) = position else {
            return Ok(());
        };

        let exhausted = match plans[index].remaining.as_mut() {
            Some(remaining) => {
                *remaining -= 1;
                *remaining == 0
            }
            None => false,
        };
        if exhausted {
            plans.remove(index);
        }

        Err(StorageError::Unavailable(format!(
            "injected {:?} failure on {}",
            operation, self.name
        )))
    }
}

#[async_trait]
impl<K, R> Table for MemoryTable<K, R>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    R: Clone + Send + Sync + 'static,
{
    type Key = K;
    type Record = R;

    async fn get(&self, key: &K) -> Result<Option<R>, StorageError> {
        self.check_failure(Operation::Get, Some(key))?;

        let observed = self.rows.read().await.get(key).cloned();

        let barrier = self
            .read_barrier
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(barrier) = barrier {
            barrier.reached.notify_one();
            barrier.release.notified().await;
        }

        Ok(observed)
    }

    async fn put(&self, record: R) -> Result<(), StorageError> {
        let key = (self.key_of)(&record);
        self.check_failure(Operation::Put, Some(&key))?;

        self.rows.write().await.insert(key, record);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete(&self, key: &K) -> Result<(), StorageError> {
        self.check_failure(Operation::Delete, Some(key))?;

        self.rows.write().await.remove(key);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn scan_all(&self) -> RecordStream<'_, R> {
        if let Err(e) = self.check_failure(Operation::Scan, None) {
            return stream::once(async move { Err(e) }).boxed();
        }

        // Only the keys are copied up front; each row is read when pulled.
        stream::once(async move { self.rows.read().await.keys().cloned().collect::<Vec<K>>() })
            .flat_map(stream::iter)
            .filter_map(move |key| async move { self.rows.read().await.get(&key).cloned().map(Ok) })
            .boxed()
    }
}

/// The four tables the repair engine works on, plus the schema version.
pub struct MemoryStore {
    pub mailboxes: Arc<MemoryTable<MailboxId, Mailbox>>,
    pub mailbox_paths: Arc<MemoryTable<MailboxPath, PathRegistration>>,
    pub imap_uids: Arc<MemoryTable<(MessageId, MailboxId), MessageRecord>>,
    pub message_ids: Arc<MemoryTable<(MailboxId, MessageUid), MessageRecord>>,
    pub schema_version: Arc<StaticSchemaVersion>,
}

impl MemoryStore {
    pub fn new(schema_version: SchemaVersion) -> Self {
        Self {
            mailboxes: Arc::new(MemoryTable::new(MAILBOX_TABLE, |mailbox: &Mailbox| {
                mailbox.id
            })),
            mailbox_paths: Arc::new(MemoryTable::new(
                MAILBOX_PATH_TABLE,
                |registration: &PathRegistration| registration.path.clone(),
            )),
            imap_uids: Arc::new(MemoryTable::new(IMAP_UID_TABLE, MessageRecord::imap_uid_key)),
            message_ids: Arc::new(MemoryTable::new(
                MESSAGE_ID_TABLE,
                MessageRecord::message_id_key,
            )),
            schema_version: Arc::new(StaticSchemaVersion::new(schema_version)),
        }
    }
}
