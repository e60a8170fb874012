#![allow(dead_code)]

use mailstore_repair::model::{
    ComposedMessageId, Flags, Mailbox, MailboxId, MailboxPath, MessageId, MessageRecord,
    MessageUid, ModSeq, PathRegistration,
};
use mailstore_repair::repair::{
    MailboxContext, MailboxRepairService, MailboxSnapshot, MessageContext, MessageRepairService,
    MessageSnapshot, RepairError, RunningOptions, TaskResult,
};
use mailstore_repair::schema::SchemaVersion;
use mailstore_repair::storage::MemoryStore;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub const USER: &str = "bob@example.org";

/// Store at the minimum schema version accepted by the mailbox repair
pub fn create_store() -> MemoryStore {
    MemoryStore::new(SchemaVersion(6))
}

pub fn mailbox(name: &str) -> Mailbox {
    Mailbox::new(MailboxId::random(), MailboxPath::for_user(USER, name), 42)
}

pub fn registration(name: &str, id: MailboxId) -> PathRegistration {
    PathRegistration::new(MailboxPath::for_user(USER, name), id)
}

pub fn message(mailbox_id: MailboxId, uid: u32) -> MessageRecord {
    MessageRecord::new(
        ComposedMessageId::new(mailbox_id, MessageId::random(), MessageUid(uid)),
        Flags::default(),
        ModSeq(1),
    )
}

pub fn mailbox_service(store: &MemoryStore) -> MailboxRepairService {
    MailboxRepairService::for_mailboxes(
        store.mailboxes.clone(),
        store.mailbox_paths.clone(),
        store.schema_version.clone(),
    )
}

pub fn message_service(store: &MemoryStore) -> MessageRepairService {
    MessageRepairService::for_messages(store.imap_uids.clone(), store.message_ids.clone())
}

pub async fn repair_mailboxes(
    store: &MemoryStore,
) -> (Result<TaskResult, RepairError>, MailboxSnapshot) {
    let context = Arc::new(MailboxContext::new());
    let result = mailbox_service(store)
        .repair(&context, &RunningOptions::default(), &CancellationToken::new())
        .await;
    (result, context.snapshot())
}

pub async fn repair_messages(
    store: &MemoryStore,
    options: RunningOptions,
) -> (Result<TaskResult, RepairError>, MessageSnapshot) {
    let context = Arc::new(MessageContext::new());
    let result = message_service(store)
        .repair(&context, &options, &CancellationToken::new())
        .await;
    (result, context.snapshot())
}

/// Sum of writes issued against every table of the store
pub fn total_writes(store: &MemoryStore) -> u64 {
    store.mailboxes.write_count()
        + store.mailbox_paths.write_count()
        + store.imap_uids.write_count()
        + store.message_ids.write_count()
}
