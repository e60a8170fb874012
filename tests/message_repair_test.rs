mod common;

use async_trait::async_trait;
use common::{create_store, message, message_service, repair_messages, total_writes};
use mailstore_repair::model::{
    Flags, MailboxId, MessageConflict, MessageRecord, MessageUid, ModSeq,
};
use mailstore_repair::repair::{
    MessageContext, MessageRepairService, MessageSnapshot, RepairError, RunningOptions,
    TaskResult,
};
use mailstore_repair::storage::{
    FailureTimes, MemoryTable, Operation, RecordStream, StorageError, Table,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_missing_message_id_entry_is_added() {
    let store = create_store();
    let record = message(MailboxId::random(), 1);
    store.imap_uids.seed(vec![record.clone()]).await;

    let (result, snapshot) = repair_messages(&store, RunningOptions::default()).await;

    assert_eq!(result.unwrap(), TaskResult::Completed);
    assert_eq!(
        snapshot,
        MessageSnapshot {
            processed_primary_entries: 1,
            processed_index_entries: 1,
            added_index_entries: 1,
            fixed_inconsistencies: vec![record.composed],
            ..MessageSnapshot::default()
        }
    );
    assert_eq!(store.message_ids.records().await, vec![record]);
}

#[tokio::test]
async fn test_outdated_flags_are_overwritten() {
    let store = create_store();
    let stale = message(MailboxId::random(), 1);
    let current = MessageRecord {
        flags: Flags::seen().with_user_flag("$Forwarded"),
        ..stale.clone()
    };
    store.imap_uids.seed(vec![current.clone()]).await;
    store.message_ids.seed(vec![stale]).await;

    let (result, snapshot) = repair_messages(&store, RunningOptions::default()).await;

    assert_eq!(result.unwrap(), TaskResult::Completed);
    assert_eq!(snapshot.updated_index_entries, 1);
    assert_eq!(snapshot.fixed_inconsistencies, vec![current.composed]);
    assert_eq!(store.message_ids.records().await, vec![current]);
}

#[tokio::test]
async fn test_outdated_mod_seq_is_overwritten() {
    let store = create_store();
    let stale = message(MailboxId::random(), 3);
    let current = MessageRecord {
        mod_seq: ModSeq(9),
        ..stale.clone()
    };
    store.imap_uids.seed(vec![current.clone()]).await;
    store.message_ids.seed(vec![stale]).await;

    let (result, snapshot) = repair_messages(&store, RunningOptions::default()).await;

    assert_eq!(result.unwrap(), TaskResult::Completed);
    assert_eq!(snapshot.updated_index_entries, 1);
    assert_eq!(store.message_ids.records().await, vec![current]);
}

#[tokio::test]
async fn test_orphan_message_id_entry_is_removed() {
    let store = create_store();
    let orphan = message(MailboxId::random(), 1);
    store.message_ids.seed(vec![orphan.clone()]).await;

    let (result, snapshot) = repair_messages(&store, RunningOptions::default()).await;

    assert_eq!(result.unwrap(), TaskResult::Completed);
    assert_eq!(
        snapshot,
        MessageSnapshot {
            processed_index_entries: 1,
            removed_index_entries: 1,
            fixed_inconsistencies: vec![orphan.composed],
            ..MessageSnapshot::default()
        }
    );
    assert!(store.message_ids.is_empty().await);
}

#[tokio::test]
async fn test_entry_under_old_uid_is_moved() {
    let store = create_store();
    let old = message(MailboxId::random(), 1);
    let mut current = old.clone();
    current.composed.uid = MessageUid(2);
    store.imap_uids.seed(vec![current.clone()]).await;
    store.message_ids.seed(vec![old]).await;

    let (result, snapshot) = repair_messages(&store, RunningOptions::default()).await;

    assert_eq!(result.unwrap(), TaskResult::Completed);
    assert_eq!(snapshot.removed_index_entries, 1);
    assert_eq!(snapshot.added_index_entries, 1);
    assert_eq!(store.message_ids.records().await, vec![current]);
}

#[tokio::test]
async fn test_two_live_messages_on_one_uid_conflict() {
    let store = create_store();
    let mailbox_id = MailboxId::random();
    let first = message(mailbox_id, 5);
    let second = message(mailbox_id, 5);
    store
        .imap_uids
        .seed(vec![first.clone(), second.clone()])
        .await;
    store.message_ids.seed(vec![second.clone()]).await;

    let (result, snapshot) = repair_messages(&store, RunningOptions::default()).await;

    assert_eq!(result.unwrap(), TaskResult::Completed);
    assert_eq!(
        snapshot.conflicting_entries,
        vec![MessageConflict::new(&first, &second)]
    );
    assert!(snapshot.fixed_inconsistencies.is_empty());
    assert_eq!(total_writes(&store), 0);
    assert_eq!(store.imap_uids.len().await, 2);
    assert_eq!(store.message_ids.records().await, vec![second]);
}

#[tokio::test]
async fn test_uid_of_expunged_message_claimed_by_live_one_is_a_conflict() {
    let store = create_store();
    let mailbox_id = MailboxId::random();
    let live = message(mailbox_id, 5);
    let expunged = message(mailbox_id, 5);
    store.imap_uids.seed(vec![live.clone()]).await;
    store.message_ids.seed(vec![expunged.clone()]).await;

    let (result, snapshot) = repair_messages(&store, RunningOptions::default()).await;

    assert_eq!(result.unwrap(), TaskResult::Completed);
    assert_eq!(
        snapshot.conflicting_entries,
        vec![MessageConflict::new(&live, &expunged)]
    );
    assert_eq!(snapshot.added_index_entries, 0);
    assert_eq!(snapshot.removed_index_entries, 0);
    assert_eq!(snapshot.processed_index_entries, 1);
    assert!(snapshot.fixed_inconsistencies.is_empty());
    assert_eq!(total_writes(&store), 0);
    assert_eq!(store.message_ids.records().await, vec![expunged]);
}

#[tokio::test]
async fn test_one_failed_write_makes_run_partial() {
    let store = create_store();
    let mailbox_id = MailboxId::random();
    let failing = message(mailbox_id, 1);
    let healthy = message(mailbox_id, 2);
    store
        .imap_uids
        .seed(vec![failing.clone(), healthy.clone()])
        .await;
    store.message_ids.fail_for_key(
        Operation::Put,
        failing.message_id_key(),
        FailureTimes::Times(1),
    );

    let (result, snapshot) = repair_messages(&store, RunningOptions::default()).await;

    assert_eq!(result.unwrap(), TaskResult::Partial);
    assert_eq!(snapshot.errors, vec![failing.composed]);
    assert_eq!(snapshot.fixed_inconsistencies, vec![healthy.composed]);
    assert_eq!(snapshot.processed_primary_entries, 2);
    assert_eq!(snapshot.error_count(), 1);
}

#[tokio::test]
async fn test_failed_detection_read_is_recorded() {
    let store = create_store();
    let record = message(MailboxId::random(), 1);
    store.imap_uids.seed(vec![record.clone()]).await;
    store.message_ids.seed(vec![record.clone()]).await;
    // Only the primary pass reads the message-id table for a consistent row
    store.message_ids.fail(Operation::Get, FailureTimes::Times(1));

    let (result, snapshot) = repair_messages(&store, RunningOptions::default()).await;

    assert_eq!(result.unwrap(), TaskResult::Partial);
    assert_eq!(snapshot.errors, vec![record.composed]);
    assert_eq!(snapshot.processed_primary_entries, 1);
    assert_eq!(snapshot.processed_index_entries, 1);
    assert_eq!(total_writes(&store), 0);
}

#[tokio::test]
async fn test_pending_insert_is_not_fixed() {
    let store = create_store();
    let record = message(MailboxId::random(), 1);
    store.imap_uids.seed(vec![record.clone()]).await;

    let barrier = store.message_ids.pause_next_get();
    let service = Arc::new(message_service(&store));
    let context = Arc::new(MessageContext::new());
    let run = spawn_repair(service, context.clone());

    barrier.await_caller().await;
    store.message_ids.put(record.clone()).await.unwrap();
    barrier.release_caller();

    assert_eq!(run.await.unwrap().unwrap(), TaskResult::Completed);
    let snapshot = context.snapshot();
    assert!(snapshot.fixed_inconsistencies.is_empty());
    assert_eq!(snapshot.added_index_entries, 0);
    assert_eq!(store.message_ids.write_count(), 1);
}

#[tokio::test]
async fn test_pending_flag_update_is_not_fixed() {
    let store = create_store();
    let stale = message(MailboxId::random(), 1);
    let current = MessageRecord {
        flags: Flags::seen(),
        ..stale.clone()
    };
    store.imap_uids.seed(vec![current.clone()]).await;
    store.message_ids.seed(vec![stale]).await;

    // Park the primary pass's detection read of the stale row
    let barrier = store.message_ids.pause_next_get();
    let service = Arc::new(message_service(&store));
    let context = Arc::new(MessageContext::new());
    let run = spawn_repair(service, context.clone());

    barrier.await_caller().await;
    store.message_ids.put(current.clone()).await.unwrap();
    barrier.release_caller();

    assert_eq!(run.await.unwrap().unwrap(), TaskResult::Completed);
    let snapshot = context.snapshot();
    assert!(snapshot.fixed_inconsistencies.is_empty());
    assert_eq!(snapshot.updated_index_entries, 0);
    assert_eq!(store.message_ids.records().await, vec![current]);
}

#[tokio::test]
async fn test_pending_delete_is_not_fixed() {
    let store = create_store();
    let deleted = message(MailboxId::random(), 1);
    store.message_ids.seed(vec![deleted.clone()]).await;

    let barrier = store.imap_uids.pause_next_get();
    let service = Arc::new(message_service(&store));
    let context = Arc::new(MessageContext::new());
    let run = spawn_repair(service, context.clone());

    barrier.await_caller().await;
    store
        .message_ids
        .delete(&deleted.message_id_key())
        .await
        .unwrap();
    barrier.release_caller();

    assert_eq!(run.await.unwrap().unwrap(), TaskResult::Completed);
    let snapshot = context.snapshot();
    assert!(snapshot.fixed_inconsistencies.is_empty());
    assert_eq!(snapshot.removed_index_entries, 0);
    assert_eq!(store.message_ids.write_count(), 1);
}

#[tokio::test]
async fn test_consistent_messages_need_no_writes() {
    let store = create_store();
    let mailbox_id = MailboxId::random();
    let records: Vec<_> = (1..=20).map(|uid| message(mailbox_id, uid)).collect();
    store.imap_uids.seed(records.clone()).await;
    store.message_ids.seed(records).await;

    let (result, snapshot) = repair_messages(&store, RunningOptions::new(4).unwrap()).await;

    assert_eq!(result.unwrap(), TaskResult::Completed);
    assert_eq!(total_writes(&store), 0);
    assert_eq!(snapshot.processed_primary_entries, 20);
    assert_eq!(snapshot.processed_index_entries, 20);
    assert!(snapshot.fixed_inconsistencies.is_empty());
}

#[test]
fn test_zero_concurrency_is_rejected() {
    assert!(matches!(
        RunningOptions::new(0),
        Err(RepairError::InvalidOptions(_))
    ));
}

#[tokio::test]
async fn test_cancelled_run_returns_accumulated_state() {
    let store = create_store();
    store
        .imap_uids
        .seed(vec![message(MailboxId::random(), 1)])
        .await;
    let context = Arc::new(MessageContext::new());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = message_service(&store)
        .repair(&context, &RunningOptions::default(), &cancel)
        .await;

    assert_eq!(result.unwrap(), TaskResult::Completed);
    assert_eq!(
        context.snapshot(),
        MessageSnapshot {
            cancelled: true,
            ..MessageSnapshot::default()
        }
    );
    assert!(store.message_ids.is_empty().await);
}

#[tokio::test]
async fn test_cancel_during_pass_stops_pulling_records() {
    let store = create_store();
    let mailbox_id = MailboxId::random();
    store
        .imap_uids
        .seed((1..=5).map(|uid| message(mailbox_id, uid)))
        .await;

    let barrier = store.message_ids.pause_next_get();
    let service = Arc::new(message_service(&store));
    let context = Arc::new(MessageContext::new());
    let cancel = CancellationToken::new();

    let run = tokio::spawn({
        let service = service.clone();
        let context = context.clone();
        let cancel = cancel.clone();
        async move {
            service
                .repair(&context, &RunningOptions::new(1).unwrap(), &cancel)
                .await
        }
    });

    barrier.await_caller().await;
    cancel.cancel();
    barrier.release_caller();

    assert_eq!(run.await.unwrap().unwrap(), TaskResult::Completed);
    let snapshot = context.snapshot();
    assert!(snapshot.cancelled);
    assert_eq!(snapshot.processed_primary_entries, 1);
    assert_eq!(snapshot.processed_index_entries, 0);
    assert_eq!(snapshot.added_index_entries, 1);
    assert_eq!(store.message_ids.len().await, 1);
    assert_eq!(store.imap_uids.len().await, 5);
}

/// Index table wrapper tracking how many point reads are in flight at once.
struct InFlightTable {
    inner: Arc<MemoryTable<(MailboxId, MessageUid), MessageRecord>>,
    current: AtomicUsize,
    peak: AtomicUsize,
}

#[async_trait]
impl Table for InFlightTable {
    type Key = (MailboxId, MessageUid);
    type Record = MessageRecord;

    async fn get(&self, key: &Self::Key) -> Result<Option<MessageRecord>, StorageError> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(2)).await;
        let result = self.inner.get(key).await;
        self.current.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn put(&self, record: MessageRecord) -> Result<(), StorageError> {
        self.inner.put(record).await
    }

    async fn delete(&self, key: &Self::Key) -> Result<(), StorageError> {
        self.inner.delete(key).await
    }

    fn scan_all(&self) -> RecordStream<'_, MessageRecord> {
        self.inner.scan_all()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_in_flight_identities_stay_within_limit() {
    let store = create_store();
    let mailbox_id = MailboxId::random();
    store
        .imap_uids
        .seed((1..=30).map(|uid| message(mailbox_id, uid)))
        .await;

    let index = Arc::new(InFlightTable {
        inner: store.message_ids.clone(),
        current: AtomicUsize::new(0),
        peak: AtomicUsize::new(0),
    });
    let service = MessageRepairService::for_messages(store.imap_uids.clone(), index.clone());
    let context = Arc::new(MessageContext::new());

    let result = service
        .repair(&context, &RunningOptions::new(3).unwrap(), &CancellationToken::new())
        .await;

    assert_eq!(result.unwrap(), TaskResult::Completed);
    assert_eq!(context.snapshot().added_index_entries, 30);
    assert_eq!(store.message_ids.len().await, 30);
    let peak = index.peak.load(Ordering::SeqCst);
    assert!(peak >= 1 && peak <= 3, "peak in-flight reads was {peak}");
}

fn spawn_repair(
    service: Arc<MessageRepairService>,
    context: Arc<MessageContext>,
) -> tokio::task::JoinHandle<Result<TaskResult, RepairError>> {
    tokio::spawn(async move {
        service
            .repair(&context, &RunningOptions::default(), &CancellationToken::new())
            .await
    })
}
