//! Runs both scan directions of an index kind with bounded fan-out.

use super::context::Context;
use super::kind::{IndexKind, MailboxPathIndex, MessageIdIndex, Pass, PASSES};
use super::options::RunningOptions;
use super::reconcile::Reconciler;
use super::{RepairError, TaskResult};
use crate::model::{Mailbox, MailboxId, MailboxPath, MessageId, MessageRecord, MessageUid, PathRegistration};
use crate::schema::{check_schema_version, SchemaVersionSource, MAILBOX_PATH_INDEX_REQUIRED_VERSION};
use crate::storage::{DynTable, RecordStream};
use futures_util::StreamExt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

pub type MailboxRepairService = RepairService<MailboxPathIndex>;
pub type MessageRepairService = RepairService<MessageIdIndex>;

pub struct RepairService<K: IndexKind> {
    reconciler: Arc<Reconciler<K>>,
    schema_versions: Option<Arc<dyn SchemaVersionSource>>,
}

impl RepairService<MailboxPathIndex> {
    pub fn for_mailboxes(
        mailboxes: DynTable<MailboxId, Mailbox>,
        mailbox_paths: DynTable<MailboxPath, PathRegistration>,
        schema_versions: Arc<dyn SchemaVersionSource>,
    ) -> Self {
        Self {
            reconciler: Arc::new(Reconciler::new(mailboxes, mailbox_paths)),
            schema_versions: Some(schema_versions),
        }
    }
}

impl RepairService<MessageIdIndex> {
    pub fn for_messages(
        imap_uids: DynTable<(MessageId, MailboxId), MessageRecord>,
        message_ids: DynTable<(MailboxId, MessageUid), MessageRecord>,
    ) -> Self {
        Self {
            reconciler: Arc::new(Reconciler::new(imap_uids, message_ids)),
            schema_versions: None,
        }
    }
}

impl<K: IndexKind> RepairService<K> {
    /// Run a full repair, accumulating outcomes into `context`.
    ///
    /// Per-identity storage failures only downgrade the result to
    /// [`TaskResult::Partial`]. An unmet schema precondition fails before any
    /// table is read. A cancelled run still returns its result; the context
    /// is marked cancelled.
    pub async fn repair(
        &self,
        context: &Arc<Context<K>>,
        options: &RunningOptions,
        cancel: &CancellationToken,
    ) -> Result<TaskResult, RepairError> {
        if let Some(versions) = &self.schema_versions {
            if let Err(e) =
                check_schema_version(versions.as_ref(), MAILBOX_PATH_INDEX_REQUIRED_VERSION).await
            {
                error!(kind = K::NAME, error = %e, "Repair aborted");
                return Err(e.into());
            }
        }

        info!(kind = K::NAME, concurrency = options.concurrency(), "Starting repair");

        for pass in PASSES {
            if cancel.is_cancelled() {
                break;
            }
            match pass {
                Pass::PrimaryToIndex => {
                    let records = self.reconciler.primary_table().scan_all();
                    self.drive(pass, records, context, options, cancel, |reconciler, context, record| {
                        async move { reconciler.reconcile_primary(&context, record).await }
                    })
                    .await;
                }
                Pass::IndexToPrimary => {
                    let records = self.reconciler.index_table().scan_all();
                    self.drive(pass, records, context, options, cancel, |reconciler, context, record| {
                        async move { reconciler.reconcile_index(&context, record).await }
                    })
                    .await;
                }
            }
        }

        if cancel.is_cancelled() {
            warn!(kind = K::NAME, "Repair cancelled, reporting accumulated state");
            context.mark_cancelled();
        }

        let result = if context.error_count() == 0 {
            TaskResult::Completed
        } else {
            TaskResult::Partial
        };

        let snapshot = context.snapshot();
        info!(
            kind = K::NAME,
            result = ?result,
            processed_primary = snapshot.processed_primary_entries,
            processed_index = snapshot.processed_index_entries,
            added = snapshot.added_index_entries,
            updated = snapshot.updated_index_entries,
            removed = snapshot.removed_index_entries,
            conflicts = snapshot.conflicting_entries.len(),
            errors = snapshot.error_count(),
            cancelled = snapshot.cancelled,
            "Repair finished"
        );

        Ok(result)
    }

    /// Consume one scan, keeping at most `concurrency` identities in flight.
    ///
    /// A permit is taken before the next record is pulled, so the scan is
    /// never read ahead of the workers.
    async fn drive<R, F, Fut>(
        &self,
        pass: Pass,
        mut records: RecordStream<'_, R>,
        context: &Arc<Context<K>>,
        options: &RunningOptions,
        cancel: &CancellationToken,
        work: F,
    ) where
        R: Send + 'static,
        F: Fn(Arc<Reconciler<K>>, Arc<Context<K>>, R) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let semaphore = Arc::new(Semaphore::new(options.concurrency()));
        let mut in_flight = JoinSet::new();

        loop {
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                permit = semaphore.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                next = records.next() => next,
            };

            match next {
                None => break,
                Some(Err(e)) => {
                    error!(kind = K::NAME, pass = pass.as_str(), error = %e, "Scan failed, ending pass");
                    context.record_unattributed_error();
                    break;
                }
                Some(Ok(record)) => {
                    let unit = work(self.reconciler.clone(), context.clone(), record);
                    in_flight.spawn(async move {
                        let _permit = permit;
                        unit.await;
                    });
                }
            }

            while let Some(joined) = in_flight.try_join_next() {
                reap(pass, joined, context);
            }
        }

        while let Some(joined) = in_flight.join_next().await {
            reap(pass, joined, context);
        }
    }
}

fn reap<K: IndexKind>(pass: Pass, joined: Result<(), tokio::task::JoinError>, context: &Context<K>) {
    if let Err(e) = joined {
        error!(kind = K::NAME, pass = pass.as_str(), error = %e, "Repair unit panicked");
        context.record_unattributed_error();
    }
}
