//! JSON progress report of a repair task.

use super::{SOLVE_MAILBOX_INCONSISTENCIES, SOLVE_MESSAGE_INCONSISTENCIES};
use crate::model::{ComposedMessageId, ConflictingEntry, MailboxId, MessageConflict};
use crate::repair::{MailboxSnapshot, MessageSnapshot, RunningOptions};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Details of a task, tagged with its type identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AdditionalInformation {
    #[serde(rename = "solve-mailbox-inconsistencies")]
    Mailbox(MailboxInconsistenciesDetails),

    #[serde(rename = "solve-message-inconsistencies")]
    Message(MessageInconsistenciesDetails),
}

impl AdditionalInformation {
    pub fn task_type(&self) -> &'static str {
        match self {
            AdditionalInformation::Mailbox(_) => SOLVE_MAILBOX_INCONSISTENCIES,
            AdditionalInformation::Message(_) => SOLVE_MESSAGE_INCONSISTENCIES,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            AdditionalInformation::Mailbox(details) => details.timestamp,
            AdditionalInformation::Message(details) => details.timestamp,
        }
    }

    pub fn error_count(&self) -> u64 {
        match self {
            AdditionalInformation::Mailbox(details) => details.error_count,
            AdditionalInformation::Message(details) => details.error_count,
        }
    }

    /// Whether the run stopped early; counters then cover only the work done
    pub fn cancelled(&self) -> bool {
        match self {
            AdditionalInformation::Mailbox(details) => details.cancelled,
            AdditionalInformation::Message(details) => details.cancelled,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailboxInconsistenciesDetails {
    pub processed_mailbox_entries: u64,
    pub processed_mailbox_path_entries: u64,
    pub added_mailbox_path_entries: u64,
    pub updated_mailbox_path_entries: u64,
    pub removed_mailbox_path_entries: u64,
    pub fixed_inconsistencies: Vec<MailboxId>,
    pub conflicting_entries: Vec<ConflictingEntry>,
    pub errors: Vec<MailboxId>,
    pub error_count: u64,
    #[serde(default)]
    pub cancelled: bool,
    pub timestamp: DateTime<Utc>,
}

impl MailboxInconsistenciesDetails {
    pub fn from_snapshot(snapshot: MailboxSnapshot, timestamp: DateTime<Utc>) -> Self {
        Self {
            processed_mailbox_entries: snapshot.processed_primary_entries,
            processed_mailbox_path_entries: snapshot.processed_index_entries,
            added_mailbox_path_entries: snapshot.added_index_entries,
            updated_mailbox_path_entries: snapshot.updated_index_entries,
            removed_mailbox_path_entries: snapshot.removed_index_entries,
            error_count: snapshot.error_count(),
            cancelled: snapshot.cancelled,
            fixed_inconsistencies: snapshot.fixed_inconsistencies,
            conflicting_entries: snapshot.conflicting_entries,
            errors: snapshot.errors,
            timestamp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageInconsistenciesDetails {
    pub processed_imap_uid_entries: u64,
    pub processed_message_id_entries: u64,
    pub added_message_id_entries: u64,
    pub updated_message_id_entries: u64,
    pub removed_message_id_entries: u64,
    pub running_options: RunningOptions,
    pub fixed_inconsistencies: Vec<ComposedMessageId>,
    pub conflicting_entries: Vec<MessageConflict>,
    pub errors: Vec<ComposedMessageId>,
    pub error_count: u64,
    #[serde(default)]
    pub cancelled: bool,
    pub timestamp: DateTime<Utc>,
}

impl MessageInconsistenciesDetails {
    pub fn from_snapshot(
        snapshot: MessageSnapshot,
        running_options: RunningOptions,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            processed_imap_uid_entries: snapshot.processed_primary_entries,
            processed_message_id_entries: snapshot.processed_index_entries,
            added_message_id_entries: snapshot.added_index_entries,
            updated_message_id_entries: snapshot.updated_index_entries,
            removed_message_id_entries: snapshot.removed_index_entries,
            running_options,
            error_count: snapshot.error_count(),
            cancelled: snapshot.cancelled,
            fixed_inconsistencies: snapshot.fixed_inconsistencies,
            conflicting_entries: snapshot.conflicting_entries,
            errors: snapshot.errors,
            timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mailbox_details_json_shape() {
        let id = MailboxId::random();
        let snapshot = MailboxSnapshot {
            processed_primary_entries: 3,
            processed_index_entries: 2,
            added_index_entries: 1,
            fixed_inconsistencies: vec![id],
            ..MailboxSnapshot::default()
        };
        let details = AdditionalInformation::Mailbox(MailboxInconsistenciesDetails::from_snapshot(
            snapshot,
            Utc::now(),
        ));

        let json = serde_json::to_value(&details).unwrap();
        assert_eq!(json["type"], "solve-mailbox-inconsistencies");
        assert_eq!(json["processedMailboxEntries"], 3);
        assert_eq!(json["processedMailboxPathEntries"], 2);
        assert_eq!(json["addedMailboxPathEntries"], 1);
        assert_eq!(json["fixedInconsistencies"][0], id.to_string());
        assert_eq!(json["errorCount"], 0);
        assert_eq!(json["cancelled"], false);
        assert!(json["timestamp"].is_string());
    }

    #[test]
    fn test_cancelled_run_is_flagged() {
        let snapshot = MessageSnapshot {
            processed_primary_entries: 1,
            cancelled: true,
            ..MessageSnapshot::default()
        };
        let details = AdditionalInformation::Message(MessageInconsistenciesDetails::from_snapshot(
            snapshot,
            RunningOptions::default(),
            Utc::now(),
        ));

        assert!(details.cancelled());
        assert_eq!(serde_json::to_value(&details).unwrap()["cancelled"], true);
    }

    #[test]
    fn test_message_details_carry_running_options() {
        let details = MessageInconsistenciesDetails::from_snapshot(
            MessageSnapshot::default(),
            RunningOptions::new(4).unwrap(),
            Utc::now(),
        );

        let json = serde_json::to_value(AdditionalInformation::Message(details)).unwrap();
        assert_eq!(json["type"], "solve-message-inconsistencies");
        assert_eq!(json["runningOptions"]["concurrency"], 4);
        assert_eq!(json["processedImapUidEntries"], 0);
    }

    #[test]
    fn test_details_deserialize_by_type() {
        let details = AdditionalInformation::Mailbox(MailboxInconsistenciesDetails::from_snapshot(
            MailboxSnapshot::default(),
            Utc::now(),
        ));
        let json = serde_json::to_string(&details).unwrap();

        let parsed: AdditionalInformation = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, details);
        assert_eq!(parsed.task_type(), SOLVE_MAILBOX_INCONSISTENCIES);
    }
}
