//! Records describing divergences that cannot be repaired automatically.
//!
//! A conflict means two distinct primary identities claim the same index
//! slot. Picking a winner could hide mail, so the pair is reported and left
//! for an operator-driven merge.

use super::mailbox::{Mailbox, MailboxId, PathRegistration};
use super::message::{ComposedMessageId, MessageRecord};
use serde::{Deserialize, Serialize};

/// One side of a mailbox conflict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailboxEntry {
    pub mailbox_path: String,
    pub mailbox_id: MailboxId,
}

/// A mailbox whose path is registered for a different live mailbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictingEntry {
    pub mailbox_dao_entry: MailboxEntry,
    pub mailbox_path_dao_entry: MailboxEntry,
}

impl ConflictingEntry {
    pub fn new(mailbox: &Mailbox, registration: &PathRegistration) -> Self {
        Self {
            mailbox_dao_entry: MailboxEntry {
                mailbox_path: mailbox.path.to_string(),
                mailbox_id: mailbox.id,
            },
            mailbox_path_dao_entry: MailboxEntry {
                mailbox_path: registration.path.to_string(),
                mailbox_id: registration.id,
            },
        }
    }
}

/// A message whose (mailbox, uid) slot is held by a different live message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageConflict {
    pub imap_uid_entry: ComposedMessageId,
    pub message_id_entry: ComposedMessageId,
}

impl MessageConflict {
    pub fn new(from_imap_uid: &MessageRecord, from_message_id: &MessageRecord) -> Self {
        Self {
            imap_uid_entry: from_imap_uid.composed,
            message_id_entry: from_message_id.composed,
        }
    }
}
