use super::mailbox::MailboxId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

/// Identifier of a message, shared by every mailbox the message is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(Uuid);

impl MessageId {
    pub fn new(id: Uuid) -> Self {
        Self(id)
    }

    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// IMAP UID, unique within one mailbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageUid(pub u32);

impl fmt::Display for MessageUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Modification sequence (RFC 7162).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModSeq(pub u64);

/// Location of one message in one mailbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComposedMessageId {
    pub mailbox_id: MailboxId,
    pub message_id: MessageId,
    pub uid: MessageUid,
}

impl ComposedMessageId {
    pub fn new(mailbox_id: MailboxId, message_id: MessageId, uid: MessageUid) -> Self {
        Self {
            mailbox_id,
            message_id,
            uid,
        }
    }
}

impl fmt::Display for ComposedMessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "mailbox={} uid={} message={}",
            self.mailbox_id, self.uid, self.message_id
        )
    }
}

/// IMAP system flags plus keywords.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flags {
    #[serde(default)]
    pub answered: bool,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub draft: bool,
    #[serde(default)]
    pub flagged: bool,
    #[serde(default)]
    pub recent: bool,
    #[serde(default)]
    pub seen: bool,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub user_flags: BTreeSet<String>,
}

impl Flags {
    pub fn seen() -> Self {
        Self {
            seen: true,
            ..Self::default()
        }
    }

    pub fn with_user_flag(mut self, flag: impl Into<String>) -> Self {
        self.user_flags.insert(flag.into());
        self
    }
}

/// Message metadata as stored in both the IMAP-UID table and the message-id
/// table. The two tables are keyed differently:
/// - IMAP-UID table: `(message_id, mailbox_id)`
/// - message-id table: `(mailbox_id, uid)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    pub composed: ComposedMessageId,
    #[serde(default)]
    pub flags: Flags,
    pub mod_seq: ModSeq,
}

impl MessageRecord {
    pub fn new(composed: ComposedMessageId, flags: Flags, mod_seq: ModSeq) -> Self {
        Self {
            composed,
            flags,
            mod_seq,
        }
    }

    /// Key of this record in the IMAP-UID table
    pub fn imap_uid_key(&self) -> (MessageId, MailboxId) {
        (self.composed.message_id, self.composed.mailbox_id)
    }

    /// Key of this record in the message-id table
    pub fn message_id_key(&self) -> (MailboxId, MessageUid) {
        (self.composed.mailbox_id, self.composed.uid)
    }
}
