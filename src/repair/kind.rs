//! The two index kinds the engine knows how to repair.
//!
//! An index kind ties a primary table to its secondary index: how a primary
//! record is keyed, which index row it expects, which slot an index row
//! occupies and which primary an index row points back to.

use crate::model::{
    ComposedMessageId, ConflictingEntry, Mailbox, MailboxId, MailboxPath, MessageConflict,
    MessageId, MessageRecord, MessageUid, PathRegistration,
};
use serde::Serialize;
use std::fmt::{Debug, Display};
use std::hash::Hash;

/// One scan direction of a repair run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    /// Scan the primary table, check every expected index row
    PrimaryToIndex,
    /// Scan the index, check every referenced primary row
    IndexToPrimary,
}

impl Pass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Pass::PrimaryToIndex => "primary-to-index",
            Pass::IndexToPrimary => "index-to-primary",
        }
    }
}

/// Passes of every run, in order.
///
/// Orphans are only judged once every live primary has claimed its slot.
pub const PASSES: [Pass; 2] = [Pass::PrimaryToIndex, Pass::IndexToPrimary];

pub trait IndexKind: Send + Sync + 'static {
    /// Used in log lines
    const NAME: &'static str;

    type PrimaryKey: Clone + PartialEq + Send + Sync + 'static;
    type Primary: Clone + Send + Sync + 'static;
    type Slot: Clone + Eq + Hash + Send + Sync + 'static;
    type Index: Clone + PartialEq + Send + Sync + 'static;
    type Identity: Clone + Debug + Display + PartialEq + Serialize + Send + Sync + 'static;
    type Conflict: Clone + Debug + PartialEq + Serialize + Send + Sync + 'static;

    fn primary_key(primary: &Self::Primary) -> Self::PrimaryKey;

    /// The index row a primary record should be reachable through
    fn expected_index(primary: &Self::Primary) -> Self::Index;

    fn slot(index: &Self::Index) -> Self::Slot;

    fn referenced_primary(index: &Self::Index) -> Self::PrimaryKey;

    fn index_identity(index: &Self::Index) -> Self::Identity;

    fn primary_identity(primary: &Self::Primary) -> Self::Identity {
        Self::index_identity(&Self::expected_index(primary))
    }

    fn conflict(primary: &Self::Primary, index: &Self::Index) -> Self::Conflict;
}

/// Mailbox table (id -> mailbox) against the mailbox-path index (path -> id).
#[derive(Debug, Clone, Copy, Default)]
pub struct MailboxPathIndex;

impl IndexKind for MailboxPathIndex {
    const NAME: &'static str = "mailbox";

    type PrimaryKey = MailboxId;
    type Primary = Mailbox;
    type Slot = MailboxPath;
    type Index = PathRegistration;
    type Identity = MailboxId;
    type Conflict = ConflictingEntry;

    fn primary_key(primary: &Mailbox) -> MailboxId {
        primary.id
    }

    fn expected_index(primary: &Mailbox) -> PathRegistration {
        primary.associated_registration()
    }

    fn slot(index: &PathRegistration) -> MailboxPath {
        index.path.clone()
    }

    fn referenced_primary(index: &PathRegistration) -> MailboxId {
        index.id
    }

    fn index_identity(index: &PathRegistration) -> MailboxId {
        index.id
    }

    fn primary_identity(primary: &Mailbox) -> MailboxId {
        primary.id
    }

    fn conflict(primary: &Mailbox, index: &PathRegistration) -> ConflictingEntry {
        ConflictingEntry::new(primary, index)
    }
}

/// IMAP-UID table ((message, mailbox) -> metadata) against the message-id
/// index ((mailbox, uid) -> metadata).
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageIdIndex;

impl IndexKind for MessageIdIndex {
    const NAME: &'static str = "message";

    type PrimaryKey = (MessageId, MailboxId);
    type Primary = MessageRecord;
    type Slot = (MailboxId, MessageUid);
    type Index = MessageRecord;
    type Identity = ComposedMessageId;
    type Conflict = MessageConflict;

    fn primary_key(primary: &MessageRecord) -> (MessageId, MailboxId) {
        primary.imap_uid_key()
    }

    fn expected_index(primary: &MessageRecord) -> MessageRecord {
        primary.clone()
    }

    fn slot(index: &MessageRecord) -> (MailboxId, MessageUid) {
        index.message_id_key()
    }

    fn referenced_primary(index: &MessageRecord) -> (MessageId, MailboxId) {
        index.imap_uid_key()
    }

    fn index_identity(index: &MessageRecord) -> ComposedMessageId {
        index.composed
    }

    fn conflict(primary: &MessageRecord, index: &MessageRecord) -> MessageConflict {
        MessageConflict::new(primary, index)
    }
}
