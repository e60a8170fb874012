mod conflict;
mod mailbox;
mod message;

pub use conflict::{ConflictingEntry, MailboxEntry, MessageConflict};
pub use mailbox::{Mailbox, MailboxId, MailboxPath, PathRegistration, PRIVATE_NAMESPACE};
pub use message::{ComposedMessageId, Flags, MessageId, MessageRecord, MessageUid, ModSeq};
