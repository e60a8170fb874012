pub mod config;
pub mod model;
pub mod repair;
pub mod schema;
pub mod storage;
pub mod task;

// Re-export commonly used types
pub use config::{read_config, ConfigError, RepairConfig};
pub use model::{
    ComposedMessageId, ConflictingEntry, Flags, Mailbox, MailboxEntry, MailboxId, MailboxPath,
    MessageConflict, MessageId, MessageRecord, MessageUid, ModSeq, PathRegistration,
};
pub use repair::{
    Context, IndexKind, MailboxContext, MailboxPathIndex, MailboxRepairService, MailboxSnapshot,
    MessageContext, MessageIdIndex, MessageRepairService, MessageSnapshot, RepairError,
    RepairService, RunningOptions, Snapshot, TaskResult,
};
pub use schema::{
    check_schema_version, SchemaError, SchemaVersion, SchemaVersionSource, StaticSchemaVersion,
    MAILBOX_PATH_INDEX_REQUIRED_VERSION,
};
pub use storage::{load_store, save_store, DynTable, MemoryStore, MemoryTable, StorageError, Table};
pub use task::{
    AdditionalInformation, RepairServices, RepairTask, TaskDto, TaskError, TaskStatus,
};
