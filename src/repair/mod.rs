//! Consistency repair between a primary table and its secondary index.

mod context;
mod kind;
mod options;
mod reconcile;
mod service;

pub use context::{Context, MailboxContext, MailboxSnapshot, MessageContext, MessageSnapshot, Snapshot};
pub use kind::{IndexKind, MailboxPathIndex, MessageIdIndex, Pass, PASSES};
pub use options::{RunningOptions, DEFAULT_CONCURRENCY};
pub use reconcile::{Inconsistency, Reconciler};
pub use service::{MailboxRepairService, MessageRepairService, RepairService};

use crate::schema::{SchemaError, SchemaVersion};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RepairError {
    #[error("Schema version {current} is too low, {required} is required")]
    SchemaVersionTooLow {
        required: SchemaVersion,
        current: SchemaVersion,
    },

    #[error("Schema version unavailable: {0}")]
    SchemaVersionUnavailable(String),

    #[error("Invalid running options: {0}")]
    InvalidOptions(String),
}

impl From<SchemaError> for RepairError {
    fn from(err: SchemaError) -> Self {
        match err {
            SchemaError::TooLow { required, current } => {
                RepairError::SchemaVersionTooLow { required, current }
            }
            SchemaError::Unavailable(reason) => RepairError::SchemaVersionUnavailable(reason),
        }
    }
}

/// Outcome of a run that got past its preconditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskResult {
    /// No I/O error; remaining divergences, if any, are recorded conflicts
    Completed,
    /// At least one identity could not be repaired; re-running is safe
    Partial,
}
