//! Schema version types.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Error types for schema version checks.
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Schema version {current} is too low, {required} is required")]
    TooLow {
        required: SchemaVersion,
        current: SchemaVersion,
    },

    #[error("Schema version could not be read: {0}")]
    Unavailable(String),
}

/// Monotonic version of the on-disk layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaVersion(pub u32);

impl SchemaVersion {
    pub fn new(value: u32) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Result of comparing the deployed schema against a required version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionComparison {
    /// Deployed schema is exactly the required version.
    Equal,
    /// Deployed schema predates the required version.
    Behind,
    /// Deployed schema is newer than required.
    Ahead,
}
