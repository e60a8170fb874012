//! Schema version gate.
//!
//! Some repairs only make sense once the store has been migrated to a given
//! layout. The deployed version is read through [`SchemaVersionSource`] and
//! checked once, before any table is touched.

mod types;

pub use types::{SchemaError, SchemaVersion, VersionComparison};

use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::warn;

/// Minimum layout in which the mailbox-path index exists.
pub const MAILBOX_PATH_INDEX_REQUIRED_VERSION: SchemaVersion = SchemaVersion(6);

/// Where the deployed schema version comes from.
#[async_trait]
pub trait SchemaVersionSource: Send + Sync {
    async fn current_version(&self) -> Result<SchemaVersion, SchemaError>;
}

/// A fixed version, settable at runtime.
#[derive(Debug)]
pub struct StaticSchemaVersion {
    version: AtomicU32,
}

impl StaticSchemaVersion {
    pub fn new(version: SchemaVersion) -> Self {
        Self {
            version: AtomicU32::new(version.value()),
        }
    }

    pub fn current(&self) -> SchemaVersion {
        SchemaVersion(self.version.load(Ordering::SeqCst))
    }

    pub fn set(&self, version: SchemaVersion) {
        self.version.store(version.value(), Ordering::SeqCst);
    }
}

#[async_trait]
impl SchemaVersionSource for StaticSchemaVersion {
    async fn current_version(&self) -> Result<SchemaVersion, SchemaError> {
        Ok(self.current())
    }
}

/// Compare the deployed version against a required one.
pub fn compare_versions(current: SchemaVersion, required: SchemaVersion) -> VersionComparison {
    match current.cmp(&required) {
        std::cmp::Ordering::Equal => VersionComparison::Equal,
        std::cmp::Ordering::Less => VersionComparison::Behind,
        std::cmp::Ordering::Greater => VersionComparison::Ahead,
    }
}

/// Fail unless the deployed schema is at least `required`.
pub async fn check_schema_version(
    source: &dyn SchemaVersionSource,
    required: SchemaVersion,
) -> Result<SchemaVersion, SchemaError> {
    let current = source.current_version().await?;

    if compare_versions(current, required) == VersionComparison::Behind {
        warn!(
            current_version = %current,
            required_version = %required,
            "Schema version is too low for this repair"
        );
        return Err(SchemaError::TooLow { required, current });
    }

    Ok(current)
}
