//! Detection and repair of a single identity.
//!
//! Every identity goes through the same sequence: a detection read, then,
//! if something looks wrong, one immediate re-read of the observed record and
//! a second detection on the fresh value. Only the second verdict is acted
//! upon, so an ordinary write whose index half lands between the two reads is
//! never "repaired".

use super::context::Context;
use super::kind::IndexKind;
use crate::storage::{DynTable, StorageError};
use tracing::{debug, error, info, warn};

/// What a detection read concluded about one identity.
pub enum Inconsistency<K: IndexKind> {
    /// The expected index row is absent
    Missing(K::Index),
    /// The slot holds a row that must be overwritten with this one
    Outdated(K::Index),
    /// The index row points at nothing it should and must be removed
    Orphan(K::Index),
    /// A live primary claims a slot held by another identity
    Conflict {
        primary: K::Primary,
        index: K::Index,
    },
}

impl<K: IndexKind> Inconsistency<K> {
    pub fn label(&self) -> &'static str {
        match self {
            Inconsistency::Missing(_) => "missing",
            Inconsistency::Outdated(_) => "outdated",
            Inconsistency::Orphan(_) => "orphan",
            Inconsistency::Conflict { .. } => "conflict",
        }
    }

    pub fn identity(&self) -> K::Identity {
        match self {
            Inconsistency::Missing(entry)
            | Inconsistency::Outdated(entry)
            | Inconsistency::Orphan(entry) => K::index_identity(entry),
            Inconsistency::Conflict { primary, .. } => K::primary_identity(primary),
        }
    }
}

pub struct Reconciler<K: IndexKind> {
    primary: DynTable<K::PrimaryKey, K::Primary>,
    index: DynTable<K::Slot, K::Index>,
}

impl<K: IndexKind> Reconciler<K> {
    pub fn new(
        primary: DynTable<K::PrimaryKey, K::Primary>,
        index: DynTable<K::Slot, K::Index>,
    ) -> Self {
        Self { primary, index }
    }

    pub fn primary_table(&self) -> &DynTable<K::PrimaryKey, K::Primary> {
        &self.primary
    }

    pub fn index_table(&self) -> &DynTable<K::Slot, K::Index> {
        &self.index
    }

    /// Check that `primary` is reachable through its index row, fixing it if not.
    ///
    /// Storage failures are recorded against the identity and never escape.
    pub async fn reconcile_primary(&self, context: &Context<K>, primary: K::Primary) {
        context.increment_processed_primary();

        if let Err(e) = self.check_primary(context, &primary).await {
            let identity = K::primary_identity(&primary);
            error!(kind = K::NAME, identity = %identity, error = %e, "Failed to repair index entry");
            context.record_error(identity);
        }
    }

    /// Check that `entry` points at a live primary that expects it, fixing it if not.
    pub async fn reconcile_index(&self, context: &Context<K>, entry: K::Index) {
        context.increment_processed_index();

        if let Err(e) = self.check_index(context, &entry).await {
            let identity = K::index_identity(&entry);
            error!(kind = K::NAME, identity = %identity, error = %e, "Failed to repair index entry");
            context.record_error(identity);
        }
    }

    async fn check_primary(
        &self,
        context: &Context<K>,
        primary: &K::Primary,
    ) -> Result<(), StorageError> {
        let Some(candidate) = self.detect_from_primary(primary).await? else {
            return Ok(());
        };

        let Some(fresh) = self.primary.get(&K::primary_key(primary)).await? else {
            debug!(
                kind = K::NAME,
                identity = %candidate.identity(),
                candidate = candidate.label(),
                "Primary entry vanished before re-verification"
            );
            return Ok(());
        };

        match self.detect_from_primary(&fresh).await? {
            Some(confirmed) => self.apply(context, confirmed).await,
            None => {
                discard(&candidate);
                Ok(())
            }
        }
    }

    async fn check_index(&self, context: &Context<K>, entry: &K::Index) -> Result<(), StorageError> {
        let Some(candidate) = self.detect_from_index(entry).await? else {
            return Ok(());
        };

        let Some(fresh) = self.index.get(&K::slot(entry)).await? else {
            debug!(
                kind = K::NAME,
                identity = %candidate.identity(),
                candidate = candidate.label(),
                "Index entry vanished before re-verification"
            );
            return Ok(());
        };

        match self.detect_from_index(&fresh).await? {
            Some(confirmed) => self.apply(context, confirmed).await,
            None => {
                discard(&candidate);
                Ok(())
            }
        }
    }

    /// Compare a primary record with what its slot currently holds.
    pub async fn detect_from_primary(
        &self,
        primary: &K::Primary,
    ) -> Result<Option<Inconsistency<K>>, StorageError> {
        let expected = K::expected_index(primary);

        let Some(current) = self.index.get(&K::slot(&expected)).await? else {
            return Ok(Some(Inconsistency::Missing(expected)));
        };

        if current == expected {
            return Ok(None);
        }

        if K::referenced_primary(&current) == K::primary_key(primary) {
            return Ok(Some(Inconsistency::Outdated(expected)));
        }

        // A live primary claims a slot held by another identity. Never resolved here.
        Ok(Some(Inconsistency::Conflict {
            primary: primary.clone(),
            index: current,
        }))
    }

    /// Compare an index row with the primary it references.
    pub async fn detect_from_index(
        &self,
        entry: &K::Index,
    ) -> Result<Option<Inconsistency<K>>, StorageError> {
        let Some(primary) = self.primary.get(&K::referenced_primary(entry)).await? else {
            return Ok(Some(Inconsistency::Orphan(entry.clone())));
        };

        let expected = K::expected_index(&primary);
        if &expected == entry {
            Ok(None)
        } else if K::slot(&expected) == K::slot(entry) {
            Ok(Some(Inconsistency::Outdated(expected)))
        } else {
            Ok(Some(Inconsistency::Orphan(entry.clone())))
        }
    }

    async fn apply(
        &self,
        context: &Context<K>,
        inconsistency: Inconsistency<K>,
    ) -> Result<(), StorageError> {
        match inconsistency {
            Inconsistency::Missing(entry) => {
                let identity = K::index_identity(&entry);
                self.index.put(entry).await?;
                info!(kind = K::NAME, identity = %identity, "Added missing index entry");
                context.record_added(identity);
            }
            Inconsistency::Outdated(entry) => {
                let identity = K::index_identity(&entry);
                self.index.put(entry).await?;
                info!(kind = K::NAME, identity = %identity, "Updated outdated index entry");
                context.record_updated(identity);
            }
            Inconsistency::Orphan(entry) => {
                let identity = K::index_identity(&entry);
                let slot = K::slot(&entry);
                // The primary pass runs first, so a live claimant of this slot is already known.
                if context.is_conflicting_slot(&slot) {
                    debug!(
                        kind = K::NAME,
                        identity = %identity,
                        "Leaving index entry of a slot claimed by a live primary untouched"
                    );
                    return Ok(());
                }
                self.index.delete(&slot).await?;
                info!(kind = K::NAME, identity = %identity, "Removed orphan index entry");
                context.record_removed(identity);
            }
            Inconsistency::Conflict { primary, index } => {
                let identity = K::primary_identity(&primary);
                let claimed_by = K::index_identity(&index);
                warn!(
                    kind = K::NAME,
                    identity = %identity,
                    claimed_by = %claimed_by,
                    "Index slot is claimed by another live entry"
                );
                context.record_conflict(K::slot(&index), K::conflict(&primary, &index));
            }
        }
        Ok(())
    }
}

fn discard<K: IndexKind>(candidate: &Inconsistency<K>) {
    debug!(
        kind = K::NAME,
        identity = %candidate.identity(),
        candidate = candidate.label(),
        "Inconsistency not confirmed on re-read"
    );
}
