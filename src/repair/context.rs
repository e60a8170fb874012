//! Progress state shared by every in-flight identity of one run.

use super::kind::{IndexKind, MailboxPathIndex, MessageIdIndex};
use crate::model::{ComposedMessageId, ConflictingEntry, MailboxId, MessageConflict};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

/// Point-in-time copy of a [`Context`].
///
/// Each field is read on its own; two fields are not guaranteed to come from
/// the same instant while a run is still mutating the context.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot<I, C> {
    pub processed_primary_entries: u64,
    pub processed_index_entries: u64,
    pub added_index_entries: u64,
    pub updated_index_entries: u64,
    pub removed_index_entries: u64,
    pub fixed_inconsistencies: Vec<I>,
    pub conflicting_entries: Vec<C>,
    pub errors: Vec<I>,
    /// Failures not tied to an identity, such as a broken scan
    pub unattributed_errors: u64,
    /// The run stopped before both scans were consumed
    pub cancelled: bool,
}

impl<I, C> Default for Snapshot<I, C> {
    fn default() -> Self {
        Self {
            processed_primary_entries: 0,
            processed_index_entries: 0,
            added_index_entries: 0,
            updated_index_entries: 0,
            removed_index_entries: 0,
            fixed_inconsistencies: Vec::new(),
            conflicting_entries: Vec::new(),
            errors: Vec::new(),
            unattributed_errors: 0,
            cancelled: false,
        }
    }
}

impl<I, C> Snapshot<I, C> {
    pub fn error_count(&self) -> u64 {
        self.errors.len() as u64 + self.unattributed_errors
    }
}

pub type MailboxSnapshot = Snapshot<MailboxId, ConflictingEntry>;
pub type MessageSnapshot = Snapshot<ComposedMessageId, MessageConflict>;

pub struct Context<K: IndexKind> {
    processed_primary_entries: AtomicU64,
    processed_index_entries: AtomicU64,
    added_index_entries: AtomicU64,
    updated_index_entries: AtomicU64,
    removed_index_entries: AtomicU64,
    unattributed_errors: AtomicU64,
    fixed_inconsistencies: Mutex<Vec<K::Identity>>,
    conflicting_entries: Mutex<Vec<K::Conflict>>,
    errors: Mutex<Vec<K::Identity>>,
    conflicting_slots: Mutex<HashSet<K::Slot>>,
    cancelled: AtomicBool,
}

pub type MailboxContext = Context<MailboxPathIndex>;
pub type MessageContext = Context<MessageIdIndex>;

impl<K: IndexKind> Default for Context<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: IndexKind> Context<K> {
    pub fn new() -> Self {
        Self {
            processed_primary_entries: AtomicU64::new(0),
            processed_index_entries: AtomicU64::new(0),
            added_index_entries: AtomicU64::new(0),
            updated_index_entries: AtomicU64::new(0),
            removed_index_entries: AtomicU64::new(0),
            unattributed_errors: AtomicU64::new(0),
            fixed_inconsistencies: Mutex::new(Vec::new()),
            conflicting_entries: Mutex::new(Vec::new()),
            errors: Mutex::new(Vec::new()),
            conflicting_slots: Mutex::new(HashSet::new()),
            cancelled: AtomicBool::new(false),
        }
    }

    pub fn increment_processed_primary(&self) {
        self.processed_primary_entries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_processed_index(&self) {
        self.processed_index_entries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_added(&self, identity: K::Identity) {
        self.added_index_entries.fetch_add(1, Ordering::Relaxed);
        self.push_fixed(identity);
    }

    pub fn record_updated(&self, identity: K::Identity) {
        self.updated_index_entries.fetch_add(1, Ordering::Relaxed);
        self.push_fixed(identity);
    }

    pub fn record_removed(&self, identity: K::Identity) {
        self.removed_index_entries.fetch_add(1, Ordering::Relaxed);
        self.push_fixed(identity);
    }

    /// Record a conflict and remember its slot so the index pass leaves it alone
    pub fn record_conflict(&self, slot: K::Slot, conflict: K::Conflict) {
        let newly_claimed = self
            .conflicting_slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(slot);
        if newly_claimed {
            self.conflicting_entries
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(conflict);
        }
    }

    pub fn is_conflicting_slot(&self, slot: &K::Slot) -> bool {
        self.conflicting_slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(slot)
    }

    pub fn record_error(&self, identity: K::Identity) {
        self.errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(identity);
    }

    pub fn record_unattributed_error(&self) {
        self.unattributed_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn mark_cancelled(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn was_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    pub fn error_count(&self) -> u64 {
        let attributed = self.errors.lock().unwrap_or_else(PoisonError::into_inner).len() as u64;
        attributed + self.unattributed_errors.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> Snapshot<K::Identity, K::Conflict> {
        Snapshot {
            processed_primary_entries: self.processed_primary_entries.load(Ordering::Relaxed),
            processed_index_entries: self.processed_index_entries.load(Ordering::Relaxed),
            added_index_entries: self.added_index_entries.load(Ordering::Relaxed),
            updated_index_entries: self.updated_index_entries.load(Ordering::Relaxed),
            removed_index_entries: self.removed_index_entries.load(Ordering::Relaxed),
            fixed_inconsistencies: self
                .fixed_inconsistencies
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
            conflicting_entries: self
                .conflicting_entries
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
            errors: self
                .errors
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
            unattributed_errors: self.unattributed_errors.load(Ordering::Relaxed),
            cancelled: self.was_cancelled(),
        }
    }

    fn push_fixed(&self, identity: K::Identity) {
        self.fixed_inconsistencies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(identity);
    }
}
