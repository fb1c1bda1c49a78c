//! Per-field change log used for bulk change notification.
//!
//! When many nodes or elements change at once, each entity's fields are
//! logged as changed. Identically defined entities share one descriptor,
//! so consecutive entities usually log exactly the same fields; the caller
//! threads a [`LastLoggedInfo`] through the loop and descriptors already
//! logged are skipped.

use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use log::trace;

use fedof_core::FieldId;

use crate::field::FieldSet;
use crate::registry::FieldList;

/// How a field changed. Later variants subsume earlier ones.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FieldChange {
    /// Stored values changed.
    Values,
    /// Where or how values are stored changed.
    Definition,
    /// The field became defined where it was not.
    Added,
    /// The field was removed.
    Removed,
}

/// Ordered record of changed fields and the strongest change of each.
#[derive(Clone, Debug, Default)]
pub struct FieldChangeLog {
    changes: IndexMap<FieldId, FieldChange>,
}

impl FieldChangeLog {
    /// An empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `change` for `field`, keeping the strongest change seen.
    pub fn record(&mut self, field: FieldId, change: FieldChange) {
        self.changes
            .entry(field)
            .and_modify(|existing| *existing = (*existing).max(change))
            .or_insert(change);
    }

    /// The strongest change recorded for `field`.
    pub fn change(&self, field: FieldId) -> Option<FieldChange> {
        self.changes.get(&field).copied()
    }

    /// Every changed field.
    pub fn changed_fields(&self) -> FieldSet {
        self.changes.keys().copied().collect()
    }

    /// Changes in the order fields were first logged.
    pub fn iter(&self) -> impl Iterator<Item = (FieldId, FieldChange)> + '_ {
        self.changes.iter().map(|(&field, &change)| (field, change))
    }

    /// Number of changed fields.
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Whether nothing has been logged.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Forget all changes.
    pub fn clear(&mut self) {
        self.changes.clear();
    }

    /// Log every field of `info` as changed by `change`, unless `info` is
    /// the descriptor `last` remembers. Returns the number of fields logged.
    pub fn log_fields_of<T: FieldList>(
        &mut self,
        info: &Rc<T>,
        change: FieldChange,
        last: &mut LastLoggedInfo<T>,
    ) -> usize {
        if last.is(info) {
            return 0;
        }
        let ids = info.field_ids();
        for &field in &ids {
            self.record(field, change);
        }
        last.remember(info);
        trace!("change log: {} fields logged as {change:?}", ids.len());
        ids.len()
    }
}

/// The descriptor most recently logged by
/// [`FieldChangeLog::log_fields_of`], owned by the caller of a bulk change.
#[derive(Debug)]
pub struct LastLoggedInfo<T> {
    last: Weak<T>,
}

impl<T> Default for LastLoggedInfo<T> {
    fn default() -> Self {
        Self { last: Weak::new() }
    }
}

impl<T> LastLoggedInfo<T> {
    /// Nothing logged yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `info` is the remembered descriptor.
    pub fn is(&self, info: &Rc<T>) -> bool {
        self.last
            .upgrade()
            .is_some_and(|last| Rc::ptr_eq(&last, info))
    }

    /// Remember `info`.
    pub fn remember(&mut self, info: &Rc<T>) {
        self.last = Rc::downgrade(info);
    }

    /// Forget the remembered descriptor, e.g. after the log was cleared.
    pub fn reset(&mut self) {
        self.last = Weak::new();
    }
}
