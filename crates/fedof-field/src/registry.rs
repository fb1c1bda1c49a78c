//! Reference-counted, de-duplicating registry of field descriptors.
//!
//! Entities defined identically share one descriptor. The registry keeps
//! one reference of its own to every descriptor it knows; an entity holds
//! another. A descriptor whose count has fallen back to the registry's own
//! reference is unused and is dropped from the index on the next
//! [`release`](Registry::release) or [`purge`](Registry::purge).

use std::rc::Rc;

use log::trace;

use fedof_core::{DescriptorError, FieldId};

/// A list of field definitions that entities can share.
pub trait FieldList: Clone {
    /// Whether two lists describe identical definitions, so one instance
    /// can serve both.
    fn list_matches(&self, other: &Self) -> bool;

    /// Identifiers of the fields in the list, in list order.
    fn field_ids(&self) -> Vec<FieldId>;

    /// Whether the list defines no fields.
    fn has_empty_list(&self) -> bool {
        self.field_ids().is_empty()
    }
}

/// Registry of shared descriptors of type `T`.
#[derive(Debug)]
pub struct Registry<T> {
    entries: Vec<Rc<T>>,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

/// Whether a descriptor is held by at most the registry and one entity, so
/// it may be mutated in place.
pub fn used_only_once<T>(descriptor: &Rc<T>) -> bool {
    Rc::strong_count(descriptor) <= 2
}

impl<T: FieldList> Registry<T> {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of descriptors in the index.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over the indexed descriptors.
    pub fn iter(&self) -> impl Iterator<Item = &Rc<T>> {
        self.entries.iter()
    }

    /// The indexed descriptor matching `candidate`, if any.
    pub fn get_matching(&self, candidate: &T) -> Option<Rc<T>> {
        self.entries
            .iter()
            .find(|entry| entry.list_matches(candidate))
            .cloned()
    }

    /// Whether `descriptor` is the instance held in the index.
    pub fn contains(&self, descriptor: &Rc<T>) -> bool {
        self.entries.iter().any(|entry| Rc::ptr_eq(entry, descriptor))
    }

    /// A shared handle to a descriptor equal to `candidate`, reusing an
    /// indexed instance if one matches.
    pub fn adopt(&mut self, candidate: T) -> Rc<T> {
        if let Some(existing) = self.get_matching(&candidate) {
            return existing;
        }
        let shared = Rc::new(candidate);
        self.entries.push(Rc::clone(&shared));
        trace!("registry: indexed descriptor #{}", self.entries.len());
        shared
    }

    /// Drop an entity's handle. If only the registry still refers to the
    /// descriptor it is removed from the index and destroyed.
    pub fn release(&mut self, descriptor: Rc<T>) {
        let position = self
            .entries
            .iter()
            .position(|entry| Rc::ptr_eq(entry, &descriptor));
        drop(descriptor);
        if let Some(position) = position {
            if Rc::strong_count(&self.entries[position]) == 1 {
                self.entries.swap_remove(position);
                trace!("registry: removed unused descriptor");
            }
        }
    }

    /// Remove every descriptor no entity refers to.
    pub fn purge(&mut self) {
        self.entries.retain(|entry| Rc::strong_count(entry) > 1);
    }

    /// Replace the descriptor behind `handle` with `updated`, re-sharing it
    /// through the index and releasing the old one. Other holders of the old
    /// descriptor are unaffected (copy-on-write).
    pub fn replace(&mut self, handle: &mut Rc<T>, updated: T) {
        let shared = self.adopt(updated);
        let old = std::mem::replace(handle, shared);
        self.release(old);
    }

    /// Mutable access to a descriptor held by at most one entity.
    ///
    /// The descriptor leaves the index, since its contents are about to
    /// change; call [`reindex`](Self::reindex) once done. Fails with
    /// [`DescriptorError::SharedDescriptor`] if other entities share it or
    /// weak references to it are alive.
    pub fn make_mut<'a>(&mut self, handle: &'a mut Rc<T>) -> Result<&'a mut T, DescriptorError> {
        if !used_only_once(handle) || Rc::weak_count(handle) > 0 {
            return Err(DescriptorError::SharedDescriptor);
        }
        let target = Rc::as_ptr(handle);
        self.entries.retain(|entry| Rc::as_ptr(entry) != target);
        Rc::get_mut(handle).ok_or(DescriptorError::SharedDescriptor)
    }

    /// Return a descriptor changed through [`make_mut`](Self::make_mut) to
    /// the index, switching `handle` to an equal indexed instance if one
    /// already exists.
    pub fn reindex(&mut self, handle: &mut Rc<T>) {
        if self.contains(handle) {
            return;
        }
        if let Some(existing) = self.get_matching(handle) {
            *handle = existing;
        } else {
            self.entries.push(Rc::clone(handle));
        }
    }

    /// Apply `change` to the descriptor behind `handle`: in place when no
    /// other entity uses it, otherwise to a copy that then replaces it.
    ///
    /// `change` must leave the descriptor untouched when it fails.
    pub fn edit<R, E>(
        &mut self,
        handle: &mut Rc<T>,
        change: impl FnOnce(&mut T) -> Result<R, E>,
    ) -> Result<R, E> {
        if let Ok(descriptor) = self.make_mut(handle) {
            let result = change(descriptor);
            self.reindex(handle);
            return result;
        }
        let mut updated = T::clone(handle);
        let result = change(&mut updated)?;
        self.replace(handle, updated);
        Ok(result)
    }
}
