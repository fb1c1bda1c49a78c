//! The node field descriptor: which fields are defined at a node and where
//! their values live in the node's value block.

use fedof_core::{DescriptorError, FieldId, SharedTimeSequence};
use fedof_storage::size;

use crate::field::SharedFieldDef;
use crate::layout::{ComponentLayout, NodeField, NodeFieldComponent};
use crate::registry::FieldList;

/// Ordered list of the fields defined at a class of identically defined
/// nodes, plus the total value count their layouts imply.
///
/// Shared between nodes through a [`Registry`](crate::Registry); never
/// mutated while shared.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NodeFieldInfo {
    fields: Vec<NodeField>,
    value_count: usize,
}

impl NodeFieldInfo {
    /// A descriptor defining no fields.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject a component layout `field` cannot be stored with.
    pub fn check_component(
        field: &SharedFieldDef,
        time_sequence: Option<&SharedTimeSequence>,
        layout: ComponentLayout,
    ) -> Result<(), DescriptorError> {
        if layout.value_kinds == 0 || layout.versions == 0 {
            return Err(DescriptorError::InvalidArgument {
                reason: format!(
                    "component of field {} must store at least one value kind and version",
                    field.id()
                ),
            });
        }
        if time_sequence.is_some() && !field.value_type().supports_time_sequence() {
            return Err(DescriptorError::Storage(
                fedof_core::StorageError::TimeSequenceUnsupported {
                    value_type: field.value_type(),
                },
            ));
        }
        Ok(())
    }

    /// Append one component for `field` at the end of the value block,
    /// creating the field's entry if it is not yet listed. Returns the new
    /// total value count.
    ///
    /// Components must be added in component order; a field whose entry
    /// already lists every component is rejected.
    pub fn add_component(
        &mut self,
        field: &SharedFieldDef,
        time_sequence: Option<&SharedTimeSequence>,
        layout: ComponentLayout,
    ) -> Result<usize, DescriptorError> {
        Self::check_component(field, time_sequence, layout)?;
        let component = NodeFieldComponent {
            value_offset: self.value_count,
            layout,
        };
        match self.fields.iter_mut().find(|f| f.id() == field.id()) {
            Some(existing) => {
                if existing.components.len() >= field.component_count() {
                    return Err(DescriptorError::FieldAlreadyDefined { field: field.id() });
                }
                existing.components.push(component);
            }
            None => self.fields.push(NodeField::new(
                SharedFieldDef::clone(field),
                time_sequence.cloned(),
                [component],
            )),
        }
        self.value_count += layout.number_of_values();
        Ok(self.value_count)
    }

    /// Append a fully placed field, e.g. one carried over by a merge.
    /// Returns the new total value count.
    pub fn add_field(&mut self, field: NodeField) -> Result<usize, DescriptorError> {
        if self.has_field(field.id()) {
            return Err(DescriptorError::FieldAlreadyDefined { field: field.id() });
        }
        if field.components.len() != field.field.component_count() {
            return Err(DescriptorError::ComponentCountMismatch {
                field: field.id(),
                expected: field.field.component_count(),
                found: field.components.len(),
            });
        }
        let end = field
            .components
            .iter()
            .map(|c| c.value_offset + c.layout.number_of_values())
            .max()
            .unwrap_or(0);
        self.value_count = self.value_count.max(end);
        self.fields.push(field);
        Ok(self.value_count)
    }

    /// Remove a field, shifting later value offsets down. Returns the
    /// removed field with its original offsets.
    pub fn remove_field(&mut self, field: FieldId) -> Result<NodeField, DescriptorError> {
        let position = self
            .fields
            .iter()
            .position(|f| f.id() == field)
            .ok_or(DescriptorError::FieldNotDefined { field })?;
        let removed = self.fields.remove(position);
        let mut ranges: Vec<_> = removed
            .components
            .iter()
            .map(|c| (c.value_offset, c.layout.number_of_values()))
            .collect();
        ranges.sort_unstable_by(|a, b| b.0.cmp(&a.0));
        for (offset, count) in ranges {
            for other in &mut self.fields {
                other.rebase(offset + count, -(count as isize));
            }
            self.value_count -= count;
        }
        Ok(removed)
    }

    /// Whether `field` is defined.
    pub fn has_field(&self, field: FieldId) -> bool {
        self.fields.iter().any(|f| f.id() == field)
    }

    /// The entry for `field`.
    pub fn field(&self, field: FieldId) -> Option<&NodeField> {
        self.fields.iter().find(|f| f.id() == field)
    }

    /// All entries, in definition order.
    pub fn fields(&self) -> &[NodeField] {
        &self.fields
    }

    /// Total values stored by a node using this descriptor.
    pub fn number_of_values(&self) -> usize {
        self.value_count
    }

    /// Storage footprint in bytes of a node's value block.
    pub fn values_storage_size(&self) -> usize {
        self.fields
            .iter()
            .map(|f| size(f.field.value_type(), f.time_sequence.is_some()) * f.number_of_values())
            .sum()
    }

    /// Whether any field is time-varying with more than one stored time.
    pub fn has_field_with_multiple_times(&self) -> bool {
        self.fields
            .iter()
            .any(|f| f.time_sequence.as_ref().is_some_and(|ts| ts.len() > 1))
    }

    /// Largest value kind and version counts over `field`'s components.
    pub fn highest_derivative_and_version(&self, field: FieldId) -> Option<(usize, usize)> {
        self.field(field).map(NodeField::highest_derivative_and_version)
    }
}

impl FieldList for NodeFieldInfo {
    fn list_matches(&self, other: &Self) -> bool {
        self == other
    }

    fn field_ids(&self) -> Vec<FieldId> {
        self.fields.iter().map(NodeField::id).collect()
    }

    fn has_empty_list(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Why `source` cannot be merged into `target`, or `None` if every field
/// defined on both sides has a compatible layout.
pub fn merge_conflict(target: &NodeFieldInfo, source: &NodeFieldInfo) -> Option<(FieldId, String)> {
    source.fields.iter().find_map(|s| {
        target
            .field(s.id())
            .and_then(|t| t.layout_conflict(s))
            .map(|reason| (s.id(), reason))
    })
}

/// Whether `source` can be merged into `target`.
pub fn can_merge(target: &NodeFieldInfo, source: &NodeFieldInfo) -> bool {
    merge_conflict(target, source).is_none()
}
