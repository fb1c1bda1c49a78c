//! Per-field, per-component layouts of values stored at nodes.

use std::rc::Rc;

use smallvec::SmallVec;

use fedof_core::{EvaluationError, FieldId, RangeKind, SharedTimeSequence};

use crate::field::SharedFieldDef;

/// How many values one field component stores at a node.
///
/// A component stores `value_kinds` values (the value itself plus any
/// derivatives) for each of `versions` versions, `value_kinds * versions`
/// values in all, versions outermost.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ComponentLayout {
    /// Value plus derivatives stored per version; at least 1.
    pub value_kinds: usize,
    /// Versions stored; at least 1.
    pub versions: usize,
}

impl ComponentLayout {
    /// A single value with no derivatives and one version.
    pub const SCALAR: Self = Self {
        value_kinds: 1,
        versions: 1,
    };

    /// Create a layout.
    pub fn new(value_kinds: usize, versions: usize) -> Self {
        Self {
            value_kinds,
            versions,
        }
    }

    /// Number of values stored for the component.
    pub fn number_of_values(&self) -> usize {
        self.value_kinds * self.versions
    }

    /// Position of (`value_kind`, `version`) within the component's values.
    pub fn value_index(&self, value_kind: usize, version: usize) -> Result<usize, EvaluationError> {
        if value_kind >= self.value_kinds {
            return Err(EvaluationError::OutOfRange {
                kind: RangeKind::ValueKind,
                index: value_kind,
                limit: self.value_kinds,
            });
        }
        if version >= self.versions {
            return Err(EvaluationError::OutOfRange {
                kind: RangeKind::Version,
                index: version,
                limit: self.versions,
            });
        }
        Ok(version * self.value_kinds + value_kind)
    }
}

/// A component layout placed at an offset within a node's value block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeFieldComponent {
    /// Offset of the component's first value in the node's value block.
    pub value_offset: usize,
    /// Values stored.
    pub layout: ComponentLayout,
}

impl NodeFieldComponent {
    /// Offset of (`value_kind`, `version`) in the node's value block.
    pub fn value_offset_of(&self, value_kind: usize, version: usize) -> Result<usize, EvaluationError> {
        Ok(self.value_offset + self.layout.value_index(value_kind, version)?)
    }
}

/// Everything a node descriptor records about one field.
#[derive(Clone, Debug)]
pub struct NodeField {
    pub(crate) field: SharedFieldDef,
    pub(crate) time_sequence: Option<SharedTimeSequence>,
    pub(crate) components: SmallVec<[NodeFieldComponent; 3]>,
}

impl NodeField {
    /// Assemble a node field from placed components.
    pub fn new(
        field: SharedFieldDef,
        time_sequence: Option<SharedTimeSequence>,
        components: impl IntoIterator<Item = NodeFieldComponent>,
    ) -> Self {
        Self {
            field,
            time_sequence,
            components: components.into_iter().collect(),
        }
    }

    /// The field definition.
    pub fn field(&self) -> &SharedFieldDef {
        &self.field
    }

    /// The field identifier.
    pub fn id(&self) -> FieldId {
        self.field.id()
    }

    /// The time sequence the field's values follow, if time-varying.
    pub fn time_sequence(&self) -> Option<&SharedTimeSequence> {
        self.time_sequence.as_ref()
    }

    /// Placed components, in component order.
    pub fn components(&self) -> &[NodeFieldComponent] {
        &self.components
    }

    /// The placed component `component`.
    pub fn component(&self, component: usize) -> Result<&NodeFieldComponent, EvaluationError> {
        self.components
            .get(component)
            .ok_or(EvaluationError::OutOfRange {
                kind: RangeKind::Component,
                index: component,
                limit: self.components.len(),
            })
    }

    /// Total values stored for the field over all components.
    pub fn number_of_values(&self) -> usize {
        self.components
            .iter()
            .map(|c| c.layout.number_of_values())
            .sum()
    }

    /// Lowest value offset of any component.
    pub fn first_offset(&self) -> Option<usize> {
        self.components.iter().map(|c| c.value_offset).min()
    }

    /// Largest value kind count and version count over all components.
    pub fn highest_derivative_and_version(&self) -> (usize, usize) {
        self.components.iter().fold((0, 0), |(kinds, versions), c| {
            (kinds.max(c.layout.value_kinds), versions.max(c.layout.versions))
        })
    }

    /// Why this field's layout cannot be merged with `other`'s, or `None`
    /// if every component stores the same value kinds and versions and both
    /// sides agree on being time-varying. Offsets are ignored.
    pub fn layout_conflict(&self, other: &NodeField) -> Option<String> {
        if self.components.len() != other.components.len() {
            return Some(format!(
                "{} components versus {}",
                self.components.len(),
                other.components.len()
            ));
        }
        if self.field.value_type() != other.field.value_type() {
            return Some(format!(
                "value type {} versus {}",
                self.field.value_type(),
                other.field.value_type()
            ));
        }
        if let Some((index, (a, b))) = self
            .components
            .iter()
            .zip(&other.components)
            .enumerate()
            .find(|(_, (a, b))| a.layout != b.layout)
        {
            return Some(format!(
                "component {index} stores {}x{} values versus {}x{}",
                a.layout.value_kinds, a.layout.versions, b.layout.value_kinds, b.layout.versions
            ));
        }
        if self.time_sequence.is_some() != other.time_sequence.is_some() {
            return Some("time-varying on only one side".into());
        }
        None
    }

    /// Shift every component offset by `delta` values (which may be negative).
    pub(crate) fn rebase(&mut self, from: usize, delta: isize) {
        for c in &mut self.components {
            if c.value_offset >= from {
                c.value_offset = c.value_offset.wrapping_add_signed(delta);
            }
        }
    }
}

impl PartialEq for NodeField {
    /// Same field, same placed components, and equal time sequences.
    fn eq(&self, other: &Self) -> bool {
        (Rc::ptr_eq(&self.field, &other.field) || self.field == other.field)
            && self.components == other.components
            && match (&self.time_sequence, &other.time_sequence) {
                (None, None) => true,
                (Some(a), Some(b)) => Rc::ptr_eq(a, b) || a == b,
                _ => false,
            }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldDef;
    use fedof_core::ValueType;

    fn field(components: usize) -> SharedFieldDef {
        FieldDef::new(FieldId(1), "f", ValueType::Double, components).unwrap()
    }

    #[test]
    fn value_index_is_version_major() {
        let layout = ComponentLayout::new(4, 2);
        assert_eq!(layout.number_of_values(), 8);
        assert_eq!(layout.value_index(1, 1).unwrap(), 5);
        assert_eq!(
            layout.value_index(4, 0),
            Err(EvaluationError::OutOfRange {
                kind: RangeKind::ValueKind,
                index: 4,
                limit: 4
            })
        );
        assert!(matches!(
            layout.value_index(0, 2),
            Err(EvaluationError::OutOfRange {
                kind: RangeKind::Version,
                ..
            })
        ));
    }

    #[test]
    fn layout_conflict_ignores_offsets() {
        let f = field(1);
        let a = NodeField::new(
            Rc::clone(&f),
            None,
            [NodeFieldComponent {
                value_offset: 0,
                layout: ComponentLayout::new(2, 1),
            }],
        );
        let mut b = a.clone();
        b.rebase(0, 5);
        assert_eq!(a.layout_conflict(&b), None);
        assert_ne!(a, b);

        let c = NodeField::new(
            f,
            None,
            [NodeFieldComponent {
                value_offset: 0,
                layout: ComponentLayout::new(1, 1),
            }],
        );
        assert!(a.layout_conflict(&c).is_some());
    }

    #[test]
    fn highest_derivative_and_version_spans_components() {
        let nf = NodeField::new(
            field(2),
            None,
            [
                NodeFieldComponent {
                    value_offset: 0,
                    layout: ComponentLayout::new(4, 1),
                },
                NodeFieldComponent {
                    value_offset: 4,
                    layout: ComponentLayout::new(2, 3),
                },
            ],
        );
        assert_eq!(nf.highest_derivative_and_version(), (4, 3));
        assert_eq!(nf.number_of_values(), 10);
        assert!(nf.component(2).is_err());
    }
}
