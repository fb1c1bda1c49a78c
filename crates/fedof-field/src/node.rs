//! Nodes: an identifier, a shared field descriptor and the node's values.

use std::cell::RefCell;
use std::rc::Rc;

use log::debug;

use fedof_core::{
    DescriptorError, EvaluationError, FieldId, NodeId, SharedTimeSequence, StorageError,
};
use fedof_storage::{StorageConfig, ValueBlock};

use crate::field::SharedFieldDef;
use crate::info::NodeFieldInfo;
use crate::layout::{ComponentLayout, NodeField, NodeFieldComponent};
use crate::registry::Registry;

/// Registry of node field descriptors, owned by a nodeset.
pub type NodeFieldInfoRegistry = Registry<NodeFieldInfo>;

/// Shared handle to a node. Elements reference their nodes through it.
pub type NodeHandle = Rc<RefCell<Node>>;

/// A node: its identifier, the descriptor it shares with identically
/// defined nodes, and the values of every field defined on it.
#[derive(Debug)]
pub struct Node {
    id: NodeId,
    fields: Rc<NodeFieldInfo>,
    values: ValueBlock,
}

impl Node {
    /// A node with no fields, sharing the registry's empty descriptor.
    pub fn new(id: NodeId, registry: &mut NodeFieldInfoRegistry) -> Self {
        Self {
            id,
            fields: registry.adopt(NodeFieldInfo::new()),
            values: ValueBlock::new(),
        }
    }

    /// Wrap the node in a shared handle.
    pub fn into_handle(self) -> NodeHandle {
        Rc::new(RefCell::new(self))
    }

    /// The node identifier.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// The node's field descriptor.
    pub fn field_info(&self) -> &Rc<NodeFieldInfo> {
        &self.fields
    }

    /// The node's values.
    pub fn values(&self) -> &ValueBlock {
        &self.values
    }

    /// Mutable access to the node's values, e.g. for string or element-xi
    /// fields addressed through [`value_offset`](Self::value_offset).
    pub fn values_mut(&mut self) -> &mut ValueBlock {
        &mut self.values
    }

    /// Swap in a new descriptor and value block, returning the old ones.
    ///
    /// Used by merges once the merged definition has been fully built.
    pub fn replace_definition(
        &mut self,
        fields: Rc<NodeFieldInfo>,
        values: ValueBlock,
    ) -> (Rc<NodeFieldInfo>, ValueBlock) {
        (
            std::mem::replace(&mut self.fields, fields),
            std::mem::replace(&mut self.values, values),
        )
    }

    /// Define `field` at this node with one layout per component, extending
    /// the value block with zero values.
    ///
    /// A descriptor only this node uses is changed in place; a shared one
    /// is replaced copy-on-write through `registry`, and other nodes keep
    /// it. On failure the node is unchanged.
    pub fn define_field(
        &mut self,
        field: &SharedFieldDef,
        layouts: &[ComponentLayout],
        time_sequence: Option<SharedTimeSequence>,
        registry: &mut NodeFieldInfoRegistry,
        config: &StorageConfig,
    ) -> Result<(), DescriptorError> {
        if self.fields.has_field(field.id()) {
            return Err(DescriptorError::FieldAlreadyDefined { field: field.id() });
        }
        if layouts.len() != field.component_count() {
            return Err(DescriptorError::ComponentCountMismatch {
                field: field.id(),
                expected: field.component_count(),
                found: layouts.len(),
            });
        }
        if self.fields.number_of_values() != self.values.len() {
            return Err(DescriptorError::InvalidArgument {
                reason: format!(
                    "node {} descriptor expects {} values but holds {}",
                    self.id,
                    self.fields.number_of_values(),
                    self.values.len()
                ),
            });
        }
        for layout in layouts {
            NodeFieldInfo::check_component(field, time_sequence.as_ref(), *layout)?;
        }
        let start = self.fields.number_of_values();
        let mut end = start;
        let components: Vec<_> = layouts
            .iter()
            .map(|&layout| {
                let component = NodeFieldComponent {
                    value_offset: end,
                    layout,
                };
                end += layout.number_of_values();
                component
            })
            .collect();
        let count = end - start;
        self.values.extend(
            field.value_type(),
            time_sequence.as_deref(),
            count,
            config,
        )?;
        let defined = NodeField::new(SharedFieldDef::clone(field), time_sequence, components);
        if let Err(err) = registry.edit(&mut self.fields, |info| info.add_field(defined)) {
            self.values.remove(start, count)?;
            return Err(err);
        }
        debug!("defined field {} at node {} ({count} values)", field, self.id);
        Ok(())
    }

    /// Remove `field` from this node, discarding its values.
    pub fn undefine_field(
        &mut self,
        field: FieldId,
        registry: &mut NodeFieldInfoRegistry,
    ) -> Result<(), DescriptorError> {
        let removed = self
            .fields
            .field(field)
            .ok_or(DescriptorError::FieldNotDefined { field })?;
        let mut ranges: Vec<_> = removed
            .components()
            .iter()
            .map(|c| (c.value_offset, c.layout.number_of_values()))
            .collect();
        ranges.sort_unstable_by(|a, b| b.0.cmp(&a.0));
        for &(offset, count) in &ranges {
            if offset + count > self.values.len() {
                return Err(StorageError::OffsetOutOfRange {
                    offset,
                    len: self.values.len(),
                }
                .into());
            }
        }
        for (offset, count) in ranges {
            self.values.remove(offset, count)?;
        }
        registry.edit(&mut self.fields, |info| info.remove_field(field))?;
        debug!("undefined field {field} at node {}", self.id);
        Ok(())
    }

    /// The descriptor entry for `field`.
    pub fn node_field(&self, field: FieldId) -> Result<&NodeField, EvaluationError> {
        self.fields.field(field).ok_or(EvaluationError::FieldNotDefined {
            field,
            node: Some(self.id),
        })
    }

    /// Offset in the value block of one stored value.
    pub fn value_offset(
        &self,
        field: FieldId,
        component: usize,
        value_kind: usize,
        version: usize,
    ) -> Result<usize, EvaluationError> {
        self.node_field(field)?
            .component(component)?
            .value_offset_of(value_kind, version)
    }

    /// A numeric value as `f64`, interpolated at `time` if time-varying.
    pub fn value(
        &self,
        field: FieldId,
        component: usize,
        value_kind: usize,
        version: usize,
        time: f64,
    ) -> Result<f64, EvaluationError> {
        let node_field = self.node_field(field)?;
        let offset = node_field
            .component(component)?
            .value_offset_of(value_kind, version)?;
        Ok(self
            .values
            .real_value(offset, node_field.time_sequence().map(|ts| &**ts), time)?)
    }

    /// Store a numeric value; for time-varying fields `time` must be one of
    /// the field's times within `tolerance`.
    #[allow(clippy::too_many_arguments)]
    pub fn set_value(
        &mut self,
        field: FieldId,
        component: usize,
        value_kind: usize,
        version: usize,
        time: f64,
        tolerance: f64,
        value: f64,
    ) -> Result<(), EvaluationError> {
        let node_field = self.fields.field(field).ok_or(EvaluationError::FieldNotDefined {
            field,
            node: Some(self.id),
        })?;
        let offset = node_field
            .component(component)?
            .value_offset_of(value_kind, version)?;
        let time_sequence = node_field.time_sequence().cloned();
        Ok(self
            .values
            .set_real_value(offset, time_sequence.as_deref(), time, tolerance, value)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldDef;
    use fedof_core::{TimeSequence, ValueType};

    const TOL: f64 = 1e-5;

    fn setup() -> (NodeFieldInfoRegistry, SharedFieldDef) {
        (
            NodeFieldInfoRegistry::new(),
            FieldDef::new(FieldId(0), "coordinates", ValueType::Double, 2).unwrap(),
        )
    }

    #[test]
    fn define_extends_values_and_shares_descriptor() {
        let (mut registry, f) = setup();
        let config = StorageConfig::default();
        let mut a = Node::new(NodeId(1), &mut registry);
        let mut b = Node::new(NodeId(2), &mut registry);
        let layouts = [ComponentLayout::new(2, 1), ComponentLayout::SCALAR];
        a.define_field(&f, &layouts, None, &mut registry, &config).unwrap();
        b.define_field(&f, &layouts, None, &mut registry, &config).unwrap();
        assert!(Rc::ptr_eq(a.field_info(), b.field_info()));
        assert_eq!(a.values().len(), 3);
        // the empty descriptor is no longer used by any node
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn define_twice_fails_without_change() {
        let (mut registry, f) = setup();
        let config = StorageConfig::default();
        let mut node = Node::new(NodeId(1), &mut registry);
        let layouts = [ComponentLayout::SCALAR; 2];
        node.define_field(&f, &layouts, None, &mut registry, &config).unwrap();
        let before = Rc::clone(node.field_info());
        assert_eq!(
            node.define_field(&f, &layouts, None, &mut registry, &config),
            Err(DescriptorError::FieldAlreadyDefined { field: FieldId(0) })
        );
        assert!(Rc::ptr_eq(&before, node.field_info()));
        assert_eq!(node.values().len(), 2);
    }

    #[test]
    fn component_count_checked() {
        let (mut registry, f) = setup();
        let mut node = Node::new(NodeId(1), &mut registry);
        assert!(matches!(
            node.define_field(
                &f,
                &[ComponentLayout::SCALAR],
                None,
                &mut registry,
                &StorageConfig::default()
            ),
            Err(DescriptorError::ComponentCountMismatch { expected: 2, found: 1, .. })
        ));
    }

    #[test]
    fn set_and_get_by_kind_and_version() {
        let (mut registry, f) = setup();
        let mut node = Node::new(NodeId(4), &mut registry);
        node.define_field(
            &f,
            &[ComponentLayout::new(2, 2), ComponentLayout::SCALAR],
            None,
            &mut registry,
            &StorageConfig::default(),
        )
        .unwrap();
        node.set_value(FieldId(0), 0, 1, 1, 0.0, TOL, 7.5).unwrap();
        assert_eq!(node.value(FieldId(0), 0, 1, 1, 0.0).unwrap(), 7.5);
        assert_eq!(node.value_offset(FieldId(0), 0, 1, 1).unwrap(), 3);
        assert_eq!(node.value_offset(FieldId(0), 1, 0, 0).unwrap(), 4);
        assert!(matches!(
            node.value(FieldId(9), 0, 0, 0, 0.0),
            Err(EvaluationError::FieldNotDefined { node: Some(NodeId(4)), .. })
        ));
    }

    #[test]
    fn time_varying_values_interpolate() {
        let (mut registry, f) = setup();
        let times = TimeSequence::shared(vec![0.0, 1.0]).unwrap();
        let mut node = Node::new(NodeId(1), &mut registry);
        node.define_field(
            &f,
            &[ComponentLayout::SCALAR; 2],
            Some(times),
            &mut registry,
            &StorageConfig::default(),
        )
        .unwrap();
        node.set_value(FieldId(0), 1, 0, 0, 0.0, TOL, 2.0).unwrap();
        node.set_value(FieldId(0), 1, 0, 0, 1.0, TOL, 4.0).unwrap();
        assert_eq!(node.value(FieldId(0), 1, 0, 0, 0.25).unwrap(), 2.5);
        assert!(node.set_value(FieldId(0), 1, 0, 0, 0.5, TOL, 1.0).is_err());
    }

    #[test]
    fn undefine_removes_values_and_rebases() {
        let (mut registry, f) = setup();
        let config = StorageConfig::default();
        let g = FieldDef::new(FieldId(1), "temperature", ValueType::Double, 1).unwrap();
        let mut node = Node::new(NodeId(1), &mut registry);
        node.define_field(&f, &[ComponentLayout::SCALAR; 2], None, &mut registry, &config)
            .unwrap();
        node.define_field(&g, &[ComponentLayout::SCALAR], None, &mut registry, &config)
            .unwrap();
        node.set_value(FieldId(1), 0, 0, 0, 0.0, TOL, 37.0).unwrap();
        node.undefine_field(FieldId(0), &mut registry).unwrap();
        assert_eq!(node.values().len(), 1);
        assert_eq!(node.value(FieldId(1), 0, 0, 0, 0.0).unwrap(), 37.0);
        assert!(!node.field_info().has_field(FieldId(0)));
        assert_eq!(
            node.undefine_field(FieldId(0), &mut registry),
            Err(DescriptorError::FieldNotDefined { field: FieldId(0) })
        );
    }
}
