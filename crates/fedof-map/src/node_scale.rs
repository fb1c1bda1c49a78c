//! Per-element node array, scale factors and grid values.

use std::rc::Rc;

use fedof_core::{DescriptorError, EvaluationError, NodeId, RangeKind, StorageError};
use fedof_field::NodeHandle;
use fedof_storage::ValueBlock;

use crate::scale::ScaleFactorTable;

/// The supplementary storage an element's DOF maps read from: its local
/// node array, its scale factors, and a value block for grid-based fields.
///
/// Local node slots may be empty until a node is assigned.
#[derive(Debug, Default)]
pub struct NodeScaleInfo {
    nodes: Vec<Option<NodeHandle>>,
    scale_factors: ScaleFactorTable,
    values: ValueBlock,
}

impl NodeScaleInfo {
    /// `node_count` empty local node slots, no scale factors, no values.
    pub fn new(node_count: usize) -> Self {
        Self {
            nodes: vec![None; node_count],
            ..Self::default()
        }
    }

    /// Number of local node slots.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// All local node slots.
    pub fn nodes(&self) -> &[Option<NodeHandle>] {
        &self.nodes
    }

    /// The node at `local_node`.
    ///
    /// Fails with `OutOfRange` past the end of the node array and with
    /// `MissingNode` for an empty slot.
    pub fn node(&self, local_node: usize) -> Result<&NodeHandle, EvaluationError> {
        self.nodes
            .get(local_node)
            .ok_or(EvaluationError::OutOfRange {
                kind: RangeKind::LocalNode,
                index: local_node,
                limit: self.nodes.len(),
            })?
            .as_ref()
            .ok_or(EvaluationError::MissingNode { local_node })
    }

    /// Assign or clear local node slot `local_node`.
    pub fn set_node(&mut self, local_node: usize, node: Option<NodeHandle>) -> Result<(), DescriptorError> {
        let len = self.nodes.len();
        let slot = self
            .nodes
            .get_mut(local_node)
            .ok_or_else(|| DescriptorError::InvalidArgument {
                reason: format!("local node {local_node} out of range for {len} nodes"),
            })?;
        *slot = node;
        Ok(())
    }

    /// Append a local node slot, returning its index.
    pub fn push_node(&mut self, node: Option<NodeHandle>) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    /// Identifier of the node in slot `local_node`, if any.
    pub fn node_id(&self, local_node: usize) -> Option<NodeId> {
        self.nodes
            .get(local_node)?
            .as_ref()
            .map(|node| node.borrow().id())
    }

    /// First local index holding the node with identifier `id`.
    pub fn local_node_of(&self, id: NodeId) -> Option<usize> {
        (0..self.nodes.len()).find(|&local| self.node_id(local) == Some(id))
    }

    /// First local index holding exactly `node`.
    pub fn local_node_of_handle(&self, node: &NodeHandle) -> Option<usize> {
        self.nodes
            .iter()
            .position(|slot| slot.as_ref().is_some_and(|n| Rc::ptr_eq(n, node)))
    }

    /// The element's scale factors.
    pub fn scale_factors(&self) -> &ScaleFactorTable {
        &self.scale_factors
    }

    /// Mutable scale factors.
    pub fn scale_factors_mut(&mut self) -> &mut ScaleFactorTable {
        &mut self.scale_factors
    }

    /// The element-owned value block holding grid-based field values.
    pub fn values(&self) -> &ValueBlock {
        &self.values
    }

    /// Mutable element-owned values.
    pub fn values_mut(&mut self) -> &mut ValueBlock {
        &mut self.values
    }

    /// Assemble from parts.
    pub fn from_parts(
        nodes: Vec<Option<NodeHandle>>,
        scale_factors: ScaleFactorTable,
        values: ValueBlock,
    ) -> Self {
        Self {
            nodes,
            scale_factors,
            values,
        }
    }

    /// Copy: node handles are shared, scale factors and values duplicated.
    pub fn try_clone(&self) -> Result<Self, StorageError> {
        Ok(Self {
            nodes: self.nodes.clone(),
            scale_factors: self.scale_factors.clone(),
            values: self.values.try_clone()?,
        })
    }
}
