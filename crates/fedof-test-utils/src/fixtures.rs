//! Small meshes for scenario tests.
//!
//! [`MeshFixture`] owns the node and element registries plus the mock
//! basis, and builds nodes and Lagrange elements with a few lines each.

use fedof_core::{
    ElementId, ElementIdentity, FieldId, NodeId, ScaleFactorSetId, SharedTimeSequence, ShapeId,
    ValueType,
};
use fedof_element::{Element, ElementFieldComponent, ElementFieldInfoRegistry, ElementHandle};
use fedof_field::{ComponentLayout, FieldDef, Node, NodeFieldInfoRegistry, NodeHandle, SharedFieldDef};
use fedof_map::DofMap;
use fedof_storage::StorageConfig;

use crate::MockBasis;

/// Tolerance used when setting time-varying values.
pub const TIME_TOLERANCE: f64 = 1e-5;

/// A double-valued field with `components` components.
pub fn real_field(id: u32, name: &str, components: usize) -> SharedFieldDef {
    match FieldDef::new(FieldId(id), name, ValueType::Double, components) {
        Ok(field) => field,
        Err(e) => panic!("fixture field {name}: {e}"),
    }
}

/// Registries, basis and storage limits for building test meshes.
pub struct MeshFixture {
    pub nodes: NodeFieldInfoRegistry,
    pub elements: ElementFieldInfoRegistry,
    pub basis: MockBasis,
    pub config: StorageConfig,
}

impl MeshFixture {
    pub fn new() -> Self {
        Self {
            nodes: NodeFieldInfoRegistry::new(),
            elements: ElementFieldInfoRegistry::new(),
            basis: MockBasis::new(),
            config: StorageConfig::default(),
        }
    }

    /// A node storing one value per component of `field`.
    pub fn node(&mut self, id: i32, field: &SharedFieldDef, values: &[f64]) -> NodeHandle {
        let mut node = Node::new(NodeId(id), &mut self.nodes);
        let layouts = vec![ComponentLayout::SCALAR; field.component_count()];
        node.define_field(field, &layouts, None, &mut self.nodes, &self.config)
            .unwrap_or_else(|e| panic!("fixture node {id}: {e}"));
        for (component, &value) in values.iter().enumerate() {
            node.set_value(field.id(), component, 0, 0, 0.0, TIME_TOLERANCE, value)
                .unwrap_or_else(|e| panic!("fixture node {id}: {e}"));
        }
        node.into_handle()
    }

    /// A node storing `values[i]` at `times[i]` for a single-component field.
    pub fn timed_node(
        &mut self,
        id: i32,
        field: &SharedFieldDef,
        times: &SharedTimeSequence,
        values: &[f64],
    ) -> NodeHandle {
        let mut node = Node::new(NodeId(id), &mut self.nodes);
        node.define_field(
            field,
            &[ComponentLayout::SCALAR],
            Some(SharedTimeSequence::clone(times)),
            &mut self.nodes,
            &self.config,
        )
        .unwrap_or_else(|e| panic!("fixture node {id}: {e}"));
        for (&time, &value) in times.times().iter().zip(values) {
            node.set_value(field.id(), 0, 0, 0, time, TIME_TOLERANCE, value)
                .unwrap_or_else(|e| panic!("fixture node {id}: {e}"));
        }
        node.into_handle()
    }

    /// An element of `shape` whose local nodes are `nodes`, with no fields.
    pub fn element(&mut self, id: ElementId, shape: ShapeId, nodes: &[NodeHandle]) -> ElementHandle {
        let mut element = Element::new(ElementIdentity::new(id), shape, 0, &mut self.elements);
        for node in nodes {
            element.node_scale_mut().push_node(Some(NodeHandle::clone(node)));
        }
        element.into_handle()
    }

    /// Define every component of `field` on `element` with the Lagrange
    /// basis of `dimension`, local node `i` giving coefficient `i`. With a
    /// scale factor set, coefficient `i` is scaled by factor `i`.
    pub fn define_lagrange(
        &mut self,
        element: &ElementHandle,
        field: &SharedFieldDef,
        dimension: usize,
        scale_factor_set: Option<ScaleFactorSetId>,
    ) {
        let maps: Vec<DofMap> = (0..1usize << dimension)
            .map(|i| match scale_factor_set {
                Some(_) => DofMap::scaled_node(i, 0, 0, i),
                None => DofMap::node(i, 0, 0),
            })
            .collect();
        let component =
            ElementFieldComponent::node_based(MockBasis::lagrange(dimension), scale_factor_set, maps);
        element
            .borrow_mut()
            .define_field(
                field,
                vec![component; field.component_count()],
                &self.basis,
                &mut self.elements,
                &self.config,
            )
            .unwrap_or_else(|e| panic!("fixture element field {field}: {e}"));
    }
}

impl Default for MeshFixture {
    fn default() -> Self {
        Self::new()
    }
}
