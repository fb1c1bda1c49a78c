//! Integration test: descriptor sharing across a nodeset.
//!
//! Defines fields on many nodes, checks that identically defined nodes
//! share one descriptor, that per-node changes copy on write, and that
//! unused descriptors leave the registry.

use std::rc::Rc;

use fedof_core::{FieldId, NodeId, TimeSequence, ValueType};
use fedof_field::{
    used_only_once, ComponentLayout, FieldChange, FieldChangeLog, FieldDef, LastLoggedInfo, Node,
    NodeFieldInfoRegistry,
};
use fedof_storage::StorageConfig;

const TOL: f64 = 1e-5;

fn nodeset(count: i32, registry: &mut NodeFieldInfoRegistry) -> Vec<Node> {
    let coordinates = FieldDef::new(FieldId(0), "coordinates", ValueType::Double, 3).unwrap();
    let config = StorageConfig::default();
    (1..=count)
        .map(|id| {
            let mut node = Node::new(NodeId(id), registry);
            node.define_field(
                &coordinates,
                &[ComponentLayout::SCALAR; 3],
                None,
                registry,
                &config,
            )
            .unwrap();
            node
        })
        .collect()
}

#[test]
fn identical_nodes_share_one_descriptor() {
    let mut registry = NodeFieldInfoRegistry::new();
    let nodes = nodeset(10, &mut registry);
    assert_eq!(registry.len(), 1);
    let shared = nodes[0].field_info();
    assert!(nodes.iter().all(|n| Rc::ptr_eq(n.field_info(), shared)));
    assert!(!used_only_once(shared));
}

#[test]
fn defining_on_one_node_copies_on_write() {
    let mut registry = NodeFieldInfoRegistry::new();
    let mut nodes = nodeset(3, &mut registry);
    let temperature = FieldDef::new(FieldId(1), "temperature", ValueType::Float, 1).unwrap();
    let times = TimeSequence::shared(vec![0.0, 1.0, 2.0]).unwrap();
    nodes[1]
        .define_field(
            &temperature,
            &[ComponentLayout::SCALAR],
            Some(Rc::clone(&times)),
            &mut registry,
            &StorageConfig::default(),
        )
        .unwrap();
    assert_eq!(registry.len(), 2);
    assert!(Rc::ptr_eq(nodes[0].field_info(), nodes[2].field_info()));
    assert!(!nodes[0].field_info().has_field(FieldId(1)));
    assert!(nodes[1].field_info().has_field_with_multiple_times());
    assert!(used_only_once(nodes[1].field_info()));

    nodes[1]
        .set_value(FieldId(1), 0, 0, 0, 2.0, TOL, 310.0)
        .unwrap();
    assert_eq!(nodes[1].value(FieldId(1), 0, 0, 0, 1.5).unwrap(), 155.0);

    nodes[1].undefine_field(FieldId(1), &mut registry).unwrap();
    assert!(Rc::ptr_eq(nodes[0].field_info(), nodes[1].field_info()));
    assert_eq!(registry.len(), 1);
}

#[test]
fn bulk_change_logging_skips_shared_descriptors() {
    let mut registry = NodeFieldInfoRegistry::new();
    let nodes = nodeset(50, &mut registry);
    let mut log = FieldChangeLog::new();
    let mut last = LastLoggedInfo::new();
    let logged: usize = nodes
        .iter()
        .map(|n| log.log_fields_of(n.field_info(), FieldChange::Values, &mut last))
        .sum();
    assert_eq!(logged, 1);
    assert_eq!(log.change(FieldId(0)), Some(FieldChange::Values));
}

#[test]
fn exclusive_descriptor_changes_in_place() {
    let mut registry = NodeFieldInfoRegistry::new();
    let mut nodes = nodeset(1, &mut registry);
    let before = Rc::as_ptr(nodes[0].field_info());
    assert!(used_only_once(nodes[0].field_info()));

    let temperature = FieldDef::new(FieldId(1), "temperature", ValueType::Double, 1).unwrap();
    nodes[0]
        .define_field(
            &temperature,
            &[ComponentLayout::SCALAR],
            None,
            &mut registry,
            &StorageConfig::default(),
        )
        .unwrap();
    assert_eq!(Rc::as_ptr(nodes[0].field_info()), before);
    assert!(nodes[0].field_info().has_field(FieldId(1)));
    assert_eq!(nodes[0].field_info().number_of_values(), 4);
    assert_eq!(registry.len(), 1);

    nodes[0].undefine_field(FieldId(0), &mut registry).unwrap();
    assert_eq!(Rc::as_ptr(nodes[0].field_info()), before);
    assert_eq!(nodes[0].field_info().number_of_values(), 1);
    assert_eq!(registry.len(), 1);
}

#[test]
fn failed_define_leaves_exclusive_descriptor_untouched() {
    let mut registry = NodeFieldInfoRegistry::new();
    let mut nodes = nodeset(1, &mut registry);
    let before = Rc::as_ptr(nodes[0].field_info());
    let velocity = FieldDef::new(FieldId(1), "velocity", ValueType::Double, 2).unwrap();
    let result = nodes[0].define_field(
        &velocity,
        &[ComponentLayout::SCALAR, ComponentLayout::new(0, 1)],
        None,
        &mut registry,
        &StorageConfig::default(),
    );
    assert!(result.is_err());
    assert_eq!(Rc::as_ptr(nodes[0].field_info()), before);
    assert!(!nodes[0].field_info().has_field(FieldId(1)));
    assert_eq!(nodes[0].field_info().number_of_values(), 3);
    assert_eq!(registry.len(), 1);
}
