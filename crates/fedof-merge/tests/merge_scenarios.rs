//! Merge scenarios: node value precedence and time reconciliation, element
//! node de-duplication and DOF map re-indexing, scale factor checks, and
//! all-or-nothing failure.

use std::rc::Rc;

use proptest::prelude::*;

use fedof_core::{ElementId, FieldId, MergeError, NodeId, ScaleFactorSetId, TimeSequence};
use fedof_element::ElementFieldComponent;
use fedof_field::{ComponentLayout, FieldChange, Node};
use fedof_map::{DofCache, DofMap};
use fedof_merge::{MergeConfig, Merger, OverlapPolicy};
use fedof_test_utils::fixtures::{real_field, MeshFixture};
use fedof_test_utils::{init_logging, MockBasis, MockShape};

fn merger() -> Merger {
    init_logging();
    Merger::new(MergeConfig::default()).unwrap()
}

// ── Nodes ───────────────────────────────────────────────────────

#[test]
fn merging_identical_nodes_changes_nothing() {
    let mut mesh = MeshFixture::new();
    let u = real_field(0, "u", 2);
    let target = mesh.node(1, &u, &[1.0, 2.0]);
    let source = mesh.node(1, &u, &[1.0, 2.0]);
    let mut merger = merger();
    merger
        .merge_node(&mut target.borrow_mut(), &source.borrow(), &mut mesh.nodes)
        .unwrap();
    let target = target.borrow();
    assert!(Rc::ptr_eq(target.field_info(), source.borrow().field_info()));
    assert_eq!(target.value(FieldId(0), 0, 0, 0, 0.0).unwrap(), 1.0);
    assert_eq!(target.value(FieldId(0), 1, 0, 0, 0.0).unwrap(), 2.0);
    assert_eq!(mesh.nodes.len(), 1);
}

#[test]
fn source_values_take_precedence() {
    let mut mesh = MeshFixture::new();
    let u = real_field(0, "u", 1);
    let target = mesh.node(1, &u, &[1.0]);
    let source = mesh.node(1, &u, &[5.0]);
    merger()
        .merge_node(&mut target.borrow_mut(), &source.borrow(), &mut mesh.nodes)
        .unwrap();
    assert_eq!(target.borrow().value(FieldId(0), 0, 0, 0, 0.0).unwrap(), 5.0);
}

#[test]
fn fields_on_one_side_are_carried_over() {
    let mut mesh = MeshFixture::new();
    let u = real_field(0, "u", 1);
    let v = real_field(1, "v", 2);
    let target = mesh.node(1, &u, &[3.0]);
    let source = mesh.node(1, &v, &[7.0, 8.0]);
    let mut merger = merger();
    merger
        .merge_node(&mut target.borrow_mut(), &source.borrow(), &mut mesh.nodes)
        .unwrap();
    let target = target.borrow();
    let ids: Vec<_> = target.field_info().fields().iter().map(|f| f.id()).collect();
    assert_eq!(ids, vec![FieldId(0), FieldId(1)]);
    assert_eq!(target.field_info().number_of_values(), 3);
    assert_eq!(target.value(FieldId(0), 0, 0, 0, 0.0).unwrap(), 3.0);
    assert_eq!(target.value(FieldId(1), 1, 0, 0, 0.0).unwrap(), 8.0);
    assert_eq!(merger.change_log().change(FieldId(1)), Some(FieldChange::Added));
    assert_eq!(merger.change_log().change(FieldId(0)), None);
}

#[test]
fn node_identifiers_must_match() {
    let mut mesh = MeshFixture::new();
    let u = real_field(0, "u", 1);
    let target = mesh.node(1, &u, &[1.0]);
    let source = mesh.node(2, &u, &[5.0]);
    let result = merger().merge_node(&mut target.borrow_mut(), &source.borrow(), &mut mesh.nodes);
    assert!(matches!(result, Err(MergeError::InvalidArgument { .. })));
}

#[test]
fn incompatible_layout_leaves_both_nodes_unchanged() {
    let mut mesh = MeshFixture::new();
    let u = real_field(0, "u", 1);
    let target = mesh.node(1, &u, &[1.0]);
    let mut source = Node::new(NodeId(1), &mut mesh.nodes);
    source
        .define_field(&u, &[ComponentLayout::new(2, 1)], None, &mut mesh.nodes, &mesh.config)
        .unwrap();
    let before = Rc::clone(target.borrow().field_info());

    let result = merger().merge_node(&mut target.borrow_mut(), &source, &mut mesh.nodes);
    assert!(matches!(
        result,
        Err(MergeError::IncompatibleLayout { field: FieldId(0), .. })
    ));
    let target = target.borrow();
    assert!(Rc::ptr_eq(target.field_info(), &before));
    assert_eq!(target.values().len(), 1);
    assert_eq!(target.value(FieldId(0), 0, 0, 0, 0.0).unwrap(), 1.0);
    assert_eq!(source.values().len(), 2);
}

// ── Time sequences ──────────────────────────────────────────────

#[test]
fn appended_times_extend_with_source_values() {
    for optimised in [true, false] {
        let mut mesh = MeshFixture::new();
        let u = real_field(0, "u", 1);
        let short = TimeSequence::shared(vec![0.0, 1.0]).unwrap();
        let long = TimeSequence::shared(vec![0.0, 1.0, 2.0]).unwrap();
        let target = mesh.timed_node(1, &u, &short, &[10.0, 20.0]);
        let source = mesh.timed_node(1, &u, &long, &[11.0, 21.0, 30.0]);
        let config = MergeConfig {
            optimised_time_mapping: optimised,
            ..MergeConfig::default()
        };
        let mut merger = Merger::new(config).unwrap();
        merger
            .merge_node(&mut target.borrow_mut(), &source.borrow(), &mut mesh.nodes)
            .unwrap();

        let target = target.borrow();
        let field = target.node_field(FieldId(0)).unwrap();
        assert_eq!(field.time_sequence().unwrap().times(), &[0.0, 1.0, 2.0]);
        let values: Vec<f64> = [0.0, 1.0, 2.0]
            .iter()
            .map(|&t| target.value(FieldId(0), 0, 0, 0, t).unwrap())
            .collect();
        // source values win at the shared times
        assert_eq!(values, vec![11.0, 21.0, 30.0], "optimised = {optimised}");
        assert_eq!(merger.change_log().change(FieldId(0)), Some(FieldChange::Definition));
    }
}

#[test]
fn overlapping_times_prefer_source() {
    let mut mesh = MeshFixture::new();
    let u = real_field(0, "u", 1);
    let target = mesh.timed_node(1, &u, &TimeSequence::shared(vec![0.0, 1.0]).unwrap(), &[1.0, 2.0]);
    let source = mesh.timed_node(1, &u, &TimeSequence::shared(vec![1.0, 2.0]).unwrap(), &[7.0, 8.0]);
    merger()
        .merge_node(&mut target.borrow_mut(), &source.borrow(), &mut mesh.nodes)
        .unwrap();
    let target = target.borrow();
    let values: Vec<f64> = [0.0, 1.0, 2.0]
        .iter()
        .map(|&t| target.value(FieldId(0), 0, 0, 0, t).unwrap())
        .collect();
    assert_eq!(values, vec![1.0, 7.0, 8.0]);
}

#[test]
fn conflict_policy_refuses_overlapping_times() {
    let mut mesh = MeshFixture::new();
    let u = real_field(0, "u", 1);
    let target = mesh.timed_node(1, &u, &TimeSequence::shared(vec![0.0, 1.0]).unwrap(), &[1.0, 2.0]);
    let source = mesh.timed_node(1, &u, &TimeSequence::shared(vec![1.0, 2.0]).unwrap(), &[7.0, 8.0]);
    let mut merger = Merger::new(MergeConfig {
        overlap_policy: OverlapPolicy::Conflict,
        ..MergeConfig::default()
    })
    .unwrap();
    let result = merger.merge_node(&mut target.borrow_mut(), &source.borrow(), &mut mesh.nodes);
    assert!(matches!(
        result,
        Err(MergeError::IncompatibleTimeMapping { field: FieldId(0), .. })
    ));
    let target = target.borrow();
    let times = target.node_field(FieldId(0)).unwrap().time_sequence().unwrap();
    assert_eq!(times.times(), &[0.0, 1.0]);
    assert_eq!(target.value(FieldId(0), 0, 0, 0, 1.0).unwrap(), 2.0);
    assert!(merger.change_log().is_empty());
}

#[test]
fn conflict_policy_accepts_times_held_by_one_side() {
    let cases = [
        (vec![0.0, 2.0], vec![0.0, 1.0, 2.0], vec![0.0, 1.0, 2.0]),
        (vec![0.0, 1.0, 2.0], vec![1.0], vec![0.0, 1.0, 2.0]),
    ];
    for (target_times, source_times, merged) in cases {
        let mut mesh = MeshFixture::new();
        let u = real_field(0, "u", 1);
        let target_values: Vec<f64> = target_times.iter().map(|t| t * 10.0).collect();
        let source_values: Vec<f64> = source_times.iter().map(|t| t * 100.0).collect();
        let target = mesh.timed_node(1, &u, &TimeSequence::shared(target_times).unwrap(), &target_values);
        let source = mesh.timed_node(1, &u, &TimeSequence::shared(source_times).unwrap(), &source_values);
        let mut merger = Merger::new(MergeConfig {
            overlap_policy: OverlapPolicy::Conflict,
            ..MergeConfig::default()
        })
        .unwrap();
        merger
            .merge_node(&mut target.borrow_mut(), &source.borrow(), &mut mesh.nodes)
            .unwrap();
        let target = target.borrow();
        let times = target.node_field(FieldId(0)).unwrap().time_sequence().unwrap();
        assert_eq!(times.times(), merged.as_slice());
        assert_eq!(target.value(FieldId(0), 0, 0, 0, 1.0).unwrap(), 100.0);
    }
}

#[test]
fn time_varying_and_constant_definitions_of_one_field_are_refused() {
    for timed_source in [true, false] {
        let mut mesh = MeshFixture::new();
        let u = real_field(0, "u", 1);
        let times = TimeSequence::shared(vec![0.0, 1.0]).unwrap();
        let constant = mesh.node(1, &u, &[4.0]);
        let timed = mesh.timed_node(1, &u, &times, &[1.0, 2.0]);
        let (target, source) = if timed_source {
            (constant, timed)
        } else {
            (timed, constant)
        };
        let before = Rc::clone(target.borrow().field_info());

        let result = merger().merge_node(&mut target.borrow_mut(), &source.borrow(), &mut mesh.nodes);
        assert!(
            matches!(result, Err(MergeError::IncompatibleTimeMapping { field: FieldId(0), .. })),
            "timed source = {timed_source}"
        );
        assert!(Rc::ptr_eq(target.borrow().field_info(), &before));
    }
}

#[test]
fn time_varying_and_constant_fields_coexist() {
    let mut mesh = MeshFixture::new();
    let u = real_field(0, "u", 1);
    let v = real_field(1, "v", 1);
    let target = mesh.node(1, &v, &[4.0]);
    let source = mesh.timed_node(1, &u, &TimeSequence::shared(vec![0.0, 5.0]).unwrap(), &[0.0, 50.0]);
    merger()
        .merge_node(&mut target.borrow_mut(), &source.borrow(), &mut mesh.nodes)
        .unwrap();
    let target = target.borrow();
    assert_eq!(target.value(FieldId(0), 0, 0, 0, 2.5).unwrap(), 25.0);
    assert_eq!(target.value(FieldId(1), 0, 0, 0, 2.5).unwrap(), 4.0);
}

// ── Elements ────────────────────────────────────────────────────

#[test]
fn element_merge_deduplicates_nodes_and_reindexes_maps() {
    let mut mesh = MeshFixture::new();
    let u = real_field(0, "u", 1);
    let n1 = mesh.node(1, &u, &[1.0]);
    let n2 = mesh.node(2, &u, &[2.0]);
    let n3 = mesh.node(3, &u, &[3.0]);
    let id = ElementId::new(1, 1);
    let target = mesh.element(id, MockShape::LINE, &[Rc::clone(&n1), Rc::clone(&n2)]);
    let source = mesh.element(id, MockShape::LINE, &[n3, n2]);
    mesh.define_lagrange(&target, &u, 1, None);
    mesh.define_lagrange(&source, &u, 1, None);

    let mut merger = merger();
    merger
        .merge_element(&mut target.borrow_mut(), &source.borrow(), &mut mesh.elements)
        .unwrap();

    let target = target.borrow();
    let ids: Vec<_> = (0..target.node_scale().node_count())
        .map(|local| target.node_scale().node_id(local))
        .collect();
    assert_eq!(ids, vec![Some(NodeId(1)), Some(NodeId(2)), Some(NodeId(3))]);
    let component = target.field_component(FieldId(0), 0).unwrap();
    assert_eq!(component.maps(), &[DofMap::node(2, 0, 0), DofMap::node(1, 0, 0)]);
    assert_eq!(target.unused_local_nodes(), vec![0]);

    let mut cache = DofCache::new(target.node_scale(), FieldId(0), 0, 0.0, None).unwrap();
    assert_eq!(component.maps()[0].evaluate(&mut cache).unwrap(), 3.0);
    assert_eq!(merger.change_log().change(FieldId(0)), Some(FieldChange::Definition));
}

#[test]
fn interchangeable_maps_keep_definition() {
    let mut mesh = MeshFixture::new();
    let u = real_field(0, "u", 1);
    let n1 = mesh.node(1, &u, &[1.0]);
    let n2 = mesh.node(2, &u, &[2.0]);
    let id = ElementId::new(1, 1);
    let target = mesh.element(id, MockShape::LINE, &[Rc::clone(&n1), Rc::clone(&n2)]);
    mesh.define_lagrange(&target, &u, 1, None);
    let source = mesh.element(id, MockShape::LINE, &[n2, n1]);
    let swapped = ElementFieldComponent::node_based(
        MockBasis::LINEAR,
        None,
        vec![DofMap::node(1, 0, 0), DofMap::node(0, 0, 0)],
    );
    source
        .borrow_mut()
        .define_field(&u, vec![swapped], &mesh.basis, &mut mesh.elements, &mesh.config)
        .unwrap();
    let before = Rc::clone(target.borrow().field_info());

    let mut merger = merger();
    merger
        .merge_element(&mut target.borrow_mut(), &source.borrow(), &mut mesh.elements)
        .unwrap();
    let target = target.borrow();
    assert!(Rc::ptr_eq(target.field_info(), &before));
    assert_eq!(target.node_scale().node_count(), 2);
    assert_eq!(merger.change_log().change(FieldId(0)), Some(FieldChange::Values));
}

#[test]
fn scale_factor_sets_merged_by_identifier() {
    let mut mesh = MeshFixture::new();
    let id = ElementId::new(1, 1);
    let target = mesh.element(id, MockShape::LINE, &[]);
    let source = mesh.element(id, MockShape::LINE, &[]);
    let (a, b) = (ScaleFactorSetId(1), ScaleFactorSetId(2));
    target.borrow_mut().node_scale_mut().scale_factors_mut().add_set(a, 2).unwrap();
    {
        let mut source = source.borrow_mut();
        let table = source.node_scale_mut().scale_factors_mut();
        table.add_set(b, 1).unwrap();
        table.add_set(a, 2).unwrap();
        table.set_value(a, 1, -3.0).unwrap();
        table.set_value(b, 0, 0.5).unwrap();
    }
    merger()
        .merge_element(&mut target.borrow_mut(), &source.borrow(), &mut mesh.elements)
        .unwrap();
    let target = target.borrow();
    let table = target.node_scale().scale_factors();
    assert_eq!(table.values_for(a).unwrap(), &[1.0, -3.0]);
    assert_eq!(table.values_for(b).unwrap(), &[0.5]);
    assert_eq!(table.set_offset(b), Some(2));
}

#[test]
fn scale_factor_size_mismatch_aborts() {
    let mut mesh = MeshFixture::new();
    let u = real_field(0, "u", 1);
    let n1 = mesh.node(1, &u, &[1.0]);
    let id = ElementId::new(1, 1);
    let target = mesh.element(id, MockShape::LINE, &[]);
    let source = mesh.element(id, MockShape::LINE, &[n1]);
    let set = ScaleFactorSetId(4);
    target.borrow_mut().node_scale_mut().scale_factors_mut().add_set(set, 2).unwrap();
    source.borrow_mut().node_scale_mut().scale_factors_mut().add_set(set, 3).unwrap();

    let result = merger().merge_element(&mut target.borrow_mut(), &source.borrow(), &mut mesh.elements);
    assert_eq!(
        result.unwrap_err(),
        MergeError::ScaleFactorSetSizeMismatch {
            set,
            target: 2,
            source: 3
        }
    );
    let target = target.borrow();
    assert_eq!(target.node_scale().node_count(), 0);
    assert_eq!(target.node_scale().scale_factors().set_count(set), Some(2));
}

#[test]
fn grid_values_follow_their_field() {
    let mut mesh = MeshFixture::new();
    let a = real_field(1, "a", 1);
    let density = real_field(2, "density", 1);
    let id = ElementId::new(1, 1);
    let target = mesh.element(id, MockShape::LINE, &[]);
    let source = mesh.element(id, MockShape::LINE, &[]);
    let grid = |n: usize| ElementFieldComponent::grid_based(MockBasis::LINEAR, &[n]);
    target
        .borrow_mut()
        .define_field(&a, vec![grid(1)], &mesh.basis, &mut mesh.elements, &mesh.config)
        .unwrap();
    source
        .borrow_mut()
        .define_field(&density, vec![grid(2)], &mesh.basis, &mut mesh.elements, &mesh.config)
        .unwrap();
    for point in 0..3 {
        source
            .borrow_mut()
            .set_grid_value(FieldId(2), 0, point, 1.0 + point as f64)
            .unwrap();
    }
    target.borrow_mut().set_grid_value(FieldId(1), 0, 1, 9.0).unwrap();

    let mut merger = merger();
    merger
        .merge_element(&mut target.borrow_mut(), &source.borrow(), &mut mesh.elements)
        .unwrap();
    let target = target.borrow();
    assert_eq!(target.grid_values().len(), 5);
    let offset = target
        .field_component(FieldId(2), 0)
        .unwrap()
        .grid()
        .unwrap()
        .value_offset;
    assert_eq!(offset, 2);
    let values: Vec<f64> = (offset..offset + 3)
        .map(|o| target.grid_values().real_value(o, None, 0.0).unwrap())
        .collect();
    assert_eq!(values, vec![1.0, 2.0, 3.0]);
    assert_eq!(target.grid_values().real_value(1, None, 0.0).unwrap(), 9.0);
    assert_eq!(merger.change_log().change(FieldId(2)), Some(FieldChange::Added));
}

#[test]
fn grid_layout_mismatch_is_incompatible() {
    let mut mesh = MeshFixture::new();
    let density = real_field(2, "density", 1);
    let id = ElementId::new(1, 1);
    let target = mesh.element(id, MockShape::LINE, &[]);
    let source = mesh.element(id, MockShape::LINE, &[]);
    for (element, n) in [(&target, 2), (&source, 3)] {
        element
            .borrow_mut()
            .define_field(
                &density,
                vec![ElementFieldComponent::grid_based(MockBasis::LINEAR, &[n])],
                &mesh.basis,
                &mut mesh.elements,
                &mesh.config,
            )
            .unwrap();
    }
    let result = merger().merge_element(&mut target.borrow_mut(), &source.borrow(), &mut mesh.elements);
    assert!(matches!(
        result,
        Err(MergeError::IncompatibleLayout { field: FieldId(2), .. })
    ));
    assert_eq!(target.borrow().grid_values().len(), 3);
}

// ── Change log ──────────────────────────────────────────────────

#[test]
fn bulk_merge_logs_each_field_once() {
    let mut mesh = MeshFixture::new();
    let u = real_field(0, "u", 1);
    let v = real_field(1, "v", 1);
    let targets: Vec<_> = (1..=5).map(|id| mesh.node(id, &u, &[0.0])).collect();
    let sources: Vec<_> = (1..=5).map(|id| mesh.node(id, &v, &[id as f64])).collect();
    let mut merger = merger();
    for (target, source) in targets.iter().zip(&sources) {
        merger
            .merge_node(&mut target.borrow_mut(), &source.borrow(), &mut mesh.nodes)
            .unwrap();
    }
    assert_eq!(merger.merged_counts(), (5, 0));
    let log = merger.take_change_log();
    assert_eq!(
        log.iter().collect::<Vec<_>>(),
        vec![(FieldId(1), FieldChange::Added)]
    );
    assert!(merger.change_log().is_empty());
    assert!(targets
        .windows(2)
        .all(|w| Rc::ptr_eq(w[0].borrow().field_info(), w[1].borrow().field_info())));
    assert_eq!(targets[3].borrow().value(FieldId(1), 0, 0, 0, 0.0).unwrap(), 4.0);
}

// ── Properties ──────────────────────────────────────────────────

proptest! {
    #[test]
    fn merge_with_copy_is_idempotent(values in prop::collection::vec(-1.0e6f64..1.0e6, 1..4)) {
        let mut mesh = MeshFixture::new();
        let u = real_field(0, "u", values.len());
        let target = mesh.node(1, &u, &values);
        let source = mesh.node(1, &u, &values);
        Merger::new(MergeConfig::default())
            .unwrap()
            .merge_node(&mut target.borrow_mut(), &source.borrow(), &mut mesh.nodes)
            .unwrap();
        let target = target.borrow();
        prop_assert_eq!(target.values().len(), values.len());
        for (component, &value) in values.iter().enumerate() {
            prop_assert_eq!(target.value(FieldId(0), component, 0, 0, 0.0).unwrap(), value);
        }
    }
}
