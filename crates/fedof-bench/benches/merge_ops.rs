//! Criterion micro-benchmarks for node and element merges.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use fedof_bench::random_values;
use fedof_core::{ElementId, TimeSequence};
use fedof_element::ElementHandle;
use fedof_field::NodeHandle;
use fedof_merge::{MergeConfig, Merger};
use fedof_test_utils::fixtures::{real_field, MeshFixture};
use fedof_test_utils::MockShape;

const NODES: usize = 1_000;

/// `NODES` target/source pairs whose time sequences do not overlap.
fn make_node_pairs() -> (MeshFixture, Vec<(NodeHandle, NodeHandle)>) {
    let mut mesh = MeshFixture::new();
    let field = real_field(0, "temperature", 1);
    let early = TimeSequence::shared((0..8).map(f64::from).collect::<Vec<_>>()).unwrap();
    let late = TimeSequence::shared((8..16).map(f64::from).collect::<Vec<_>>()).unwrap();
    let values = random_values(NODES * 16, 21);
    let pairs = values
        .chunks(16)
        .enumerate()
        .map(|(i, v)| {
            let id = i as i32 + 1;
            (
                mesh.timed_node(id, &field, &early, &v[..8]),
                mesh.timed_node(id, &field, &late, &v[8..]),
            )
        })
        .collect();
    (mesh, pairs)
}

/// Benchmark: merge 1K nodes onto the union of their times.
fn bench_merge_appended_times(c: &mut Criterion) {
    c.bench_function("merge_nodes_appended_times_1k", |b| {
        b.iter_batched(
            make_node_pairs,
            |(mut mesh, pairs)| {
                let mut merger = Merger::new(MergeConfig::default()).unwrap();
                for (target, source) in &pairs {
                    merger
                        .merge_node(&mut target.borrow_mut(), &source.borrow(), &mut mesh.nodes)
                        .unwrap();
                }
                black_box(merger.merged_counts());
            },
            BatchSize::SmallInput,
        );
    });
}

/// Two bilinear squares with the same identifier over distinct node sets.
fn make_square_pair(mesh: &mut MeshFixture) -> (ElementHandle, ElementHandle) {
    let field = real_field(0, "pressure", 2);
    let values = random_values(16, 31);
    let mut square = |first: i32, values: &[f64]| {
        let nodes: Vec<_> = (0..4)
            .map(|k| mesh.node(first + k as i32, &field, &values[k * 2..k * 2 + 2]))
            .collect();
        let element = mesh.element(ElementId::new(2, 1), MockShape::SQUARE, &nodes);
        mesh.define_lagrange(&element, &field, 2, None);
        element
    };
    let target = square(1, &values[..8]);
    let source = square(3, &values[8..]);
    (target, source)
}

/// Benchmark: merge an element whose nodes partly overlap the target's.
fn bench_merge_element(c: &mut Criterion) {
    c.bench_function("merge_element_shared_nodes", |b| {
        b.iter_batched(
            || {
                let mut mesh = MeshFixture::new();
                let pair = make_square_pair(&mut mesh);
                (mesh, pair)
            },
            |(mut mesh, (target, source))| {
                let mut merger = Merger::new(MergeConfig::default()).unwrap();
                merger
                    .merge_element(&mut target.borrow_mut(), &source.borrow(), &mut mesh.elements)
                    .unwrap();
                black_box(merger.take_change_log());
            },
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, bench_merge_appended_times, bench_merge_element);
criterion_main!(benches);
