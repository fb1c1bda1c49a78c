//! Criterion micro-benchmarks for element field evaluation.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use fedof_bench::random_values;
use fedof_core::{ElementId, FieldId};
use fedof_element::{ElementFieldComponent, ElementHandle};
use fedof_eval::{EvalConfig, ElementFieldEvaluation};
use fedof_test_utils::fixtures::{real_field, MeshFixture};
use fedof_test_utils::{MockBasis, MockShape};

/// A trilinear cube carrying a 3-component field at seeded node values.
fn make_cube(mesh: &mut MeshFixture) -> ElementHandle {
    let field = real_field(0, "displacement", 3);
    let values = random_values(24, 11);
    let nodes: Vec<_> = (0..8)
        .map(|k| mesh.node(k as i32 + 1, &field, &values[k * 3..k * 3 + 3]))
        .collect();
    let cube = mesh.element(ElementId::new(3, 1), MockShape::CUBE, &nodes);
    mesh.define_lagrange(&cube, &field, 3, None);
    cube
}

/// 1K seeded points in the unit cube.
fn make_points() -> Vec<[f64; 3]> {
    random_values(3_000, 5)
        .chunks(3)
        .map(|xi| [(xi[0] + 1.0) / 2.0, (xi[1] + 1.0) / 2.0, (xi[2] + 1.0) / 2.0])
        .collect()
}

/// Benchmark: gather and blend coefficients from scratch.
fn bench_calculate_cube(c: &mut Criterion) {
    let mut mesh = MeshFixture::new();
    let cube = make_cube(&mut mesh);
    let config = EvalConfig::default();
    let mut evaluation = ElementFieldEvaluation::new();

    c.bench_function("calculate_trilinear_cube", |b| {
        b.iter(|| {
            evaluation.clear();
            evaluation
                .calculate(FieldId(0), &cube, 0.0, &mesh.basis, &MockShape, &config)
                .unwrap();
            black_box(evaluation.number_of_components());
        });
    });
}

/// Benchmark: evaluate prepared coefficients at 1K points.
fn bench_evaluate_cube(c: &mut Criterion) {
    let mut mesh = MeshFixture::new();
    let cube = make_cube(&mut mesh);
    let points = make_points();
    let mut evaluation = ElementFieldEvaluation::new();
    evaluation
        .calculate(FieldId(0), &cube, 0.0, &mesh.basis, &MockShape, &EvalConfig::default())
        .unwrap();

    c.bench_function("evaluate_trilinear_cube_1k", |b| {
        b.iter(|| {
            for xi in &points {
                black_box(evaluation.evaluate_with_derivatives(xi, &mesh.basis).unwrap());
            }
        });
    });
}

/// Benchmark: evaluate a 16x16x16 grid field at 1K points.
fn bench_evaluate_grid(c: &mut Criterion) {
    let mut mesh = MeshFixture::new();
    let density = real_field(1, "density", 1);
    let cube = mesh.element(ElementId::new(3, 1), MockShape::CUBE, &[]);
    cube.borrow_mut()
        .define_field(
            &density,
            vec![ElementFieldComponent::grid_based(MockBasis::TRILINEAR, &[16, 16, 16])],
            &mesh.basis,
            &mut mesh.elements,
            &mesh.config,
        )
        .unwrap();
    for (point, value) in random_values(17 * 17 * 17, 13).into_iter().enumerate() {
        cube.borrow_mut().set_grid_value(FieldId(1), 0, point, value).unwrap();
    }
    let points = make_points();
    let mut evaluation = ElementFieldEvaluation::new();
    evaluation
        .calculate(FieldId(1), &cube, 0.0, &mesh.basis, &MockShape, &EvalConfig::default())
        .unwrap();

    c.bench_function("evaluate_grid_cube_1k", |b| {
        b.iter(|| {
            for xi in &points {
                black_box(evaluation.evaluate(xi, &mesh.basis).unwrap());
            }
        });
    });
}

criterion_group!(
    benches,
    bench_calculate_cube,
    bench_evaluate_cube,
    bench_evaluate_grid
);
criterion_main!(benches);
