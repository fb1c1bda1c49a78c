//! Test utilities and mock collaborators for fedof development.
//!
//! Provides mock implementations of the collaborator traits
//! ([`BasisProvider`], [`ShapeProvider`], [`IdentifierAllocator`]), small
//! mesh [`fixtures`], and [`init_logging`] for tests that want log output.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

use std::cell::Cell;
use std::collections::{BTreeSet, HashMap};

use fedof_core::{
    BasisId, BasisProvider, ElementId, EvaluationError, FaceTransform, IdentifierAllocator, NodeId,
    RangeKind, ShapeId, ShapeProvider, Xi,
};

/// Route `log` output through the test harness. Safe to call repeatedly.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Multilinear Lagrange bases over 0 to 3 dimensions.
///
/// Coefficient `k` belongs to the cell corner whose bit `d` gives the
/// corner along xi `d`, xi0 varying fastest, matching grid corner maps.
/// Blending is the identity; the number of blends performed is counted so
/// tests can observe caching.
pub struct MockBasis {
    dimensions: HashMap<BasisId, usize>,
    blends: Cell<usize>,
}

impl MockBasis {
    /// A single constant coefficient.
    pub const CONSTANT: BasisId = BasisId(0);
    /// Linear Lagrange on a line.
    pub const LINEAR: BasisId = BasisId(1);
    /// Bilinear Lagrange on a square.
    pub const BILINEAR: BasisId = BasisId(2);
    /// Trilinear Lagrange on a cube.
    pub const TRILINEAR: BasisId = BasisId(3);

    pub fn new() -> Self {
        let dimensions = [
            (Self::CONSTANT, 0),
            (Self::LINEAR, 1),
            (Self::BILINEAR, 2),
            (Self::TRILINEAR, 3),
        ]
        .into_iter()
        .collect();
        Self {
            dimensions,
            blends: Cell::new(0),
        }
    }

    /// The multilinear basis over `dimension` xi coordinates.
    pub fn lagrange(dimension: usize) -> BasisId {
        BasisId(dimension as u32)
    }

    /// Number of `blend` calls so far.
    pub fn blend_calls(&self) -> usize {
        self.blends.get()
    }

    fn checked_dimension(&self, basis: BasisId, coefficients: usize) -> Result<usize, EvaluationError> {
        let dimension = self
            .dimensions
            .get(&basis)
            .copied()
            .ok_or_else(|| EvaluationError::InvalidArgument {
                reason: format!("unknown basis {basis}"),
            })?;
        if coefficients != 1 << dimension {
            return Err(EvaluationError::OutOfRange {
                kind: RangeKind::Component,
                index: coefficients,
                limit: 1 << dimension,
            });
        }
        Ok(dimension)
    }
}

impl Default for MockBasis {
    fn default() -> Self {
        Self::new()
    }
}

fn corner_weight(corner: usize, xi: &[f64], skip: Option<usize>) -> f64 {
    xi.iter()
        .enumerate()
        .filter(|&(d, _)| Some(d) != skip)
        .map(|(d, &x)| if corner >> d & 1 == 1 { x } else { 1.0 - x })
        .product()
}

impl BasisProvider for MockBasis {
    fn coefficient_count(&self, basis: BasisId) -> Option<usize> {
        self.dimensions.get(&basis).map(|&d| 1 << d)
    }

    fn dimension(&self, basis: BasisId) -> Option<usize> {
        self.dimensions.get(&basis).copied()
    }

    fn blend(&self, basis: BasisId, raw: &[f64]) -> Result<Vec<f64>, EvaluationError> {
        self.checked_dimension(basis, raw.len())?;
        self.blends.set(self.blends.get() + 1);
        Ok(raw.to_vec())
    }

    fn interpolate(&self, basis: BasisId, blended: &[f64], xi: &[f64]) -> Result<f64, EvaluationError> {
        let dimension = self.checked_dimension(basis, blended.len())?;
        let xi = &xi[..dimension.min(xi.len())];
        Ok(blended
            .iter()
            .enumerate()
            .map(|(corner, c)| c * corner_weight(corner, xi, None))
            .sum())
    }

    fn interpolate_derivatives(
        &self,
        basis: BasisId,
        blended: &[f64],
        xi: &[f64],
    ) -> Result<Xi, EvaluationError> {
        let dimension = self.checked_dimension(basis, blended.len())?;
        let xi = &xi[..dimension.min(xi.len())];
        Ok((0..xi.len())
            .map(|d| {
                blended
                    .iter()
                    .enumerate()
                    .map(|(corner, c)| {
                        let sign = if corner >> d & 1 == 1 { 1.0 } else { -1.0 };
                        c * sign * corner_weight(corner, xi, Some(d))
                    })
                    .sum()
            })
            .collect())
    }
}

/// Line, square and cube shapes with faces numbered xi0 = 0, xi0 = 1,
/// xi1 = 0, xi1 = 1, and so on. Face coordinates are the parent's
/// remaining xi in increasing order.
pub struct MockShape;

impl MockShape {
    pub const LINE: ShapeId = ShapeId(1);
    pub const SQUARE: ShapeId = ShapeId(2);
    pub const CUBE: ShapeId = ShapeId(3);
}

impl ShapeProvider for MockShape {
    fn dimension(&self, shape: ShapeId) -> Option<usize> {
        match shape {
            Self::LINE => Some(1),
            Self::SQUARE => Some(2),
            Self::CUBE => Some(3),
            _ => None,
        }
    }

    fn face_count(&self, shape: ShapeId) -> usize {
        self.dimension(shape).map_or(0, |d| 2 * d)
    }

    fn face_affine_transform(&self, shape: ShapeId, face: usize) -> Option<FaceTransform> {
        let dimension = self.dimension(shape)?;
        if face >= 2 * dimension {
            return None;
        }
        let (fixed, at) = (face / 2, (face % 2) as f64);
        let face_dimension = dimension - 1;
        let mut coefficients = Vec::with_capacity(dimension * dimension);
        let mut next = 0;
        for d in 0..dimension {
            let mut row = vec![0.0; face_dimension + 1];
            if d == fixed {
                row[0] = at;
            } else {
                row[next + 1] = 1.0;
                next += 1;
            }
            coefficients.extend(row);
        }
        FaceTransform::new(dimension, face_dimension, coefficients)
    }
}

/// Hands out the lowest free identifier, per element dimension.
#[derive(Default)]
pub struct MockIdentifiers {
    nodes: BTreeSet<i32>,
    elements: HashMap<u8, BTreeSet<i32>>,
}

impl MockIdentifiers {
    pub fn new() -> Self {
        Self::default()
    }
}

fn lowest_free(used: &mut BTreeSet<i32>) -> i32 {
    let id = (1..).find(|id| !used.contains(id)).unwrap_or(i32::MAX);
    used.insert(id);
    id
}

impl IdentifierAllocator for MockIdentifiers {
    fn allocate_node_identifier(&mut self) -> NodeId {
        NodeId(lowest_free(&mut self.nodes))
    }

    fn free_node_identifier(&mut self, id: NodeId) {
        self.nodes.remove(&id.0);
    }

    fn allocate_element_identifier(&mut self, dimension: u8) -> ElementId {
        ElementId::new(dimension, lowest_free(self.elements.entry(dimension).or_default()))
    }

    fn free_element_identifier(&mut self, id: ElementId) {
        if let Some(used) = self.elements.get_mut(&id.dimension) {
            used.remove(&id.identifier);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bilinear_interpolates_corners() {
        let basis = MockBasis::new();
        let c = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(basis.interpolate(MockBasis::BILINEAR, &c, &[1.0, 0.0]).unwrap(), 2.0);
        assert_eq!(basis.interpolate(MockBasis::BILINEAR, &c, &[0.5, 0.5]).unwrap(), 2.5);
        let d = basis.interpolate_derivatives(MockBasis::BILINEAR, &c, &[0.5, 0.5]).unwrap();
        assert_eq!(d.as_slice(), &[1.0, 2.0]);
    }

    #[test]
    fn square_faces() {
        let t = MockShape.face_affine_transform(MockShape::SQUARE, 3).unwrap();
        assert_eq!(t.apply(&[0.25]).as_slice(), &[0.25, 1.0]);
        assert!(MockShape.face_affine_transform(MockShape::SQUARE, 4).is_none());
        let t = MockShape.face_affine_transform(MockShape::CUBE, 2).unwrap();
        assert_eq!(t.apply(&[0.5, 0.75]).as_slice(), &[0.5, 0.0, 0.75]);
    }

    #[test]
    fn identifiers_reuse_freed() {
        let mut ids = MockIdentifiers::new();
        assert_eq!(ids.allocate_node_identifier(), NodeId(1));
        assert_eq!(ids.allocate_node_identifier(), NodeId(2));
        ids.free_node_identifier(NodeId(1));
        assert_eq!(ids.allocate_node_identifier(), NodeId(1));
        assert_eq!(ids.allocate_element_identifier(2), ElementId::new(2, 1));
    }
}
