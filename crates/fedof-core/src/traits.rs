//! Narrow interfaces to the external collaborators.
//!
//! Basis mathematics, element shape topology and identifier allocation live
//! outside this engine. The evaluation pipeline and the element merge consume
//! them only through these traits, so tests can substitute small mocks.

use crate::error::EvaluationError;
use crate::id::{BasisId, ElementId, NodeId, ShapeId, Xi};

/// Affine map from a face's xi coordinates to its parent element's xi.
///
/// `parent_xi[i] = coefficients[i][0] + sum_j coefficients[i][j + 1] * face_xi[j]`,
/// stored row-major with `face_dimension + 1` columns per parent coordinate.
#[derive(Clone, Debug, PartialEq)]
pub struct FaceTransform {
    parent_dimension: usize,
    face_dimension: usize,
    coefficients: Vec<f64>,
}

impl FaceTransform {
    /// Build a transform from row-major coefficients.
    ///
    /// Returns `None` if `coefficients` does not hold exactly
    /// `parent_dimension * (face_dimension + 1)` values.
    pub fn new(parent_dimension: usize, face_dimension: usize, coefficients: Vec<f64>) -> Option<Self> {
        if coefficients.len() != parent_dimension * (face_dimension + 1) {
            return None;
        }
        Some(Self {
            parent_dimension,
            face_dimension,
            coefficients,
        })
    }

    /// Dimension of the parent element.
    pub fn parent_dimension(&self) -> usize {
        self.parent_dimension
    }

    /// Dimension of the face.
    pub fn face_dimension(&self) -> usize {
        self.face_dimension
    }

    /// One row per parent coordinate: the constant term, then the
    /// coefficient of each face coordinate.
    pub fn rows(&self) -> impl Iterator<Item = &[f64]> + '_ {
        self.coefficients.chunks_exact(self.face_dimension + 1)
    }

    /// Map face xi to parent xi. Extra face coordinates are ignored and
    /// missing ones are taken as zero.
    pub fn apply(&self, face_xi: &[f64]) -> Xi {
        let columns = self.face_dimension + 1;
        self.coefficients
            .chunks_exact(columns)
            .map(|row| {
                row[1..]
                    .iter()
                    .zip(face_xi)
                    .fold(row[0], |sum, (a, x)| sum + a * x)
            })
            .collect()
    }
}

/// Basis function family consumed by the evaluation pipeline.
///
/// DOF maps produce one raw coefficient per basis function; the basis
/// blends them into the coefficients of its polynomial form and evaluates
/// that form at element-local coordinates.
pub trait BasisProvider {
    /// Number of raw coefficients (and therefore DOF maps) the basis needs.
    ///
    /// Returns `None` for an unknown basis.
    fn coefficient_count(&self, basis: BasisId) -> Option<usize>;

    /// Number of xi coordinates the basis is defined over.
    fn dimension(&self, basis: BasisId) -> Option<usize>;

    /// Blend raw per-basis-function coefficients into basis coefficients.
    fn blend(&self, basis: BasisId, raw: &[f64]) -> Result<Vec<f64>, EvaluationError>;

    /// Evaluate blended coefficients at `xi`.
    fn interpolate(&self, basis: BasisId, blended: &[f64], xi: &[f64]) -> Result<f64, EvaluationError>;

    /// First derivatives with respect to each xi coordinate at `xi`.
    fn interpolate_derivatives(
        &self,
        basis: BasisId,
        blended: &[f64],
        xi: &[f64],
    ) -> Result<Xi, EvaluationError>;
}

/// Element shape topology consumed when inheriting fields across faces.
pub trait ShapeProvider {
    /// Topological dimension of the shape.
    fn dimension(&self, shape: ShapeId) -> Option<usize>;

    /// Number of faces of the shape.
    fn face_count(&self, shape: ShapeId) -> usize;

    /// Affine map from face `face` of `shape` into the shape's xi space.
    ///
    /// Returns `None` if the face number is out of range.
    fn face_affine_transform(&self, shape: ShapeId, face: usize) -> Option<FaceTransform>;
}

/// Issues stable node and element identifiers.
pub trait IdentifierAllocator {
    /// Allocate the next free node identifier.
    fn allocate_node_identifier(&mut self) -> NodeId;

    /// Return a node identifier to the pool.
    fn free_node_identifier(&mut self, id: NodeId);

    /// Allocate the next free element identifier of `dimension`.
    fn allocate_element_identifier(&mut self, dimension: u8) -> ElementId;

    /// Return an element identifier to the pool.
    fn free_element_identifier(&mut self, id: ElementId);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn face_transform_maps_line_onto_square_edge() {
        // Face xi1 = 1 of a square: parent = (1, s).
        let t = FaceTransform::new(2, 1, vec![1.0, 0.0, 0.0, 1.0]).unwrap();
        assert_eq!(t.apply(&[0.25]).as_slice(), &[1.0, 0.25]);
    }

    #[test]
    fn face_transform_rejects_wrong_coefficient_count() {
        assert!(FaceTransform::new(3, 2, vec![0.0; 8]).is_none());
    }
}
