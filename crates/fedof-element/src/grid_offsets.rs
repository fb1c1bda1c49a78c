//! Grid point numbering of a face relative to its top-level element.

use smallvec::SmallVec;

use fedof_core::{EvaluationError, FaceTransform, MAXIMUM_ELEMENT_XI_DIMENSIONS};

/// How lattice points of a face map onto the lattice of the top-level
/// element the grid field is defined on:
/// `top_level_point = base_offset + sum(offset_in_xi[i] * point[i])`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GridOffsets {
    /// Cells per xi direction of the face.
    pub number_in_xi: SmallVec<[usize; 3]>,
    /// Top-level point number of the face's first lattice point.
    pub base_offset: usize,
    /// Change in top-level point number per step along each face direction.
    pub offset_in_xi: SmallVec<[isize; 3]>,
}

impl GridOffsets {
    /// Top-level point number of face lattice point `point`.
    pub fn top_level_point(&self, point: &[usize]) -> Option<usize> {
        if point.len() != self.number_in_xi.len()
            || point.iter().zip(&self.number_in_xi).any(|(&p, &n)| p > n)
        {
            return None;
        }
        point
            .iter()
            .zip(&self.offset_in_xi)
            .try_fold(self.base_offset as isize, |sum, (&p, &step)| {
                sum.checked_add(step.checked_mul(p as isize)?)
            })
            .and_then(|n| usize::try_from(n).ok())
    }

    /// Number of lattice points on the face.
    pub fn number_of_points(&self) -> usize {
        self.number_in_xi.iter().map(|n| n + 1).product()
    }
}

/// Lattice numbering for an element of `element_dimension` on a grid of
/// `top_level_number_in_xi` cells defined on a top-level element.
///
/// `to_top_level` maps the element's xi into the top-level element and is
/// required unless both have the same dimension. A non-zero constant term
/// marks a direction the element sits at the far end of; a negative
/// coefficient marks a reversed direction.
pub fn calculate_grid_field_offsets(
    element_dimension: usize,
    top_level_number_in_xi: &[usize],
    to_top_level: Option<&FaceTransform>,
) -> Result<GridOffsets, EvaluationError> {
    let top_level_dimension = top_level_number_in_xi.len();
    if element_dimension == 0
        || element_dimension > top_level_dimension
        || top_level_dimension > MAXIMUM_ELEMENT_XI_DIMENSIONS
    {
        return Err(EvaluationError::InvalidArgument {
            reason: format!(
                "cannot number a {element_dimension}-dimensional grid within a {top_level_dimension}-dimensional element"
            ),
        });
    }

    let mut top_level_offset: SmallVec<[isize; 3]> = SmallVec::new();
    let mut next = 1isize;
    for &n in top_level_number_in_xi {
        if n > 0 {
            top_level_offset.push(next);
            next *= n as isize + 1;
        } else {
            // constant along this direction
            top_level_offset.push(0);
        }
    }

    if element_dimension == top_level_dimension {
        return Ok(GridOffsets {
            number_in_xi: SmallVec::from_slice(top_level_number_in_xi),
            base_offset: 0,
            offset_in_xi: top_level_offset,
        });
    }

    let transform = to_top_level
        .filter(|t| t.parent_dimension() == top_level_dimension && t.face_dimension() == element_dimension)
        .ok_or_else(|| EvaluationError::InvalidArgument {
            reason: format!(
                "a {element_dimension}-dimensional face needs a transform into its {top_level_dimension}-dimensional top-level element"
            ),
        })?;

    let mut offsets = GridOffsets {
        number_in_xi: SmallVec::from_elem(0, element_dimension),
        base_offset: 0,
        offset_in_xi: SmallVec::from_elem(0, element_dimension),
    };
    let mut base = 0isize;
    for (i, row) in transform.rows().enumerate() {
        let n = top_level_number_in_xi[i];
        if row[0] != 0.0 {
            base += n as isize * top_level_offset[i];
        }
        for (xi, &coefficient) in row[1..].iter().enumerate() {
            if coefficient != 0.0 {
                offsets.number_in_xi[xi] = n;
                offsets.offset_in_xi[xi] = if coefficient > 0.0 {
                    top_level_offset[i]
                } else {
                    -top_level_offset[i]
                };
            }
        }
    }
    offsets.base_offset = base as usize;
    Ok(offsets)
}
