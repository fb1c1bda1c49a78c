//! Grid-based DOFs: values on a regular lattice over the element.
//!
//! A grid field divides the element into `number_in_xi[d]` cells along
//! each xi direction and stores one value per lattice point in the
//! element's own value block, xi0 varying fastest. Evaluation locates the
//! cell containing xi and interpolates linearly between its corners, so a
//! grid component carries one [`GridDofMap`] per cell corner.

use smallvec::SmallVec;

use fedof_core::{EvaluationError, RangeKind, Xi};

use crate::cache::DofCache;
use crate::map::DofMap;

/// The lattice cell containing an xi location, and xi within that cell.
#[derive(Clone, Debug, PartialEq)]
pub struct GridCell {
    /// Cell index along each xi direction.
    pub cell: SmallVec<[usize; 3]>,
    /// Position within the cell, 0 to 1 along each direction inside the element.
    pub local_xi: Xi,
}

impl GridCell {
    /// Locate `xi` on a lattice of `number_in_xi` cells per direction.
    ///
    /// Locations outside the element use the nearest cell, so `local_xi`
    /// then lies outside `[0, 1]`. Directions with no cells have a single
    /// lattice point.
    pub fn locate(number_in_xi: &[usize], xi: &[f64]) -> Result<Self, EvaluationError> {
        if xi.len() < number_in_xi.len() {
            return Err(EvaluationError::InvalidArgument {
                reason: format!(
                    "{} xi coordinates given for a {}-dimensional grid",
                    xi.len(),
                    number_in_xi.len()
                ),
            });
        }
        let mut cell = SmallVec::new();
        let mut local_xi = Xi::new();
        for (&n, &x) in number_in_xi.iter().zip(xi) {
            if n == 0 {
                cell.push(0);
                local_xi.push(0.0);
                continue;
            }
            let scaled = x * n as f64;
            let index = (scaled.floor().max(0.0) as usize).min(n - 1);
            cell.push(index);
            local_xi.push(scaled - index as f64);
        }
        Ok(Self { cell, local_xi })
    }
}

/// One corner of the lattice cell being evaluated.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct GridDofMap {
    number_in_xi: SmallVec<[usize; 3]>,
    value_offset: usize,
    corner: SmallVec<[usize; 3]>,
}

impl GridDofMap {
    /// The map reading corner `corner` (0 or 1 per direction) of whichever
    /// cell is being evaluated, on a lattice whose values start at
    /// `value_offset` in the element's value block.
    pub fn new(number_in_xi: &[usize], value_offset: usize, corner: &[usize]) -> Result<Self, EvaluationError> {
        if corner.len() != number_in_xi.len() {
            return Err(EvaluationError::InvalidArgument {
                reason: format!(
                    "grid corner has {} coordinates for a {}-dimensional grid",
                    corner.len(),
                    number_in_xi.len()
                ),
            });
        }
        if let Some(d) = corner
            .iter()
            .zip(number_in_xi)
            .position(|(&c, &n)| c > 1 || (n == 0 && c != 0))
        {
            return Err(EvaluationError::InvalidArgument {
                reason: format!("grid corner coordinate {d} is out of range"),
            });
        }
        Ok(Self {
            number_in_xi: SmallVec::from_slice(number_in_xi),
            value_offset,
            corner: SmallVec::from_slice(corner),
        })
    }

    /// One map per cell corner, xi0 varying fastest. Directions with no
    /// cells contribute no corners.
    pub fn corner_maps(number_in_xi: &[usize], value_offset: usize) -> Vec<DofMap> {
        let active: Vec<usize> = (0..number_in_xi.len())
            .filter(|&d| number_in_xi[d] > 0)
            .collect();
        (0..1usize << active.len())
            .map(|bits| {
                let mut corner: SmallVec<[usize; 3]> = SmallVec::from_elem(0, number_in_xi.len());
                for (bit, &d) in active.iter().enumerate() {
                    corner[d] = (bits >> bit) & 1;
                }
                DofMap::Grid(Self {
                    number_in_xi: SmallVec::from_slice(number_in_xi),
                    value_offset,
                    corner,
                })
            })
            .collect()
    }

    /// Cells per xi direction.
    pub fn number_in_xi(&self) -> &[usize] {
        &self.number_in_xi
    }

    /// Offset of the first lattice value in the element's value block.
    pub fn value_offset(&self) -> usize {
        self.value_offset
    }

    /// Which corner of the cell this map reads.
    pub fn corner(&self) -> &[usize] {
        &self.corner
    }

    /// Number of lattice points: the product of `number_in_xi[d] + 1`.
    pub fn number_of_grid_values(&self) -> usize {
        number_of_grid_values(&self.number_in_xi)
    }

    /// Index among the lattice values of this corner of `cell`.
    pub fn grid_point_index(&self, cell: &[usize]) -> Result<usize, EvaluationError> {
        let mut index = 0;
        let mut stride = 1;
        for ((&n, &c), &k) in self.number_in_xi.iter().zip(&self.corner).zip(cell) {
            let point = k + c;
            if point > n {
                return Err(EvaluationError::OutOfRange {
                    kind: RangeKind::GridPoint,
                    index: point,
                    limit: n + 1,
                });
            }
            index += point * stride;
            stride *= n + 1;
        }
        Ok(index)
    }

    pub(crate) fn evaluate(&self, cache: &DofCache<'_>) -> Result<f64, EvaluationError> {
        let cell = cache.grid_cell().ok_or_else(|| EvaluationError::InvalidArgument {
            reason: "grid DOF evaluated without a located grid cell".into(),
        })?;
        let index = self.grid_point_index(&cell.cell)?;
        let values = cache.node_scale().values();
        if self.value_offset + self.number_of_grid_values() > values.len() {
            return Err(EvaluationError::OutOfRange {
                kind: RangeKind::GridPoint,
                index: self.value_offset + index,
                limit: values.len(),
            });
        }
        Ok(values.real_value(self.value_offset + index, None, cache.time())?)
    }
}

/// Number of lattice points for `number_in_xi` cells per direction.
pub fn number_of_grid_values(number_in_xi: &[usize]) -> usize {
    number_in_xi.iter().map(|n| n + 1).product()
}
