//! Per-component element field definitions.

use smallvec::SmallVec;

use fedof_core::{BasisId, ScaleFactorSetId};
use fedof_map::{number_of_grid_values, DofMap, GridDofMap};

/// A grid-based component's lattice and where its values start in the
/// element's value block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GridLayout {
    /// Cells per xi direction; 0 means constant along that direction.
    pub number_in_xi: SmallVec<[usize; 3]>,
    /// Offset of the first lattice value in the element's value block.
    pub value_offset: usize,
}

impl GridLayout {
    /// Number of lattice values.
    pub fn number_of_values(&self) -> usize {
        number_of_grid_values(&self.number_in_xi)
    }
}

/// How one component of a field is obtained on an element: its basis,
/// the scale factor set its maps index into, and one DOF map per basis
/// function.
#[derive(Clone, Debug, PartialEq)]
pub struct ElementFieldComponent {
    basis: BasisId,
    scale_factor_set: Option<ScaleFactorSetId>,
    maps: Vec<DofMap>,
    grid: Option<GridLayout>,
}

impl ElementFieldComponent {
    /// A component whose coefficients come from `maps`, scaled by factors
    /// from `scale_factor_set` where a map asks for one.
    pub fn node_based(basis: BasisId, scale_factor_set: Option<ScaleFactorSetId>, maps: Vec<DofMap>) -> Self {
        Self {
            basis,
            scale_factor_set,
            maps,
            grid: None,
        }
    }

    /// A component stored on a lattice of `number_in_xi` cells in the
    /// element's own values. The lattice is placed when the field is
    /// defined on an element.
    pub fn grid_based(basis: BasisId, number_in_xi: &[usize]) -> Self {
        let mut component = Self {
            basis,
            scale_factor_set: None,
            maps: Vec::new(),
            grid: Some(GridLayout {
                number_in_xi: SmallVec::from_slice(number_in_xi),
                value_offset: 0,
            }),
        };
        component.place_grid(0);
        component
    }

    /// The basis the component's coefficients are blended through.
    pub fn basis(&self) -> BasisId {
        self.basis
    }

    /// The scale factor set maps index into.
    pub fn scale_factor_set(&self) -> Option<ScaleFactorSetId> {
        self.scale_factor_set
    }

    /// One map per basis function.
    pub fn maps(&self) -> &[DofMap] {
        &self.maps
    }

    /// Number of maps.
    pub fn number_of_maps(&self) -> usize {
        self.maps.len()
    }

    /// The lattice, for grid-based components.
    pub fn grid(&self) -> Option<&GridLayout> {
        self.grid.as_ref()
    }

    /// Whether the component is grid-based.
    pub fn is_grid_based(&self) -> bool {
        self.grid.is_some()
    }

    /// Values the component stores in the element's own value block.
    pub fn number_of_element_values(&self) -> usize {
        self.grid.as_ref().map_or(0, GridLayout::number_of_values)
    }

    /// The same component with `maps` in place of its own.
    pub fn with_maps(&self, maps: Vec<DofMap>) -> Self {
        Self {
            maps,
            ..self.clone()
        }
    }

    /// The same component reading scale factors from `set`.
    pub fn with_scale_factor_set(&self, set: Option<ScaleFactorSetId>) -> Self {
        Self {
            scale_factor_set: set,
            ..self.clone()
        }
    }

    /// Mark local nodes referenced by any map.
    pub fn set_local_node_in_use(&self, in_use: &mut [bool]) {
        for map in &self.maps {
            map.set_local_node_in_use(in_use);
        }
    }

    /// Move the lattice to `value_offset`, rebuilding the corner maps.
    pub(crate) fn place_grid(&mut self, value_offset: usize) {
        if let Some(grid) = &mut self.grid {
            grid.value_offset = value_offset;
            self.maps = GridDofMap::corner_maps(&grid.number_in_xi, value_offset);
        }
    }
}
