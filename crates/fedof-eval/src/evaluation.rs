//! Blended coefficients of one field on one element, cached per time.
//!
//! [`ElementFieldEvaluation::calculate`] runs every DOF map of every
//! component once and hands the raw coefficients to the basis for
//! blending. Later calls for the same field, element and time reuse them
//! until the defining element's field descriptor changes. Grid-based
//! components keep a snapshot of their lattice instead, since the cell
//! depends on where they are evaluated.

use std::borrow::Cow;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

use log::debug;
use smallvec::SmallVec;

use fedof_core::{
    BasisId, BasisProvider, EvaluationError, FieldId, RangeKind, ShapeProvider, Xi,
};
use fedof_element::{Element, ElementFieldComponent, ElementFieldInfo, ElementHandle};
use fedof_map::{DofCache, DofMap, GridCell, GridDofMap};

use crate::config::EvalConfig;
use crate::inherit::{find_field_source, FieldSource};

/// A component's value and its derivatives with respect to xi.
#[derive(Clone, Debug, PartialEq)]
pub struct ComponentValue {
    /// Interpolated value.
    pub value: f64,
    /// First derivative along each xi direction of the evaluated element.
    pub derivatives: Xi,
}

#[derive(Clone, Debug)]
enum Coefficients {
    Blended(Vec<f64>),
    Grid {
        number_in_xi: SmallVec<[usize; 3]>,
        corners: Vec<GridDofMap>,
        lattice: Vec<f64>,
    },
}

#[derive(Clone, Debug)]
struct ComponentCoefficients {
    basis: BasisId,
    coefficients: Coefficients,
}

#[derive(Debug)]
struct Calculated {
    field: FieldId,
    element: Weak<RefCell<Element>>,
    time: f64,
    descriptor: Weak<ElementFieldInfo>,
    source: FieldSource,
    components: Vec<ComponentCoefficients>,
}

/// Cached evaluation of one field on one element.
#[derive(Debug, Default)]
pub struct ElementFieldEvaluation {
    calculated: Option<Calculated>,
}

impl ElementFieldEvaluation {
    /// An evaluation with nothing calculated.
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepare `field` on `element` at `time`, inheriting the definition
    /// from a parent element if `element` does not define it.
    ///
    /// Does nothing if the same field, element and time are already
    /// prepared and the defining element's descriptor is unchanged. On
    /// failure the previous preparation is discarded.
    #[allow(clippy::too_many_arguments)]
    pub fn calculate(
        &mut self,
        field: FieldId,
        element: &ElementHandle,
        time: f64,
        basis: &dyn BasisProvider,
        shape: &dyn ShapeProvider,
        config: &EvalConfig,
    ) -> Result<(), EvaluationError> {
        if self.is_calculated_for(field, element, time, config) {
            return Ok(());
        }
        self.calculated = None;
        let source = find_field_source(element, field, shape, config.max_inheritance_depth)?
            .ok_or(EvaluationError::FieldNotDefined { field, node: None })?;
        let (components, descriptor) = {
            let owner = source.element.borrow();
            let definition = owner
                .field_info()
                .field(field)
                .ok_or(EvaluationError::FieldNotDefined { field, node: None })?;
            let components = definition
                .components()
                .iter()
                .enumerate()
                .map(|(index, component)| coefficients(&owner, field, index, component, time, basis))
                .collect::<Result<Vec<_>, _>>()?;
            (components, Rc::downgrade(owner.field_info()))
        };
        debug!(
            "evaluation: field {field} on element {} at time {time} ({} components{})",
            element.borrow().id(),
            components.len(),
            if source.is_direct() { "" } else { ", inherited" }
        );
        self.calculated = Some(Calculated {
            field,
            element: Rc::downgrade(element),
            time,
            descriptor,
            source,
            components,
        });
        Ok(())
    }

    /// Whether `calculate` would reuse the current preparation.
    pub fn is_calculated_for(&self, field: FieldId, element: &ElementHandle, time: f64, config: &EvalConfig) -> bool {
        let Some(calculated) = &self.calculated else {
            return false;
        };
        let same_time = (calculated.time - time).abs() <= config.time.index_tolerance * time.abs().max(1.0);
        calculated.field == field
            && same_time
            && calculated.element.upgrade().is_some_and(|e| Rc::ptr_eq(&e, element))
            && calculated.descriptor.upgrade().is_some_and(|descriptor| {
                Rc::ptr_eq(&descriptor, calculated.source.element.borrow().field_info())
            })
    }

    /// Forget the preparation, e.g. after node values changed.
    pub fn clear(&mut self) {
        self.calculated = None;
    }

    /// The element whose definition is in use, if prepared.
    pub fn defining_element(&self) -> Option<&ElementHandle> {
        self.calculated.as_ref().map(|c| &c.source.element)
    }

    /// Number of components prepared.
    pub fn number_of_components(&self) -> usize {
        self.calculated.as_ref().map_or(0, |c| c.components.len())
    }

    /// Blended coefficients of a node-based component.
    pub fn blended_coefficients(&self, component: usize) -> Option<&[f64]> {
        match &self.component(component).ok()?.coefficients {
            Coefficients::Blended(blended) => Some(blended),
            Coefficients::Grid { .. } => None,
        }
    }

    /// Every component's value at `xi` in the evaluated element.
    pub fn evaluate(&self, xi: &[f64], basis: &dyn BasisProvider) -> Result<Vec<f64>, EvaluationError> {
        let calculated = self.prepared()?;
        let xi = calculated.source.map_xi(xi);
        calculated
            .components
            .iter()
            .map(|component| {
                let (basis_xi, blended) = component.at(&xi, basis)?;
                basis.interpolate(component.basis, &blended, &basis_xi)
            })
            .collect()
    }

    /// Every component's value and derivatives at `xi`.
    ///
    /// Derivatives are with respect to the evaluated element's xi, carried
    /// back through any face transforms.
    pub fn evaluate_with_derivatives(
        &self,
        xi: &[f64],
        basis: &dyn BasisProvider,
    ) -> Result<Vec<ComponentValue>, EvaluationError> {
        let calculated = self.prepared()?;
        let mapped = calculated.source.map_xi(xi);
        calculated
            .components
            .iter()
            .map(|component| {
                let (basis_xi, blended) = component.at(&mapped, basis)?;
                let value = basis.interpolate(component.basis, &blended, &basis_xi)?;
                let local = basis.interpolate_derivatives(component.basis, &blended, &basis_xi)?;
                let derivatives = component.element_derivatives(&local, mapped.len());
                Ok(ComponentValue {
                    value,
                    derivatives: calculated.source.pull_back(&derivatives),
                })
            })
            .collect()
    }

    fn prepared(&self) -> Result<&Calculated, EvaluationError> {
        self.calculated.as_ref().ok_or_else(|| EvaluationError::InvalidArgument {
            reason: "element field evaluation used before calculate".into(),
        })
    }

    fn component(&self, component: usize) -> Result<&ComponentCoefficients, EvaluationError> {
        let calculated = self.prepared()?;
        calculated
            .components
            .get(component)
            .ok_or(EvaluationError::OutOfRange {
                kind: RangeKind::Component,
                index: component,
                limit: calculated.components.len(),
            })
    }
}

impl ComponentCoefficients {
    /// Coordinates to hand the basis and the blended coefficients there.
    fn at(&self, xi: &[f64], basis: &dyn BasisProvider) -> Result<(Xi, Cow<'_, [f64]>), EvaluationError> {
        match &self.coefficients {
            Coefficients::Blended(blended) => Ok((Xi::from_slice(xi), Cow::Borrowed(blended))),
            Coefficients::Grid {
                number_in_xi,
                corners,
                lattice,
            } => {
                let cell = GridCell::locate(number_in_xi, xi)?;
                let raw = corners
                    .iter()
                    .map(|corner| {
                        let index = corner.grid_point_index(&cell.cell)?;
                        lattice.get(index).copied().ok_or(EvaluationError::OutOfRange {
                            kind: RangeKind::GridPoint,
                            index,
                            limit: lattice.len(),
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                let active = cell
                    .local_xi
                    .iter()
                    .zip(number_in_xi)
                    .filter_map(|(&x, &n)| (n > 0).then_some(x))
                    .collect();
                Ok((active, Cow::Owned(basis.blend(self.basis, &raw)?)))
            }
        }
    }

    /// Spread basis derivatives over the element's xi directions. Grid
    /// bases see cell coordinates along their active directions only.
    fn element_derivatives(&self, local: &[f64], dimension: usize) -> Xi {
        match &self.coefficients {
            Coefficients::Blended(_) => Xi::from_slice(local),
            Coefficients::Grid { number_in_xi, .. } => {
                let mut active = local.iter();
                (0..dimension)
                    .map(|d| match number_in_xi.get(d) {
                        Some(&n) if n > 0 => active.next().map_or(0.0, |&v| v * n as f64),
                        _ => 0.0,
                    })
                    .collect()
            }
        }
    }
}

fn coefficients(
    element: &Element,
    field: FieldId,
    index: usize,
    component: &ElementFieldComponent,
    time: f64,
    basis: &dyn BasisProvider,
) -> Result<ComponentCoefficients, EvaluationError> {
    let coefficients = match component.grid() {
        Some(grid) => Coefficients::Grid {
            number_in_xi: grid.number_in_xi.clone(),
            corners: component
                .maps()
                .iter()
                .filter_map(|map| match map {
                    DofMap::Grid(corner) => Some(corner.clone()),
                    _ => None,
                })
                .collect(),
            lattice: (grid.value_offset..grid.value_offset + grid.number_of_values())
                .map(|offset| element.grid_values().real_value(offset, None, time))
                .collect::<Result<_, _>>()?,
        },
        None => {
            let raw = map_values(element, field, index, component, time)?;
            Coefficients::Blended(basis.blend(component.basis(), &raw)?)
        }
    };
    Ok(ComponentCoefficients {
        basis: component.basis(),
        coefficients,
    })
}

fn map_values(
    element: &Element,
    field: FieldId,
    index: usize,
    component: &ElementFieldComponent,
    time: f64,
) -> Result<Vec<f64>, EvaluationError> {
    let mut cache = DofCache::new(element.node_scale(), field, index, time, component.scale_factor_set())?;
    component
        .maps()
        .iter()
        .map(|map| map.evaluate(&mut cache))
        .collect()
}

/// Raw per-basis-function coefficients of one component of `field` as
/// defined on `element` itself, before blending.
///
/// Grid-based components yield every lattice value instead.
pub fn element_values(
    field: FieldId,
    component: usize,
    element: &Element,
    time: f64,
) -> Result<Vec<f64>, EvaluationError> {
    let definition = element.field_component(field, component)?;
    match definition.grid() {
        Some(grid) => (grid.value_offset..grid.value_offset + grid.number_of_values())
            .map(|offset| Ok(element.grid_values().real_value(offset, None, time)?))
            .collect(),
        None => map_values(element, field, component, definition, time),
    }
}
