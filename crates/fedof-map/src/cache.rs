//! Evaluation state shared by every DOF map of one element field component.

use std::rc::{Rc, Weak};

use fedof_core::{EvaluationError, FieldId, RangeKind, ScaleFactorSetId, SharedTimeSequence};
use fedof_field::{Node, NodeFieldComponent, NodeFieldInfo};

use crate::grid::GridCell;
use crate::node_scale::NodeScaleInfo;

/// A node's component layout, remembered until the node's descriptor changes.
#[derive(Clone, Debug)]
struct NodeLookup {
    info: Weak<NodeFieldInfo>,
    component: NodeFieldComponent,
    time_sequence: Option<SharedTimeSequence>,
}

/// What a DOF map reads during evaluation: the element's node and scale
/// factor storage, the field component and time being evaluated, and for
/// grid fields the lattice cell containing the evaluation point.
///
/// Node component lookups are memoised per local node and reused for as
/// long as the node keeps the same field descriptor, so evaluating many
/// maps over the same few nodes does not repeat the field search.
#[derive(Debug)]
pub struct DofCache<'a> {
    node_scale: &'a NodeScaleInfo,
    field: FieldId,
    component: usize,
    time: f64,
    scale_factors: Option<&'a [f64]>,
    grid: Option<GridCell>,
    lookups: Vec<Option<NodeLookup>>,
    hits: usize,
    misses: usize,
}

impl<'a> DofCache<'a> {
    /// A cache for evaluating `component` of `field` at `time`, reading
    /// scale factors from `scale_factor_set` if given.
    pub fn new(
        node_scale: &'a NodeScaleInfo,
        field: FieldId,
        component: usize,
        time: f64,
        scale_factor_set: Option<ScaleFactorSetId>,
    ) -> Result<Self, EvaluationError> {
        let scale_factors = match scale_factor_set {
            Some(set) => Some(
                node_scale
                    .scale_factors()
                    .values_for(set)
                    .ok_or(EvaluationError::MissingScaleFactorSet { set })?,
            ),
            None => None,
        };
        Ok(Self {
            node_scale,
            field,
            component,
            time,
            scale_factors,
            grid: None,
            lookups: Vec::new(),
            hits: 0,
            misses: 0,
        })
    }

    /// Attach the lattice cell grid maps read from.
    pub fn with_grid_cell(mut self, cell: GridCell) -> Self {
        self.grid = Some(cell);
        self
    }

    /// Switch to another component of the same field, with its own set.
    pub fn set_component(
        &mut self,
        component: usize,
        scale_factor_set: Option<ScaleFactorSetId>,
    ) -> Result<(), EvaluationError> {
        self.scale_factors = match scale_factor_set {
            Some(set) => Some(
                self.node_scale
                    .scale_factors()
                    .values_for(set)
                    .ok_or(EvaluationError::MissingScaleFactorSet { set })?,
            ),
            None => None,
        };
        if component != self.component {
            self.component = component;
            self.lookups.clear();
        }
        Ok(())
    }

    /// Change the evaluation time. Node lookups stay valid.
    pub fn set_time(&mut self, time: f64) {
        self.time = time;
    }

    /// Replace the lattice cell.
    pub fn set_grid_cell(&mut self, cell: Option<GridCell>) {
        self.grid = cell;
    }

    /// The field being evaluated.
    pub fn field(&self) -> FieldId {
        self.field
    }

    /// The component being evaluated.
    pub fn component(&self) -> usize {
        self.component
    }

    /// The evaluation time.
    pub fn time(&self) -> f64 {
        self.time
    }

    /// The element storage maps read from.
    pub fn node_scale(&self) -> &'a NodeScaleInfo {
        self.node_scale
    }

    /// The lattice cell, if one was attached.
    pub fn grid_cell(&self) -> Option<&GridCell> {
        self.grid.as_ref()
    }

    /// Factor `index` of the component's scale factor set.
    pub fn scale_factor(&self, index: usize) -> Result<f64, EvaluationError> {
        let factors = self
            .scale_factors
            .ok_or_else(|| EvaluationError::InvalidArgument {
                reason: format!(
                    "scale factor {index} requested but component {} of field {} has no scale factor set",
                    self.component, self.field
                ),
            })?;
        factors.get(index).copied().ok_or(EvaluationError::OutOfRange {
            kind: RangeKind::ScaleFactor,
            index,
            limit: factors.len(),
        })
    }

    /// Memoised lookups reused, and lookups that searched the descriptor.
    pub fn lookup_counts(&self) -> (usize, usize) {
        (self.hits, self.misses)
    }

    /// The placed component and time sequence of the evaluated field at
    /// `node`, which sits in slot `local_node`.
    pub(crate) fn node_component(
        &mut self,
        local_node: usize,
        node: &Node,
    ) -> Result<(NodeFieldComponent, Option<SharedTimeSequence>), EvaluationError> {
        let info = node.field_info();
        if let Some(Some(lookup)) = self.lookups.get(local_node) {
            if lookup.info.upgrade().is_some_and(|cached| Rc::ptr_eq(&cached, info)) {
                self.hits += 1;
                return Ok((lookup.component, lookup.time_sequence.clone()));
            }
        }
        let node_field = node.node_field(self.field)?;
        let component = *node_field.component(self.component)?;
        let time_sequence = node_field.time_sequence().cloned();
        if self.lookups.len() <= local_node {
            self.lookups.resize(local_node + 1, None);
        }
        self.lookups[local_node] = Some(NodeLookup {
            info: Rc::downgrade(info),
            component,
            time_sequence: time_sequence.clone(),
        });
        self.misses += 1;
        Ok((component, time_sequence))
    }
}
