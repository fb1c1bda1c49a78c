//! DOF maps: how an element obtains each basis coefficient.

use std::collections::HashMap;
use std::rc::Rc;

use log::debug;

use fedof_core::{EvaluationError, NodeId};
use fedof_field::NodeHandle;

use crate::cache::DofCache;
use crate::grid::GridDofMap;
use crate::node_scale::NodeScaleInfo;

/// One value stored at one of the element's local nodes, optionally
/// multiplied by a scale factor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeDofMap {
    /// Index into the element's local node array.
    pub local_node: usize,
    /// Value or derivative stored at the node.
    pub value_kind: usize,
    /// Version of the value.
    pub version: usize,
    /// Index within the component's scale factor set, if scaled.
    pub scale_factor_index: Option<usize>,
}

/// A source of one basis coefficient.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DofMap {
    /// A single node value.
    Node(NodeDofMap),
    /// The sum of several maps, for linear combinations such as hanging nodes.
    Sum(Vec<DofMap>),
    /// A corner of the lattice cell of a grid-based field.
    Grid(GridDofMap),
}

impl DofMap {
    /// Unscaled map to `value_kind` of `version` at `local_node`.
    pub fn node(local_node: usize, value_kind: usize, version: usize) -> Self {
        Self::Node(NodeDofMap {
            local_node,
            value_kind,
            version,
            scale_factor_index: None,
        })
    }

    /// Map to a node value scaled by factor `scale_factor_index`.
    pub fn scaled_node(local_node: usize, value_kind: usize, version: usize, scale_factor_index: usize) -> Self {
        Self::Node(NodeDofMap {
            local_node,
            value_kind,
            version,
            scale_factor_index: Some(scale_factor_index),
        })
    }

    /// Sum of `maps`.
    pub fn sum(maps: impl IntoIterator<Item = DofMap>) -> Self {
        Self::Sum(maps.into_iter().collect())
    }

    /// The coefficient this map produces.
    ///
    /// Nothing is written while evaluating, so repeated evaluation with
    /// the same cache state gives the same value.
    pub fn evaluate(&self, cache: &mut DofCache<'_>) -> Result<f64, EvaluationError> {
        match self {
            Self::Node(map) => map.evaluate(cache),
            Self::Sum(maps) => maps
                .iter()
                .try_fold(0.0, |total, map| map.evaluate(cache).map(|value| total + value)),
            Self::Grid(map) => map.evaluate(cache),
        }
    }

    /// The node the coefficient comes from. For a sum this is the first
    /// contributing node only; grid maps have none.
    pub fn evaluate_node(&self, cache: &DofCache<'_>) -> Result<Option<NodeHandle>, EvaluationError> {
        match self {
            Self::Node(map) => Ok(Some(Rc::clone(cache.node_scale().node(map.local_node)?))),
            Self::Sum(maps) => match maps.first() {
                Some(first) => first.evaluate_node(cache),
                None => Ok(None),
            },
            Self::Grid(_) => Ok(None),
        }
    }

    /// Structural equality, local node indices compared as numbers.
    pub fn matches(&self, other: &DofMap) -> bool {
        self == other
    }

    /// Whether this map, on the target side of `info`, reads the same
    /// values as `other` on the source side. Local node indices are
    /// compared through the nodes they hold, and source scale factor
    /// indices are shifted by the cache's offset.
    pub fn matches_with_info(&self, other: &DofMap, info: &mut DofMatchCache<'_>) -> bool {
        match (self, other) {
            (Self::Node(a), Self::Node(b)) => {
                a.value_kind == b.value_kind
                    && a.version == b.version
                    && info.same_scale_factor(a.scale_factor_index, b.scale_factor_index)
                    && info.same_node(a.local_node, b.local_node)
            }
            (Self::Sum(a), Self::Sum(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.matches_with_info(y, info))
            }
            (Self::Grid(a), Self::Grid(b)) => a == b,
            _ => false,
        }
    }

    /// This map with local node indices re-expressed against `target`'s
    /// node array. The map's indices refer to `source`.
    ///
    /// A node missing from either side keeps its old index, so the result
    /// is always usable even for degenerate or embedded definitions.
    pub fn clone_with_new_node_indices(&self, target: &NodeScaleInfo, source: &NodeScaleInfo) -> DofMap {
        match self {
            Self::Node(map) => {
                let relocated = source
                    .node_id(map.local_node)
                    .and_then(|id| target.local_node_of(id));
                match relocated {
                    Some(local_node) => Self::Node(NodeDofMap { local_node, ..*map }),
                    None => {
                        debug!(
                            "dof map: local node {} has no counterpart in the target, index kept",
                            map.local_node
                        );
                        Self::Node(*map)
                    }
                }
            }
            Self::Sum(maps) => Self::Sum(
                maps.iter()
                    .map(|map| map.clone_with_new_node_indices(target, source))
                    .collect(),
            ),
            Self::Grid(map) => Self::Grid(map.clone()),
        }
    }

    /// Flag every local node this map reads. Indices past the end of
    /// `in_use` are ignored.
    pub fn set_local_node_in_use(&self, in_use: &mut [bool]) {
        match self {
            Self::Node(map) => {
                if let Some(flag) = in_use.get_mut(map.local_node) {
                    *flag = true;
                }
            }
            Self::Sum(maps) => maps.iter().for_each(|map| map.set_local_node_in_use(in_use)),
            Self::Grid(_) => {}
        }
    }

    /// Call `visit` on every node map, depth first.
    pub fn visit_node_maps<'s>(&'s self, visit: &mut dyn FnMut(&'s NodeDofMap)) {
        match self {
            Self::Node(map) => visit(map),
            Self::Sum(maps) => maps.iter().for_each(|map| map.visit_node_maps(visit)),
            Self::Grid(_) => {}
        }
    }

    /// Whether any part of the map applies a scale factor.
    pub fn uses_scale_factors(&self) -> bool {
        match self {
            Self::Node(map) => map.scale_factor_index.is_some(),
            Self::Sum(maps) => maps.iter().any(DofMap::uses_scale_factors),
            Self::Grid(_) => false,
        }
    }

    /// Shift every scale factor index by `offset`.
    pub fn offset_scale_factors(&self, offset: isize) -> Result<DofMap, EvaluationError> {
        match self {
            Self::Node(map) => {
                let scale_factor_index = map
                    .scale_factor_index
                    .map(|index| {
                        index.checked_add_signed(offset).ok_or_else(|| EvaluationError::InvalidArgument {
                            reason: format!("scale factor index {index} shifted by {offset} is negative"),
                        })
                    })
                    .transpose()?;
                Ok(Self::Node(NodeDofMap {
                    scale_factor_index,
                    ..*map
                }))
            }
            Self::Sum(maps) => Ok(Self::Sum(
                maps.iter()
                    .map(|map| map.offset_scale_factors(offset))
                    .collect::<Result<_, _>>()?,
            )),
            Self::Grid(map) => Ok(Self::Grid(map.clone())),
        }
    }
}

impl NodeDofMap {
    fn evaluate(&self, cache: &mut DofCache<'_>) -> Result<f64, EvaluationError> {
        let handle = cache.node_scale().node(self.local_node)?;
        let node = handle.borrow();
        let (component, time_sequence) = cache.node_component(self.local_node, &node)?;
        let offset = component.value_offset_of(self.value_kind, self.version)?;
        let value = node
            .values()
            .real_value(offset, time_sequence.as_deref(), cache.time())?;
        match self.scale_factor_index {
            Some(index) => Ok(value * cache.scale_factor(index)?),
            None => Ok(value),
        }
    }
}

/// Node and scale factor context for comparing maps across two elements
/// being merged.
#[derive(Debug)]
pub struct DofMatchCache<'a> {
    target: &'a NodeScaleInfo,
    source: &'a NodeScaleInfo,
    scale_factor_offset: isize,
    nodes: HashMap<(usize, usize), bool>,
}

impl<'a> DofMatchCache<'a> {
    /// Compare maps of `target` with maps of `source`, scale factor
    /// indices unshifted.
    pub fn new(target: &'a NodeScaleInfo, source: &'a NodeScaleInfo) -> Self {
        Self {
            target,
            source,
            scale_factor_offset: 0,
            nodes: HashMap::new(),
        }
    }

    /// Shift source scale factor indices by `offset` before comparing.
    pub fn with_scale_factor_offset(mut self, offset: isize) -> Self {
        self.scale_factor_offset = offset;
        self
    }

    fn same_scale_factor(&self, target: Option<usize>, source: Option<usize>) -> bool {
        match (target, source) {
            (None, None) => true,
            (Some(t), Some(s)) => s.checked_add_signed(self.scale_factor_offset) == Some(t),
            _ => false,
        }
    }

    fn same_node(&mut self, target: usize, source: usize) -> bool {
        if let Some(&same) = self.nodes.get(&(target, source)) {
            return same;
        }
        let same = match (self.target.nodes().get(target), self.source.nodes().get(source)) {
            (Some(Some(a)), Some(Some(b))) => Rc::ptr_eq(a, b) || node_id(a) == node_id(b),
            (Some(None), Some(None)) => target == source,
            _ => false,
        };
        self.nodes.insert((target, source), same);
        same
    }
}

fn node_id(node: &NodeHandle) -> NodeId {
    node.borrow().id()
}
