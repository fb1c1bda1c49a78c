//! Elements: identity, shape, parents, node and scale factor storage, and
//! the shared descriptor of the fields defined on them.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use log::debug;

use fedof_core::{
    BasisProvider, DescriptorError, ElementId, ElementRef, EvaluationError, FieldId, ShapeId,
};
use fedof_field::{Registry, SharedFieldDef};
use fedof_map::{NodeDofMap, NodeScaleInfo};
use fedof_storage::{StorageConfig, ValueBlock};

use crate::component::ElementFieldComponent;
use crate::info::{ElementField, ElementFieldInfo};

/// Registry of element field descriptors, owned by a mesh.
pub type ElementFieldInfoRegistry = Registry<ElementFieldInfo>;

/// Shared handle to an element. Faces refer to their parents through it.
pub type ElementHandle = Rc<RefCell<Element>>;

/// A parent element and the face number this element occupies on it.
#[derive(Clone, Debug)]
pub struct ParentLink {
    element: Weak<RefCell<Element>>,
    face: usize,
}

impl ParentLink {
    /// The parent, if it still exists.
    pub fn element(&self) -> Option<ElementHandle> {
        self.element.upgrade()
    }

    /// Face number of this element on the parent.
    pub fn face(&self) -> usize {
        self.face
    }
}

/// An element of a mesh.
///
/// The element owns its [`NodeScaleInfo`] exclusively and shares its field
/// descriptor with identically defined elements.
#[derive(Debug)]
pub struct Element {
    identity: ElementRef,
    shape: ShapeId,
    parents: Vec<ParentLink>,
    node_scale: NodeScaleInfo,
    fields: Rc<ElementFieldInfo>,
}

impl Element {
    /// An element with `node_count` empty local node slots and no fields.
    pub fn new(
        identity: ElementRef,
        shape: ShapeId,
        node_count: usize,
        registry: &mut ElementFieldInfoRegistry,
    ) -> Self {
        Self {
            identity,
            shape,
            parents: Vec::new(),
            node_scale: NodeScaleInfo::new(node_count),
            fields: registry.adopt(ElementFieldInfo::new()),
        }
    }

    /// Wrap the element in a shared handle.
    pub fn into_handle(self) -> ElementHandle {
        Rc::new(RefCell::new(self))
    }

    /// The counted identity element-xi values refer to.
    pub fn identity(&self) -> &ElementRef {
        &self.identity
    }

    /// The element identifier.
    pub fn id(&self) -> ElementId {
        self.identity.id()
    }

    /// The element's shape.
    pub fn shape(&self) -> ShapeId {
        self.shape
    }

    /// Parent elements this element is a face of.
    pub fn parents(&self) -> &[ParentLink] {
        &self.parents
    }

    /// Record that this element is face `face` of `parent`.
    pub fn add_parent(&mut self, parent: &ElementHandle, face: usize) {
        self.parents.push(ParentLink {
            element: Rc::downgrade(parent),
            face,
        });
    }

    /// Node, scale factor and grid value storage.
    pub fn node_scale(&self) -> &NodeScaleInfo {
        &self.node_scale
    }

    /// Mutable node, scale factor and grid value storage.
    pub fn node_scale_mut(&mut self) -> &mut NodeScaleInfo {
        &mut self.node_scale
    }

    /// The element's field descriptor.
    pub fn field_info(&self) -> &Rc<ElementFieldInfo> {
        &self.fields
    }

    /// Whether `field` is defined on the element itself.
    pub fn has_field(&self, field: FieldId) -> bool {
        self.fields.has_field(field)
    }

    /// Component `component` of `field` as defined on this element.
    pub fn field_component(&self, field: FieldId, component: usize) -> Result<&ElementFieldComponent, EvaluationError> {
        self.fields.component(field, component)
    }

    /// Swap in a new descriptor and node/scale storage, returning the old.
    pub fn replace_definition(
        &mut self,
        fields: Rc<ElementFieldInfo>,
        node_scale: NodeScaleInfo,
    ) -> (Rc<ElementFieldInfo>, NodeScaleInfo) {
        (
            std::mem::replace(&mut self.fields, fields),
            std::mem::replace(&mut self.node_scale, node_scale),
        )
    }

    /// Define `field` on the element with one entry per component.
    ///
    /// Each component needs exactly as many maps as its basis has
    /// functions, maps may only reference existing local nodes and factors
    /// of a declared scale factor set, and grid components need a numeric
    /// field. Grid values are appended to the element's values as zeros.
    /// A descriptor only this element uses is changed in place. On failure
    /// the element is unchanged.
    pub fn define_field(
        &mut self,
        field: &SharedFieldDef,
        components: Vec<ElementFieldComponent>,
        basis: &dyn BasisProvider,
        registry: &mut ElementFieldInfoRegistry,
        config: &StorageConfig,
    ) -> Result<(), DescriptorError> {
        for component in &components {
            self.check_component(field, component, basis)?;
        }
        if self.fields.number_of_values() != self.node_scale.values().len() {
            return Err(DescriptorError::InvalidArgument {
                reason: format!(
                    "element {} descriptor expects {} values but holds {}",
                    self.id(),
                    self.fields.number_of_values(),
                    self.node_scale.values().len()
                ),
            });
        }
        let start = self.fields.number_of_values();
        let count: usize = components
            .iter()
            .map(ElementFieldComponent::number_of_element_values)
            .sum();
        if count > 0 {
            self.node_scale
                .values_mut()
                .extend(field.value_type(), None, count, config)?;
        }
        let defined = ElementField::new(SharedFieldDef::clone(field), components);
        if let Err(err) = registry.edit(&mut self.fields, |info| info.add_field(defined)) {
            if count > 0 {
                self.node_scale.values_mut().remove(start, count)?;
            }
            return Err(err);
        }
        debug!("defined field {} on element {} ({count} grid values)", field, self.id());
        Ok(())
    }

    /// Remove `field` from the element, discarding its grid values.
    pub fn undefine_field(
        &mut self,
        field: FieldId,
        registry: &mut ElementFieldInfoRegistry,
    ) -> Result<(), DescriptorError> {
        let removed = self
            .fields
            .field(field)
            .ok_or(DescriptorError::FieldNotDefined { field })?;
        let mut ranges: Vec<_> = removed
            .components()
            .iter()
            .filter_map(|c| c.grid().map(|g| (g.value_offset, g.number_of_values())))
            .collect();
        ranges.sort_unstable_by(|a, b| b.0.cmp(&a.0));
        let values = self.node_scale.values_mut();
        if let Some(&(offset, count)) = ranges.iter().find(|&&(o, c)| o + c > values.len()) {
            return Err(fedof_core::StorageError::OffsetOutOfRange {
                offset: offset + count,
                len: values.len(),
            }
            .into());
        }
        for (offset, count) in ranges {
            values.remove(offset, count)?;
        }
        registry.edit(&mut self.fields, |info| info.remove_field(field))?;
        debug!("undefined field {field} on element {}", self.id());
        Ok(())
    }

    /// Local node indices no field's maps reference.
    pub fn unused_local_nodes(&self) -> Vec<usize> {
        let mut in_use = vec![false; self.node_scale.node_count()];
        self.fields.set_local_node_in_use(&mut in_use);
        in_use
            .iter()
            .enumerate()
            .filter_map(|(local, &used)| (!used).then_some(local))
            .collect()
    }

    /// The element's own values, holding every grid-based field.
    pub fn grid_values(&self) -> &ValueBlock {
        self.node_scale.values()
    }

    /// Store lattice point `point` of grid component `component`.
    pub fn set_grid_value(
        &mut self,
        field: FieldId,
        component: usize,
        point: usize,
        value: f64,
    ) -> Result<(), EvaluationError> {
        let grid = self
            .fields
            .component(field, component)?
            .grid()
            .ok_or_else(|| EvaluationError::InvalidArgument {
                reason: format!("component {component} of field {field} is not grid-based"),
            })?;
        if point >= grid.number_of_values() {
            return Err(EvaluationError::OutOfRange {
                kind: fedof_core::RangeKind::GridPoint,
                index: point,
                limit: grid.number_of_values(),
            });
        }
        let offset = grid.value_offset + point;
        Ok(self.node_scale.values_mut().set_real_value(offset, None, 0.0, 0.0, value)?)
    }

    fn check_component(
        &self,
        field: &SharedFieldDef,
        component: &ElementFieldComponent,
        basis: &dyn BasisProvider,
    ) -> Result<(), DescriptorError> {
        let required = basis
            .coefficient_count(component.basis())
            .ok_or_else(|| DescriptorError::InvalidArgument {
                reason: format!("unknown basis {}", component.basis()),
            })?;
        if required != component.number_of_maps() {
            return Err(DescriptorError::InvalidArgument {
                reason: format!(
                    "basis {} of field {} needs {required} DOF maps, {} given",
                    component.basis(),
                    field,
                    component.number_of_maps()
                ),
            });
        }
        if component.is_grid_based() && !field.value_type().is_numeric_scalar() {
            return Err(DescriptorError::InvalidArgument {
                reason: format!("grid-based field {field} must hold numeric scalars"),
            });
        }
        let set_count = match component.scale_factor_set() {
            Some(set) => Some(self.node_scale.scale_factors().set_count(set).ok_or_else(|| {
                DescriptorError::InvalidArgument {
                    reason: format!("scale factor set {set} is not declared on element {}", self.id()),
                }
            })?),
            None => None,
        };
        let node_count = self.node_scale.node_count();
        let mut problem = None;
        for map in component.maps() {
            map.visit_node_maps(&mut |node: &NodeDofMap| {
                if problem.is_some() {
                    return;
                }
                if node.local_node >= node_count {
                    problem = Some(format!(
                        "local node {} out of range for {node_count} nodes",
                        node.local_node
                    ));
                } else if let Some(index) = node.scale_factor_index {
                    match set_count {
                        None => problem = Some("scaled DOF map without a scale factor set".to_string()),
                        Some(count) if index >= count => {
                            problem = Some(format!("scale factor {index} out of range for {count} factors"))
                        }
                        Some(_) => {}
                    }
                }
            });
        }
        match problem {
            Some(reason) => Err(DescriptorError::InvalidArgument {
                reason: format!("field {field}: {reason}"),
            }),
            None => Ok(()),
        }
    }
}
