//! The element field descriptor shared by identically defined elements.

use smallvec::SmallVec;

use fedof_core::{DescriptorError, EvaluationError, FieldId, RangeKind};
use fedof_field::{FieldList, SharedFieldDef};

use crate::component::ElementFieldComponent;

/// One field's definition on an element.
#[derive(Clone, Debug, PartialEq)]
pub struct ElementField {
    field: SharedFieldDef,
    components: SmallVec<[ElementFieldComponent; 3]>,
}

impl ElementField {
    /// Assemble a field definition from its components.
    pub fn new(field: SharedFieldDef, components: impl IntoIterator<Item = ElementFieldComponent>) -> Self {
        Self {
            field,
            components: components.into_iter().collect(),
        }
    }

    /// The field definition.
    pub fn field(&self) -> &SharedFieldDef {
        &self.field
    }

    /// The field identifier.
    pub fn id(&self) -> FieldId {
        self.field.id()
    }

    /// Components in component order.
    pub fn components(&self) -> &[ElementFieldComponent] {
        &self.components
    }

    /// Component `component`.
    pub fn component(&self, component: usize) -> Result<&ElementFieldComponent, EvaluationError> {
        self.components
            .get(component)
            .ok_or(EvaluationError::OutOfRange {
                kind: RangeKind::Component,
                index: component,
                limit: self.components.len(),
            })
    }

    /// Values all grid-based components store in the element's value block.
    pub fn number_of_element_values(&self) -> usize {
        self.components
            .iter()
            .map(ElementFieldComponent::number_of_element_values)
            .sum()
    }

    fn rebase_grids(&mut self, from: usize, delta: isize) {
        for component in &mut self.components {
            let offset = match component.grid() {
                Some(grid) if grid.value_offset >= from => grid.value_offset.saturating_add_signed(delta),
                _ => continue,
            };
            component.place_grid(offset);
        }
    }
}

/// Ordered list of the fields defined on a class of identically defined
/// elements, plus the number of grid values each element stores.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ElementFieldInfo {
    fields: Vec<ElementField>,
    value_count: usize,
}

impl ElementFieldInfo {
    /// A descriptor defining no fields.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field, placing its grid components after every value
    /// already stored. Returns the new element value count.
    pub fn add_field(&mut self, mut field: ElementField) -> Result<usize, DescriptorError> {
        if self.has_field(field.id()) {
            return Err(DescriptorError::FieldAlreadyDefined { field: field.id() });
        }
        if field.components.len() != field.field.component_count() {
            return Err(DescriptorError::ComponentCountMismatch {
                field: field.id(),
                expected: field.field.component_count(),
                found: field.components.len(),
            });
        }
        for component in &mut field.components {
            if component.is_grid_based() {
                component.place_grid(self.value_count);
                self.value_count += component.number_of_element_values();
            }
        }
        self.fields.push(field);
        Ok(self.value_count)
    }

    /// Remove a field, moving later grid values down. Returns the removed
    /// definition with its original offsets.
    pub fn remove_field(&mut self, field: FieldId) -> Result<ElementField, DescriptorError> {
        let position = self
            .fields
            .iter()
            .position(|f| f.id() == field)
            .ok_or(DescriptorError::FieldNotDefined { field })?;
        let removed = self.fields.remove(position);
        let mut ranges: Vec<_> = removed
            .components
            .iter()
            .filter_map(|c| c.grid().map(|g| (g.value_offset, g.number_of_values())))
            .collect();
        ranges.sort_unstable_by(|a, b| b.0.cmp(&a.0));
        for (offset, count) in ranges {
            for other in &mut self.fields {
                other.rebase_grids(offset + count, -(count as isize));
            }
            self.value_count -= count;
        }
        Ok(removed)
    }

    /// Replace the definition of a field already listed, keeping its place.
    /// Grid layouts must be unchanged.
    pub fn replace_field(&mut self, field: ElementField) -> Result<(), DescriptorError> {
        let existing = self
            .fields
            .iter_mut()
            .find(|f| f.id() == field.id())
            .ok_or(DescriptorError::FieldNotDefined { field: field.id() })?;
        let grids = |f: &ElementField| -> Vec<_> {
            f.components
                .iter()
                .map(|c| c.grid().map(|g| g.number_in_xi.clone()))
                .collect()
        };
        if grids(existing) != grids(&field) {
            return Err(DescriptorError::InvalidArgument {
                reason: format!("grid layout of field {} cannot change in place", field.id()),
            });
        }
        let offsets: Vec<usize> = existing
            .components
            .iter()
            .map(|c| c.grid().map_or(0, |g| g.value_offset))
            .collect();
        *existing = field;
        for (component, offset) in existing.components.iter_mut().zip(offsets) {
            component.place_grid(offset);
        }
        Ok(())
    }

    /// Whether `field` is defined.
    pub fn has_field(&self, field: FieldId) -> bool {
        self.fields.iter().any(|f| f.id() == field)
    }

    /// The definition of `field`.
    pub fn field(&self, field: FieldId) -> Option<&ElementField> {
        self.fields.iter().find(|f| f.id() == field)
    }

    /// All definitions, in definition order.
    pub fn fields(&self) -> &[ElementField] {
        &self.fields
    }

    /// Grid values stored by an element using this descriptor.
    pub fn number_of_values(&self) -> usize {
        self.value_count
    }

    /// Component `component` of `field`.
    pub fn component(&self, field: FieldId, component: usize) -> Result<&ElementFieldComponent, EvaluationError> {
        self.field(field)
            .ok_or(EvaluationError::FieldNotDefined { field, node: None })?
            .component(component)
    }

    /// Mark local nodes referenced by any field.
    pub fn set_local_node_in_use(&self, in_use: &mut [bool]) {
        for component in self.fields.iter().flat_map(|f| f.components.iter()) {
            component.set_local_node_in_use(in_use);
        }
    }
}

impl FieldList for ElementFieldInfo {
    fn list_matches(&self, other: &Self) -> bool {
        self == other
    }

    fn field_ids(&self) -> Vec<FieldId> {
        self.fields.iter().map(ElementField::id).collect()
    }

    fn has_empty_list(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fedof_core::{BasisId, ValueType};
    use fedof_field::FieldDef;
    use fedof_map::DofMap;

    fn grid_field(id: u32, number_in_xi: &[usize]) -> ElementField {
        let f = FieldDef::new(FieldId(id), "density", ValueType::Double, 1).unwrap();
        ElementField::new(f, [ElementFieldComponent::grid_based(BasisId(9), number_in_xi)])
    }

    #[test]
    fn grid_fields_placed_back_to_back_and_rebased() {
        let mut info = ElementFieldInfo::new();
        assert_eq!(info.add_field(grid_field(0, &[1, 1])).unwrap(), 4);
        assert_eq!(info.add_field(grid_field(1, &[2])).unwrap(), 7);
        assert_eq!(info.component(FieldId(1), 0).unwrap().grid().unwrap().value_offset, 4);
        info.remove_field(FieldId(0)).unwrap();
        assert_eq!(info.number_of_values(), 3);
        let moved = info.component(FieldId(1), 0).unwrap();
        assert_eq!(moved.grid().unwrap().value_offset, 0);
        assert!(matches!(&moved.maps()[0], DofMap::Grid(g) if g.value_offset() == 0));
    }

    #[test]
    fn component_count_must_match_field() {
        let f = FieldDef::new(FieldId(2), "coordinates", ValueType::Double, 2).unwrap();
        let mut info = ElementFieldInfo::new();
        let one = ElementField::new(
            f,
            [ElementFieldComponent::node_based(BasisId(0), None, vec![DofMap::node(0, 0, 0)])],
        );
        assert!(matches!(
            info.add_field(one),
            Err(DescriptorError::ComponentCountMismatch { expected: 2, found: 1, .. })
        ));
        assert!(info.has_empty_list());
    }

    #[test]
    fn replace_keeps_grid_offsets() {
        let mut info = ElementFieldInfo::new();
        info.add_field(grid_field(0, &[1])).unwrap();
        info.add_field(grid_field(1, &[1])).unwrap();
        info.replace_field(grid_field(1, &[1])).unwrap();
        assert_eq!(info.component(FieldId(1), 0).unwrap().grid().unwrap().value_offset, 2);
        assert!(info.replace_field(grid_field(1, &[3])).is_err());
        assert!(matches!(
            info.component(FieldId(7), 0),
            Err(EvaluationError::FieldNotDefined { node: None, .. })
        ));
    }
}
