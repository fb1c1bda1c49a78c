//! Finding the element a field is defined on, through parent faces.

use std::rc::Rc;

use log::trace;

use fedof_core::{EvaluationError, FaceTransform, FieldId, ShapeProvider, Xi};
use fedof_element::ElementHandle;

/// The element defining a field for some element, and the face transforms
/// leading from the evaluated element's xi to the defining element's xi.
#[derive(Clone, Debug)]
pub struct FieldSource {
    /// The element whose definition is used.
    pub element: ElementHandle,
    /// Transforms applied in order, face to parent first.
    pub transforms: Vec<FaceTransform>,
}

impl FieldSource {
    /// Xi in the defining element for `xi` in the evaluated element.
    pub fn map_xi(&self, xi: &[f64]) -> Xi {
        self.transforms
            .iter()
            .fold(Xi::from_slice(xi), |xi, transform| transform.apply(&xi))
    }

    /// Derivatives with respect to the evaluated element's xi, given
    /// derivatives with respect to the defining element's xi.
    pub fn pull_back(&self, derivatives: &[f64]) -> Xi {
        self.transforms
            .iter()
            .rev()
            .fold(Xi::from_slice(derivatives), |parent, transform| {
                (0..transform.face_dimension())
                    .map(|j| {
                        transform
                            .rows()
                            .zip(&parent)
                            .map(|(row, d)| d * row[j + 1])
                            .sum::<f64>()
                    })
                    .collect()
            })
    }

    /// Whether the field is defined on the evaluated element itself.
    pub fn is_direct(&self) -> bool {
        self.transforms.is_empty()
    }
}

/// Find the element defining `field` for `element`: the element itself, or
/// the first parent (searched depth first, in parent order) that does,
/// at most `max_depth` levels up.
pub fn find_field_source(
    element: &ElementHandle,
    field: FieldId,
    shape: &dyn ShapeProvider,
    max_depth: usize,
) -> Result<Option<FieldSource>, EvaluationError> {
    if element.borrow().has_field(field) {
        return Ok(Some(FieldSource {
            element: Rc::clone(element),
            transforms: Vec::new(),
        }));
    }
    if max_depth == 0 {
        return Ok(None);
    }
    let parents = element.borrow().parents().to_vec();
    for link in parents {
        let Some(parent) = link.element() else { continue };
        let Some(mut source) = find_field_source(&parent, field, shape, max_depth - 1)? else {
            continue;
        };
        let parent_shape = parent.borrow().shape();
        let transform = shape
            .face_affine_transform(parent_shape, link.face())
            .ok_or_else(|| EvaluationError::InvalidArgument {
                reason: format!("shape {parent_shape} has no face {}", link.face()),
            })?;
        source.transforms.insert(0, transform);
        trace!(
            "field {field} on element {} inherited from element {} through {} faces",
            element.borrow().id(),
            source.element.borrow().id(),
            source.transforms.len()
        );
        return Ok(Some(source));
    }
    Ok(None)
}
