//! Strongly-typed identifiers, element identity handles and the [`Xi`] type alias.

use smallvec::SmallVec;
use std::fmt;
use std::rc::Rc;

/// Maximum number of xi (element-local) coordinates supported.
pub const MAXIMUM_ELEMENT_XI_DIMENSIONS: usize = 3;

/// Identifies a field registered with a region.
///
/// `FieldId(n)` is assigned by the field registry; it is the key under which
/// node and element field descriptors index their per-field layouts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldId(pub u32);

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for FieldId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Stable identifier of a node, issued by the nodeset identity collaborator.
///
/// Two node handles on opposite sides of a merge refer to the same logical
/// node exactly when their `NodeId`s are equal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub i32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for NodeId {
    fn from(v: i32) -> Self {
        Self(v)
    }
}

/// Stable identifier of an element: its dimension plus a per-dimension number.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId {
    /// Topological dimension of the element (1, 2 or 3).
    pub dimension: u8,
    /// Identifier, unique within elements of the same dimension.
    pub identifier: i32,
}

impl ElementId {
    /// Create an element identifier.
    pub fn new(dimension: u8, identifier: i32) -> Self {
        Self {
            dimension,
            identifier,
        }
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}D:{}", self.dimension, self.identifier)
    }
}

/// Identifies a named scale-factor set, shared mesh-wide.
///
/// Scale factor sets on different elements with the same identifier describe
/// the same kind of scaling (historically one set per basis), and are matched
/// by this identifier when element definitions are merged.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScaleFactorSetId(pub u32);

impl fmt::Display for ScaleFactorSetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle to a basis owned by the external basis collaborator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BasisId(pub u32);

impl fmt::Display for BasisId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle to an element shape owned by the external shape collaborator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShapeId(pub u32);

impl fmt::Display for ShapeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Counted identity of an element.
///
/// Element-xi values stored in a value block hold an [`ElementRef`] to the
/// element they embed into. The strong count of the `Rc` is the element's
/// access count: copying a value block re-references (increments) it,
/// releasing the block's dynamic storage decrements it.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct ElementIdentity {
    id: ElementId,
}

impl ElementIdentity {
    /// Create a new counted identity for `id`.
    pub fn new(id: ElementId) -> ElementRef {
        Rc::new(Self { id })
    }

    /// The element identifier.
    pub fn id(&self) -> ElementId {
        self.id
    }
}

/// Shared, counted reference to an [`ElementIdentity`].
pub type ElementRef = Rc<ElementIdentity>;

/// Element-local (xi) coordinates.
///
/// Uses `SmallVec<[f64; 3]>` so that points in up to three dimensions never
/// touch the heap.
pub type Xi = SmallVec<[f64; MAXIMUM_ELEMENT_XI_DIMENSIONS]>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_id_display_includes_dimension() {
        assert_eq!(ElementId::new(2, 17).to_string(), "2D:17");
    }

    #[test]
    fn element_identity_counts_references() {
        let element = ElementIdentity::new(ElementId::new(3, 1));
        assert_eq!(Rc::strong_count(&element), 1);
        let copy = Rc::clone(&element);
        assert_eq!(Rc::strong_count(&element), 2);
        assert_eq!(copy.id(), ElementId::new(3, 1));
        drop(copy);
        assert_eq!(Rc::strong_count(&element), 1);
    }
}
