//! Error types for the fedof engine.
//!
//! Organized by subsystem: value storage, DOF map evaluation, field
//! descriptor maintenance, and merging. Low-level errors are wrapped by the
//! subsystem that consumes them so the failing step stays visible through
//! [`Error::source`].

use std::error::Error;
use std::fmt;

use crate::id::{FieldId, NodeId, ScaleFactorSetId};
use crate::value::ValueType;

/// Errors from value block allocation, access and copying.
#[derive(Clone, Debug, PartialEq)]
pub enum StorageError {
    /// The allocator could not provide the requested storage.
    OutOfMemory {
        /// Number of bytes requested.
        requested: usize,
    },
    /// The block would exceed the configured `max_block_bytes`.
    CapacityExceeded {
        /// Number of bytes the block would occupy.
        requested: usize,
        /// Configured ceiling in bytes.
        capacity: usize,
    },
    /// A slot holds a different kind of value than the access expects.
    TypeMismatch {
        /// The value type the caller asked for.
        expected: ValueType,
        /// Description of what the slot actually holds.
        found: String,
    },
    /// A value offset (or offset + count) lies beyond the block.
    OffsetOutOfRange {
        /// First offset accessed.
        offset: usize,
        /// Number of values in the block.
        len: usize,
    },
    /// A source time has no matching slot in the destination sequence.
    IncompatibleTimeMapping {
        /// The source time that could not be placed.
        time: f64,
    },
    /// Time sequencing was requested for a value type that cannot hold it.
    TimeSequenceUnsupported {
        /// The offending value type.
        value_type: ValueType,
    },
    /// Caller-supplied arguments were inconsistent.
    InvalidArgument {
        /// Description of the problem.
        reason: String,
    },
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfMemory { requested } => {
                write!(f, "out of memory allocating {requested} bytes")
            }
            Self::CapacityExceeded {
                requested,
                capacity,
            } => write!(
                f,
                "value block capacity exceeded: requested {requested} bytes, capacity {capacity} bytes"
            ),
            Self::TypeMismatch { expected, found } => {
                write!(f, "type mismatch: expected {expected}, found {found}")
            }
            Self::OffsetOutOfRange { offset, len } => {
                write!(f, "value offset {offset} out of range for block of {len} values")
            }
            Self::IncompatibleTimeMapping { time } => {
                write!(f, "no destination slot for source time {time}")
            }
            Self::TimeSequenceUnsupported { value_type } => {
                write!(f, "{value_type} values cannot be time-sequenced")
            }
            Self::InvalidArgument { reason } => write!(f, "invalid argument: {reason}"),
        }
    }
}

impl Error for StorageError {}

/// Which recorded extent an index exceeded during evaluation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RangeKind {
    /// Local node index beyond the element's node array.
    LocalNode,
    /// Value kind (value or derivative) beyond the node component's count.
    ValueKind,
    /// Version beyond the node component's version count.
    Version,
    /// Scale factor index beyond the declared scale factor set.
    ScaleFactor,
    /// Component number beyond the field's component count.
    Component,
    /// Grid point beyond the element's grid value region.
    GridPoint,
}

impl fmt::Display for RangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::LocalNode => "local node",
            Self::ValueKind => "value kind",
            Self::Version => "version",
            Self::ScaleFactor => "scale factor",
            Self::Component => "component",
            Self::GridPoint => "grid point",
        };
        f.write_str(name)
    }
}

/// Errors from DOF map evaluation and the evaluation pipeline.
///
/// A map never partially evaluates: any of these aborts the whole
/// coefficient computation for the component.
#[derive(Clone, Debug, PartialEq)]
pub enum EvaluationError {
    /// An index exceeded the extents recorded in a descriptor or map.
    OutOfRange {
        /// Which extent was exceeded.
        kind: RangeKind,
        /// The offending index.
        index: usize,
        /// The exclusive limit.
        limit: usize,
    },
    /// The referenced node has no definition for the field.
    FieldNotDefined {
        /// The field being evaluated.
        field: FieldId,
        /// The node lacking it, if known.
        node: Option<NodeId>,
    },
    /// The element's node array has no node at the referenced local index.
    MissingNode {
        /// The empty local node slot.
        local_node: usize,
    },
    /// The component references a scale factor set the element lacks.
    MissingScaleFactorSet {
        /// The missing set.
        set: ScaleFactorSetId,
    },
    /// Caller-supplied arguments were inconsistent.
    InvalidArgument {
        /// Description of the problem.
        reason: String,
    },
    /// Reading stored values failed.
    Storage(StorageError),
}

impl fmt::Display for EvaluationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfRange { kind, index, limit } => {
                write!(f, "{kind} index {index} out of range (limit {limit})")
            }
            Self::FieldNotDefined { field, node } => {
                write!(f, "field {field} is not defined")?;
                if let Some(node) = node {
                    write!(f, " at node {node}")?;
                }
                Ok(())
            }
            Self::MissingNode { local_node } => {
                write!(f, "no node at local node index {local_node}")
            }
            Self::MissingScaleFactorSet { set } => {
                write!(f, "element has no scale factor set {set}")
            }
            Self::InvalidArgument { reason } => write!(f, "invalid argument: {reason}"),
            Self::Storage(e) => write!(f, "storage error: {e}"),
        }
    }
}

impl Error for EvaluationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Storage(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StorageError> for EvaluationError {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

/// Errors from defining, undefining or sharing field descriptors.
#[derive(Clone, Debug, PartialEq)]
pub enum DescriptorError {
    /// The field is already defined on the entity.
    FieldAlreadyDefined {
        /// The field.
        field: FieldId,
    },
    /// The field is not defined on the entity.
    FieldNotDefined {
        /// The field.
        field: FieldId,
    },
    /// The supplied component layouts do not match the field's component count.
    ComponentCountMismatch {
        /// The field.
        field: FieldId,
        /// Components the field declares.
        expected: usize,
        /// Components supplied.
        found: usize,
    },
    /// In-place mutation was attempted on a descriptor shared by several entities.
    SharedDescriptor,
    /// Caller-supplied arguments were inconsistent.
    InvalidArgument {
        /// Description of the problem.
        reason: String,
    },
    /// Allocating or copying values failed.
    Storage(StorageError),
}

impl fmt::Display for DescriptorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FieldAlreadyDefined { field } => write!(f, "field {field} is already defined"),
            Self::FieldNotDefined { field } => write!(f, "field {field} is not defined"),
            Self::ComponentCountMismatch {
                field,
                expected,
                found,
            } => write!(
                f,
                "field {field} has {expected} components but {found} layouts were supplied"
            ),
            Self::SharedDescriptor => {
                write!(f, "descriptor is shared and cannot be modified in place")
            }
            Self::InvalidArgument { reason } => write!(f, "invalid argument: {reason}"),
            Self::Storage(e) => write!(f, "storage error: {e}"),
        }
    }
}

impl Error for DescriptorError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Storage(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StorageError> for DescriptorError {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

/// Errors from merging two field definitions of the same logical entity.
///
/// A failed merge leaves both inputs unmodified.
#[derive(Clone, Debug, PartialEq)]
pub enum MergeError {
    /// A field present on both sides has a different component layout.
    IncompatibleLayout {
        /// The field.
        field: FieldId,
        /// What differed.
        reason: String,
    },
    /// Time sequences of a field could not be reconciled.
    IncompatibleTimeMapping {
        /// The field.
        field: FieldId,
        /// What went wrong.
        reason: String,
    },
    /// A scale factor set exists on both sides with different sizes.
    ScaleFactorSetSizeMismatch {
        /// The set.
        set: ScaleFactorSetId,
        /// Size on the target side.
        target: usize,
        /// Size on the source side.
        source: usize,
    },
    /// Caller-supplied arguments were inconsistent.
    InvalidArgument {
        /// Description of the problem.
        reason: String,
    },
    /// Allocating or copying merged values failed.
    Storage(StorageError),
    /// Building the merged descriptor failed.
    Descriptor(DescriptorError),
}

impl fmt::Display for MergeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IncompatibleLayout { field, reason } => {
                write!(f, "field {field} cannot be merged: {reason}")
            }
            Self::IncompatibleTimeMapping { field, reason } => {
                write!(f, "time sequences of field {field} cannot be merged: {reason}")
            }
            Self::ScaleFactorSetSizeMismatch {
                set,
                target,
                source,
            } => write!(
                f,
                "scale factor set {set} has {target} factors in target but {source} in source"
            ),
            Self::InvalidArgument { reason } => write!(f, "invalid argument: {reason}"),
            Self::Storage(e) => write!(f, "storage error: {e}"),
            Self::Descriptor(e) => write!(f, "descriptor error: {e}"),
        }
    }
}

impl Error for MergeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Storage(e) => Some(e),
            Self::Descriptor(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StorageError> for MergeError {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

impl From<DescriptorError> for MergeError {
    fn from(e: DescriptorError) -> Self {
        Self::Descriptor(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_message_names_extent() {
        let e = EvaluationError::OutOfRange {
            kind: RangeKind::LocalNode,
            index: 4,
            limit: 4,
        };
        assert_eq!(e.to_string(), "local node index 4 out of range (limit 4)");
    }

    #[test]
    fn storage_errors_chain_through_merge() {
        let e: MergeError = StorageError::OutOfMemory { requested: 64 }.into();
        let source = e.source().map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("out of memory allocating 64 bytes"));
    }

    #[test]
    fn field_not_defined_mentions_node_when_known() {
        let e = EvaluationError::FieldNotDefined {
            field: FieldId(2),
            node: Some(NodeId(9)),
        };
        assert_eq!(e.to_string(), "field 2 is not defined at node 9");
    }
}
