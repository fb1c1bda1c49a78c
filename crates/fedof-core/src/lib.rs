//! Core types and traits for the fedof degree-of-freedom engine.
//!
//! This is the leaf crate with zero internal dependencies. It defines the
//! fundamental abstractions shared by value storage, DOF maps, field
//! descriptors and the merge engine: identifiers, value types, time
//! sequences, error types, and the narrow traits through which the external
//! basis and shape collaborators are consumed.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod id;
pub mod time;
pub mod traits;
pub mod value;

pub use config::{ConfigError, TimeConfig};
pub use error::{DescriptorError, EvaluationError, MergeError, RangeKind, StorageError};
pub use id::{
    BasisId, ElementId, ElementIdentity, ElementRef, FieldId, NodeId, ScaleFactorSetId,
    ShapeId, Xi, MAXIMUM_ELEMENT_XI_DIMENSIONS,
};
pub use time::{
    SharedTimeSequence, TimeInterpolation, TimeSequence, TimeSequenceMapping, TimeSequencePool,
};
pub use traits::{BasisProvider, FaceTransform, IdentifierAllocator, ShapeProvider};
pub use value::ValueType;
