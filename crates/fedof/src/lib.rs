//! fedof: degree-of-freedom storage, mapping and merging for finite element
//! fields.
//!
//! This is the top-level facade crate that re-exports the public API from all
//! fedof sub-crates. For most users, adding `fedof` as a single dependency is
//! sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use fedof::prelude::*;
//!
//! let mut registry = NodeFieldInfoRegistry::new();
//! let storage = StorageConfig::default();
//! let pressure = FieldDef::new(FieldId(0), "pressure", ValueType::Double, 1).unwrap();
//!
//! // Two definitions of node 7, e.g. from two regions being joined.
//! let mut target = Node::new(NodeId(7), &mut registry);
//! target
//!     .define_field(&pressure, &[ComponentLayout::SCALAR], None, &mut registry, &storage)
//!     .unwrap();
//! target.set_value(FieldId(0), 0, 0, 0, 0.0, 1e-5, 1.0).unwrap();
//!
//! let mut source = Node::new(NodeId(7), &mut registry);
//! source
//!     .define_field(&pressure, &[ComponentLayout::SCALAR], None, &mut registry, &storage)
//!     .unwrap();
//! source.set_value(FieldId(0), 0, 0, 0, 0.0, 1e-5, 2.5).unwrap();
//!
//! // Source values win.
//! let mut merger = Merger::new(MergeConfig::default()).unwrap();
//! merger.merge_node(&mut target, &source, &mut registry).unwrap();
//! assert_eq!(target.value(FieldId(0), 0, 0, 0, 0.0).unwrap(), 2.5);
//! ```
//!
//! # Modules
//!
//! Each module corresponds to a sub-crate. Use them for types not in the prelude:
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `fedof-core` | IDs, value types, time sequences, errors, collaborator traits |
//! | [`storage`] | `fedof-storage` | `ValueBlock`, typed value copy and retiming |
//! | [`field`] | `fedof-field` | Field definitions, node field descriptors, registries, change log |
//! | [`map`] | `fedof-map` | DOF maps, scale factor tables, `NodeScaleInfo` |
//! | [`element`] | `fedof-element` | Element field descriptors, elements, grid offsets |
//! | [`merge`] | `fedof-merge` | `Merger` and the node/element merge functions |
//! | [`eval`] | `fedof-eval` | `ElementFieldEvaluation`, inheritance through faces |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core types: identifiers, value types, time sequences, errors, and the
/// basis and shape traits.
///
/// Re-exports everything from `fedof-core`.
pub use fedof_core as types;

/// Typed value storage for node and element field values.
///
/// Use [`storage::ValueBlock`] for raw value access and
/// [`storage::StorageConfig`] for allocation limits.
pub use fedof_storage as storage;

/// Field definitions and shared node field descriptors.
///
/// Includes [`field::Node`], [`field::NodeFieldInfo`], the
/// copy-on-write [`field::Registry`], and [`field::FieldChangeLog`].
pub use fedof_field as field;

/// DOF maps from element basis coefficients to stored values.
///
/// Includes [`map::DofMap`], [`map::ScaleFactorTable`], and
/// [`map::NodeScaleInfo`].
pub use fedof_map as map;

/// Elements and their field descriptors.
///
/// Includes [`element::Element`], [`element::ElementFieldInfo`], and
/// [`element::calculate_grid_field_offsets`].
pub use fedof_element as element;

/// Merging node and element definitions.
///
/// Use [`merge::Merger`] to merge and collect a change log; the free
/// functions build merged descriptors without installing them.
pub use fedof_merge as merge;

/// Evaluating element fields at element coordinates.
///
/// Use [`eval::ElementFieldEvaluation`] to prepare coefficients once and
/// evaluate them at many points.
pub use fedof_eval as eval;

/// Common imports for typical fedof usage.
///
/// ```rust
/// use fedof::prelude::*;
/// ```
///
/// This imports the most frequently used types: identifiers, field
/// definitions, nodes and elements with their registries, DOF maps, the
/// merger, and the evaluation pipeline.
pub mod prelude {
    // Core types and traits
    pub use fedof_core::{
        BasisId, BasisProvider, ElementId, ElementIdentity, FieldId, NodeId, ScaleFactorSetId,
        ShapeId, ShapeProvider, TimeConfig, TimeSequence, TimeSequencePool, ValueType,
    };

    // Errors
    pub use fedof_core::{DescriptorError, EvaluationError, MergeError, StorageError};

    // Storage
    pub use fedof_storage::{StorageConfig, ValueBlock};

    // Fields and nodes
    pub use fedof_field::{
        ComponentLayout, FieldChange, FieldChangeLog, FieldDef, Node, NodeFieldInfoRegistry,
        NodeHandle,
    };

    // DOF maps
    pub use fedof_map::{DofMap, NodeScaleInfo, ScaleFactorTable};

    // Elements
    pub use fedof_element::{
        Element, ElementFieldComponent, ElementFieldInfoRegistry, ElementHandle,
    };

    // Merge
    pub use fedof_merge::{MergeConfig, Merger, OverlapPolicy};

    // Evaluation
    pub use fedof_eval::{EvalConfig, ElementFieldEvaluation};
}
