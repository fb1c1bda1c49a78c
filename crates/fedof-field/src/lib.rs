//! Field definitions and the shared node field descriptors.
//!
//! A [`Node`] stores the values of every field defined on it in one
//! [`ValueBlock`](fedof_storage::ValueBlock) and describes their layout with
//! a [`NodeFieldInfo`]. Nodes defined identically share one descriptor
//! through a [`Registry`], which de-duplicates descriptors and allows
//! in-place mutation only while a descriptor is used by a single node.
//!
//! ```text
//! Registry<NodeFieldInfo> ── Rc ──┐
//!                                 ├── NodeFieldInfo
//! Node ── Rc (shared) ────────────┘     └── NodeField (per field)
//!  └── ValueBlock (owned)                    ├── FieldDef (shared)
//!                                            ├── TimeSequence (shared, optional)
//!                                            └── NodeFieldComponent (per component)
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod change_log;
pub mod field;
pub mod info;
pub mod layout;
pub mod node;
pub mod registry;

pub use change_log::{FieldChange, FieldChangeLog, LastLoggedInfo};
pub use field::{FieldDef, FieldSet, SharedFieldDef};
pub use info::{can_merge, merge_conflict, NodeFieldInfo};
pub use layout::{ComponentLayout, NodeField, NodeFieldComponent};
pub use node::{Node, NodeFieldInfoRegistry, NodeHandle};
pub use registry::{used_only_once, FieldList, Registry};
