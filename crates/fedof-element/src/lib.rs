//! Elements and the shared element field descriptors.
//!
//! An [`Element`] defines fields through an [`ElementFieldInfo`] shared
//! with identically defined elements. Each field component names a basis
//! and lists one [`DofMap`](fedof_map::DofMap) per basis function; grid
//! based components store their lattice in the element's own values.
//!
//! ```text
//! Registry<ElementFieldInfo> ── Rc ──┐
//!                                    ├── ElementFieldInfo
//! Element ── Rc (shared) ────────────┘     └── ElementField (per field)
//!  ├── NodeScaleInfo (owned)                     └── ElementFieldComponent
//!  └── ParentLink (weak) ──> Element                   ├── basis, scale factor set
//!                                                      └── DofMap (per basis function)
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod component;
pub mod element;
pub mod grid_offsets;
pub mod info;

pub use component::{ElementFieldComponent, GridLayout};
pub use element::{Element, ElementFieldInfoRegistry, ElementHandle, ParentLink};
pub use grid_offsets::{calculate_grid_field_offsets, GridOffsets};
pub use info::{ElementField, ElementFieldInfo};
