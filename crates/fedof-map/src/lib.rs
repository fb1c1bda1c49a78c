//! DOF maps and the per-element storage they read.
//!
//! Every basis coefficient of an element field component comes from one
//! [`DofMap`]: a single node value, a sum of maps, or a corner of a grid
//! cell. Maps address nodes by local index into the element's
//! [`NodeScaleInfo`] and scale factors by index within one declared
//! [`ScaleFactorSet`].
//!
//! ```text
//! Element ── NodeScaleInfo (owned)
//!              ├── [Option<NodeHandle>]  local nodes (shared)
//!              ├── ScaleFactorTable      sets back to back
//!              └── ValueBlock            grid values
//!
//! DofMap::evaluate(&mut DofCache) ── reads ──> NodeScaleInfo, Node values
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod cache;
pub mod grid;
pub mod map;
pub mod node_scale;
pub mod scale;

pub use cache::DofCache;
pub use grid::{number_of_grid_values, GridCell, GridDofMap};
pub use map::{DofMap, DofMatchCache, NodeDofMap};
pub use node_scale::NodeScaleInfo;
pub use scale::{ScaleFactorSet, ScaleFactorTable};
