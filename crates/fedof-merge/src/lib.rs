//! Merge engine for node and element field definitions.
//!
//! Two definitions of the same logical node or element (e.g. an existing
//! mesh entity and one read from another region) are combined into one.
//! Merged descriptors and values are built off to the side and only
//! swapped in once complete, so a failed merge leaves both sides as they
//! were.
//!
//! ```text
//!            target ─┐                      ┌─> adopt through registry
//!                    ├─> merge_*_fields ────┤
//!            source ─┘    │                 └─> replace_definition
//!                         ├─ reconcile (time sequences, pooled)
//!                         ├─ copy values (source wins at shared times)
//!                         └─ elements: nodes, scale factors, DOF map re-indexing
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod element;
pub mod merger;
pub mod node;
pub mod time;

pub use config::{MergeConfig, OverlapPolicy};
pub use element::{merge_element_fields, MergedElementFields};
pub use merger::Merger;
pub use node::{merge_node_fields, MergedNodeFields};
pub use time::{classify, reconcile, TimeOverlap};
