//! Typed value storage for node and element field values.
//!
//! Every node and element owns one [`ValueBlock`] holding the values of all
//! fields defined on it. Field descriptors record where each component's
//! values start; the block records each value's type so accesses can be
//! checked and owned storage released.
//!
//! # Layout
//!
//! ```text
//! ValueBlock
//! └── value[offset] (one per stored value)
//!     ├── numeric scalar            (double, float, short, int, unsigned)
//!     ├── string                    → owned buffer or null
//!     ├── element-xi                → counted element reference + xi
//!     ├── array                     → owned Scalars or null
//!     └── time series (numeric)     → owned Scalars, one per time
//! ```
//!
//! The storage footprint of each value is given by [`size`] and depends only
//! on its type and time-sequencing. Owned sub-allocations are counted per
//! thread (see [`live_dynamic_allocations`]).

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod block;
mod cell;
pub mod config;
pub mod copy;
pub mod scalar;
mod tracked;

pub use block::ValueBlock;
pub use cell::size;
pub use config::StorageConfig;
pub use copy::ValueRegion;
pub use scalar::{Scalar, Scalars};
pub use tracked::live_dynamic_allocations;
