//! Evaluation pipeline glue: from element DOF maps to field values.
//!
//! Given a field, an element and a time, the DOF maps of each component
//! produce raw coefficients, which the external basis blends and later
//! interpolates at xi. Elements that do not define a field themselves
//! inherit it from a parent element through the face they lie on.
//!
//! ```text
//! Element ──(parent faces, FaceTransform)──> defining Element
//!                                              │
//!                       DofMap::evaluate ──────┤ raw coefficients
//!                                              v
//!                       BasisProvider::blend ──> blended (cached per time)
//!                                              │
//!                 BasisProvider::interpolate <─┘ at xi
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod evaluation;
pub mod inherit;

pub use config::EvalConfig;
pub use evaluation::{element_values, ComponentValue, ElementFieldEvaluation};
pub use inherit::{find_field_source, FieldSource};
