//! Shared types for the luxport exporter.
//!
//! # Invariants
//! - `ParamSet` preserves insertion order; emitted statements are deterministic.

mod params;
mod types;

pub use params::{Param, ParamSet, ParamValue};
pub use types::{LookAt, MATRIX_EPSILON, ObjectId, matrices_differ, matrix_to_array};
