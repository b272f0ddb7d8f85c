//! Action registry, parameter preflight and composite decomposition.
//!
//! Every recipe step names an action. Actions are a closed set:
//!
//! - primitives ([`PrimitiveKind`]) are terminal and map to one executor operation
//! - composites ([`CompositeKind`]) expand into other actions and never reach a plan
//!
//! The [`Registry`] is built once and never mutated, so it is shared freely
//! across threads.

pub mod decompose;
pub mod preflight;
mod registry;
mod types;

pub use decompose::{DecompositionError, MAX_DECOMPOSITION_DEPTH, PrimitiveStep, decompose};
pub use registry::{ActionSpec, Registry};
pub use types::*;
