//! Dependency resolution.
//!
//! - [`effective_deps`] unions one recipe's explicit dependencies with the
//!   implicit ones of every primitive it decomposes into.
//! - [`DependencyResolver`] walks dependencies across recipes, builds a
//!   [`DependencyTree`] and yields a leaves-first generation order.

mod effective;
mod source;
mod tree;

pub use effective::{EffectiveDeps, effective_deps};
pub use source::{DependencySource, RecipeDependencySource};
pub use tree::{DependencyNode, DependencyResolver, DependencySummary, DependencyTree};

use thiserror::Error;

use crate::action::DecompositionError;
use crate::recipe::RecipeError;

#[derive(Debug, Error)]
pub enum DependencyError {
  #[error("dependency cycle detected: {}", chain.join(" -> "))]
  Cycle { chain: Vec<String> },

  #[error("failed to load recipe for dependency '{tool}': {source}")]
  Recipe {
    tool: String,
    #[source]
    source: RecipeError,
  },

  #[error("failed to compute dependencies of '{tool}': {source}")]
  Decomposition {
    tool: String,
    #[source]
    source: DecompositionError,
  },
}
