use async_trait::async_trait;

use super::{DependencyError, effective_deps};
use crate::action::Registry;
use crate::platform::Platform;
use crate::recipe::RecipeLoader;

/// Declared dependencies of a tool, in declaration order.
#[async_trait]
pub trait DependencySource: Send + Sync {
  async fn dependencies(&self, tool: &str) -> Result<Vec<String>, DependencyError>;
}

/// Reads dependencies from recipes, as they apply to one target platform.
pub struct RecipeDependencySource<'a> {
  recipes: &'a dyn RecipeLoader,
  registry: &'a Registry,
  target: Platform,
}

impl<'a> RecipeDependencySource<'a> {
  pub fn new(recipes: &'a dyn RecipeLoader, registry: &'a Registry, target: Platform) -> Self {
    Self {
      recipes,
      registry,
      target,
    }
  }
}

#[async_trait]
impl DependencySource for RecipeDependencySource<'_> {
  async fn dependencies(&self, tool: &str) -> Result<Vec<String>, DependencyError> {
    let recipe = self.recipes.load(tool).map_err(|source| DependencyError::Recipe {
      tool: tool.to_string(),
      source,
    })?;
    let deps = effective_deps(&recipe, self.registry, &self.target).map_err(|source| {
      DependencyError::Decomposition {
        tool: tool.to_string(),
        source,
      }
    })?;
    Ok(deps.all().into_iter().collect())
  }
}
