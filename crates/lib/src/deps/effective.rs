use std::collections::BTreeSet;

use crate::action::{DecompositionError, Registry, decompose};
use crate::filter;
use crate::platform::Platform;
use crate::recipe::Recipe;

/// Dependencies of one recipe on one platform.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EffectiveDeps {
  pub install_time: BTreeSet<String>,
  pub runtime: BTreeSet<String>,
}

impl EffectiveDeps {
  /// Everything that must be installed before the tool is usable.
  pub fn all(&self) -> BTreeSet<String> {
    self.install_time.union(&self.runtime).cloned().collect()
  }
}

/// `install_time = recipe deps ∪ step deps ∪ implicit deps of surviving primitives`,
/// and likewise for runtime. A recipe never depends on itself.
pub fn effective_deps(
  recipe: &Recipe,
  registry: &Registry,
  target: &Platform,
) -> Result<EffectiveDeps, DecompositionError> {
  let mut deps = EffectiveDeps::default();
  deps.install_time.extend(recipe.metadata.dependencies.iter().cloned());
  deps.runtime.extend(recipe.metadata.runtime_dependencies.iter().cloned());

  for step in &recipe.steps {
    if !filter::step_applies(step, registry, target)? {
      continue;
    }
    deps.install_time.extend(step.dependencies.iter().cloned());

    for primitive in decompose(step, registry)? {
      let Some(spec) = registry.get(primitive.action) else {
        continue;
      };
      if !filter::matches(None, spec.implicit_constraint(), target) {
        continue;
      }
      let metadata = spec.metadata();
      deps.install_time.extend(metadata.install_time_deps.iter().map(|d| d.to_string()));
      deps.runtime.extend(metadata.runtime_deps.iter().map(|d| d.to_string()));
    }
  }

  deps.install_time.remove(recipe.name());
  deps.runtime.remove(recipe.name());
  Ok(deps)
}
