//! Recipe model and loading.
//!
//! A recipe is an ordered list of [`Step`]s plus metadata. Step parameters are
//! flattened next to `action`, so a TOML step reads:
//!
//! ```toml
//! [[steps]]
//! action = "github_archive"
//! repo = "BurntSushi/ripgrep"
//! asset_pattern = "ripgrep-{version}-{arch}-unknown-linux-musl.tar.gz"
//! archive_format = "tar.gz"
//! binaries = ["rg"]
//! when = { os = ["linux"] }
//! ```

mod loader;

pub use loader::DirRecipeLoader;

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::filter::{FilterError, WhenClause};
use crate::util::hash::Hashable;

/// Concrete or templated step parameters. `BTreeMap` keeps serialization ordered.
pub type Params = BTreeMap<String, serde_json::Value>;

#[derive(Debug, Error)]
pub enum RecipeError {
  #[error("recipe '{name}' not found in {}", dir.display())]
  NotFound { name: String, dir: PathBuf },

  #[error("failed to read recipe {}: {source}", path.display())]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse recipe '{name}': {source}")]
  Parse {
    name: String,
    #[source]
    source: toml::de::Error,
  },

  #[error("invalid recipe '{name}': {reason}")]
  Invalid { name: String, reason: String },

  #[error("invalid when clause in recipe '{name}' step {step}: {source}")]
  When {
    name: String,
    step: usize,
    #[source]
    source: FilterError,
  },

  #[error("invalid tool name '{0}'")]
  InvalidName(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
  pub metadata: Metadata,
  #[serde(default)]
  pub version: VersionSource,
  #[serde(default)]
  pub steps: Vec<Step>,
}

impl Hashable for Recipe {}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
  pub name: String,
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub description: String,
  /// Explicit install-time dependencies.
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub dependencies: Vec<String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub runtime_dependencies: Vec<String>,
}

/// Package registries that can answer "what is the latest version".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrySource {
  CratesIo,
  Npm,
  Pypi,
  Rubygems,
  Goproxy,
  Metacpan,
  Homebrew,
}

impl RegistrySource {
  pub fn name(&self) -> &'static str {
    match self {
      Self::CratesIo => "crates.io",
      Self::Npm => "npm",
      Self::Pypi => "pypi",
      Self::Rubygems => "rubygems",
      Self::Goproxy => "goproxy",
      Self::Metacpan => "metacpan",
      Self::Homebrew => "homebrew",
    }
  }
}

impl std::fmt::Display for RegistrySource {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.name())
  }
}

/// Where versions for this recipe come from.
///
/// With nothing set, the source is inferred from the steps (see
/// [`crate::version::Source::of`]).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VersionSource {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub github_repo: Option<String>,
  /// Prefix stripped from release tags; `v` when unset, except for registries
  /// that publish bare versions.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub tag_prefix: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub source: Option<RegistrySource>,
  /// Package name in `source`; taken from the matching step when unset.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub package: Option<String>,
}

impl VersionSource {
  pub fn tag_prefix(&self) -> &str {
    let default = match self.source {
      None | Some(RegistrySource::Goproxy) => "v",
      Some(_) => "",
    };
    self.tag_prefix.as_deref().unwrap_or(default)
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
  pub action: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub when: Option<WhenClause>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub dependencies: Vec<String>,
  #[serde(flatten)]
  pub params: Params,
}

impl Step {
  pub fn new(action: impl Into<String>) -> Self {
    Self {
      action: action.into(),
      when: None,
      dependencies: Vec::new(),
      params: Params::new(),
    }
  }

  pub fn with_param(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
    self.params.insert(key.into(), value);
    self
  }

  pub fn with_when(mut self, when: WhenClause) -> Self {
    self.when = Some(when);
    self
  }
}

impl Recipe {
  pub fn name(&self) -> &str {
    &self.metadata.name
  }

  /// Parse a TOML recipe. `name` is used for error messages only.
  pub fn from_toml_str(name: &str, content: &str) -> Result<Self, RecipeError> {
    let recipe: Recipe = toml::from_str(content).map_err(|source| RecipeError::Parse {
      name: name.to_string(),
      source,
    })?;
    recipe.validate()?;
    Ok(recipe)
  }

  /// Structural checks that do not need the action registry.
  pub fn validate(&self) -> Result<(), RecipeError> {
    let name = &self.metadata.name;
    validate_tool_name(name)?;

    if self.steps.is_empty() {
      return Err(RecipeError::Invalid {
        name: name.clone(),
        reason: "recipe has no steps".to_string(),
      });
    }

    for (idx, step) in self.steps.iter().enumerate() {
      if step.action.trim().is_empty() {
        return Err(RecipeError::Invalid {
          name: name.clone(),
          reason: format!("step {idx} has no action"),
        });
      }
      if let Some(when) = &step.when {
        when.validate().map_err(|source| RecipeError::When {
          name: name.clone(),
          step: idx,
          source,
        })?;
      }
    }

    for dep in self.metadata.dependencies.iter().chain(&self.metadata.runtime_dependencies) {
      validate_tool_name(dep)?;
    }

    Ok(())
  }
}

/// Tool names become directory names, so keep them to a safe alphabet.
pub fn validate_tool_name(name: &str) -> Result<(), RecipeError> {
  let mut chars = name.chars();
  let valid_first = chars.next().is_some_and(|c| c.is_ascii_alphanumeric());
  let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '@'));
  if valid_first && valid_rest && !name.contains("..") {
    Ok(())
  } else {
    Err(RecipeError::InvalidName(name.to_string()))
  }
}

/// Source of recipes by tool name.
pub trait RecipeLoader: Send + Sync {
  fn load(&self, name: &str) -> Result<Recipe, RecipeError>;
}
