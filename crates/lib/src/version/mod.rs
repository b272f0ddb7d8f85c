//! Version resolution.
//!
//! Turns a [`VersionConstraint`] into a concrete [`VersionInfo`]. Exact
//! versions never touch the network; only `latest` does. `latest` is asked of
//! the recipe's [`Source`]: GitHub releases or one of the package registries.

mod github;
mod registry;

pub use github::GithubVersionResolver;
pub use registry::{RegistryUrls, RegistryVersionResolver};

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::recipe::{Recipe, RegistrySource};

#[derive(Debug, Error)]
pub enum VersionError {
  #[error("recipe '{tool}' has no version source; pass an explicit version")]
  NoSource { tool: String },

  #[error("version lookup for '{tool}' failed: {message}")]
  Request { tool: String, message: String },

  #[error("version lookup for '{tool}' returned HTTP {status}")]
  Status { tool: String, status: u16 },

  #[error("release tag '{tag}' of '{tool}' does not start with '{prefix}'")]
  TagPrefix { tool: String, tag: String, prefix: String },

  #[error("no version of '{tool}' is available: {message}")]
  Unavailable { tool: String, message: String },
}

/// What the user asked for.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum VersionConstraint {
  #[default]
  Latest,
  Exact(String),
}

impl VersionConstraint {
  pub fn exact(&self) -> Option<&str> {
    match self {
      Self::Exact(v) => Some(v),
      Self::Latest => None,
    }
  }
}

impl FromStr for VersionConstraint {
  type Err = std::convert::Infallible;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim() {
      "" | "latest" => Ok(Self::Latest),
      v => Ok(Self::Exact(v.to_string())),
    }
  }
}

impl fmt::Display for VersionConstraint {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Latest => write!(f, "latest"),
      Self::Exact(v) => write!(f, "{v}"),
    }
  }
}

/// A resolved version and the release tag it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
  pub version: String,
  pub tag: String,
}

impl VersionInfo {
  /// Version known up front (explicit or lock-pinned); the tag is derived
  /// from the recipe's tag prefix.
  pub fn pinned(recipe: &Recipe, version: &str) -> Self {
    let version = version.strip_prefix('v').filter(|_| recipe.version.tag_prefix() == "v").unwrap_or(version);
    Self {
      version: version.to_string(),
      tag: format!("{}{}", recipe.version.tag_prefix(), version),
    }
  }
}

#[async_trait]
pub trait VersionResolver: Send + Sync {
  async fn resolve(&self, recipe: &Recipe, constraint: &VersionConstraint) -> Result<VersionInfo, VersionError>;
}

/// Where `latest` is looked up for a recipe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
  Github { repo: String },
  Registry { registry: RegistrySource, package: String },
}

/// Actions whose package parameter names a registry package.
const REGISTRY_ACTIONS: &[(&str, &str, RegistrySource)] = &[
  ("cargo_install", "crate", RegistrySource::CratesIo),
  ("cargo_build", "crate", RegistrySource::CratesIo),
  ("npm_install", "package", RegistrySource::Npm),
  ("npm_exec", "package", RegistrySource::Npm),
  ("pipx_install", "package", RegistrySource::Pypi),
  ("pip_exec", "package", RegistrySource::Pypi),
  ("gem_install", "gem", RegistrySource::Rubygems),
  ("gem_exec", "gem", RegistrySource::Rubygems),
  ("go_install", "module", RegistrySource::Goproxy),
  ("go_build", "module", RegistrySource::Goproxy),
  ("cpan_install", "module", RegistrySource::Metacpan),
  ("homebrew", "formula", RegistrySource::Homebrew),
];

const GITHUB_ACTIONS: &[&str] = &["github_archive", "github_file"];

impl Source {
  /// An explicit `[version]` table wins. Otherwise the first step that names
  /// a GitHub repository or a registry package decides.
  pub fn of(recipe: &Recipe) -> Option<Self> {
    let declared = &recipe.version;
    if let Some(registry) = declared.source {
      let package = declared.package.clone().or_else(|| {
        REGISTRY_ACTIONS
          .iter()
          .filter(|(_, _, candidate)| *candidate == registry)
          .find_map(|(action, param, _)| step_param(recipe, action, param))
      })?;
      return Some(Self::Registry { registry, package });
    }
    if let Some(repo) = &declared.github_repo {
      return Some(Self::Github { repo: repo.clone() });
    }

    recipe.steps.iter().find_map(|step| {
      let param = |key: &str| step.params.get(key).and_then(serde_json::Value::as_str).map(str::to_string);
      if GITHUB_ACTIONS.contains(&step.action.as_str()) {
        return param("repo").map(|repo| Self::Github { repo });
      }
      REGISTRY_ACTIONS
        .iter()
        .find(|(action, _, _)| *action == step.action)
        .and_then(|&(_, key, registry)| param(key).map(|package| Self::Registry { registry, package }))
    })
  }
}

fn step_param(recipe: &Recipe, action: &str, key: &str) -> Option<String> {
  recipe
    .steps
    .iter()
    .filter(|step| step.action == action)
    .find_map(|step| step.params.get(key).and_then(serde_json::Value::as_str).map(str::to_string))
}

/// Routes each recipe to the resolver for its [`Source`].
#[derive(Debug, Clone, Default)]
pub struct SourceResolver {
  github: GithubVersionResolver,
  registries: RegistryVersionResolver,
}

impl SourceResolver {
  pub fn new(github: GithubVersionResolver, registries: RegistryVersionResolver) -> Self {
    Self { github, registries }
  }
}

#[async_trait]
impl VersionResolver for SourceResolver {
  async fn resolve(&self, recipe: &Recipe, constraint: &VersionConstraint) -> Result<VersionInfo, VersionError> {
    match Source::of(recipe) {
      Some(Source::Registry { .. }) => self.registries.resolve(recipe, constraint).await,
      _ => self.github.resolve(recipe, constraint).await,
    }
  }
}
