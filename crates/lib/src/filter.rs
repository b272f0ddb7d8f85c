//! Platform filtering of recipe steps.
//!
//! A [`WhenClause`] is OR within a field and AND across fields. Package-manager
//! primitives additionally carry an implicit [`Constraint`] from the registry,
//! which is ANDed with whatever the recipe author wrote and cannot be widened.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::action::Registry;
use crate::action::decompose::DecompositionError;
use crate::platform::{LinuxFamily, Os, Platform};
use crate::recipe::Step;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FilterError {
  #[error("invalid platform tuple '{0}', expected '<os>/<arch>'")]
  InvalidPlatformTuple(String),

  #[error("unknown {field} value '{value}' in when clause")]
  UnknownValue { field: &'static str, value: String },
}

/// Recipe-authored step condition. Every populated field must match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhenClause {
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub os: Vec<String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub arch: Vec<String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub linux_family: Vec<String>,
  /// Exact `os/arch` tuples, e.g. `linux/amd64`.
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub platform: Vec<String>,
}

impl WhenClause {
  pub fn is_empty(&self) -> bool {
    self.os.is_empty() && self.arch.is_empty() && self.linux_family.is_empty() && self.platform.is_empty()
  }

  pub fn matches(&self, target: &Platform) -> bool {
    if !self.os.is_empty() && !self.os.iter().any(|os| os == target.os.as_str()) {
      return false;
    }

    if !self.arch.is_empty() && !self.arch.iter().any(|arch| arch == target.arch.as_str()) {
      return false;
    }

    if !self.linux_family.is_empty() {
      let Some(family) = target.linux_family else {
        return false;
      };
      if !self.linux_family.iter().any(|f| f == family.as_str()) {
        return false;
      }
    }

    if !self.platform.is_empty() {
      let tuple = format!("{}/{}", target.os, target.arch);
      if !self.platform.iter().any(|p| *p == tuple) {
        return false;
      }
    }

    true
  }

  /// Reject values no target could ever match, so typos surface at load time.
  pub fn validate(&self) -> Result<(), FilterError> {
    for os in &self.os {
      os.parse::<Os>().map_err(|_| FilterError::UnknownValue {
        field: "os",
        value: os.clone(),
      })?;
    }
    for arch in &self.arch {
      arch.parse::<crate::platform::Arch>().map_err(|_| FilterError::UnknownValue {
        field: "arch",
        value: arch.clone(),
      })?;
    }
    for family in &self.linux_family {
      family.parse::<LinuxFamily>().map_err(|_| FilterError::UnknownValue {
        field: "linux_family",
        value: family.clone(),
      })?;
    }
    for tuple in &self.platform {
      let Some((os, arch)) = tuple.split_once('/') else {
        return Err(FilterError::InvalidPlatformTuple(tuple.clone()));
      };
      if os.parse::<Os>().is_err() || arch.parse::<crate::platform::Arch>().is_err() {
        return Err(FilterError::InvalidPlatformTuple(tuple.clone()));
      }
    }
    Ok(())
  }
}

/// Registry-owned platform restriction on a primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Constraint {
  pub os: Os,
  pub linux_family: Option<LinuxFamily>,
}

impl Constraint {
  pub const fn os(os: Os) -> Self {
    Self { os, linux_family: None }
  }

  pub const fn linux(family: LinuxFamily) -> Self {
    Self {
      os: Os::Linux,
      linux_family: Some(family),
    }
  }

  pub fn matches(&self, target: &Platform) -> bool {
    if self.os != target.os {
      return false;
    }
    match self.linux_family {
      Some(family) => target.linux_family == Some(family),
      None => true,
    }
  }
}

/// Combined check for a single action: explicit clause AND implicit constraint.
pub fn matches(when: Option<&WhenClause>, implicit: Option<Constraint>, target: &Platform) -> bool {
  when.is_none_or(|w| w.matches(target)) && implicit.is_none_or(|c| c.matches(target))
}

/// Whether a recipe step survives filtering for `target`.
///
/// The step's own action must be registered; its implicit constraint applies in
/// addition to the recipe-authored `when`.
pub fn step_applies(step: &Step, registry: &Registry, target: &Platform) -> Result<bool, DecompositionError> {
  let spec = registry
    .get(&step.action)
    .ok_or_else(|| DecompositionError::UnknownAction(step.action.clone()))?;
  Ok(matches(step.when.as_ref(), spec.implicit_constraint(), target))
}
