use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::lock::ResolutionMetadata;
use crate::plan::InstallationPlan;
use crate::platform::Platform;

/// Current state file format version.
pub const STATE_VERSION: u32 = 1;

/// Contents of `state.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
  pub version: u32,
  #[serde(default)]
  pub tools: BTreeMap<String, ToolState>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolState {
  pub active_version: String,
  #[serde(default)]
  pub versions: BTreeMap<String, VersionState>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionState {
  pub installed_at: u64,
  #[serde(default)]
  pub binaries: Vec<String>,
  pub plan: InstallationPlan,
  #[serde(default)]
  pub resolutions: Vec<ResolutionMetadata>,
}

impl Default for State {
  fn default() -> Self {
    Self {
      version: STATE_VERSION,
      tools: BTreeMap::new(),
    }
  }
}

impl State {
  pub fn tool(&self, tool: &str) -> Option<&ToolState> {
    self.tools.get(tool)
  }

  pub fn is_installed(&self, tool: &str) -> bool {
    self.tools.get(tool).is_some_and(|t| !t.versions.is_empty())
  }

  pub fn is_version_installed(&self, tool: &str, version: &str) -> bool {
    self.tools.get(tool).is_some_and(|t| t.versions.contains_key(version))
  }

  /// Record a finished install and make it the active version.
  pub fn record_install(&mut self, plan: &InstallationPlan, binaries: Vec<String>, installed_at: u64) {
    let resolution = ResolutionMetadata {
      platform: plan.platform,
      downloads: plan.downloads(),
      resolved_at: installed_at,
    };
    let tool = self.tools.entry(plan.tool.clone()).or_insert_with(|| ToolState {
      active_version: plan.version.clone(),
      versions: BTreeMap::new(),
    });
    tool.active_version = plan.version.clone();

    let entry = tool.versions.entry(plan.version.clone()).or_insert_with(|| VersionState {
      installed_at,
      binaries: Vec::new(),
      plan: plan.clone(),
      resolutions: Vec::new(),
    });
    entry.installed_at = installed_at;
    entry.binaries = binaries;
    entry.plan = plan.clone();
    entry.resolutions.retain(|r| r.platform != resolution.platform);
    entry.resolutions.push(resolution);
  }

  /// The most recent resolution of the active version that `host` can use.
  pub fn active_resolution(&self, tool: &str, host: &Platform) -> Option<(&str, &ResolutionMetadata)> {
    let state = self.tools.get(tool)?;
    let version = state.versions.get(&state.active_version)?;
    version
      .resolutions
      .iter()
      .filter(|r| host.can_run(&r.platform))
      .max_by_key(|r| r.resolved_at)
      .map(|r| (state.active_version.as_str(), r))
  }
}
