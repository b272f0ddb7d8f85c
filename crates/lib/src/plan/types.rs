use serde::{Deserialize, Serialize};

use crate::platform::Platform;
use crate::recipe::Params;

/// Plan schema version written by this crate.
pub const PLAN_FORMAT_VERSION: u32 = 2;

/// One fetched resource: where it came from and what it hashed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadRecord {
  pub url: String,
  pub checksum: String,
  pub size: u64,
}

/// A primitive step with concrete parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedStep {
  pub action: String,
  pub params: Params,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub checksum: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub size: Option<u64>,
  /// True only when the action is classified deterministic.
  pub evaluable: bool,
}

impl ResolvedStep {
  pub fn param_str(&self, key: &str) -> Option<&str> {
    self.params.get(key).and_then(serde_json::Value::as_str)
  }

  pub fn param_strings(&self, key: &str) -> Vec<&str> {
    self
      .params
      .get(key)
      .and_then(serde_json::Value::as_array)
      .map(|items| items.iter().filter_map(serde_json::Value::as_str).collect())
      .unwrap_or_default()
  }

  pub fn url(&self) -> Option<&str> {
    self.param_str("url")
  }

  pub fn download_record(&self) -> Option<DownloadRecord> {
    Some(DownloadRecord {
      url: self.url()?.to_string(),
      checksum: self.checksum.clone()?,
      size: self.size.unwrap_or_default(),
    })
  }
}

/// Fully resolved description of one install. Never mutated after eval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallationPlan {
  pub format_version: u32,
  pub tool: String,
  pub version: String,
  pub platform: Platform,
  /// Unix seconds. Not part of plan identity.
  #[serde(default)]
  pub generated_at: u64,
  /// SHA-256 of the recipe the plan was generated from.
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub recipe_hash: String,
  pub deterministic: bool,
  pub steps: Vec<ResolvedStep>,
}

impl InstallationPlan {
  pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
    serde_json::from_str(content)
  }

  pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(self)
  }

  /// Serialization used to compare plans: `generated_at` zeroed, compact JSON.
  pub fn canonical_json(&self) -> Result<String, serde_json::Error> {
    let mut canonical = self.clone();
    canonical.generated_at = 0;
    serde_json::to_string(&canonical)
  }

  pub fn downloads(&self) -> Vec<DownloadRecord> {
    self.steps.iter().filter_map(ResolvedStep::download_record).collect()
  }
}

/// Final path component of an archive-relative binary path.
pub fn binary_name(path: &str) -> Option<String> {
  path
    .rsplit(['/', '\\'])
    .next()
    .filter(|name| !name.is_empty())
    .map(str::to_string)
}
