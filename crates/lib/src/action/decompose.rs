//! Recursive expansion of composite actions into primitives.
//!
//! Expansion is a pure function of the action name, its params and the static
//! registry. Template variables are left untouched here and expanded later by
//! the evaluator, so `os_mapping` / `arch_mapping` are carried down to every
//! child that could contain a template.

use serde_json::{Value, json};
use thiserror::Error;
use tracing::trace;

use super::registry::Registry;
use super::types::{ActionKind, CompositeKind, PrimitiveKind};
use crate::recipe::{Params, Step};

/// Maximum composite nesting before decomposition is considered runaway.
pub const MAX_DECOMPOSITION_DEPTH: usize = 8;

/// Keys a composite forwards unchanged to its children.
const INHERITED_KEYS: &[&str] = &["os_mapping", "arch_mapping"];

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecompositionError {
  #[error("unknown action '{0}'")]
  UnknownAction(String),

  #[error("decomposition of '{action}' exceeded the maximum depth of {max}")]
  DepthExceeded { action: String, max: usize },

  #[error("action decomposes into itself: {}", chain.join(" -> "))]
  Cycle { chain: Vec<String> },

  #[error("invalid parameters for '{action}': {reason}")]
  InvalidParams { action: String, reason: String },
}

/// A terminal step with its registry classification attached.
#[derive(Debug, Clone, PartialEq)]
pub struct PrimitiveStep {
  pub action: &'static str,
  pub kind: PrimitiveKind,
  pub params: Params,
}

/// Expand `step` into primitive steps, preserving order.
pub fn decompose(step: &Step, registry: &Registry) -> Result<Vec<PrimitiveStep>, DecompositionError> {
  decompose_bounded(&step.action, &step.params, registry, MAX_DECOMPOSITION_DEPTH)
}

/// [`decompose`] with an explicit nesting limit.
pub fn decompose_bounded(
  action: &str,
  params: &Params,
  registry: &Registry,
  max_depth: usize,
) -> Result<Vec<PrimitiveStep>, DecompositionError> {
  let mut out = Vec::new();
  let mut chain = Vec::new();
  expand(action, params, registry, max_depth, &mut chain, &mut out)?;
  Ok(out)
}

fn expand(
  action: &str,
  params: &Params,
  registry: &Registry,
  max_depth: usize,
  chain: &mut Vec<&'static str>,
  out: &mut Vec<PrimitiveStep>,
) -> Result<(), DecompositionError> {
  let spec = registry
    .get(action)
    .ok_or_else(|| DecompositionError::UnknownAction(action.to_string()))?;

  if chain.contains(&spec.name) {
    let mut cycle: Vec<String> = chain.iter().map(|s| s.to_string()).collect();
    cycle.push(spec.name.to_string());
    return Err(DecompositionError::Cycle { chain: cycle });
  }

  if chain.len() >= max_depth {
    return Err(DecompositionError::DepthExceeded {
      action: chain.first().copied().unwrap_or(spec.name).to_string(),
      max: max_depth,
    });
  }

  spec.preflight(params)?;

  match spec.kind {
    ActionKind::Primitive(kind) => {
      out.push(PrimitiveStep {
        action: spec.name,
        kind,
        params: params.clone(),
      });
    }
    ActionKind::Composite(_) => {
      chain.push(spec.name);
      for child in spec.decompose(params) {
        trace!(parent = spec.name, child = %child.action, "decomposing");
        expand(&child.action, &child.params, registry, max_depth, chain, out)?;
      }
      chain.pop();
    }
  }

  Ok(())
}

fn str_param<'a>(params: &'a Params, key: &str) -> &'a str {
  params.get(key).and_then(Value::as_str).unwrap_or_default()
}

fn child(action: &str, parent: &Params, fields: Value) -> Step {
  let mut step = Step::new(action);
  if let Value::Object(map) = fields {
    step.params.extend(map);
  }
  for key in INHERITED_KEYS {
    if let Some(value) = parent.get(*key) {
      step.params.insert(key.to_string(), value.clone());
    }
  }
  step
}

/// Last path segment of a URL, without query string.
fn url_basename(url: &str) -> &str {
  let path = url.split(['?', '#']).next().unwrap_or(url);
  match path.rsplit('/').next() {
    Some(name) if !name.is_empty() => name,
    _ => "download",
  }
}

/// Bottles live on GHCR; `@` in versioned formula names becomes a path
/// separator there. The fragment selects the bottle for the target platform.
fn homebrew_bottle_url(formula: &str) -> String {
  format!(
    "https://ghcr.io/v2/homebrew/core/{}/manifests/{{version}}#{{bottle_tag}}",
    formula.replace('@', "/")
  )
}

fn github_release_url(params: &Params) -> String {
  format!(
    "https://github.com/{}/releases/download/{{version_tag}}/{}",
    str_param(params, "repo"),
    str_param(params, "asset_pattern")
  )
}

/// One level of composite expansion. Params have already passed preflight.
pub(crate) fn expand_composite(kind: CompositeKind, params: &Params) -> Vec<Step> {
  let executables = params.get("executables").cloned().unwrap_or_else(|| json!([]));

  match kind {
    CompositeKind::DownloadArchive => {
      let url = str_param(params, "url");
      let archive = url_basename(url);
      let binaries = params.get("binaries").cloned().unwrap_or_else(|| json!([]));
      let strip_dirs = params.get("strip_dirs").cloned().unwrap_or_else(|| json!(0));
      vec![
        child("download", params, json!({ "url": url, "dest": archive })),
        child(
          "extract",
          params,
          json!({
            "archive": archive,
            "format": str_param(params, "archive_format"),
            "strip_dirs": strip_dirs,
          }),
        ),
        child("chmod", params, json!({ "files": binaries })),
        child("install_binaries", params, json!({ "binaries": binaries })),
      ]
    }
    CompositeKind::GithubArchive => {
      let mut fields = json!({
        "url": github_release_url(params),
        "archive_format": str_param(params, "archive_format"),
        "binaries": params.get("binaries").cloned().unwrap_or_else(|| json!([])),
      });
      if let Some(strip) = params.get("strip_dirs") {
        fields["strip_dirs"] = strip.clone();
      }
      vec![child("download_archive", params, fields)]
    }
    CompositeKind::GithubFile => {
      let binary = str_param(params, "binary");
      vec![
        child("download", params, json!({ "url": github_release_url(params), "dest": binary })),
        child("chmod", params, json!({ "files": [binary] })),
        child("install_binaries", params, json!({ "binaries": [binary] })),
      ]
    }
    CompositeKind::CargoInstall => vec![child(
      "cargo_build",
      params,
      json!({ "crate": str_param(params, "crate"), "version": "{version}", "executables": executables }),
    )],
    CompositeKind::NpmInstall => vec![child(
      "npm_exec",
      params,
      json!({ "package": str_param(params, "package"), "version": "{version}", "executables": executables }),
    )],
    CompositeKind::PipxInstall => vec![child(
      "pip_exec",
      params,
      json!({ "package": str_param(params, "package"), "version": "{version}", "executables": executables }),
    )],
    CompositeKind::GemInstall => vec![child(
      "gem_exec",
      params,
      json!({ "gem": str_param(params, "gem"), "version": "{version}", "executables": executables }),
    )],
    CompositeKind::GoInstall => vec![child(
      "go_build",
      params,
      json!({ "module": str_param(params, "module"), "version": "{version}", "executables": executables }),
    )],
    CompositeKind::Homebrew => {
      let formula = str_param(params, "formula");
      let archive = format!("{formula}-{{version}}.{{bottle_tag}}.bottle.tar.gz");
      let binaries = params.get("binaries").cloned().unwrap_or_else(|| json!([]));
      vec![
        child("download", params, json!({ "url": homebrew_bottle_url(formula), "dest": archive })),
        // Bottles unpack to <formula>/<version>/...
        child(
          "extract",
          params,
          json!({ "archive": archive, "format": "tar.gz", "strip_dirs": 2 }),
        ),
        child("chmod", params, json!({ "files": binaries })),
        child("install_binaries", params, json!({ "binaries": binaries })),
      ]
    }
  }
}
