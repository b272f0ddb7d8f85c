//! Structural checks applied to every plan before it is executed.
//!
//! Plans read from a file or stdin are untrusted: they are held to the same
//! rules the evaluator guarantees for plans it builds itself.

use serde_json::Value;
use thiserror::Error;

use super::types::{InstallationPlan, PLAN_FORMAT_VERSION, ResolvedStep};
use crate::action::{DecompositionError, Registry};
use crate::recipe::validate_tool_name;
use crate::template::{self, Segment};
use crate::util::hash::is_sha256_hex;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanValidationError {
  #[error("unsupported plan format version {found} (expected {expected})")]
  UnsupportedFormat { found: u32, expected: u32 },

  #[error("invalid tool name '{0}'")]
  InvalidTool(String),

  #[error("plan has no version")]
  MissingVersion,

  #[error("plan has no steps")]
  Empty,

  #[error("step {index}: unknown action '{action}'")]
  UnknownAction { index: usize, action: String },

  #[error("step {index}: '{action}' is a composite action; plans may only contain primitives")]
  NonPrimitive { index: usize, action: String },

  #[error("step {index}: {source}")]
  Params {
    index: usize,
    #[source]
    source: DecompositionError,
  },

  #[error("step {index}: unexpanded template in '{key}'")]
  UnexpandedTemplate { index: usize, key: String },

  #[error("step {index}: download of {url} has no checksum")]
  MissingChecksum { index: usize, url: String },

  #[error("step {index}: '{checksum}' is not a SHA-256 hex digest")]
  InvalidChecksum { index: usize, checksum: String },

  #[error("step {index}: '{action}' must have evaluable = {expected}")]
  EvaluableMismatch { index: usize, action: String, expected: bool },

  #[error("plan declares deterministic = {declared} but its steps say {computed}")]
  DeterministicMismatch { declared: bool, computed: bool },
}

pub fn validate_plan(plan: &InstallationPlan, registry: &Registry) -> Result<(), PlanValidationError> {
  if plan.format_version != PLAN_FORMAT_VERSION {
    return Err(PlanValidationError::UnsupportedFormat {
      found: plan.format_version,
      expected: PLAN_FORMAT_VERSION,
    });
  }
  if validate_tool_name(&plan.tool).is_err() {
    return Err(PlanValidationError::InvalidTool(plan.tool.clone()));
  }
  if plan.version.trim().is_empty() {
    return Err(PlanValidationError::MissingVersion);
  }
  if plan.steps.is_empty() {
    return Err(PlanValidationError::Empty);
  }

  for (index, step) in plan.steps.iter().enumerate() {
    validate_step(index, step, registry)?;
  }

  let computed = plan.steps.iter().all(|step| step.evaluable);
  if plan.deterministic != computed {
    return Err(PlanValidationError::DeterministicMismatch {
      declared: plan.deterministic,
      computed,
    });
  }
  Ok(())
}

fn validate_step(index: usize, step: &ResolvedStep, registry: &Registry) -> Result<(), PlanValidationError> {
  let Some(spec) = registry.get(&step.action) else {
    return Err(PlanValidationError::UnknownAction {
      index,
      action: step.action.clone(),
    });
  };
  if !spec.kind.is_primitive() {
    return Err(PlanValidationError::NonPrimitive {
      index,
      action: step.action.clone(),
    });
  }
  spec
    .preflight(&step.params)
    .map_err(|source| PlanValidationError::Params { index, source })?;

  for (key, value) in &step.params {
    if has_template(value) {
      return Err(PlanValidationError::UnexpandedTemplate { index, key: key.clone() });
    }
  }

  if step.action == "download" {
    let url = step.url().unwrap_or_default().to_string();
    let Some(checksum) = &step.checksum else {
      return Err(PlanValidationError::MissingChecksum { index, url });
    };
    if !is_sha256_hex(checksum) {
      return Err(PlanValidationError::InvalidChecksum {
        index,
        checksum: checksum.clone(),
      });
    }
  }

  let expected = spec.metadata().deterministic;
  if step.evaluable != expected {
    return Err(PlanValidationError::EvaluableMismatch {
      index,
      action: step.action.clone(),
      expected,
    });
  }
  Ok(())
}

fn has_template(value: &Value) -> bool {
  match value {
    Value::String(s) => template::parse(s).iter().any(|segment| matches!(segment, Segment::Var(_))),
    Value::Array(items) => items.iter().any(has_template),
    Value::Object(map) => map.values().any(has_template),
    _ => false,
  }
}
