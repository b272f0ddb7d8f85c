//! Template variables in recipe parameters.
//!
//! Step parameters may reference values that are only known once a version and
//! target platform have been chosen:
//!
//! - `{version}` - resolved version, e.g. `14.1.0`
//! - `{version_tag}` - release tag, e.g. `v14.1.0`
//! - `{os}` - target os, after `os_mapping`
//! - `{arch}` - target arch, after `arch_mapping`
//! - `{bottle_tag}` - Homebrew bottle tag of the target, e.g. `x86_64_linux`
//!
//! Anything else in braces (including an unclosed `{`) is kept literally, so
//! strings like `${HOME}` or JSON fragments pass through untouched.
//!
//! ```
//! use tsuku_lib::template::{parse, Segment, Var};
//!
//! let segments = parse("rg-{version}-{arch}.tar.gz");
//! assert_eq!(segments, vec![
//!     Segment::Literal("rg-".to_string()),
//!     Segment::Var(Var::Version),
//!     Segment::Literal("-".to_string()),
//!     Segment::Var(Var::Arch),
//!     Segment::Literal(".tar.gz".to_string()),
//! ]);
//! ```

use serde_json::Value;

use crate::platform::Platform;
use crate::recipe::Params;

/// Parameter keys holding per-step renames for `{os}` and `{arch}`.
pub const OS_MAPPING: &str = "os_mapping";
pub const ARCH_MAPPING: &str = "arch_mapping";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Var {
  Version,
  VersionTag,
  Os,
  Arch,
  BottleTag,
}

impl Var {
  fn from_name(name: &str) -> Option<Self> {
    match name {
      "version" => Some(Self::Version),
      "version_tag" => Some(Self::VersionTag),
      "os" => Some(Self::Os),
      "arch" => Some(Self::Arch),
      "bottle_tag" => Some(Self::BottleTag),
      _ => None,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
  Literal(String),
  Var(Var),
}

/// Source of variable values.
pub trait Resolver {
  fn resolve(&self, var: Var) -> &str;
}

/// Variable values for one (version, platform) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateVars {
  pub version: String,
  pub version_tag: String,
  pub os: String,
  pub arch: String,
  pub bottle_tag: String,
}

impl TemplateVars {
  pub fn new(version: &str, version_tag: &str, platform: &Platform) -> Self {
    Self {
      version: version.to_string(),
      version_tag: version_tag.to_string(),
      os: platform.os.as_str().to_string(),
      arch: platform.arch.as_str().to_string(),
      bottle_tag: platform.bottle_tag().to_string(),
    }
  }

  /// Apply a step's `os_mapping` / `arch_mapping` tables, if any.
  pub fn with_mappings(&self, params: &Params) -> Self {
    let mut vars = self.clone();
    if let Some(mapped) = lookup_mapping(params, OS_MAPPING, &self.os) {
      vars.os = mapped;
    }
    if let Some(mapped) = lookup_mapping(params, ARCH_MAPPING, &self.arch) {
      vars.arch = mapped;
    }
    vars
  }
}

impl Resolver for TemplateVars {
  fn resolve(&self, var: Var) -> &str {
    match var {
      Var::Version => &self.version,
      Var::VersionTag => &self.version_tag,
      Var::Os => &self.os,
      Var::Arch => &self.arch,
      Var::BottleTag => &self.bottle_tag,
    }
  }
}

fn lookup_mapping(params: &Params, key: &str, value: &str) -> Option<String> {
  params.get(key)?.get(value)?.as_str().map(str::to_string)
}

/// Split a string into literal text and variable references.
pub fn parse(input: &str) -> Vec<Segment> {
  let mut segments = Vec::new();
  let mut literal = String::new();
  let mut rest = input;

  while let Some(open) = rest.find('{') {
    literal.push_str(&rest[..open]);
    let after = &rest[open + 1..];

    let Some(close) = after.find('}') else {
      literal.push_str(&rest[open..]);
      rest = "";
      break;
    };

    let name = &after[..close];
    match Var::from_name(name) {
      Some(var) => {
        if !literal.is_empty() {
          segments.push(Segment::Literal(std::mem::take(&mut literal)));
        }
        segments.push(Segment::Var(var));
      }
      None => {
        literal.push('{');
        literal.push_str(name);
        literal.push('}');
      }
    }
    rest = &after[close + 1..];
  }

  literal.push_str(rest);
  if !literal.is_empty() {
    segments.push(Segment::Literal(literal));
  }

  segments
}

pub fn substitute(input: &str, resolver: &impl Resolver) -> String {
  substitute_segments(&parse(input), resolver)
}

pub fn substitute_segments(segments: &[Segment], resolver: &impl Resolver) -> String {
  let mut result = String::new();
  for segment in segments {
    match segment {
      Segment::Literal(s) => result.push_str(s),
      Segment::Var(var) => result.push_str(resolver.resolve(*var)),
    }
  }
  result
}

/// Expand every string in `params` (recursively) and drop the mapping tables.
pub fn expand_params(params: &Params, vars: &TemplateVars) -> Params {
  let vars = vars.with_mappings(params);
  params
    .iter()
    .filter(|(key, _)| key.as_str() != OS_MAPPING && key.as_str() != ARCH_MAPPING)
    .map(|(key, value)| (key.clone(), expand_value(value, &vars)))
    .collect()
}

fn expand_value(value: &Value, vars: &TemplateVars) -> Value {
  match value {
    Value::String(s) => Value::String(substitute(s, vars)),
    Value::Array(items) => Value::Array(items.iter().map(|v| expand_value(v, vars)).collect()),
    Value::Object(map) => Value::Object(map.iter().map(|(k, v)| (k.clone(), expand_value(v, vars))).collect()),
    other => other.clone(),
  }
}
