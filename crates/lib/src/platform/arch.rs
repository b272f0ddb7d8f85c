use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::PlatformError;

/// CPU architectures a plan can target, named the way release assets usually are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Arch {
  Amd64,
  Arm64,
}

impl Arch {
  /// Detect the current CPU architecture at runtime
  pub fn current() -> Option<Self> {
    match std::env::consts::ARCH {
      "x86_64" => Some(Self::Amd64),
      "aarch64" => Some(Self::Arm64),
      _ => None,
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Amd64 => "amd64",
      Self::Arm64 => "arm64",
    }
  }
}

impl fmt::Display for Arch {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

impl FromStr for Arch {
  type Err = PlatformError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "amd64" | "x86_64" => Ok(Self::Amd64),
      "arm64" | "aarch64" => Ok(Self::Arm64),
      other => Err(PlatformError::UnsupportedArch(other.to_string())),
    }
  }
}
