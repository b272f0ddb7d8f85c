use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::PlatformError;

/// Operating systems a plan can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Os {
  Linux,
  Darwin,
}

impl Os {
  /// Detect the current operating system at runtime
  pub fn current() -> Option<Self> {
    match std::env::consts::OS {
      "linux" => Some(Self::Linux),
      "macos" => Some(Self::Darwin),
      _ => None,
    }
  }

  /// Returns the lowercase string identifier used in plans and templates
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Linux => "linux",
      Self::Darwin => "darwin",
    }
  }
}

impl fmt::Display for Os {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

impl FromStr for Os {
  type Err = PlatformError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "linux" => Ok(Self::Linux),
      "darwin" | "macos" => Ok(Self::Darwin),
      other => Err(PlatformError::UnsupportedOs(other.to_string())),
    }
  }
}
