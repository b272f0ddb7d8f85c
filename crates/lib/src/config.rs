//! Runtime configuration resolved from the environment.
//!
//! | Variable | Default |
//! |---|---|
//! | `TSUKU_HOME` | `~/.tsuku` |
//! | `TSUKU_RECIPES` | `$TSUKU_HOME/recipes` |
//! | `TSUKU_LOCK_FILE` | `./tsuku.lock` |
//! | `TSUKU_API_URL` | `https://api.github.com` |
//! | `GITHUB_TOKEN` | unset |
//! | `TSUKU_ALLOW_SYSTEM_PACKAGES` | unset (system package managers are not invoked) |

use std::path::PathBuf;

use crate::consts::{DEFAULT_API_URL, LOCK_FILENAME, STATE_FILENAME, STATE_LOCK_FILENAME};
use crate::platform::paths;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
  pub home: PathBuf,
  pub recipes_dir: PathBuf,
  pub lock_file: PathBuf,
  pub api_url: String,
  pub github_token: Option<String>,
  pub allow_system_packages: bool,
}

impl Config {
  pub fn from_env() -> Self {
    Self {
      home: paths::tsuku_home(),
      recipes_dir: paths::recipes_dir(),
      lock_file: paths::lock_file(),
      api_url: non_empty_var("TSUKU_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
      github_token: non_empty_var("GITHUB_TOKEN"),
      allow_system_packages: non_empty_var("TSUKU_ALLOW_SYSTEM_PACKAGES")
        .is_some_and(|v| matches!(v.as_str(), "1" | "true" | "yes")),
    }
  }

  /// Configuration rooted at `home` with every other value defaulted. Used by tests.
  pub fn with_home(home: impl Into<PathBuf>) -> Self {
    let home = home.into();
    Self {
      recipes_dir: home.join("recipes"),
      lock_file: home.join(LOCK_FILENAME),
      home,
      api_url: DEFAULT_API_URL.to_string(),
      github_token: None,
      allow_system_packages: false,
    }
  }

  pub fn tools_dir(&self) -> PathBuf {
    self.home.join("tools")
  }

  pub fn bin_dir(&self) -> PathBuf {
    self.home.join("bin")
  }

  pub fn downloads_dir(&self) -> PathBuf {
    self.home.join("cache").join("downloads")
  }

  pub fn state_path(&self) -> PathBuf {
    self.home.join(STATE_FILENAME)
  }

  pub fn state_lock_path(&self) -> PathBuf {
    self.home.join(STATE_LOCK_FILENAME)
  }

  /// Final install directory for one tool version.
  pub fn tool_dir(&self, tool: &str, version: &str) -> PathBuf {
    self.tools_dir().join(format!("{tool}-{version}"))
  }
}

fn non_empty_var(name: &str) -> Option<String> {
  std::env::var(name).ok().filter(|v| !v.is_empty())
}
