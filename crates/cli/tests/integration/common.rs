//! Shared test helpers for CLI integration tests.

use std::path::PathBuf;

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;

/// Get path to a fixture file.
pub fn fixture_path(name: &str) -> PathBuf {
  PathBuf::from(env!("CARGO_MANIFEST_DIR"))
    .join("tests")
    .join("fixtures")
    .join(name)
}

/// Read fixture content.
pub fn fixture_content(name: &str) -> String {
  std::fs::read_to_string(fixture_path(name)).unwrap_or_else(|e| panic!("Failed to load fixture {}: {}", name, e))
}

/// A foreign OS for platform-mismatch tests.
pub fn other_os() -> &'static str {
  if cfg!(target_os = "macos") { "linux" } else { "darwin" }
}

/// Isolated test environment.
///
/// Each test gets its own home, recipe directory and lock file.
pub struct TestEnv {
  pub temp: TempDir,
}

impl TestEnv {
  /// An environment with the named fixture recipes installed in its recipe directory.
  pub fn with_recipes(names: &[&str]) -> Self {
    let env = Self {
      temp: TempDir::new().unwrap(),
    };
    for name in names {
      env.write_file(&format!("recipes/{name}.toml"), &fixture_content(&format!("{name}.toml")));
    }
    env
  }

  /// Write a file relative to the temp directory.
  pub fn write_file(&self, relative_path: &str, content: &str) -> PathBuf {
    let path = self.temp.path().join(relative_path);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
    path
  }

  /// `TSUKU_HOME` for this test.
  pub fn home(&self) -> PathBuf {
    let p = self.temp.path().join("home");
    std::fs::create_dir_all(&p).unwrap();
    dunce::canonicalize(&p).unwrap_or(p)
  }

  pub fn recipes_dir(&self) -> PathBuf {
    self.temp.path().join("recipes")
  }

  pub fn lock_path(&self) -> PathBuf {
    self.temp.path().join("tsuku.lock")
  }

  pub fn lock_json(&self) -> serde_json::Value {
    let content = std::fs::read_to_string(self.lock_path()).unwrap();
    serde_json::from_str(&content).unwrap()
  }

  /// Get a pre-configured Command for the tsuku binary.
  ///
  /// The GitHub API is pointed at an unroutable address so a test that
  /// accidentally resolves a version fails fast instead of reaching the
  /// network.
  pub fn tsuku_cmd(&self) -> Command {
    let mut cmd: Command = cargo_bin_cmd!("tsuku");
    cmd.env("TSUKU_HOME", self.home());
    cmd.env("TSUKU_RECIPES", self.recipes_dir());
    cmd.env("TSUKU_LOCK_FILE", self.lock_path());
    cmd.env("TSUKU_API_URL", "http://127.0.0.1:9");
    cmd.env_remove("GITHUB_TOKEN");
    cmd.env_remove("RUST_LOG");
    cmd.env_remove("TSUKU_ALLOW_SYSTEM_PACKAGES");
    cmd
  }

  /// Run `tsuku eval` and parse the plan it prints.
  pub fn eval(&self, args: &[&str]) -> serde_json::Value {
    let output = self.tsuku_cmd().arg("eval").args(args).output().unwrap();
    assert!(
      output.status.success(),
      "eval failed: {}",
      String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).unwrap()
  }
}
