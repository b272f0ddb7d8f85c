//! Error, option and result types for plan execution.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::download::DownloadError;
use crate::plan::PlanValidationError;
use crate::state::StateError;

#[derive(Debug, Error)]
pub enum ExecuteError {
  #[error("invalid plan: {0}")]
  Validation(#[from] PlanValidationError),

  #[error("plan was generated for {plan} but this host is {host}; regenerate the plan with `tsuku eval`")]
  PlatformMismatch { plan: String, host: String },

  /// Never retried: a mismatch means the artifact is not the one that was planned.
  #[error("checksum mismatch for {tool}@{version} downloading {url}: expected {expected}, got {actual}")]
  ChecksumMismatch {
    tool: String,
    version: String,
    url: String,
    expected: String,
    actual: String,
  },

  #[error(transparent)]
  Download(#[from] DownloadError),

  #[error("execution of {tool} timed out after {}", humantime::format_duration(*after))]
  TimedOut { tool: String, after: Duration },

  #[error("{path} already exists but is not recorded as installed; re-run with --force to replace it")]
  AlreadyExists { path: PathBuf },

  #[error(
    "system packages are not installed automatically; run `{command}` yourself or set TSUKU_ALLOW_SYSTEM_PACKAGES=1"
  )]
  SystemPackagesDisabled { command: String },

  #[error("required command '{command}' not found in PATH{}", hint.as_deref().map(|h| format!(" ({h})")).unwrap_or_default())]
  CommandNotFound { command: String, hint: Option<String> },

  #[error("command failed with exit code {code:?}: {command}")]
  CommandFailed {
    command: String,
    code: Option<i32>,
    stderr: String,
  },

  #[error("'{name}' was not produced by step {step}")]
  MissingArtifact { step: usize, name: String },

  #[error("archive {archive}: {message}")]
  Archive { archive: PathBuf, message: String },

  #[error("step {step} ({action}): {reason}")]
  InvalidStep { step: usize, action: String, reason: String },

  #[error("'{action}' cannot be run by this runner")]
  UnsupportedAction { action: String },

  #[error(transparent)]
  State(#[from] StateError),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Default)]
pub struct ExecOptions {
  /// Reinstall even if this version is already installed.
  pub force: bool,
  /// Upper bound on the whole execution.
  pub timeout: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallResult {
  pub tool: String,
  pub version: String,
  pub install_dir: PathBuf,
  /// Links created in `bin/`.
  pub binaries: Vec<PathBuf>,
  /// True when the version was already installed and nothing ran.
  pub already_installed: bool,
}

/// Directories a step may touch.
#[derive(Debug, Clone)]
pub struct StepContext {
  pub tool: String,
  pub version: String,
  pub index: usize,
  /// Scratch space: downloads and extracted archives.
  pub work_dir: PathBuf,
  /// Becomes `tools/<tool>-<version>` once every step succeeds.
  pub install_dir: PathBuf,
  /// Where `install_dir` ends up. Anything that embeds an absolute path
  /// (wrapper scripts) must use this one.
  pub final_dir: PathBuf,
}

impl StepContext {
  pub fn bin_dir(&self) -> PathBuf {
    self.install_dir.join("bin")
  }
}
