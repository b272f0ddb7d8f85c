//! Running external programs for package-manager and ecosystem steps.
//!
//! Programs are always spawned from a typed argv. Nothing here goes through a
//! shell, so parameters can never be interpreted as shell syntax.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tokio::process::Command;
use tracing::{debug, info};

use crate::execute::types::ExecuteError;

/// A program invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
  pub program: String,
  pub args: Vec<OsString>,
  pub env: Vec<(String, OsString)>,
  pub cwd: Option<PathBuf>,
}

impl Invocation {
  pub fn new(program: impl Into<String>) -> Self {
    Self {
      program: program.into(),
      args: Vec::new(),
      env: Vec::new(),
      cwd: None,
    }
  }

  pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
    self.args.push(arg.into());
    self
  }

  pub fn args<I, S>(mut self, args: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<OsString>,
  {
    self.args.extend(args.into_iter().map(Into::into));
    self
  }

  pub fn env(mut self, key: impl Into<String>, value: impl Into<OsString>) -> Self {
    self.env.push((key.into(), value.into()));
    self
  }

  pub fn current_dir(mut self, dir: &Path) -> Self {
    self.cwd = Some(dir.to_path_buf());
    self
  }

  /// Prefix with `sudo` (the program becomes the first argument).
  pub fn elevated(self) -> Self {
    let mut args = vec![OsString::from(self.program)];
    args.extend(self.args);
    Self {
      program: "sudo".to_string(),
      args,
      ..self
    }
  }

  /// Human-readable command line for messages.
  pub fn display(&self) -> String {
    let mut parts = vec![self.program.clone()];
    parts.extend(self.args.iter().map(|a| a.to_string_lossy().into_owned()));
    parts.join(" ")
  }
}

/// Spawn `invocation` and wait for it. Returns trimmed stdout on success.
pub async fn run(invocation: &Invocation) -> Result<String, ExecuteError> {
  let search_path = invocation.env.iter().find(|(key, _)| key == "PATH").map(|(_, value)| value);
  let found = match search_path {
    Some(paths) => which::which_in(&invocation.program, Some(paths), std::env::current_dir()?),
    None => which::which(&invocation.program),
  };
  let program = found.map_err(|_| ExecuteError::CommandNotFound {
    command: invocation.program.clone(),
    hint: None,
  })?;

  info!(command = %invocation.display(), "running command");

  let mut command = Command::new(&program);
  command.args(&invocation.args).kill_on_drop(true);
  for (key, value) in &invocation.env {
    command.env(key, value);
  }
  if let Some(cwd) = &invocation.cwd {
    command.current_dir(cwd);
  }

  let output = command.output().await?;
  let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
  let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

  if !output.status.success() {
    if !stdout.is_empty() {
      debug!(stdout = %stdout, "command stdout");
    }
    return Err(ExecuteError::CommandFailed {
      command: invocation.display(),
      code: output.status.code(),
      stderr,
    });
  }

  if !stderr.is_empty() {
    debug!(stderr = %stderr, "command stderr");
  }
  Ok(stdout)
}
