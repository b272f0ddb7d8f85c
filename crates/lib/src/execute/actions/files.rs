//! `chmod` and `install_binaries`.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::debug;

use crate::action::preflight::parse_mode;
use crate::execute::types::{ExecuteError, StepContext};
use crate::plan::binary_name;

/// Mode applied when a `chmod` step does not name one.
const DEFAULT_MODE: u32 = 0o755;

pub async fn chmod(ctx: &StepContext, files: &[&str], mode: Option<&str>) -> Result<(), ExecuteError> {
  let mode = mode.and_then(parse_mode).unwrap_or(DEFAULT_MODE);
  for file in files {
    let path = existing(ctx, file).await?;
    set_mode(&path, mode).await?;
    debug!(path = %path.display(), mode = format!("{mode:o}"), "chmod");
  }
  Ok(())
}

/// Copy each binary from the work dir into `install/bin/`. Returns the
/// installed paths.
pub async fn install_binaries(ctx: &StepContext, binaries: &[&str]) -> Result<Vec<PathBuf>, ExecuteError> {
  let bin_dir = ctx.bin_dir();
  fs::create_dir_all(&bin_dir).await?;

  let mut installed = Vec::with_capacity(binaries.len());
  for binary in binaries {
    let source = existing(ctx, binary).await?;
    let Some(name) = binary_name(binary) else {
      return Err(ExecuteError::MissingArtifact {
        step: ctx.index,
        name: binary.to_string(),
      });
    };
    let dest = bin_dir.join(&name);
    fs::copy(&source, &dest).await?;
    set_mode(&dest, DEFAULT_MODE).await?;
    debug!(binary = %name, "installed");
    installed.push(dest);
  }
  Ok(installed)
}

async fn existing(ctx: &StepContext, relative: &str) -> Result<PathBuf, ExecuteError> {
  let path = ctx.work_dir.join(relative);
  if fs::try_exists(&path).await? {
    Ok(path)
  } else {
    Err(ExecuteError::MissingArtifact {
      step: ctx.index,
      name: relative.to_string(),
    })
  }
}

#[cfg(unix)]
async fn set_mode(path: &Path, mode: u32) -> Result<(), ExecuteError> {
  use std::os::unix::fs::PermissionsExt;
  fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).await?;
  Ok(())
}

#[cfg(not(unix))]
async fn set_mode(_path: &Path, _mode: u32) -> Result<(), ExecuteError> {
  Ok(())
}
