//! Host-level actions: system package managers, PATH checks, manual steps.

use tracing::{info, warn};

use super::command::{self, Invocation};
use crate::action::PackageManager;
use crate::execute::types::ExecuteError;

/// argv for installing `packages` with `pm`, elevated when the manager
/// needs root and we are not already root.
pub fn package_invocation(pm: PackageManager, packages: &[&str]) -> Invocation {
  let (program, args) = pm.command();
  let invocation = Invocation::new(program).args(args.iter().copied()).args(packages.iter().copied());
  if pm.needs_root() && !is_root() { invocation.elevated() } else { invocation }
}

pub async fn package_install(pm: PackageManager, packages: &[&str], allowed: bool) -> Result<(), ExecuteError> {
  let invocation = package_invocation(pm, packages);
  if !allowed {
    return Err(ExecuteError::SystemPackagesDisabled {
      command: invocation.display(),
    });
  }
  command::run(&invocation).await?;
  info!(manager = ?pm, packages = %packages.join(" "), "system packages installed");
  Ok(())
}

pub fn require_command(name: &str) -> Result<(), ExecuteError> {
  match which::which(name) {
    Ok(path) => {
      info!(command = name, path = %path.display(), "required command found");
      Ok(())
    }
    Err(_) => Err(ExecuteError::CommandNotFound {
      command: name.to_string(),
      hint: Some("install it with your system package manager".to_string()),
    }),
  }
}

/// Manual steps cannot be automated; surface the instructions and continue.
pub fn manual(text: &str) {
  warn!(instructions = %text, "manual step");
}

#[cfg(unix)]
fn is_root() -> bool {
  rustix::process::geteuid().is_root()
}

#[cfg(not(unix))]
fn is_root() -> bool {
  false
}
