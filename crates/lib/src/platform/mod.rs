//! Target platform description and host detection.

pub mod arch;
pub mod family;
pub mod os;
pub mod paths;

pub use arch::Arch;
pub use family::LinuxFamily;
pub use os::Os;

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum PlatformError {
  #[error("unsupported operating system: {0}")]
  UnsupportedOs(String),

  #[error("unsupported architecture: {0}")]
  UnsupportedArch(String),

  #[error("unknown linux family: {0} (expected one of debian, rhel, arch, alpine, suse)")]
  UnsupportedFamily(String),

  #[error("could not detect the host platform")]
  UndetectedHost,
}

/// The (os, arch, linux family) a plan is generated for.
///
/// `linux_family` is only ever set when `os` is Linux.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Platform {
  pub os: Os,
  pub arch: Arch,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub linux_family: Option<LinuxFamily>,
}

impl Platform {
  pub fn new(os: Os, arch: Arch) -> Self {
    Self {
      os,
      arch,
      linux_family: None,
    }
  }

  /// Attach a linux family. Ignored for non-Linux targets.
  pub fn with_linux_family(mut self, family: Option<LinuxFamily>) -> Self {
    self.linux_family = if self.os == Os::Linux { family } else { None };
    self
  }

  /// Key used by the lock file, e.g. `linux-amd64`.
  pub fn key(&self) -> String {
    format!("{}-{}", self.os, self.arch)
  }

  /// Family-qualified key, e.g. `linux-amd64-debian`. Falls back to [`Platform::key`].
  pub fn qualified_key(&self) -> String {
    match self.linux_family {
      Some(family) => format!("{}-{}", self.key(), family),
      None => self.key(),
    }
  }

  /// Tag Homebrew publishes bottles for on this os/arch.
  pub fn bottle_tag(&self) -> &'static str {
    match (self.os, self.arch) {
      (Os::Darwin, Arch::Arm64) => "arm64_sonoma",
      (Os::Darwin, Arch::Amd64) => "sonoma",
      (Os::Linux, Arch::Arm64) => "arm64_linux",
      (Os::Linux, Arch::Amd64) => "x86_64_linux",
    }
  }

  /// Whether this platform can run a plan generated for `target`.
  ///
  /// A plan without a family runs on any family of the same os/arch.
  pub fn can_run(&self, target: &Platform) -> bool {
    if self.os != target.os || self.arch != target.arch {
      return false;
    }
    match (self.linux_family, target.linux_family) {
      (Some(host), Some(wanted)) => host == wanted,
      (None, Some(_)) => false,
      _ => true,
    }
  }
}

impl fmt::Display for Platform {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}/{}", self.os, self.arch)?;
    if let Some(family) = self.linux_family {
      write!(f, " ({})", family)?;
    }
    Ok(())
  }
}

/// Source of the host platform, injectable so evaluation can be tested for foreign targets.
pub trait PlatformDetector: Send + Sync {
  fn detect(&self) -> Result<Platform, PlatformError>;
}

/// Detects the running host from compile-time constants and `/etc/os-release`.
#[derive(Debug, Clone)]
pub struct HostDetector {
  os_release: PathBuf,
}

impl Default for HostDetector {
  fn default() -> Self {
    Self {
      os_release: PathBuf::from("/etc/os-release"),
    }
  }
}

impl HostDetector {
  pub fn with_os_release(path: impl Into<PathBuf>) -> Self {
    Self {
      os_release: path.into(),
    }
  }
}

impl PlatformDetector for HostDetector {
  fn detect(&self) -> Result<Platform, PlatformError> {
    let os = Os::current().ok_or(PlatformError::UndetectedHost)?;
    let arch = Arch::current().ok_or(PlatformError::UndetectedHost)?;

    let family = if os == Os::Linux {
      match std::fs::read_to_string(&self.os_release) {
        Ok(contents) => LinuxFamily::from_os_release(&contents),
        Err(err) => {
          debug!(path = %self.os_release.display(), error = %err, "os-release unreadable");
          None
        }
      }
    } else {
      None
    };

    Ok(Platform::new(os, arch).with_linux_family(family))
  }
}
