//! Linux distribution families and `/etc/os-release` detection.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::PlatformError;

/// Distribution family, used to pick the right system package manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinuxFamily {
  Debian,
  Rhel,
  Arch,
  Alpine,
  Suse,
}

impl LinuxFamily {
  pub const ALL: [LinuxFamily; 5] = [Self::Debian, Self::Rhel, Self::Arch, Self::Alpine, Self::Suse];

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Debian => "debian",
      Self::Rhel => "rhel",
      Self::Arch => "arch",
      Self::Alpine => "alpine",
      Self::Suse => "suse",
    }
  }

  /// Map a single os-release identifier (an `ID` or one `ID_LIKE` token) to a family.
  fn from_distro_id(id: &str) -> Option<Self> {
    match id {
      "debian" | "ubuntu" | "linuxmint" | "pop" | "raspbian" | "elementary" | "kali" => Some(Self::Debian),
      "rhel" | "fedora" | "centos" | "rocky" | "almalinux" | "amzn" | "ol" => Some(Self::Rhel),
      "arch" | "manjaro" | "endeavouros" | "garuda" => Some(Self::Arch),
      "alpine" => Some(Self::Alpine),
      "suse" | "sles" | "opensuse" | "opensuse-leap" | "opensuse-tumbleweed" => Some(Self::Suse),
      _ => None,
    }
  }

  /// Detect the family from the contents of an os-release file.
  ///
  /// `ID` wins over `ID_LIKE`; the first recognised `ID_LIKE` token is used otherwise.
  pub fn from_os_release(contents: &str) -> Option<Self> {
    let mut id = None;
    let mut id_like = None;

    for line in contents.lines() {
      let Some((key, value)) = line.trim().split_once('=') else {
        continue;
      };
      let value = value.trim().trim_matches('"').trim_matches('\'').to_ascii_lowercase();
      match key {
        "ID" => id = Some(value),
        "ID_LIKE" => id_like = Some(value),
        _ => {}
      }
    }

    if let Some(family) = id.as_deref().and_then(Self::from_distro_id) {
      return Some(family);
    }

    id_like?.split_whitespace().find_map(Self::from_distro_id)
  }
}

impl fmt::Display for LinuxFamily {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

impl FromStr for LinuxFamily {
  type Err = PlatformError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::ALL
      .into_iter()
      .find(|f| f.as_str() == s)
      .ok_or_else(|| PlatformError::UnsupportedFamily(s.to_string()))
  }
}
