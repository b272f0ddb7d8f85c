//! The user-owned lock file (`tsuku.lock`).
//!
//! The lock file records, per tool, the version that was locked and for each
//! platform the downloads that version resolved to. It is meant to be
//! committed and merged like any other source file, so it is only ever
//! written by an explicit `tsuku lock`.
//!
//! # Format
//!
//! ```json
//! {
//!   "version": 1,
//!   "tools": {
//!     "ripgrep": {
//!       "version": "14.1.0",
//!       "platforms": {
//!         "linux-amd64": {
//!           "downloads": [
//!             { "url": "https://github.com/...", "checksum": "9f86d0...", "size": 2092402 }
//!           ],
//!           "resolved_at": 1733667300
//!         }
//!       }
//!     }
//!   }
//! }
//! ```
//!
//! Platform keys are `{os}-{arch}`, optionally qualified with the Linux family
//! (`linux-amd64-debian`). Lookups prefer the qualified key.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::plan::{DownloadRecord, InstallationPlan};
use crate::platform::Platform;
use crate::util::unix_now;

/// Current lock file format version.
pub const LOCK_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum LockError {
  #[error("failed to read lock file {path}: {source}")]
  Read {
    path: String,
    #[source]
    source: io::Error,
  },

  #[error("failed to write lock file {path}: {source}")]
  Write {
    path: String,
    #[source]
    source: io::Error,
  },

  #[error("failed to parse lock file {path}: {source}")]
  Parse {
    path: String,
    #[source]
    source: serde_json::Error,
  },

  #[error("failed to serialize lock file: {0}")]
  Serialize(#[source] serde_json::Error),

  #[error("unsupported lock file version {0}, expected {LOCK_VERSION}")]
  UnsupportedVersion(u32),
}

/// What a resolution produced on one platform; recorded in state after
/// every install and snapshotted into the lock file by `tsuku lock`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionMetadata {
  pub platform: Platform,
  pub downloads: Vec<DownloadRecord>,
  pub resolved_at: u64,
}

impl ResolutionMetadata {
  pub fn from_plan(plan: &InstallationPlan) -> Self {
    Self {
      platform: plan.platform,
      downloads: plan.downloads(),
      resolved_at: unix_now(),
    }
  }

  /// Key this resolution is stored under in the lock file.
  pub fn platform_key(&self) -> String {
    self.platform.qualified_key()
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockFile {
  pub version: u32,
  #[serde(default)]
  pub tools: BTreeMap<String, LockedTool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockedTool {
  pub version: String,
  #[serde(default)]
  pub platforms: BTreeMap<String, LockedPlatform>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockedPlatform {
  pub downloads: Vec<DownloadRecord>,
  #[serde(default)]
  pub resolved_at: u64,
}

/// Result of [`LockFile::lookup`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockEntry<'a> {
  pub tool: &'a str,
  pub version: &'a str,
  /// Present only when this exact platform was locked.
  pub platform: Option<&'a LockedPlatform>,
}

impl Default for LockFile {
  fn default() -> Self {
    Self::new()
  }
}

impl LockFile {
  pub fn new() -> Self {
    Self {
      version: LOCK_VERSION,
      tools: BTreeMap::new(),
    }
  }

  /// Load a lock file from the given path.
  ///
  /// Returns `Ok(None)` if the file doesn't exist.
  pub fn load(path: &Path) -> Result<Option<Self>, LockError> {
    let content = match fs::read_to_string(path) {
      Ok(content) => content,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
      Err(source) => {
        return Err(LockError::Read {
          path: path.display().to_string(),
          source,
        });
      }
    };

    let lock: LockFile = serde_json::from_str(&content).map_err(|source| LockError::Parse {
      path: path.display().to_string(),
      source,
    })?;

    if lock.version != LOCK_VERSION {
      return Err(LockError::UnsupportedVersion(lock.version));
    }

    Ok(Some(lock))
  }

  /// Write pretty-printed JSON via a temp file in the same directory and an
  /// atomic rename.
  pub fn save(&self, path: &Path) -> Result<(), LockError> {
    let mut content = serde_json::to_string_pretty(self).map_err(LockError::Serialize)?;
    content.push('\n');

    let write_err = |source: io::Error| LockError::Write {
      path: path.display().to_string(),
      source,
    };
    let dir = match path.parent() {
      Some(parent) if !parent.as_os_str().is_empty() => parent,
      _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(write_err)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(content.as_bytes()).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    debug!(path = %path.display(), tools = self.tools.len(), "lock file saved");
    Ok(())
  }

  /// Find the entry for `tool`, matching the platform by qualified key first
  /// and then by plain `{os}-{arch}` key.
  pub fn lookup<'a>(&'a self, tool: &'a str, platform: &Platform) -> Option<LockEntry<'a>> {
    let locked = self.tools.get(tool)?;
    let entry = locked
      .platforms
      .get(&platform.qualified_key())
      .or_else(|| locked.platforms.get(&platform.key()));
    Some(LockEntry {
      tool,
      version: &locked.version,
      platform: entry,
    })
  }

  /// Merge one platform's resolution into the file. Other platforms of the
  /// same tool are kept when the version is unchanged and dropped otherwise.
  pub fn update_from_resolution(&mut self, tool: &str, version: &str, resolution: &ResolutionMetadata) {
    let key = resolution.platform_key();
    let locked = self.tools.entry(tool.to_string()).or_insert_with(|| LockedTool {
      version: version.to_string(),
      platforms: BTreeMap::new(),
    });

    if locked.version != version {
      let stale: Vec<_> = locked.platforms.keys().filter(|k| **k != key).cloned().collect();
      if !stale.is_empty() {
        warn!(
          tool,
          old = %locked.version,
          new = version,
          platforms = %stale.join(", "),
          "lock version changed; dropping entries for other platforms"
        );
      }
      locked.version = version.to_string();
      locked.platforms.clear();
    }

    locked.platforms.insert(
      key,
      LockedPlatform {
        downloads: resolution.downloads.clone(),
        resolved_at: resolution.resolved_at,
      },
    );
  }
}
