//! Install state (`$TSUKU_HOME/state.json`).
//!
//! The state file is shared by every tsuku process on the machine. Reads
//! take a shared [`FileLock`], and all mutation goes through
//! [`StateManager::update`], which holds the exclusive lock across the whole
//! read-modify-write and replaces the file atomically.

mod file_lock;
mod types;

pub use file_lock::{FileLock, FileLockError, LockMetadata, LockMode};
pub use types::{STATE_VERSION, State, ToolState, VersionState};

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::config::Config;

#[derive(Debug, Error)]
pub enum StateError {
  #[error(transparent)]
  Lock(#[from] FileLockError),

  #[error("failed to read state file {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to parse state file {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("failed to write state file {path}: {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to serialize state: {0}")]
  Serialize(#[source] serde_json::Error),

  #[error("unsupported state file version {0}, expected {STATE_VERSION}")]
  UnsupportedVersion(u32),
}

/// Handle to the state file. Cheap to clone; holds no lock between calls.
#[derive(Debug, Clone)]
pub struct StateManager {
  path: PathBuf,
  lock_path: PathBuf,
}

impl StateManager {
  pub fn new(path: impl Into<PathBuf>, lock_path: impl Into<PathBuf>) -> Self {
    Self {
      path: path.into(),
      lock_path: lock_path.into(),
    }
  }

  pub fn from_config(config: &Config) -> Self {
    Self::new(config.state_path(), config.state_lock_path())
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// Snapshot of the current state. Missing file means empty state.
  pub fn load(&self) -> Result<State, StateError> {
    let _lock = FileLock::acquire(&self.lock_path, LockMode::Shared, "read state")?;
    self.read()
  }

  /// Apply `f` to the state under the exclusive lock and persist the result.
  ///
  /// Nothing is written if `f` returns an error.
  pub fn update<T, E>(&self, command: &str, f: impl FnOnce(&mut State) -> Result<T, E>) -> Result<T, E>
  where
    E: From<StateError>,
  {
    let _lock = FileLock::acquire(&self.lock_path, LockMode::Exclusive, command).map_err(StateError::from)?;
    let mut state = self.read()?;
    let out = f(&mut state)?;
    self.write(&state)?;
    debug!(path = %self.path.display(), command, "state updated");
    Ok(out)
  }

  pub fn is_installed(&self, tool: &str) -> Result<bool, StateError> {
    Ok(self.load()?.is_installed(tool))
  }

  fn read(&self) -> Result<State, StateError> {
    let content = match fs::read_to_string(&self.path) {
      Ok(content) => content,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(State::default()),
      Err(source) => {
        return Err(StateError::Read {
          path: self.path.clone(),
          source,
        });
      }
    };
    if content.trim().is_empty() {
      return Ok(State::default());
    }

    let state: State = serde_json::from_str(&content).map_err(|source| StateError::Parse {
      path: self.path.clone(),
      source,
    })?;
    if state.version != STATE_VERSION {
      return Err(StateError::UnsupportedVersion(state.version));
    }
    Ok(state)
  }

  fn write(&self, state: &State) -> Result<(), StateError> {
    let content = serde_json::to_string_pretty(state).map_err(StateError::Serialize)?;
    let write_err = |source: io::Error| StateError::Write {
      path: self.path.clone(),
      source,
    };

    let dir = match self.path.parent() {
      Some(parent) if !parent.as_os_str().is_empty() => parent,
      _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(write_err)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(content.as_bytes()).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;
    tmp.persist(&self.path).map_err(|e| write_err(e.error))?;
    Ok(())
  }
}
