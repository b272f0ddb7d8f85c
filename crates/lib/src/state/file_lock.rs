//! Advisory file locking for the state file.
//!
//! Locks are tied to an open file handle and released when the handle is
//! dropped, so every exit path (errors, panics, cancelled futures) lets go
//! of the lock.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::util::unix_now;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
  Shared,
  Exclusive,
}

/// Written by exclusive holders so waiters can say who they are waiting on.
#[derive(Debug, Serialize, Deserialize)]
pub struct LockMetadata {
  pub pid: u32,
  pub started_at_unix: u64,
  pub command: String,
}

#[derive(Debug, Error)]
pub enum FileLockError {
  #[error("failed to create lock directory {path}: {source}")]
  CreateDir {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to open lock file {path}: {source}")]
  Open {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to lock {path}: {source}")]
  Lock {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to write lock metadata to {path}: {source}")]
  WriteMetadata {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

#[derive(Debug)]
pub struct FileLock {
  file: File,
  path: PathBuf,
  mode: LockMode,
}

impl FileLock {
  /// Acquire `mode` on `path`, waiting for other holders if necessary.
  pub fn acquire(path: &Path, mode: LockMode, command: &str) -> Result<Self, FileLockError> {
    if let Some(parent) = path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent).map_err(|source| FileLockError::CreateDir {
        path: parent.to_path_buf(),
        source,
      })?;
    }

    let file = OpenOptions::new()
      .read(true)
      .write(true)
      .create(true)
      .truncate(false)
      .open(path)
      .map_err(|source| FileLockError::Open {
        path: path.to_path_buf(),
        source,
      })?;

    let lock_err = |source: io::Error| FileLockError::Lock {
      path: path.to_path_buf(),
      source,
    };

    match lock(&file, mode, false) {
      Ok(()) => {}
      Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
        match read_metadata_from(path) {
          Some(holder) => info!(
            path = %path.display(),
            pid = holder.pid,
            command = %holder.command,
            since = holder.started_at_unix,
            "waiting for state lock"
          ),
          None => info!(path = %path.display(), "waiting for state lock"),
        }
        lock(&file, mode, true).map_err(lock_err)?;
      }
      Err(err) => return Err(lock_err(err)),
    }
    debug!(path = %path.display(), ?mode, "lock acquired");

    let held = Self {
      file,
      path: path.to_path_buf(),
      mode,
    };
    if mode == LockMode::Exclusive {
      held.write_metadata(command)?;
    }
    Ok(held)
  }

  fn write_metadata(&self, command: &str) -> Result<(), FileLockError> {
    let metadata = LockMetadata {
      pid: std::process::id(),
      started_at_unix: unix_now(),
      command: command.to_string(),
    };
    let write_err = |source: io::Error| FileLockError::WriteMetadata {
      path: self.path.clone(),
      source,
    };

    self.file.set_len(0).map_err(write_err)?;
    let mut writer = io::BufWriter::new(&self.file);
    writer.seek(SeekFrom::Start(0)).map_err(write_err)?;
    serde_json::to_writer(&mut writer, &metadata).map_err(|e| write_err(io::Error::other(e)))?;
    writer.flush().map_err(write_err)?;
    Ok(())
  }

  /// Read the metadata through the held handle.
  pub fn read_metadata(&self) -> io::Result<LockMetadata> {
    let mut file = &self.file;
    file.seek(SeekFrom::Start(0))?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;
    serde_json::from_str(&contents).map_err(io::Error::other)
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  pub fn mode(&self) -> LockMode {
    self.mode
  }
}

fn read_metadata_from(path: &Path) -> Option<LockMetadata> {
  let contents = std::fs::read_to_string(path).ok()?;
  serde_json::from_str(&contents).ok()
}

#[cfg(unix)]
fn lock(file: &File, mode: LockMode, blocking: bool) -> io::Result<()> {
  use rustix::fs::{FlockOperation, flock};
  use std::os::unix::io::AsFd;

  let operation = match (mode, blocking) {
    (LockMode::Shared, false) => FlockOperation::NonBlockingLockShared,
    (LockMode::Exclusive, false) => FlockOperation::NonBlockingLockExclusive,
    (LockMode::Shared, true) => FlockOperation::LockShared,
    (LockMode::Exclusive, true) => FlockOperation::LockExclusive,
  };

  flock(file.as_fd(), operation).map_err(|e| io::Error::from_raw_os_error(e.raw_os_error()))
}

#[cfg(windows)]
fn lock(file: &File, mode: LockMode, blocking: bool) -> io::Result<()> {
  use std::os::windows::io::AsRawHandle;
  use windows_sys::Win32::Foundation::HANDLE;
  use windows_sys::Win32::Storage::FileSystem::{LOCKFILE_EXCLUSIVE_LOCK, LOCKFILE_FAIL_IMMEDIATELY, LockFileEx};

  let handle = file.as_raw_handle() as HANDLE;
  let mut flags = if blocking { 0 } else { LOCKFILE_FAIL_IMMEDIATELY };
  if mode == LockMode::Exclusive {
    flags |= LOCKFILE_EXCLUSIVE_LOCK;
  }

  // SAFETY: OVERLAPPED is a plain data struct that is valid when zero-initialized.
  // LockFileEx is safe to call with a valid file handle and zeroed OVERLAPPED.
  let result = unsafe {
    let mut overlapped = std::mem::zeroed();
    LockFileEx(handle, flags, 0, 1, 0, &mut overlapped)
  };

  if result == 0 {
    Err(io::Error::last_os_error())
  } else {
    Ok(())
  }
}
