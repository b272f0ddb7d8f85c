use crate::consts::{DEFAULT_HOME_DIRNAME, LOCK_FILENAME};
use std::path::PathBuf;

/// Returns the user's home directory
#[cfg(windows)]
pub fn home_dir() -> PathBuf {
  std::env::var_os("USERPROFILE")
    .map(PathBuf::from)
    .unwrap_or_else(std::env::temp_dir)
}

/// Returns the user's home directory
#[cfg(not(windows))]
pub fn home_dir() -> PathBuf {
  std::env::var_os("HOME")
    .map(PathBuf::from)
    .unwrap_or_else(|| PathBuf::from("/"))
}

/// Root of all tsuku state: `$TSUKU_HOME`, or `~/.tsuku`.
pub fn tsuku_home() -> PathBuf {
  match std::env::var_os("TSUKU_HOME") {
    Some(home) if !home.is_empty() => PathBuf::from(home),
    _ => home_dir().join(DEFAULT_HOME_DIRNAME),
  }
}

/// Recipe directory: `$TSUKU_RECIPES`, or `<home>/recipes`.
pub fn recipes_dir() -> PathBuf {
  match std::env::var_os("TSUKU_RECIPES") {
    Some(dir) if !dir.is_empty() => PathBuf::from(dir),
    _ => tsuku_home().join("recipes"),
  }
}

/// Lock file location: `$TSUKU_LOCK_FILE`, or `tsuku.lock` in the working directory.
pub fn lock_file() -> PathBuf {
  match std::env::var_os("TSUKU_LOCK_FILE") {
    Some(path) if !path.is_empty() => PathBuf::from(path),
    _ => PathBuf::from(LOCK_FILENAME),
  }
}
