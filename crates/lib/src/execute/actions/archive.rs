//! Archive extraction for the `extract` action.
//!
//! Supports:
//! - `.tar.gz` / `.tgz`
//! - `.tar`
//! - `.zip`
//!
//! Entries are written below the destination only: absolute paths and `..`
//! components are rejected. `strip_dirs` drops leading path components the
//! way `tar --strip-components` does.

use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use tar::Archive;
use tracing::{debug, info};

use crate::execute::types::ExecuteError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
  TarGz,
  Tar,
  Zip,
}

impl ArchiveFormat {
  pub fn parse(format: &str) -> Option<Self> {
    match format {
      "tar.gz" | "tgz" => Some(Self::TarGz),
      "tar" => Some(Self::Tar),
      "zip" => Some(Self::Zip),
      _ => None,
    }
  }
}

/// Unpack `archive` into `dest`. Blocking; call from `spawn_blocking`.
pub fn unpack(archive: &Path, format: ArchiveFormat, dest: &Path, strip_dirs: usize) -> Result<(), ExecuteError> {
  fs::create_dir_all(dest)?;

  let fail = |message: String| ExecuteError::Archive {
    archive: archive.to_path_buf(),
    message,
  };

  let file = File::open(archive)?;
  match format {
    ArchiveFormat::TarGz => unpack_tar(GzDecoder::new(BufReader::new(file)), dest, strip_dirs, fail)?,
    ArchiveFormat::Tar => unpack_tar(BufReader::new(file), dest, strip_dirs, fail)?,
    ArchiveFormat::Zip => unpack_zip(file, dest, strip_dirs, fail)?,
  }

  info!(archive = %archive.display(), dest = %dest.display(), "unpacked");
  Ok(())
}

/// Archive-relative path with `strip` leading components removed.
///
/// Returns `Ok(None)` for entries that are stripped away entirely.
fn entry_target(path: &Path, strip: usize) -> Result<Option<PathBuf>, String> {
  let mut parts = Vec::new();
  for component in path.components() {
    match component {
      Component::Normal(part) => parts.push(part),
      Component::CurDir => {}
      _ => return Err(format!("unsafe entry path '{}'", path.display())),
    }
  }
  let stripped: PathBuf = parts.into_iter().skip(strip).collect();
  Ok((!stripped.as_os_str().is_empty()).then_some(stripped))
}

fn unpack_tar<R: Read>(
  reader: R,
  dest: &Path,
  strip: usize,
  fail: impl Fn(String) -> ExecuteError,
) -> Result<(), ExecuteError> {
  let mut archive = Archive::new(reader);
  archive.set_preserve_permissions(true);

  for entry in archive.entries()? {
    let mut entry = entry?;
    let path = entry.path()?.into_owned();
    let Some(relative) = entry_target(&path, strip).map_err(&fail)? else {
      continue;
    };

    if let Some(target) = entry.link_name()?
      && (target.is_absolute() || target.components().any(|c| c == Component::ParentDir))
    {
      return Err(fail(format!("link '{}' points outside the archive", path.display())));
    }

    let dest_path = dest.join(&relative);
    if let Some(parent) = dest_path.parent() {
      fs::create_dir_all(parent)?;
    }
    debug!(entry = %relative.display(), "extracting");
    entry.unpack(&dest_path)?;
  }
  Ok(())
}

fn unpack_zip(
  file: File,
  dest: &Path,
  strip: usize,
  fail: impl Fn(String) -> ExecuteError,
) -> Result<(), ExecuteError> {
  let mut archive =
    zip::ZipArchive::new(BufReader::new(file)).map_err(|e| fail(format!("failed to open zip: {e}")))?;

  for i in 0..archive.len() {
    let mut file = archive
      .by_index(i)
      .map_err(|e| fail(format!("failed to read zip entry: {e}")))?;
    let path = file
      .enclosed_name()
      .ok_or_else(|| fail(format!("unsafe entry path '{}'", file.name())))?;
    let Some(relative) = entry_target(&path, strip).map_err(&fail)? else {
      continue;
    };

    let dest_path = dest.join(&relative);
    if file.is_dir() {
      fs::create_dir_all(&dest_path)?;
      continue;
    }
    if let Some(parent) = dest_path.parent() {
      fs::create_dir_all(parent)?;
    }

    let mut outfile = File::create(&dest_path)?;
    std::io::copy(&mut file, &mut outfile)?;

    #[cfg(unix)]
    {
      use std::os::unix::fs::PermissionsExt;
      if let Some(mode) = file.unix_mode() {
        fs::set_permissions(&dest_path, fs::Permissions::from_mode(mode & 0o7777))?;
      }
    }
  }
  Ok(())
}
