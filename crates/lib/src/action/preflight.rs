//! Parameter validation run on every action before it reaches a plan.

use serde_json::Value;

use super::decompose::DecompositionError;
use super::types::{ActionKind, CompositeKind, Ecosystem, PrimitiveKind};
use crate::recipe::Params;

/// Archive formats understood by `extract`.
pub const ARCHIVE_FORMATS: &[&str] = &["tar.gz", "tgz", "tar", "zip"];

struct Checker<'a> {
  action: &'a str,
  params: &'a Params,
}

impl<'a> Checker<'a> {
  fn fail(&self, reason: impl Into<String>) -> DecompositionError {
    DecompositionError::InvalidParams {
      action: self.action.to_string(),
      reason: reason.into(),
    }
  }

  fn string(&self, key: &str) -> Result<&'a str, DecompositionError> {
    match self.params.get(key) {
      Some(Value::String(s)) if !s.is_empty() => Ok(s),
      Some(Value::String(_)) => Err(self.fail(format!("'{key}' must not be empty"))),
      Some(_) => Err(self.fail(format!("'{key}' must be a string"))),
      None => Err(self.fail(format!("missing required parameter '{key}'"))),
    }
  }

  fn optional_string(&self, key: &str) -> Result<Option<&'a str>, DecompositionError> {
    match self.params.get(key) {
      None => Ok(None),
      Some(_) => self.string(key).map(Some),
    }
  }

  fn strings(&self, key: &str) -> Result<Vec<&'a str>, DecompositionError> {
    let Some(value) = self.params.get(key) else {
      return Err(self.fail(format!("missing required parameter '{key}'")));
    };
    let Value::Array(items) = value else {
      return Err(self.fail(format!("'{key}' must be an array of strings")));
    };
    if items.is_empty() {
      return Err(self.fail(format!("'{key}' must not be empty")));
    }
    items
      .iter()
      .map(|item| match item {
        Value::String(s) if !s.is_empty() => Ok(s.as_str()),
        _ => Err(self.fail(format!("'{key}' must contain non-empty strings"))),
      })
      .collect()
  }

  fn optional_count(&self, key: &str) -> Result<(), DecompositionError> {
    match self.params.get(key) {
      None => Ok(()),
      Some(Value::Number(n)) if n.as_u64().is_some() => Ok(()),
      Some(_) => Err(self.fail(format!("'{key}' must be a non-negative integer"))),
    }
  }

  fn format(&self, key: &str) -> Result<(), DecompositionError> {
    let format = self.string(key)?;
    if ARCHIVE_FORMATS.contains(&format) {
      Ok(())
    } else {
      Err(self.fail(format!(
        "unsupported archive format '{format}' (expected one of {})",
        ARCHIVE_FORMATS.join(", ")
      )))
    }
  }

  fn relative_paths(&self, key: &str) -> Result<(), DecompositionError> {
    for path in self.strings(key)? {
      self.relative_path(key, path)?;
    }
    Ok(())
  }

  fn relative_path(&self, key: &str, path: &str) -> Result<(), DecompositionError> {
    if path.starts_with('/') || path.starts_with('\\') || path.split(['/', '\\']).any(|part| part == "..") {
      return Err(self.fail(format!("'{key}' entry '{path}' must be a relative path without '..'")));
    }
    Ok(())
  }

  fn package_names(&self, key: &str) -> Result<(), DecompositionError> {
    for name in self.strings(key)? {
      self.package_name(key, name)?;
    }
    Ok(())
  }

  fn package_name(&self, key: &str, name: &str) -> Result<(), DecompositionError> {
    if is_valid_package_name(name) {
      Ok(())
    } else {
      Err(self.fail(format!("'{key}' value '{name}' is not a valid package name")))
    }
  }

  fn command_names(&self, key: &str) -> Result<(), DecompositionError> {
    for name in self.strings(key)? {
      if name.contains(['/', '\\']) || name.starts_with('-') {
        return Err(self.fail(format!("'{key}' entry '{name}' must be a bare command name")));
      }
    }
    Ok(())
  }

  fn homebrew_formula(&self) -> Result<&'a str, DecompositionError> {
    let formula = self.string("formula")?;
    let mut chars = formula.chars();
    let valid = chars.next().is_some_and(|c| c.is_ascii_alphanumeric())
      && chars.all(|c| c.is_ascii_alphanumeric() || "+._@-".contains(c))
      && !formula.contains("..");
    if valid {
      Ok(formula)
    } else {
      Err(self.fail(format!("'formula' value '{formula}' is not a valid Homebrew formula name")))
    }
  }

  fn github_repo(&self) -> Result<(), DecompositionError> {
    let repo = self.string("repo")?;
    match repo.split_once('/') {
      Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => Ok(()),
      _ => Err(self.fail(format!("'repo' must be 'owner/name', got '{repo}'"))),
    }
  }
}

/// Package names must start alphanumeric so they can never be read as flags.
pub fn is_valid_package_name(name: &str) -> bool {
  let mut chars = name.chars();
  chars.next().is_some_and(|c| c.is_ascii_alphanumeric())
    && chars.all(|c| c.is_ascii_alphanumeric() || "+._@/:-".contains(c))
}

/// Octal permission strings such as `755` or `0644`.
pub fn parse_mode(mode: &str) -> Option<u32> {
  if mode.is_empty() || mode.len() > 4 {
    return None;
  }
  u32::from_str_radix(mode, 8).ok()
}

pub fn preflight(action: &str, kind: ActionKind, params: &Params) -> Result<(), DecompositionError> {
  let c = Checker { action, params };

  match kind {
    ActionKind::Primitive(kind) => match kind {
      PrimitiveKind::Download => {
        c.string("url")?;
        if let Some(dest) = c.optional_string("dest")? {
          c.relative_path("dest", dest)?;
        }
      }
      PrimitiveKind::Extract => {
        let archive = c.string("archive")?;
        c.relative_path("archive", archive)?;
        c.format("format")?;
        c.optional_count("strip_dirs")?;
      }
      PrimitiveKind::Chmod => {
        c.relative_paths("files")?;
        if let Some(mode) = c.optional_string("mode")?
          && parse_mode(mode).is_none()
        {
          return Err(c.fail(format!("'mode' must be an octal string, got '{mode}'")));
        }
      }
      PrimitiveKind::InstallBinaries => c.relative_paths("binaries")?,
      PrimitiveKind::PackageInstall(_) => c.package_names("packages")?,
      PrimitiveKind::EcosystemBuild(eco) => {
        let package = c.string(eco.package_param())?;
        c.package_name(eco.package_param(), package)?;
        c.string("version")?;
        if eco != Ecosystem::Cpan || params.contains_key("executables") {
          c.command_names("executables")?;
        }
      }
      PrimitiveKind::RequireCommand => {
        let command = c.string("command")?;
        if command.contains(['/', '\\']) || command.starts_with('-') {
          return Err(c.fail(format!("'command' must be a bare command name, got '{command}'")));
        }
      }
      PrimitiveKind::Manual => {
        c.string("text")?;
      }
    },
    ActionKind::Composite(kind) => match kind {
      CompositeKind::DownloadArchive => {
        c.string("url")?;
        c.format("archive_format")?;
        c.relative_paths("binaries")?;
        c.optional_count("strip_dirs")?;
      }
      CompositeKind::GithubArchive => {
        c.github_repo()?;
        c.string("asset_pattern")?;
        c.format("archive_format")?;
        c.relative_paths("binaries")?;
        c.optional_count("strip_dirs")?;
      }
      CompositeKind::GithubFile => {
        c.github_repo()?;
        c.string("asset_pattern")?;
        let binary = c.string("binary")?;
        c.relative_path("binary", binary)?;
      }
      CompositeKind::CargoInstall => {
        let name = c.string("crate")?;
        c.package_name("crate", name)?;
        c.command_names("executables")?;
      }
      CompositeKind::NpmInstall | CompositeKind::PipxInstall => {
        let name = c.string("package")?;
        c.package_name("package", name)?;
        c.command_names("executables")?;
      }
      CompositeKind::GemInstall => {
        let name = c.string("gem")?;
        c.package_name("gem", name)?;
        c.command_names("executables")?;
      }
      CompositeKind::GoInstall => {
        let name = c.string("module")?;
        c.package_name("module", name)?;
        c.command_names("executables")?;
      }
      CompositeKind::Homebrew => {
        c.homebrew_formula()?;
        c.relative_paths("binaries")?;
      }
    },
  }

  Ok(())
}
