//! Primitive action execution.
//!
//! The executor handles `download` itself (it owns checksum verification);
//! every other primitive is dispatched through an [`ActionRunner`].

pub mod archive;
pub mod command;
pub mod ecosystem;
pub mod files;
pub mod system;

use std::ffi::OsString;
use std::path::Path;

use async_trait::async_trait;
use tracing::debug;

use crate::action::PrimitiveKind;
use crate::config::Config;
use crate::execute::types::{ExecuteError, StepContext};
use crate::plan::ResolvedStep;

use archive::ArchiveFormat;
use ecosystem::Build;

/// Performs non-download primitives on behalf of the executor.
#[async_trait]
pub trait ActionRunner: Send + Sync {
  async fn run(&self, kind: PrimitiveKind, step: &ResolvedStep, ctx: &StepContext) -> Result<(), ExecuteError>;
}

/// Runs actions on this machine.
#[derive(Debug, Clone, Default)]
pub struct LocalRunner {
  allow_system_packages: bool,
  /// PATH handed to external programs; tsuku's own `bin/` comes first so
  /// toolchains installed as dependencies are found.
  path: Option<OsString>,
}

impl LocalRunner {
  pub fn new(allow_system_packages: bool) -> Self {
    Self {
      allow_system_packages,
      path: None,
    }
  }

  pub fn from_config(config: &Config) -> Self {
    Self::new(config.allow_system_packages).with_path_prefix(&config.bin_dir())
  }

  pub fn with_path_prefix(mut self, dir: &Path) -> Self {
    let mut dirs = vec![dir.to_path_buf()];
    if let Some(current) = std::env::var_os("PATH") {
      dirs.extend(std::env::split_paths(&current));
    }
    self.path = std::env::join_paths(dirs).ok();
    self
  }
}

#[async_trait]
impl ActionRunner for LocalRunner {
  async fn run(&self, kind: PrimitiveKind, step: &ResolvedStep, ctx: &StepContext) -> Result<(), ExecuteError> {
    let p = Params { step, ctx };
    debug!(step = ctx.index, action = %step.action, "running step");

    match kind {
      PrimitiveKind::Download => Err(ExecuteError::UnsupportedAction {
        action: step.action.clone(),
      }),
      PrimitiveKind::Extract => {
        let archive = ctx.work_dir.join(p.string("archive")?);
        let format_name = p.string("format")?;
        let Some(format) = ArchiveFormat::parse(format_name) else {
          return Err(p.invalid(format!("unsupported archive format '{format_name}'")));
        };
        let strip = step.params.get("strip_dirs").and_then(|v| v.as_u64()).unwrap_or(0) as usize;
        let dest = ctx.work_dir.clone();
        tokio::task::spawn_blocking(move || archive::unpack(&archive, format, &dest, strip))
          .await
          .map_err(std::io::Error::other)?
      }
      PrimitiveKind::Chmod => files::chmod(ctx, &p.strings("files")?, step.param_str("mode")).await,
      PrimitiveKind::InstallBinaries => files::install_binaries(ctx, &p.strings("binaries")?).await.map(drop),
      PrimitiveKind::PackageInstall(pm) => {
        system::package_install(pm, &p.strings("packages")?, self.allow_system_packages).await
      }
      PrimitiveKind::EcosystemBuild(ecosystem) => {
        let executables = step.param_strings("executables");
        let build = Build {
          ecosystem,
          package: p.string(ecosystem.package_param())?,
          version: p.string("version")?,
          executables: &executables,
        };
        ecosystem::build(&build, ctx, self.path.as_ref()).await
      }
      PrimitiveKind::RequireCommand => system::require_command(p.string("command")?),
      PrimitiveKind::Manual => {
        system::manual(p.string("text")?);
        Ok(())
      }
    }
  }
}

struct Params<'a> {
  step: &'a ResolvedStep,
  ctx: &'a StepContext,
}

impl<'a> Params<'a> {
  fn invalid(&self, reason: String) -> ExecuteError {
    ExecuteError::InvalidStep {
      step: self.ctx.index,
      action: self.step.action.clone(),
      reason,
    }
  }

  fn string(&self, key: &str) -> Result<&'a str, ExecuteError> {
    self
      .step
      .param_str(key)
      .ok_or_else(|| self.invalid(format!("missing parameter '{key}'")))
  }

  fn strings(&self, key: &str) -> Result<Vec<&'a str>, ExecuteError> {
    let values = self.step.param_strings(key);
    if values.is_empty() {
      Err(self.invalid(format!("missing parameter '{key}'")))
    } else {
      Ok(values)
    }
  }
}
