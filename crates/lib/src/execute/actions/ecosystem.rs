//! Language-ecosystem builds (`cargo_build`, `npm_exec`, `pip_exec`,
//! `gem_exec`, `go_build`, `cpan_install`).
//!
//! Each build installs into the staging `install/` directory so that a failed
//! build leaves nothing behind. Toolchain caches live under `work/`.
//!
//! cargo, go and npm leave relocatable entry points in `install/bin`. pip,
//! gem and cpan entry points depend on an interpreter prefix or a library
//! path, so they stay inside the install tree and `install/bin` gets small
//! shell wrappers that point at the final `tools/<tool>-<version>` location.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tracing::info;

use super::command::{self, Invocation};
use crate::action::Ecosystem;
use crate::execute::types::{ExecuteError, StepContext};

/// Parameters shared by every ecosystem build.
#[derive(Debug, Clone, Copy)]
pub struct Build<'a> {
  pub ecosystem: Ecosystem,
  pub package: &'a str,
  pub version: &'a str,
  pub executables: &'a [&'a str],
}

/// The programs a build runs, in order.
pub fn invocations(build: &Build<'_>, ctx: &StepContext, path: Option<&OsString>) -> Vec<Invocation> {
  let install = &ctx.install_dir;
  let work = &ctx.work_dir;
  let Build { package, version, .. } = *build;

  let invocations = match build.ecosystem {
    Ecosystem::Cargo => vec![
      Invocation::new("cargo")
        .args(["install", package, "--version", version, "--locked", "--root"])
        .arg(install)
        .env("CARGO_TARGET_DIR", work.join("cargo-target")),
    ],
    Ecosystem::Npm => vec![
      Invocation::new("npm")
        .args(["install", "--global", "--no-fund", "--no-audit", "--prefix"])
        .arg(install)
        .arg(format!("{package}@{version}"))
        .env("npm_config_cache", work.join("npm-cache")),
    ],
    Ecosystem::Pip => {
      let venv = install.join(VENV_DIR);
      vec![
        Invocation::new("python3").args(["-m", "venv"]).arg(&venv),
        Invocation::new(venv_python(&venv))
          .args(["-m", "pip", "install", "--no-input", "--disable-pip-version-check"])
          .arg(format!("{package}=={version}"))
          .env("PIP_CACHE_DIR", work.join("pip-cache")),
      ]
    }
    Ecosystem::Gem => vec![
      Invocation::new("gem")
        .args(["install", package, "--version", version, "--no-document", "--install-dir"])
        .arg(install.join(GEM_DIR))
        .arg("--bindir")
        .arg(install.join(GEM_DIR).join("bin")),
    ],
    Ecosystem::Go => vec![
      Invocation::new("go")
        .arg("install")
        .arg(format!("{package}@{version}"))
        .env("GOBIN", install.join("bin"))
        .env("GOPATH", work.join("gopath"))
        .env("GOFLAGS", "-modcacherw"),
    ],
    Ecosystem::Cpan => vec![
      Invocation::new("cpanm")
        .args(["--notest", "--local-lib"])
        .arg(install.join(PERL_DIR))
        .arg(format!("{package}@{version}")),
    ],
  };

  invocations
    .into_iter()
    .map(|inv| {
      let inv = inv.current_dir(work);
      match path {
        Some(path) => inv.env("PATH", path.clone()),
        None => inv,
      }
    })
    .collect()
}

pub async fn build(build: &Build<'_>, ctx: &StepContext, path: Option<&OsString>) -> Result<(), ExecuteError> {
  tokio::fs::create_dir_all(ctx.bin_dir()).await?;

  for invocation in invocations(build, ctx, path) {
    command::run(&invocation).await.map_err(|err| match err {
      ExecuteError::CommandNotFound { command, .. } => ExecuteError::CommandNotFound {
        hint: Some(format!("install the toolchain for {:?} builds first", build.ecosystem)),
        command,
      },
      other => other,
    })?;
  }

  write_wrappers(build, ctx).await?;

  for executable in build.executables {
    if !tokio::fs::try_exists(ctx.bin_dir().join(executable)).await? {
      return Err(ExecuteError::MissingArtifact {
        step: ctx.index,
        name: executable.to_string(),
      });
    }
  }

  info!(package = build.package, version = build.version, ecosystem = ?build.ecosystem, "ecosystem build finished");
  Ok(())
}

const VENV_DIR: &str = "venv";
const GEM_DIR: &str = "gems";
const PERL_DIR: &str = "perl5";

fn venv_python(venv: &Path) -> String {
  if cfg!(windows) {
    venv.join("Scripts").join("python.exe").display().to_string()
  } else {
    venv.join("bin").join("python").display().to_string()
  }
}

/// The real entry point for `executable` under an install root, for the
/// ecosystems whose entry points need a wrapper.
fn entry_point(ecosystem: Ecosystem, root: &Path, executable: &str) -> Option<PathBuf> {
  let dir = match ecosystem {
    Ecosystem::Pip => root.join(VENV_DIR),
    Ecosystem::Gem => root.join(GEM_DIR),
    Ecosystem::Cpan => root.join(PERL_DIR),
    Ecosystem::Cargo | Ecosystem::Npm | Ecosystem::Go => return None,
  };
  Some(dir.join("bin").join(executable))
}

/// Shell wrapper running `executable` from its final location.
fn wrapper_script(ecosystem: Ecosystem, root: &Path, executable: &str) -> Option<String> {
  let entry = sh_quote(&entry_point(ecosystem, root, executable)?);
  let line = match ecosystem {
    Ecosystem::Pip => {
      let python = sh_quote(&root.join(VENV_DIR).join("bin").join("python"));
      format!("exec {python} {entry} \"$@\"")
    }
    Ecosystem::Gem => {
      let gems = sh_quote(&root.join(GEM_DIR));
      format!("GEM_HOME={gems} GEM_PATH={gems} exec {entry} \"$@\"")
    }
    Ecosystem::Cpan => {
      let lib = sh_quote(&root.join(PERL_DIR).join("lib").join("perl5"));
      format!("PERL5LIB={lib}${{PERL5LIB:+:$PERL5LIB}} exec {entry} \"$@\"")
    }
    Ecosystem::Cargo | Ecosystem::Npm | Ecosystem::Go => return None,
  };
  Some(format!("#!/bin/sh\n{line}\n"))
}

fn sh_quote(path: &Path) -> String {
  format!("'{}'", path.display().to_string().replace('\'', r"'\''"))
}

/// Write `install/bin` wrappers for entry points the build produced.
async fn write_wrappers(build: &Build<'_>, ctx: &StepContext) -> Result<(), ExecuteError> {
  for executable in build.executables {
    let (Some(staged), Some(script)) = (
      entry_point(build.ecosystem, &ctx.install_dir, executable),
      wrapper_script(build.ecosystem, &ctx.final_dir, executable),
    ) else {
      return Ok(());
    };
    if !tokio::fs::try_exists(&staged).await? {
      continue;
    }
    let dest = ctx.bin_dir().join(executable);
    tokio::fs::write(&dest, script).await?;
    #[cfg(unix)]
    {
      use std::os::unix::fs::PermissionsExt;
      tokio::fs::set_permissions(&dest, std::fs::Permissions::from_mode(0o755)).await?;
    }
  }
  Ok(())
}
