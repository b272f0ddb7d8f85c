//! Implementation of the `tsuku install` command.
//!
//! Installing by name discovers the dependency tree first, asks before
//! installing anything beyond the requested tool, then installs in generation
//! order. `--plan` skips evaluation and executes a plan produced by
//! `tsuku eval`.

use std::io::Read;
use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use tracing::info;
use tsuku_lib::Error;
use tsuku_lib::deps::{DependencyResolver, DependencySummary, DependencyTree, RecipeDependencySource};
use tsuku_lib::execute::InstallResult;
use tsuku_lib::install::{InstallOptions, Installer, Precedence};
use tsuku_lib::lock::LockFile;
use tsuku_lib::plan::InstallationPlan;
use tsuku_lib::recipe::RecipeLoader;
use tsuku_lib::version::VersionInfo;

use super::{Session, parse_tool_spec, runtime};
use crate::output::{format_duration, print_info, print_stat, print_success, print_warning, symbols};
use crate::prompts::confirm;

#[derive(Debug, Clone, Default)]
pub struct InstallArgs {
  pub force: bool,
  pub locked: bool,
  pub yes: bool,
  pub timeout: Option<Duration>,
}

impl InstallArgs {
  fn options(&self) -> InstallOptions {
    InstallOptions {
      force: self.force,
      locked: self.locked,
      timeout: self.timeout,
    }
  }
}

pub fn cmd_install(session: &Session, spec: &str, args: &InstallArgs) -> Result<()> {
  let (tool, explicit) = parse_tool_spec(spec)?;
  let lock = session.lock()?;
  warn_on_override(lock.as_ref(), session, tool, explicit, args.locked);

  let rt = runtime()?;
  let (tree, order) = rt.block_on(discover(session, tool))?;
  let dependencies: Vec<String> = order.into_iter().filter(|name| name != tool).collect();

  if !dependencies.is_empty() {
    print_discovery(&tree.summary());
    if !confirm(&format!("Install {} missing dependencies?", dependencies.len()), args.yes)? {
      bail!("installation of {tool} cancelled");
    }
  }

  let installer = session.installer(lock);
  rt.block_on(install_dependencies(&installer, &dependencies, args))?;
  rt.block_on(install_one(&installer, tool, explicit, args))?;
  Ok(())
}

pub fn cmd_install_plan(session: &Session, source: &Path, args: &InstallArgs) -> Result<()> {
  let content = if source == Path::new("-") {
    let mut buf = String::new();
    std::io::stdin().read_to_string(&mut buf).context("Failed to read plan from stdin")?;
    buf
  } else {
    std::fs::read_to_string(source).with_context(|| format!("Failed to read plan {}", source.display()))?
  };
  let plan = InstallationPlan::from_json(&content).map_err(Error::PlanParse)?;

  let installer = session.installer(session.lock()?);
  let started = Instant::now();
  let rt = runtime()?;
  let result = rt
    .block_on(installer.install_plan(&plan, &args.options()))
    .with_context(|| format!("Failed to install {} {}", plan.tool, plan.version))?;
  report(&result, None, started);
  Ok(())
}

/// Resolve the dependency tree of `tool` against the current install state.
pub(crate) async fn discover(session: &Session, tool: &str) -> Result<(DependencyTree, Vec<String>)> {
  let state = session.state().load().context("Failed to read install state")?;
  let is_installed = move |name: &str| state.is_installed(name);
  let source = RecipeDependencySource::new(&session.recipes, session.registry, session.host);
  let resolver = DependencyResolver::new(&source, &is_installed);
  resolver
    .resolve(tool)
    .await
    .with_context(|| format!("Failed to resolve dependencies of {tool}"))
}

pub(crate) fn print_discovery(summary: &DependencySummary) {
  print_info(&format!("Dependencies of {}:", summary.root));
  print_stat("Generation order", &summary.generation_order.join(&format!(" {} ", symbols::ARROW)));
  if !summary.satisfied.is_empty() {
    print_stat("Already installed", &summary.satisfied.join(", "));
  }
}

/// Install each tool at its locked or latest version, stopping at the first failure.
pub(crate) async fn install_dependencies(installer: &Installer<'_>, tools: &[String], args: &InstallArgs) -> Result<()> {
  for tool in tools {
    install_one(installer, tool, None, args).await?;
  }
  Ok(())
}

async fn install_one(installer: &Installer<'_>, tool: &str, explicit: Option<&str>, args: &InstallArgs) -> Result<()> {
  let started = Instant::now();
  print_info(&format!("Installing {tool}"));
  let outcome = installer
    .install(tool, explicit, &args.options())
    .await
    .with_context(|| format!("Failed to install {tool}"))?;
  info!(tool, precedence = ?outcome.precedence, "install finished");
  report(&outcome.result, Some(outcome.precedence), started);
  Ok(())
}

fn report(result: &InstallResult, precedence: Option<Precedence>, started: Instant) {
  if result.already_installed {
    print_info(&format!(
      "{} {} is already installed (use --force to reinstall)",
      result.tool, result.version
    ));
    return;
  }

  print_success(&format!(
    "Installed {} {} in {}",
    result.tool,
    result.version,
    format_duration(started.elapsed())
  ));
  if let Some(precedence) = precedence {
    print_stat("Version source", describe(precedence));
  }
  print_stat("Location", &result.install_dir.display().to_string());
  let binaries: Vec<String> = result
    .binaries
    .iter()
    .filter_map(|path| path.file_name())
    .map(|name| name.to_string_lossy().into_owned())
    .collect();
  if !binaries.is_empty() {
    print_stat("Binaries", &binaries.join(", "));
  }
}

fn describe(precedence: Precedence) -> &'static str {
  match precedence {
    Precedence::Locked => "lock file",
    Precedence::LockPinned => "lock file (version only; downloads verified)",
    Precedence::Explicit => "requested version",
    Precedence::Dynamic => "latest release",
  }
}

/// The library logs the override too; this puts it in front of the user.
fn warn_on_override(lock: Option<&LockFile>, session: &Session, tool: &str, explicit: Option<&str>, locked: bool) {
  if locked {
    return;
  }
  let (Some(requested), Some(entry)) = (explicit, lock.and_then(|lock| lock.lookup(tool, &session.host))) else {
    return;
  };
  let Ok(recipe) = session.recipes.load(tool) else {
    return;
  };
  let requested = VersionInfo::pinned(&recipe, requested).version;
  if requested != entry.version {
    print_warning(&format!(
      "{tool} is locked to {} but {requested} was requested; installing {requested}",
      entry.version
    ));
  }
}
