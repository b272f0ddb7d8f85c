//! Plan execution.
//!
//! Execution replays a validated [`InstallationPlan`] and nothing else: no
//! version lookups and no re-evaluation. The flow for one plan is
//!
//! 1. validate the plan and check it was generated for this host
//! 2. return early if the version is already installed (unless forced)
//! 3. run every step inside `tools/.staging-XXXX/` (`work/` + `install/`),
//!    verifying each download against the plan's checksum
//! 4. rename `install/` to `tools/<tool>-<version>` and link `bin/`
//! 5. record the install in state
//!
//! Any failure before step 4 drops the staging directory, so a failed or
//! cancelled install leaves nothing behind. A failure during steps 4 and 5
//! is rolled back: new links and the new directory are removed and a
//! replaced install is moved back.

pub mod actions;
mod types;

pub use actions::{ActionRunner, LocalRunner};
pub use types::{ExecOptions, ExecuteError, InstallResult, StepContext};

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, error, info, instrument, warn};

use crate::action::{ActionKind, PrimitiveKind, Registry};
use crate::config::Config;
use crate::consts::STAGING_PREFIX;
use crate::download::{Downloader, url_to_filename};
use crate::plan::{InstallationPlan, ResolvedStep, validate_plan};
use crate::platform::Platform;
use crate::state::{State, StateError, StateManager};
use crate::util::hash::normalize_checksum;
use crate::util::unix_now;

pub struct Executor<'a> {
  registry: &'a Registry,
  downloader: &'a dyn Downloader,
  runner: &'a dyn ActionRunner,
  state: StateManager,
  tools_dir: PathBuf,
  bin_dir: PathBuf,
  host: Platform,
}

impl<'a> Executor<'a> {
  pub fn new(
    config: &Config,
    host: Platform,
    registry: &'a Registry,
    downloader: &'a dyn Downloader,
    runner: &'a dyn ActionRunner,
  ) -> Self {
    Self {
      registry,
      downloader,
      runner,
      state: StateManager::from_config(config),
      tools_dir: config.tools_dir(),
      bin_dir: config.bin_dir(),
      host,
    }
  }

  pub fn state(&self) -> &StateManager {
    &self.state
  }

  #[instrument(skip_all, fields(tool = %plan.tool, version = %plan.version))]
  pub async fn execute(&self, plan: &InstallationPlan, options: &ExecOptions) -> Result<InstallResult, ExecuteError> {
    let run = self.run(plan, options);
    match options.timeout {
      Some(after) => tokio::time::timeout(after, run)
        .await
        .map_err(|_| ExecuteError::TimedOut {
          tool: plan.tool.clone(),
          after,
        })?,
      None => run.await,
    }
  }

  async fn run(&self, plan: &InstallationPlan, options: &ExecOptions) -> Result<InstallResult, ExecuteError> {
    validate_plan(plan, self.registry)?;
    if !self.host.can_run(&plan.platform) {
      return Err(ExecuteError::PlatformMismatch {
        plan: plan.platform.to_string(),
        host: self.host.to_string(),
      });
    }

    let install_dir = self.tools_dir.join(format!("{}-{}", plan.tool, plan.version));
    let manager = self.state.clone();
    let state = blocking(move || manager.load()).await?;
    if !options.force
      && state.is_version_installed(&plan.tool, &plan.version)
      && fs::try_exists(&install_dir).await?
    {
      info!("already installed");
      return Ok(self.existing_result(&state, plan, install_dir));
    }

    fs::create_dir_all(&self.tools_dir).await?;
    let staging = tempfile::Builder::new()
      .prefix(STAGING_PREFIX)
      .tempdir_in(&self.tools_dir)?;
    let work_dir = staging.path().join("work");
    let staged_install = staging.path().join("install");
    fs::create_dir_all(&work_dir).await?;
    fs::create_dir_all(&staged_install).await?;
    debug!(staging = %staging.path().display(), "staging created");

    for (index, step) in plan.steps.iter().enumerate() {
      let ctx = StepContext {
        tool: plan.tool.clone(),
        version: plan.version.clone(),
        index,
        work_dir: work_dir.clone(),
        install_dir: staged_install.clone(),
        final_dir: install_dir.clone(),
      };
      let Some(ActionKind::Primitive(kind)) = self.registry.get(&step.action).map(|spec| spec.kind) else {
        return Err(ExecuteError::InvalidStep {
          step: index,
          action: step.action.clone(),
          reason: "not a primitive action".to_string(),
        });
      };

      info!(step = index, action = %step.action, "executing step");
      if kind == PrimitiveKind::Download {
        self.download(plan, step, &ctx).await?;
      } else {
        self.runner.run(kind, step, &ctx).await?;
      }
    }

    let names = binary_names(&staged_install.join("bin")).await?;
    let parked = self
      .activate(&staged_install, &install_dir, staging.path(), options.force)
      .await?;

    let mut linked = Vec::with_capacity(names.len());
    let committed = match self.link_binaries(&install_dir, &names, &mut linked).await {
      Ok(()) => self.record(plan, names).await,
      Err(err) => Err(err),
    };
    if let Err(err) = committed {
      error!(error = %err, "install failed after activation; rolling back");
      self.rollback(&install_dir, parked.as_deref(), &linked).await;
      return Err(err);
    }

    let links: Vec<PathBuf> = linked.into_iter().map(|l| l.link).collect();
    info!(binaries = links.len(), "installed");
    Ok(InstallResult {
      tool: plan.tool.clone(),
      version: plan.version.clone(),
      install_dir,
      binaries: links,
      already_installed: false,
    })
  }

  async fn download(&self, plan: &InstallationPlan, step: &ResolvedStep, ctx: &StepContext) -> Result<(), ExecuteError> {
    let invalid = |reason: &str| ExecuteError::InvalidStep {
      step: ctx.index,
      action: step.action.clone(),
      reason: reason.to_string(),
    };
    let url = step.url().ok_or_else(|| invalid("missing url"))?;
    let expected = step
      .checksum
      .as_deref()
      .map(normalize_checksum)
      .ok_or_else(|| invalid("missing checksum"))?;

    let fetched = self.downloader.fetch(url).await?;
    if fetched.sha256 != expected {
      error!(url = %url, expected = %expected, actual = %fetched.sha256, "checksum mismatch");
      return Err(ExecuteError::ChecksumMismatch {
        tool: plan.tool.clone(),
        version: plan.version.clone(),
        url: url.to_string(),
        expected,
        actual: fetched.sha256,
      });
    }

    let dest = step
      .param_str("dest")
      .map(str::to_string)
      .unwrap_or_else(|| url_to_filename(url));
    let target = ctx.work_dir.join(&dest);
    if let Some(parent) = target.parent() {
      fs::create_dir_all(parent).await?;
    }
    fs::copy(&fetched.path, &target).await?;
    debug!(url = %url, dest = %dest, size = fetched.size, "download verified");
    Ok(())
  }

  /// Move the staged install into place. An existing directory is only
  /// replaced with `force`; it is parked inside staging and its parked path
  /// returned so a later failure can put it back.
  async fn activate(
    &self,
    staged: &Path,
    install_dir: &Path,
    staging: &Path,
    force: bool,
  ) -> Result<Option<PathBuf>, ExecuteError> {
    let mut parked = None;
    if fs::try_exists(install_dir).await? {
      if !force {
        return Err(ExecuteError::AlreadyExists {
          path: install_dir.to_path_buf(),
        });
      }
      warn!(path = %install_dir.display(), "replacing existing install");
      let previous = staging.join("previous");
      fs::rename(install_dir, &previous).await?;
      parked = Some(previous);
    }
    if let Err(err) = fs::rename(staged, install_dir).await {
      if let Some(previous) = &parked {
        let _ = fs::rename(previous, install_dir).await;
      }
      return Err(err.into());
    }
    Ok(parked)
  }

  /// Link every binary into `bin/`. Each link is pushed onto `linked` as soon
  /// as it exists, together with whatever it replaced.
  async fn link_binaries(&self, install_dir: &Path, names: &[String], linked: &mut Vec<Link>) -> Result<(), ExecuteError> {
    fs::create_dir_all(&self.bin_dir).await?;
    for name in names {
      let target = install_dir.join("bin").join(name);
      let link = self.bin_dir.join(name);
      let replaced = match fs::symlink_metadata(&link).await {
        Ok(meta) if meta.file_type().is_symlink() => {
          let previous = fs::read_link(&link).await.ok();
          fs::remove_file(&link).await?;
          previous
        }
        Ok(_) => {
          fs::remove_file(&link).await?;
          None
        }
        Err(_) => None,
      };
      linked.push(Link {
        link: link.clone(),
        replaced,
      });
      #[cfg(unix)]
      fs::symlink(&target, &link).await?;
      #[cfg(not(unix))]
      fs::copy(&target, &link).await?;
      debug!(link = %link.display(), target = %target.display(), "linked");
    }
    Ok(())
  }

  async fn record(&self, plan: &InstallationPlan, names: Vec<String>) -> Result<(), ExecuteError> {
    let manager = self.state.clone();
    let recorded = plan.clone();
    blocking(move || {
      manager.update(&format!("install {}", recorded.tool), |state| {
        state.record_install(&recorded, names, unix_now());
        Ok::<_, StateError>(())
      })
    })
    .await
  }

  /// Undo activation: drop new links (restoring the ones they replaced),
  /// remove the new install and bring back the parked one.
  async fn rollback(&self, install_dir: &Path, parked: Option<&Path>, linked: &[Link]) {
    for Link { link, replaced } in linked.iter().rev() {
      let _ = fs::remove_file(link).await;
      #[cfg(unix)]
      if let Some(previous) = replaced
        && let Err(err) = fs::symlink(previous, link).await
      {
        warn!(link = %link.display(), error = %err, "could not restore link");
      }
      #[cfg(not(unix))]
      let _ = replaced;
    }
    if let Err(err) = fs::remove_dir_all(install_dir).await {
      warn!(path = %install_dir.display(), error = %err, "could not remove new install");
    }
    if let Some(previous) = parked
      && let Err(err) = fs::rename(previous, install_dir).await
    {
      warn!(path = %install_dir.display(), error = %err, "could not restore previous install");
    }
  }

  fn existing_result(&self, state: &State, plan: &InstallationPlan, install_dir: PathBuf) -> InstallResult {
    let binaries = state
      .tool(&plan.tool)
      .and_then(|tool| tool.versions.get(&plan.version))
      .map(|version| version.binaries.iter().map(|name| self.bin_dir.join(name)).collect())
      .unwrap_or_default();
    InstallResult {
      tool: plan.tool.clone(),
      version: plan.version.clone(),
      install_dir,
      binaries,
      already_installed: true,
    }
  }
}

/// A `bin/` link created by this install and the link target it replaced.
struct Link {
  link: PathBuf,
  replaced: Option<PathBuf>,
}

/// File names under a staged `bin/`, sorted.
async fn binary_names(bin_dir: &Path) -> Result<Vec<String>, ExecuteError> {
  let mut names = Vec::new();
  let mut entries = match fs::read_dir(bin_dir).await {
    Ok(entries) => entries,
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(names),
    Err(e) => return Err(e.into()),
  };
  while let Some(entry) = entries.next_entry().await? {
    names.push(entry.file_name().to_string_lossy().into_owned());
  }
  names.sort();
  Ok(names)
}

async fn blocking<T, F>(f: F) -> Result<T, ExecuteError>
where
  T: Send + 'static,
  F: FnOnce() -> Result<T, StateError> + Send + 'static,
{
  Ok(tokio::task::spawn_blocking(f).await.map_err(std::io::Error::other)??)
}
