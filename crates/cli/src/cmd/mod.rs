//! Subcommand implementations and the collaborators they share.

mod deps;
mod eval;
mod install;
mod list;
mod lock;

pub use deps::cmd_deps;
pub use eval::cmd_eval;
pub use install::{InstallArgs, cmd_install, cmd_install_plan};
pub use list::cmd_list;
pub use lock::cmd_lock;

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use tsuku_lib::action::Registry;
use tsuku_lib::config::Config;
use tsuku_lib::download::HttpDownloader;
use tsuku_lib::execute::{Executor, LocalRunner};
use tsuku_lib::install::Installer;
use tsuku_lib::lock::LockFile;
use tsuku_lib::plan::Evaluator;
use tsuku_lib::platform::{HostDetector, Platform, PlatformDetector};
use tsuku_lib::recipe::DirRecipeLoader;
use tsuku_lib::state::StateManager;
use tsuku_lib::version::{GithubVersionResolver, RegistryVersionResolver, SourceResolver};

/// Default collaborators wired from the environment and global flags.
pub struct Session {
  pub config: Config,
  pub host: Platform,
  pub registry: &'static Registry,
  pub recipes: DirRecipeLoader,
  versions: SourceResolver,
  downloader: HttpDownloader,
  runner: LocalRunner,
}

impl Session {
  pub fn new(lock_file: Option<PathBuf>, recipes: Option<PathBuf>) -> Result<Self> {
    let mut config = Config::from_env();
    if let Some(path) = lock_file {
      config.lock_file = path;
    }
    if let Some(dir) = recipes {
      config.recipes_dir = dir;
    }

    let host = HostDetector::default().detect().context("Failed to detect host platform")?;
    let downloader = HttpDownloader::new(config.downloads_dir()).context("Failed to create HTTP client")?;

    Ok(Self {
      host,
      registry: Registry::builtin(),
      recipes: DirRecipeLoader::new(&config.recipes_dir),
      versions: SourceResolver::new(
        GithubVersionResolver::new(config.api_url.clone(), config.github_token.clone()),
        RegistryVersionResolver::default(),
      ),
      downloader,
      runner: LocalRunner::from_config(&config),
      config,
    })
  }

  pub fn state(&self) -> StateManager {
    StateManager::from_config(&self.config)
  }

  pub fn lock(&self) -> Result<Option<LockFile>> {
    LockFile::load(&self.config.lock_file)
      .with_context(|| format!("Failed to read lock file {}", self.config.lock_file.display()))
  }

  pub fn evaluator(&self) -> Evaluator<'_> {
    Evaluator::new(self.registry, &self.versions, &self.downloader)
  }

  pub fn installer(&self, lock: Option<LockFile>) -> Installer<'_> {
    let executor = Executor::new(
      &self.config,
      self.host,
      self.registry,
      &self.downloader,
      &self.runner,
    );
    Installer::new(&self.recipes, self.evaluator(), executor, lock, self.host)
  }
}

pub fn runtime() -> Result<tokio::runtime::Runtime> {
  tokio::runtime::Runtime::new().context("Failed to create async runtime")
}

/// Split `tool@version`.
pub fn parse_tool_spec(spec: &str) -> Result<(&str, Option<&str>)> {
  match spec.split_once('@') {
    None => Ok((spec, None)),
    Some((tool, version)) if !tool.is_empty() && !version.is_empty() => Ok((tool, Some(version))),
    Some(_) => bail!("invalid tool specification '{spec}'; expected <tool> or <tool>@<version>"),
  }
}
