//! Resolution precedence and the end-to-end install flow.
//!
//! For a tool installed by name the plan source is chosen, highest first:
//!
//! 1. [`Precedence::Locked`]: the lock file has an entry for this exact
//!    platform. Its version and checksums are used; the version provider is
//!    never called and nothing is downloaded during evaluation.
//! 2. [`Precedence::LockPinned`]: the lock file pins a version but has no
//!    entry for this platform. Downloads are fetched and checksummed.
//! 3. [`Precedence::Explicit`]: `tool@version` on the command line.
//! 4. [`Precedence::Dynamic`]: ask the version provider for the latest.
//!
//! With `locked` set, anything below (1) is an error.

use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

use crate::execute::{ExecOptions, ExecuteError, Executor, InstallResult};
use crate::lock::{LockError, LockFile};
use crate::plan::{DownloadRecord, EvalError, EvalRequest, Evaluator, InstallationPlan, KnownChecksums, VersionSelection};
use crate::platform::Platform;
use crate::recipe::{Recipe, RecipeError, RecipeLoader};
use crate::state::State;
use crate::util::hash::normalize_checksum;
use crate::version::{VersionConstraint, VersionInfo};

#[derive(Debug, Error)]
pub enum InstallError {
  #[error(transparent)]
  Recipe(#[from] RecipeError),

  #[error(transparent)]
  Eval(#[from] EvalError),

  #[error(transparent)]
  Execute(#[from] ExecuteError),

  #[error(transparent)]
  Lock(#[from] LockError),

  #[error("no lock entry for {tool} on {platform}; run `tsuku lock {tool}` on this platform first")]
  LockEntryMissing { tool: String, platform: String },

  #[error("{tool} is locked to {locked} but {requested} was requested")]
  LockedVersionConflict {
    tool: String,
    locked: String,
    requested: String,
  },

  #[error("plan for {tool} does not match the lock file for {url}: expected {expected}, got {actual}")]
  LockedPlanMismatch {
    tool: String,
    url: String,
    expected: String,
    actual: String,
  },

  #[error("{tool} is not installed on {platform}")]
  NotInstalled { tool: String, platform: String },
}

/// Which rule produced the plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precedence {
  Locked,
  LockPinned,
  Explicit,
  Dynamic,
}

/// Outcome of precedence selection for one tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
  pub precedence: Precedence,
  pub version: VersionSelection,
  /// Locked downloads for [`Precedence::Locked`], known downloads to compare
  /// against for [`Precedence::LockPinned`].
  pub records: Vec<DownloadRecord>,
}

impl Selection {
  pub fn known(&self) -> KnownChecksums<'_> {
    match self.precedence {
      Precedence::Locked => KnownChecksums::Locked(&self.records),
      Precedence::LockPinned => KnownChecksums::Verify(&self.records),
      Precedence::Explicit | Precedence::Dynamic => KnownChecksums::None,
    }
  }
}

#[derive(Debug, Clone, Default)]
pub struct InstallOptions {
  pub force: bool,
  /// Require a lock entry for this platform.
  pub locked: bool,
  pub timeout: Option<Duration>,
}

impl InstallOptions {
  fn exec(&self) -> ExecOptions {
    ExecOptions {
      force: self.force,
      timeout: self.timeout,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallOutcome {
  pub precedence: Precedence,
  pub result: InstallResult,
}

/// Pick the plan source for `recipe` on `host`.
pub fn select(
  recipe: &Recipe,
  lock: Option<&LockFile>,
  host: &Platform,
  explicit: Option<&str>,
  locked: bool,
) -> Result<Selection, InstallError> {
  let tool = recipe.name();
  let entry = lock.and_then(|lock| lock.lookup(tool, host));
  let explicit = explicit.map(|v| VersionInfo::pinned(recipe, v).version);
  let missing = || InstallError::LockEntryMissing {
    tool: tool.to_string(),
    platform: host.qualified_key(),
  };

  let Some(entry) = entry else {
    if locked {
      return Err(missing());
    }
    return Ok(match explicit {
      Some(version) => Selection {
        precedence: Precedence::Explicit,
        version: VersionSelection::Pinned(version),
        records: Vec::new(),
      },
      None => Selection {
        precedence: Precedence::Dynamic,
        version: VersionSelection::Resolve(VersionConstraint::Latest),
        records: Vec::new(),
      },
    });
  };

  if let Some(requested) = explicit
    && requested != entry.version
  {
    if locked {
      return Err(InstallError::LockedVersionConflict {
        tool: tool.to_string(),
        locked: entry.version.to_string(),
        requested,
      });
    }
    warn!(tool, locked = entry.version, requested = %requested, "explicit version overrides the lock file");
    return Ok(Selection {
      precedence: Precedence::Explicit,
      version: VersionSelection::Pinned(requested),
      records: Vec::new(),
    });
  }

  match entry.platform {
    Some(platform) => Ok(Selection {
      precedence: Precedence::Locked,
      version: VersionSelection::Pinned(entry.version.to_string()),
      records: platform.downloads.clone(),
    }),
    None if locked => Err(missing()),
    None => {
      let records = lock
        .and_then(|lock| lock.tools.get(tool))
        .map(|locked| locked.platforms.values().flat_map(|p| p.downloads.clone()).collect())
        .unwrap_or_default();
      Ok(Selection {
        precedence: Precedence::LockPinned,
        version: VersionSelection::Pinned(entry.version.to_string()),
        records,
      })
    }
  }
}

/// Check a supplied plan against the lock file before running it with
/// `--locked`.
pub fn verify_locked_plan(plan: &InstallationPlan, lock: Option<&LockFile>) -> Result<(), InstallError> {
  let missing = || InstallError::LockEntryMissing {
    tool: plan.tool.clone(),
    platform: plan.platform.qualified_key(),
  };
  let entry = lock.and_then(|lock| lock.lookup(&plan.tool, &plan.platform)).ok_or_else(missing)?;
  if entry.version != plan.version {
    return Err(InstallError::LockedVersionConflict {
      tool: plan.tool.clone(),
      locked: entry.version.to_string(),
      requested: plan.version.clone(),
    });
  }
  let platform = entry.platform.ok_or_else(missing)?;

  for download in plan.downloads() {
    let expected = platform
      .downloads
      .iter()
      .find(|record| record.url == download.url)
      .map(|record| normalize_checksum(&record.checksum));
    let actual = normalize_checksum(&download.checksum);
    if expected.as_deref() != Some(actual.as_str()) {
      return Err(InstallError::LockedPlanMismatch {
        tool: plan.tool.clone(),
        url: download.url,
        expected: expected.unwrap_or_else(|| "<not locked>".to_string()),
        actual,
      });
    }
  }
  Ok(())
}

/// Merge the host's recorded resolutions for `tools` (all installed tools
/// when empty) into `lock`. Returns the tools that were locked.
pub fn snapshot_lock(
  lock: &mut LockFile,
  state: &State,
  tools: &[String],
  host: &Platform,
) -> Result<Vec<String>, InstallError> {
  let tools: Vec<String> = if tools.is_empty() {
    state.tools.keys().cloned().collect()
  } else {
    tools.to_vec()
  };

  let mut locked = Vec::with_capacity(tools.len());
  for tool in tools {
    let Some((version, resolution)) = state.active_resolution(&tool, host) else {
      return Err(InstallError::NotInstalled {
        tool,
        platform: host.to_string(),
      });
    };
    lock.update_from_resolution(&tool, version, resolution);
    info!(tool = %tool, version, platform = %resolution.platform_key(), "locked");
    locked.push(tool);
  }
  Ok(locked)
}

/// Ties recipe loading, precedence, evaluation and execution together.
pub struct Installer<'a> {
  recipes: &'a dyn RecipeLoader,
  evaluator: Evaluator<'a>,
  executor: Executor<'a>,
  lock: Option<LockFile>,
  host: Platform,
}

impl<'a> Installer<'a> {
  pub fn new(
    recipes: &'a dyn RecipeLoader,
    evaluator: Evaluator<'a>,
    executor: Executor<'a>,
    lock: Option<LockFile>,
    host: Platform,
  ) -> Self {
    Self {
      recipes,
      evaluator,
      executor,
      lock,
      host,
    }
  }

  pub fn host(&self) -> &Platform {
    &self.host
  }

  pub fn executor(&self) -> &Executor<'a> {
    &self.executor
  }

  /// Generate the plan `install` would run, without running it.
  pub async fn plan(
    &self,
    tool: &str,
    explicit: Option<&str>,
    locked: bool,
  ) -> Result<(Precedence, InstallationPlan), InstallError> {
    let recipe = self.recipes.load(tool)?;
    let selection = select(&recipe, self.lock.as_ref(), &self.host, explicit, locked)?;
    info!(tool, precedence = ?selection.precedence, "plan source selected");

    let request = EvalRequest::new(&recipe, selection.version.clone(), self.host).with_known(selection.known());
    let plan = self.evaluator.eval(request).await?;
    Ok((selection.precedence, plan))
  }

  pub async fn install(
    &self,
    tool: &str,
    explicit: Option<&str>,
    options: &InstallOptions,
  ) -> Result<InstallOutcome, InstallError> {
    let (precedence, plan) = self.plan(tool, explicit, options.locked).await?;
    let result = self.executor.execute(&plan, &options.exec()).await?;
    Ok(InstallOutcome { precedence, result })
  }

  /// Execute a plan produced elsewhere (`install --plan`).
  pub async fn install_plan(
    &self,
    plan: &InstallationPlan,
    options: &InstallOptions,
  ) -> Result<InstallResult, InstallError> {
    if options.locked {
      verify_locked_plan(plan, self.lock.as_ref())?;
    }
    Ok(self.executor.execute(plan, &options.exec()).await?)
  }
}
