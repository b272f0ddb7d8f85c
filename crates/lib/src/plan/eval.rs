//! Recipe evaluation: recipe + version + platform → [`InstallationPlan`].
//!
//! Evaluation is the only phase that talks to version providers, and the only
//! phase besides execution that may download. It never touches the install
//! tree or state.

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use super::types::{DownloadRecord, InstallationPlan, PLAN_FORMAT_VERSION, ResolvedStep};
use crate::action::{DecompositionError, PrimitiveKind, Registry, decompose};
use crate::download::{DownloadError, Downloader};
use crate::filter;
use crate::platform::Platform;
use crate::recipe::Recipe;
use crate::template::{self, TemplateVars};
use crate::util::hash::{HashError, Hashable, normalize_checksum};
use crate::util::unix_now;
use crate::version::{VersionConstraint, VersionError, VersionInfo, VersionResolver};

#[derive(Debug, Error)]
pub enum EvalError {
  #[error(transparent)]
  Decomposition(#[from] DecompositionError),

  #[error(transparent)]
  Version(#[from] VersionError),

  #[error("failed to fetch {url} for checksum capture: {source}")]
  Download {
    url: String,
    #[source]
    source: DownloadError,
  },

  #[error("checksum mismatch for {url}: expected {expected}, got {actual}")]
  ChecksumMismatch { url: String, expected: String, actual: String },

  #[error("lock file has no download entry for {url} ({tool} on {platform}); run `tsuku lock {tool}` to refresh it")]
  LockStale { tool: String, platform: String, url: String },

  #[error("download step has no url")]
  MissingUrl,

  #[error("no steps of '{tool}' apply to {platform}")]
  NoApplicableSteps { tool: String, platform: String },

  #[error("failed to hash recipe: {0}")]
  Hash(#[source] HashError),
}

/// How the version for a plan is chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionSelection {
  /// Ask the recipe's version provider.
  Resolve(VersionConstraint),
  /// Known up front. The provider is not consulted.
  Pinned(String),
}

/// Checksums already known for the downloads of this evaluation.
#[derive(Debug, Clone, Copy, Default)]
pub enum KnownChecksums<'a> {
  #[default]
  None,
  /// Download anyway and compare when a record for the URL exists.
  Verify(&'a [DownloadRecord]),
  /// Take checksums from these records without downloading. A URL without a
  /// record is an error.
  Locked(&'a [DownloadRecord]),
}

#[derive(Debug, Clone)]
pub struct EvalRequest<'a> {
  pub recipe: &'a Recipe,
  pub version: VersionSelection,
  pub platform: Platform,
  pub known: KnownChecksums<'a>,
}

impl<'a> EvalRequest<'a> {
  pub fn new(recipe: &'a Recipe, version: VersionSelection, platform: Platform) -> Self {
    Self {
      recipe,
      version,
      platform,
      known: KnownChecksums::None,
    }
  }

  pub fn with_known(mut self, known: KnownChecksums<'a>) -> Self {
    self.known = known;
    self
  }
}

/// Builds plans. Holds only shared, immutable collaborators.
pub struct Evaluator<'a> {
  registry: &'a Registry,
  versions: &'a dyn VersionResolver,
  downloader: &'a dyn Downloader,
}

impl<'a> Evaluator<'a> {
  pub fn new(registry: &'a Registry, versions: &'a dyn VersionResolver, downloader: &'a dyn Downloader) -> Self {
    Self {
      registry,
      versions,
      downloader,
    }
  }

  #[instrument(skip_all, fields(tool = %req.recipe.name(), platform = %req.platform))]
  pub async fn eval(&self, req: EvalRequest<'_>) -> Result<InstallationPlan, EvalError> {
    let recipe = req.recipe;
    let version = match &req.version {
      VersionSelection::Pinned(version) => VersionInfo::pinned(recipe, version),
      VersionSelection::Resolve(constraint) => self.versions.resolve(recipe, constraint).await?,
    };
    debug!(version = %version.version, tag = %version.tag, "version selected");

    let vars = TemplateVars::new(&version.version, &version.tag, &req.platform);
    let mut steps = Vec::new();

    for (index, step) in recipe.steps.iter().enumerate() {
      if !filter::step_applies(step, self.registry, &req.platform)? {
        debug!(index, action = %step.action, "step filtered out");
        continue;
      }

      for primitive in decompose(step, self.registry)? {
        let Some(spec) = self.registry.get(primitive.action) else {
          return Err(DecompositionError::UnknownAction(primitive.action.to_string()).into());
        };
        if !filter::matches(None, spec.implicit_constraint(), &req.platform) {
          debug!(index, action = primitive.action, "primitive filtered out");
          continue;
        }

        let mut resolved = ResolvedStep {
          action: primitive.action.to_string(),
          params: template::expand_params(&primitive.params, &vars),
          checksum: None,
          size: None,
          evaluable: spec.metadata().deterministic,
        };
        if primitive.kind == PrimitiveKind::Download {
          self.capture_checksum(&mut resolved, &req).await?;
        }
        steps.push(resolved);
      }
    }

    if steps.is_empty() {
      return Err(EvalError::NoApplicableSteps {
        tool: recipe.name().to_string(),
        platform: req.platform.to_string(),
      });
    }

    let deterministic = steps.iter().all(|step| step.evaluable);
    if !deterministic {
      warn!(tool = %recipe.name(), "plan contains non-deterministic steps; reproducibility is not guaranteed");
    }

    let plan = InstallationPlan {
      format_version: PLAN_FORMAT_VERSION,
      tool: recipe.name().to_string(),
      version: version.version,
      platform: req.platform,
      generated_at: unix_now(),
      recipe_hash: recipe.content_hash().map_err(EvalError::Hash)?,
      deterministic,
      steps,
    };
    info!(tool = %plan.tool, version = %plan.version, steps = plan.steps.len(), "plan generated");
    Ok(plan)
  }

  async fn capture_checksum(&self, step: &mut ResolvedStep, req: &EvalRequest<'_>) -> Result<(), EvalError> {
    let url = step.url().ok_or(EvalError::MissingUrl)?.to_string();
    let declared = step
      .params
      .remove("checksum")
      .and_then(|value| value.as_str().map(normalize_checksum));

    let expected = match req.known {
      KnownChecksums::Locked(records) => {
        let Some(record) = records.iter().find(|record| record.url == url) else {
          return Err(EvalError::LockStale {
            tool: req.recipe.name().to_string(),
            platform: req.platform.key(),
            url,
          });
        };
        debug!(url = %url, "checksum taken from lock file");
        step.checksum = Some(normalize_checksum(&record.checksum));
        step.size = Some(record.size);
        return Ok(());
      }
      KnownChecksums::Verify(records) => records
        .iter()
        .find(|record| record.url == url)
        .map(|record| normalize_checksum(&record.checksum))
        .or(declared),
      KnownChecksums::None => declared,
    };

    let fetched = self
      .downloader
      .fetch(&url)
      .await
      .map_err(|source| EvalError::Download { url: url.clone(), source })?;

    if let Some(expected) = expected
      && expected != fetched.sha256
    {
      return Err(EvalError::ChecksumMismatch {
        url,
        expected,
        actual: fetched.sha256,
      });
    }

    debug!(url = %url, sha256 = %fetched.sha256, size = fetched.size, "checksum captured");
    step.checksum = Some(fetched.sha256);
    step.size = Some(fetched.size);
    Ok(())
  }
}
