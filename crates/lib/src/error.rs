//! Crate-level error and its coarse classification.

use thiserror::Error;

use crate::action::DecompositionError;
use crate::deps::DependencyError;
use crate::download::DownloadError;
use crate::execute::ExecuteError;
use crate::filter::FilterError;
use crate::install::InstallError;
use crate::lock::LockError;
use crate::plan::{EvalError, PlanValidationError};
use crate::platform::PlatformError;
use crate::recipe::RecipeError;
use crate::state::StateError;
use crate::version::VersionError;

/// Classification used to pick an exit code and decide how to report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  ChecksumMismatch,
  LockEntryMissing,
  PlatformMismatch,
  DependencyCycle,
  Decomposition,
  VersionResolution,
  Other,
}

#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Decomposition(#[from] DecompositionError),
  #[error(transparent)]
  Filter(#[from] FilterError),
  #[error(transparent)]
  Dependency(#[from] DependencyError),
  #[error(transparent)]
  Eval(#[from] EvalError),
  #[error(transparent)]
  PlanValidation(#[from] PlanValidationError),
  #[error(transparent)]
  Lock(#[from] LockError),
  #[error(transparent)]
  State(#[from] StateError),
  #[error(transparent)]
  Execute(#[from] ExecuteError),
  #[error(transparent)]
  Install(#[from] InstallError),
  #[error(transparent)]
  Download(#[from] DownloadError),
  #[error(transparent)]
  Version(#[from] VersionError),
  #[error(transparent)]
  Recipe(#[from] RecipeError),
  #[error(transparent)]
  Platform(#[from] PlatformError),
  #[error("failed to parse plan: {0}")]
  PlanParse(#[source] serde_json::Error),
  #[error(transparent)]
  Io(#[from] std::io::Error),
}

impl Error {
  pub fn kind(&self) -> ErrorKind {
    match self {
      Self::Decomposition(_) => ErrorKind::Decomposition,
      Self::Dependency(e) => dependency_kind(e),
      Self::Eval(e) => eval_kind(e),
      Self::Execute(e) => execute_kind(e),
      Self::Install(e) => install_kind(e),
      Self::Version(_) => ErrorKind::VersionResolution,
      _ => ErrorKind::Other,
    }
  }
}

impl ErrorKind {
  /// Classify any error from this crate, wrapped in [`Error`] or not.
  ///
  /// Callers holding an error chain (e.g. `anyhow`) can walk it and take the
  /// first kind that is not [`ErrorKind::Other`].
  pub fn of(err: &(dyn std::error::Error + 'static)) -> ErrorKind {
    if let Some(e) = err.downcast_ref::<Error>() {
      e.kind()
    } else if let Some(e) = err.downcast_ref::<InstallError>() {
      install_kind(e)
    } else if let Some(e) = err.downcast_ref::<ExecuteError>() {
      execute_kind(e)
    } else if let Some(e) = err.downcast_ref::<EvalError>() {
      eval_kind(e)
    } else if let Some(e) = err.downcast_ref::<DependencyError>() {
      dependency_kind(e)
    } else if let Some(DownloadError::DigestMismatch { .. }) = err.downcast_ref::<DownloadError>() {
      ErrorKind::ChecksumMismatch
    } else if err.is::<DecompositionError>() {
      ErrorKind::Decomposition
    } else if err.is::<VersionError>() {
      ErrorKind::VersionResolution
    } else {
      ErrorKind::Other
    }
  }
}

fn dependency_kind(err: &DependencyError) -> ErrorKind {
  match err {
    DependencyError::Cycle { .. } => ErrorKind::DependencyCycle,
    DependencyError::Decomposition { .. } => ErrorKind::Decomposition,
    DependencyError::Recipe { .. } => ErrorKind::Other,
  }
}

fn eval_kind(err: &EvalError) -> ErrorKind {
  match err {
    EvalError::Decomposition(_) => ErrorKind::Decomposition,
    EvalError::Version(_) => ErrorKind::VersionResolution,
    EvalError::ChecksumMismatch { .. } => ErrorKind::ChecksumMismatch,
    EvalError::LockStale { .. } => ErrorKind::LockEntryMissing,
    _ => ErrorKind::Other,
  }
}

fn execute_kind(err: &ExecuteError) -> ErrorKind {
  match err {
    ExecuteError::ChecksumMismatch { .. } => ErrorKind::ChecksumMismatch,
    ExecuteError::PlatformMismatch { .. } => ErrorKind::PlatformMismatch,
    _ => ErrorKind::Other,
  }
}

fn install_kind(err: &InstallError) -> ErrorKind {
  match err {
    InstallError::Eval(e) => eval_kind(e),
    InstallError::Execute(e) => execute_kind(e),
    // `--locked` could not be honoured either way.
    InstallError::LockEntryMissing { .. } | InstallError::LockedVersionConflict { .. } => ErrorKind::LockEntryMissing,
    InstallError::LockedPlanMismatch { .. } => ErrorKind::ChecksumMismatch,
    _ => ErrorKind::Other,
  }
}
