//! Installation plans: generation, serialization and validation.
//!
//! A plan is the boundary between evaluation and execution. Everything that
//! needs the network to decide (versions, checksums) is settled here; the
//! executor only ever sees concrete primitive steps.

mod eval;
mod types;
mod validate;

pub use eval::{EvalError, EvalRequest, Evaluator, KnownChecksums, VersionSelection};
pub use types::{DownloadRecord, InstallationPlan, PLAN_FORMAT_VERSION, ResolvedStep, binary_name};
pub use validate::{PlanValidationError, validate_plan};
