//! tsuku-lib: recipe evaluation and installation engine for tsuku.
//!
//! The engine turns a recipe into an installed tool in two phases:
//!
//! - evaluation: filter recipe steps for a platform, decompose composite
//!   actions into primitives, pick a version and capture download checksums,
//!   producing an [`plan::InstallationPlan`]
//! - execution: replay a plan's primitive steps in a staging directory,
//!   verify every download, and activate the result atomically
//!
//! Around those sit the dependency resolver ([`deps`]), the user-owned lock
//! file ([`lock`]) and the machine-wide install state ([`state`]).

pub mod action;
pub mod config;
pub mod consts;
pub mod deps;
pub mod download;
pub mod error;
pub mod execute;
pub mod filter;
pub mod install;
pub mod lock;
pub mod plan;
pub mod platform;
pub mod recipe;
pub mod state;
pub mod template;
pub mod util;
pub mod version;

pub use error::{Error, ErrorKind};
