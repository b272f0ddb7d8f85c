//! Engine integration tests.
//!
//! Every collaborator that would touch the network is replaced by an
//! in-memory double from `common`; archives are extracted and binaries
//! installed for real inside a temporary `TSUKU_HOME`.

mod common;
mod deps_tests;
mod eval_tests;
mod execute_tests;
mod lock_tests;
