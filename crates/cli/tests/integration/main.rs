//! CLI integration tests. Each test runs `tsuku` against its own
//! `TSUKU_HOME`, recipe directory and lock file.

mod common;
mod deps_tests;
mod eval_tests;
mod install_tests;
mod lock_tests;
