//! `tsuku lock` integration tests.

use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn lock_with_nothing_installed() {
  let env = TestEnv::with_recipes(&["hello"]);

  env
    .tsuku_cmd()
    .arg("lock")
    .assert()
    .success()
    .stderr(predicate::str::contains("No installed tools to lock"));

  assert!(!env.lock_path().exists());
}

#[test]
fn lock_records_installed_version() {
  let env = TestEnv::with_recipes(&["hello"]);
  env.tsuku_cmd().args(["install", "hello@1.0.0"]).assert().success();

  env
    .tsuku_cmd()
    .args(["lock", "hello"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Locked 1 tool(s)"));

  let lock = env.lock_json();
  assert_eq!(lock["version"], 1);
  assert_eq!(lock["tools"]["hello"]["version"], "1.0.0");
  assert_eq!(lock["tools"]["hello"]["platforms"].as_object().unwrap().len(), 1);
}

#[test]
fn locked_install_uses_the_lock_file() {
  let env = TestEnv::with_recipes(&["hello"]);
  env.tsuku_cmd().args(["install", "hello@1.0.0"]).assert().success();
  env.tsuku_cmd().arg("lock").assert().success();

  // No version given: without the lock this would query the version API,
  // which is unreachable in tests.
  env
    .tsuku_cmd()
    .args(["install", "hello", "--locked", "--force"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Installed hello 1.0.0"))
    .stdout(predicate::str::contains("lock file"));
}

#[test]
fn locked_install_rejects_other_versions() {
  let env = TestEnv::with_recipes(&["hello"]);
  env.tsuku_cmd().args(["install", "hello@1.0.0"]).assert().success();
  env.tsuku_cmd().arg("lock").assert().success();

  env
    .tsuku_cmd()
    .args(["install", "hello@2.0.0", "--locked"])
    .assert()
    .code(4)
    .stderr(predicate::str::contains("locked to 1.0.0 but 2.0.0 was requested"));
}

#[test]
fn explicit_version_overrides_lock_with_warning() {
  let env = TestEnv::with_recipes(&["hello"]);
  env.tsuku_cmd().args(["install", "hello@1.0.0"]).assert().success();
  env.tsuku_cmd().arg("lock").assert().success();

  env
    .tsuku_cmd()
    .args(["install", "hello@2.0.0"])
    .assert()
    .success()
    .stderr(predicate::str::contains("hello is locked to 1.0.0 but 2.0.0 was requested"))
    .stdout(predicate::str::contains("Installed hello 2.0.0"));
}

#[test]
fn lock_unknown_tool_fails() {
  let env = TestEnv::with_recipes(&["hello"]);

  env
    .tsuku_cmd()
    .args(["lock", "hello"])
    .assert()
    .code(1)
    .stderr(predicate::str::contains("hello is not installed"));
}

#[test]
fn lock_file_flag_overrides_environment() {
  let env = TestEnv::with_recipes(&["hello"]);
  env.tsuku_cmd().args(["install", "hello@1.0.0"]).assert().success();
  let custom = env.temp.path().join("elsewhere").join("custom.lock");

  env.tsuku_cmd().arg("lock").arg("--lock-file").arg(&custom).assert().success();

  assert!(custom.is_file());
  assert!(!env.lock_path().exists());
}
