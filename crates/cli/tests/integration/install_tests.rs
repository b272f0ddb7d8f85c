//! `tsuku install` integration tests.

use predicates::prelude::*;

use super::common::{TestEnv, other_os};

#[test]
fn install_explicit_version() {
  let env = TestEnv::with_recipes(&["hello"]);

  env
    .tsuku_cmd()
    .args(["install", "hello@1.0.0"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Installed hello 1.0.0"))
    .stdout(predicate::str::contains("requested version"));

  assert!(env.home().join("tools").join("hello-1.0.0").is_dir());
  assert!(env.home().join("state.json").is_file());
}

#[test]
fn install_is_idempotent() {
  let env = TestEnv::with_recipes(&["hello"]);

  env.tsuku_cmd().args(["install", "hello@1.0.0"]).assert().success();

  env
    .tsuku_cmd()
    .args(["install", "hello@1.0.0"])
    .assert()
    .success()
    .stderr(predicate::str::contains("already installed"));

  env
    .tsuku_cmd()
    .args(["install", "hello@1.0.0", "--force"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Installed hello 1.0.0"));
}

#[test]
fn list_shows_installed_tools() {
  let env = TestEnv::with_recipes(&["hello"]);

  env
    .tsuku_cmd()
    .arg("list")
    .assert()
    .success()
    .stderr(predicate::str::contains("No tools installed"));

  env.tsuku_cmd().args(["install", "hello@1.0.0"]).assert().success();

  env
    .tsuku_cmd()
    .arg("list")
    .assert()
    .success()
    .stdout(predicate::str::contains("hello 1.0.0"));

  let output = env.tsuku_cmd().args(["list", "--format", "json"]).output().unwrap();
  assert!(output.status.success());
  let listed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(listed[0]["tool"], "hello");
  assert_eq!(listed[0]["active_version"], "1.0.0");
}

#[test]
fn install_plan_from_file() {
  let env = TestEnv::with_recipes(&["hello"]);
  let plan = env.eval(&["hello@1.0.0"]);
  let path = env.write_file("hello.plan.json", &plan.to_string());

  env
    .tsuku_cmd()
    .arg("install")
    .arg("--plan")
    .arg(&path)
    .assert()
    .success()
    .stdout(predicate::str::contains("Installed hello 1.0.0"));
}

#[test]
fn install_plan_from_stdin() {
  let env = TestEnv::with_recipes(&["hello"]);
  let plan = env.eval(&["hello@1.0.0"]);

  env
    .tsuku_cmd()
    .args(["install", "--plan", "-"])
    .write_stdin(plan.to_string())
    .assert()
    .success()
    .stdout(predicate::str::contains("Installed hello 1.0.0"));
}

#[test]
fn foreign_plan_exits_with_platform_mismatch() {
  let env = TestEnv::with_recipes(&["hello"]);
  let plan = env.eval(&["hello@1.0.0", "--os", other_os()]);

  env
    .tsuku_cmd()
    .args(["install", "--plan", "-"])
    .write_stdin(plan.to_string())
    .assert()
    .code(5)
    .stderr(predicate::str::contains("regenerate the plan"));

  assert!(!env.home().join("state.json").exists());
}

#[test]
fn tampered_plan_is_rejected() {
  let env = TestEnv::with_recipes(&["hello"]);
  let mut plan = env.eval(&["hello@1.0.0"]);
  plan["format_version"] = serde_json::json!(99);

  env
    .tsuku_cmd()
    .args(["install", "--plan", "-"])
    .write_stdin(plan.to_string())
    .assert()
    .code(1)
    .stderr(predicate::str::contains("99"));
}

#[test]
fn garbage_plan_fails_to_parse() {
  let env = TestEnv::with_recipes(&[]);

  env
    .tsuku_cmd()
    .args(["install", "--plan", "-"])
    .write_stdin("not json")
    .assert()
    .code(1)
    .stderr(predicate::str::contains("failed to parse plan"));
}

#[test]
fn locked_install_without_lock_entry_exits_4() {
  let env = TestEnv::with_recipes(&["hello"]);

  env
    .tsuku_cmd()
    .args(["install", "hello", "--locked"])
    .assert()
    .code(4)
    .stderr(predicate::str::contains("no lock entry for hello"));

  assert!(!env.home().join("state.json").exists());
}

#[test]
fn missing_dependencies_need_confirmation() {
  let env = TestEnv::with_recipes(&["hello", "greeter"]);

  env
    .tsuku_cmd()
    .args(["install", "greeter@2.0.0"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("--yes"));
}

#[test]
fn satisfied_dependencies_need_no_confirmation() {
  let env = TestEnv::with_recipes(&["hello", "greeter"]);
  env.tsuku_cmd().args(["install", "hello@1.0.0"]).assert().success();

  env
    .tsuku_cmd()
    .args(["install", "greeter@2.0.0"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Installed greeter 2.0.0"));
}
