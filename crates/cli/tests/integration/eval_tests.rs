//! `tsuku eval` integration tests.

use predicates::prelude::*;

use super::common::TestEnv;

const CROSS: &str = r#"
[metadata]
name = "cross"

[[steps]]
action = "require_command"
command = "sh"

[[steps]]
action = "brew_install"
packages = ["cross"]
when = { os = ["darwin"] }

[[steps]]
action = "apt_install"
packages = ["cross"]
"#;

#[test]
fn eval_prints_plan_json() {
  let env = TestEnv::with_recipes(&["hello"]);

  let plan = env.eval(&["hello@1.0.0"]);

  assert_eq!(plan["format_version"], 2);
  assert_eq!(plan["tool"], "hello");
  assert_eq!(plan["version"], "1.0.0");
  assert_eq!(plan["deterministic"], false);
  assert_eq!(plan["steps"].as_array().unwrap().len(), 1);
  assert_eq!(plan["steps"][0]["action"], "require_command");
  assert_eq!(plan["steps"][0]["params"]["command"], "sh");
}

#[test]
fn eval_targets_other_platforms() {
  let env = TestEnv::with_recipes(&[]);
  env.write_file("recipes/cross.toml", CROSS);

  let darwin = env.eval(&["cross@1.0.0", "--os", "darwin", "--arch", "arm64"]);
  assert_eq!(darwin["platform"]["os"], "darwin");
  assert_eq!(darwin["platform"]["arch"], "arm64");
  let actions: Vec<_> = darwin["steps"].as_array().unwrap().iter().map(|s| s["action"].clone()).collect();
  assert_eq!(actions, ["require_command", "brew_install"]);

  let rhel = env.eval(&["cross@1.0.0", "--os", "linux", "--arch", "amd64", "--linux-family", "rhel"]);
  assert_eq!(rhel["platform"]["linux_family"], "rhel");
  let actions: Vec<_> = rhel["steps"].as_array().unwrap().iter().map(|s| s["action"].clone()).collect();
  assert_eq!(actions, ["require_command"]);

  let debian = env.eval(&["cross@1.0.0", "--os", "linux", "--arch", "amd64", "--linux-family", "debian"]);
  let actions: Vec<_> = debian["steps"].as_array().unwrap().iter().map(|s| s["action"].clone()).collect();
  assert_eq!(actions, ["require_command", "apt_install"]);
}

#[test]
fn eval_output_is_stable_for_a_version() {
  let env = TestEnv::with_recipes(&["hello"]);

  let mut first = env.eval(&["hello@1.0.0"]);
  let mut second = env.eval(&["hello@1.0.0"]);
  first["generated_at"] = serde_json::Value::Null;
  second["generated_at"] = serde_json::Value::Null;

  assert_eq!(first, second);
}

#[test]
fn eval_unknown_recipe_fails() {
  let env = TestEnv::with_recipes(&[]);

  env
    .tsuku_cmd()
    .args(["eval", "nope@1.0.0"])
    .assert()
    .code(1)
    .stderr(predicate::str::contains("not found"));
}

#[test]
fn eval_rejects_unknown_platform_values() {
  let env = TestEnv::with_recipes(&["hello"]);

  env
    .tsuku_cmd()
    .args(["eval", "hello@1.0.0", "--os", "plan9"])
    .assert()
    .code(1)
    .stderr(predicate::str::contains("plan9"));
}

#[test]
fn eval_rejects_malformed_tool_spec() {
  let env = TestEnv::with_recipes(&["hello"]);

  env
    .tsuku_cmd()
    .args(["eval", "hello@"])
    .assert()
    .code(1)
    .stderr(predicate::str::contains("invalid tool specification"));
}
