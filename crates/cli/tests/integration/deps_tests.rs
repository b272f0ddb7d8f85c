//! `tsuku deps` integration tests.

use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn deps_prints_tree_and_order() {
  let env = TestEnv::with_recipes(&["hello", "greeter"]);

  env
    .tsuku_cmd()
    .args(["deps", "greeter"])
    .assert()
    .success()
    .stdout(predicate::str::contains("greeter (needs install)"))
    .stdout(predicate::str::contains("└── hello (needs install)"))
    .stdout(predicate::str::contains("hello → greeter"));
}

#[test]
fn deps_marks_installed_tools() {
  let env = TestEnv::with_recipes(&["hello", "greeter"]);
  env.tsuku_cmd().args(["install", "hello@1.0.0"]).assert().success();

  env
    .tsuku_cmd()
    .args(["deps", "greeter"])
    .assert()
    .success()
    .stdout(predicate::str::contains("hello (installed)"))
    .stdout(predicate::str::contains("Already installed: hello"));
}

#[test]
fn deps_reports_cycles() {
  let env = TestEnv::with_recipes(&[]);
  env.write_file(
    "recipes/a.toml",
    "[metadata]\nname = \"a\"\ndependencies = [\"b\"]\n\n[[steps]]\naction = \"require_command\"\ncommand = \"sh\"\n",
  );
  env.write_file(
    "recipes/b.toml",
    "[metadata]\nname = \"b\"\ndependencies = [\"a\"]\n\n[[steps]]\naction = \"require_command\"\ncommand = \"sh\"\n",
  );

  env
    .tsuku_cmd()
    .args(["deps", "a"])
    .assert()
    .code(1)
    .stderr(predicate::str::contains("dependency cycle detected: a -> b -> a"));
}

#[test]
fn deps_install_with_everything_present() {
  let env = TestEnv::with_recipes(&["hello"]);
  env.tsuku_cmd().args(["install", "hello@1.0.0"]).assert().success();

  env
    .tsuku_cmd()
    .args(["deps", "hello", "--install"])
    .assert()
    .success()
    .stdout(predicate::str::contains("already installed"));
}
