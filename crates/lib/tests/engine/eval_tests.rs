//! Plan generation scenarios.

use tsuku_lib::action::Registry;
use tsuku_lib::execute::ExecOptions;
use tsuku_lib::plan::{EvalError, EvalRequest, InstallationPlan, VersionSelection, validate_plan};
use tsuku_lib::platform::{Arch, LinuxFamily, Os, Platform};
use tsuku_lib::util::hash::hash_bytes;
use tsuku_lib::version::VersionConstraint;

use super::common::{
  FixedDownloader, Harness, MemoryRecipes, RG_URL, debian, linux, ripgrep_harness, ripgrep_tarball, tarball,
};

fn latest() -> VersionSelection {
  VersionSelection::Resolve(VersionConstraint::Latest)
}

#[tokio::test]
async fn ripgrep_plan_has_three_deterministic_steps() {
  let h = ripgrep_harness();
  let recipe = h.recipes.get("ripgrep");

  let plan = h
    .evaluator()
    .eval(EvalRequest::new(&recipe, VersionSelection::Pinned("14.1.0".into()), linux()))
    .await
    .unwrap();

  assert_eq!(plan.tool, "ripgrep");
  assert_eq!(plan.version, "14.1.0");
  assert_eq!(plan.platform, linux());
  let actions: Vec<_> = plan.steps.iter().map(|s| s.action.as_str()).collect();
  assert_eq!(actions, ["download", "extract", "install_binaries"]);
  assert!(plan.deterministic);
  assert!(plan.steps.iter().all(|s| s.evaluable));

  let download = &plan.steps[0];
  assert_eq!(download.url(), Some(RG_URL));
  assert_eq!(download.checksum.as_deref(), Some(hash_bytes(&ripgrep_tarball()).as_str()));
  assert_eq!(download.size, Some(ripgrep_tarball().len() as u64));
  assert!(!download.params.contains_key("arch_mapping"));

  validate_plan(&plan, Registry::builtin()).unwrap();
}

#[tokio::test]
async fn ecosystem_build_makes_plan_non_deterministic() {
  let recipes = MemoryRecipes::default().with(
    "bat",
    r#"
[metadata]
name = "bat"

[[steps]]
action = "download"
url = "https://example.com/bat/{version}/README"

[[steps]]
action = "cargo_install"
crate = "bat"
executables = ["bat"]
"#,
  );
  let h = Harness::new(
    recipes,
    FixedDownloader::new().serve("https://example.com/bat/0.24.0/README", b"bat".to_vec()),
  );
  let recipe = h.recipes.get("bat");

  let plan = h
    .evaluator()
    .eval(EvalRequest::new(&recipe, VersionSelection::Pinned("0.24.0".into()), linux()))
    .await
    .unwrap();

  let actions: Vec<_> = plan.steps.iter().map(|s| s.action.as_str()).collect();
  assert_eq!(actions, ["download", "cargo_build"]);
  assert!(plan.steps[0].evaluable);
  assert!(!plan.steps[1].evaluable);
  assert!(!plan.deterministic);
  assert_eq!(plan.steps[1].params["version"], "0.24.0");
  validate_plan(&plan, Registry::builtin()).unwrap();
}

const FILTERED: &str = r#"
[metadata]
name = "tool"

[[steps]]
action = "require_command"
command = "sh"

[[steps]]
action = "brew_install"
packages = ["tool"]
when = { os = ["darwin"] }

[[steps]]
action = "apt_install"
packages = ["tool"]

[[steps]]
action = "dnf_install"
packages = ["tool"]
"#;

async fn filtered_actions(target: Platform) -> Vec<String> {
  let h = Harness::new(MemoryRecipes::default().with("tool", FILTERED), FixedDownloader::new());
  let recipe = h.recipes.get("tool");
  let plan = h
    .evaluator()
    .eval(EvalRequest::new(&recipe, VersionSelection::Pinned("1.0.0".into()), target))
    .await
    .unwrap();
  plan.steps.into_iter().map(|s| s.action).collect()
}

#[tokio::test]
async fn linux_without_family_drops_every_package_manager() {
  assert_eq!(filtered_actions(linux()).await, ["require_command"]);
}

#[tokio::test]
async fn apt_steps_are_absent_on_rhel() {
  let rhel = linux().with_linux_family(Some(LinuxFamily::Rhel));
  let actions = filtered_actions(rhel).await;
  assert_eq!(actions, ["require_command", "dnf_install"]);
}

#[tokio::test]
async fn debian_keeps_only_apt() {
  assert_eq!(filtered_actions(debian()).await, ["require_command", "apt_install"]);
}

#[tokio::test]
async fn darwin_keeps_brew_only() {
  let darwin = Platform::new(Os::Darwin, Arch::Arm64);
  assert_eq!(filtered_actions(darwin).await, ["require_command", "brew_install"]);
}

#[tokio::test]
async fn deterministic_plans_are_idempotent() {
  let h = ripgrep_harness();
  let recipe = h.recipes.get("ripgrep");

  let first = h.evaluator().eval(EvalRequest::new(&recipe, latest(), linux())).await.unwrap();
  let second = h.evaluator().eval(EvalRequest::new(&recipe, latest(), linux())).await.unwrap();

  assert!(first.deterministic);
  assert_eq!(first.canonical_json().unwrap(), second.canonical_json().unwrap());
  assert_eq!(h.versions.calls(), 2);
}

#[tokio::test]
async fn plans_round_trip_through_json() {
  let h = ripgrep_harness();
  let recipe = h.recipes.get("ripgrep");
  let plan = h.evaluator().eval(EvalRequest::new(&recipe, latest(), linux())).await.unwrap();

  let json = plan.to_json_pretty().unwrap();
  let value: serde_json::Value = serde_json::from_str(&json).unwrap();
  for key in ["format_version", "tool", "version", "platform", "deterministic", "steps"] {
    assert!(value.get(key).is_some(), "missing {key}");
  }
  assert_eq!(value["platform"]["os"], "linux");
  assert_eq!(value["steps"][0]["action"], "download");

  let parsed = InstallationPlan::from_json(&json).unwrap();
  assert_eq!(parsed, plan);
}

#[tokio::test]
async fn declared_checksum_must_match_download() {
  let recipe_toml = format!(
    r#"
[metadata]
name = "jq"

[[steps]]
action = "download"
url = "https://example.com/jq/{{version}}/jq"
checksum = "{}"

[[steps]]
action = "install_binaries"
binaries = ["jq"]
"#,
    "0".repeat(64)
  );
  let h = Harness::new(
    MemoryRecipes::default().with("jq", &recipe_toml),
    FixedDownloader::new().serve("https://example.com/jq/1.7.1/jq", b"jq".to_vec()),
  );
  let recipe = h.recipes.get("jq");

  let err = h
    .evaluator()
    .eval(EvalRequest::new(&recipe, VersionSelection::Pinned("1.7.1".into()), linux()))
    .await
    .unwrap_err();

  match err {
    EvalError::ChecksumMismatch { expected, actual, .. } => {
      assert_eq!(expected, "0".repeat(64));
      assert_eq!(actual, hash_bytes(b"jq"));
    }
    other => panic!("unexpected error: {other}"),
  }
}

#[tokio::test]
async fn unknown_actions_abort_evaluation() {
  let recipes = MemoryRecipes::default().with(
    "bad",
    "[metadata]\nname = \"bad\"\n\n[[steps]]\naction = \"run_command\"\ncommand = \"curl | sh\"\n",
  );
  let h = Harness::new(recipes, FixedDownloader::new());
  let recipe = h.recipes.get("bad");

  let err = h
    .evaluator()
    .eval(EvalRequest::new(&recipe, latest(), linux()))
    .await
    .unwrap_err();
  assert!(matches!(err, EvalError::Decomposition(_)), "{err}");
}

const JQ_BOTTLE: &str = r#"
[metadata]
name = "jq"

[[steps]]
action = "homebrew"
formula = "jq"
binaries = ["bin/jq"]
"#;

fn jq_bottle() -> Vec<u8> {
  tarball("jq/1.7.1", &[("bin/jq", b"#!/bin/sh\necho jq-1.7.1\n")])
}

#[tokio::test]
async fn homebrew_plan_downloads_the_bottle_for_the_target() {
  let linux_url = "https://ghcr.io/v2/homebrew/core/jq/manifests/1.7.1#x86_64_linux";
  let darwin_url = "https://ghcr.io/v2/homebrew/core/jq/manifests/1.7.1#arm64_sonoma";
  let h = Harness::new(
    MemoryRecipes::default().with("jq", JQ_BOTTLE),
    FixedDownloader::new()
      .serve(linux_url, jq_bottle())
      .serve(darwin_url, b"darwin bottle".to_vec()),
  );
  let recipe = h.recipes.get("jq");

  let plan = h
    .evaluator()
    .eval(EvalRequest::new(&recipe, VersionSelection::Pinned("1.7.1".into()), linux()))
    .await
    .unwrap();

  let actions: Vec<_> = plan.steps.iter().map(|s| s.action.as_str()).collect();
  assert_eq!(actions, ["download", "extract", "chmod", "install_binaries"]);
  assert!(plan.deterministic);
  assert_eq!(plan.steps[0].url(), Some(linux_url));
  assert_eq!(plan.steps[0].params["dest"], "jq-1.7.1.x86_64_linux.bottle.tar.gz");
  assert_eq!(plan.steps[0].checksum.as_deref(), Some(hash_bytes(&jq_bottle()).as_str()));
  assert_eq!(plan.steps[1].params["archive"], "jq-1.7.1.x86_64_linux.bottle.tar.gz");
  assert_eq!(plan.steps[1].params["strip_dirs"], 2);
  validate_plan(&plan, Registry::builtin()).unwrap();

  let darwin = h
    .evaluator()
    .eval(EvalRequest::new(
      &recipe,
      VersionSelection::Pinned("1.7.1".into()),
      Platform::new(Os::Darwin, Arch::Arm64),
    ))
    .await
    .unwrap();
  assert_eq!(darwin.steps[0].url(), Some(darwin_url));
  assert_eq!(darwin.steps[0].checksum.as_deref(), Some(hash_bytes(b"darwin bottle").as_str()));
}

#[tokio::test]
async fn homebrew_bottle_installs_its_binaries() {
  let h = Harness::new(
    MemoryRecipes::default().with("jq", JQ_BOTTLE),
    FixedDownloader::new().serve(
      "https://ghcr.io/v2/homebrew/core/jq/manifests/1.7.1#x86_64_linux",
      jq_bottle(),
    ),
  );
  let recipe = h.recipes.get("jq");
  let plan = h
    .evaluator()
    .eval(EvalRequest::new(&recipe, VersionSelection::Pinned("1.7.1".into()), linux()))
    .await
    .unwrap();

  let result = h.executor().execute(&plan, &ExecOptions::default()).await.unwrap();

  assert_eq!(result.binaries, vec![h.home.config.bin_dir().join("jq")]);
  let installed = std::fs::read_to_string(result.install_dir.join("bin/jq")).unwrap();
  assert!(installed.contains("jq-1.7.1"));
}
