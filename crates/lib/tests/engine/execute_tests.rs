//! Plan execution: staging, activation, checksum enforcement and state.

use std::time::Duration;

use async_trait::async_trait;
use tsuku_lib::ErrorKind;
use tsuku_lib::action::{PrimitiveKind, Registry};
use tsuku_lib::consts::STAGING_PREFIX;
use tsuku_lib::execute::{ActionRunner, ExecOptions, ExecuteError, Executor, LocalRunner, StepContext};
use tsuku_lib::plan::{EvalRequest, InstallationPlan, ResolvedStep, VersionSelection};
use tsuku_lib::platform::{Arch, Os, Platform};
use tsuku_lib::state::{StateError, StateManager};

use super::common::{Harness, RG_URL, linux, ripgrep_harness};

async fn ripgrep_plan(h: &Harness) -> InstallationPlan {
  let recipe = h.recipes.get("ripgrep");
  h.evaluator()
    .eval(EvalRequest::new(&recipe, VersionSelection::Pinned("14.1.0".into()), linux()))
    .await
    .unwrap()
}

fn staging_dirs(h: &Harness) -> Vec<String> {
  match std::fs::read_dir(h.home.config.tools_dir()) {
    Ok(entries) => entries
      .filter_map(|e| e.ok())
      .map(|e| e.file_name().to_string_lossy().into_owned())
      .filter(|name| name.starts_with(STAGING_PREFIX))
      .collect(),
    Err(_) => Vec::new(),
  }
}

#[tokio::test]
async fn installs_and_records_state() {
  let h = ripgrep_harness();
  let plan = ripgrep_plan(&h).await;

  let result = h.executor().execute(&plan, &ExecOptions::default()).await.unwrap();

  assert!(!result.already_installed);
  assert_eq!(result.install_dir, h.home.config.tool_dir("ripgrep", "14.1.0"));
  assert!(result.install_dir.join("bin/rg").is_file());
  assert_eq!(result.binaries, vec![h.home.config.bin_dir().join("rg")]);
  let linked = std::fs::read_to_string(h.home.config.bin_dir().join("rg")).unwrap();
  assert!(linked.contains("ripgrep 14.1.0"));
  assert!(staging_dirs(&h).is_empty());
  assert_eq!(h.runner.actions(), ["extract", "install_binaries"]);

  let state = StateManager::from_config(&h.home.config).load().unwrap();
  let tool = state.tool("ripgrep").unwrap();
  assert_eq!(tool.active_version, "14.1.0");
  let version = &tool.versions["14.1.0"];
  assert_eq!(version.binaries, ["rg"]);
  assert_eq!(version.plan, plan);
  assert_eq!(version.resolutions.len(), 1);
  assert_eq!(version.resolutions[0].downloads[0].url, RG_URL);
}

#[tokio::test]
async fn second_install_is_a_no_op_unless_forced() {
  let h = ripgrep_harness();
  let plan = ripgrep_plan(&h).await;
  h.executor().execute(&plan, &ExecOptions::default()).await.unwrap();
  let fetched = h.downloader.fetches();

  let again = h.executor().execute(&plan, &ExecOptions::default()).await.unwrap();
  assert!(again.already_installed);
  assert_eq!(again.binaries, vec![h.home.config.bin_dir().join("rg")]);
  assert_eq!(h.downloader.fetches(), fetched);

  let forced = ExecOptions {
    force: true,
    ..ExecOptions::default()
  };
  let reinstalled = h.executor().execute(&plan, &forced).await.unwrap();
  assert!(!reinstalled.already_installed);
  assert_eq!(h.downloader.fetches(), fetched + 1);
  assert!(reinstalled.install_dir.join("bin/rg").is_file());
  assert!(staging_dirs(&h).is_empty());
}

#[tokio::test]
async fn checksum_mismatch_leaves_state_untouched() {
  let h = ripgrep_harness();
  let plan = ripgrep_plan(&h).await;
  h.downloader.replace(RG_URL, b"tampered".to_vec());
  let before = h.home.state_bytes();

  let err = h.executor().execute(&plan, &ExecOptions::default()).await.unwrap_err();

  match &err {
    ExecuteError::ChecksumMismatch { url, expected, actual, .. } => {
      assert_eq!(url, RG_URL);
      assert_eq!(Some(expected), plan.steps[0].checksum.as_ref());
      assert_ne!(expected, actual);
    }
    other => panic!("unexpected error: {other}"),
  }
  assert_eq!(ErrorKind::of(&err), ErrorKind::ChecksumMismatch);
  assert_eq!(h.home.state_bytes(), before);
  assert!(!h.home.config.tool_dir("ripgrep", "14.1.0").exists());
  assert!(!h.home.config.bin_dir().join("rg").exists());
  assert!(staging_dirs(&h).is_empty());
  assert!(h.runner.actions().is_empty());
}

#[tokio::test]
async fn foreign_plans_are_refused() {
  let h = ripgrep_harness();
  let mut plan = ripgrep_plan(&h).await;
  plan.platform = Platform::new(Os::Darwin, Arch::Arm64);

  let err = h.executor().execute(&plan, &ExecOptions::default()).await.unwrap_err();

  assert!(matches!(err, ExecuteError::PlatformMismatch { .. }), "{err}");
  assert_eq!(ErrorKind::of(&err), ErrorKind::PlatformMismatch);
  assert!(h.home.state_bytes().is_none());
}

#[tokio::test]
async fn invalid_plans_are_rejected_before_any_step() {
  let h = ripgrep_harness();
  let mut plan = ripgrep_plan(&h).await;
  plan.steps[0].checksum = None;

  let err = h.executor().execute(&plan, &ExecOptions::default()).await.unwrap_err();

  assert!(matches!(err, ExecuteError::Validation(_)), "{err}");
  assert_eq!(h.downloader.fetches(), 1);
  assert!(h.home.state_bytes().is_none());
}

#[tokio::test]
async fn failing_step_discards_staging() {
  let h = ripgrep_harness();
  let mut plan = ripgrep_plan(&h).await;
  plan.steps[2].params.insert("binaries".into(), serde_json::json!(["missing"]));

  let err = h.executor().execute(&plan, &ExecOptions::default()).await.unwrap_err();

  assert!(matches!(err, ExecuteError::MissingArtifact { step: 2, .. }), "{err}");
  assert!(staging_dirs(&h).is_empty());
  assert!(!h.home.config.tool_dir("ripgrep", "14.1.0").exists());
  assert!(h.home.state_bytes().is_none());
}

#[tokio::test]
async fn generous_timeout_does_not_interfere() {
  let h = ripgrep_harness();
  let plan = ripgrep_plan(&h).await;
  let options = ExecOptions {
    timeout: Some(Duration::from_secs(60)),
    ..ExecOptions::default()
  };

  let result = h.executor().execute(&plan, &options).await.unwrap();
  assert!(!result.already_installed);
}

#[tokio::test]
async fn expired_deadline_leaves_nothing_behind() {
  let h = ripgrep_harness();
  let plan = ripgrep_plan(&h).await;
  let options = ExecOptions {
    timeout: Some(Duration::ZERO),
    ..ExecOptions::default()
  };

  let err = h.executor().execute(&plan, &options).await.unwrap_err();

  assert!(matches!(err, ExecuteError::TimedOut { .. }), "{err}");
  assert!(staging_dirs(&h).is_empty());
  assert!(!h.home.config.tool_dir("ripgrep", "14.1.0").exists());
  assert!(h.home.state_bytes().is_none());
}

#[tokio::test]
async fn link_failure_rolls_back_and_a_plain_retry_succeeds() {
  let h = ripgrep_harness();
  let plan = ripgrep_plan(&h).await;
  let bin = h.home.config.bin_dir();
  std::fs::write(&bin, b"not a directory").unwrap();

  let err = h.executor().execute(&plan, &ExecOptions::default()).await.unwrap_err();

  assert!(matches!(err, ExecuteError::Io(_)), "{err}");
  assert!(!h.home.config.tool_dir("ripgrep", "14.1.0").exists());
  assert!(h.home.state_bytes().is_none());
  assert!(staging_dirs(&h).is_empty());

  std::fs::remove_file(&bin).unwrap();
  let result = h.executor().execute(&plan, &ExecOptions::default()).await.unwrap();
  assert!(!result.already_installed);
  assert!(bin.join("rg").exists());
}

/// Clobbers the state file while a step runs, so recording the install fails.
#[derive(Default)]
struct StateClobberingRunner {
  inner: LocalRunner,
  state_path: std::path::PathBuf,
}

#[async_trait]
impl ActionRunner for StateClobberingRunner {
  async fn run(&self, kind: PrimitiveKind, step: &ResolvedStep, ctx: &StepContext) -> Result<(), ExecuteError> {
    std::fs::write(&self.state_path, b"{ not json").unwrap();
    self.inner.run(kind, step, ctx).await
  }
}

#[cfg(unix)]
#[tokio::test]
async fn failed_state_update_restores_the_replaced_install() {
  let h = ripgrep_harness();
  let plan = ripgrep_plan(&h).await;
  h.executor().execute(&plan, &ExecOptions::default()).await.unwrap();
  let tool_dir = h.home.config.tool_dir("ripgrep", "14.1.0");
  std::fs::write(tool_dir.join("previous-marker"), b"").unwrap();

  let runner = StateClobberingRunner {
    state_path: h.home.config.state_path(),
    ..StateClobberingRunner::default()
  };
  let executor = Executor::new(&h.home.config, h.host, Registry::builtin(), &h.downloader, &runner);
  let forced = ExecOptions {
    force: true,
    ..ExecOptions::default()
  };
  let err = executor.execute(&plan, &forced).await.unwrap_err();

  assert!(matches!(err, ExecuteError::State(StateError::Parse { .. })), "{err}");
  assert!(tool_dir.join("previous-marker").exists());
  assert!(tool_dir.join("bin/rg").is_file());
  let link = h.home.config.bin_dir().join("rg");
  assert_eq!(std::fs::read_link(&link).unwrap(), tool_dir.join("bin/rg"));
  assert!(staging_dirs(&h).is_empty());
}

#[tokio::test]
async fn downloads_may_land_in_nested_destinations() {
  let h = ripgrep_harness();
  let mut plan = ripgrep_plan(&h).await;
  plan.steps[0].params.insert("dest".into(), serde_json::json!("archives/rg.tar.gz"));
  plan.steps[1].params.insert("archive".into(), serde_json::json!("archives/rg.tar.gz"));

  let result = h.executor().execute(&plan, &ExecOptions::default()).await.unwrap();

  assert!(result.install_dir.join("bin/rg").is_file());
}
