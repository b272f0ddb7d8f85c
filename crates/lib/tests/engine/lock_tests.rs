//! Resolution precedence against a lock file.

use tsuku_lib::ErrorKind;
use tsuku_lib::install::{InstallError, InstallOptions, Precedence, snapshot_lock};
use tsuku_lib::lock::{LockFile, ResolutionMetadata};
use tsuku_lib::plan::DownloadRecord;
use tsuku_lib::platform::{Arch, Os, Platform};
use tsuku_lib::state::StateManager;
use tsuku_lib::util::hash::hash_bytes;

use super::common::{RG_URL, linux, ripgrep_harness, ripgrep_tarball};

fn lock_for(platform: Platform, version: &str) -> LockFile {
  let mut lock = LockFile::new();
  lock.update_from_resolution(
    "ripgrep",
    version,
    &ResolutionMetadata {
      platform,
      downloads: vec![DownloadRecord {
        url: RG_URL.to_string(),
        checksum: hash_bytes(&ripgrep_tarball()),
        size: ripgrep_tarball().len() as u64,
      }],
      resolved_at: 1_700_000_000,
    },
  );
  lock
}

fn locked() -> InstallOptions {
  InstallOptions {
    locked: true,
    ..InstallOptions::default()
  }
}

#[tokio::test]
async fn exact_platform_entry_skips_version_resolution() {
  let h = ripgrep_harness();
  let installer = h.installer(Some(lock_for(linux(), "14.1.0")));

  let outcome = installer.install("ripgrep", None, &locked()).await.unwrap();

  assert_eq!(outcome.precedence, Precedence::Locked);
  assert_eq!(outcome.result.version, "14.1.0");
  assert_eq!(h.versions.calls(), 0);
  // Only the executor fetches; evaluation took the checksum from the lock.
  assert_eq!(h.downloader.fetches(), 1);
}

#[tokio::test]
async fn locked_without_entry_fails() {
  let h = ripgrep_harness();
  let installer = h.installer(Some(LockFile::new()));

  let err = installer.install("ripgrep", None, &locked()).await.unwrap_err();

  assert!(matches!(err, InstallError::LockEntryMissing { ref tool, .. } if tool == "ripgrep"));
  assert_eq!(ErrorKind::of(&err), ErrorKind::LockEntryMissing);
  assert_eq!(h.versions.calls(), 0);
  assert!(h.home.state_bytes().is_none());
}

#[tokio::test]
async fn other_platform_entry_pins_the_version_only() {
  let h = ripgrep_harness();
  let installer = h.installer(Some(lock_for(Platform::new(Os::Darwin, Arch::Arm64), "14.1.0")));

  let (precedence, plan) = installer.plan("ripgrep", None, false).await.unwrap();

  assert_eq!(precedence, Precedence::LockPinned);
  assert_eq!(plan.version, "14.1.0");
  assert_eq!(h.versions.calls(), 0);
  assert_eq!(h.downloader.fetches(), 1);

  let err = installer.plan("ripgrep", None, true).await.unwrap_err();
  assert!(matches!(err, InstallError::LockEntryMissing { .. }));
}

#[tokio::test]
async fn explicit_version_overrides_lock_unless_locked() {
  let h = ripgrep_harness();
  let installer = h.installer(Some(lock_for(linux(), "14.0.0")));

  let err = installer.plan("ripgrep", Some("14.1.0"), true).await.unwrap_err();
  match err {
    InstallError::LockedVersionConflict { locked, requested, .. } => {
      assert_eq!(locked, "14.0.0");
      assert_eq!(requested, "14.1.0");
    }
    other => panic!("unexpected error: {other}"),
  }

  let (precedence, plan) = installer.plan("ripgrep", Some("14.1.0"), false).await.unwrap();
  assert_eq!(precedence, Precedence::Explicit);
  assert_eq!(plan.version, "14.1.0");
  assert_eq!(h.versions.calls(), 0);
}

#[tokio::test]
async fn stale_lock_checksum_is_a_mismatch() {
  let h = ripgrep_harness();
  let mut lock = lock_for(Platform::new(Os::Darwin, Arch::Arm64), "14.1.0");
  if let Some(tool) = lock.tools.get_mut("ripgrep") {
    for platform in tool.platforms.values_mut() {
      platform.downloads[0].checksum = "f".repeat(64);
    }
  }
  let installer = h.installer(Some(lock));

  let err = installer.plan("ripgrep", None, false).await.unwrap_err();
  assert_eq!(ErrorKind::of(&err), ErrorKind::ChecksumMismatch);
}

#[tokio::test]
async fn installed_resolution_round_trips_through_the_lock_file() {
  let h = ripgrep_harness();
  let outcome = h
    .installer(None)
    .install("ripgrep", None, &InstallOptions::default())
    .await
    .unwrap();
  assert_eq!(outcome.precedence, Precedence::Dynamic);
  assert_eq!(h.versions.calls(), 1);

  let state = StateManager::from_config(&h.home.config).load().unwrap();
  let mut lock = LockFile::new();
  let tools = snapshot_lock(&mut lock, &state, &[], &h.host).unwrap();
  assert_eq!(tools, ["ripgrep"]);

  let path = h.home.temp.path().join("project").join("tsuku.lock");
  lock.save(&path).unwrap();
  let reloaded = LockFile::load(&path).unwrap().unwrap();
  assert_eq!(reloaded, lock);

  let (precedence, plan) = h.installer(Some(reloaded)).plan("ripgrep", None, true).await.unwrap();
  assert_eq!(precedence, Precedence::Locked);
  assert_eq!(plan.steps[0].checksum.as_deref(), Some(hash_bytes(&ripgrep_tarball()).as_str()));
  assert_eq!(h.versions.calls(), 1);
}
