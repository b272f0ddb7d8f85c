//! Implementation of the `tsuku lock` command.
//!
//! Only the host platform is recorded. Other platforms are added by running
//! `tsuku lock` on them and committing the merged file.

use anyhow::{Context, Result};
use tsuku_lib::install::snapshot_lock;

use super::Session;
use crate::output::{print_info, print_stat, print_success};

pub fn cmd_lock(session: &Session, tools: &[String]) -> Result<()> {
  let state = session.state().load().context("Failed to read install state")?;
  let mut lock = session.lock()?.unwrap_or_default();

  let locked = snapshot_lock(&mut lock, &state, tools, &session.host)?;
  if locked.is_empty() {
    print_info("No installed tools to lock");
    return Ok(());
  }

  let path = &session.config.lock_file;
  lock.save(path).with_context(|| format!("Failed to write lock file {}", path.display()))?;

  print_success(&format!("Locked {} tool(s) for {} in {}", locked.len(), session.host.qualified_key(), path.display()));
  for tool in &locked {
    if let Some(entry) = lock.tools.get(tool) {
      print_stat(tool, &entry.version);
    }
  }
  Ok(())
}
