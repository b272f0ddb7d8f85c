//! Implementation of the `tsuku deps` command.

use anyhow::{Result, bail};

use super::install::{InstallArgs, discover, install_dependencies, print_discovery};
use super::{Session, runtime};
use crate::output::print_success;
use crate::prompts::confirm;

/// Print the dependency tree of `tool`; with `install`, install every tool in
/// the generation order (the root included) after confirmation.
pub fn cmd_deps(session: &Session, tool: &str, install: bool, yes: bool) -> Result<()> {
  let rt = runtime()?;
  let (tree, order) = rt.block_on(discover(session, tool))?;

  print!("{}", tree.format_tree());
  println!();
  print_discovery(&tree.summary());

  if !install {
    return Ok(());
  }
  if order.is_empty() {
    print_success(&format!("{tool} and its dependencies are already installed"));
    return Ok(());
  }
  if !confirm(&format!("Install {} tool(s)?", order.len()), yes)? {
    bail!("installation cancelled");
  }

  let installer = session.installer(session.lock()?);
  let args = InstallArgs {
    yes,
    ..InstallArgs::default()
  };
  rt.block_on(install_dependencies(&installer, &order, &args))
}
