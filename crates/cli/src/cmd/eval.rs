//! Implementation of the `tsuku eval` command.
//!
//! Evaluates a recipe for a target platform (the host unless overridden) and
//! writes the resulting installation plan to stdout.

use anyhow::{Context, Result};
use tsuku_lib::install::select;
use tsuku_lib::plan::EvalRequest;
use tsuku_lib::platform::{Arch, LinuxFamily, Os, Platform};
use tsuku_lib::recipe::RecipeLoader;

use super::{Session, parse_tool_spec, runtime};
use crate::output::print_json;

pub fn cmd_eval(
  session: &Session,
  spec: &str,
  os: Option<&str>,
  arch: Option<&str>,
  linux_family: Option<&str>,
) -> Result<()> {
  let (tool, explicit) = parse_tool_spec(spec)?;
  let target = target_platform(&session.host, os, arch, linux_family)?;
  let recipe = session.recipes.load(tool)?;
  let lock = session.lock()?;

  let selection = select(&recipe, lock.as_ref(), &target, explicit, false)?;
  let request = EvalRequest::new(&recipe, selection.version.clone(), target).with_known(selection.known());

  let rt = runtime()?;
  let plan = rt
    .block_on(session.evaluator().eval(request))
    .with_context(|| format!("Failed to evaluate {tool}"))?;

  print_json(&plan)
}

/// The host platform with any of its parts overridden.
///
/// Changing the OS drops the host's Linux family unless one is given; a
/// family is never kept for a non-Linux target.
fn target_platform(
  host: &Platform,
  os: Option<&str>,
  arch: Option<&str>,
  linux_family: Option<&str>,
) -> Result<Platform> {
  let target_os = match os {
    Some(os) => os.parse::<Os>()?,
    None => host.os,
  };
  let target_arch = match arch {
    Some(arch) => arch.parse::<Arch>()?,
    None => host.arch,
  };
  let family = match linux_family {
    Some(family) => Some(family.parse::<LinuxFamily>()?),
    None if target_os == host.os => host.linux_family,
    None => None,
  };

  Ok(Platform::new(target_os, target_arch).with_linux_family(family))
}
