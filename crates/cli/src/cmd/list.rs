//! Implementation of the `tsuku list` command.

use anyhow::{Context, Result};
use serde::Serialize;

use super::Session;
use crate::output::{OutputFormat, format_timestamp, print_info, print_json, print_stat, symbols};

#[derive(Debug, Serialize)]
struct ListedTool<'a> {
  tool: &'a str,
  active_version: &'a str,
  versions: Vec<&'a str>,
  binaries: &'a [String],
  installed_at: Option<u64>,
}

pub fn cmd_list(session: &Session, format: OutputFormat) -> Result<()> {
  let state = session.state().load().context("Failed to read install state")?;

  let tools: Vec<ListedTool<'_>> = state
    .tools
    .iter()
    .map(|(name, tool)| {
      let active = tool.versions.get(&tool.active_version);
      ListedTool {
        tool: name,
        active_version: &tool.active_version,
        versions: tool.versions.keys().map(String::as_str).collect(),
        binaries: active.map(|v| v.binaries.as_slice()).unwrap_or_default(),
        installed_at: active.map(|v| v.installed_at),
      }
    })
    .collect();

  if format.is_json() {
    return print_json(&tools);
  }

  if tools.is_empty() {
    print_info("No tools installed. Run 'tsuku install <tool>' to install one.");
    return Ok(());
  }

  for tool in &tools {
    println!("{} {} {}", symbols::INFO, tool.tool, tool.active_version);
    if tool.versions.len() > 1 {
      print_stat("Versions", &tool.versions.join(", "));
    }
    if !tool.binaries.is_empty() {
      print_stat("Binaries", &tool.binaries.join(", "));
    }
    if let Some(at) = tool.installed_at {
      print_stat("Installed", &format_timestamp(at));
    }
  }
  Ok(())
}
