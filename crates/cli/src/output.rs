//! CLI output formatting utilities.
//!
//! Colored status lines, timestamps and durations. Status lines other than
//! success go to stderr so that `--format json` and `eval` keep stdout clean.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::Context;
use clap::ValueEnum;
use owo_colors::{OwoColorize, Stream};

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
  #[default]
  Text,
  Json,
}

impl OutputFormat {
  pub fn is_json(self) -> bool {
    matches!(self, OutputFormat::Json)
  }
}

pub mod symbols {
  pub const SUCCESS: &str = "✓";
  pub const ERROR: &str = "✗";
  pub const WARNING: &str = "⚠";
  pub const INFO: &str = "•";
  pub const ARROW: &str = "→";
}

pub fn format_duration(duration: Duration) -> String {
  let secs = duration.as_secs();
  let millis = duration.subsec_millis();

  if secs >= 60 {
    let mins = secs / 60;
    let remaining_secs = secs % 60;
    format!("{}m {}s", mins, remaining_secs)
  } else if secs > 0 {
    format!("{}.{:02}s", secs, millis / 10)
  } else {
    format!("{}ms", millis)
  }
}

/// Unix seconds as an RFC 3339 timestamp.
pub fn format_timestamp(unix: u64) -> String {
  let time: SystemTime = UNIX_EPOCH + Duration::from_secs(unix);
  humantime::format_rfc3339_seconds(time).to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Level {
  Success,
  Error,
  Warning,
  Info,
}

impl Level {
  fn symbol(self) -> &'static str {
    match self {
      Level::Success => symbols::SUCCESS,
      Level::Error => symbols::ERROR,
      Level::Warning => symbols::WARNING,
      Level::Info => symbols::INFO,
    }
  }

  /// Only results go to stdout; `eval` and `list --format json` rely on it.
  fn stream(self) -> Stream {
    match self {
      Level::Success => Stream::Stdout,
      Level::Error | Level::Warning | Level::Info => Stream::Stderr,
    }
  }
}

fn status_line(level: Level, message: &str) -> String {
  let stream = level.stream();
  let symbol = level.symbol();
  match level {
    Level::Success => format!("{} {}", symbol.if_supports_color(stream, |s| s.green()), message),
    Level::Info => format!("{} {}", symbol.if_supports_color(stream, |s| s.blue()), message),
    Level::Error => format!(
      "{} {}",
      symbol.if_supports_color(stream, |s| s.red()),
      message.if_supports_color(stream, |s| s.red())
    ),
    Level::Warning => format!(
      "{} {}",
      symbol.if_supports_color(stream, |s| s.yellow()),
      message.if_supports_color(stream, |s| s.yellow())
    ),
  }
}

fn emit(level: Level, message: &str) {
  let line = status_line(level, message);
  match level.stream() {
    Stream::Stdout => println!("{line}"),
    _ => eprintln!("{line}"),
  }
}

pub fn print_success(message: &str) {
  emit(Level::Success, message);
}

pub fn print_error(message: &str) {
  emit(Level::Error, message);
}

pub fn print_warning(message: &str) {
  emit(Level::Warning, message);
}

pub fn print_info(message: &str) {
  emit(Level::Info, message);
}

pub fn print_stat(label: &str, value: &str) {
  println!(
    "  {}: {}",
    label.if_supports_color(Stream::Stdout, |s| s.dimmed()),
    value
  );
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
  println!("{}", json);
  Ok(())
}
