mod cmd;
mod output;
mod prompts;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use tsuku_lib::ErrorKind;

use crate::cmd::Session;
use crate::output::{OutputFormat, print_error};

/// tsuku - reproducible tool installation from declarative recipes
#[derive(Parser)]
#[command(name = "tsuku")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Lock file to read and write (default: $TSUKU_LOCK_FILE or ./tsuku.lock)
  #[arg(long, global = true, value_name = "PATH")]
  lock_file: Option<PathBuf>,

  /// Directory of recipe files (default: $TSUKU_RECIPES or $TSUKU_HOME/recipes)
  #[arg(long, global = true, value_name = "DIR")]
  recipes: Option<PathBuf>,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Generate an installation plan and print it as JSON
  Eval {
    /// Tool to evaluate, optionally with a version (`ripgrep@14.1.0`)
    tool: String,

    /// Target operating system (default: this host)
    #[arg(long)]
    os: Option<String>,

    /// Target architecture (default: this host)
    #[arg(long)]
    arch: Option<String>,

    /// Target Linux family (debian, rhel, arch, alpine, suse)
    #[arg(long)]
    linux_family: Option<String>,
  },

  /// Install a tool, or run a previously generated plan
  Install {
    /// Tool to install, optionally with a version (`ripgrep@14.1.0`)
    #[arg(required_unless_present = "plan", conflicts_with = "plan")]
    tool: Option<String>,

    /// Plan file to execute; `-` reads the plan from stdin
    #[arg(long, value_name = "FILE")]
    plan: Option<PathBuf>,

    /// Reinstall even if this version is already installed
    #[arg(short, long)]
    force: bool,

    /// Fail unless the lock file has an entry for this platform
    #[arg(long)]
    locked: bool,

    /// Install missing dependencies without asking
    #[arg(short, long)]
    yes: bool,

    /// Abort the installation after this long (e.g. `10m`)
    #[arg(long, value_parser = humantime::parse_duration)]
    timeout: Option<Duration>,
  },

  /// Record the installed resolutions for this platform in the lock file
  Lock {
    /// Tools to lock (default: every installed tool)
    tools: Vec<String>,
  },

  /// Show the dependency tree of a tool
  Deps {
    /// Tool whose dependencies to resolve
    tool: String,

    /// Install every missing dependency, in generation order
    #[arg(long)]
    install: bool,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    yes: bool,
  },

  /// List installed tools
  List {
    /// Output format
    #[arg(long, value_enum, default_value_t)]
    format: OutputFormat,
  },
}

fn main() -> ExitCode {
  let cli = Cli::parse();
  init_logging(cli.verbose);

  match run(cli) {
    Ok(()) => ExitCode::SUCCESS,
    Err(err) => {
      print_error(&format!("{err:#}"));
      ExitCode::from(exit_code(&err))
    }
  }
}

fn run(cli: Cli) -> anyhow::Result<()> {
  let session = Session::new(cli.lock_file, cli.recipes)?;

  match cli.command {
    Commands::Eval {
      tool,
      os,
      arch,
      linux_family,
    } => cmd::cmd_eval(&session, &tool, os.as_deref(), arch.as_deref(), linux_family.as_deref()),
    Commands::Install {
      tool,
      plan,
      force,
      locked,
      yes,
      timeout,
    } => {
      let options = cmd::InstallArgs {
        force,
        locked,
        yes,
        timeout,
      };
      match plan {
        Some(plan) => cmd::cmd_install_plan(&session, &plan, &options),
        None => cmd::cmd_install(&session, tool.as_deref().unwrap_or_default(), &options),
      }
    }
    Commands::Lock { tools } => cmd::cmd_lock(&session, &tools),
    Commands::Deps { tool, install, yes } => cmd::cmd_deps(&session, &tool, install, yes),
    Commands::List { format } => cmd::cmd_list(&session, format),
  }
}

/// Logs go to stderr so `eval` output on stdout stays machine-readable.
fn init_logging(verbose: bool) {
  let default = if verbose { "debug" } else { "warn" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();
}

fn exit_code(err: &anyhow::Error) -> u8 {
  let kind = err
    .chain()
    .map(ErrorKind::of)
    .find(|kind| *kind != ErrorKind::Other)
    .unwrap_or(ErrorKind::Other);

  match kind {
    ErrorKind::ChecksumMismatch => 3,
    ErrorKind::LockEntryMissing => 4,
    ErrorKind::PlatformMismatch => 5,
    _ => 1,
  }
}
