use serde::Serialize;

use crate::filter::Constraint;
use crate::platform::{LinuxFamily, Os};

/// System package managers, each bound to the platform it can run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageManager {
  Apt,
  Dnf,
  Pacman,
  Apk,
  Zypper,
  Brew,
}

impl PackageManager {
  pub fn constraint(&self) -> Constraint {
    match self {
      Self::Apt => Constraint::linux(LinuxFamily::Debian),
      Self::Dnf => Constraint::linux(LinuxFamily::Rhel),
      Self::Pacman => Constraint::linux(LinuxFamily::Arch),
      Self::Apk => Constraint::linux(LinuxFamily::Alpine),
      Self::Zypper => Constraint::linux(LinuxFamily::Suse),
      Self::Brew => Constraint::os(Os::Darwin),
    }
  }

  /// Program and fixed leading arguments; package names are appended.
  pub fn command(&self) -> (&'static str, &'static [&'static str]) {
    match self {
      Self::Apt => ("apt-get", &["install", "-y"]),
      Self::Dnf => ("dnf", &["install", "-y"]),
      Self::Pacman => ("pacman", &["-S", "--noconfirm", "--needed"]),
      Self::Apk => ("apk", &["add", "--no-cache"]),
      Self::Zypper => ("zypper", &["--non-interactive", "install"]),
      Self::Brew => ("brew", &["install"]),
    }
  }

  /// Whether the command needs root (brew refuses to run as root).
  pub fn needs_root(&self) -> bool {
    !matches!(self, Self::Brew)
  }
}

/// Language ecosystems whose builds go through their own toolchain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Ecosystem {
  Cargo,
  Npm,
  Pip,
  Gem,
  Go,
  Cpan,
}

impl Ecosystem {
  /// Parameter naming the package for this ecosystem.
  pub fn package_param(&self) -> &'static str {
    match self {
      Self::Cargo => "crate",
      Self::Npm | Self::Pip => "package",
      Self::Gem => "gem",
      Self::Go | Self::Cpan => "module",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimitiveKind {
  Download,
  Extract,
  Chmod,
  InstallBinaries,
  PackageInstall(PackageManager),
  EcosystemBuild(Ecosystem),
  RequireCommand,
  Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompositeKind {
  DownloadArchive,
  GithubArchive,
  GithubFile,
  CargoInstall,
  NpmInstall,
  PipxInstall,
  GemInstall,
  GoInstall,
  Homebrew,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ActionKind {
  Primitive(PrimitiveKind),
  Composite(CompositeKind),
}

/// Static facts about an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ActionMetadata {
  pub deterministic: bool,
  pub requires_network: bool,
  pub install_time_deps: &'static [&'static str],
  pub runtime_deps: &'static [&'static str],
  pub is_primitive: bool,
}

impl ActionMetadata {
  const fn file_op(requires_network: bool) -> Self {
    Self {
      deterministic: true,
      requires_network,
      install_time_deps: &[],
      runtime_deps: &[],
      is_primitive: true,
    }
  }

  const fn opaque(requires_network: bool) -> Self {
    Self {
      deterministic: false,
      requires_network,
      install_time_deps: &[],
      runtime_deps: &[],
      is_primitive: true,
    }
  }

  const fn build(install_time_deps: &'static [&'static str], runtime_deps: &'static [&'static str]) -> Self {
    Self {
      deterministic: false,
      requires_network: true,
      install_time_deps,
      runtime_deps,
      is_primitive: true,
    }
  }

  const fn composite(self) -> Self {
    Self {
      is_primitive: false,
      ..self
    }
  }
}

impl Ecosystem {
  pub fn metadata(&self) -> ActionMetadata {
    match self {
      Self::Cargo => ActionMetadata::build(&["rust"], &[]),
      Self::Npm => ActionMetadata::build(&["nodejs"], &["nodejs"]),
      Self::Pip => ActionMetadata::build(&["python-standalone"], &["python-standalone"]),
      Self::Gem => ActionMetadata::build(&["ruby"], &["ruby"]),
      Self::Go => ActionMetadata::build(&["go"], &[]),
      Self::Cpan => ActionMetadata::build(&["perl"], &[]),
    }
  }
}

impl ActionKind {
  pub fn metadata(&self) -> ActionMetadata {
    match self {
      Self::Primitive(kind) => match kind {
        PrimitiveKind::Download => ActionMetadata::file_op(true),
        PrimitiveKind::Extract | PrimitiveKind::Chmod | PrimitiveKind::InstallBinaries => {
          ActionMetadata::file_op(false)
        }
        PrimitiveKind::PackageInstall(_) => ActionMetadata::opaque(true),
        PrimitiveKind::EcosystemBuild(eco) => eco.metadata(),
        PrimitiveKind::RequireCommand | PrimitiveKind::Manual => ActionMetadata::opaque(false),
      },
      Self::Composite(kind) => match kind {
        CompositeKind::DownloadArchive
        | CompositeKind::GithubArchive
        | CompositeKind::GithubFile
        | CompositeKind::Homebrew => {
          ActionMetadata::file_op(true).composite()
        }
        CompositeKind::CargoInstall => Ecosystem::Cargo.metadata().composite(),
        CompositeKind::NpmInstall => Ecosystem::Npm.metadata().composite(),
        CompositeKind::PipxInstall => Ecosystem::Pip.metadata().composite(),
        CompositeKind::GemInstall => Ecosystem::Gem.metadata().composite(),
        CompositeKind::GoInstall => Ecosystem::Go.metadata().composite(),
      },
    }
  }

  pub fn is_primitive(&self) -> bool {
    matches!(self, Self::Primitive(_))
  }

  /// Registry-owned platform restriction; recipes can only narrow it.
  pub fn implicit_constraint(&self) -> Option<Constraint> {
    match self {
      Self::Primitive(PrimitiveKind::PackageInstall(pm)) => Some(pm.constraint()),
      _ => None,
    }
  }
}
