use std::collections::BTreeMap;
use std::sync::LazyLock;

use super::decompose::DecompositionError;
use super::preflight::preflight;
use super::types::{ActionKind, ActionMetadata, CompositeKind, Ecosystem, PackageManager, PrimitiveKind};
use crate::filter::Constraint;
use crate::recipe::Params;

use ActionKind::{Composite, Primitive};

const BUILTIN_ACTIONS: &[(&str, ActionKind)] = &[
  ("download", Primitive(PrimitiveKind::Download)),
  ("extract", Primitive(PrimitiveKind::Extract)),
  ("chmod", Primitive(PrimitiveKind::Chmod)),
  ("install_binaries", Primitive(PrimitiveKind::InstallBinaries)),
  ("apt_install", Primitive(PrimitiveKind::PackageInstall(PackageManager::Apt))),
  ("dnf_install", Primitive(PrimitiveKind::PackageInstall(PackageManager::Dnf))),
  ("pacman_install", Primitive(PrimitiveKind::PackageInstall(PackageManager::Pacman))),
  ("apk_install", Primitive(PrimitiveKind::PackageInstall(PackageManager::Apk))),
  ("zypper_install", Primitive(PrimitiveKind::PackageInstall(PackageManager::Zypper))),
  ("brew_install", Primitive(PrimitiveKind::PackageInstall(PackageManager::Brew))),
  ("cargo_build", Primitive(PrimitiveKind::EcosystemBuild(Ecosystem::Cargo))),
  ("npm_exec", Primitive(PrimitiveKind::EcosystemBuild(Ecosystem::Npm))),
  ("pip_exec", Primitive(PrimitiveKind::EcosystemBuild(Ecosystem::Pip))),
  ("gem_exec", Primitive(PrimitiveKind::EcosystemBuild(Ecosystem::Gem))),
  ("go_build", Primitive(PrimitiveKind::EcosystemBuild(Ecosystem::Go))),
  ("cpan_install", Primitive(PrimitiveKind::EcosystemBuild(Ecosystem::Cpan))),
  ("require_command", Primitive(PrimitiveKind::RequireCommand)),
  ("manual", Primitive(PrimitiveKind::Manual)),
  ("download_archive", Composite(CompositeKind::DownloadArchive)),
  ("github_archive", Composite(CompositeKind::GithubArchive)),
  ("github_file", Composite(CompositeKind::GithubFile)),
  ("cargo_install", Composite(CompositeKind::CargoInstall)),
  ("npm_install", Composite(CompositeKind::NpmInstall)),
  ("pipx_install", Composite(CompositeKind::PipxInstall)),
  ("gem_install", Composite(CompositeKind::GemInstall)),
  ("go_install", Composite(CompositeKind::GoInstall)),
  ("homebrew", Composite(CompositeKind::Homebrew)),
];

static BUILTIN: LazyLock<Registry> = LazyLock::new(|| Registry {
  actions: BUILTIN_ACTIONS
    .iter()
    .map(|&(name, kind)| (name, ActionSpec { name, kind }))
    .collect(),
});

/// A registered action: the capability surface every step goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionSpec {
  pub name: &'static str,
  pub kind: ActionKind,
}

impl ActionSpec {
  pub fn metadata(&self) -> ActionMetadata {
    self.kind.metadata()
  }

  pub fn implicit_constraint(&self) -> Option<Constraint> {
    self.kind.implicit_constraint()
  }

  pub fn preflight(&self, params: &Params) -> Result<(), DecompositionError> {
    preflight(self.name, self.kind, params)
  }

  /// One level of expansion. Primitives expand to nothing; callers recurse.
  pub fn decompose(&self, params: &Params) -> Vec<crate::recipe::Step> {
    match self.kind {
      Primitive(_) => Vec::new(),
      Composite(kind) => super::decompose::expand_composite(kind, params),
    }
  }
}

/// Immutable name → action table, built once per process.
#[derive(Debug)]
pub struct Registry {
  actions: BTreeMap<&'static str, ActionSpec>,
}

impl Registry {
  pub fn builtin() -> &'static Registry {
    &BUILTIN
  }

  pub fn get(&self, name: &str) -> Option<&ActionSpec> {
    self.actions.get(name)
  }

  pub fn contains(&self, name: &str) -> bool {
    self.actions.contains_key(name)
  }

  pub fn metadata(&self, name: &str) -> Option<ActionMetadata> {
    self.get(name).map(ActionSpec::metadata)
  }

  pub fn iter(&self) -> impl Iterator<Item = &ActionSpec> {
    self.actions.values()
  }

  pub fn composites(&self) -> impl Iterator<Item = &ActionSpec> {
    self.iter().filter(|spec| !spec.kind.is_primitive())
  }
}
