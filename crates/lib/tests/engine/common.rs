//! Shared collaborator doubles for engine integration tests.

use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use flate2::Compression;
use flate2::write::GzEncoder;
use tempfile::TempDir;

use tsuku_lib::action::{PrimitiveKind, Registry};
use tsuku_lib::config::Config;
use tsuku_lib::download::{DownloadError, Downloader, Fetched, cache_file_name};
use tsuku_lib::execute::{ActionRunner, ExecuteError, Executor, LocalRunner, StepContext};
use tsuku_lib::install::Installer;
use tsuku_lib::lock::LockFile;
use tsuku_lib::plan::{Evaluator, ResolvedStep};
use tsuku_lib::platform::{Arch, LinuxFamily, Os, Platform};
use tsuku_lib::recipe::{Recipe, RecipeError, RecipeLoader};
use tsuku_lib::util::hash::hash_bytes;
use tsuku_lib::version::{VersionConstraint, VersionError, VersionInfo, VersionResolver};

pub fn linux() -> Platform {
  Platform::new(Os::Linux, Arch::Amd64)
}

pub fn debian() -> Platform {
  linux().with_linux_family(Some(LinuxFamily::Debian))
}

/// Recipes parsed from inline TOML.
#[derive(Default)]
pub struct MemoryRecipes {
  recipes: HashMap<String, Recipe>,
}

impl MemoryRecipes {
  pub fn with(mut self, name: &str, toml: &str) -> Self {
    let recipe = Recipe::from_toml_str(name, toml).unwrap_or_else(|e| panic!("bad recipe {name}: {e}"));
    self.recipes.insert(name.to_string(), recipe);
    self
  }

  /// A recipe whose only content is its declared dependencies.
  pub fn with_deps(self, name: &str, deps: &[&str]) -> Self {
    let list = deps.iter().map(|d| format!("\"{d}\"")).collect::<Vec<_>>().join(", ");
    let toml = format!(
      "[metadata]\nname = \"{name}\"\ndependencies = [{list}]\n\n[[steps]]\naction = \"require_command\"\ncommand = \"{name}\"\n"
    );
    self.with(name, &toml)
  }

  pub fn get(&self, name: &str) -> Recipe {
    self.load(name).unwrap()
  }
}

impl RecipeLoader for MemoryRecipes {
  fn load(&self, name: &str) -> Result<Recipe, RecipeError> {
    self.recipes.get(name).cloned().ok_or_else(|| RecipeError::NotFound {
      name: name.to_string(),
      dir: PathBuf::from("<memory>"),
    })
  }
}

/// Resolves every constraint to one fixed version and counts the calls.
pub struct CountingResolver {
  version: String,
  calls: AtomicUsize,
}

impl CountingResolver {
  pub fn new(version: &str) -> Self {
    Self {
      version: version.to_string(),
      calls: AtomicUsize::new(0),
    }
  }

  pub fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl VersionResolver for CountingResolver {
  async fn resolve(&self, recipe: &Recipe, constraint: &VersionConstraint) -> Result<VersionInfo, VersionError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    let version = constraint.exact().unwrap_or(&self.version);
    Ok(VersionInfo::pinned(recipe, version))
  }
}

/// Serves fixed bodies per URL from a temporary cache directory.
pub struct FixedDownloader {
  cache: TempDir,
  bodies: Mutex<HashMap<String, Vec<u8>>>,
  fetches: AtomicUsize,
}

impl FixedDownloader {
  pub fn new() -> Self {
    Self {
      cache: TempDir::new().unwrap(),
      bodies: Mutex::new(HashMap::new()),
      fetches: AtomicUsize::new(0),
    }
  }

  pub fn serve(self, url: &str, body: Vec<u8>) -> Self {
    self.replace(url, body);
    self
  }

  /// Change what `url` serves, e.g. to simulate a tampered release asset.
  pub fn replace(&self, url: &str, body: Vec<u8>) {
    self.bodies.lock().unwrap().insert(url.to_string(), body);
  }

  pub fn fetches(&self) -> usize {
    self.fetches.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl Downloader for FixedDownloader {
  async fn fetch(&self, url: &str) -> Result<Fetched, DownloadError> {
    self.fetches.fetch_add(1, Ordering::SeqCst);
    let body = self.bodies.lock().unwrap().get(url).cloned().ok_or_else(|| DownloadError::Status {
      url: url.to_string(),
      status: 404,
    })?;

    let path = self.cache.path().join(cache_file_name(url));
    std::fs::write(&path, &body).map_err(|source| DownloadError::Io {
      url: url.to_string(),
      source,
    })?;
    Ok(Fetched {
      path,
      sha256: hash_bytes(&body),
      size: body.len() as u64,
    })
  }
}

/// Records every action it is asked to run and delegates to [`LocalRunner`].
#[derive(Default)]
pub struct RecordingRunner {
  inner: LocalRunner,
  actions: Mutex<Vec<String>>,
}

impl RecordingRunner {
  pub fn actions(&self) -> Vec<String> {
    self.actions.lock().unwrap().clone()
  }
}

#[async_trait]
impl ActionRunner for RecordingRunner {
  async fn run(&self, kind: PrimitiveKind, step: &ResolvedStep, ctx: &StepContext) -> Result<(), ExecuteError> {
    self.actions.lock().unwrap().push(step.action.clone());
    self.inner.run(kind, step, ctx).await
  }
}

/// An isolated tsuku home directory.
pub struct TestHome {
  pub temp: TempDir,
  pub config: Config,
}

impl TestHome {
  pub fn new() -> Self {
    let temp = TempDir::new().unwrap();
    let config = Config::with_home(temp.path());
    Self { temp, config }
  }

  pub fn state_bytes(&self) -> Option<Vec<u8>> {
    std::fs::read(self.config.state_path()).ok()
  }
}

/// Collaborators bundled so a test can build an [`Installer`] in one line.
pub struct Harness {
  pub home: TestHome,
  pub recipes: MemoryRecipes,
  pub versions: CountingResolver,
  pub downloader: FixedDownloader,
  pub runner: RecordingRunner,
  pub host: Platform,
}

impl Harness {
  pub fn new(recipes: MemoryRecipes, downloader: FixedDownloader) -> Self {
    Self {
      home: TestHome::new(),
      recipes,
      versions: CountingResolver::new("14.1.0"),
      downloader,
      runner: RecordingRunner::default(),
      host: linux(),
    }
  }

  pub fn evaluator(&self) -> Evaluator<'_> {
    Evaluator::new(Registry::builtin(), &self.versions, &self.downloader)
  }

  pub fn executor(&self) -> Executor<'_> {
    Executor::new(
      &self.home.config,
      self.host,
      Registry::builtin(),
      &self.downloader,
      &self.runner,
    )
  }

  pub fn installer(&self, lock: Option<LockFile>) -> Installer<'_> {
    Installer::new(&self.recipes, self.evaluator(), self.executor(), lock, self.host)
  }
}

/// A `.tar.gz` holding `files` under a single top-level directory.
pub fn tarball(top: &str, files: &[(&str, &[u8])]) -> Vec<u8> {
  let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
  for (name, body) in files {
    let mut header = tar::Header::new_gnu();
    header.set_size(body.len() as u64);
    header.set_mode(0o755);
    header.set_cksum();
    builder.append_data(&mut header, format!("{top}/{name}"), *body).unwrap();
  }
  let mut encoder = builder.into_inner().unwrap();
  encoder.flush().unwrap();
  encoder.finish().unwrap()
}

pub const RG_URL: &str = "https://example.com/ripgrep/14.1.0/ripgrep-14.1.0-x86_64-unknown-linux-musl.tar.gz";

/// ripgrep as three primitive steps.
pub const RIPGREP: &str = r#"
[metadata]
name = "ripgrep"

[version]
github_repo = "BurntSushi/ripgrep"
tag_prefix = ""

[[steps]]
action = "download"
url = "https://example.com/ripgrep/{version}/ripgrep-{version}-{arch}-unknown-{os}-musl.tar.gz"
dest = "rg.tar.gz"
arch_mapping = { amd64 = "x86_64", arm64 = "aarch64" }

[[steps]]
action = "extract"
archive = "rg.tar.gz"
format = "tar.gz"
strip_dirs = 1

[[steps]]
action = "install_binaries"
binaries = ["rg"]
"#;

pub fn ripgrep_tarball() -> Vec<u8> {
  tarball("ripgrep-14.1.0-x86_64-unknown-linux-musl", &[("rg", b"#!/bin/sh\necho ripgrep 14.1.0\n")])
}

pub fn ripgrep_harness() -> Harness {
  Harness::new(
    MemoryRecipes::default().with("ripgrep", RIPGREP),
    FixedDownloader::new().serve(RG_URL, ripgrep_tarball()),
  )
}
