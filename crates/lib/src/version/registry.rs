use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use super::{Source, VersionConstraint, VersionError, VersionInfo, VersionResolver};
use crate::consts::APP_NAME;
use crate::recipe::{Recipe, RegistrySource};

/// Base URL of every registry API. Overridden as a whole in tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryUrls {
  pub crates_io: String,
  pub npm: String,
  pub pypi: String,
  pub rubygems: String,
  pub goproxy: String,
  pub metacpan: String,
  pub homebrew: String,
}

impl Default for RegistryUrls {
  fn default() -> Self {
    Self {
      crates_io: "https://crates.io".to_string(),
      npm: "https://registry.npmjs.org".to_string(),
      pypi: "https://pypi.org".to_string(),
      rubygems: "https://rubygems.org".to_string(),
      goproxy: "https://proxy.golang.org".to_string(),
      metacpan: "https://fastapi.metacpan.org".to_string(),
      homebrew: "https://formulae.brew.sh".to_string(),
    }
  }
}

impl RegistryUrls {
  /// Every registry served from one host.
  pub fn uniform(base: &str) -> Self {
    let base = base.trim_end_matches('/').to_string();
    Self {
      crates_io: base.clone(),
      npm: base.clone(),
      pypi: base.clone(),
      rubygems: base.clone(),
      goproxy: base.clone(),
      metacpan: base.clone(),
      homebrew: base,
    }
  }

  fn endpoint(&self, registry: RegistrySource, package: &str) -> String {
    match registry {
      RegistrySource::CratesIo => format!("{}/api/v1/crates/{package}", self.crates_io),
      RegistrySource::Npm => format!("{}/{}/latest", self.npm, package.replace('/', "%2F")),
      RegistrySource::Pypi => format!("{}/pypi/{package}/json", self.pypi),
      RegistrySource::Rubygems => format!("{}/api/v1/versions/{package}/latest.json", self.rubygems),
      RegistrySource::Goproxy => format!("{}/{}/@latest", self.goproxy, escape_module_path(package)),
      RegistrySource::Metacpan => format!("{}/v1/release/{}", self.metacpan, cpan_distribution(package)),
      RegistrySource::Homebrew => format!("{}/api/formula/{package}.json", self.homebrew),
    }
  }
}

/// Upper-case letters are written as `!` plus the lower-case letter so module
/// paths survive case-insensitive file systems on the proxy.
fn escape_module_path(module: &str) -> String {
  let mut escaped = String::with_capacity(module.len());
  for c in module.chars() {
    if c.is_ascii_uppercase() {
      escaped.push('!');
      escaped.push(c.to_ascii_lowercase());
    } else {
      escaped.push(c);
    }
  }
  escaped
}

/// `App::cpanminus` is released as the `App-cpanminus` distribution.
fn cpan_distribution(module: &str) -> String {
  module.replace("::", "-")
}

#[derive(Deserialize)]
struct CratesIoCrate {
  #[serde(rename = "crate")]
  krate: CratesIoInfo,
}

#[derive(Deserialize)]
struct CratesIoInfo {
  max_stable_version: Option<String>,
  #[serde(default)]
  max_version: String,
}

#[derive(Deserialize)]
struct BareVersion {
  version: String,
}

#[derive(Deserialize)]
struct PypiProject {
  info: BareVersion,
}

#[derive(Deserialize)]
struct GoproxyInfo {
  #[serde(rename = "Version")]
  version: String,
}

#[derive(Deserialize)]
struct HomebrewFormula {
  versions: HomebrewVersions,
  #[serde(default)]
  disabled: bool,
}

#[derive(Deserialize)]
struct HomebrewVersions {
  stable: Option<String>,
}

/// Resolves `latest` through the package registry a recipe installs from.
#[derive(Debug, Clone, Default)]
pub struct RegistryVersionResolver {
  client: reqwest::Client,
  urls: RegistryUrls,
}

impl RegistryVersionResolver {
  pub fn new(urls: RegistryUrls) -> Self {
    Self {
      client: reqwest::Client::new(),
      urls,
    }
  }

  async fn get<T: DeserializeOwned>(&self, tool: &str, url: &str) -> Result<T, VersionError> {
    debug!(tool = %tool, url = %url, "querying registry");
    let response = self
      .client
      .get(url)
      .header(reqwest::header::USER_AGENT, APP_NAME)
      .header(reqwest::header::ACCEPT, "application/json")
      .send()
      .await
      .map_err(|e| VersionError::Request {
        tool: tool.to_string(),
        message: e.to_string(),
      })?;

    if !response.status().is_success() {
      return Err(VersionError::Status {
        tool: tool.to_string(),
        status: response.status().as_u16(),
      });
    }

    response.json().await.map_err(|e| VersionError::Request {
      tool: tool.to_string(),
      message: e.to_string(),
    })
  }

  /// Latest published version of `package`, as the registry writes it.
  pub async fn latest(&self, tool: &str, registry: RegistrySource, package: &str) -> Result<String, VersionError> {
    let url = self.urls.endpoint(registry, package);
    let version = match registry {
      RegistrySource::CratesIo => {
        let body: CratesIoCrate = self.get(tool, &url).await?;
        body.krate.max_stable_version.unwrap_or(body.krate.max_version)
      }
      RegistrySource::Npm | RegistrySource::Rubygems | RegistrySource::Metacpan => {
        self.get::<BareVersion>(tool, &url).await?.version
      }
      RegistrySource::Pypi => self.get::<PypiProject>(tool, &url).await?.info.version,
      RegistrySource::Goproxy => self.get::<GoproxyInfo>(tool, &url).await?.version,
      RegistrySource::Homebrew => {
        let formula: HomebrewFormula = self.get(tool, &url).await?;
        if formula.disabled {
          return Err(VersionError::Unavailable {
            tool: tool.to_string(),
            message: format!("formula '{package}' is disabled"),
          });
        }
        formula.versions.stable.unwrap_or_default()
      }
    };

    if version.is_empty() {
      return Err(VersionError::Unavailable {
        tool: tool.to_string(),
        message: format!("{registry} lists no version for '{package}'"),
      });
    }
    Ok(version)
  }
}

#[async_trait]
impl VersionResolver for RegistryVersionResolver {
  async fn resolve(&self, recipe: &Recipe, constraint: &VersionConstraint) -> Result<VersionInfo, VersionError> {
    let tool = recipe.name();

    if let Some(version) = constraint.exact() {
      return Ok(VersionInfo::pinned(recipe, version));
    }

    let Some(Source::Registry { registry, package }) = Source::of(recipe) else {
      return Err(VersionError::NoSource { tool: tool.to_string() });
    };

    let latest = self.latest(tool, registry, &package).await?;
    let info = VersionInfo::pinned(recipe, &latest);
    info!(tool = %tool, registry = %registry, version = %info.version, "resolved latest version");
    Ok(info)
  }
}
