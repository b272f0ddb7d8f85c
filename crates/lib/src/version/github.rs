use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use super::{Source, VersionConstraint, VersionError, VersionInfo, VersionResolver};
use crate::consts::{APP_NAME, DEFAULT_API_URL};
use crate::recipe::Recipe;

#[derive(Deserialize)]
struct Release {
  tag_name: String,
}

/// Resolves `latest` through the GitHub releases API.
#[derive(Debug, Clone)]
pub struct GithubVersionResolver {
  client: reqwest::Client,
  api_url: String,
  token: Option<String>,
}

impl Default for GithubVersionResolver {
  fn default() -> Self {
    Self::new(DEFAULT_API_URL, None)
  }
}

impl GithubVersionResolver {
  pub fn new(api_url: impl Into<String>, token: Option<String>) -> Self {
    Self {
      client: reqwest::Client::new(),
      api_url: api_url.into().trim_end_matches('/').to_string(),
      token,
    }
  }

  async fn latest_tag(&self, tool: &str, repo: &str) -> Result<String, VersionError> {
    let url = format!("{}/repos/{}/releases/latest", self.api_url, repo);
    debug!(tool = %tool, url = %url, "querying latest release");

    let mut request = self
      .client
      .get(&url)
      .header(reqwest::header::USER_AGENT, APP_NAME)
      .header(reqwest::header::ACCEPT, "application/vnd.github+json");
    if let Some(token) = &self.token {
      request = request.bearer_auth(token);
    }

    let response = request.send().await.map_err(|e| VersionError::Request {
      tool: tool.to_string(),
      message: e.to_string(),
    })?;

    if !response.status().is_success() {
      return Err(VersionError::Status {
        tool: tool.to_string(),
        status: response.status().as_u16(),
      });
    }

    let release: Release = response.json().await.map_err(|e| VersionError::Request {
      tool: tool.to_string(),
      message: e.to_string(),
    })?;
    Ok(release.tag_name)
  }
}

#[async_trait]
impl VersionResolver for GithubVersionResolver {
  async fn resolve(&self, recipe: &Recipe, constraint: &VersionConstraint) -> Result<VersionInfo, VersionError> {
    let tool = recipe.name();

    if let Some(version) = constraint.exact() {
      return Ok(VersionInfo::pinned(recipe, version));
    }

    let Some(Source::Github { repo }) = Source::of(recipe) else {
      return Err(VersionError::NoSource { tool: tool.to_string() });
    };

    let tag = self.latest_tag(tool, &repo).await?;
    let prefix = recipe.version.tag_prefix();
    let Some(version) = tag.strip_prefix(prefix).map(str::to_string) else {
      return Err(VersionError::TagPrefix {
        tool: tool.to_string(),
        tag,
        prefix: prefix.to_string(),
      });
    };

    info!(tool = %tool, version = %version, "resolved latest version");
    Ok(VersionInfo { version, tag })
  }
}
