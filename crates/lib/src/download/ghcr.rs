//! Homebrew bottles on the GitHub container registry.
//!
//! A bottle is referenced as the manifest of a formula version plus the
//! bottle tag in the URL fragment:
//!
//! `https://ghcr.io/v2/homebrew/core/jq/manifests/1.7.1#x86_64_linux`
//!
//! The manifest index names one blob per bottle tag together with its digest.
//! The blob is fetched with an anonymous pull token and must hash to that
//! digest.

use std::collections::BTreeMap;

use serde::Deserialize;
use tracing::debug;

use super::DownloadError;
use crate::consts::APP_NAME;

pub const GHCR_HOST: &str = "ghcr.io";
pub const DEFAULT_GHCR_URL: &str = "https://ghcr.io";

const INDEX_MEDIA_TYPE: &str = "application/vnd.oci.image.index.v1+json";
const REF_NAME: &str = "org.opencontainers.image.ref.name";
const BOTTLE_DIGEST: &str = "sh.brew.bottle.digest";

/// A bottle named by manifest URL and bottle tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BottleRef {
  pub repository: String,
  pub reference: String,
  pub tag: String,
}

impl BottleRef {
  /// `None` for anything that is not a GHCR manifest URL with a fragment.
  pub fn parse(url: &url::Url) -> Option<Self> {
    if url.host_str() != Some(GHCR_HOST) {
      return None;
    }
    let tag = url.fragment().filter(|tag| !tag.is_empty())?;
    let path = url.path().strip_prefix("/v2/")?;
    let (repository, reference) = path.rsplit_once("/manifests/")?;
    if repository.is_empty() || reference.is_empty() || reference.contains('/') {
      return None;
    }
    Some(Self {
      repository: repository.to_string(),
      reference: reference.to_string(),
      tag: tag.to_string(),
    })
  }
}

#[derive(Deserialize)]
struct Token {
  token: String,
}

#[derive(Deserialize)]
struct ManifestIndex {
  #[serde(default)]
  manifests: Vec<ManifestEntry>,
}

#[derive(Deserialize)]
struct ManifestEntry {
  #[serde(default)]
  annotations: BTreeMap<String, String>,
}

/// The blob to download for one bottle, with the token that may read it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BottleBlob {
  pub url: String,
  pub sha256: String,
  pub token: String,
}

#[derive(Debug, Clone)]
pub struct GhcrClient {
  client: reqwest::Client,
  registry_url: String,
}

impl Default for GhcrClient {
  fn default() -> Self {
    Self::new(reqwest::Client::new(), DEFAULT_GHCR_URL)
  }
}

impl GhcrClient {
  pub fn new(client: reqwest::Client, registry_url: impl Into<String>) -> Self {
    Self {
      client,
      registry_url: registry_url.into().trim_end_matches('/').to_string(),
    }
  }

  async fn get(&self, url: &str, context: &str, token: Option<&str>) -> Result<reqwest::Response, DownloadError> {
    let mut request = self
      .client
      .get(url)
      .header(reqwest::header::USER_AGENT, APP_NAME)
      .header(reqwest::header::ACCEPT, INDEX_MEDIA_TYPE);
    if let Some(token) = token {
      request = request.bearer_auth(token);
    }
    let response = request.send().await.map_err(|e| DownloadError::Request {
      url: context.to_string(),
      message: e.to_string(),
    })?;
    if !response.status().is_success() {
      return Err(DownloadError::Status {
        url: context.to_string(),
        status: response.status().as_u16(),
      });
    }
    Ok(response)
  }

  async fn pull_token(&self, repository: &str, context: &str) -> Result<String, DownloadError> {
    let url = format!(
      "{}/token?service={GHCR_HOST}&scope=repository:{repository}:pull",
      self.registry_url
    );
    let token: Token = self
      .get(&url, context, None)
      .await?
      .json()
      .await
      .map_err(|e| DownloadError::Request {
        url: context.to_string(),
        message: e.to_string(),
      })?;
    Ok(token.token)
  }

  /// Look up the blob for `bottle`. `context` is the URL reported in errors.
  pub async fn resolve(&self, bottle: &BottleRef, context: &str) -> Result<BottleBlob, DownloadError> {
    let token = self.pull_token(&bottle.repository, context).await?;
    let manifest_url = format!(
      "{}/v2/{}/manifests/{}",
      self.registry_url, bottle.repository, bottle.reference
    );
    let index: ManifestIndex = self
      .get(&manifest_url, context, Some(&token))
      .await?
      .json()
      .await
      .map_err(|e| DownloadError::Request {
        url: context.to_string(),
        message: e.to_string(),
      })?;

    let wanted = format!("{}.{}", bottle.reference, bottle.tag);
    let digest = index
      .manifests
      .iter()
      .filter(|entry| entry.annotations.get(REF_NAME) == Some(&wanted))
      .find_map(|entry| entry.annotations.get(BOTTLE_DIGEST))
      .ok_or_else(|| DownloadError::MissingBottle {
        url: context.to_string(),
        tag: bottle.tag.clone(),
      })?;
    let sha256 = digest.strip_prefix("sha256:").unwrap_or(digest.as_str()).to_ascii_lowercase();

    debug!(repository = %bottle.repository, tag = %bottle.tag, sha256 = %sha256, "bottle located");
    Ok(BottleBlob {
      url: format!(
        "{}/v2/{}/blobs/sha256:{sha256}",
        self.registry_url, bottle.repository
      ),
      sha256,
      token,
    })
  }
}
