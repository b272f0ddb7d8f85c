use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info};

use super::ghcr::{BottleRef, GhcrClient};
use super::{DownloadError, Downloader, Fetched, cache_file_name, validate_url};
use crate::consts::APP_NAME;

/// reqwest-backed downloader with an on-disk cache keyed by URL.
#[derive(Debug, Clone)]
pub struct HttpDownloader {
  client: reqwest::Client,
  ghcr: GhcrClient,
  cache_dir: PathBuf,
}

impl HttpDownloader {
  pub fn new(cache_dir: impl Into<PathBuf>) -> Result<Self, DownloadError> {
    // Redirect targets get the same scheme and host checks as the original URL.
    let policy = reqwest::redirect::Policy::custom(|attempt| {
      if attempt.previous().len() > 10 {
        return attempt.error("too many redirects");
      }
      match validate_url(attempt.url().as_str()) {
        Ok(_) => attempt.follow(),
        Err(err) => attempt.error(err),
      }
    });

    let client = reqwest::Client::builder()
      .user_agent(APP_NAME)
      .redirect(policy)
      .build()
      .map_err(|e| DownloadError::Request {
        url: String::new(),
        message: e.to_string(),
      })?;

    Ok(Self {
      ghcr: GhcrClient::new(client.clone(), super::ghcr::DEFAULT_GHCR_URL),
      client,
      cache_dir: cache_dir.into(),
    })
  }

  pub fn cache_dir(&self) -> &Path {
    &self.cache_dir
  }

  async fn download_to_cache(&self, url: &str, dest: &Path, token: Option<&str>) -> Result<Fetched, DownloadError> {
    let io_err = |source: std::io::Error| DownloadError::Io {
      url: url.to_string(),
      source,
    };

    tokio::fs::create_dir_all(&self.cache_dir).await.map_err(io_err)?;

    let mut request = self.client.get(url);
    if let Some(token) = token {
      request = request.bearer_auth(token);
    }
    let mut response = request.send().await.map_err(|e| DownloadError::Request {
      url: url.to_string(),
      message: e.to_string(),
    })?;

    if !response.status().is_success() {
      return Err(DownloadError::Status {
        url: url.to_string(),
        status: response.status().as_u16(),
      });
    }

    let part = tempfile::Builder::new()
      .prefix(".part-")
      .tempfile_in(&self.cache_dir)
      .map_err(io_err)?;
    let (file, part_path) = part.into_parts();
    let mut file = tokio::fs::File::from_std(file);

    let mut hasher = Sha256::new();
    let mut size = 0u64;
    while let Some(chunk) = response.chunk().await.map_err(|e| DownloadError::Request {
      url: url.to_string(),
      message: e.to_string(),
    })? {
      hasher.update(&chunk);
      size += chunk.len() as u64;
      file.write_all(&chunk).await.map_err(io_err)?;
    }
    file.flush().await.map_err(io_err)?;
    file.sync_all().await.map_err(io_err)?;
    drop(file);

    part_path.persist(dest).map_err(|e| io_err(e.error))?;

    let sha256 = hex::encode(hasher.finalize());
    info!(url = %url, size, sha256 = %sha256, "download complete");

    Ok(Fetched {
      path: dest.to_path_buf(),
      sha256,
      size,
    })
  }

  async fn download_bottle(&self, url: &str, bottle: &BottleRef, dest: &Path) -> Result<Fetched, DownloadError> {
    let blob = self.ghcr.resolve(bottle, url).await?;
    let fetched = self.download_to_cache(&blob.url, dest, Some(&blob.token)).await?;
    if fetched.sha256 != blob.sha256 {
      let _ = tokio::fs::remove_file(dest).await;
      return Err(DownloadError::DigestMismatch {
        url: url.to_string(),
        expected: blob.sha256,
        actual: fetched.sha256,
      });
    }
    Ok(fetched)
  }
}

/// Hash a cached file without blocking the runtime.
async fn hash_cached(path: &Path) -> std::io::Result<(String, u64)> {
  let mut file = tokio::fs::File::open(path).await?;
  let mut hasher = Sha256::new();
  let mut buffer = vec![0u8; 64 * 1024];
  let mut size = 0u64;
  loop {
    let read = file.read(&mut buffer).await?;
    if read == 0 {
      break;
    }
    hasher.update(&buffer[..read]);
    size += read as u64;
  }
  Ok((hex::encode(hasher.finalize()), size))
}

#[async_trait]
impl Downloader for HttpDownloader {
  async fn fetch(&self, url: &str) -> Result<Fetched, DownloadError> {
    let parsed = validate_url(url)?;
    let dest = self.cache_dir.join(cache_file_name(url));

    if dest.is_file() {
      let (sha256, size) = hash_cached(&dest).await.map_err(|source| DownloadError::Io {
        url: url.to_string(),
        source,
      })?;
      debug!(url = %url, path = %dest.display(), "using cached download");
      return Ok(Fetched {
        path: dest,
        sha256,
        size,
      });
    }

    info!(url = %url, "downloading");
    match BottleRef::parse(&parsed) {
      Some(bottle) => self.download_bottle(url, &bottle, &dest).await,
      None => self.download_to_cache(url, &dest, None).await,
    }
  }
}
