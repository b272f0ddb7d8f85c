//! Downloading remote content with checksum capture.
//!
//! The [`Downloader`] collaborator owns transport policy (HTTPS only, no
//! internal hosts) and caching. Callers get back the local path of the cached
//! file together with its SHA-256 and size, and decide what to do with it.
//! Homebrew bottle references on GHCR are resolved to their blob first.

mod ghcr;
mod http;

pub use ghcr::{BottleBlob, BottleRef, GhcrClient};
pub use http::HttpDownloader;

use std::net::IpAddr;
use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

use crate::util::hash::hash_bytes;

#[derive(Debug, Error)]
pub enum DownloadError {
  #[error("invalid url '{url}': {message}")]
  InvalidUrl { url: String, message: String },

  #[error("refusing non-https url '{url}'")]
  InsecureScheme { url: String },

  #[error("refusing to download from internal host '{host}' ({url})")]
  ForbiddenHost { url: String, host: String },

  #[error("request for {url} failed: {message}")]
  Request { url: String, message: String },

  #[error("request for {url} returned HTTP {status}")]
  Status { url: String, status: u16 },

  #[error("{url} has no bottle for '{tag}'")]
  MissingBottle { url: String, tag: String },

  #[error("bottle {url} does not match its manifest digest: expected {expected}, got {actual}")]
  DigestMismatch { url: String, expected: String, actual: String },

  #[error("failed to cache {url}: {source}")]
  Io {
    url: String,
    #[source]
    source: std::io::Error,
  },
}

/// A fetched file in the local cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetched {
  pub path: PathBuf,
  pub sha256: String,
  pub size: u64,
}

#[async_trait]
pub trait Downloader: Send + Sync {
  async fn fetch(&self, url: &str) -> Result<Fetched, DownloadError>;
}

/// Enforce HTTPS and reject hosts that resolve to this machine or a private network.
///
/// Only literal IPs and `localhost` are checked; DNS names are not resolved.
pub fn validate_url(raw: &str) -> Result<url::Url, DownloadError> {
  let url = url::Url::parse(raw).map_err(|e| DownloadError::InvalidUrl {
    url: raw.to_string(),
    message: e.to_string(),
  })?;

  if url.scheme() != "https" {
    return Err(DownloadError::InsecureScheme { url: raw.to_string() });
  }

  let forbidden = match url.host() {
    None => {
      return Err(DownloadError::InvalidUrl {
        url: raw.to_string(),
        message: "missing host".to_string(),
      });
    }
    Some(url::Host::Domain(domain)) => {
      let domain = domain.trim_end_matches('.').to_ascii_lowercase();
      domain == "localhost" || domain.ends_with(".localhost")
    }
    Some(url::Host::Ipv4(ip)) => is_internal_ip(IpAddr::V4(ip)),
    Some(url::Host::Ipv6(ip)) => is_internal_ip(IpAddr::V6(ip)),
  };

  if forbidden {
    return Err(DownloadError::ForbiddenHost {
      url: raw.to_string(),
      host: url.host_str().unwrap_or_default().to_string(),
    });
  }

  Ok(url)
}

fn is_internal_ip(ip: IpAddr) -> bool {
  match ip {
    IpAddr::V4(v4) => {
      v4.is_loopback() || v4.is_private() || v4.is_link_local() || v4.is_unspecified() || v4.is_broadcast()
    }
    IpAddr::V6(v6) => {
      if let Some(v4) = v6.to_ipv4_mapped() {
        return is_internal_ip(IpAddr::V4(v4));
      }
      let first = v6.segments()[0];
      v6.is_loopback()
        || v6.is_unspecified()
        || (first & 0xfe00) == 0xfc00 // unique local
        || (first & 0xffc0) == 0xfe80 // link local
    }
  }
}

/// Cache file name for a URL: a short URL hash plus a sanitized basename.
pub fn cache_file_name(url: &str) -> String {
  format!("{}-{}", &hash_bytes(url.as_bytes())[..16], url_to_filename(url))
}

/// Convert a URL to a safe filename.
///
/// Takes the last path component and sanitizes it. Falls back to a hash of
/// the URL if no suitable filename can be extracted.
pub fn url_to_filename(url: &str) -> String {
  if let Some(filename) = url.split(['?', '#']).next().and_then(|path| path.rsplit('/').next()) {
    let sanitized: String = filename
      .chars()
      .map(|c| {
        if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' {
          c
        } else {
          '_'
        }
      })
      .collect();

    if !sanitized.is_empty() && sanitized != "." && sanitized != ".." {
      return sanitized;
    }
  }

  format!("download_{}", &hash_bytes(url.as_bytes())[..16])
}
