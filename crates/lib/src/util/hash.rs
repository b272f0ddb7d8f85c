//! SHA-256 helpers for download verification and content hashing.

use std::fs;
use std::io::Read;
use std::path::Path;

use serde::Serialize;
use sha2::{Digest, Sha256};

pub type HashError = serde_json::Error;

/// Hex SHA-256 of the value's JSON serialization.
///
/// Field order follows the struct definition and maps are `BTreeMap`s, so the
/// output is stable for equal values.
pub trait Hashable: Serialize {
  fn content_hash(&self) -> Result<String, HashError> {
    let serialized = serde_json::to_string(self)?;
    Ok(hash_bytes(serialized.as_bytes()))
  }
}

/// Hash a file's contents, returning 64 lowercase hex characters.
pub fn hash_file(path: &Path) -> std::io::Result<String> {
  let mut file = fs::File::open(path)?;
  let mut hasher = Sha256::new();
  let mut buffer = [0u8; 8192];

  loop {
    let bytes_read = file.read(&mut buffer)?;
    if bytes_read == 0 {
      break;
    }
    hasher.update(&buffer[..bytes_read]);
  }

  Ok(hex::encode(hasher.finalize()))
}

/// Hash arbitrary bytes.
pub fn hash_bytes(data: &[u8]) -> String {
  let mut hasher = Sha256::new();
  hasher.update(data);
  hex::encode(hasher.finalize())
}

/// Strip an optional `sha256:` prefix and lowercase the digest.
pub fn normalize_checksum(checksum: &str) -> String {
  let trimmed = checksum.trim();
  let digest = trimmed.strip_prefix("sha256:").unwrap_or(trimmed);
  digest.to_ascii_lowercase()
}

/// True for a 64 character hex digest (after normalization).
pub fn is_sha256_hex(checksum: &str) -> bool {
  let digest = normalize_checksum(checksum);
  digest.len() == 64 && digest.bytes().all(|b| b.is_ascii_hexdigit())
}
