//! Shared utilities.

pub mod hash;

/// Seconds since the Unix epoch, saturating to zero on clock skew.
pub fn unix_now() -> u64 {
  std::time::SystemTime::now()
    .duration_since(std::time::UNIX_EPOCH)
    .unwrap_or_default()
    .as_secs()
}
