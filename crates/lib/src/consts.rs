/// Application name used for directories and user-facing messages.
pub const APP_NAME: &str = "tsuku";

/// Directory name under the user's home used when `TSUKU_HOME` is unset.
pub const DEFAULT_HOME_DIRNAME: &str = ".tsuku";

/// Default GitHub REST API endpoint for version lookups.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Name of the state file inside `$TSUKU_HOME`.
pub const STATE_FILENAME: &str = "state.json";

/// Name of the advisory lock file guarding the state file.
pub const STATE_LOCK_FILENAME: &str = "state.json.lock";

/// Prefix for staging directories created under `tools/`.
pub const STAGING_PREFIX: &str = ".staging-";

/// Default lock file name, resolved against the working directory.
pub const LOCK_FILENAME: &str = "tsuku.lock";
