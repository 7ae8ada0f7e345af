//! Config path resolution

use std::path::PathBuf;

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "RELIVE_CONFIG";

/// Config file used when the environment variable is unset
pub const DEFAULT_CONFIG_FILE: &str = "relive.toml";

/// Returns the config file path.
///
/// `$RELIVE_CONFIG` if set and non-empty, else `./relive.toml`.
pub fn config_path() -> PathBuf {
    resolve(std::env::var_os(CONFIG_ENV_VAR))
}

fn resolve(var: Option<std::ffi::OsString>) -> PathBuf {
    match var {
        Some(path) if !path.is_empty() => PathBuf::from(path),
        _ => PathBuf::from(".").join(DEFAULT_CONFIG_FILE),
    }
}
