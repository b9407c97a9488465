// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{PollwatchError, Result};

/// Load a configuration file from a given path and return the raw `RawConfigFile`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|e| {
        PollwatchError::ConfigError(format!("cannot read config file {}: {e}", path.display()))
    })?;

    let config: RawConfigFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a configuration file from path and validate it.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let raw_config = load_from_path(&path)?;
    let config = ConfigFile::try_from(raw_config)?;
    Ok(config)
}

/// Load the config used by the binary.
///
/// Roots given on the command line replace the configured ones. With at
/// least one such root the config file may be absent, in which case every
/// other setting takes its default.
pub fn load_with_overrides(path: impl AsRef<Path>, roots: &[PathBuf]) -> Result<ConfigFile> {
    let path = path.as_ref();

    let mut raw = if !roots.is_empty() && !path.exists() {
        info!(path = ?path, "config file not found; using defaults with command-line roots");
        RawConfigFile::default()
    } else {
        load_from_path(path)?
    };

    if !roots.is_empty() {
        debug!(roots = ?roots, "overriding [watch].roots from the command line");
        raw.watch.roots = roots.to_vec();
    }

    ConfigFile::try_from(raw)
}

/// Helper to resolve a default config path: `Pollwatch.toml` in the
/// current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Pollwatch.toml")
}
