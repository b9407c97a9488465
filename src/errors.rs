// src/errors.rs

use thiserror::Error;

/// Errors that keep pollwatch from starting or end its polling loop.
///
/// Scan failures for a single root and handler failures never show up
/// here; the runtime logs them and keeps going.
#[derive(Error, Debug)]
pub enum PollwatchError {
    /// Semantically invalid settings, an unreadable config file, or no
    /// roots left to watch.
    #[error("invalid configuration: {0}")]
    ConfigError(String),

    #[error("config file is not valid TOML: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T, E = PollwatchError> = std::result::Result<T, E>;
