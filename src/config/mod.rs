// src/config/mod.rs

//! Configuration loading and validation for pollwatch.
//!
//! - `model.rs` defines the TOML-backed raw model and the validated one.
//! - `loader.rs` reads a config file from disk.
//! - `validate.rs` turns `RawConfigFile` into `ConfigFile`.
//! - `duration.rs` parses `"500ms"` / `"10s"` style durations.

pub mod duration;
pub mod loader;
pub mod model;
pub mod validate;

pub use duration::parse_duration;
pub use loader::{default_config_path, load_and_validate, load_from_path, load_with_overrides};
pub use model::{
    ArchiveSettings, ConfigFile, HandlerSettings, HandlerToggle, ImageSettings, JsonSettings,
    RawConfigFile, ReplaceSettings, TextSettings, WatchSettings,
};
pub use validate::default_image_retry;
