// src/config/model.rs

use std::path::PathBuf;
use std::time::Duration;

use globset::GlobSet;
use serde::{Deserialize, Serialize};

use crate::dispatch::RetryPolicy;
use crate::watch::scanner::ScanLimits;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [watch]
/// roots = ["/app/watched"]
/// tick_interval = "1s"
///
/// [handler.image]
/// max_attempts = 3
/// backoff = ["5s", "15s", "30s"]
/// ```
///
/// Every section is optional; only `watch.roots` has to be supplied (either
/// here or on the command line).
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    #[serde(default)]
    pub watch: RawWatchSection,

    #[serde(default)]
    pub handler: RawHandlerSection,
}

/// `[watch]` section.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RawWatchSection {
    #[serde(default)]
    pub roots: Vec<PathBuf>,

    #[serde(default = "default_tick_interval")]
    pub tick_interval: String,

    #[serde(default = "default_suppression_window")]
    pub suppression_window: String,

    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    #[serde(default = "default_max_files")]
    pub max_files: usize,

    /// Glob patterns matched against paths relative to their root.
    #[serde(default)]
    pub exclude: Vec<String>,
}

fn default_tick_interval() -> String {
    "1s".to_string()
}

fn default_suppression_window() -> String {
    "10s".to_string()
}

fn default_max_depth() -> usize {
    crate::watch::scanner::DEFAULT_MAX_DEPTH
}

fn default_max_files() -> usize {
    crate::watch::scanner::DEFAULT_MAX_FILES
}

impl Default for RawWatchSection {
    fn default() -> Self {
        Self {
            roots: Vec::new(),
            tick_interval: default_tick_interval(),
            suppression_window: default_suppression_window(),
            max_depth: default_max_depth(),
            max_files: default_max_files(),
            exclude: Vec::new(),
        }
    }
}

/// Retry keys shared by every `[handler.<name>]` table.
///
/// Absent keys fall back to the handler's built-in policy.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawRetry {
    #[serde(default)]
    pub max_attempts: Option<u32>,

    #[serde(default)]
    pub backoff: Option<Vec<String>>,
}

fn default_true() -> bool {
    true
}

/// `[handler.*]` tables, one per built-in handler.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RawHandlerSection {
    #[serde(default)]
    pub log: RawLogHandler,
    #[serde(default)]
    pub image: RawImageHandler,
    #[serde(default)]
    pub json: RawJsonHandler,
    #[serde(default)]
    pub text: RawTextHandler,
    #[serde(default)]
    pub archive: RawArchiveHandler,
    #[serde(default)]
    pub replace: RawReplaceHandler,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawLogHandler {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(flatten)]
    pub retry: RawRetry,
}

impl Default for RawLogHandler {
    fn default() -> Self {
        Self {
            enabled: true,
            retry: RawRetry::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawImageHandler {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(flatten)]
    pub retry: RawRetry,
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
    /// zlib-style level, 0 (fastest) to 9 (smallest).
    #[serde(default = "default_png_compression")]
    pub png_compression: u8,
}

fn default_jpeg_quality() -> u8 {
    80
}

fn default_png_compression() -> u8 {
    9
}

impl Default for RawImageHandler {
    fn default() -> Self {
        Self {
            enabled: true,
            retry: RawRetry::default(),
            jpeg_quality: default_jpeg_quality(),
            png_compression: default_png_compression(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawJsonHandler {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(flatten)]
    pub retry: RawRetry,
    #[serde(default = "default_json_endpoint")]
    pub endpoint: String,
}

fn default_json_endpoint() -> String {
    "https://fswatcher.requestcatcher.com/".to_string()
}

impl Default for RawJsonHandler {
    fn default() -> Self {
        Self {
            enabled: true,
            retry: RawRetry::default(),
            endpoint: default_json_endpoint(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawTextHandler {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(flatten)]
    pub retry: RawRetry,
    #[serde(default = "default_source_url")]
    pub source_url: String,
}

fn default_source_url() -> String {
    "https://baconipsum.com/api/?type=all-meat&sentences=1".to_string()
}

impl Default for RawTextHandler {
    fn default() -> Self {
        Self {
            enabled: true,
            retry: RawRetry::default(),
            source_url: default_source_url(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawArchiveHandler {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(flatten)]
    pub retry: RawRetry,
    #[serde(default = "default_extract_to")]
    pub extract_to: PathBuf,
    #[serde(default = "default_max_extracted_bytes")]
    pub max_extracted_bytes: u64,
}

fn default_extract_to() -> PathBuf {
    PathBuf::from("extracted")
}

fn default_max_extracted_bytes() -> u64 {
    crate::handlers::archive::DEFAULT_MAX_EXTRACTED_BYTES
}

impl Default for RawArchiveHandler {
    fn default() -> Self {
        Self {
            enabled: true,
            retry: RawRetry::default(),
            extract_to: default_extract_to(),
            max_extracted_bytes: default_max_extracted_bytes(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawReplaceHandler {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(flatten)]
    pub retry: RawRetry,
    /// Tried in order until one yields an image.
    #[serde(default = "default_api_urls")]
    pub api_urls: Vec<String>,
    #[serde(default = "default_fetch_attempts")]
    pub fetch_attempts: u32,
    #[serde(default = "default_fetch_delay")]
    pub fetch_delay: String,
}

fn default_api_urls() -> Vec<String> {
    vec![
        "https://meme-api.com/gimme".to_string(),
        "https://meme-api.herokuapp.com/gimme".to_string(),
        "https://api.imgflip.com/get_memes".to_string(),
    ]
}

fn default_fetch_attempts() -> u32 {
    3
}

fn default_fetch_delay() -> String {
    "2s".to_string()
}

impl Default for RawReplaceHandler {
    fn default() -> Self {
        Self {
            enabled: true,
            retry: RawRetry::default(),
            api_urls: default_api_urls(),
            fetch_attempts: default_fetch_attempts(),
            fetch_delay: default_fetch_delay(),
        }
    }
}

/// Validated configuration.
///
/// Only constructed through `TryFrom<RawConfigFile>` (see `validate.rs`),
/// so every duration is parsed and every glob compiled.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub watch: WatchSettings,
    pub handlers: HandlerSettings,
}

#[derive(Debug, Clone)]
pub struct WatchSettings {
    pub roots: Vec<PathBuf>,
    pub tick_interval: Duration,
    pub suppression_window: Duration,
    pub limits: ScanLimits,
    pub exclude_patterns: Vec<String>,
    pub exclude: Option<GlobSet>,
}

/// Whether a handler is registered, and with which retry policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerToggle {
    pub enabled: bool,
    pub retry: Option<RetryPolicy>,
}

#[derive(Debug, Clone)]
pub struct HandlerSettings {
    pub log: HandlerToggle,
    pub image: ImageSettings,
    pub json: JsonSettings,
    pub text: TextSettings,
    pub archive: ArchiveSettings,
    pub replace: ReplaceSettings,
}

#[derive(Debug, Clone)]
pub struct ImageSettings {
    pub toggle: HandlerToggle,
    pub jpeg_quality: u8,
    pub png_compression: u8,
}

#[derive(Debug, Clone)]
pub struct JsonSettings {
    pub toggle: HandlerToggle,
    pub endpoint: String,
}

#[derive(Debug, Clone)]
pub struct TextSettings {
    pub toggle: HandlerToggle,
    pub source_url: String,
}

#[derive(Debug, Clone)]
pub struct ArchiveSettings {
    pub toggle: HandlerToggle,
    pub extract_to: PathBuf,
    /// Total decompressed bytes one archive may expand to.
    pub max_extracted_bytes: u64,
}

#[derive(Debug, Clone)]
pub struct ReplaceSettings {
    pub toggle: HandlerToggle,
    pub api_urls: Vec<String>,
    pub fetch_attempts: u32,
    pub fetch_delay: Duration,
}
