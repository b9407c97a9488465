// src/config/validate.rs

use std::time::Duration;

use crate::config::duration::parse_duration;
use crate::config::model::{
    ArchiveSettings, ConfigFile, HandlerSettings, HandlerToggle, ImageSettings, JsonSettings,
    RawConfigFile, RawHandlerSection, RawRetry, RawWatchSection, ReplaceSettings, TextSettings,
    WatchSettings,
};
use crate::dispatch::RetryPolicy;
use crate::errors::{PollwatchError, Result};
use crate::watch::scanner::{build_exclude_set, ScanLimits};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = PollwatchError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        let watch = validate_watch(&raw.watch)?;
        let handlers = validate_handlers(&raw.handler)?;
        Ok(ConfigFile { watch, handlers })
    }
}

/// Built-in retry policy of the image handler when none is configured.
pub fn default_image_retry() -> RetryPolicy {
    RetryPolicy::new(
        3,
        vec![
            Duration::from_secs(5),
            Duration::from_secs(15),
            Duration::from_secs(30),
        ],
    )
}

fn config_err(msg: impl Into<String>) -> PollwatchError {
    PollwatchError::ConfigError(msg.into())
}

fn duration_field(section: &str, key: &str, value: &str) -> Result<Duration> {
    parse_duration(value).map_err(|e| config_err(format!("[{section}].{key}: {e}")))
}

fn validate_watch(raw: &RawWatchSection) -> Result<WatchSettings> {
    if raw.roots.is_empty() {
        return Err(config_err(
            "[watch].roots must list at least one directory (or pass --root)",
        ));
    }
    if let Some(empty) = raw.roots.iter().find(|r| r.as_os_str().is_empty()) {
        return Err(config_err(format!("[watch].roots contains an empty path: {empty:?}")));
    }

    let tick_interval = duration_field("watch", "tick_interval", &raw.tick_interval)?;
    if tick_interval.is_zero() {
        return Err(config_err("[watch].tick_interval must be greater than zero"));
    }

    let suppression_window =
        duration_field("watch", "suppression_window", &raw.suppression_window)?;
    if suppression_window.is_zero() {
        return Err(config_err("[watch].suppression_window must be greater than zero"));
    }

    if raw.max_depth == 0 {
        return Err(config_err("[watch].max_depth must be >= 1 (got 0)"));
    }
    if raw.max_files == 0 {
        return Err(config_err("[watch].max_files must be >= 1 (got 0)"));
    }

    let exclude = build_exclude_set(&raw.exclude)
        .map_err(|e| config_err(format!("[watch].exclude: {e:#}")))?;

    Ok(WatchSettings {
        roots: raw.roots.clone(),
        tick_interval,
        suppression_window,
        limits: ScanLimits {
            max_depth: raw.max_depth,
            max_files: raw.max_files,
        },
        exclude_patterns: raw.exclude.clone(),
        exclude,
    })
}

/// Resolve one handler's retry keys against its built-in default.
fn retry_policy(
    handler: &str,
    raw: &RawRetry,
    default: Option<RetryPolicy>,
) -> Result<Option<RetryPolicy>> {
    let section = format!("handler.{handler}");

    let backoff = match &raw.backoff {
        Some(list) => Some(
            list.iter()
                .map(|s| duration_field(&section, "backoff", s))
                .collect::<Result<Vec<_>>>()?,
        ),
        None => None,
    };

    match (raw.max_attempts, backoff) {
        (None, None) => Ok(default),
        (Some(0), _) => Err(config_err(format!("[{section}].max_attempts must be >= 1 (got 0)"))),
        (Some(1), _) => Ok(None),
        (Some(n), Some(backoff)) if !backoff.is_empty() => Ok(Some(RetryPolicy::new(n, backoff))),
        (Some(n), _) => match default {
            // Keep the built-in schedule when only the attempt count changes.
            Some(policy) if !policy.backoff.is_empty() => {
                Ok(Some(RetryPolicy::new(n, policy.backoff)))
            }
            _ => Err(config_err(format!(
                "[{section}].backoff must list at least one delay when max_attempts = {n}"
            ))),
        },
        (None, Some(backoff)) => match default {
            Some(policy) if !backoff.is_empty() => {
                Ok(Some(RetryPolicy::new(policy.max_attempts, backoff)))
            }
            _ => Err(config_err(format!(
                "[{section}].backoff is set but max_attempts is not"
            ))),
        },
    }
}

fn require_url(handler: &str, key: &str, enabled: bool, value: &str) -> Result<()> {
    if enabled && value.trim().is_empty() {
        return Err(config_err(format!(
            "[handler.{handler}].{key} must be set while the handler is enabled"
        )));
    }
    Ok(())
}

fn validate_handlers(raw: &RawHandlerSection) -> Result<HandlerSettings> {
    let log = HandlerToggle {
        enabled: raw.log.enabled,
        retry: retry_policy("log", &raw.log.retry, None)?,
    };

    if !(1..=100).contains(&raw.image.jpeg_quality) {
        return Err(config_err(format!(
            "[handler.image].jpeg_quality must be within 1..=100 (got {})",
            raw.image.jpeg_quality
        )));
    }
    if raw.image.png_compression > 9 {
        return Err(config_err(format!(
            "[handler.image].png_compression must be within 0..=9 (got {})",
            raw.image.png_compression
        )));
    }
    let image = ImageSettings {
        toggle: HandlerToggle {
            enabled: raw.image.enabled,
            retry: retry_policy("image", &raw.image.retry, Some(default_image_retry()))?,
        },
        jpeg_quality: raw.image.jpeg_quality,
        png_compression: raw.image.png_compression,
    };

    require_url("json", "endpoint", raw.json.enabled, &raw.json.endpoint)?;
    let json = JsonSettings {
        toggle: HandlerToggle {
            enabled: raw.json.enabled,
            retry: retry_policy("json", &raw.json.retry, None)?,
        },
        endpoint: raw.json.endpoint.clone(),
    };

    require_url("text", "source_url", raw.text.enabled, &raw.text.source_url)?;
    let text = TextSettings {
        toggle: HandlerToggle {
            enabled: raw.text.enabled,
            retry: retry_policy("text", &raw.text.retry, None)?,
        },
        source_url: raw.text.source_url.clone(),
    };

    if raw.archive.enabled && raw.archive.extract_to.as_os_str().is_empty() {
        return Err(config_err(
            "[handler.archive].extract_to must be set while the handler is enabled",
        ));
    }
    if raw.archive.max_extracted_bytes == 0 {
        return Err(config_err(
            "[handler.archive].max_extracted_bytes must be greater than zero",
        ));
    }
    let archive = ArchiveSettings {
        toggle: HandlerToggle {
            enabled: raw.archive.enabled,
            retry: retry_policy("archive", &raw.archive.retry, None)?,
        },
        extract_to: raw.archive.extract_to.clone(),
        max_extracted_bytes: raw.archive.max_extracted_bytes,
    };

    if raw.replace.enabled && raw.replace.api_urls.iter().all(|u| u.trim().is_empty()) {
        return Err(config_err(
            "[handler.replace].api_urls must contain at least one URL while the handler is enabled",
        ));
    }
    if raw.replace.fetch_attempts == 0 {
        return Err(config_err("[handler.replace].fetch_attempts must be >= 1 (got 0)"));
    }
    let replace = ReplaceSettings {
        toggle: HandlerToggle {
            enabled: raw.replace.enabled,
            retry: retry_policy("replace", &raw.replace.retry, None)?,
        },
        api_urls: raw
            .replace
            .api_urls
            .iter()
            .filter(|u| !u.trim().is_empty())
            .cloned()
            .collect(),
        fetch_attempts: raw.replace.fetch_attempts,
        fetch_delay: duration_field("handler.replace", "fetch_delay", &raw.replace.fetch_delay)?,
    };

    Ok(HandlerSettings {
        log,
        image,
        json,
        text,
        archive,
        replace,
    })
}
