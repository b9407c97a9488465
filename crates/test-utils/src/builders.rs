#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use pollwatch::config::model::RawRetry;
use pollwatch::config::{ConfigFile, RawConfigFile};
use pollwatch::engine::{ChangeKind, ChangeRecord, Origin};

/// Builder for `ConfigFile` to simplify test setup.
///
/// Every handler starts enabled with its defaults, as in a config file that
/// only lists roots.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile::default(),
        }
    }

    pub fn with_root(mut self, root: impl AsRef<Path>) -> Self {
        self.config.watch.roots.push(root.as_ref().to_path_buf());
        self
    }

    pub fn with_tick_interval(mut self, value: &str) -> Self {
        self.config.watch.tick_interval = value.to_string();
        self
    }

    pub fn with_suppression_window(mut self, value: &str) -> Self {
        self.config.watch.suppression_window = value.to_string();
        self
    }

    pub fn with_exclude(mut self, pattern: &str) -> Self {
        self.config.watch.exclude.push(pattern.to_string());
        self
    }

    pub fn with_max_files(mut self, max_files: usize) -> Self {
        self.config.watch.max_files = max_files;
        self
    }

    fn handler_state(&mut self, name: &str) -> (&mut bool, &mut RawRetry) {
        let h = &mut self.config.handler;
        match name {
            "log" => (&mut h.log.enabled, &mut h.log.retry),
            "image" => (&mut h.image.enabled, &mut h.image.retry),
            "json" => (&mut h.json.enabled, &mut h.json.retry),
            "text" => (&mut h.text.enabled, &mut h.text.retry),
            "archive" => (&mut h.archive.enabled, &mut h.archive.retry),
            "replace" => (&mut h.replace.enabled, &mut h.replace.retry),
            other => panic!("unknown handler '{other}'"),
        }
    }

    pub fn disable_handler(mut self, name: &str) -> Self {
        *self.handler_state(name).0 = false;
        self
    }

    /// Keep only the listed handlers enabled.
    pub fn only_handlers(mut self, names: &[&str]) -> Self {
        for name in ["log", "image", "json", "text", "archive", "replace"] {
            *self.handler_state(name).0 = names.contains(&name);
        }
        self
    }

    pub fn with_handler_retry(mut self, name: &str, max_attempts: u32, backoff: &[&str]) -> Self {
        let retry = self.handler_state(name).1;
        retry.max_attempts = Some(max_attempts);
        retry.backoff = Some(backoff.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `ChangeRecord`, defaulting to an external creation at the
/// epoch.
pub struct ChangeRecordBuilder {
    record: ChangeRecord,
}

impl ChangeRecordBuilder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            record: ChangeRecord {
                path: path.into(),
                kind: ChangeKind::Created,
                origin: Origin::External,
                mtime: UNIX_EPOCH,
            },
        }
    }

    pub fn kind(mut self, kind: ChangeKind) -> Self {
        self.record.kind = kind;
        self
    }

    pub fn internal(mut self) -> Self {
        self.record.origin = Origin::Internal;
        self
    }

    pub fn mtime(mut self, mtime: SystemTime) -> Self {
        self.record.mtime = mtime;
        self
    }

    pub fn mtime_secs(self, secs: u64) -> Self {
        self.mtime(UNIX_EPOCH + Duration::from_secs(secs))
    }

    pub fn build(self) -> ChangeRecord {
        self.record
    }
}
