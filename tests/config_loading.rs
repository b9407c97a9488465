// tests/config_loading.rs

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use pollwatch::config::{load_and_validate, load_with_overrides};
use pollwatch::errors::PollwatchError;
use pollwatch_test_utils::builders::ConfigFileBuilder;

fn write_config(contents: &str) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("Pollwatch.toml");
    fs::write(&path, contents).unwrap();
    (dir, path)
}

#[test]
fn full_config_file_is_loaded_and_validated() {
    let (_dir, path) = write_config(
        r#"
[watch]
roots = ["/srv/drop", "/srv/inbox"]
tick_interval = "500ms"
suppression_window = "5s"
exclude = ["**/*.tmp"]

[handler.image]
jpeg_quality = 70
max_attempts = 2
backoff = ["1s"]

[handler.json]
endpoint = "https://collector.test/ingest"

[handler.archive]
enabled = false
"#,
    );

    let cfg = load_and_validate(&path).unwrap();

    assert_eq!(cfg.watch.roots.len(), 2);
    assert_eq!(cfg.watch.tick_interval, Duration::from_millis(500));
    assert_eq!(cfg.watch.suppression_window, Duration::from_secs(5));
    assert!(cfg.watch.exclude.is_some());

    assert_eq!(cfg.handlers.image.jpeg_quality, 70);
    let retry = cfg.handlers.image.toggle.retry.as_ref().unwrap();
    assert_eq!(retry.max_attempts, 2);
    assert_eq!(retry.backoff, vec![Duration::from_secs(1)]);

    assert_eq!(cfg.handlers.json.endpoint, "https://collector.test/ingest");
    assert!(!cfg.handlers.archive.toggle.enabled);
    assert!(cfg.handlers.replace.toggle.enabled);
}

#[test]
fn syntax_errors_surface_as_toml_errors() {
    let (_dir, path) = write_config("[watch\nroots = 1");
    let err = load_and_validate(&path).unwrap_err();
    assert!(matches!(err, PollwatchError::TomlError(_)), "got {err:?}");
}

#[test]
fn semantic_errors_surface_as_config_errors() {
    let (_dir, path) = write_config(
        r#"
[watch]
roots = ["/srv/drop"]
tick_interval = "soon"
"#,
    );
    let err = load_and_validate(&path).unwrap_err();
    assert!(matches!(err, PollwatchError::ConfigError(_)), "got {err:?}");
}

#[test]
fn missing_file_is_an_error_without_cli_roots() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_with_overrides(dir.path().join("nope.toml"), &[]).unwrap_err();
    assert!(matches!(err, PollwatchError::ConfigError(_)));
}

#[test]
fn cli_roots_work_without_a_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let roots = vec![PathBuf::from("/srv/drop")];

    let cfg = load_with_overrides(dir.path().join("nope.toml"), &roots).unwrap();

    assert_eq!(cfg.watch.roots, roots);
    assert_eq!(cfg.watch.tick_interval, Duration::from_secs(1));
    assert!(cfg.handlers.image.toggle.retry.is_some());
}

#[test]
fn cli_roots_replace_configured_roots() {
    let (_dir, path) = write_config("[watch]\nroots = [\"/srv/old\"]\n");
    let roots = vec![PathBuf::from("/srv/new")];

    let cfg = load_with_overrides(&path, &roots).unwrap();
    assert_eq!(cfg.watch.roots, roots);
}

#[test]
fn builder_produces_the_same_shape_as_a_file() {
    let cfg = ConfigFileBuilder::new()
        .with_root("/srv/drop")
        .with_tick_interval("2s")
        .only_handlers(&["log", "text"])
        .build();

    assert_eq!(cfg.watch.tick_interval, Duration::from_secs(2));
    assert!(cfg.handlers.text.toggle.enabled);
    assert!(!cfg.handlers.image.toggle.enabled);
    assert!(!cfg.handlers.replace.toggle.enabled);
}
