// tests/real_fs_scan.rs

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use pollwatch::fs::RealFileSystem;
use pollwatch::types::ChangeKind;
use pollwatch::watch::{build_exclude_set, diff, ScanError, ScanLimits, Scanner};

fn scanner(exclude: &[&str], limits: ScanLimits) -> Scanner {
    let patterns: Vec<String> = exclude.iter().map(|s| s.to_string()).collect();
    Scanner::new(
        Arc::new(RealFileSystem),
        limits,
        build_exclude_set(&patterns).unwrap(),
    )
}

fn touch(path: &Path, mtime: SystemTime) {
    fs::File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(mtime)
        .unwrap();
}

#[test]
fn successive_scans_of_a_real_directory_diff_as_expected() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().canonicalize().unwrap();
    let scanner = scanner(&[], ScanLimits::default());

    let base = SystemTime::now() - Duration::from_secs(3600);
    fs::write(root.join("keep.txt"), "k").unwrap();
    fs::write(root.join("edit.txt"), "e").unwrap();
    fs::write(root.join("gone.txt"), "g").unwrap();
    for name in ["keep.txt", "edit.txt", "gone.txt"] {
        touch(&root.join(name), base);
    }

    let before = scanner.scan(&root).unwrap();
    assert_eq!(before.len(), 3);

    fs::remove_file(root.join("gone.txt")).unwrap();
    fs::create_dir(root.join("sub")).unwrap();
    fs::write(root.join("sub/new.txt"), "n").unwrap();
    fs::write(root.join("edit.txt"), "edited").unwrap();
    touch(&root.join("edit.txt"), base + Duration::from_secs(60));

    let after = scanner.scan(&root).unwrap();
    let changes: Vec<(String, ChangeKind)> = diff(&before, &after)
        .into_iter()
        .map(|c| {
            let rel = c.path.strip_prefix(&root).unwrap().to_string_lossy().into_owned();
            (rel, c.kind)
        })
        .collect();

    assert_eq!(
        changes,
        vec![
            ("edit.txt".to_string(), ChangeKind::Modified),
            ("gone.txt".to_string(), ChangeKind::Deleted),
            ("sub/new.txt".to_string(), ChangeKind::Created),
        ]
    );
}

#[test]
fn excluded_paths_never_appear() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    fs::create_dir_all(root.join(".git/objects")).unwrap();
    fs::write(root.join(".git/objects/abc"), "x").unwrap();
    fs::write(root.join("notes.swp"), "x").unwrap();
    fs::write(root.join("notes.txt"), "x").unwrap();

    let snapshot = scanner(&[".git/**", "*.swp"], ScanLimits::default())
        .scan(root)
        .unwrap();

    let names: Vec<_> = snapshot.iter().map(|(p, _)| p.to_path_buf()).collect();
    assert_eq!(names, vec![root.join("notes.txt")]);
}

#[test]
fn too_many_files_is_an_error_not_a_partial_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    for i in 0..5 {
        fs::write(dir.path().join(format!("{i}.txt")), "x").unwrap();
    }
    let limits = ScanLimits {
        max_depth: 8,
        max_files: 4,
    };

    let err = scanner(&[], limits).scan(dir.path()).unwrap_err();
    assert!(matches!(err, ScanError::LimitExceeded { limit: 4, .. }));
}

#[test]
fn excluded_trees_do_not_use_up_the_file_limit() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    fs::create_dir_all(root.join(".git/objects")).unwrap();
    for i in 0..20 {
        fs::write(root.join(format!(".git/objects/{i:02}")), "x").unwrap();
    }
    fs::write(root.join("a.txt"), "x").unwrap();
    fs::write(root.join("b.txt"), "x").unwrap();
    let limits = ScanLimits {
        max_depth: 8,
        max_files: 2,
    };

    let snapshot = scanner(&[".git", ".git/**"], limits).scan(root).unwrap();
    assert_eq!(snapshot.len(), 2);
}

#[test]
fn a_missing_root_is_reported_as_missing() {
    let dir = tempfile::tempdir().unwrap();
    let err = scanner(&[], ScanLimits::default())
        .scan(&dir.path().join("absent"))
        .unwrap_err();
    assert!(matches!(err, ScanError::RootMissing(_)));
}
