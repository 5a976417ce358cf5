// tests/output_dirs.rs

use std::path::{Path, PathBuf};

use ngshell::fs::mock::MockFileSystem;
use ngshell::fs::{FileSystem, prepare_output_dirs};

#[test]
fn missing_directories_are_created() {
    let fs = MockFileSystem::new();
    let dist = Path::new("/project/dist");
    let native = Path::new("/project/electron-dist");

    let prepared = prepare_output_dirs(&fs, &[dist, native], false).unwrap();

    assert_eq!(prepared, vec![dist.to_path_buf(), native.to_path_buf()]);
    assert!(fs.is_dir(dist));
    assert!(fs.is_dir(native));
}

#[test]
fn existing_output_is_kept_without_fresh() {
    let fs = MockFileSystem::new();
    fs.add_file("/project/dist/main.js", "old bundle");

    let prepared = prepare_output_dirs(&fs, &[Path::new("/project/dist")], false).unwrap();

    assert!(prepared.is_empty());
    assert_eq!(
        fs.file("/project/dist/main.js").as_deref(),
        Some(b"old bundle".as_slice())
    );
}

#[test]
fn fresh_clears_and_recreates() {
    let fs = MockFileSystem::new();
    fs.add_file("/project/dist/main.js", "old bundle");
    fs.add_file("/project/dist/assets/logo.svg", "<svg/>");
    fs.add_file("/project/src/app.ts", "source");

    let dist = Path::new("/project/dist");
    let prepared = prepare_output_dirs(&fs, &[dist], true).unwrap();

    assert_eq!(prepared, vec![PathBuf::from("/project/dist")]);
    assert!(fs.is_dir(dist));
    assert!(fs.children(dist).is_empty());
    assert!(fs.file("/project/dist/main.js").is_none());
    // Siblings are untouched.
    assert!(fs.file("/project/src/app.ts").is_some());
}

#[test]
fn file_in_place_of_output_dir_is_an_error() {
    let fs = MockFileSystem::new();
    fs.add_file("/project/dist", "not a dir");

    let err = prepare_output_dirs(&fs, &[Path::new("/project/dist")], true).unwrap_err();
    assert!(err.to_string().contains("not a directory"), "{err}");
}

#[test]
fn real_file_system_fresh_run() {
    let dir = tempfile::tempdir().unwrap();
    let dist = dir.path().join("dist");
    std::fs::create_dir_all(dist.join("nested")).unwrap();
    std::fs::write(dist.join("nested/old.js"), "x").unwrap();

    let fs = ngshell::fs::RealFileSystem;
    prepare_output_dirs(&fs, &[dist.as_path()], true).unwrap();

    assert!(dist.is_dir());
    assert_eq!(std::fs::read_dir(&dist).unwrap().count(), 0);
}
