// tests/config_loading.rs

mod common;
use crate::common::{ServeConfigBuilder, write_file};

use std::path::Path;
use std::time::Duration;

use clap::Parser;
use tempfile::TempDir;

use ngshell::cli::CliArgs;
use ngshell::config::load_and_validate;
use ngshell::errors::ServeError;
use ngshell::types::SourceLanguage;

const PROJECT_JSON: &str = r#"{
  "template": {
    "ngBuildDir": "www",
    "eBuildDir": "app-dist",
    "electronRoot": "app",
    "language": "ts"
  },
  "scaffold": { "version": 3 }
}"#;

const WORKSPACE_JSON: &str = r#"{
  "version": 1,
  "defaultProject": "shop",
  "projects": { "shop": {}, "admin": {} }
}"#;

fn args(dir: &Path, extra: &[&str]) -> CliArgs {
    let config = dir.join("ngshell.json");
    let mut argv = vec![
        "ngshell".to_string(),
        "--config".to_string(),
        config.display().to_string(),
    ];
    argv.extend(extra.iter().map(|s| s.to_string()));
    CliArgs::try_parse_from(argv).unwrap()
}

fn project_dir() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "ngshell.json", PROJECT_JSON);
    write_file(dir.path(), "angular.json", WORKSPACE_JSON);
    dir
}

#[test]
fn loads_project_workspace_and_defaults() {
    let dir = project_dir();
    let root = dir.path().canonicalize().unwrap();

    let cfg = load_and_validate(&args(dir.path(), &[])).unwrap();

    assert_eq!(cfg.project_root(), root);
    assert_eq!(cfg.frontend_output_dir(), root.join("www"));
    assert_eq!(cfg.native_output_dir(), root.join("app-dist"));
    assert_eq!(cfg.native_source_dir(), root.join("app"));
    assert_eq!(cfg.active_project(), "shop");
    assert_eq!(cfg.source_language(), SourceLanguage::Ts);
    assert_eq!(cfg.restart_delay(), Duration::from_millis(2500));
    assert_eq!(cfg.grace_period(), Duration::from_secs(5));
    assert_eq!(cfg.inspector_port(), None);
    assert_eq!(cfg.build_configuration(), "development");
    assert_eq!(cfg.shell_entry_dir(), root.join("app-dist"));
    assert_eq!(
        cfg.restart_roots(),
        vec![root.join("app"), root.join("app-dist"), root.join("www")]
    );
}

#[test]
fn empty_template_falls_back_to_default_directories() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "ngshell.json", "{}");
    let root = dir.path().canonicalize().unwrap();

    let cfg = load_and_validate(&args(dir.path(), &["--project", "app"])).unwrap();

    assert_eq!(cfg.frontend_output_dir(), root.join("dist"));
    assert_eq!(cfg.native_output_dir(), root.join("electron-dist"));
    assert_eq!(cfg.native_source_dir(), root.join("electron"));
    assert_eq!(cfg.active_project(), "app");
}

#[test]
fn settings_file_is_applied_and_cli_wins() {
    let dir = project_dir();
    write_file(
        dir.path(),
        "ngshell.toml",
        r#"
[serve]
restart_delay = 1.0
grace_period = 2.0
compile_debounce_ms = 50
ready_pattern = "^ready"

[watch]
exclude = ["**/*.map"]

[commands]
shell = ["electron-nightly"]
"#,
    );

    let cfg = load_and_validate(&args(dir.path(), &[])).unwrap();
    assert_eq!(cfg.restart_delay(), Duration::from_secs(1));
    assert_eq!(cfg.grace_period(), Duration::from_secs(2));
    assert_eq!(cfg.compile_debounce(), Duration::from_millis(50));
    assert_eq!(cfg.restart_debounce(), Duration::from_millis(100));
    assert!(cfg.ready_pattern().unwrap().is_match("ready to go"));
    assert!(cfg.ignore().is_ignored("main.js.map"));
    assert_eq!(cfg.shell_command().program(), "electron-nightly");

    let cfg = load_and_validate(&args(dir.path(), &["--delay", "0.5", "--prod"])).unwrap();
    assert_eq!(cfg.restart_delay(), Duration::from_millis(500));
    assert_eq!(cfg.build_configuration(), "production");
}

#[test]
fn unknown_settings_key_is_rejected() {
    let dir = project_dir();
    write_file(dir.path(), "ngshell.toml", "[serve]\nrestart_dealy = 1.0\n");

    match load_and_validate(&args(dir.path(), &[])) {
        Err(ServeError::Toml(e)) => assert!(e.to_string().contains("restart_dealy")),
        other => panic!("expected TOML error, got {other:?}"),
    }
}

#[test]
fn missing_or_malformed_project_config_is_a_config_error() {
    let dir = tempfile::tempdir().unwrap();
    match load_and_validate(&args(dir.path(), &["--project", "app"])) {
        Err(ServeError::Config(msg)) => assert!(msg.contains("reading project config")),
        other => panic!("expected config error, got {other:?}"),
    }

    write_file(dir.path(), "ngshell.json", "{ \"template\": ");
    match load_and_validate(&args(dir.path(), &["--project", "app"])) {
        Err(ServeError::Config(msg)) => assert!(msg.contains("parsing JSON")),
        other => panic!("expected config error, got {other:?}"),
    }
}

#[test]
fn unknown_language_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "ngshell.json", r#"{ "template": { "language": "rust" } }"#);

    let result = load_and_validate(&args(dir.path(), &["--project", "app"]));
    assert!(matches!(result, Err(ServeError::Config(_))), "{result:?}");
}

#[test]
fn project_resolution() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "ngshell.json", "{}");

    // No workspace, no flag.
    let err = load_and_validate(&args(dir.path(), &[])).unwrap_err();
    assert!(err.to_string().contains("--project"), "{err}");

    // Flag naming a project the workspace doesn't define.
    write_file(dir.path(), "angular.json", WORKSPACE_JSON);
    let err = load_and_validate(&args(dir.path(), &["--project", "nope"])).unwrap_err();
    assert!(err.to_string().contains("nope"), "{err}");

    // Several projects and no default.
    write_file(dir.path(), "angular.json", r#"{ "projects": { "a": {}, "b": {} } }"#);
    assert!(load_and_validate(&args(dir.path(), &[])).is_err());

    // A single project is picked automatically.
    write_file(dir.path(), "angular.json", r#"{ "projects": { "only": {} } }"#);
    let cfg = load_and_validate(&args(dir.path(), &[])).unwrap();
    assert_eq!(cfg.active_project(), "only");
}

#[test]
fn inspect_flag_defaults_to_5858() {
    let dir = project_dir();

    let cfg = load_and_validate(&args(dir.path(), &["--inspect"])).unwrap();
    assert_eq!(cfg.inspector_port(), Some(5858));

    let cfg = load_and_validate(&args(dir.path(), &["--inspect=9229"])).unwrap();
    assert_eq!(cfg.inspector_port(), Some(9229));
}

#[test]
fn invalid_values_are_rejected() {
    let root = Path::new("/project");

    let cases = [
        ServeConfigBuilder::new(root).delay_flag(-1.0),
        ServeConfigBuilder::new(root).delay_flag(f64::NAN),
        ServeConfigBuilder::new(root).grace_period(0.0),
        ServeConfigBuilder::new(root).ng_build_dir("  "),
        ServeConfigBuilder::new(root).ng_build_dir("electron"),
        ServeConfigBuilder::new(root).ng_build_dir("out").e_build_dir("out"),
        ServeConfigBuilder::new(root).e_build_dir("electron/dist"),
        ServeConfigBuilder::new(root).e_build_dir("dist/native"),
        ServeConfigBuilder::new(root).ng_build_dir("electron-dist/web"),
        ServeConfigBuilder::new(root).ready_pattern("(unclosed"),
        ServeConfigBuilder::new(root).exclude("a/**{"),
        ServeConfigBuilder::new(root).shell_command(&[]),
        ServeConfigBuilder::new(root).compiler_command(&[""]),
        ServeConfigBuilder::new(root).project(Some(" ")),
    ];

    for (i, builder) in cases.into_iter().enumerate() {
        match builder.try_build() {
            Err(ServeError::Config(_)) => {}
            other => panic!("case {i}: expected config error, got {other:?}"),
        }
    }
}

#[test]
fn js_mode_allows_shared_output_dir_and_skips_compiled_output() {
    let root = Path::new("/project");
    let cfg = ServeConfigBuilder::new(root)
        .language(SourceLanguage::Js)
        .ng_build_dir("out")
        .e_build_dir("out")
        .build();

    assert_eq!(cfg.output_dirs(), vec![root.join("out").as_path()]);
    assert_eq!(cfg.shell_entry_dir(), root.join("electron"));
    assert_eq!(
        cfg.restart_roots(),
        vec![root.join("electron"), root.join("out")]
    );
}

#[test]
fn output_dirs_that_would_swallow_the_project_are_rejected() {
    let root = Path::new("/project");

    for dir in [".", "..", "/", "electron/..", "./", "dist/../.."] {
        let result = ServeConfigBuilder::new(root)
            .ng_build_dir(dir)
            .fresh(true)
            .try_build();
        assert!(
            matches!(result, Err(ServeError::Config(_))),
            "ngBuildDir {dir:?} accepted: {result:?}"
        );

        let result = ServeConfigBuilder::new(root)
            .e_build_dir(dir)
            .fresh(true)
            .try_build();
        assert!(
            matches!(result, Err(ServeError::Config(_))),
            "eBuildDir {dir:?} accepted: {result:?}"
        );
    }

    // A parent of the native sources is just as bad.
    let result = ServeConfigBuilder::new(root)
        .electron_root("app/electron")
        .ng_build_dir("app")
        .try_build();
    assert!(matches!(result, Err(ServeError::Config(_))), "{result:?}");
}

#[test]
fn output_dirs_are_normalized() {
    let root = Path::new("/project");
    let cfg = ServeConfigBuilder::new(root)
        .ng_build_dir("./www/../dist/")
        .e_build_dir("build/./native")
        .build();

    assert_eq!(cfg.frontend_output_dir(), root.join("dist"));
    assert_eq!(cfg.native_output_dir(), root.join("build/native"));
}
