// tests/compile.rs

#![cfg(unix)]

mod common;
use crate::common::{init_tracing, with_timeout, write_file};

use std::path::PathBuf;

use tokio::sync::mpsc;
use tokio::time::Instant;

use ngshell::exec::{CommandSpec, NativeSourceCompiler, spawn_compile_loop};
use ngshell::types::{ChangeBatch, ChangeKind};

fn sh(script: &str) -> CommandSpec {
    CommandSpec::new("sh").args(["-c", script])
}

fn batch(paths: &[&str]) -> ChangeBatch {
    let now = Instant::now();
    ChangeBatch {
        events: paths
            .iter()
            .map(|p| (PathBuf::from(p), ChangeKind::Modified))
            .collect(),
        window_start: now,
        window_end: now,
    }
}

#[tokio::test]
async fn failed_compile_keeps_previous_output() {
    init_tracing();

    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "electron/main.ts", "broken(");
    write_file(dir.path(), "electron-dist/main.js", "previous build");

    let compiler = NativeSourceCompiler::new(
        sh("echo 'main.ts(1,7): error TS1005' >&2; exit 1"),
        dir.path().join("electron"),
    );
    let result = compiler.compile().await;

    assert!(!result.success);
    assert_eq!(result.exit_code, Some(1));
    assert_eq!(result.changed_file_count, 0);
    assert_eq!(
        std::fs::read_to_string(dir.path().join("electron-dist/main.js")).unwrap(),
        "previous build"
    );
}

#[tokio::test]
async fn successful_compile_runs_in_native_source_dir() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "electron/main.ts", "app.start()");

    let compiler = NativeSourceCompiler::new(
        sh("mkdir -p ../electron-dist && cp main.ts ../electron-dist/main.js"),
        dir.path().join("electron"),
    );
    let result = compiler
        .compile_changes(&[dir.path().join("electron/main.ts")])
        .await;

    assert!(result.success, "{result:?}");
    assert_eq!(result.changed_file_count, 1);
    assert_eq!(
        std::fs::read_to_string(dir.path().join("electron-dist/main.js")).unwrap(),
        "app.start()"
    );
}

#[tokio::test]
async fn missing_compiler_binary_is_a_failed_result() {
    let dir = tempfile::tempdir().unwrap();
    let compiler = NativeSourceCompiler::new(
        CommandSpec::new("ngshell-definitely-not-a-compiler"),
        dir.path(),
    );

    let result = compiler.compile().await;
    assert!(!result.success);
    assert_eq!(result.exit_code, None);
}

#[tokio::test]
async fn batches_arriving_mid_compile_are_folded_into_one_follow_up() {
    init_tracing();

    let dir = tempfile::tempdir().unwrap();
    let compiler = NativeSourceCompiler::new(sh("sleep 0.3"), dir.path());

    let (batch_tx, batch_rx) = mpsc::channel(8);
    let (result_tx, mut result_rx) = mpsc::channel(8);
    let task = spawn_compile_loop(compiler, batch_rx, Some(result_tx));

    batch_tx.send(batch(&["a.ts"])).await.unwrap();
    batch_tx.send(batch(&["b.ts", "a.ts"])).await.unwrap();
    batch_tx.send(batch(&["c.ts"])).await.unwrap();
    drop(batch_tx);

    let mut results = Vec::new();
    while let Some(result) = with_timeout(result_rx.recv()).await {
        results.push(result);
    }
    with_timeout(task).await.unwrap();

    let counts: Vec<usize> = results.iter().map(|r| r.changed_file_count).collect();
    assert_eq!(counts, vec![1, 3]);
    assert!(results.iter().all(|r| r.success));
}

#[test]
fn command_spec_from_argv_and_display() {
    assert!(CommandSpec::from_argv(Vec::<String>::new()).is_none());
    assert!(CommandSpec::from_argv(vec![" ".to_string()]).is_none());

    let spec = CommandSpec::from_argv(["npx", "tsc", "-p", "tsconfig app.json"].map(String::from))
        .unwrap();
    assert_eq!(spec.program(), "npx");
    assert_eq!(spec.arguments().len(), 3);
    assert_eq!(spec.to_string(), "npx tsc -p \"tsconfig app.json\"");
}
