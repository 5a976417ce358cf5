// tests/debounce_batches.rs

mod common;
use crate::common::{init_tracing, with_timeout};

use std::path::{Path, PathBuf};

use notify::event::{CreateKind, DataChange, MetadataKind, ModifyKind, RenameMode};
use notify::{Event, EventKind};
use proptest::prelude::*;
use tokio::sync::mpsc;
use tokio::time::{Duration, Instant, sleep};

use ngshell::types::ChangeKind;
use ngshell::watch::{Debouncer, IgnoreSet, RawChange, raw_changes_from_event, spawn_debouncer};

fn modified(path: &str) -> RawChange {
    RawChange {
        path: PathBuf::from(path),
        kind: ChangeKind::Modified,
    }
}

#[tokio::test(start_paused = true)]
async fn burst_within_window_yields_one_batch_after_last_event() {
    init_tracing();

    let (raw_tx, raw_rx) = mpsc::unbounded_channel();
    let (_task, mut batches) = spawn_debouncer(raw_rx, Duration::from_millis(100), "test");

    let start = Instant::now();
    raw_tx.send(modified("a.ts")).unwrap();
    sleep(Duration::from_millis(30)).await;
    raw_tx.send(modified("b.ts")).unwrap();
    sleep(Duration::from_millis(30)).await;
    raw_tx.send(modified("a.ts")).unwrap();

    let batch = with_timeout(batches.recv()).await.expect("one batch");
    let settled_after = start.elapsed();

    assert!(
        settled_after >= Duration::from_millis(160) && settled_after < Duration::from_millis(170),
        "batch settled after {settled_after:?}"
    );
    assert_eq!(
        batch.paths().cloned().collect::<Vec<_>>(),
        vec![PathBuf::from("a.ts"), PathBuf::from("b.ts")]
    );
    assert_eq!(batch.window_end - batch.window_start, Duration::from_millis(160));

    // Nothing else is pending.
    sleep(Duration::from_secs(1)).await;
    assert!(batches.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn separate_bursts_yield_separate_batches() {
    let (raw_tx, raw_rx) = mpsc::unbounded_channel();
    let (_task, mut batches) = spawn_debouncer(raw_rx, Duration::from_millis(100), "test");

    raw_tx.send(modified("a.ts")).unwrap();
    sleep(Duration::from_millis(250)).await;
    raw_tx.send(modified("b.ts")).unwrap();

    let first = with_timeout(batches.recv()).await.unwrap();
    let second = with_timeout(batches.recv()).await.unwrap();

    assert_eq!(first.into_paths(), vec![PathBuf::from("a.ts")]);
    assert_eq!(second.into_paths(), vec![PathBuf::from("b.ts")]);
}

#[tokio::test(start_paused = true)]
async fn closing_the_source_flushes_pending_changes() {
    let (raw_tx, raw_rx) = mpsc::unbounded_channel();
    let (task, mut batches) = spawn_debouncer(raw_rx, Duration::from_secs(10), "test");

    raw_tx.send(modified("main.ts")).unwrap();
    drop(raw_tx);

    let batch = with_timeout(batches.recv()).await.expect("flushed batch");
    assert_eq!(batch.len(), 1);

    with_timeout(task).await.unwrap();
    assert!(batches.recv().await.is_none());
}

#[test]
fn created_then_removed_in_one_window_cancels_out() {
    let mut debouncer = Debouncer::new(Duration::from_millis(100));
    let t0 = Instant::now();

    debouncer.push("tmp.js".into(), ChangeKind::Created, t0);
    debouncer.push("tmp.js".into(), ChangeKind::Removed, t0 + Duration::from_millis(10));

    assert!(debouncer.take_if_settled(t0 + Duration::from_millis(200)).is_none());
    assert!(debouncer.is_idle());
}

#[test]
fn replaced_file_is_reported_as_modified() {
    let mut debouncer = Debouncer::new(Duration::from_millis(100));
    let t0 = Instant::now();

    debouncer.push("main.js".into(), ChangeKind::Removed, t0);
    debouncer.push("main.js".into(), ChangeKind::Created, t0 + Duration::from_millis(5));
    debouncer.push("new.js".into(), ChangeKind::Created, t0 + Duration::from_millis(6));
    debouncer.push("new.js".into(), ChangeKind::Modified, t0 + Duration::from_millis(7));

    let batch = debouncer
        .take_if_settled(t0 + Duration::from_millis(107))
        .expect("settled");
    assert_eq!(
        batch.events,
        vec![
            (PathBuf::from("main.js"), ChangeKind::Modified),
            (PathBuf::from("new.js"), ChangeKind::Created),
        ]
    );
}

#[test]
fn nothing_is_taken_before_the_deadline() {
    let mut debouncer = Debouncer::new(Duration::from_millis(100));
    let t0 = Instant::now();

    debouncer.push("a.ts".into(), ChangeKind::Modified, t0);
    assert_eq!(debouncer.deadline(), Some(t0 + Duration::from_millis(100)));
    assert!(debouncer.take_if_settled(t0 + Duration::from_millis(99)).is_none());
    assert!(!debouncer.is_idle());
    assert!(debouncer.take_if_settled(t0 + Duration::from_millis(100)).is_some());
}

fn event(kind: EventKind, paths: &[&Path]) -> Event {
    let mut event = Event::new(kind);
    for path in paths {
        event = event.add_path(path.to_path_buf());
    }
    event
}

#[test]
fn notify_events_are_classified_and_filtered() {
    let root = PathBuf::from("/project/electron");
    let roots = vec![root.clone()];
    let ignore = IgnoreSet::builtin().unwrap();

    let write = event(
        EventKind::Modify(ModifyKind::Data(DataChange::Content)),
        &[&root.join("main.ts")],
    );
    assert_eq!(
        raw_changes_from_event(&write, &roots, &ignore),
        vec![RawChange {
            path: root.join("main.ts"),
            kind: ChangeKind::Modified
        }]
    );

    let rename = event(
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
        &[&root.join("old.ts"), &root.join("new.ts")],
    );
    let kinds: Vec<ChangeKind> = raw_changes_from_event(&rename, &roots, &ignore)
        .into_iter()
        .map(|c| c.kind)
        .collect();
    assert_eq!(kinds, vec![ChangeKind::Removed, ChangeKind::Created]);

    let metadata = event(
        EventKind::Modify(ModifyKind::Metadata(MetadataKind::Permissions)),
        &[&root.join("main.ts")],
    );
    assert!(raw_changes_from_event(&metadata, &roots, &ignore).is_empty());

    let ignored = event(
        EventKind::Create(CreateKind::File),
        &[
            &root.join("node_modules/pkg/index.js"),
            &root.join(".main.ts.swp"),
            &PathBuf::from("/elsewhere/main.ts"),
        ],
    );
    assert!(raw_changes_from_event(&ignored, &roots, &ignore).is_empty());
}

proptest! {
    // Any burst whose gaps stay below the window settles into exactly one
    // batch holding each path once, in order of first arrival.
    #[test]
    fn burst_settles_into_single_ordered_batch(
        picks in proptest::collection::vec(0..8usize, 1..40),
        gaps in proptest::collection::vec(0..100u64, 40),
    ) {
        let window = Duration::from_millis(100);
        let mut debouncer = Debouncer::new(window);
        let mut now = Instant::now();
        let mut expected: Vec<PathBuf> = Vec::new();

        for (i, pick) in picks.iter().enumerate() {
            if i > 0 {
                now += Duration::from_millis(gaps[i]);
            }
            let path = PathBuf::from(format!("src/file_{pick}.ts"));
            if !expected.contains(&path) {
                expected.push(path.clone());
            }
            prop_assert!(debouncer.take_if_settled(now).is_none());
            debouncer.push(path, ChangeKind::Modified, now);
        }

        prop_assert!(debouncer.take_if_settled(now + window - Duration::from_millis(1)).is_none());
        let batch = debouncer.take_if_settled(now + window);
        prop_assert!(batch.is_some());
        let batch = batch.unwrap();
        prop_assert_eq!(batch.into_paths(), expected);
        prop_assert!(debouncer.take_if_settled(now + window * 10).is_none());
    }
}
