// src/watch/watcher.rs

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::event::{ModifyKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, warn};

use crate::errors::Result;
use crate::types::{ChangeBatch, ChangeKind};
use crate::watch::debounce::Debouncer;
use crate::watch::path_utils::relative_str;
use crate::watch::patterns::IgnoreSet;

/// Capacity of the settled-batch channel handed to the subscriber.
const BATCH_CHANNEL_CAPACITY: usize = 16;

/// A single filtered filesystem change, before debouncing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawChange {
    pub path: PathBuf,
    pub kind: ChangeKind,
}

/// Options for one watch subscription.
#[derive(Debug, Clone)]
pub struct WatchOptions {
    /// Name used in log lines (e.g. "compile", "restart").
    pub label: &'static str,
    pub debounce: Duration,
    pub ignore: IgnoreSet,
}

/// Handle for one watch subscription.
///
/// Owns the debounce task and the task holding the underlying
/// `RecommendedWatcher`. Dropping this handle aborts both, which stops file
/// watching, so no timer outlives the subscription.
pub struct WatchHandle {
    tasks: Vec<JoinHandle<()>>,
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

impl std::fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchHandle").finish()
    }
}

/// Watch `roots` recursively and return a stream of settled change batches.
///
/// Every call is an independent subscription with its own debounce state,
/// even when roots overlap with another subscription. Roots that don't exist
/// yet are created, so output directories filled later are still observed.
///
/// The parent of each root is watched too. A root that is deleted and
/// created again (build tools clear their output directory on start) is
/// picked up again, and its re-creation is reported as a change.
pub fn watch(
    roots: &[PathBuf],
    options: WatchOptions,
) -> Result<(WatchHandle, mpsc::Receiver<ChangeBatch>)> {
    let mut canonical_roots = Vec::with_capacity(roots.len());
    for root in roots {
        std::fs::create_dir_all(root)?;
        // Canonicalize once so we have a stable base path.
        canonical_roots.push(root.canonicalize().unwrap_or_else(|_| root.clone()));
    }

    // Channels from the blocking notify callback into the async world.
    let (raw_tx, raw_rx) = mpsc::unbounded_channel::<RawChange>();
    let (recreated_tx, recreated_rx) = mpsc::unbounded_channel::<PathBuf>();

    let label = options.label;
    let callback_roots = canonical_roots.clone();
    let callback_ignore = options.ignore.clone();

    // Closure called synchronously by notify whenever an event arrives.
    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if let Some(root) = recreated_root(&event, &callback_roots) {
                    let _ = recreated_tx.send(root.clone());
                }
                for change in raw_changes_from_event(&event, &callback_roots, &callback_ignore) {
                    if raw_tx.send(change).is_err() {
                        // Subscription dropped; nothing left to deliver to.
                        return;
                    }
                }
            }
            Err(err) => {
                warn!(label, error = %err, "file watch error");
            }
        },
        Config::default(),
    )?;

    for root in &canonical_roots {
        watcher.watch(root, RecursiveMode::Recursive)?;
    }
    for parent in root_parents(&canonical_roots) {
        watcher.watch(&parent, RecursiveMode::NonRecursive)?;
    }

    info!(label, roots = ?canonical_roots, debounce_ms = options.debounce.as_millis() as u64, "file watcher started");

    let rearm = spawn_rearm_task(watcher, recreated_rx, label);
    let (debounce, batch_rx) = spawn_debouncer(raw_rx, options.debounce, label);

    Ok((
        WatchHandle {
            tasks: vec![rearm, debounce],
        },
        batch_rx,
    ))
}

/// Parents of `roots` that are not themselves inside a root.
fn root_parents(roots: &[PathBuf]) -> Vec<PathBuf> {
    let mut parents: Vec<PathBuf> = Vec::new();
    for parent in roots.iter().filter_map(|root| root.parent()) {
        let covered = roots.iter().any(|root| parent.starts_with(root));
        if !covered && !parents.iter().any(|p| p == parent) {
            parents.push(parent.to_path_buf());
        }
    }
    parents
}

/// The root this event (re)creates, if any.
fn recreated_root<'a>(event: &Event, roots: &'a [PathBuf]) -> Option<&'a PathBuf> {
    let created: &[PathBuf] = match event.kind {
        EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            &event.paths
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => event.paths.get(1..)?,
        _ => return None,
    };
    roots.iter().find(|root| created.iter().any(|path| path == *root))
}

/// Own the notify watcher and re-register roots that were recreated. The
/// kernel-side watch on a root dies with the directory it pointed at.
fn spawn_rearm_task(
    mut watcher: RecommendedWatcher,
    mut recreated: mpsc::UnboundedReceiver<PathBuf>,
    label: &'static str,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(root) = recreated.recv().await {
            let _ = watcher.unwatch(&root);
            match watcher.watch(&root, RecursiveMode::Recursive) {
                Ok(()) => info!(label, root = ?root, "watch root recreated; watching it again"),
                Err(e) => warn!(label, root = ?root, error = %e, "failed to re-watch recreated root"),
            }
        }
    })
}

/// Run the debounce loop over an arbitrary source of raw changes.
///
/// This is what [`watch`] uses internally; it is public so the timing
/// behaviour can be driven without a real filesystem. When `raw_rx` closes,
/// any pending changes are flushed as a final batch.
pub fn spawn_debouncer(
    mut raw_rx: mpsc::UnboundedReceiver<RawChange>,
    window: Duration,
    label: &'static str,
) -> (JoinHandle<()>, mpsc::Receiver<ChangeBatch>) {
    let (batch_tx, batch_rx) = mpsc::channel::<ChangeBatch>(BATCH_CHANNEL_CAPACITY);

    let task = tokio::spawn(async move {
        let mut debouncer = Debouncer::new(window);

        loop {
            let deadline = debouncer.deadline();

            tokio::select! {
                biased;
                maybe_change = raw_rx.recv() => {
                    let Some(change) = maybe_change else {
                        if let Some(batch) = debouncer.flush(Instant::now()) {
                            let _ = batch_tx.send(batch).await;
                        }
                        break;
                    };
                    debug!(label, path = ?change.path, kind = change.kind.label(), "raw change");
                    debouncer.push(change.path, change.kind, Instant::now());
                }
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    if let Some(batch) = debouncer.take_if_settled(Instant::now()) {
                        debug!(label, files = batch.len(), "change batch settled");
                        if batch_tx.send(batch).await.is_err() {
                            warn!(label, "change batch subscriber dropped; stopping watcher loop");
                            break;
                        }
                    }
                }
            }
        }
        debug!(label, "debounce loop finished");
    });

    (task, batch_rx)
}

/// Convert one notify event into filtered raw changes.
///
/// Access and metadata-only events are dropped; renames become a removal of
/// the old path and a creation of the new one. Paths outside every root or
/// matching the ignore set are skipped.
pub fn raw_changes_from_event(
    event: &Event,
    roots: &[PathBuf],
    ignore: &IgnoreSet,
) -> Vec<RawChange> {
    let kinds: Vec<ChangeKind> = match event.kind {
        EventKind::Create(_) => vec![ChangeKind::Created; event.paths.len()],
        EventKind::Remove(_) => vec![ChangeKind::Removed; event.paths.len()],
        EventKind::Modify(ModifyKind::Metadata(_)) => return Vec::new(),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            vec![ChangeKind::Removed; event.paths.len()]
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            vec![ChangeKind::Created; event.paths.len()]
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            let mut kinds = vec![ChangeKind::Removed];
            kinds.resize(event.paths.len(), ChangeKind::Created);
            kinds
        }
        EventKind::Modify(_) => vec![ChangeKind::Modified; event.paths.len()],
        EventKind::Access(_) | EventKind::Any | EventKind::Other => return Vec::new(),
    };

    event
        .paths
        .iter()
        .zip(kinds)
        .filter(|(path, _)| !is_ignored_under_roots(path, roots, ignore))
        .map(|(path, kind)| RawChange {
            path: path.clone(),
            kind,
        })
        .collect()
}

fn is_ignored_under_roots(path: &Path, roots: &[PathBuf], ignore: &IgnoreSet) -> bool {
    match roots.iter().find_map(|root| relative_str(root, path)) {
        Some(rel) if rel.is_empty() => false,
        Some(rel) => ignore.is_ignored(&rel),
        // Not under any root we asked for; don't forward it.
        None => true,
    }
}
