// src/watch/debounce.rs

//! Pure debouncer: timing and per-path deduplication, no IO.
//!
//! The watcher task feeds it raw changes and asks it for a deadline; the
//! debouncer never reads the clock itself, which keeps it deterministic under
//! test.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use tokio::time::Instant;

use crate::types::{ChangeBatch, ChangeKind};

/// Coalesces raw changes until `window` has passed without a new one.
#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    /// Paths in order of first arrival. `None` marks a path whose changes
    /// cancelled out within the window (created, then removed).
    pending: Vec<(PathBuf, Option<ChangeKind>)>,
    index: HashMap<PathBuf, usize>,
    window_start: Option<Instant>,
    last_event: Option<Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: Vec::new(),
            index: HashMap::new(),
            window_start: None,
            last_event: None,
        }
    }

    /// True when no change is waiting to settle.
    pub fn is_idle(&self) -> bool {
        self.last_event.is_none()
    }

    /// Record a change observed at `now`. Every change resets the window.
    pub fn push(&mut self, path: PathBuf, kind: ChangeKind, now: Instant) {
        match self.index.get(&path) {
            Some(&slot) => {
                let merged = merge_kinds(self.pending[slot].1, kind);
                self.pending[slot].1 = merged;
            }
            None => {
                self.index.insert(path.clone(), self.pending.len());
                self.pending.push((path, Some(kind)));
            }
        }

        if self.window_start.is_none() {
            self.window_start = Some(now);
        }
        self.last_event = Some(now);
    }

    /// Instant at which the current burst settles, if one is in progress.
    pub fn deadline(&self) -> Option<Instant> {
        self.last_event.map(|last| last + self.window)
    }

    /// Take the settled batch if the window has elapsed at `now`.
    ///
    /// Returns `None` while the burst is still active, and also when every
    /// change in the burst cancelled out (the window is reset either way).
    pub fn take_if_settled(&mut self, now: Instant) -> Option<ChangeBatch> {
        let deadline = self.deadline()?;
        if now < deadline {
            return None;
        }
        self.flush(now)
    }

    /// Take whatever is pending, settled or not.
    pub fn flush(&mut self, now: Instant) -> Option<ChangeBatch> {
        let window_start = self.window_start.take()?;
        self.last_event = None;
        self.index.clear();

        let events: Vec<(PathBuf, ChangeKind)> = std::mem::take(&mut self.pending)
            .into_iter()
            .filter_map(|(path, kind)| kind.map(|k| (path, k)))
            .collect();

        if events.is_empty() {
            return None;
        }

        Some(ChangeBatch {
            events,
            window_start,
            window_end: now,
        })
    }
}

/// Combine the kind already recorded for a path with a newer one.
///
/// - Created then Removed within one window: nothing happened.
/// - Removed then Created/Modified: the file was replaced, i.e. modified.
/// - Modified then Removed: removed.
/// - Created then Modified: still a creation.
fn merge_kinds(existing: Option<ChangeKind>, new: ChangeKind) -> Option<ChangeKind> {
    use ChangeKind::*;

    match (existing, new) {
        (None, k) => Some(k),
        (Some(Created), Removed) => None,
        (Some(Created), _) => Some(Created),
        (Some(Removed), Created | Modified) => Some(Modified),
        (Some(_), Removed) => Some(Removed),
        (Some(Modified), _) => Some(Modified),
    }
}
