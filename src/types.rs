use std::fmt;
use std::path::PathBuf;

use serde::Deserialize;
use tokio::time::Instant;

/// Language the native shell sources are written in (`template.language`).
///
/// - `Ts`: sources must be compiled before the shell can load them; a
///   compile pass runs at start-up and on every settled source change.
/// - `Js`: sources are loaded as-is; no compiler is involved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceLanguage {
    #[default]
    Ts,
    Js,
}

impl SourceLanguage {
    /// Whether this mode needs a [`crate::exec::NativeSourceCompiler`].
    pub fn is_compiled(self) -> bool {
        matches!(self, SourceLanguage::Ts)
    }
}

impl fmt::Display for SourceLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceLanguage::Ts => f.write_str("ts"),
            SourceLanguage::Js => f.write_str("js"),
        }
    }
}

/// What happened to a path, as far as the watchers are concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
    Removed,
}

impl ChangeKind {
    pub fn label(self) -> &'static str {
        match self {
            ChangeKind::Created => "created",
            ChangeKind::Modified => "modified",
            ChangeKind::Removed => "removed",
        }
    }
}

/// A settled burst of filesystem changes from one watch subscription.
///
/// `events` holds each path once, in order of first arrival within the
/// window. Batches are handed to exactly one consumer by value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeBatch {
    pub events: Vec<(PathBuf, ChangeKind)>,
    pub window_start: Instant,
    pub window_end: Instant,
}

impl ChangeBatch {
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &PathBuf> {
        self.events.iter().map(|(p, _)| p)
    }

    pub fn into_paths(self) -> Vec<PathBuf> {
        self.events.into_iter().map(|(p, _)| p).collect()
    }
}
