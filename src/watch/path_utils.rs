// src/watch/path_utils.rs

//! Utility functions for path handling in the watchers.

use std::path::{Path, PathBuf};

/// Convert a path into a string relative to `root`, with forward slashes.
///
/// - First we try a direct `strip_prefix(root)`.
/// - If that fails (e.g. due to symlinks or different absolute prefixes),
///   we canonicalize both paths and try again.
///
/// Returns `None` if the path cannot be related to `root`. Note that paths
/// reported for removed files can no longer be canonicalized, so only the
/// fast path applies to them.
pub fn relative_str(root: &Path, path: &Path) -> Option<String> {
    if let Ok(rel) = path.strip_prefix(root) {
        return Some(to_slash(rel));
    }

    // Helps on platforms (notably macOS) where different absolute prefixes
    // may be used for the same directory (e.g. /private/var/...).
    if let (Ok(root_canon), Ok(path_canon)) = (root.canonicalize(), path.canonicalize()) {
        if let Ok(rel) = path_canon.strip_prefix(&root_canon) {
            return Some(to_slash(rel));
        }
    }

    None
}

/// Short, human-readable rendering of changed files for log lines: paths
/// relative to `base` where possible, at most `limit` entries.
pub fn summarize_paths(base: &Path, paths: &[PathBuf], limit: usize) -> String {
    join_limited(
        paths
            .iter()
            .map(|p| relative_str(base, p).unwrap_or_else(|| p.display().to_string())),
        limit,
    )
}

/// Comma-join the first `limit` items, noting how many were left out.
pub fn join_limited(items: impl IntoIterator<Item = String>, limit: usize) -> String {
    let mut shown = Vec::new();
    let mut hidden = 0usize;
    for item in items {
        if shown.len() < limit {
            shown.push(item);
        } else {
            hidden += 1;
        }
    }

    if hidden > 0 {
        shown.push(format!("(+{hidden} more)"));
    }

    shown.join(", ")
}

fn to_slash(rel: &Path) -> String {
    rel.to_string_lossy().replace('\\', "/")
}
