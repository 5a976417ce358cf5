// src/watch/patterns.rs

use std::fmt;

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};

/// Patterns every watch subscription ignores, regardless of configuration:
/// dependency caches and editor artifacts. Dotfiles are handled separately
/// (any path component starting with `.`).
pub const BUILTIN_IGNORES: &[&str] = &[
    "**/node_modules",
    "**/node_modules/**",
    "**/*~",
    "**/*.swp",
    "**/*.swo",
    "**/*.tmp",
];

/// Compiled ignore rules for watch subscriptions.
///
/// Paths passed to [`IgnoreSet::is_ignored`] are relative to the watch root
/// and use forward slashes (e.g. `"src/main.ts"`).
#[derive(Clone)]
pub struct IgnoreSet {
    builtin: GlobSet,
    extra: Option<GlobSet>,
    extra_patterns: Vec<String>,
}

impl fmt::Debug for IgnoreSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IgnoreSet")
            .field("extra_patterns", &self.extra_patterns)
            .finish_non_exhaustive()
    }
}

impl IgnoreSet {
    /// Built-in rules plus the given extra glob patterns.
    pub fn new(extra: &[String]) -> Result<Self> {
        let builtin = build_globset(BUILTIN_IGNORES.iter().copied())
            .context("building built-in ignore globset")?;

        let extra_set = if extra.is_empty() {
            None
        } else {
            Some(
                build_globset(extra.iter().map(String::as_str))
                    .context("building extra ignore globset")?,
            )
        };

        Ok(Self {
            builtin,
            extra: extra_set,
            extra_patterns: extra.to_vec(),
        })
    }

    /// Only the built-in rules.
    pub fn builtin() -> Result<Self> {
        Self::new(&[])
    }

    pub fn extra_patterns(&self) -> &[String] {
        &self.extra_patterns
    }

    /// Returns true if a change to `rel_path` should never reach a subscriber.
    pub fn is_ignored(&self, rel_path: &str) -> bool {
        if rel_path
            .split('/')
            .any(|component| component.starts_with('.') && component != "." && component != "..")
        {
            return true;
        }

        if self.builtin.is_match(rel_path) {
            return true;
        }

        self.extra
            .as_ref()
            .is_some_and(|extra| extra.is_match(rel_path))
    }
}

/// Build a GlobSet from simple string patterns.
fn build_globset<'a>(patterns: impl IntoIterator<Item = &'a str>) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = Glob::new(pat).with_context(|| format!("invalid glob pattern: {pat}"))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}
