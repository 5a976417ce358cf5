// src/watch/mod.rs

//! File watching and change batching.
//!
//! This module is responsible for:
//! - Compiling the ignore rules every subscription applies.
//! - Wiring up a cross-platform filesystem watcher (`notify`).
//! - Debouncing raw events into settled [`ChangeBatch`](crate::types::ChangeBatch)es.
//!
//! It does **not** know who consumes the batches; the orchestrator routes
//! them to the compiler or the process supervisor.

pub mod debounce;
pub mod path_utils;
pub mod patterns;
pub mod watcher;

pub use debounce::Debouncer;
pub use patterns::{BUILTIN_IGNORES, IgnoreSet};
pub use watcher::{RawChange, WatchHandle, WatchOptions, raw_changes_from_event, spawn_debouncer, watch};
