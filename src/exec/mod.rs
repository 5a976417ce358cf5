// src/exec/mod.rs

//! Process execution layer.
//!
//! This module is responsible for spawning the external toolchains with
//! `tokio::process::Command` and reporting how they ended:
//!
//! - [`command`] holds [`CommandSpec`] and output relaying.
//! - [`compiler`] runs the native source compiler and the serialized
//!   compile loop fed by the watcher.
//! - [`frontend`] launches the long-lived front-end build watcher.
//! - [`terminate`] implements signal-then-kill shutdown with a grace period.
//!
//! The native shell process itself is launched through
//! [`crate::supervisor::ProcessLauncher`], since its lifecycle belongs to the
//! supervisor.

pub mod command;
pub mod compiler;
pub mod frontend;
pub mod terminate;

pub use command::{CommandSpec, relay_lines};
pub use compiler::{CompileResult, NativeSourceCompiler, spawn_compile_loop};
pub use frontend::{FrontendBuildWatcher, FrontendHandle};
pub use terminate::terminate_gracefully;
