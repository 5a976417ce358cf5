// src/exec/compiler.rs

//! One-shot native source compiles and the serialized compile loop.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::ServeConfig;
use crate::exec::command::{CommandSpec, relay_lines};
use crate::exec::terminate::terminate_gracefully;
use crate::types::ChangeBatch;
use crate::watch::path_utils::summarize_paths;

/// How many changed paths a compile log line lists before truncating.
const LOGGED_PATHS: usize = 5;

/// Time a cancelled compiler gets to exit before it is killed.
const CANCEL_GRACE: Duration = Duration::from_secs(2);

/// Outcome of one compile pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileResult {
    pub success: bool,
    pub duration_ms: u64,
    /// Number of changed files that prompted the pass (0 for the start-up pass).
    pub changed_file_count: usize,
    /// Compiler exit code; `None` if it never ran or was killed by a signal.
    pub exit_code: Option<i32>,
}

/// Runs the native compiler (no extra arguments) in the native source dir.
#[derive(Debug, Clone)]
pub struct NativeSourceCompiler {
    command: CommandSpec,
    cwd: PathBuf,
}

impl NativeSourceCompiler {
    pub fn new(command: CommandSpec, cwd: impl Into<PathBuf>) -> Self {
        Self {
            command,
            cwd: cwd.into(),
        }
    }

    pub fn from_config(config: &ServeConfig) -> Self {
        Self::new(
            config.compiler_command().clone(),
            config.native_source_dir(),
        )
    }

    pub fn command(&self) -> &CommandSpec {
        &self.command
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Unconditional compile pass.
    pub async fn compile(&self) -> CompileResult {
        self.compile_changes(&[]).await
    }

    /// Compile after `changed` settled. Never fails: a compiler that exits
    /// non-zero or cannot be spawned yields `success = false`, and whatever
    /// output it produced before stays on disk.
    pub async fn compile_changes(&self, changed: &[PathBuf]) -> CompileResult {
        let result = self.compile_until(changed, std::future::pending()).await;
        result.unwrap_or(CompileResult {
            success: false,
            duration_ms: 0,
            changed_file_count: changed.len(),
            exit_code: None,
        })
    }

    /// Like [`compile_changes`](Self::compile_changes), but the compiler is
    /// terminated as soon as `cancel` resolves. Returns `None` in that case.
    pub async fn compile_until<F>(&self, changed: &[PathBuf], cancel: F) -> Option<CompileResult>
    where
        F: Future<Output = ()>,
    {
        if !changed.is_empty() {
            info!(
                files = %summarize_paths(&self.cwd, changed, LOGGED_PATHS),
                "native sources changed; compiling"
            );
        } else {
            info!(cmd = %self.command, "compiling native sources");
        }

        let started = Instant::now();
        let outcome = match self.run(cancel).await {
            Ok(Some(status)) => Ok(status),
            Ok(None) => {
                info!("native compile cancelled");
                return None;
            }
            Err(err) => Err(err),
        };
        let duration_ms = started.elapsed().as_millis() as u64;

        let (success, exit_code) = match outcome {
            Ok(status) if status.success() => {
                info!(duration_ms, "native compile succeeded");
                (true, status.code())
            }
            Ok(status) => {
                warn!(
                    duration_ms,
                    exit_code = ?status.code(),
                    "native compile failed; keeping previous output"
                );
                (false, status.code())
            }
            Err(err) => {
                warn!(error = %format!("{err:#}"), "native compile could not run");
                (false, None)
            }
        };

        Some(CompileResult {
            success,
            duration_ms,
            changed_file_count: changed.len(),
            exit_code,
        })
    }

    /// Run the compiler to completion; `Ok(None)` if `cancel` won.
    async fn run<F>(&self, cancel: F) -> Result<Option<ExitStatus>>
    where
        F: Future<Output = ()>,
    {
        let mut cmd = self.command.to_command(&self.cwd);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().with_context(|| {
            format!(
                "spawning compiler `{}` in {}",
                self.command,
                self.cwd.display()
            )
        })?;

        let relays: Vec<JoinHandle<()>> = [
            child.stdout.take().map(|p| relay_lines("compiler", "stdout", p)),
            child.stderr.take().map(|p| relay_lines("compiler", "stderr", p)),
        ]
        .into_iter()
        .flatten()
        .collect();

        let waited = tokio::select! {
            status = child.wait() => Some(status),
            _ = cancel => None,
        };

        let Some(status) = waited else {
            if let Err(e) = terminate_gracefully(&mut child, CANCEL_GRACE, "compiler").await {
                warn!(error = %e, "failed to stop cancelled compiler");
            }
            return Ok(None);
        };
        let status =
            status.with_context(|| format!("waiting for compiler `{}`", self.command))?;

        // Let relayed output land before the result line.
        for relay in relays {
            let _ = relay.await;
        }

        Ok(Some(status))
    }
}

/// Drive `compiler` from a stream of settled source batches.
///
/// At most one compile runs at a time. Batches arriving while a compile is in
/// flight are accumulated (paths deduplicated, first arrival wins) and
/// compiled together once it finishes. Results go to `results` when given.
/// The loop ends when `batches` closes and nothing is left to compile.
pub fn spawn_compile_loop(
    compiler: NativeSourceCompiler,
    mut batches: mpsc::Receiver<ChangeBatch>,
    results: Option<mpsc::Sender<CompileResult>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut pending: Vec<PathBuf> = Vec::new();
        let mut open = true;

        loop {
            if pending.is_empty() {
                match batches.recv().await {
                    Some(batch) => accumulate(&mut pending, batch),
                    None => break,
                }
            }

            let changed = std::mem::take(&mut pending);
            let compile = compiler.compile_changes(&changed);
            tokio::pin!(compile);

            let result = loop {
                tokio::select! {
                    result = &mut compile => break result,
                    maybe_batch = batches.recv(), if open => match maybe_batch {
                        Some(batch) => {
                            debug!(files = batch.len(), "compile in flight; deferring batch");
                            accumulate(&mut pending, batch);
                        }
                        None => open = false,
                    },
                }
            };

            if let Some(tx) = &results {
                let _ = tx.send(result).await;
            }
        }

        debug!("compile loop finished");
    })
}

fn accumulate(pending: &mut Vec<PathBuf>, batch: ChangeBatch) {
    for path in batch.into_paths() {
        if !pending.contains(&path) {
            pending.push(path);
        }
    }
}
