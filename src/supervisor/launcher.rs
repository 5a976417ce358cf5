// src/supervisor/launcher.rs

//! Pluggable launcher abstraction for the shell process.
//!
//! The supervisor runtime talks to a `ProcessLauncher` instead of spawning
//! processes itself, so tests can swap in a fake that records launches and
//! lets them crash or exit on demand.
//!
//! A launcher owns everything about one instance after spawning it: it must
//! report `ProcessExited` for that instance exactly once (unless the
//! supervisor is gone), report `ProcessReady` if it can detect readiness, and
//! terminate the process when the `terminate` receiver fires.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result};
use regex::Regex;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::ChildStdout;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::config::ServeConfig;
use crate::exec::{CommandSpec, terminate_gracefully};
use crate::watch::path_utils::relative_str;

use super::{InstanceId, SupervisorEvent};

/// Environment marker telling the shell it runs under the dev server.
pub const DEV_ENV: (&str, &str) = ("NODE_ENV", "development");

/// Trait abstracting how shell instances are spawned.
pub trait ProcessLauncher: Send {
    /// Spawn `instance` and return its pid once it is running.
    ///
    /// An `Err` means nothing was spawned; the supervisor records a failed
    /// start. Exit and readiness are reported later through `events`.
    fn launch(
        &mut self,
        instance: InstanceId,
        events: mpsc::Sender<SupervisorEvent>,
        terminate: oneshot::Receiver<()>,
    ) -> Pin<Box<dyn Future<Output = Result<Option<u32>>> + Send + '_>>;
}

/// Everything needed to spawn the shell process.
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    pub command: CommandSpec,
    pub cwd: PathBuf,
    pub env: Vec<(String, String)>,
    pub ready_pattern: Option<Regex>,
    pub grace: Duration,
}

impl LaunchSpec {
    /// `<shell> [--inspect=<port>] <entry>` in the project root.
    pub fn from_config(config: &ServeConfig) -> Self {
        let root = config.project_root();
        let entry_dir = config.shell_entry_dir();
        let entry = relative_str(root, entry_dir)
            .filter(|rel| !rel.is_empty())
            .unwrap_or_else(|| entry_dir.display().to_string());

        let mut command = config.shell_command().clone();
        if let Some(port) = config.inspector_port() {
            command = command.arg(format!("--inspect={port}"));
        }
        command = command.arg(entry);

        Self {
            command,
            cwd: root.to_path_buf(),
            env: vec![(DEV_ENV.0.to_string(), DEV_ENV.1.to_string())],
            ready_pattern: config.ready_pattern().cloned(),
            grace: config.grace_period(),
        }
    }
}

/// Launches real shell processes.
#[derive(Debug, Clone)]
pub struct ShellLauncher {
    spec: LaunchSpec,
}

impl ShellLauncher {
    pub fn new(spec: LaunchSpec) -> Self {
        Self { spec }
    }

    pub fn from_config(config: &ServeConfig) -> Self {
        Self::new(LaunchSpec::from_config(config))
    }
}

impl ProcessLauncher for ShellLauncher {
    fn launch(
        &mut self,
        instance: InstanceId,
        events: mpsc::Sender<SupervisorEvent>,
        terminate: oneshot::Receiver<()>,
    ) -> Pin<Box<dyn Future<Output = Result<Option<u32>>> + Send + '_>> {
        Box::pin(async move {
            let spec = &self.spec;

            let mut cmd = spec.command.to_command(&spec.cwd);
            cmd.envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
                .stdin(Stdio::null())
                .stderr(Stdio::inherit());
            if spec.ready_pattern.is_some() {
                cmd.stdout(Stdio::piped());
            } else {
                cmd.stdout(Stdio::inherit());
            }

            let mut child = cmd
                .spawn()
                .with_context(|| format!("spawning shell process `{}`", spec.command))?;
            let pid = child.id();

            if let (Some(pattern), Some(stdout)) = (spec.ready_pattern.clone(), child.stdout.take())
            {
                spawn_ready_monitor(instance, stdout, pattern, events.clone());
            }

            let grace = spec.grace;
            tokio::spawn(async move {
                // A dropped sender means the supervisor is gone: shut down too.
                let code = tokio::select! {
                    status = child.wait() => match status {
                        Ok(status) => status.code(),
                        Err(e) => {
                            warn!(instance, error = %e, "failed to wait for shell process");
                            None
                        }
                    },
                    _ = terminate => {
                        match terminate_gracefully(&mut child, grace, "shell").await {
                            Ok(code) => code,
                            Err(e) => {
                                warn!(instance, error = %e, "failed to terminate shell process");
                                None
                            }
                        }
                    }
                };

                let _ = events
                    .send(SupervisorEvent::ProcessExited { instance, code })
                    .await;
            });

            Ok(pid)
        })
    }
}

/// Echo shell stdout and report readiness on the first matching line.
fn spawn_ready_monitor(
    instance: InstanceId,
    stdout: ChildStdout,
    pattern: Regex,
    events: mpsc::Sender<SupervisorEvent>,
) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stdout).lines();
        let mut echo = tokio::io::stdout();
        let mut ready = false;

        while let Ok(Some(line)) = lines.next_line().await {
            // A closed terminal must not stop readiness detection.
            let _ = echo.write_all(format!("{line}\n").as_bytes()).await;
            let _ = echo.flush().await;

            if !ready && pattern.is_match(&line) {
                ready = true;
                debug!(instance, "stdout matched ready_pattern");
                let _ = events.send(SupervisorEvent::ProcessReady { instance }).await;
            }
        }

        debug!(instance, "shell stdout closed");
    });
}
