// src/exec/frontend.rs

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use anyhow::Context;
use tokio::process::Child;
use tracing::info;

use crate::config::ServeConfig;
use crate::errors::Result;
use crate::exec::command::CommandSpec;
use crate::exec::terminate::terminate_gracefully;
use crate::watch::path_utils::relative_str;

/// Launches the front-end toolchain in watch mode.
///
/// The toolchain rebuilds on its own; this side only spawns it and watches
/// for it dying. Its output goes straight to the terminal.
#[derive(Debug, Clone)]
pub struct FrontendBuildWatcher {
    base: CommandSpec,
    cwd: PathBuf,
    configuration: String,
    grace: Duration,
}

impl FrontendBuildWatcher {
    pub fn new(
        base: CommandSpec,
        cwd: impl Into<PathBuf>,
        configuration: impl Into<String>,
        grace: Duration,
    ) -> Self {
        Self {
            base,
            cwd: cwd.into(),
            configuration: configuration.into(),
            grace,
        }
    }

    pub fn from_config(config: &ServeConfig) -> Self {
        Self::new(
            config.frontend_command().clone(),
            config.project_root(),
            config.build_configuration(),
            config.grace_period(),
        )
    }

    /// Full command line for building `project` into `output_dir`.
    pub fn command_for(&self, project: &str, output_dir: &Path) -> CommandSpec {
        let output = relative_str(&self.cwd, output_dir)
            .filter(|rel| !rel.is_empty())
            .unwrap_or_else(|| output_dir.display().to_string());

        self.base
            .clone()
            .arg(project)
            .arg("--watch")
            .args(["--output-path".to_string(), output])
            .args(["--configuration", self.configuration.as_str()])
    }

    /// Spawn the long-lived build watcher.
    pub fn start(&self, project: &str, output_dir: &Path) -> Result<FrontendHandle> {
        let command = self.command_for(project, output_dir);

        let mut cmd = command.to_command(&self.cwd);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        let child = cmd
            .spawn()
            .with_context(|| format!("spawning front-end build watcher `{command}`"))?;

        info!(pid = ?child.id(), project, cmd = %command, "front-end build watcher started");

        Ok(FrontendHandle {
            child,
            grace: self.grace,
        })
    }
}

/// A running front-end build watcher. Dropping it kills the process.
#[derive(Debug)]
pub struct FrontendHandle {
    child: Child,
    grace: Duration,
}

impl FrontendHandle {
    /// Resolves when the process exits, with its exit code.
    ///
    /// Cancel-safe, so it can sit in a `select!` next to the shutdown signal.
    pub async fn wait_for_exit(&mut self) -> Result<Option<i32>> {
        let status = self
            .child
            .wait()
            .await
            .context("waiting for front-end build watcher")?;
        Ok(status.code())
    }

    /// Terminate gracefully, killing after the grace period.
    pub async fn shutdown(mut self) -> Result<Option<i32>> {
        let code = terminate_gracefully(&mut self.child, self.grace, "frontend").await?;
        info!(exit_code = ?code, "front-end build watcher stopped");
        Ok(code)
    }
}
