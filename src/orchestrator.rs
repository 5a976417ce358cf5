// src/orchestrator.rs

//! Serve session wiring.
//!
//! Start-up runs in a fixed order: prepare output directories, one compile
//! pass (compiled sources only), front-end build watcher, file watch
//! subscriptions, shell process. The shutdown signal is honoured from the
//! compile pass on. After start-up the session waits for either the shutdown
//! signal or the death of the front-end watcher.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::ServeConfig;
use crate::errors::{Result, ServeError};
use crate::exec::{FrontendBuildWatcher, FrontendHandle, NativeSourceCompiler, spawn_compile_loop};
use crate::fs::{FileSystem, RealFileSystem, prepare_output_dirs};
use crate::supervisor::{
    ProcessLauncher, ProcessSupervisor, ShellLauncher, SupervisorClient, SupervisorCore,
    SupervisorHandle, SupervisorReport,
};
use crate::types::ChangeBatch;
use crate::watch::path_utils::summarize_paths;
use crate::watch::{WatchHandle, WatchOptions, watch};

const LOGGED_PATHS: usize = 5;

/// Reason attached to restart requests coming from the file watcher.
pub const FILE_CHANGE_REASON: &str = "files changed";

/// One development session over a resolved [`ServeConfig`].
#[derive(Debug)]
pub struct Session<L: ProcessLauncher = ShellLauncher> {
    config: ServeConfig,
    launcher: L,
    fs: Arc<dyn FileSystem>,
}

impl Session<ShellLauncher> {
    pub fn new(config: ServeConfig) -> Self {
        let launcher = ShellLauncher::from_config(&config);
        Self {
            config,
            launcher,
            fs: Arc::new(RealFileSystem),
        }
    }
}

impl<L: ProcessLauncher + 'static> Session<L> {
    /// Replace how shell processes are launched.
    pub fn with_launcher<M: ProcessLauncher>(self, launcher: M) -> Session<M> {
        Session {
            config: self.config,
            launcher,
            fs: self.fs,
        }
    }

    pub fn with_file_system(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.fs = fs;
        self
    }

    pub fn config(&self) -> &ServeConfig {
        &self.config
    }

    /// Run the session until `shutdown` resolves or the front-end watcher
    /// exits.
    ///
    /// Returns the supervisor's final report on a requested shutdown and
    /// [`ServeError::FrontendExited`] if the front-end watcher died first. In
    /// both cases the shell process has been stopped before this returns.
    pub async fn run_until<F>(self, shutdown: F) -> Result<SupervisorReport>
    where
        F: Future<Output = ()>,
    {
        let Session {
            config,
            launcher,
            fs,
        } = self;
        tokio::pin!(shutdown);

        let prepared = prepare_output_dirs(fs.as_ref(), &config.output_dirs(), config.fresh())?;
        debug!(?prepared, "output directories ready");

        let compiler = if config.source_language().is_compiled() {
            let compiler = NativeSourceCompiler::from_config(&config);
            match compiler.compile_until(&[], shutdown.as_mut()).await {
                Some(result) if !result.success => {
                    warn!("initial native compile failed; starting with existing output");
                }
                Some(_) => {}
                None => {
                    info!("shutdown requested during initial compile; nothing was started");
                    return Ok(SupervisorReport::default());
                }
            }
            Some(compiler)
        } else {
            None
        };

        let mut frontend = FrontendBuildWatcher::from_config(&config)
            .start(config.active_project(), config.frontend_output_dir())?;

        let supervisor =
            ProcessSupervisor::new(SupervisorCore::from_config(&config), launcher).spawn();

        let background = match start_watchers(&config, compiler, supervisor.client()) {
            Ok(background) => background,
            Err(err) => {
                teardown(supervisor, frontend).await;
                return Err(err);
            }
        };

        if let Err(err) = supervisor.client().start().await {
            drop(background);
            teardown(supervisor, frontend).await;
            return Err(err);
        }

        info!(
            project = config.active_project(),
            language = %config.source_language(),
            "serve session running; press Ctrl-C to stop"
        );

        tokio::select! {
            biased;
            _ = &mut shutdown => {
                info!("shutdown requested; stopping serve session");
                drop(background);
                let report = supervisor.stop().await?;
                if let Err(e) = frontend.shutdown().await {
                    warn!(error = %e, "failed to stop front-end build watcher cleanly");
                }
                Ok(report)
            }
            exited = frontend.wait_for_exit() => {
                let code = match exited {
                    Ok(code) => code,
                    Err(e) => {
                        warn!(error = %e, "lost track of front-end build watcher");
                        None
                    }
                };
                error!(exit_code = ?code, "front-end build watcher exited; ending serve session");
                drop(background);
                if let Err(e) = supervisor.stop().await {
                    warn!(error = %e, "failed to stop shell process cleanly");
                }
                Err(ServeError::FrontendExited { code })
            }
        }
    }
}

/// Watch subscriptions and the tasks consuming them; dropping this stops
/// all of them.
struct Background {
    _watches: Vec<WatchHandle>,
    tasks: Vec<JoinHandle<()>>,
}

impl Drop for Background {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

fn start_watchers(
    config: &ServeConfig,
    compiler: Option<NativeSourceCompiler>,
    client: SupervisorClient,
) -> Result<Background> {
    let mut watches = Vec::new();
    let mut tasks = Vec::new();

    if let Some(compiler) = compiler {
        let (handle, batches) = watch(
            &[config.native_source_dir().to_path_buf()],
            WatchOptions {
                label: "compile",
                debounce: config.compile_debounce(),
                ignore: config.ignore().clone(),
            },
        )?;
        watches.push(handle);
        tasks.push(spawn_compile_loop(compiler, batches, None));
    }

    let (handle, batches) = watch(
        &config.restart_roots(),
        WatchOptions {
            label: "restart",
            debounce: config.restart_debounce(),
            ignore: config.ignore().clone(),
        },
    )?;
    watches.push(handle);
    tasks.push(spawn_restart_forwarder(
        config.project_root().to_path_buf(),
        batches,
        client,
    ));

    Ok(Background {
        _watches: watches,
        tasks,
    })
}

/// Turn settled output/source changes into restart requests.
fn spawn_restart_forwarder(
    project_root: PathBuf,
    mut batches: mpsc::Receiver<ChangeBatch>,
    client: SupervisorClient,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(batch) = batches.recv().await {
            let files = batch.into_paths();
            info!(
                files = %summarize_paths(&project_root, &files, LOGGED_PATHS),
                "change detected; scheduling shell restart"
            );
            if client.request_restart(FILE_CHANGE_REASON, files).await.is_err() {
                debug!("supervisor gone; restart forwarder exiting");
                break;
            }
        }
    })
}

async fn teardown(supervisor: SupervisorHandle, frontend: FrontendHandle) {
    if let Err(e) = supervisor.stop().await {
        warn!(error = %e, "failed to stop shell process cleanly");
    }
    if let Err(e) = frontend.shutdown().await {
        warn!(error = %e, "failed to stop front-end build watcher cleanly");
    }
}
