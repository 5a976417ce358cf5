// src/supervisor/runtime.rs

use std::collections::VecDeque;
use std::fmt;
use std::path::PathBuf;

use anyhow::anyhow;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep};
use tracing::{debug, info};

use crate::errors::{Result, ServeError};

use super::core::SupervisorCore;
use super::launcher::ProcessLauncher;
use super::{InstanceId, SupervisedProcess, SupervisorCommand, SupervisorEvent, Transition};

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Final view of the supervisor once it has stopped. The default report
/// describes a supervisor that never started.
#[derive(Debug, Clone, Default)]
pub struct SupervisorReport {
    pub process: SupervisedProcess,
    pub transitions: Vec<Transition>,
}

/// Drives a [`SupervisorCore`] in response to `SupervisorEvent`s and
/// delegates process spawning to a [`ProcessLauncher`].
///
/// This is a pure IO shell around the core: it owns the event channel, the
/// restart timer task and the termination handle of the live instance.
pub struct ProcessSupervisor<L: ProcessLauncher> {
    core: SupervisorCore,
    launcher: L,
    events_tx: mpsc::Sender<SupervisorEvent>,
    events_rx: mpsc::Receiver<SupervisorEvent>,
    /// Events produced while executing commands; handled before the channel.
    follow_ups: VecDeque<SupervisorEvent>,
    timer: Option<JoinHandle<()>>,
    terminator: Option<(InstanceId, oneshot::Sender<()>)>,
    snapshot_tx: watch::Sender<SupervisedProcess>,
}

impl<L: ProcessLauncher> fmt::Debug for ProcessSupervisor<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessSupervisor")
            .field("core", &self.core)
            .finish_non_exhaustive()
    }
}

impl<L: ProcessLauncher + 'static> ProcessSupervisor<L> {
    pub fn new(core: SupervisorCore, launcher: L) -> Self {
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (snapshot_tx, _) = watch::channel(core.process().clone());
        Self {
            core,
            launcher,
            events_tx,
            events_rx,
            follow_ups: VecDeque::new(),
            timer: None,
            terminator: None,
            snapshot_tx,
        }
    }

    /// Run the supervisor loop on its own task.
    pub fn spawn(self) -> SupervisorHandle {
        let client = SupervisorClient {
            tx: self.events_tx.clone(),
        };
        let snapshots = self.snapshot_tx.subscribe();
        let task = tokio::spawn(self.run());
        SupervisorHandle {
            client,
            snapshots,
            task,
        }
    }

    async fn run(mut self) -> SupervisorReport {
        debug!("process supervisor started");

        loop {
            let event = match self.follow_ups.pop_front() {
                Some(event) => event,
                None => match self.events_rx.recv().await {
                    Some(event) => event,
                    // We hold a sender ourselves, so this only happens if
                    // the channel is torn down externally.
                    None => break,
                },
            };

            debug!(?event, "supervisor received event");

            let commands = self.core.step(event);
            for command in commands {
                self.execute(command).await;
            }

            self.snapshot_tx.send_replace(self.core.process().clone());

            if self.core.is_finished() {
                break;
            }
        }

        if let Some(timer) = self.timer.take() {
            timer.abort();
        }

        info!(state = self.core.state().label(), "process supervisor finished");

        SupervisorReport {
            process: self.core.process().clone(),
            transitions: self.core.transitions().to_vec(),
        }
    }

    async fn execute(&mut self, command: SupervisorCommand) {
        match command {
            SupervisorCommand::Spawn { instance } => {
                let (term_tx, term_rx) = oneshot::channel();
                match self
                    .launcher
                    .launch(instance, self.events_tx.clone(), term_rx)
                    .await
                {
                    Ok(pid) => {
                        self.terminator = Some((instance, term_tx));
                        self.follow_ups.push_back(SupervisorEvent::ProcessSpawned {
                            instance,
                            pid,
                            at: Instant::now(),
                        });
                    }
                    Err(err) => {
                        self.follow_ups.push_back(SupervisorEvent::SpawnFailed {
                            instance,
                            error: format!("{err:#}"),
                        });
                    }
                }
            }
            SupervisorCommand::ArmTimer { generation, delay } => {
                if let Some(previous) = self.timer.take() {
                    previous.abort();
                }
                let tx = self.events_tx.clone();
                self.timer = Some(tokio::spawn(async move {
                    sleep(delay).await;
                    let _ = tx.send(SupervisorEvent::RestartTimerFired { generation }).await;
                }));
            }
            SupervisorCommand::CancelTimer => {
                if let Some(timer) = self.timer.take() {
                    timer.abort();
                    debug!("restart timer cancelled");
                }
            }
            SupervisorCommand::Terminate { instance } => match self.terminator.take() {
                Some((live, tx)) if live == instance => {
                    let _ = tx.send(());
                }
                other => {
                    // Already signalled for this instance.
                    self.terminator = other;
                }
            },
            SupervisorCommand::Finish => {
                debug!("supervisor core finished");
            }
        }
    }
}

/// Cloneable sender side used by the watchers and the orchestrator.
#[derive(Debug, Clone)]
pub struct SupervisorClient {
    tx: mpsc::Sender<SupervisorEvent>,
}

impl SupervisorClient {
    /// Start the shell process (only honoured while `Stopped`).
    pub async fn start(&self) -> Result<()> {
        self.send(SupervisorEvent::Start).await
    }

    /// Ask for a debounced restart.
    pub async fn request_restart(&self, reason: impl Into<String>, files: Vec<PathBuf>) -> Result<()> {
        self.send(SupervisorEvent::RestartRequested {
            reason: reason.into(),
            files,
        })
        .await
    }

    async fn send(&self, event: SupervisorEvent) -> Result<()> {
        self.tx
            .send(event)
            .await
            .map_err(|_| ServeError::Other(anyhow!("process supervisor is no longer running")))
    }
}

/// Owner handle for a running supervisor.
#[derive(Debug)]
pub struct SupervisorHandle {
    client: SupervisorClient,
    snapshots: watch::Receiver<SupervisedProcess>,
    task: JoinHandle<SupervisorReport>,
}

impl SupervisorHandle {
    pub fn client(&self) -> SupervisorClient {
        self.client.clone()
    }

    /// Receiver of process snapshots, updated after every handled event.
    pub fn subscribe(&self) -> watch::Receiver<SupervisedProcess> {
        self.snapshots.clone()
    }

    pub fn snapshot(&self) -> SupervisedProcess {
        self.snapshots.borrow().clone()
    }

    /// Stop the supervisor: cancel any pending restart, terminate the live
    /// process and wait until it has exited.
    pub async fn stop(self) -> Result<SupervisorReport> {
        // An error here means the loop is already gone; the join reports why.
        let _ = self.client.tx.send(SupervisorEvent::StopRequested).await;
        let report = self
            .task
            .await
            .map_err(|e| ServeError::Other(anyhow!("process supervisor task failed: {e}")))?;
        Ok(report)
    }
}
