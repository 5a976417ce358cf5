// src/supervisor/core.rs

//! Pure supervisor state machine.
//!
//! `SupervisorCore` consumes [`SupervisorEvent`]s and returns the
//! [`SupervisorCommand`]s the async shell must carry out. It owns no
//! channels, timers or processes, so every lifecycle rule can be exercised
//! synchronously.
//!
//! Rules in short:
//! - At most one instance is live (spawn issued, exit not yet observed).
//!   A new `Spawn` is only issued once the previous instance has exited.
//! - Restart requests arm a timer; later requests re-arm it (generation
//!   counting), so a burst yields one restart. Requests during `Restarting`
//!   are folded into the restart already under way.
//! - An exit is "expected" only if the core asked for termination; any other
//!   exit of a running process is a crash and respawns immediately.
//! - Stop wins over everything and is terminal.

use std::path::PathBuf;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::ServeConfig;
use crate::watch::path_utils::join_limited;

use super::{
    InstanceId, SupervisedProcess, SupervisorCommand, SupervisorEvent, SupervisorState,
    Transition,
};

/// How many changed files a restart log line lists.
const LOGGED_FILES: usize = 5;

/// Transition history bound; the oldest half is dropped once reached.
pub const TRANSITION_HISTORY: usize = 512;

#[derive(Debug)]
pub struct SupervisorCore {
    restart_delay: Duration,
    await_readiness: bool,

    process: SupervisedProcess,
    transitions: Vec<Transition>,

    next_instance: InstanceId,
    /// Instance whose spawn was issued and whose exit has not been seen.
    live: Option<InstanceId>,
    /// Set right before termination is requested; consumed by the next exit.
    expected_exit: bool,

    timer_generation: u64,
    timer_armed: bool,
    pending_reason: Option<String>,
    pending_files: Vec<PathBuf>,

    stopping: bool,
    finished: bool,
}

impl SupervisorCore {
    /// `await_readiness`: stay `Starting` until a `ProcessReady` arrives
    /// instead of moving to `Running` right after spawn.
    pub fn new(restart_delay: Duration, await_readiness: bool) -> Self {
        Self {
            restart_delay,
            await_readiness,
            process: SupervisedProcess::default(),
            transitions: Vec::new(),
            next_instance: 1,
            live: None,
            expected_exit: false,
            timer_generation: 0,
            timer_armed: false,
            pending_reason: None,
            pending_files: Vec::new(),
            stopping: false,
            finished: false,
        }
    }

    pub fn from_config(config: &ServeConfig) -> Self {
        Self::new(config.restart_delay(), config.ready_pattern().is_some())
    }

    pub fn state(&self) -> SupervisorState {
        self.process.state
    }

    pub fn process(&self) -> &SupervisedProcess {
        &self.process
    }

    /// Recent state changes, oldest first. At most [`TRANSITION_HISTORY`]
    /// are kept.
    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    pub fn live_instance(&self) -> Option<InstanceId> {
        self.live
    }

    pub fn restart_pending(&self) -> bool {
        self.timer_armed
    }

    /// True once a stop has completed and nothing is left running.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Handle a single event, returning the commands for the IO shell.
    pub fn step(&mut self, event: SupervisorEvent) -> Vec<SupervisorCommand> {
        if self.finished {
            debug!(?event, "supervisor finished; ignoring event");
            return Vec::new();
        }

        match event {
            SupervisorEvent::Start => self.on_start(),
            SupervisorEvent::RestartRequested { reason, files } => {
                self.on_restart_requested(reason, files)
            }
            SupervisorEvent::RestartTimerFired { generation } => self.on_timer_fired(generation),
            SupervisorEvent::ProcessSpawned { instance, pid, at } => {
                self.on_spawned(instance, pid, at)
            }
            SupervisorEvent::SpawnFailed { instance, error } => self.on_spawn_failed(instance, error),
            SupervisorEvent::ProcessReady { instance } => self.on_ready(instance),
            SupervisorEvent::ProcessExited { instance, code } => self.on_exited(instance, code),
            SupervisorEvent::StopRequested => self.on_stop(),
        }
    }

    fn on_start(&mut self) -> Vec<SupervisorCommand> {
        if self.stopping || self.state() != SupervisorState::Stopped || self.live.is_some() {
            debug!(state = self.state().label(), "start ignored; shell already started");
            return Vec::new();
        }
        vec![self.spawn_next()]
    }

    fn on_restart_requested(
        &mut self,
        reason: String,
        files: Vec<PathBuf>,
    ) -> Vec<SupervisorCommand> {
        if self.stopping {
            return Vec::new();
        }

        match self.state() {
            SupervisorState::Running | SupervisorState::Starting | SupervisorState::Crashed => {
                self.timer_generation += 1;
                self.timer_armed = true;
                debug!(
                    reason = %reason,
                    files = files.len(),
                    delay_ms = self.restart_delay.as_millis() as u64,
                    "restart requested; (re)arming restart timer"
                );
                self.pending_reason = Some(reason);
                self.pending_files = files;
                vec![SupervisorCommand::ArmTimer {
                    generation: self.timer_generation,
                    delay: self.restart_delay,
                }]
            }
            SupervisorState::Restarting => {
                debug!(
                    reason = %reason,
                    files = files.len(),
                    "restart already in progress; coalescing request"
                );
                self.pending_reason = Some(reason);
                self.pending_files = files;
                Vec::new()
            }
            SupervisorState::Stopped => {
                debug!(reason = %reason, "restart requested before start; ignoring");
                Vec::new()
            }
        }
    }

    fn on_timer_fired(&mut self, generation: u64) -> Vec<SupervisorCommand> {
        if !self.timer_armed || generation != self.timer_generation {
            debug!(generation, current = self.timer_generation, "stale restart timer ignored");
            return Vec::new();
        }
        self.timer_armed = false;

        let reason = self.pending_reason.take().unwrap_or_else(|| "change".to_string());
        let files = std::mem::take(&mut self.pending_files);

        match (self.state(), self.live) {
            (SupervisorState::Running | SupervisorState::Starting, Some(instance)) => {
                info!(
                    instance,
                    reason = %reason,
                    files = %describe_files(&files),
                    "restarting shell process"
                );
                self.transition(SupervisorState::Restarting);
                self.expected_exit = true;
                vec![SupervisorCommand::Terminate { instance }]
            }
            (SupervisorState::Crashed, None) => {
                info!(
                    reason = %reason,
                    files = %describe_files(&files),
                    "retrying shell process start"
                );
                vec![self.spawn_next()]
            }
            (state, live) => {
                debug!(state = state.label(), ?live, "restart timer fired in unexpected state");
                Vec::new()
            }
        }
    }

    fn on_spawned(
        &mut self,
        instance: InstanceId,
        pid: Option<u32>,
        at: tokio::time::Instant,
    ) -> Vec<SupervisorCommand> {
        if self.live != Some(instance) {
            debug!(instance, "spawn report for stale instance ignored");
            return Vec::new();
        }

        self.process.pid = pid;
        self.process.started_at = Some(at);
        info!(instance, pid = ?pid, "shell process spawned");

        if self.state() == SupervisorState::Starting && !self.await_readiness {
            self.transition(SupervisorState::Running);
        }
        Vec::new()
    }

    fn on_spawn_failed(&mut self, instance: InstanceId, error: String) -> Vec<SupervisorCommand> {
        if self.live != Some(instance) {
            return Vec::new();
        }
        self.live = None;
        self.process.pid = None;
        self.expected_exit = false;

        warn!(instance, error = %error, "shell process failed to start");

        if self.stopping {
            self.finished = true;
            return vec![SupervisorCommand::Finish];
        }

        // No automatic retry; the next restart request tries again.
        self.transition(SupervisorState::Crashed);
        Vec::new()
    }

    fn on_ready(&mut self, instance: InstanceId) -> Vec<SupervisorCommand> {
        if self.live == Some(instance) && self.state() == SupervisorState::Starting {
            info!(instance, "shell process reported ready");
            self.transition(SupervisorState::Running);
        }
        Vec::new()
    }

    fn on_exited(&mut self, instance: InstanceId, code: Option<i32>) -> Vec<SupervisorCommand> {
        if self.live != Some(instance) {
            debug!(instance, exit_code = ?code, "exit of stale instance ignored");
            return Vec::new();
        }
        self.live = None;
        self.process.pid = None;
        self.process.exit_code = code;
        let expected = std::mem::take(&mut self.expected_exit);

        if self.stopping {
            info!(instance, exit_code = ?code, "shell process exited after stop");
            self.finished = true;
            return vec![SupervisorCommand::Finish];
        }

        if expected {
            debug!(instance, exit_code = ?code, "shell process exited for restart");
            return vec![self.spawn_next()];
        }

        let was = self.state();
        warn!(instance, exit_code = ?code, state = was.label(), "shell process crashed");
        self.transition(SupervisorState::Crashed);

        let mut commands = Vec::new();
        if self.timer_armed {
            // The fresh process picks up every change anyway.
            self.timer_armed = false;
            self.pending_reason = None;
            self.pending_files.clear();
            commands.push(SupervisorCommand::CancelTimer);
        }

        if was == SupervisorState::Running {
            commands.push(self.spawn_next());
        } else {
            // Died before signalling readiness; wait for the next change
            // rather than respawning in a tight loop.
            info!(instance, "shell process died while starting; waiting for the next change");
        }
        commands
    }

    fn on_stop(&mut self) -> Vec<SupervisorCommand> {
        if self.stopping {
            return Vec::new();
        }
        self.stopping = true;

        let mut commands = Vec::new();
        if self.timer_armed {
            self.timer_armed = false;
            commands.push(SupervisorCommand::CancelTimer);
        }

        self.transition(SupervisorState::Stopped);

        match self.live {
            Some(instance) => {
                info!(instance, "stopping shell process");
                self.expected_exit = true;
                commands.push(SupervisorCommand::Terminate { instance });
            }
            None => {
                self.finished = true;
                commands.push(SupervisorCommand::Finish);
            }
        }
        commands
    }

    fn spawn_next(&mut self) -> SupervisorCommand {
        let instance = self.next_instance;
        self.next_instance += 1;
        self.live = Some(instance);
        self.process.instance = Some(instance);
        self.process.pid = None;
        self.process.started_at = None;
        self.transition(SupervisorState::Starting);
        SupervisorCommand::Spawn { instance }
    }

    fn transition(&mut self, to: SupervisorState) {
        let from = self.process.state;
        if from == to {
            return;
        }
        self.process.state = to;
        let instance = self.process.instance;
        if self.transitions.len() >= TRANSITION_HISTORY {
            self.transitions.drain(..TRANSITION_HISTORY / 2);
        }
        self.transitions.push(Transition { from, to, instance });
        info!(
            from = from.label(),
            to = to.label(),
            instance = ?instance,
            "shell process state changed"
        );
    }
}

fn describe_files(files: &[PathBuf]) -> String {
    join_limited(files.iter().map(|p| p.display().to_string()), LOGGED_FILES)
}
