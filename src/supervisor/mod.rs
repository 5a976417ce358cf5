// src/supervisor/mod.rs

//! Lifecycle management of the native shell process.
//!
//! The state machine lives in [`core`] as a synchronous, deterministic
//! `SupervisorCore` consuming [`SupervisorEvent`]s and returning
//! [`SupervisorCommand`]s. The async shell in [`runtime`] executes those
//! commands (spawning through a [`ProcessLauncher`], arming timers, sending
//! termination) and feeds the results back as events.

use std::path::PathBuf;
use std::time::Duration;

use tokio::time::Instant;

pub mod core;
pub mod launcher;
pub mod runtime;

pub use self::core::{SupervisorCore, TRANSITION_HISTORY};
pub use launcher::{LaunchSpec, ProcessLauncher, ShellLauncher};
pub use runtime::{ProcessSupervisor, SupervisorClient, SupervisorHandle, SupervisorReport};

/// Sequence number of one shell process spawn.
pub type InstanceId = u64;

/// Lifecycle state of the supervised shell process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SupervisorState {
    Stopped,
    Starting,
    Running,
    Restarting,
    Crashed,
}

impl SupervisorState {
    pub fn label(self) -> &'static str {
        match self {
            SupervisorState::Stopped => "stopped",
            SupervisorState::Starting => "starting",
            SupervisorState::Running => "running",
            SupervisorState::Restarting => "restarting",
            SupervisorState::Crashed => "crashed",
        }
    }
}

/// Snapshot of the supervised process, published after every event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisedProcess {
    pub state: SupervisorState,
    pub pid: Option<u32>,
    pub started_at: Option<Instant>,
    /// Exit code of the most recent instance that ended.
    pub exit_code: Option<i32>,
    /// Instance the snapshot refers to; `None` before the first spawn.
    pub instance: Option<InstanceId>,
}

impl Default for SupervisedProcess {
    fn default() -> Self {
        Self {
            state: SupervisorState::Stopped,
            pid: None,
            started_at: None,
            exit_code: None,
            instance: None,
        }
    }
}

/// Inputs to the supervisor state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorEvent {
    Start,
    RestartRequested {
        reason: String,
        files: Vec<PathBuf>,
    },
    RestartTimerFired {
        generation: u64,
    },
    ProcessSpawned {
        instance: InstanceId,
        pid: Option<u32>,
        at: Instant,
    },
    SpawnFailed {
        instance: InstanceId,
        error: String,
    },
    /// A stdout line matched the readiness pattern.
    ProcessReady {
        instance: InstanceId,
    },
    ProcessExited {
        instance: InstanceId,
        code: Option<i32>,
    },
    StopRequested,
}

/// What the async shell should do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorCommand {
    Spawn { instance: InstanceId },
    /// Arm (or re-arm, replacing any pending timer) the restart timer.
    ArmTimer { generation: u64, delay: Duration },
    CancelTimer,
    Terminate { instance: InstanceId },
    /// Nothing is left running after a stop; the shell loop can exit.
    Finish,
}

/// One entry of the transition log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: SupervisorState,
    pub to: SupervisorState,
    pub instance: Option<InstanceId>,
}
