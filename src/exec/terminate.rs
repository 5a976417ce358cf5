// src/exec/terminate.rs

//! Graceful termination of child processes.
//!
//! A cooperative signal first, then a forced kill once the grace period has
//! elapsed. Elapsing the grace period is logged as a warning only; it is not
//! an error for the session.

use std::io;
use std::time::Duration;

use tokio::process::Child;
use tokio::time::timeout;
use tracing::{debug, warn};

#[cfg(unix)]
use nix::errno::Errno;
#[cfg(unix)]
use nix::sys::signal::{Signal, killpg};
#[cfg(unix)]
use nix::unistd::Pid;

/// Ask `child` to exit and wait for it, killing it after `grace`.
///
/// Returns the exit code, or `None` if the process ended by signal.
pub async fn terminate_gracefully(
    child: &mut Child,
    grace: Duration,
    label: &str,
) -> io::Result<Option<i32>> {
    if let Some(status) = child.try_wait()? {
        debug!(label, "process already exited before termination");
        return Ok(status.code());
    }

    request_exit(child)?;

    match timeout(grace, child.wait()).await {
        Ok(status) => Ok(status?.code()),
        Err(_elapsed) => {
            warn!(
                label,
                grace_ms = grace.as_millis() as u64,
                "grace period elapsed; killing process"
            );
            force_kill(child)?;
            Ok(child.wait().await?.code())
        }
    }
}

/// Send SIGTERM to the child's process group.
#[cfg(unix)]
fn request_exit(child: &mut Child) -> io::Result<()> {
    let Some(pid) = child.id() else {
        return Ok(());
    };
    signal_group(pid, Signal::SIGTERM)
}

#[cfg(not(unix))]
fn request_exit(child: &mut Child) -> io::Result<()> {
    child.start_kill()
}

#[cfg(unix)]
fn force_kill(child: &mut Child) -> io::Result<()> {
    if let Some(pid) = child.id() {
        signal_group(pid, Signal::SIGKILL)?;
    }
    child.start_kill().or_else(|e| {
        // The group kill may already have reaped it.
        if e.kind() == io::ErrorKind::InvalidInput {
            Ok(())
        } else {
            Err(e)
        }
    })
}

#[cfg(not(unix))]
fn force_kill(child: &mut Child) -> io::Result<()> {
    child.start_kill()
}

/// Children are spawned as process-group leaders (see
/// [`CommandSpec::to_command`](crate::exec::CommandSpec::to_command)), so the
/// group id equals the pid.
#[cfg(unix)]
fn signal_group(pid: u32, signal: Signal) -> io::Result<()> {
    let pgid = i32::try_from(pid)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))?;

    match killpg(Pid::from_raw(pgid), signal) {
        Ok(()) => Ok(()),
        // Group already gone.
        Err(Errno::ESRCH) => Ok(()),
        Err(errno) => Err(io::Error::from(errno)),
    }
}
