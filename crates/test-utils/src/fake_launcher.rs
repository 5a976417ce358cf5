use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Result, anyhow};
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

use ngshell::supervisor::{InstanceId, ProcessLauncher, SupervisorEvent};

/// A fake launcher that:
/// - records every launch (instance and time)
/// - "exits" a process immediately when the supervisor terminates it
/// - lets the test crash the current process, mark it ready, or make the
///   next launch fail.
///
/// Clones share state, so keep one clone in the test and hand the other to
/// the supervisor.
#[derive(Debug, Clone, Default)]
pub struct FakeLauncher {
    state: Arc<Mutex<FakeState>>,
}

#[derive(Debug, Default)]
struct FakeState {
    launches: Vec<(InstanceId, Instant)>,
    terminations: Vec<InstanceId>,
    current: Option<(InstanceId, mpsc::Sender<SupervisorEvent>)>,
    fail_next: bool,
}

impl FakeLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn launch_count(&self) -> usize {
        self.lock().launches.len()
    }

    pub fn launched_instances(&self) -> Vec<InstanceId> {
        self.lock().launches.iter().map(|(id, _)| *id).collect()
    }

    pub fn launch_times(&self) -> Vec<Instant> {
        self.lock().launches.iter().map(|(_, at)| *at).collect()
    }

    /// Instances terminated on request, in order.
    pub fn terminated_instances(&self) -> Vec<InstanceId> {
        self.lock().terminations.clone()
    }

    pub fn termination_count(&self) -> usize {
        self.lock().terminations.len()
    }

    /// Make the next `launch` return an error (spawn failure).
    pub fn fail_next_launch(&self) {
        self.lock().fail_next = true;
    }

    /// Exit the most recently launched process on its own.
    pub async fn crash_current(&self, code: i32) {
        let current = self.lock().current.take();
        if let Some((instance, events)) = current {
            let _ = events
                .send(SupervisorEvent::ProcessExited {
                    instance,
                    code: Some(code),
                })
                .await;
        }
    }

    /// Report readiness for the most recently launched process.
    pub async fn ready_current(&self) {
        let current = self.lock().current.clone();
        if let Some((instance, events)) = current {
            let _ = events.send(SupervisorEvent::ProcessReady { instance }).await;
        }
    }
}

impl ProcessLauncher for FakeLauncher {
    fn launch(
        &mut self,
        instance: InstanceId,
        events: mpsc::Sender<SupervisorEvent>,
        terminate: oneshot::Receiver<()>,
    ) -> Pin<Box<dyn Future<Output = Result<Option<u32>>> + Send + '_>> {
        let state = Arc::clone(&self.state);

        Box::pin(async move {
            {
                let mut guard = state.lock().unwrap();
                guard.launches.push((instance, Instant::now()));
                if guard.fail_next {
                    guard.fail_next = false;
                    return Err(anyhow!("fake launch failure for instance {instance}"));
                }
                guard.current = Some((instance, events.clone()));
            }

            let state = Arc::clone(&state);
            tokio::spawn(async move {
                // A dropped sender (instance replaced) is not a termination.
                if terminate.await.is_ok() {
                    {
                        let mut guard = state.lock().unwrap();
                        guard.terminations.push(instance);
                        if matches!(guard.current, Some((id, _)) if id == instance) {
                            guard.current = None;
                        }
                    }
                    let _ = events
                        .send(SupervisorEvent::ProcessExited {
                            instance,
                            code: None,
                        })
                        .await;
                }
            });

            Ok(Some(1000 + instance as u32))
        })
    }
}
