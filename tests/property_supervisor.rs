// tests/property_supervisor.rs

use std::collections::HashSet;
use std::time::Duration;

use proptest::prelude::*;
use tokio::time::Instant;

use ngshell::supervisor::{
    InstanceId, SupervisorCommand, SupervisorCore, SupervisorEvent, SupervisorState,
};

/// What the outside world does next in the simulation.
#[derive(Debug, Clone)]
enum Action {
    RequestRestart,
    FireLatestTimer,
    FireStaleTimer,
    CrashLive,
    ReadyLive,
    FailNextSpawn,
    Stop,
}

fn action_strategy() -> impl Strategy<Value = Action> {
    prop_oneof![
        4 => Just(Action::RequestRestart),
        3 => Just(Action::FireLatestTimer),
        1 => Just(Action::FireStaleTimer),
        2 => Just(Action::CrashLive),
        1 => Just(Action::ReadyLive),
        1 => Just(Action::FailNextSpawn),
        1 => Just(Action::Stop),
    ]
}

/// Synchronous stand-in for the async runtime: spawns succeed (or fail when
/// asked), terminations exit the process immediately.
struct Sim {
    core: SupervisorCore,
    alive: HashSet<InstanceId>,
    armed: Option<u64>,
    fail_next: bool,
    spawns: usize,
    finished: bool,
}

impl Sim {
    fn new(await_readiness: bool) -> Self {
        Self {
            core: SupervisorCore::new(Duration::from_millis(2500), await_readiness),
            alive: HashSet::new(),
            armed: None,
            fail_next: false,
            spawns: 0,
            finished: false,
        }
    }

    fn feed(&mut self, event: SupervisorEvent) -> Result<(), TestCaseError> {
        let mut queue = vec![event];
        while let Some(event) = queue.pop() {
            for command in self.core.step(event) {
                match command {
                    SupervisorCommand::Spawn { instance } => {
                        prop_assert!(
                            self.alive.is_empty(),
                            "spawned {} while {:?} still alive",
                            instance,
                            self.alive
                        );
                        self.spawns += 1;
                        if std::mem::take(&mut self.fail_next) {
                            queue.push(SupervisorEvent::SpawnFailed {
                                instance,
                                error: "boom".to_string(),
                            });
                        } else {
                            self.alive.insert(instance);
                            queue.push(SupervisorEvent::ProcessSpawned {
                                instance,
                                pid: Some(instance as u32),
                                at: Instant::now(),
                            });
                        }
                    }
                    SupervisorCommand::ArmTimer { generation, .. } => self.armed = Some(generation),
                    SupervisorCommand::CancelTimer => self.armed = None,
                    SupervisorCommand::Terminate { instance } => {
                        prop_assert!(self.alive.remove(&instance));
                        queue.push(SupervisorEvent::ProcessExited {
                            instance,
                            code: None,
                        });
                    }
                    SupervisorCommand::Finish => self.finished = true,
                }
            }
            prop_assert!(self.alive.len() <= 1);
        }
        Ok(())
    }
}

proptest! {
    #[test]
    fn never_more_than_one_live_process(
        await_readiness in any::<bool>(),
        actions in proptest::collection::vec(action_strategy(), 1..60),
    ) {
        let mut sim = Sim::new(await_readiness);
        sim.feed(SupervisorEvent::Start)?;

        for action in actions {
            match action {
                Action::RequestRestart => sim.feed(SupervisorEvent::RestartRequested {
                    reason: "files changed".to_string(),
                    files: vec![],
                })?,
                Action::FireLatestTimer => {
                    if let Some(generation) = sim.armed.take() {
                        sim.feed(SupervisorEvent::RestartTimerFired { generation })?;
                    }
                }
                Action::FireStaleTimer => {
                    let before = sim.core.transitions().len();
                    if let Some(generation) = sim.armed {
                        if generation > 1 {
                            sim.feed(SupervisorEvent::RestartTimerFired { generation: generation - 1 })?;
                            prop_assert_eq!(sim.core.transitions().len(), before);
                        }
                    }
                }
                Action::CrashLive => {
                    if let Some(&instance) = sim.alive.iter().next() {
                        sim.alive.remove(&instance);
                        let was_running = sim.core.state() == SupervisorState::Running;
                        let spawns_before = sim.spawns;
                        sim.feed(SupervisorEvent::ProcessExited { instance, code: Some(1) })?;
                        if was_running && !sim.finished {
                            // Exactly one automatic respawn.
                            prop_assert_eq!(sim.spawns, spawns_before + 1);
                            prop_assert!(sim.armed.is_none());
                        }
                    }
                }
                Action::ReadyLive => {
                    if let Some(&instance) = sim.alive.iter().next() {
                        sim.feed(SupervisorEvent::ProcessReady { instance })?;
                    }
                }
                Action::FailNextSpawn => sim.fail_next = true,
                Action::Stop => {
                    sim.feed(SupervisorEvent::StopRequested)?;
                    prop_assert!(sim.finished);
                    prop_assert!(sim.alive.is_empty());
                    prop_assert_eq!(sim.core.state(), SupervisorState::Stopped);
                    prop_assert!(sim.armed.is_none());
                }
            }
        }

        // After a stop, nothing ever spawns again.
        if sim.finished {
            let spawns = sim.spawns;
            sim.feed(SupervisorEvent::Start)?;
            sim.feed(SupervisorEvent::RestartRequested { reason: "late".to_string(), files: vec![] })?;
            prop_assert_eq!(sim.spawns, spawns);
        }
    }
}
