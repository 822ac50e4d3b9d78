use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, error, warn};

use super::StepBridge;
use crate::error::BridgeError;
use crate::sim::{Observation, Simulation};

pub(crate) type Reply = mpsc::SyncSender<Result<Observation, BridgeError>>;

/// Work submitted to the scheduler thread.
pub(crate) enum Command {
    Step { action: usize, reply: Reply },
    Reset { reply: Reply },
    Observe { reply: Reply },
    Shutdown,
}

/// Owns the scheduler thread, and through it the simulation.
///
/// Dropping the host stops the scheduler; bridges that outlive it fail every
/// request with [`BridgeError::Closed`].
pub struct SimulationHost {
    commands: mpsc::Sender<Command>,
    handle: Option<JoinHandle<()>>,
}

impl SimulationHost {
    pub fn spawn<S: Simulation>(sim: S) -> (SimulationHost, Arc<StepBridge>) {
        let (commands, queue) = mpsc::channel();
        let name = sim.name().to_string();
        let action_count = sim.action_count();

        let handle = thread::Builder::new()
            .name(format!("sim-{name}"))
            .spawn(move || Scheduler::new(sim).run(queue))
            .expect("failed to spawn simulation thread");

        let bridge = Arc::new(StepBridge::new(
            commands.clone(),
            action_count,
            S::reward,
            name,
        ));
        let host = SimulationHost {
            commands,
            handle: Some(handle),
        };
        (host, bridge)
    }

    /// Stop the scheduler and wait for it to exit. Commands queued behind the
    /// shutdown are dropped, which their callers observe as `Closed`.
    pub fn shutdown(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        let _ = self.commands.send(Command::Shutdown);
        if handle.join().is_err() {
            error!("simulation thread terminated abnormally");
        }
    }
}

impl Drop for SimulationHost {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// The scheduler loop: executes one command at a time in arrival order.
struct Scheduler<S> {
    sim: S,
    frame: u64,
    cached: Option<Observation>,
}

impl<S: Simulation> Scheduler<S> {
    fn new(sim: S) -> Self {
        Scheduler {
            sim,
            frame: 0,
            cached: None,
        }
    }

    fn run(mut self, queue: mpsc::Receiver<Command>) {
        debug!(simulation = self.sim.name(), "scheduler started");
        while let Ok(command) = queue.recv() {
            match command {
                Command::Step { action, reply } => {
                    let result = self.step(action);
                    let _ = reply.send(result);
                }
                Command::Reset { reply } => {
                    let result = self.reset();
                    let _ = reply.send(result);
                }
                Command::Observe { reply } => {
                    let result = self.snapshot("observe");
                    let _ = reply.send(result);
                }
                Command::Shutdown => break,
            }
        }
        debug!(
            simulation = self.sim.name(),
            frame = self.frame,
            "scheduler stopped"
        );
    }

    fn step(&mut self, action: usize) -> Result<Observation, BridgeError> {
        self.mutate("step", |sim| {
            sim.apply_input(action);
            sim.tick();
        })?;
        self.frame += 1;
        self.snapshot("step")
    }

    fn reset(&mut self) -> Result<Observation, BridgeError> {
        self.mutate("reset", |sim| sim.reset_state())?;
        self.snapshot("reset")
    }

    fn mutate(
        &mut self,
        operation: &'static str,
        f: impl FnOnce(&mut S),
    ) -> Result<(), BridgeError> {
        self.cached = None;
        let sim = &mut self.sim;
        panic::catch_unwind(AssertUnwindSafe(|| f(sim)))
            .map_err(|payload| self.fault(operation, payload))
    }

    fn snapshot(&mut self, operation: &'static str) -> Result<Observation, BridgeError> {
        if let Some(obs) = &self.cached {
            return Ok(obs.clone());
        }
        let sim = &self.sim;
        let obs = panic::catch_unwind(AssertUnwindSafe(|| sim.snapshot_observation()))
            .map_err(|payload| self.fault(operation, payload))?
            .at_frame(self.frame);
        self.cached = Some(obs.clone());
        Ok(obs)
    }

    fn fault(&self, operation: &'static str, payload: Box<dyn Any + Send>) -> BridgeError {
        let message = panic_message(payload.as_ref());
        warn!(
            simulation = self.sim.name(),
            operation,
            frame = self.frame,
            %message,
            "simulation panicked"
        );
        BridgeError::SimulationFault { operation, message }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
