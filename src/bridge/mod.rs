//! Cross-thread step/reset protocol between the trainer and a simulation.
//!
//! The simulation lives on the scheduler thread of a [`SimulationHost`]. A
//! [`StepBridge`] is the only way in: callers block until the scheduler has
//! executed their request and replied with the resulting [`Observation`].

mod host;

use std::fmt;
use std::sync::mpsc;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

pub use host::SimulationHost;
use host::Command;

use crate::error::BridgeError;
use crate::sim::{Observation, RewardFn};

/// Blocking, thread-safe handle to a hosted simulation.
///
/// At most one request is in flight at a time. Concurrent resets collapse:
/// callers arriving while a reset is pending share its single execution and
/// all receive the same snapshot.
pub struct StepBridge {
    commands: mpsc::Sender<Command>,
    admission: Mutex<()>,
    pending_reset: Mutex<Option<Arc<ResetLatch>>>,
    action_count: usize,
    reward: RewardFn,
    name: String,
}

impl StepBridge {
    fn new(
        commands: mpsc::Sender<Command>,
        action_count: usize,
        reward: RewardFn,
        name: String,
    ) -> Self {
        StepBridge {
            commands,
            admission: Mutex::new(()),
            pending_reset: Mutex::new(None),
            action_count,
            reward,
            name,
        }
    }

    /// Apply `action`, advance exactly one tick and return the snapshot taken
    /// right after it.
    ///
    /// # Panics
    /// If `action` is not in `0..action_count()`.
    pub fn step(&self, action: usize) -> Result<Observation, BridgeError> {
        assert!(
            action < self.action_count,
            "action {action} out of range for {} ({} actions)",
            self.name,
            self.action_count
        );
        let _slot = self.admission.lock();
        self.request(|reply| Command::Step { action, reply })
    }

    /// Return the simulation to its initial configuration.
    pub fn reset(&self) -> Result<Observation, BridgeError> {
        let (latch, leader) = {
            let mut pending = self.pending_reset.lock();
            match pending.as_ref() {
                Some(latch) => (Arc::clone(latch), false),
                None => {
                    let latch = Arc::new(ResetLatch::default());
                    *pending = Some(Arc::clone(&latch));
                    (latch, true)
                }
            }
        };
        if !leader {
            return latch.wait();
        }

        let result = {
            let _slot = self.admission.lock();
            self.request(|reply| Command::Reset { reply })
        };
        self.pending_reset.lock().take();
        latch.complete(result.clone());
        result
    }

    /// Snapshot of the current state. Does not advance or mutate anything.
    pub fn observe(&self) -> Result<Observation, BridgeError> {
        let _slot = self.admission.lock();
        self.request(|reply| Command::Observe { reply })
    }

    pub fn reward(&self, pre: &Observation, action: usize, post: &Observation) -> f32 {
        (self.reward)(pre, action, post)
    }

    pub fn action_count(&self) -> usize {
        self.action_count
    }

    pub fn simulation_name(&self) -> &str {
        &self.name
    }

    fn request(
        &self,
        command: impl FnOnce(host::Reply) -> Command,
    ) -> Result<Observation, BridgeError> {
        let (reply, response) = mpsc::sync_channel(1);
        self.commands
            .send(command(reply))
            .map_err(|_| BridgeError::Closed)?;
        response.recv().map_err(|_| BridgeError::Closed)?
    }
}

impl fmt::Debug for StepBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepBridge")
            .field("simulation", &self.name)
            .field("action_count", &self.action_count)
            .finish()
    }
}

/// One-shot broadcast of a reset result to every caller that joined it.
#[derive(Default)]
struct ResetLatch {
    result: Mutex<Option<Result<Observation, BridgeError>>>,
    done: Condvar,
}

impl ResetLatch {
    fn complete(&self, result: Result<Observation, BridgeError>) {
        *self.result.lock() = Some(result);
        self.done.notify_all();
    }

    fn wait(&self) -> Result<Observation, BridgeError> {
        let mut result = self.result.lock();
        loop {
            if let Some(result) = result.as_ref() {
                return result.clone();
            }
            self.done.wait(&mut result);
        }
    }
}
