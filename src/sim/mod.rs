//! Simulations driven by the training harness.
//!
//! A [`Simulation`] is only ever touched by the thread of the
//! [`SimulationHost`](crate::bridge::SimulationHost) that owns it; everything
//! else sees it through [`Observation`] snapshots.

pub mod breakout;
pub mod lander;
mod observation;
#[cfg(test)]
pub(crate) mod testing;

pub use breakout::{Breakout, BreakoutAction, BreakoutConfig};
pub use lander::{Lander, LanderAction, LanderConfig};
pub use observation::Observation;

/// Reward shaping function: a pure function of (pre, action, post).
pub type RewardFn = fn(&Observation, usize, &Observation) -> f32;

/// A tick-based simulation with a closed, ordered set of discrete actions.
pub trait Simulation: Send + 'static {
    /// Display name for logging.
    fn name(&self) -> &str;

    /// Size of the action set. Actions are indices `0..action_count()`.
    fn action_count(&self) -> usize;

    /// Latch an input to take effect on the next tick.
    fn apply_input(&mut self, action: usize);

    /// Advance virtual time by one fixed increment.
    fn tick(&mut self);

    /// Return to the initial configuration without advancing time.
    fn reset_state(&mut self);

    fn is_terminal(&self) -> bool;

    fn snapshot_observation(&self) -> Observation;

    /// Reward for the transition `pre --action--> post`.
    fn reward(pre: &Observation, action: usize, post: &Observation) -> f32
    where
        Self: Sized;
}

/// Which game to train on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum GameKind {
    Breakout,
    Lander,
}

/// Simulation section of the application config.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub game: GameKind,
    pub seed: u64,
    pub breakout: BreakoutConfig,
    pub lander: LanderConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            game: GameKind::Breakout,
            seed: 7,
            breakout: BreakoutConfig::default(),
            lander: LanderConfig::default(),
        }
    }
}
