//! # Arcade RL
//!
//! A reinforcement-learning harness around two small tick-based arcade
//! simulations. The simulation runs on its own scheduler thread; the trainer
//! drives it from a worker thread through a blocking step/reset bridge,
//! buffers experience in a replay ring and trains a DQN via the Burn ML
//! framework behind an epsilon-greedy exploration wrapper.
//!
//! ## Modules
//!
//! - [`sim`]: Simulation trait, breakout and lander games, observations
//! - [`bridge`]: Simulation host thread and the step/reset bridge
//! - [`ai`]: Agent traits, DQN, exploration wrapper and ε schedules
//! - [`training`]: Episode runner, replay buffer, epoch trainer, metrics
//! - [`checkpoint`]: Model persistence and versioning
//! - [`config`]: TOML configuration loading and validation
//! - [`logging`]: `tracing` subscriber setup
//! - [`error`]: Structured error types

#![recursion_limit = "256"]

pub mod ai;
pub mod bridge;
pub mod checkpoint;
pub mod config;
pub mod error;
pub mod logging;
pub mod sim;
pub mod training;
