use std::path::Path;

use crate::checkpoint::CheckpointHyperparameters;
use crate::sim::Observation;

/// One step of experience: `observation --action--> next_observation`.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub observation: Observation,
    pub action: usize,
    pub next_observation: Observation,
    pub reward: f32,
    pub done: bool,
}

impl Transition {
    /// Build a transition, computing its reward once from the shaping
    /// function. `done` follows the terminal flag of `next_observation`.
    pub fn new(
        observation: Observation,
        action: usize,
        next_observation: Observation,
        reward: impl FnOnce(&Observation, usize, &Observation) -> f32,
    ) -> Self {
        let reward = reward(&observation, action, &next_observation);
        let done = next_observation.is_terminal();
        Transition {
            observation,
            action,
            next_observation,
            reward,
            done,
        }
    }
}

/// Metrics returned from a training update.
#[derive(Debug, Clone, Default)]
pub struct UpdateMetrics {
    pub loss: f32,
    /// Number of transitions the update was computed from.
    pub samples: usize,
}

/// Universal interface for all agents.
pub trait Agent {
    /// Select an action index given the current observation.
    /// When `training` is true, the agent may explore; otherwise it exploits.
    fn select_action(&mut self, observation: &Observation, training: bool) -> usize;

    /// Return the agent's display name.
    fn name(&self) -> &str;

    /// Update the agent from a batch of transitions. Returns training metrics.
    fn train_batch(&mut self, _batch: &[Transition]) -> UpdateMetrics {
        UpdateMetrics::default()
    }

    /// Called once after every finished training episode.
    fn end_episode(&mut self) {}
}

impl<A: Agent + ?Sized> Agent for Box<A> {
    fn select_action(&mut self, observation: &Observation, training: bool) -> usize {
        (**self).select_action(observation, training)
    }

    fn name(&self) -> &str {
        (**self).name()
    }

    fn train_batch(&mut self, batch: &[Transition]) -> UpdateMetrics {
        (**self).train_batch(batch)
    }

    fn end_episode(&mut self) {
        (**self).end_episode()
    }
}

/// Extension trait for agents that support the full training lifecycle.
pub trait TrainableAgent: Agent {
    /// Algorithm name for logging and checkpoint metadata ("DQN", "Random").
    fn algorithm_name(&self) -> &str;
    /// Current training step count.
    fn step_count(&self) -> usize;
    /// Save network weights to a directory.
    fn save_weights_to_dir(&self, dir: &Path) -> Result<(), Box<dyn std::error::Error>>;
    /// Load network weights previously written by `save_weights_to_dir`.
    fn load_weights_from_dir(&mut self, dir: &Path) -> Result<(), Box<dyn std::error::Error>>;
    /// Serialize training state to JSON.
    fn training_state_json(&self) -> String;
    /// Restore training state from `training_state_json` output.
    fn restore_training_state_json(&mut self, json: &str) -> Result<(), Box<dyn std::error::Error>>;
    /// Hyperparameters recorded in checkpoint metadata, if the agent has any.
    fn hyperparameters(&self) -> Option<CheckpointHyperparameters> {
        None
    }
}

impl<A: TrainableAgent + ?Sized> TrainableAgent for Box<A> {
    fn algorithm_name(&self) -> &str {
        (**self).algorithm_name()
    }

    fn step_count(&self) -> usize {
        (**self).step_count()
    }

    fn save_weights_to_dir(&self, dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
        (**self).save_weights_to_dir(dir)
    }

    fn load_weights_from_dir(&mut self, dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
        (**self).load_weights_from_dir(dir)
    }

    fn training_state_json(&self) -> String {
        (**self).training_state_json()
    }

    fn restore_training_state_json(&mut self, json: &str) -> Result<(), Box<dyn std::error::Error>> {
        (**self).restore_training_state_json(json)
    }

    fn hyperparameters(&self) -> Option<CheckpointHyperparameters> {
        (**self).hyperparameters()
    }
}
