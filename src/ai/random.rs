use std::path::Path;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::agent::{Agent, TrainableAgent};
use crate::sim::Observation;

/// An agent that selects uniformly at random from the action set.
pub struct RandomAgent {
    action_count: usize,
    rng: StdRng,
}

impl RandomAgent {
    pub fn new(action_count: usize) -> Self {
        assert!(action_count > 0, "action set must not be empty");
        RandomAgent {
            action_count,
            rng: StdRng::from_os_rng(),
        }
    }

    pub fn with_seed(action_count: usize, seed: u64) -> Self {
        RandomAgent {
            rng: StdRng::seed_from_u64(seed),
            ..Self::new(action_count)
        }
    }
}

impl Agent for RandomAgent {
    fn select_action(&mut self, _observation: &Observation, _training: bool) -> usize {
        self.rng.random_range(0..self.action_count)
    }

    fn name(&self) -> &str {
        "Random"
    }
}

/// Nothing to learn and nothing to persist.
impl TrainableAgent for RandomAgent {
    fn algorithm_name(&self) -> &str {
        "Random"
    }

    fn step_count(&self) -> usize {
        0
    }

    fn save_weights_to_dir(&self, _dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
        Ok(())
    }

    fn load_weights_from_dir(&mut self, _dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
        Ok(())
    }

    fn training_state_json(&self) -> String {
        "{}".to_string()
    }

    fn restore_training_state_json(&mut self, _json: &str) -> Result<(), Box<dyn std::error::Error>> {
        Ok(())
    }
}
