use std::path::Path;

use tracing::warn;

use crate::ai::{DqnConfig, ExplorationConfig};
use crate::checkpoint::CheckpointManagerConfig;
use crate::error::ConfigError;
use crate::sim::SimulationConfig;
use crate::training::TrainerConfig;

/// Top-level application configuration, loadable from TOML.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub simulation: SimulationConfig,
    pub dqn: DqnConfig,
    pub exploration: ExplorationConfig,
    pub training: TrainerConfig,
    pub checkpoint: CheckpointManagerConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: AppConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the file
    /// does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            warn!(path = %path.display(), "config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Validation(msg.into()));

        let breakout = &self.simulation.breakout;
        if breakout.tick_seconds <= 0.0 {
            return invalid("simulation.breakout.tick_seconds must be > 0");
        }
        if breakout.paddle_step <= 0.0 {
            return invalid("simulation.breakout.paddle_step must be > 0");
        }
        if breakout.score_target == 0 {
            return invalid("simulation.breakout.score_target must be >= 1");
        }
        let lander = &self.simulation.lander;
        if lander.tick_millis == 0 {
            return invalid("simulation.lander.tick_millis must be > 0");
        }
        if lander.start_height_m <= 0.0 {
            return invalid("simulation.lander.start_height_m must be > 0");
        }
        if lander.safety_velocity_kmh <= 0.0 {
            return invalid("simulation.lander.safety_velocity_kmh must be > 0");
        }
        if lander.max_seconds <= 0.0 {
            return invalid("simulation.lander.max_seconds must be > 0");
        }

        if self.dqn.learning_rate <= 0.0 {
            return invalid("dqn.learning_rate must be > 0");
        }
        if !(0.0..=1.0).contains(&self.dqn.gamma) {
            return invalid("dqn.gamma must be in [0, 1]");
        }
        if self.dqn.hidden_size == 0 {
            return invalid("dqn.hidden_size must be > 0");
        }
        if self.dqn.target_update_interval == 0 {
            return invalid("dqn.target_update_interval must be >= 1");
        }

        self.exploration
            .schedule
            .validate()
            .map_err(|e| ConfigError::Validation(format!("exploration.schedule: {e}")))?;

        let training = &self.training;
        if training.epochs == 0 {
            return invalid("training.epochs must be > 0");
        }
        if training.games_per_epoch == 0 {
            return invalid("training.games_per_epoch must be > 0");
        }
        if training.batch_size == 0 {
            return invalid("training.batch_size must be > 0");
        }
        if training.replay_capacity < training.batch_size {
            return invalid("training.replay_capacity must be >= training.batch_size");
        }
        if training.max_consecutive_faults == 0 {
            return invalid("training.max_consecutive_faults must be >= 1");
        }
        if training.max_episode_steps == Some(0) {
            return invalid("training.max_episode_steps must be > 0 when set");
        }

        if self.checkpoint.keep_last_n == 0 {
            return invalid("checkpoint.keep_last_n must be >= 1");
        }

        Ok(())
    }

    /// Generate a TOML string with all default values (useful for creating
    /// example config files).
    pub fn default_toml() -> String {
        toml::to_string_pretty(&AppConfig::default()).expect("default config serializes")
    }
}
