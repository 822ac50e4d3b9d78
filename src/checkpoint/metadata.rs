use serde::{Deserialize, Serialize};

/// Why a checkpoint was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointKind {
    /// Validation win rate improved on every earlier epoch.
    Best,
    /// End of the run.
    Final,
}

impl CheckpointKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CheckpointKind::Best => "best",
            CheckpointKind::Final => "final",
        }
    }
}

/// Metrics snapshot at checkpoint time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckpointMetrics {
    pub train_win_rate: f32,
    pub validation_win_rate: f32,
    pub average_episode_length: f32,
    pub current_loss: f32,
    pub training_steps: usize,
}

/// Hyperparameters recorded in checkpoint metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointHyperparameters {
    pub learning_rate: f64,
    pub gamma: f32,
    pub hidden_size: usize,
    pub target_update_interval: usize,
}

/// Top-level checkpoint metadata written to metadata.json.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointMetadata {
    pub epoch: usize,
    pub kind: CheckpointKind,
    pub timestamp: u64,
    pub algorithm: String,
    pub metrics: CheckpointMetrics,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hyperparameters: Option<CheckpointHyperparameters>,
}

/// DQN-specific training state written to training_state.json.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DqnTrainingState {
    pub step_count: usize,
    pub episode_count: usize,
    pub learning_rate: f64,
    pub gamma: f32,
    pub hidden_size: usize,
    pub target_update_interval: usize,
    pub input_size: usize,
    pub num_actions: usize,
}
