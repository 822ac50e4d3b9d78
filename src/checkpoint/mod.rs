mod manager;
mod metadata;

use std::path::PathBuf;

pub use manager::{CheckpointData, CheckpointManager, CheckpointManagerConfig};
pub use metadata::{
    CheckpointHyperparameters, CheckpointKind, CheckpointMetadata, CheckpointMetrics,
    DqnTrainingState,
};

use crate::ai::TrainableAgent;
use crate::error::CheckpointError;

/// What a checkpoint is being taken for.
#[derive(Debug, Clone)]
pub struct CheckpointTag {
    pub kind: CheckpointKind,
    pub epoch: usize,
    pub metrics: CheckpointMetrics,
}

/// Destination for model checkpoints requested by the trainer.
pub trait CheckpointSink {
    /// Persist `agent`. Returns where the checkpoint was written.
    fn save(
        &mut self,
        agent: &dyn TrainableAgent,
        tag: &CheckpointTag,
    ) -> Result<PathBuf, CheckpointError>;
}
