use std::path::PathBuf;

use crate::checkpoint::CheckpointKind;

/// Summary of one finished epoch.
#[derive(Debug, Clone, PartialEq)]
pub struct EpochReport {
    pub epoch: usize,
    pub train_win_rate: f32,
    pub validation_win_rate: f32,
    /// Mean loss of the updates performed this epoch, 0 without updates.
    pub average_loss: f32,
    pub average_episode_length: f32,
    /// Training and validation episodes abandoned because the simulation faulted.
    pub faults: usize,
    /// Kind of checkpoint written at the end of the epoch, if any.
    pub checkpointed: Option<CheckpointKind>,
}

/// Outcome of a complete training run.
#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub epochs: Vec<EpochReport>,
    pub best_validation_win_rate: Option<f32>,
    pub best_checkpoint: Option<PathBuf>,
    pub final_checkpoint: PathBuf,
    pub total_faults: usize,
}

/// Updates sent from the training thread to whoever is watching.
#[derive(Debug, Clone)]
pub enum TrainingUpdate {
    Epoch(EpochReport),
    CheckpointSaved {
        epoch: usize,
        kind: CheckpointKind,
        path: PathBuf,
    },
    Finished(TrainingReport),
}
