use std::sync::mpsc;

use tracing::{error, info, warn};

use crate::ai::TrainableAgent;
use crate::bridge::StepBridge;
use crate::checkpoint::{CheckpointKind, CheckpointMetrics, CheckpointSink, CheckpointTag};
use crate::error::{BridgeError, TrainingError};
use crate::training::episode::{run_episode, EpisodeTrace};
use crate::training::events::{EpochReport, TrainingReport, TrainingUpdate};
use crate::training::metrics::TrainingMetrics;
use crate::training::replay_buffer::ReplayBuffer;

/// Trainer configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    pub epochs: usize,
    pub games_per_epoch: usize,
    pub validation_games_per_epoch: usize,
    pub batch_size: usize,
    pub replay_capacity: usize,
    /// Simulation faults in a row before the run is aborted.
    pub max_consecutive_faults: usize,
    /// Truncate episodes after this many steps.
    pub max_episode_steps: Option<usize>,
    /// Seed for replay sampling. Random when absent.
    pub replay_seed: Option<u64>,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        TrainerConfig {
            epochs: 50,
            games_per_epoch: 100,
            validation_games_per_epoch: 20,
            batch_size: 64,
            replay_capacity: 10_000,
            max_consecutive_faults: 3,
            max_episode_steps: Some(5_000),
            replay_seed: None,
        }
    }
}

/// Epoch/episode driver: plays episodes through a [`StepBridge`], feeds the
/// replay buffer, updates the agent and decides when to checkpoint.
pub struct Trainer {
    config: TrainerConfig,
    replay: ReplayBuffer,
    updates: Option<mpsc::Sender<TrainingUpdate>>,
    start_epoch: usize,
    best_rate: Option<f32>,
}

/// Running state of the fault escalation policy.
struct FaultTracker {
    consecutive: usize,
    limit: usize,
}

impl Trainer {
    pub fn new(config: TrainerConfig) -> Self {
        let replay = match config.replay_seed {
            Some(seed) => ReplayBuffer::with_seed(config.replay_capacity, seed),
            None => ReplayBuffer::new(config.replay_capacity),
        };
        Trainer {
            config,
            replay,
            updates: None,
            start_epoch: 0,
            best_rate: None,
        }
    }

    /// Send epoch and checkpoint notifications to `tx`.
    pub fn with_updates(mut self, tx: mpsc::Sender<TrainingUpdate>) -> Self {
        self.updates = Some(tx);
        self
    }

    /// Start epoch numbering at `epoch`, e.g. when resuming from a checkpoint.
    pub fn with_start_epoch(mut self, epoch: usize) -> Self {
        self.start_epoch = epoch;
        self
    }

    /// Validation win rate a new `Best` checkpoint has to beat. A resumed run
    /// passes the rate of the best checkpoint already on disk.
    pub fn with_best_validation_rate(mut self, rate: Option<f32>) -> Self {
        self.best_rate = rate;
        self
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    pub fn replay(&self) -> &ReplayBuffer {
        &self.replay
    }

    /// Run the full training loop.
    ///
    /// Every epoch plays `games_per_epoch` exploring episodes, each followed
    /// by one update on a replay sample, then `validation_games_per_epoch`
    /// greedy ones. A `Best` checkpoint is written whenever the validation
    /// win rate beats every earlier epoch, and a `Final` one after the last.
    pub fn train(
        &mut self,
        agent: &mut dyn TrainableAgent,
        bridge: &StepBridge,
        sink: &mut dyn CheckpointSink,
    ) -> Result<TrainingReport, TrainingError> {
        let mut metrics = TrainingMetrics::with_capacity(self.config.games_per_epoch.max(1));
        let mut faults = FaultTracker {
            consecutive: 0,
            limit: self.config.max_consecutive_faults,
        };
        let mut epochs = Vec::with_capacity(self.config.epochs);
        let mut best_rate = self.best_rate;
        let mut best_checkpoint = None;
        let mut last_metrics = CheckpointMetrics::default();

        info!(
            simulation = bridge.simulation_name(),
            agent = agent.name(),
            first_epoch = self.start_epoch,
            epochs = self.config.epochs,
            games_per_epoch = self.config.games_per_epoch,
            validation_games = self.config.validation_games_per_epoch,
            "starting training"
        );

        let end_epoch = self.start_epoch + self.config.epochs;
        for epoch in self.start_epoch..end_epoch {
            let mut epoch_faults = 0;
            let episodes_before = metrics.total_episodes();
            let updates_before = metrics.total_updates();

            for episode in 0..self.config.games_per_epoch {
                let Some(trace) = self.play(agent, bridge, true, epoch, episode, &mut faults)? else {
                    epoch_faults += 1;
                    continue;
                };
                for transition in trace.transitions {
                    self.replay.add(transition);
                }
                let batch = self.replay.sample_batch(self.config.batch_size);
                if !batch.is_empty() {
                    let update = agent.train_batch(&batch);
                    metrics.record_update(update.loss);
                }
                agent.end_episode();
                metrics.record_episode(trace.result);
            }

            let mut validation_wins = 0;
            for game in 0..self.config.validation_games_per_epoch {
                let episode = self.config.games_per_epoch + game;
                match self.play(agent, bridge, false, epoch, episode, &mut faults)? {
                    Some(trace) if trace.result.is_win() => validation_wins += 1,
                    Some(_) => {}
                    None => epoch_faults += 1,
                }
            }

            // faulted training episodes count against the win rate
            let finished = metrics.total_episodes() - episodes_before;
            let train_win_rate = rate(metrics.wins(finished), self.config.games_per_epoch);
            let validation_win_rate = rate(validation_wins, self.config.validation_games_per_epoch);
            let average_loss = metrics.average_loss(metrics.total_updates() - updates_before);
            let average_episode_length = metrics.average_episode_length(finished);

            last_metrics = CheckpointMetrics {
                train_win_rate,
                validation_win_rate,
                average_episode_length,
                current_loss: average_loss,
                training_steps: agent.step_count(),
            };

            let mut checkpointed = None;
            if best_rate.map_or(true, |best| validation_win_rate > best) {
                best_rate = Some(validation_win_rate);
                let tag = CheckpointTag {
                    kind: CheckpointKind::Best,
                    epoch,
                    metrics: last_metrics.clone(),
                };
                match sink.save(&*agent, &tag) {
                    Ok(path) => {
                        self.notify(TrainingUpdate::CheckpointSaved {
                            epoch,
                            kind: CheckpointKind::Best,
                            path: path.clone(),
                        });
                        best_checkpoint = Some(path);
                        checkpointed = Some(CheckpointKind::Best);
                    }
                    Err(e) => error!(epoch, error = %e, "best checkpoint failed"),
                }
            }

            let report = EpochReport {
                epoch,
                train_win_rate,
                validation_win_rate,
                average_loss,
                average_episode_length,
                faults: epoch_faults,
                checkpointed,
            };
            info!(
                epoch,
                train_win_rate,
                validation_win_rate,
                loss = average_loss,
                avg_len = average_episode_length,
                avg_reward = metrics.average_reward(finished),
                replay = self.replay.len(),
                faults = epoch_faults,
                checkpoint = ?checkpointed,
                "epoch finished"
            );
            self.notify(TrainingUpdate::Epoch(report.clone()));
            epochs.push(report);
        }

        let final_epoch = end_epoch.saturating_sub(1).max(self.start_epoch);
        let tag = CheckpointTag {
            kind: CheckpointKind::Final,
            epoch: final_epoch,
            metrics: last_metrics,
        };
        let final_checkpoint = sink.save(&*agent, &tag)?;
        self.notify(TrainingUpdate::CheckpointSaved {
            epoch: final_epoch,
            kind: CheckpointKind::Final,
            path: final_checkpoint.clone(),
        });

        let report = TrainingReport {
            total_faults: epochs.iter().map(|e| e.faults).sum(),
            epochs,
            best_validation_win_rate: best_rate,
            best_checkpoint,
            final_checkpoint,
        };
        info!(
            episodes = metrics.total_episodes(),
            faults = report.total_faults,
            final_checkpoint = %report.final_checkpoint.display(),
            "training complete"
        );
        self.notify(TrainingUpdate::Finished(report.clone()));
        Ok(report)
    }

    /// Play one episode, applying the fault policy. `Ok(None)` means the
    /// episode faulted and was abandoned.
    fn play(
        &self,
        agent: &mut dyn TrainableAgent,
        bridge: &StepBridge,
        training: bool,
        epoch: usize,
        episode: usize,
        faults: &mut FaultTracker,
    ) -> Result<Option<EpisodeTrace>, TrainingError> {
        match run_episode(bridge, agent, training, self.config.max_episode_steps) {
            Ok(trace) => {
                faults.consecutive = 0;
                Ok(Some(trace))
            }
            Err(BridgeError::Closed) => Err(TrainingError::BridgeClosed { epoch, episode }),
            Err(fault) => {
                faults.consecutive += 1;
                warn!(
                    epoch,
                    episode,
                    consecutive = faults.consecutive,
                    error = %fault,
                    "episode abandoned"
                );
                if faults.consecutive >= faults.limit {
                    return Err(TrainingError::RepeatedEpisodeFaults {
                        epoch,
                        episode,
                        count: faults.consecutive,
                        last: fault,
                    });
                }
                Ok(None)
            }
        }
    }

    fn notify(&self, update: TrainingUpdate) {
        if let Some(tx) = &self.updates {
            // nobody listening is fine
            let _ = tx.send(update);
        }
    }
}

fn rate(wins: usize, games: usize) -> f32 {
    if games == 0 {
        0.0
    } else {
        wins as f32 / games as f32
    }
}
