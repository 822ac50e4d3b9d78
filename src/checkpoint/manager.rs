use std::cmp::Ordering;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, info};

use super::metadata::{CheckpointKind, CheckpointMetadata};
use super::{CheckpointSink, CheckpointTag};
use crate::ai::TrainableAgent;
use crate::error::CheckpointError;

/// Configuration for the checkpoint manager.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CheckpointManagerConfig {
    pub checkpoint_dir: PathBuf,
    pub keep_last_n: usize,
    pub keep_best_n: usize,
}

impl Default for CheckpointManagerConfig {
    fn default() -> Self {
        CheckpointManagerConfig {
            checkpoint_dir: PathBuf::from("checkpoints"),
            keep_last_n: 5,
            keep_best_n: 3,
        }
    }
}

/// Algorithm-agnostic checkpoint data. The agent deserializes its own training state.
#[derive(Debug)]
pub struct CheckpointData {
    pub path: PathBuf,
    pub metadata: CheckpointMetadata,
    pub training_state_json: String,
}

/// Manages saving, loading, listing, and pruning checkpoints.
///
/// Layout: one `checkpoint_<epoch>_<kind>/` directory per save holding the
/// network weights, `training_state.json` and `metadata.json`, plus a
/// `latest` symlink to the most recent one.
pub struct CheckpointManager {
    config: CheckpointManagerConfig,
}

impl CheckpointManager {
    pub fn new(config: CheckpointManagerConfig) -> Self {
        fs::create_dir_all(&config.checkpoint_dir).ok();
        CheckpointManager { config }
    }

    pub fn checkpoint_dir(&self) -> &Path {
        &self.config.checkpoint_dir
    }

    /// Save a checkpoint using the unified TrainableAgent interface.
    pub fn save_agent_checkpoint(
        &self,
        agent: &dyn TrainableAgent,
        tag: &CheckpointTag,
    ) -> Result<PathBuf, CheckpointError> {
        let dir_name = format!("checkpoint_{:05}_{}", tag.epoch, tag.kind.as_str());
        let tmp_dir = self.config.checkpoint_dir.join(format!("{}.tmp", dir_name));
        let final_dir = self.config.checkpoint_dir.join(&dir_name);

        fs::create_dir_all(&tmp_dir)?;

        agent
            .save_weights_to_dir(&tmp_dir)
            .map_err(|e| CheckpointError::ModelSave(e.to_string()))?;

        fs::write(tmp_dir.join("training_state.json"), agent.training_state_json())?;

        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let metadata = CheckpointMetadata {
            epoch: tag.epoch,
            kind: tag.kind,
            timestamp,
            algorithm: agent.algorithm_name().to_string(),
            metrics: tag.metrics.clone(),
            hyperparameters: agent.hyperparameters(),
        };
        let meta_json = serde_json::to_string_pretty(&metadata)?;
        fs::write(tmp_dir.join("metadata.json"), meta_json)?;

        // Atomic rename
        if final_dir.exists() {
            fs::remove_dir_all(&final_dir)?;
        }
        fs::rename(&tmp_dir, &final_dir)?;

        self.update_latest_symlink(&dir_name)?;
        self.prune_old_checkpoints()?;

        info!(path = %final_dir.display(), kind = tag.kind.as_str(), epoch = tag.epoch, "checkpoint saved");
        Ok(final_dir)
    }

    /// Load checkpoint data in an algorithm-agnostic way.
    pub fn load_agent_checkpoint(&self, dir: &Path) -> Result<CheckpointData, CheckpointError> {
        if !dir.is_dir() {
            return Err(CheckpointError::DirNotFound(dir.to_path_buf()));
        }
        let metadata = read_metadata(&dir.join("metadata.json"))?;

        let ts_path = dir.join("training_state.json");
        let training_state_json =
            fs::read_to_string(&ts_path).map_err(|e| CheckpointError::MetadataRead {
                path: ts_path,
                source: e,
            })?;

        Ok(CheckpointData {
            path: dir.to_path_buf(),
            metadata,
            training_state_json,
        })
    }

    /// Load the latest checkpoint in an algorithm-agnostic way.
    pub fn load_agent_latest(&self) -> Result<CheckpointData, CheckpointError> {
        let latest_link = self.config.checkpoint_dir.join("latest");
        if !latest_link.exists() {
            return Err(CheckpointError::NoLatestSymlink(
                self.config.checkpoint_dir.clone(),
            ));
        }
        let resolved = fs::read_link(&latest_link)?;
        let target = if resolved.is_relative() {
            self.config.checkpoint_dir.join(resolved)
        } else {
            resolved
        };
        self.load_agent_checkpoint(&target)
    }

    /// Load the latest checkpoint into `agent`: weights, then training state.
    pub fn restore_latest(
        &self,
        agent: &mut dyn TrainableAgent,
    ) -> Result<CheckpointData, CheckpointError> {
        let data = self.load_agent_latest()?;
        agent
            .load_weights_from_dir(&data.path)
            .map_err(|e| CheckpointError::ModelLoad(e.to_string()))?;
        agent
            .restore_training_state_json(&data.training_state_json)
            .map_err(|e| CheckpointError::ModelLoad(e.to_string()))?;
        debug!(path = %data.path.display(), "checkpoint restored");
        Ok(data)
    }

    /// List all checkpoints sorted by epoch (ascending), best before final
    /// within one epoch.
    pub fn list_checkpoints(&self) -> Result<Vec<(PathBuf, CheckpointMetadata)>, CheckpointError> {
        if !self.config.checkpoint_dir.is_dir() {
            return Err(CheckpointError::DirNotFound(self.config.checkpoint_dir.clone()));
        }
        let mut results = Vec::new();
        for entry in fs::read_dir(&self.config.checkpoint_dir)? {
            let entry = entry?;
            let path = entry.path();
            if !path.is_dir() || path.is_symlink() {
                continue;
            }
            let name = entry.file_name();
            let name_str = name.to_string_lossy();
            if !name_str.starts_with("checkpoint_") || name_str.ends_with(".tmp") {
                continue;
            }
            let meta_path = path.join("metadata.json");
            if meta_path.exists() {
                let metadata = read_metadata(&meta_path)?;
                results.push((path, metadata));
            }
        }
        results.sort_by_key(|(_, m)| (m.epoch, m.kind == CheckpointKind::Final));
        Ok(results)
    }

    /// Highest validation win rate among the `Best` checkpoints on disk,
    /// `None` when there are none.
    pub fn best_validation_win_rate(&self) -> Result<Option<f32>, CheckpointError> {
        let best = self
            .list_checkpoints()?
            .into_iter()
            .filter(|(_, m)| m.kind == CheckpointKind::Best)
            .map(|(_, m)| m.metrics.validation_win_rate)
            .fold(None, |acc: Option<f32>, rate| Some(acc.map_or(rate, |a| a.max(rate))));
        Ok(best)
    }

    /// Prune old checkpoints, keeping the union of the last N and the best N
    /// by validation win rate.
    fn prune_old_checkpoints(&self) -> Result<(), CheckpointError> {
        let checkpoints = self.list_checkpoints()?;
        if checkpoints.len() <= self.config.keep_last_n {
            return Ok(());
        }

        let total = checkpoints.len();
        let mut keep: HashSet<usize> = (total.saturating_sub(self.config.keep_last_n)..total).collect();

        let mut by_win_rate: Vec<(usize, f32)> = checkpoints
            .iter()
            .enumerate()
            .map(|(i, (_, m))| (i, m.metrics.validation_win_rate))
            .collect();
        by_win_rate.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        for (i, _) in by_win_rate.iter().take(self.config.keep_best_n) {
            keep.insert(*i);
        }

        for (i, (path, _)) in checkpoints.iter().enumerate() {
            if !keep.contains(&i) {
                debug!(path = %path.display(), "pruning checkpoint");
                fs::remove_dir_all(path)?;
            }
        }

        Ok(())
    }

    /// Update the `latest` symlink to point to the given checkpoint directory name.
    fn update_latest_symlink(&self, dir_name: &str) -> Result<(), CheckpointError> {
        let link_path = self.config.checkpoint_dir.join("latest");
        if link_path.exists() || link_path.symlink_metadata().is_ok() {
            fs::remove_file(&link_path)?;
        }
        std::os::unix::fs::symlink(dir_name, &link_path)?;
        Ok(())
    }
}

impl CheckpointSink for CheckpointManager {
    fn save(
        &mut self,
        agent: &dyn TrainableAgent,
        tag: &CheckpointTag,
    ) -> Result<PathBuf, CheckpointError> {
        self.save_agent_checkpoint(agent, tag)
    }
}

fn read_metadata(path: &Path) -> Result<CheckpointMetadata, CheckpointError> {
    let json = fs::read_to_string(path).map_err(|e| CheckpointError::MetadataRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    serde_json::from_str(&json).map_err(|e| CheckpointError::MetadataParse {
        path: path.to_path_buf(),
        source: e,
    })
}
