use std::error::Error;
use std::path::Path;

use burn::backend::{Autodiff, NdArray};
use burn::module::AutodiffModule;
use burn::optim::adaptor::OptimizerAdaptor;
use burn::optim::{Adam, AdamConfig, GradientsParams, Optimizer};
use burn::prelude::*;
use burn::record::DefaultRecorder;
use burn::tensor::TensorData;
use tracing::debug;

use crate::ai::agent::{Agent, TrainableAgent, Transition, UpdateMetrics};
use crate::ai::networks::{QNetwork, QNetworkConfig};
use crate::checkpoint::{CheckpointHyperparameters, DqnTrainingState};
use crate::sim::Observation;

type InferBackend = NdArray<f32>;
type TrainBackend = Autodiff<InferBackend>;

/// DQN hyperparameters.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct DqnConfig {
    pub learning_rate: f64,
    /// Reward discount.
    pub gamma: f32,
    pub hidden_size: usize,
    /// Gradient steps between target network syncs.
    pub target_update_interval: usize,
}

impl Default for DqnConfig {
    fn default() -> Self {
        DqnConfig {
            learning_rate: 1e-3,
            gamma: 0.9,
            hidden_size: 64,
            target_update_interval: 100,
        }
    }
}

/// DQN agent with online + target networks and Adam optimizer. Always
/// greedy; exploration is layered on top by
/// [`EpsilonGreedy`](crate::ai::EpsilonGreedy).
pub struct DqnAgent {
    q_network: QNetwork<TrainBackend>,
    target_network: QNetwork<InferBackend>,
    optimizer: OptimizerAdaptor<Adam, QNetwork<TrainBackend>, TrainBackend>,
    net_config: QNetworkConfig,
    config: DqnConfig,
    device: <TrainBackend as Backend>::Device,
    step_count: usize,
    episode_count: usize,
}

impl DqnAgent {
    pub fn new(config: DqnConfig, input_size: usize, num_actions: usize) -> Self {
        let device = Default::default();
        let net_config =
            QNetworkConfig::new(input_size, num_actions).with_hidden_size(config.hidden_size);
        let q_network: QNetwork<TrainBackend> = net_config.init(&device);
        let target_network = q_network.valid();
        let optimizer = AdamConfig::new().init();

        DqnAgent {
            q_network,
            target_network,
            optimizer,
            net_config,
            config,
            device,
            step_count: 0,
            episode_count: 0,
        }
    }

    pub fn num_actions(&self) -> usize {
        self.net_config.num_actions
    }

    pub fn input_size(&self) -> usize {
        self.net_config.input_size
    }

    /// Per-action Q-values for one observation.
    pub fn predict(&self, observation: &Observation) -> Vec<f32> {
        let input = self.encode_batch::<InferBackend>(std::iter::once(observation), 1);
        self.q_network
            .valid()
            .forward(input)
            .into_data()
            .to_vec()
            .expect("f32 tensor data extraction")
    }

    /// One gradient step on `batch`. Returns the MSE loss; an empty batch
    /// leaves the network untouched and reports zero.
    pub fn fit(&mut self, batch: &[Transition]) -> f32 {
        if batch.is_empty() {
            return 0.0;
        }
        let batch_size = batch.len();
        let num_actions = self.num_actions();

        // Forward pass on current observations: [B, A]
        let inputs = self
            .encode_batch::<TrainBackend>(batch.iter().map(|t| &t.observation), batch_size);
        let q_all = self.q_network.forward(inputs);

        // One-hot action mask [B, A] to extract Q(s, a)
        let mut mask = vec![0.0f32; batch_size * num_actions];
        for (i, t) in batch.iter().enumerate() {
            mask[i * num_actions + t.action] = 1.0;
        }
        let action_mask = Tensor::<TrainBackend, 2>::from_data(
            TensorData::new(mask, [batch_size, num_actions]),
            &self.device,
        );
        let q_taken = (q_all * action_mask).sum_dim(1);

        // Targets from the target network, no grad
        let next_inputs = self.encode_batch::<InferBackend>(
            batch.iter().map(|t| &t.next_observation),
            batch_size,
        );
        let next_q: Vec<f32> = self
            .target_network
            .forward(next_inputs)
            .into_data()
            .to_vec()
            .expect("f32 tensor data extraction");

        let targets: Vec<f32> = batch
            .iter()
            .enumerate()
            .map(|(i, t)| {
                if t.done {
                    t.reward
                } else {
                    let row = &next_q[i * num_actions..(i + 1) * num_actions];
                    let max_q = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
                    t.reward + self.config.gamma * max_q
                }
            })
            .collect();
        let targets = Tensor::<TrainBackend, 2>::from_data(
            TensorData::new(targets, [batch_size, 1]),
            &self.device,
        );

        let diff = q_taken - targets;
        let loss = (diff.clone() * diff).mean();
        let loss_val: f32 = loss
            .clone()
            .into_data()
            .to_vec::<f32>()
            .expect("f32 loss tensor extraction")[0];

        let grads = loss.backward();
        let grads = GradientsParams::from_grads(grads, &self.q_network);
        self.q_network = self
            .optimizer
            .step(self.config.learning_rate, self.q_network.clone(), grads);

        self.step_count += 1;
        if self.step_count % self.config.target_update_interval.max(1) == 0 {
            self.target_network = self.q_network.valid();
            debug!(step = self.step_count, "target network synced");
        }

        loss_val
    }

    pub fn step_count(&self) -> usize {
        self.step_count
    }

    pub fn episode_count(&self) -> usize {
        self.episode_count
    }

    fn encode_batch<'a, B: Backend>(
        &self,
        observations: impl Iterator<Item = &'a Observation>,
        batch_size: usize,
    ) -> Tensor<B, 2> {
        let input_size = self.input_size();
        let mut data = Vec::with_capacity(batch_size * input_size);
        for obs in observations {
            assert_eq!(
                obs.len(),
                input_size,
                "observation has {} features, network expects {input_size}",
                obs.len()
            );
            data.extend_from_slice(obs.features());
        }
        Tensor::from_data(TensorData::new(data, [batch_size, input_size]), &Default::default())
    }

    /// Save network weights to a directory.
    pub fn save_to_dir(&self, dir: &Path) -> Result<(), Box<dyn Error>> {
        let recorder = DefaultRecorder::default();
        self.q_network
            .clone()
            .valid()
            .save_file(dir.join("q_network"), &recorder)?;
        self.target_network
            .clone()
            .save_file(dir.join("target_network"), &recorder)?;
        Ok(())
    }

    /// Load network weights from a directory.
    pub fn load_from_dir(&mut self, dir: &Path) -> Result<(), Box<dyn Error>> {
        let recorder = DefaultRecorder::default();

        let q: QNetwork<TrainBackend> =
            self.net_config
                .init(&self.device)
                .load_file(dir.join("q_network"), &recorder, &self.device)?;
        self.q_network = q;

        let target: QNetwork<InferBackend> =
            self.net_config
                .init(&self.device)
                .load_file(dir.join("target_network"), &recorder, &self.device)?;
        self.target_network = target;
        Ok(())
    }

    /// Export current training state for checkpointing.
    pub fn training_state(&self) -> DqnTrainingState {
        DqnTrainingState {
            step_count: self.step_count,
            episode_count: self.episode_count,
            learning_rate: self.config.learning_rate,
            gamma: self.config.gamma,
            hidden_size: self.config.hidden_size,
            target_update_interval: self.config.target_update_interval,
            input_size: self.net_config.input_size,
            num_actions: self.net_config.num_actions,
        }
    }

    /// Restore training state from a checkpoint. The network shape must
    /// match the one this agent was built with.
    pub fn restore_training_state(&mut self, state: &DqnTrainingState) -> Result<(), String> {
        if state.input_size != self.net_config.input_size
            || state.num_actions != self.net_config.num_actions
            || state.hidden_size != self.net_config.hidden_size
        {
            return Err(format!(
                "checkpoint network {}x{}x{} does not match agent {}x{}x{}",
                state.input_size,
                state.hidden_size,
                state.num_actions,
                self.net_config.input_size,
                self.net_config.hidden_size,
                self.net_config.num_actions
            ));
        }
        self.step_count = state.step_count;
        self.episode_count = state.episode_count;
        self.config = DqnConfig {
            learning_rate: state.learning_rate,
            gamma: state.gamma,
            hidden_size: state.hidden_size,
            target_update_interval: state.target_update_interval,
        };
        Ok(())
    }
}

impl Agent for DqnAgent {
    fn select_action(&mut self, observation: &Observation, _training: bool) -> usize {
        let q = self.predict(observation);
        let mut best_action = 0;
        let mut best_q = f32::NEG_INFINITY;
        for (action, &value) in q.iter().enumerate() {
            if value > best_q {
                best_q = value;
                best_action = action;
            }
        }
        best_action
    }

    fn name(&self) -> &str {
        "DQN"
    }

    fn train_batch(&mut self, batch: &[Transition]) -> UpdateMetrics {
        let loss = self.fit(batch);
        UpdateMetrics {
            loss,
            samples: batch.len(),
        }
    }

    fn end_episode(&mut self) {
        self.episode_count += 1;
    }
}

impl TrainableAgent for DqnAgent {
    fn algorithm_name(&self) -> &str {
        "DQN"
    }

    fn step_count(&self) -> usize {
        self.step_count
    }

    fn save_weights_to_dir(&self, dir: &Path) -> Result<(), Box<dyn Error>> {
        self.save_to_dir(dir)
    }

    fn load_weights_from_dir(&mut self, dir: &Path) -> Result<(), Box<dyn Error>> {
        self.load_from_dir(dir)
    }

    fn training_state_json(&self) -> String {
        serde_json::to_string_pretty(&self.training_state()).expect("DQN training state serializes")
    }

    fn restore_training_state_json(&mut self, json: &str) -> Result<(), Box<dyn Error>> {
        let state: DqnTrainingState = serde_json::from_str(json)?;
        self.restore_training_state(&state)?;
        Ok(())
    }

    fn hyperparameters(&self) -> Option<CheckpointHyperparameters> {
        Some(CheckpointHyperparameters {
            learning_rate: self.config.learning_rate,
            gamma: self.config.gamma,
            hidden_size: self.config.hidden_size,
            target_update_interval: self.config.target_update_interval,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(values: [f32; 4], terminal: bool) -> Observation {
        Observation::new(values.to_vec(), terminal)
    }

    fn agent() -> DqnAgent {
        DqnAgent::new(DqnConfig::default(), 4, 3)
    }

    fn batch() -> Vec<Transition> {
        (0..8)
            .map(|i| {
                let x = i as f32 / 8.0;
                Transition::new(
                    obs([x, -x, 0.5, 1.0], false),
                    i % 3,
                    obs([x, x, 0.5, -1.0], i == 7),
                    |_, a, _| a as f32,
                )
            })
            .collect()
    }

    #[test]
    fn test_predict_has_one_value_per_action() {
        let agent = agent();
        let q = agent.predict(&obs([0.1, 0.2, 0.3, 0.4], false));
        assert_eq!(q.len(), 3);
        assert!(q.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_select_action_is_greedy_and_in_range() {
        let mut agent = agent();
        let o = obs([0.3, -0.2, 0.0, 1.0], false);
        let q = agent.predict(&o);
        let action = agent.select_action(&o, true);
        assert!(action < 3);
        let best = q.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        assert_eq!(q[action], best);
    }

    #[test]
    fn test_fit_updates_and_counts_steps() {
        let mut agent = agent();
        let loss = agent.fit(&batch());
        assert!(loss.is_finite());
        assert!(loss >= 0.0);
        assert_eq!(agent.step_count(), 1);
    }

    #[test]
    fn test_fit_empty_batch_is_noop() {
        let mut agent = agent();
        assert_eq!(agent.fit(&[]), 0.0);
        assert_eq!(agent.step_count(), 0);
    }

    #[test]
    fn test_repeated_fitting_reduces_loss() {
        let mut agent = DqnAgent::new(
            DqnConfig {
                learning_rate: 1e-2,
                ..Default::default()
            },
            4,
            3,
        );
        let batch = batch();
        let first = agent.fit(&batch);
        let mut last = first;
        for _ in 0..200 {
            last = agent.fit(&batch);
        }
        assert!(last < first, "loss did not decrease: {first} -> {last}");
    }

    #[test]
    fn test_target_network_syncs_on_interval() {
        let mut agent = DqnAgent::new(
            DqnConfig {
                target_update_interval: 2,
                ..Default::default()
            },
            4,
            3,
        );
        let o = obs([0.5, 0.5, 0.5, 0.5], false);
        let target_before = agent.target_network.forward(agent.encode_batch::<InferBackend>(std::iter::once(&o), 1));
        let batch = batch();
        agent.fit(&batch);
        agent.fit(&batch);
        let target_after: Vec<f32> = agent
            .target_network
            .forward(agent.encode_batch::<InferBackend>(std::iter::once(&o), 1))
            .into_data()
            .to_vec()
            .unwrap();
        let before: Vec<f32> = target_before.into_data().to_vec().unwrap();
        assert_ne!(before, target_after);
        assert_eq!(agent.predict(&o), target_after);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut trained = agent();
        trained.fit(&batch());
        trained.save_to_dir(dir.path()).unwrap();

        let mut restored = agent();
        restored.load_from_dir(dir.path()).unwrap();
        let o = obs([0.2, 0.4, 0.6, 0.8], false);
        let a = trained.predict(&o);
        let b = restored.predict(&o);
        for (x, y) in a.iter().zip(&b) {
            assert!((x - y).abs() < 1e-5);
        }
    }

    #[test]
    fn test_training_state_json_round_trip() {
        let mut agent = agent();
        agent.fit(&batch());
        agent.end_episode();
        let json = agent.training_state_json();

        let mut other = DqnAgent::new(DqnConfig::default(), 4, 3);
        other.restore_training_state_json(&json).unwrap();
        assert_eq!(other.step_count(), 1);
        assert_eq!(other.episode_count(), 1);

        let mut mismatched = DqnAgent::new(DqnConfig::default(), 5, 3);
        assert!(mismatched.restore_training_state_json(&json).is_err());
    }

    #[test]
    #[should_panic(expected = "network expects 4")]
    fn test_wrong_observation_width_panics() {
        let agent = agent();
        agent.predict(&Observation::new(vec![1.0, 2.0], false));
    }
}
