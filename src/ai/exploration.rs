use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use super::agent::{Agent, TrainableAgent, Transition, UpdateMetrics};
use super::schedule::{EpsilonSchedule, ExplorationRate};
use crate::checkpoint::CheckpointHyperparameters;
use crate::sim::Observation;

/// How often the exploration diagnostics are logged at most.
pub const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_secs(10);

/// Exploration section of the application config.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ExplorationConfig {
    /// Seed for the exploration draws. Random when absent.
    pub seed: Option<u64>,
    pub report_interval_secs: u64,
    pub schedule: EpsilonSchedule,
}

impl Default for ExplorationConfig {
    fn default() -> Self {
        ExplorationConfig {
            seed: None,
            report_interval_secs: DEFAULT_REPORT_INTERVAL.as_secs(),
            schedule: EpsilonSchedule::default(),
        }
    }
}

/// Per-action selection counts. Safe to read from any thread while the
/// policy keeps recording.
#[derive(Debug)]
pub struct ActionHistogram {
    counts: Vec<AtomicU64>,
}

impl ActionHistogram {
    pub fn new(action_count: usize) -> Self {
        ActionHistogram {
            counts: (0..action_count).map(|_| AtomicU64::new(0)).collect(),
        }
    }

    pub fn record(&self, action: usize) {
        self.counts[action].fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self, action: usize) -> u64 {
        self.counts[action].load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> Vec<u64> {
        self.counts.iter().map(|c| c.load(Ordering::Relaxed)).collect()
    }

    pub fn total(&self) -> u64 {
        self.snapshot().iter().sum()
    }

    fn restore(&self, counts: &[u64]) {
        for (slot, &count) in self.counts.iter().zip(counts) {
            slot.store(count, Ordering::Relaxed);
        }
    }
}

impl fmt::Display for ActionHistogram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (action, count) in self.snapshot().iter().enumerate() {
            if action > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{action}: {count}")?;
        }
        write!(f, "]")
    }
}

/// Checkpointed wrapper state. The base agent's own state is nested as-is.
#[derive(serde::Serialize, serde::Deserialize)]
struct ExplorationState {
    calls: u64,
    #[serde(default)]
    histogram: Vec<u64>,
    base: serde_json::Value,
}

/// Epsilon-greedy decorator around a base agent.
///
/// While training, each decision is random with probability ε(t), where `t`
/// counts every call made so far; otherwise the base agent decides. In
/// evaluation (`training == false`) the base agent always decides.
pub struct EpsilonGreedy<A> {
    base: A,
    rate: Box<dyn ExplorationRate>,
    action_count: usize,
    calls: u64,
    histogram: Arc<ActionHistogram>,
    rng: StdRng,
    report_interval: Duration,
    last_report: Option<Instant>,
}

impl<A: Agent> EpsilonGreedy<A> {
    pub fn new(base: A, rate: impl ExplorationRate + 'static, action_count: usize) -> Self {
        assert!(action_count > 0, "action set must not be empty");
        EpsilonGreedy {
            base,
            rate: Box::new(rate),
            action_count,
            calls: 0,
            histogram: Arc::new(ActionHistogram::new(action_count)),
            rng: StdRng::from_os_rng(),
            report_interval: DEFAULT_REPORT_INTERVAL,
            last_report: None,
        }
    }

    /// Wrap `base` with the schedule, seed and report interval from `config`.
    pub fn from_config(base: A, config: &ExplorationConfig, action_count: usize) -> Self {
        let policy = EpsilonGreedy::new(base, config.schedule.clone(), action_count)
            .with_report_interval(Duration::from_secs(config.report_interval_secs));
        match config.seed {
            Some(seed) => policy.with_seed(seed),
            None => policy,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn with_report_interval(mut self, interval: Duration) -> Self {
        self.report_interval = interval;
        self
    }

    /// Shared handle to the action histogram.
    pub fn histogram(&self) -> Arc<ActionHistogram> {
        Arc::clone(&self.histogram)
    }

    /// ε for the next decision, clamped to [0, 1].
    pub fn epsilon(&self) -> f32 {
        self.epsilon_at(self.calls)
    }

    pub fn calls(&self) -> u64 {
        self.calls
    }

    pub fn base(&self) -> &A {
        &self.base
    }

    pub fn into_inner(self) -> A {
        self.base
    }

    fn epsilon_at(&self, t: u64) -> f32 {
        self.rate.rate(t).clamp(0.0, 1.0)
    }

    fn maybe_report(&mut self, epsilon: Option<f32>) {
        let due = self
            .last_report
            .map_or(true, |last| last.elapsed() >= self.report_interval);
        if due {
            self.last_report = Some(Instant::now());
            debug!(
                agent = self.base.name(),
                epsilon = ?epsilon,
                calls = self.calls,
                histogram = %self.histogram,
                "exploration"
            );
        }
    }
}

impl<A: Agent> Agent for EpsilonGreedy<A> {
    fn select_action(&mut self, observation: &Observation, training: bool) -> usize {
        let t = self.calls;
        self.calls += 1;

        let epsilon = training.then(|| self.epsilon_at(t));
        let explore = epsilon.is_some_and(|e| self.rng.random::<f32>() < e);
        let action = if explore {
            self.rng.random_range(0..self.action_count)
        } else {
            let action = self.base.select_action(observation, training);
            assert!(
                action < self.action_count,
                "{} chose action {action}, expected < {}",
                self.base.name(),
                self.action_count
            );
            action
        };

        self.histogram.record(action);
        self.maybe_report(epsilon);
        action
    }

    fn name(&self) -> &str {
        self.base.name()
    }

    fn train_batch(&mut self, batch: &[Transition]) -> UpdateMetrics {
        self.base.train_batch(batch)
    }

    fn end_episode(&mut self) {
        self.base.end_episode()
    }
}

impl<A: TrainableAgent> TrainableAgent for EpsilonGreedy<A> {
    fn algorithm_name(&self) -> &str {
        self.base.algorithm_name()
    }

    fn step_count(&self) -> usize {
        self.base.step_count()
    }

    fn save_weights_to_dir(&self, dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
        self.base.save_weights_to_dir(dir)
    }

    fn load_weights_from_dir(&mut self, dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
        self.base.load_weights_from_dir(dir)
    }

    fn training_state_json(&self) -> String {
        let state = ExplorationState {
            calls: self.calls,
            histogram: self.histogram.snapshot(),
            base: serde_json::from_str(&self.base.training_state_json())
                .expect("base training state is JSON"),
        };
        serde_json::to_string_pretty(&state).expect("exploration state serializes")
    }

    /// Restores the call counter, so the schedule resumes where it stopped,
    /// then hands the nested state to the base agent.
    fn restore_training_state_json(&mut self, json: &str) -> Result<(), Box<dyn std::error::Error>> {
        let state: ExplorationState = serde_json::from_str(json)?;
        if !state.histogram.is_empty() && state.histogram.len() != self.action_count {
            return Err(format!(
                "checkpoint histogram has {} actions, expected {}",
                state.histogram.len(),
                self.action_count
            )
            .into());
        }
        self.base.restore_training_state_json(&state.base.to_string())?;
        self.calls = state.calls;
        self.histogram.restore(&state.histogram);
        Ok(())
    }

    fn hyperparameters(&self) -> Option<CheckpointHyperparameters> {
        self.base.hyperparameters()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::schedule::EpsilonSchedule;
    use crate::ai::{DqnAgent, DqnConfig, RandomAgent};
    use parking_lot::Mutex;

    /// Always picks `action` and counts how often it was asked.
    struct FixedAgent {
        action: usize,
        queries: usize,
        batches: usize,
        episodes: usize,
    }

    impl FixedAgent {
        fn new(action: usize) -> Self {
            FixedAgent {
                action,
                queries: 0,
                batches: 0,
                episodes: 0,
            }
        }
    }

    impl Agent for FixedAgent {
        fn select_action(&mut self, _observation: &Observation, _training: bool) -> usize {
            self.queries += 1;
            self.action
        }

        fn name(&self) -> &str {
            "Fixed"
        }

        fn train_batch(&mut self, batch: &[Transition]) -> UpdateMetrics {
            self.batches += 1;
            UpdateMetrics {
                loss: 0.5,
                samples: batch.len(),
            }
        }

        fn end_episode(&mut self) {
            self.episodes += 1;
        }
    }

    fn constant(epsilon: f32) -> impl Fn(u64) -> f32 + Send {
        move |_| epsilon
    }

    fn obs() -> Observation {
        Observation::new(vec![0.0, 1.0], false)
    }

    #[test]
    fn test_epsilon_one_never_queries_base() {
        let mut policy = EpsilonGreedy::new(FixedAgent::new(1), constant(1.0), 3).with_seed(5);
        for _ in 0..200 {
            let a = policy.select_action(&obs(), true);
            assert!(a < 3);
        }
        assert_eq!(policy.base().queries, 0);
        assert_eq!(policy.histogram().total(), 200);
    }

    #[test]
    fn test_epsilon_zero_always_delegates() {
        let mut policy = EpsilonGreedy::new(FixedAgent::new(2), constant(0.0), 3).with_seed(5);
        for _ in 0..100 {
            assert_eq!(policy.select_action(&obs(), true), 2);
        }
        assert_eq!(policy.base().queries, 100);
        assert_eq!(policy.histogram().snapshot(), vec![0, 0, 100]);
    }

    #[test]
    fn test_evaluation_ignores_epsilon() {
        let mut policy = EpsilonGreedy::new(FixedAgent::new(0), constant(1.0), 3).with_seed(5);
        for _ in 0..50 {
            assert_eq!(policy.select_action(&obs(), false), 0);
        }
        assert_eq!(policy.base().queries, 50);
        assert_eq!(policy.calls(), 50);
    }

    #[test]
    fn test_uniform_exploration_histogram() {
        let mut policy = EpsilonGreedy::new(FixedAgent::new(0), constant(1.0), 3).with_seed(42);
        let histogram = policy.histogram();
        for _ in 0..1000 {
            policy.select_action(&obs(), true);
        }
        let counts = histogram.snapshot();
        assert_eq!(counts.iter().sum::<u64>(), 1000);
        for count in counts {
            assert!((260..=410).contains(&count), "count {count} far from 333");
        }
    }

    #[test]
    fn test_rate_sees_every_call_index() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorder = {
            let seen = Arc::clone(&seen);
            move |t: u64| {
                seen.lock().push(t);
                0.0f32
            }
        };
        let mut policy = EpsilonGreedy::new(FixedAgent::new(1), recorder, 3);
        policy.select_action(&obs(), true);
        policy.select_action(&obs(), false);
        policy.select_action(&obs(), true);
        assert_eq!(policy.calls(), 3);
        // the evaluation call consumed index 1 without consulting the rate
        assert_eq!(*seen.lock(), vec![0, 2]);
    }

    #[test]
    fn test_rate_is_clamped() {
        let policy = EpsilonGreedy::new(FixedAgent::new(0), constant(7.0), 3);
        assert_eq!(policy.epsilon(), 1.0);
        let policy = EpsilonGreedy::new(FixedAgent::new(0), constant(-1.0), 3);
        assert_eq!(policy.epsilon(), 0.0);
    }

    #[test]
    fn test_schedule_drives_epsilon() {
        let schedule = EpsilonSchedule::Linear {
            start: 1.0,
            end: 0.0,
            steps: 10,
        };
        let mut policy = EpsilonGreedy::new(FixedAgent::new(1), schedule, 3).with_seed(1);
        assert_eq!(policy.epsilon(), 1.0);
        for _ in 0..10 {
            policy.select_action(&obs(), true);
        }
        assert_eq!(policy.epsilon(), 0.0);
        for _ in 0..20 {
            assert_eq!(policy.select_action(&obs(), true), 1);
        }
    }

    #[test]
    fn test_training_calls_delegate() {
        let mut policy = EpsilonGreedy::new(FixedAgent::new(0), constant(0.0), 3);
        let t = Transition::new(obs(), 0, obs(), |_, _, _| 1.0);
        let metrics = policy.train_batch(&[t.clone(), t]);
        policy.end_episode();
        assert_eq!(metrics.samples, 2);
        assert_eq!(policy.base().batches, 1);
        assert_eq!(policy.into_inner().episodes, 1);
    }

    #[test]
    #[should_panic(expected = "chose action 5")]
    fn test_base_out_of_range_panics() {
        let mut policy = EpsilonGreedy::new(FixedAgent::new(5), constant(0.0), 3);
        policy.select_action(&obs(), true);
    }

    #[test]
    fn test_histogram_display() {
        let histogram = ActionHistogram::new(3);
        histogram.record(1);
        histogram.record(1);
        histogram.record(2);
        assert_eq!(histogram.to_string(), "[0: 0, 1: 2, 2: 1]");
    }

    #[test]
    fn test_from_config() {
        let config = ExplorationConfig {
            schedule: EpsilonSchedule::Constant { value: 0.0 },
            seed: Some(3),
            report_interval_secs: 1,
        };
        let mut policy = EpsilonGreedy::from_config(FixedAgent::new(2), &config, 3);
        assert_eq!(policy.epsilon(), 0.0);
        assert_eq!(policy.select_action(&obs(), true), 2);
    }

    fn linear_to_zero() -> EpsilonSchedule {
        EpsilonSchedule::Linear {
            start: 1.0,
            end: 0.0,
            steps: 100,
        }
    }

    #[test]
    fn test_training_state_restores_schedule_position() {
        let mut policy =
            EpsilonGreedy::new(RandomAgent::with_seed(3, 1), linear_to_zero(), 3).with_seed(9);
        for _ in 0..100 {
            policy.select_action(&obs(), true);
        }
        assert_eq!(policy.epsilon(), 0.0);
        let json = policy.training_state_json();

        let mut resumed = EpsilonGreedy::new(RandomAgent::with_seed(3, 1), linear_to_zero(), 3);
        assert_eq!(resumed.epsilon(), 1.0);
        resumed.restore_training_state_json(&json).unwrap();
        assert_eq!(resumed.calls(), 100);
        assert_eq!(resumed.epsilon(), 0.0);
        assert_eq!(resumed.histogram().snapshot(), policy.histogram().snapshot());
    }

    #[test]
    fn test_training_state_nests_base_state() {
        let dqn = DqnAgent::new(DqnConfig::default(), 3, 2);
        let policy = EpsilonGreedy::new(dqn, linear_to_zero(), 2);
        let json = policy.training_state_json();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["calls"], 0);
        assert_eq!(value["base"]["num_actions"], 2);

        // a base with a different action set rejects the nested state
        let mut mismatched = EpsilonGreedy::new(
            DqnAgent::new(DqnConfig::default(), 3, 4),
            linear_to_zero(),
            2,
        );
        assert!(mismatched.restore_training_state_json(&json).is_err());
    }

    #[test]
    fn test_training_state_rejects_garbage() {
        let mut policy = EpsilonGreedy::new(RandomAgent::new(2), linear_to_zero(), 2);
        assert!(policy.restore_training_state_json("{}").is_err());
        assert_eq!(policy.calls(), 0);
    }
}
