//! Deterministic simulations for exercising the bridge and the trainer.

use std::thread;
use std::time::Duration;

use super::{Observation, Simulation};

/// Counts ticks and resets. Features: `[ticks since creation, last action,
/// resets]`. Terminal once `episode_len` ticks have passed since the last
/// reset, never when `episode_len` is `None`.
pub struct CountingSim {
    actions: usize,
    episode_len: Option<u64>,
    tick_delay: Duration,
    ticks: u64,
    ticks_since_reset: u64,
    resets: u64,
    last_action: Option<usize>,
    pending: Option<usize>,
}

impl CountingSim {
    pub fn new(actions: usize, episode_len: Option<u64>) -> Self {
        CountingSim {
            actions,
            episode_len,
            tick_delay: Duration::ZERO,
            ticks: 0,
            ticks_since_reset: 0,
            resets: 0,
            last_action: None,
            pending: None,
        }
    }

    /// Sleep inside every tick and reset, widening race windows.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.tick_delay = delay;
        self
    }

    pub const TICKS: usize = 0;
    pub const LAST_ACTION: usize = 1;
    pub const RESETS: usize = 2;
}

impl Simulation for CountingSim {
    fn name(&self) -> &str {
        "counting"
    }

    fn action_count(&self) -> usize {
        self.actions
    }

    fn apply_input(&mut self, action: usize) {
        self.pending = Some(action);
    }

    fn tick(&mut self) {
        if !self.tick_delay.is_zero() {
            thread::sleep(self.tick_delay);
        }
        self.last_action = self.pending.take();
        self.ticks += 1;
        self.ticks_since_reset += 1;
    }

    fn reset_state(&mut self) {
        if !self.tick_delay.is_zero() {
            thread::sleep(self.tick_delay);
        }
        self.resets += 1;
        self.ticks_since_reset = 0;
        self.pending = None;
        self.last_action = None;
    }

    fn is_terminal(&self) -> bool {
        self.episode_len
            .is_some_and(|len| self.ticks_since_reset >= len)
    }

    fn snapshot_observation(&self) -> Observation {
        Observation::new(
            vec![
                self.ticks as f32,
                self.last_action.map_or(-1.0, |a| a as f32),
                self.resets as f32,
            ],
            self.is_terminal(),
        )
    }

    fn reward(_pre: &Observation, action: usize, _post: &Observation) -> f32 {
        action as f32
    }
}

/// One-step episodes whose terminal reward alternates by episode: +1 for
/// even episodes, -1 for odd ones, counted from the first reset. Episodes
/// listed in `faulty` panic inside their tick.
pub struct ParitySim {
    episode: Option<u64>,
    faulty: Vec<u64>,
    done: bool,
    outcome: f32,
}

impl ParitySim {
    pub fn new() -> Self {
        ParitySim {
            episode: None,
            faulty: Vec::new(),
            done: false,
            outcome: 0.0,
        }
    }

    pub fn with_faulty_episodes(faulty: Vec<u64>) -> Self {
        ParitySim {
            faulty,
            ..ParitySim::new()
        }
    }
}

impl Simulation for ParitySim {
    fn name(&self) -> &str {
        "parity"
    }

    fn action_count(&self) -> usize {
        2
    }

    fn apply_input(&mut self, _action: usize) {}

    fn tick(&mut self) {
        let episode = self.episode.unwrap_or(0);
        if self.faulty.contains(&episode) {
            panic!("scripted fault in episode {episode}");
        }
        self.outcome = if episode % 2 == 0 { 1.0 } else { -1.0 };
        self.done = true;
    }

    fn reset_state(&mut self) {
        self.episode = Some(self.episode.map_or(0, |e| e + 1));
        self.done = false;
        self.outcome = 0.0;
    }

    fn is_terminal(&self) -> bool {
        self.done
    }

    fn snapshot_observation(&self) -> Observation {
        Observation::new(vec![self.outcome, 1.0], self.done)
    }

    fn reward(_pre: &Observation, _action: usize, post: &Observation) -> f32 {
        post.feature(0)
    }
}
