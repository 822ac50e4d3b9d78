use std::collections::VecDeque;

/// Result of a single finished episode.
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeResult {
    /// Reward of the final transition.
    pub terminal_reward: f32,
    pub total_reward: f32,
    pub length: usize,
    /// Ended by the step limit rather than a terminal state.
    pub truncated: bool,
}

impl EpisodeResult {
    /// An episode is won when its final reward is positive.
    pub fn is_win(&self) -> bool {
        self.terminal_reward > 0.0
    }
}

/// Training metrics tracker with rolling window computations.
pub struct TrainingMetrics {
    episode_results: VecDeque<EpisodeResult>,
    update_losses: VecDeque<f32>,
    capacity: usize,
    // lifetime counts, never capped
    total_episodes: usize,
    total_updates: usize,
}

impl TrainingMetrics {
    pub fn with_capacity(capacity: usize) -> Self {
        TrainingMetrics {
            episode_results: VecDeque::with_capacity(capacity),
            update_losses: VecDeque::with_capacity(capacity),
            capacity,
            total_episodes: 0,
            total_updates: 0,
        }
    }

    pub fn new() -> Self {
        Self::with_capacity(100)
    }

    pub fn record_episode(&mut self, result: EpisodeResult) {
        self.total_episodes += 1;
        self.episode_results.push_back(result);
        if self.episode_results.len() > self.capacity {
            self.episode_results.pop_front();
        }
    }

    pub fn record_update(&mut self, loss: f32) {
        self.total_updates += 1;
        self.update_losses.push_back(loss);
        if self.update_losses.len() > self.capacity {
            self.update_losses.pop_front();
        }
    }

    fn recent(&self, last_n: usize) -> impl Iterator<Item = &EpisodeResult> {
        self.episode_results.iter().rev().take(last_n)
    }

    /// Wins among the last N episodes.
    pub fn wins(&self, last_n: usize) -> usize {
        self.recent(last_n).filter(|r| r.is_win()).count()
    }

    /// Average loss over the last N updates.
    pub fn average_loss(&self, last_n: usize) -> f32 {
        let n = self.update_losses.len().min(last_n);
        if n == 0 {
            return 0.0;
        }
        let sum: f32 = self.update_losses.iter().rev().take(n).sum();
        sum / n as f32
    }

    /// Average episode length over the last N episodes.
    pub fn average_episode_length(&self, last_n: usize) -> f32 {
        let n = self.episode_results.len().min(last_n);
        if n == 0 {
            return 0.0;
        }
        let total: usize = self.recent(n).map(|r| r.length).sum();
        total as f32 / n as f32
    }

    /// Average undiscounted return over the last N episodes.
    pub fn average_reward(&self, last_n: usize) -> f32 {
        let n = self.episode_results.len().min(last_n);
        if n == 0 {
            return 0.0;
        }
        let total: f32 = self.recent(n).map(|r| r.total_reward).sum();
        total / n as f32
    }

    pub fn total_episodes(&self) -> usize {
        self.total_episodes
    }

    pub fn total_updates(&self) -> usize {
        self.total_updates
    }
}

impl Default for TrainingMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(terminal_reward: f32, length: usize) -> EpisodeResult {
        EpisodeResult {
            terminal_reward,
            total_reward: terminal_reward * 2.0,
            length,
            truncated: false,
        }
    }

    #[test]
    fn test_wins() {
        let mut m = TrainingMetrics::new();
        for _ in 0..7 {
            m.record_episode(result(1.0, 10));
        }
        for _ in 0..3 {
            m.record_episode(result(-1.0, 10));
        }
        assert_eq!(m.wins(10), 7);
        assert_eq!(m.wins(100), 7);
        // last 3 were all losses
        assert_eq!(m.wins(3), 0);
    }

    #[test]
    fn test_zero_terminal_reward_is_not_a_win() {
        assert!(!result(0.0, 1).is_win());
        assert!(result(0.01, 1).is_win());
    }

    #[test]
    fn test_average_loss() {
        let mut m = TrainingMetrics::new();
        m.record_update(1.0);
        m.record_update(3.0);
        m.record_update(5.0);
        assert!((m.average_loss(10) - 3.0).abs() < 1e-6);
        // only the two most recent updates
        assert!((m.average_loss(2) - 4.0).abs() < 1e-6);
        assert_eq!(m.total_updates(), 3);
    }

    #[test]
    fn test_average_episode_length_and_reward() {
        let mut m = TrainingMetrics::new();
        m.record_episode(result(1.0, 20));
        m.record_episode(result(-2.0, 30));
        assert!((m.average_episode_length(10) - 25.0).abs() < 1e-6);
        assert!((m.average_reward(10) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_window_is_capped_but_total_is_not() {
        let mut m = TrainingMetrics::with_capacity(2);
        for i in 0..5 {
            m.record_episode(result(i as f32, 1));
        }
        assert_eq!(m.total_episodes(), 5);
        assert_eq!(m.wins(100), 2);

        let mut m = TrainingMetrics::with_capacity(2);
        for loss in [1.0, 2.0, 3.0] {
            m.record_update(loss);
        }
        assert_eq!(m.total_updates(), 3);
        assert!((m.average_loss(100) - 2.5).abs() < 1e-6);
    }

    #[test]
    fn test_empty_metrics() {
        let m = TrainingMetrics::new();
        assert_eq!(m.wins(10), 0);
        assert_eq!(m.average_loss(10), 0.0);
        assert_eq!(m.average_loss(0), 0.0);
        assert_eq!(m.average_episode_length(10), 0.0);
    }
}
