use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{Observation, Simulation};

const BALL_RADIUS: f64 = 5.0;
const PADDLE_WIDTH: f64 = 80.0;
const PADDLE_HEIGHT: f64 = 10.0;
const SCENE_WIDTH: f64 = 400.0;
const SCENE_HEIGHT: f64 = 400.0;
/// Vertical ball speed and the maximum horizontal deflection, px/s.
const VELOCITY: f64 = 400.0;

/// Observation layout.
pub const FEATURE_SIDE: usize = 0;
pub const FEATURE_OFFSET: usize = 1;
pub const FEATURE_BALL_VX: usize = 2;
pub const FEATURE_BALL_Y: usize = 3;
pub const FEATURE_PADDLE_WIDTH: usize = 4;
pub const FEATURE_TURN: usize = 5;
pub const FEATURE_COUNT: usize = 6;

/// Paddle inputs, in model output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakoutAction {
    Stay,
    Left,
    Right,
}

impl BreakoutAction {
    pub const ALL: [BreakoutAction; 3] = [
        BreakoutAction::Stay,
        BreakoutAction::Left,
        BreakoutAction::Right,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Breakout tuning.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct BreakoutConfig {
    /// Virtual seconds advanced per tick.
    pub tick_seconds: f64,
    /// Paddle travel per input, px.
    pub paddle_step: f64,
    /// Episode ends once this many returns have been made.
    pub score_target: u32,
}

impl Default for BreakoutConfig {
    fn default() -> Self {
        BreakoutConfig {
            tick_seconds: 1.0 / 60.0,
            paddle_step: 6.0,
            score_target: 10,
        }
    }
}

/// Paddle and ball. The ball bounces off the side and top walls; the episode
/// ends when it passes the paddle or the score target is reached.
pub struct Breakout {
    config: BreakoutConfig,
    ball_x: f64,
    ball_y: f64,
    ball_vx: f64,
    ball_vy: f64,
    paddle_x: f64,
    score: u32,
    turn: f32,
    done: bool,
    pending: Option<BreakoutAction>,
    rng: StdRng,
}

impl Breakout {
    pub fn new(config: BreakoutConfig, seed: u64) -> Self {
        let mut game = Breakout {
            config,
            ball_x: 0.0,
            ball_y: 0.0,
            ball_vx: 0.0,
            ball_vy: 0.0,
            paddle_x: 0.0,
            score: 0,
            turn: 1.0,
            done: false,
            pending: None,
            rng: StdRng::seed_from_u64(seed),
        };
        game.reset_state();
        game
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    fn paddle_y(&self) -> f64 {
        SCENE_HEIGHT - PADDLE_HEIGHT * 2.0
    }

    fn paddle_center(&self) -> f64 {
        self.paddle_x + PADDLE_WIDTH / 2.0
    }

    fn move_paddle(&mut self, action: BreakoutAction) {
        let step = self.config.paddle_step;
        self.paddle_x = match action {
            BreakoutAction::Stay => self.paddle_x,
            BreakoutAction::Left => (self.paddle_x - step).max(0.0),
            BreakoutAction::Right => (self.paddle_x + step).min(SCENE_WIDTH - PADDLE_WIDTH),
        };
    }

    fn ball_hits_paddle(&self) -> bool {
        let paddle_y = self.paddle_y();
        self.ball_x + BALL_RADIUS >= self.paddle_x
            && self.ball_x - BALL_RADIUS <= self.paddle_x + PADDLE_WIDTH
            && self.ball_y + BALL_RADIUS >= paddle_y
            && self.ball_y - BALL_RADIUS <= paddle_y + PADDLE_HEIGHT
    }

    fn check_done(&mut self) -> bool {
        if self.ball_y + BALL_RADIUS >= SCENE_HEIGHT || self.score >= self.config.score_target {
            self.done = true;
        }
        self.done
    }
}

impl Simulation for Breakout {
    fn name(&self) -> &str {
        "breakout"
    }

    fn action_count(&self) -> usize {
        BreakoutAction::ALL.len()
    }

    fn apply_input(&mut self, action: usize) {
        let action = BreakoutAction::from_index(action)
            .unwrap_or_else(|| panic!("breakout action {action} out of range"));
        self.pending = Some(action);
    }

    fn tick(&mut self) {
        self.turn = -self.turn;
        if let Some(action) = self.pending.take() {
            self.move_paddle(action);
        }
        if self.done {
            return;
        }

        let dt = self.config.tick_seconds;
        self.ball_x += self.ball_vx * dt;
        self.ball_y += self.ball_vy * dt;

        if (self.ball_x - BALL_RADIUS <= 0.0 && self.ball_vx < 0.0)
            || (self.ball_x + BALL_RADIUS >= SCENE_WIDTH && self.ball_vx > 0.0)
        {
            self.ball_vx = -self.ball_vx;
        }
        if self.ball_y - BALL_RADIUS <= 0.0 && self.ball_vy < 0.0 {
            self.ball_vy = -self.ball_vy;
        }

        if self.check_done() {
            return;
        }

        if self.ball_hits_paddle() && self.ball_vy > 0.0 {
            // -1 at the paddle's left edge, 1 at its right edge
            let proportion = (self.ball_x - self.paddle_center()) / (PADDLE_WIDTH / 2.0);
            self.ball_vx = proportion * VELOCITY;
            self.ball_vy = -self.ball_vy;
            self.score += 1;
            self.check_done();
        }
    }

    fn reset_state(&mut self) {
        self.ball_x = SCENE_WIDTH / 2.0;
        self.ball_y = BALL_RADIUS;
        self.ball_vx = self.rng.random_range(-100.0..100.0);
        self.ball_vy = VELOCITY;
        self.paddle_x = SCENE_WIDTH / 2.0 - PADDLE_WIDTH / 2.0;
        self.score = 0;
        self.turn = 1.0;
        self.done = false;
        self.pending = None;
    }

    fn is_terminal(&self) -> bool {
        self.done
    }

    fn snapshot_observation(&self) -> Observation {
        let offset = self.paddle_center() - self.ball_x;
        let side = if offset > 0.0 {
            1.0
        } else if offset < 0.0 {
            -1.0
        } else {
            0.0
        };
        Observation::new(
            vec![
                side,
                (offset / SCENE_WIDTH) as f32,
                (self.ball_vx / VELOCITY) as f32,
                (self.ball_y / SCENE_HEIGHT) as f32,
                (PADDLE_WIDTH / SCENE_WIDTH) as f32,
                self.turn,
            ],
            self.done,
        )
    }

    /// Positive while the paddle is under the ball, growing towards its
    /// center; otherwise the negative pixel distance.
    fn reward(_pre: &Observation, _action: usize, post: &Observation) -> f32 {
        let distance = post.feature(FEATURE_OFFSET).abs() * SCENE_WIDTH as f32;
        let width = post.feature(FEATURE_PADDLE_WIDTH) * SCENE_WIDTH as f32;
        if distance < width / 2.0 {
            (width - distance) / 10.0
        } else {
            -distance
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn game() -> Breakout {
        Breakout::new(BreakoutConfig::default(), 11)
    }

    #[test]
    fn test_initial_observation() {
        let game = game();
        let obs = game.snapshot_observation();
        assert_eq!(obs.len(), FEATURE_COUNT);
        assert!(!obs.is_terminal());
        assert_eq!(obs.feature(FEATURE_TURN), 1.0);
        // paddle starts centred under the ball
        assert_eq!(obs.feature(FEATURE_SIDE), 0.0);
    }

    #[test]
    fn test_paddle_moves_and_clamps() {
        let mut game = game();
        for _ in 0..200 {
            game.apply_input(BreakoutAction::Left.index());
            game.tick();
            if game.is_terminal() {
                break;
            }
        }
        assert_eq!(game.paddle_x, 0.0);
    }

    #[test]
    fn test_turn_alternates_per_tick() {
        let mut game = game();
        game.tick();
        assert_eq!(game.snapshot_observation().feature(FEATURE_TURN), -1.0);
        game.tick();
        assert_eq!(game.snapshot_observation().feature(FEATURE_TURN), 1.0);
    }

    #[test]
    fn test_ball_eventually_terminates_episode() {
        let mut game = game();
        let mut ticks = 0;
        while !game.is_terminal() && ticks < 100_000 {
            game.tick();
            ticks += 1;
        }
        assert!(game.is_terminal());
    }

    #[test]
    fn test_reset_restores_initial_configuration() {
        let mut game = game();
        for _ in 0..30 {
            game.apply_input(BreakoutAction::Right.index());
            game.tick();
        }
        game.reset_state();
        assert_eq!(game.score(), 0);
        assert_eq!(game.paddle_x, SCENE_WIDTH / 2.0 - PADDLE_WIDTH / 2.0);
        assert_eq!(game.ball_y, BALL_RADIUS);
        assert!(!game.is_terminal());
    }

    #[test]
    fn test_reward_sign_follows_paddle_coverage() {
        let under = Observation::new(vec![1.0, 0.05, 0.0, 0.5, 0.2, 1.0], false);
        let missed = Observation::new(vec![1.0, 0.5, 0.0, 0.5, 0.2, 1.0], false);
        assert!(Breakout::reward(&under, 0, &under) > 0.0);
        assert!((Breakout::reward(&missed, 0, &missed) + 200.0).abs() < 1e-3);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_invalid_action_panics() {
        let mut game = game();
        game.apply_input(3);
    }
}
