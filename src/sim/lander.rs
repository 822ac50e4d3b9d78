use super::{Observation, Simulation};

/// mm/ms², the unit the thrust settings are expressed in.
const GRAVITY: f64 = 9.81 * 1000.0;
const THRUST_MAX: f64 = GRAVITY * 1.1;
const THRUST_MIN: f64 = GRAVITY * 0.9;
/// Display scale; also scales the effective acceleration.
const PIXELS_PER_MM: f64 = 10.0 / 1000.0;
const LANDING_VELOCITY_THRESHOLD_KMH: f64 = 10.0;
pub const FUEL_START: f64 = 4000.0;

/// Observation layout.
pub const FEATURE_HEIGHT: usize = 0;
pub const FEATURE_VELOCITY: usize = 1;
pub const FEATURE_CRITICAL_VELOCITY: usize = 2;
pub const FEATURE_THRUST: usize = 3;
pub const FEATURE_TURN: usize = 4;
pub const FEATURE_LANDED: usize = 5;
pub const FEATURE_CRASHED: usize = 6;
pub const FEATURE_SECONDS: usize = 7;
pub const FEATURE_FUEL: usize = 8;
pub const FEATURE_COUNT: usize = 9;

/// Thrust settings, in model output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LanderAction {
    /// Thrust equal to gravity.
    Nothing,
    ThrustUp,
    ThrustDown,
}

impl LanderAction {
    pub const ALL: [LanderAction; 3] = [
        LanderAction::Nothing,
        LanderAction::ThrustUp,
        LanderAction::ThrustDown,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn index(self) -> usize {
        self as usize
    }

    fn requested_thrust(self) -> f64 {
        match self {
            LanderAction::Nothing => GRAVITY,
            LanderAction::ThrustUp => THRUST_MAX,
            LanderAction::ThrustDown => THRUST_MIN,
        }
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct LanderConfig {
    /// Virtual milliseconds advanced per tick.
    pub tick_millis: u64,
    pub start_height_m: f64,
    /// Episode ends when the speed exceeds this in either direction.
    pub safety_velocity_kmh: f64,
    pub max_seconds: f64,
    /// A lander still at or above `hover_height_m` after `hover_seconds`
    /// is not descending and the episode ends.
    pub hover_seconds: f64,
    pub hover_height_m: f64,
}

impl Default for LanderConfig {
    fn default() -> Self {
        LanderConfig {
            tick_millis: 100,
            start_height_m: 100.0,
            safety_velocity_kmh: 250.0,
            max_seconds: 60.0,
            hover_seconds: 16.0,
            hover_height_m: 90.0,
        }
    }
}

/// Vertical descent under gravity with a three-setting thruster and a fuel
/// tank. Velocity is positive downwards.
pub struct Lander {
    config: LanderConfig,
    height_m: f64,
    velocity_ms: f64,
    thrust: f64,
    fuel: f64,
    elapsed_ms: u64,
    landed: bool,
    crashed: bool,
    turn: f32,
    pending: Option<LanderAction>,
}

impl Lander {
    pub fn new(config: LanderConfig) -> Self {
        let mut lander = Lander {
            height_m: config.start_height_m,
            config,
            velocity_ms: 0.0,
            thrust: THRUST_MIN,
            fuel: FUEL_START,
            elapsed_ms: 0,
            landed: false,
            crashed: false,
            turn: 1.0,
            pending: None,
        };
        lander.reset_state();
        lander
    }

    pub fn height_m(&self) -> f64 {
        self.height_m
    }

    pub fn velocity_kmh(&self) -> f64 {
        self.velocity_ms * 3.6
    }

    /// Highest speed from which full thrust can still stop the lander
    /// before it reaches the ground.
    pub fn critical_velocity_kmh(&self) -> f64 {
        let v = (2.0 * THRUST_MAX / 1000.0 * self.height_m).sqrt() * 3.6;
        if v.is_nan() {
            0.0
        } else {
            v
        }
    }

    pub fn fuel(&self) -> f64 {
        self.fuel
    }

    pub fn is_landed(&self) -> bool {
        self.landed
    }

    pub fn is_crashed(&self) -> bool {
        self.crashed
    }

    pub fn elapsed_seconds(&self) -> f64 {
        self.elapsed_ms as f64 / 1000.0
    }

    /// Without fuel the engine produces nothing.
    fn validate_thrust(&self, requested: f64) -> f64 {
        if self.fuel > 0.0 {
            requested.clamp(THRUST_MIN, THRUST_MAX)
        } else {
            0.0
        }
    }

    fn advance(&mut self, dt_ms: u64) {
        let dt = dt_ms as f64 / 1000.0;
        self.velocity_ms += (GRAVITY - self.thrust) * PIXELS_PER_MM * dt;

        let consumed = self.thrust.abs() / GRAVITY * (dt_ms as f64 / 10.0);
        self.fuel = (self.fuel - consumed).max(0.0);

        self.height_m = (self.height_m - self.velocity_ms * dt).min(self.config.start_height_m);
        if self.height_m >= self.config.start_height_m {
            // pinned at the top of the scene
            self.velocity_ms = 0.0;
        }
        self.elapsed_ms += dt_ms;

        if self.height_m <= 0.0 {
            self.height_m = 0.0;
            self.landed = true;
            self.crashed = self.velocity_kmh() > LANDING_VELOCITY_THRESHOLD_KMH;
        }
    }
}

impl Simulation for Lander {
    fn name(&self) -> &str {
        "lander"
    }

    fn action_count(&self) -> usize {
        LanderAction::ALL.len()
    }

    fn apply_input(&mut self, action: usize) {
        let action = LanderAction::from_index(action)
            .unwrap_or_else(|| panic!("lander action {action} out of range"));
        self.pending = Some(action);
    }

    fn tick(&mut self) {
        self.turn = -self.turn;
        if let Some(action) = self.pending.take() {
            self.thrust = self.validate_thrust(action.requested_thrust());
        }
        if self.is_terminal() {
            return;
        }
        self.advance(self.config.tick_millis);
    }

    fn reset_state(&mut self) {
        self.height_m = self.config.start_height_m;
        self.velocity_ms = 0.0;
        self.thrust = THRUST_MIN;
        self.fuel = FUEL_START;
        self.elapsed_ms = 0;
        self.landed = false;
        self.crashed = false;
        self.turn = 1.0;
        self.pending = None;
    }

    fn is_terminal(&self) -> bool {
        let seconds = self.elapsed_seconds();
        self.landed
            || self.fuel <= 0.0
            || self.velocity_kmh().abs() > self.config.safety_velocity_kmh
            || seconds > self.config.max_seconds
            || (seconds > self.config.hover_seconds && self.height_m >= self.config.hover_height_m)
    }

    fn snapshot_observation(&self) -> Observation {
        Observation::new(
            vec![
                self.height_m as f32,
                self.velocity_kmh() as f32,
                self.critical_velocity_kmh() as f32,
                (self.thrust / 1000.0) as f32,
                self.turn,
                self.landed as u8 as f32,
                self.crashed as u8 as f32,
                self.elapsed_seconds() as f32,
                (self.fuel / FUEL_START) as f32,
            ],
            self.is_terminal(),
        )
    }

    /// Punishes climbing and lingering high up, rewards a soft touchdown
    /// heavily and otherwise rewards staying under the critical speed.
    fn reward(_pre: &Observation, action: usize, post: &Observation) -> f32 {
        let height = post.feature(FEATURE_HEIGHT);
        let velocity = post.feature(FEATURE_VELOCITY);
        let thrust = post.feature(FEATURE_THRUST) * 1000.0;

        if velocity <= 0.0 || height > 80.0 {
            let bonus = if action == LanderAction::ThrustUp.index() {
                200.0
            } else {
                0.0
            };
            return -1000.0 - height + velocity - thrust + bonus;
        }
        if post.feature(FEATURE_LANDED) > 0.5 {
            if post.feature(FEATURE_CRASHED) > 0.5 {
                return -500.0 - height - velocity;
            }
            return 10000.0 + 1.0 / post.feature(FEATURE_SECONDS);
        }
        1000.0 - (post.feature(FEATURE_CRITICAL_VELOCITY) - velocity)
    }
}
