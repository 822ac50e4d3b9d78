use std::f32::consts::PI;

/// Exploration rate as a function of the number of decisions made so far.
pub trait ExplorationRate: Send {
    fn rate(&self, t: u64) -> f32;
}

impl<F> ExplorationRate for F
where
    F: Fn(u64) -> f32 + Send,
{
    fn rate(&self, t: u64) -> f32 {
        self(t)
    }
}

/// Configurable ε schedule.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EpsilonSchedule {
    /// Fixed `value`.
    Constant { value: f32 },
    /// Straight line from `start` to `end` over `steps`, then `end`.
    Linear { start: f32, end: f32, steps: u64 },
    /// Half cosine wave from `start` to `end` over `steps`, then `end`.
    Cosine { start: f32, end: f32, steps: u64 },
    /// `(start - end) * (1 - t/steps)^power + end`, then `end`.
    Polynomial {
        start: f32,
        end: f32,
        steps: u64,
        power: f32,
    },
    /// Triangle wave between `min` and `max`: rises for the first half of
    /// each `period`, falls for the second.
    Cyclical { min: f32, max: f32, period: u64 },
}

impl Default for EpsilonSchedule {
    fn default() -> Self {
        EpsilonSchedule::Cyclical {
            min: 0.1,
            max: 0.9,
            period: 4000,
        }
    }
}

impl EpsilonSchedule {
    pub fn validate(&self) -> Result<(), String> {
        let in_unit = |v: f32| (0.0..=1.0).contains(&v);
        match *self {
            EpsilonSchedule::Constant { value } if !in_unit(value) => {
                Err(format!("constant value {value} must be in [0, 1]"))
            }
            EpsilonSchedule::Linear { start, end, .. }
            | EpsilonSchedule::Cosine { start, end, .. }
            | EpsilonSchedule::Polynomial { start, end, .. }
                if !in_unit(start) || !in_unit(end) =>
            {
                Err(format!("start {start} and end {end} must be in [0, 1]"))
            }
            EpsilonSchedule::Polynomial { power, .. } if power <= 0.0 => {
                Err(format!("polynomial power {power} must be > 0"))
            }
            EpsilonSchedule::Cyclical { min, max, .. } if !in_unit(min) || !in_unit(max) || min > max => {
                Err(format!("cyclical bounds {min}..{max} must be ordered and in [0, 1]"))
            }
            EpsilonSchedule::Cyclical { period: 0, .. } => {
                Err("cyclical period must be > 0".to_string())
            }
            _ => Ok(()),
        }
    }
}

/// Fraction of `steps` covered by `t`, saturating at 1. Zero steps means done.
fn progress(t: u64, steps: u64) -> f32 {
    if steps == 0 {
        1.0
    } else {
        (t as f64 / steps as f64).min(1.0) as f32
    }
}

impl ExplorationRate for EpsilonSchedule {
    fn rate(&self, t: u64) -> f32 {
        match *self {
            EpsilonSchedule::Constant { value } => value,
            EpsilonSchedule::Linear { start, end, steps } => {
                start + (end - start) * progress(t, steps)
            }
            EpsilonSchedule::Cosine { start, end, steps } => {
                let p = progress(t, steps);
                end + (start - end) * 0.5 * (1.0 + (PI * p).cos())
            }
            EpsilonSchedule::Polynomial {
                start,
                end,
                steps,
                power,
            } => (start - end) * (1.0 - progress(t, steps)).powf(power) + end,
            EpsilonSchedule::Cyclical { min, max, period } => {
                // a zero period degenerates to a flat `min`
                let period = period.max(1);
                let phase = (t % period) as f32 / period as f32;
                let height = 1.0 - (2.0 * phase - 1.0).abs();
                min + (max - min) * height
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn test_closure_is_a_rate() {
        let rate = |t: u64| if t < 10 { 1.0 } else { 0.0 };
        assert_eq!(rate.rate(3), 1.0);
        assert_eq!(rate.rate(10), 0.0);
    }

    #[test]
    fn test_linear() {
        let s = EpsilonSchedule::Linear {
            start: 0.9,
            end: 0.1,
            steps: 100,
        };
        assert!(close(s.rate(0), 0.9));
        assert!(close(s.rate(50), 0.5));
        assert!(close(s.rate(100), 0.1));
        assert!(close(s.rate(10_000), 0.1));
    }

    #[test]
    fn test_cosine_endpoints_and_midpoint() {
        let s = EpsilonSchedule::Cosine {
            start: 1.0,
            end: 0.0,
            steps: 200,
        };
        assert!(close(s.rate(0), 1.0));
        assert!(close(s.rate(100), 0.5));
        assert!(close(s.rate(200), 0.0));
        assert!(close(s.rate(500), 0.0));
    }

    #[test]
    fn test_polynomial() {
        let s = EpsilonSchedule::Polynomial {
            start: 1.0,
            end: 0.0,
            steps: 10,
            power: 2.0,
        };
        assert!(close(s.rate(0), 1.0));
        assert!(close(s.rate(5), 0.25));
        assert!(close(s.rate(10), 0.0));
    }

    #[test]
    fn test_cyclical_triangle() {
        let s = EpsilonSchedule::Cyclical {
            min: 0.1,
            max: 0.9,
            period: 100,
        };
        assert!(close(s.rate(0), 0.1));
        assert!(close(s.rate(50), 0.9));
        assert!(close(s.rate(25), 0.5));
        assert!(close(s.rate(100), 0.1));
        assert!(close(s.rate(150), 0.9));
    }

    #[test]
    fn test_zero_steps_jumps_to_end() {
        let s = EpsilonSchedule::Linear {
            start: 1.0,
            end: 0.05,
            steps: 0,
        };
        assert!(close(s.rate(0), 0.05));
    }

    #[test]
    fn test_cyclical_zero_period_stays_at_min() {
        let schedule = EpsilonSchedule::Cyclical {
            min: 0.2,
            max: 0.8,
            period: 0,
        };
        for t in [0, 1, 7, u64::MAX] {
            assert!(close(schedule.rate(t), 0.2));
        }
    }

    #[test]
    fn test_validate() {
        assert!(EpsilonSchedule::default().validate().is_ok());
        assert!(EpsilonSchedule::Constant { value: 1.5 }.validate().is_err());
        assert!(EpsilonSchedule::Cyclical {
            min: 0.1,
            max: 0.9,
            period: 0
        }
        .validate()
        .is_err());
        assert!(EpsilonSchedule::Polynomial {
            start: 1.0,
            end: 0.0,
            steps: 10,
            power: 0.0
        }
        .validate()
        .is_err());
    }

    #[test]
    fn test_toml_round_trip_uses_kind_tag() {
        #[derive(serde::Serialize, serde::Deserialize)]
        struct Wrapper {
            schedule: EpsilonSchedule,
        }
        let parsed: Wrapper = toml::from_str(
            r#"
            [schedule]
            kind = "linear"
            start = 0.9
            end = 0.1
            steps = 1000
            "#,
        )
        .unwrap();
        assert_eq!(
            parsed.schedule,
            EpsilonSchedule::Linear {
                start: 0.9,
                end: 0.1,
                steps: 1000
            }
        );
    }
}
