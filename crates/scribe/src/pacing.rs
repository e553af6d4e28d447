//! Randomized request pacing.
//!
//! Delays are computed, never slept on here; the controller owns the actual
//! suspension.

use std::time::Duration;

use rand::RngExt;

/// Inter-request delay policy with an occasional long cooldown.
#[derive(Debug, Clone, PartialEq)]
pub struct PacingPolicy {
    /// Chance that a delay gets an extra cooldown added.
    pub cooldown_probability: f64,
    pub cooldown_min: Duration,
    pub cooldown_max: Duration,
}

impl Default for PacingPolicy {
    fn default() -> Self {
        Self {
            cooldown_probability: 0.05,
            cooldown_min: Duration::from_secs(10),
            cooldown_max: Duration::from_secs(30),
        }
    }
}

impl PacingPolicy {
    /// Draw the next inter-request delay from `[min, max]`, plus a cooldown
    /// from `[cooldown_min, cooldown_max]` with `cooldown_probability`.
    pub fn next_delay(&self, min: Duration, max: Duration) -> Duration {
        self.next_delay_with(&mut rand::rng(), min, max)
    }

    pub fn next_delay_with<R: RngExt>(&self, rng: &mut R, min: Duration, max: Duration) -> Duration {
        let mut delay = uniform_delay_with(rng, min, max);
        if rng.random_bool(self.cooldown_probability.clamp(0.0, 1.0)) {
            delay += uniform_delay_with(rng, self.cooldown_min, self.cooldown_max);
        }
        delay
    }
}

/// Uniform draw from `[min, max]`. Collapses to `min` when the range is empty.
pub fn uniform_delay(min: Duration, max: Duration) -> Duration {
    uniform_delay_with(&mut rand::rng(), min, max)
}

pub fn uniform_delay_with<R: RngExt>(rng: &mut R, min: Duration, max: Duration) -> Duration {
    if max <= min {
        return min;
    }
    let secs = rng.random_range(min.as_secs_f64()..=max.as_secs_f64());
    Duration::from_secs_f64(secs).clamp(min, max)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLES: usize = 20_000;

    #[test]
    fn delay_never_below_min() {
        let policy = PacingPolicy::default();
        let min = Duration::from_secs(3);
        let max = Duration::from_secs(10);
        for _ in 0..SAMPLES {
            assert!(policy.next_delay(min, max) >= min);
        }
    }

    #[test]
    fn cooldown_rate_is_about_five_percent() {
        let policy = PacingPolicy::default();
        let min = Duration::from_secs(3);
        let max = Duration::from_secs(10);

        let mut rng = rand::rng();
        let long: Vec<_> = (0..SAMPLES)
            .map(|_| policy.next_delay_with(&mut rng, min, max))
            .filter(|delay| *delay > max)
            .collect();
        assert!(long.iter().all(|d| *d >= min + Duration::from_secs(10)));
        let long = long.len();

        // Expected 1000, standard deviation about 31.
        assert!((800..=1200).contains(&long), "long cooldowns: {long}");
    }

    #[test]
    fn delay_within_bounds_without_cooldown() {
        let policy = PacingPolicy {
            cooldown_probability: 0.0,
            ..PacingPolicy::default()
        };
        let min = Duration::from_secs(1);
        let max = Duration::from_secs(2);
        for _ in 0..1_000 {
            let delay = policy.next_delay(min, max);
            assert!(delay >= min && delay <= max, "{delay:?}");
        }
    }

    #[test]
    fn forced_cooldown_adds_ten_to_thirty_seconds() {
        let policy = PacingPolicy {
            cooldown_probability: 1.0,
            ..PacingPolicy::default()
        };
        let base = Duration::from_secs(5);
        for _ in 0..1_000 {
            let delay = policy.next_delay(base, base);
            assert!(delay >= Duration::from_secs(15) && delay <= Duration::from_secs(35));
        }
    }

    #[test]
    fn equal_bounds_are_exact() {
        let d = Duration::from_secs(4);
        assert_eq!(uniform_delay(d, d), d);
        assert_eq!(uniform_delay(Duration::ZERO, Duration::ZERO), Duration::ZERO);
    }
}
