//! Exponential backoff with jitter.

use rand::Rng;
use std::time::Duration;

use crate::config::RetryConfig;

/// Backoff schedule for one route. Immutable after startup.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    /// Relative jitter in [0, 1].
    pub jitter: f64,
    pub max_attempts: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl BackoffPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            multiplier: config.multiplier,
            jitter: config.jitter.clamp(0.0, 1.0),
            max_attempts: config.max_attempts.max(1),
        }
    }

    /// Un-jittered delay after failed attempt `attempt` (1-based):
    /// `min(max_delay, base_delay * multiplier^(attempt-1))`.
    pub fn nominal_delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
        let secs = self.base_delay.as_secs_f64() * self.multiplier.powi(exponent);
        let capped = secs.min(self.max_delay.as_secs_f64());
        if capped.is_finite() && capped >= 0.0 {
            Duration::from_secs_f64(capped)
        } else {
            self.max_delay
        }
    }

    /// Range the jittered delay is drawn from, clamped to `max_delay`.
    pub fn delay_bounds(&self, attempt: u32) -> (Duration, Duration) {
        let nominal = self.nominal_delay(attempt);
        let lower = nominal.mul_f64(1.0 - self.jitter);
        let upper = nominal.mul_f64(1.0 + self.jitter).min(self.max_delay);
        (lower.min(upper), upper)
    }

    /// Delay to sleep before the attempt following `attempt`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let (lower, upper) = self.delay_bounds(attempt);
        if lower >= upper {
            return upper;
        }
        rand::thread_rng().gen_range(lower..=upper)
    }
}
