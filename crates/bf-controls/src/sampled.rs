//! Sampled execution primitives for digital controllers.
//!
//! Controllers run in sampled mode with a configured sample period. Callers may
//! invoke them more often than that; between samples the previous result is
//! held (zero-order hold) and nothing is recomputed.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ControlError, ControlResult};

/// Sample configuration for a controller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleConfig {
    /// Sample period in seconds.
    pub dt: f64,
}

impl SampleConfig {
    /// Create a new sample configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if `dt` is not a positive, finite number.
    pub fn new(dt: f64) -> ControlResult<Self> {
        if !dt.is_finite() || dt <= 0.0 {
            return Err(ControlError::InvalidArg {
                what: "sample time must be positive",
            });
        }
        Ok(Self { dt })
    }

    /// Create a sample configuration from frequency in Hz.
    pub fn from_frequency(freq_hz: f64) -> ControlResult<Self> {
        if !freq_hz.is_finite() || freq_hz <= 0.0 {
            return Err(ControlError::InvalidArg {
                what: "frequency must be positive",
            });
        }
        Self::new(1.0 / freq_hz)
    }

    /// Get the sample frequency in Hz.
    pub fn frequency(&self) -> f64 {
        1.0 / self.dt
    }

    /// Sample period as a [`Duration`].
    pub fn period(&self) -> Duration {
        Duration::from_secs_f64(self.dt)
    }
}

/// Gate deciding whether a new sample may be taken.
///
/// The first call to [`SampleGate::ready`] after construction or
/// [`SampleGate::reset`] always passes. Afterwards a sample is due once at
/// least one period has elapsed since the last accepted one. Readings that go
/// backwards never pass.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleGate {
    period: Duration,
    last_sample: Option<Duration>,
}

impl SampleGate {
    pub fn new(config: SampleConfig) -> Self {
        Self {
            period: config.period(),
            last_sample: None,
        }
    }

    /// Check whether a sample is due at `now`.
    pub fn ready(&self, now: Duration) -> bool {
        match self.last_sample {
            None => true,
            Some(last) => now
                .checked_sub(last)
                .is_some_and(|elapsed| elapsed >= self.period),
        }
    }

    /// Record that a sample was taken at `now`.
    pub fn mark(&mut self, now: Duration) {
        self.last_sample = Some(now);
    }

    /// Check and record in one step. Returns `true` if the sample was taken.
    pub fn try_sample(&mut self, now: Duration) -> bool {
        if self.ready(now) {
            self.mark(now);
            true
        } else {
            false
        }
    }

    /// Forget the last sample; the next check passes.
    pub fn reset(&mut self) {
        self.last_sample = None;
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn last_sample(&self) -> Option<Duration> {
        self.last_sample
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_config_creation() {
        let config = SampleConfig::new(0.1).unwrap();
        assert_eq!(config.dt, 0.1);
        assert!((config.frequency() - 10.0).abs() < 1e-10);
    }

    #[test]
    fn sample_config_from_frequency() {
        let config = SampleConfig::from_frequency(10.0).unwrap();
        assert!((config.dt - 0.1).abs() < 1e-10);
    }

    #[test]
    fn sample_config_rejects_non_positive() {
        assert!(SampleConfig::new(0.0).is_err());
        assert!(SampleConfig::new(-1.0).is_err());
        assert!(SampleConfig::new(f64::NAN).is_err());
        assert!(SampleConfig::from_frequency(0.0).is_err());
    }

    #[test]
    fn gate_first_sample_always_passes() {
        let gate = SampleGate::new(SampleConfig::new(1.0).unwrap());
        assert!(gate.ready(Duration::ZERO));
    }

    #[test]
    fn gate_holds_until_period_elapsed() {
        let mut gate = SampleGate::new(SampleConfig::new(1.0).unwrap());

        assert!(gate.try_sample(Duration::from_millis(0)));
        assert!(!gate.try_sample(Duration::from_millis(500)));
        assert!(!gate.try_sample(Duration::from_millis(999)));
        assert!(gate.try_sample(Duration::from_millis(1000)));
        assert_eq!(gate.last_sample(), Some(Duration::from_millis(1000)));
    }

    #[test]
    fn gate_rejects_time_going_backwards() {
        let mut gate = SampleGate::new(SampleConfig::new(1.0).unwrap());
        gate.mark(Duration::from_secs(10));
        assert!(!gate.ready(Duration::from_secs(5)));
    }

    #[test]
    fn gate_reset() {
        let mut gate = SampleGate::new(SampleConfig::new(1.0).unwrap());
        gate.mark(Duration::from_secs(3));
        gate.reset();
        assert!(gate.ready(Duration::from_secs(3)));
    }
}
