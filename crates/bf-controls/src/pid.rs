//! Sampled PID controller.
//!
//! - Gated by wall-clock sample time: calling [`PidController::calc`] more often
//!   than the sample period returns the held output without recomputing
//! - Integral gains are pre-scaled by the sample time (`ki * dt`, `kd / dt`)
//! - Anti-windup: the integral only accumulates while the previous output was
//!   strictly inside the output limits, and is itself clamped to them
//! - Derivative acts on the measurement, so setpoint steps do not kick

use bf_core::SharedClock;
use tracing::trace;

use crate::error::{ControlError, ControlResult};
use crate::sampled::{SampleConfig, SampleGate};
use crate::tuning::PidGains;

/// Default lower output limit (heater duty cycle, %).
pub const OUT_MIN: f64 = 0.0;
/// Default upper output limit (heater duty cycle, %).
pub const OUT_MAX: f64 = 100.0;

pub struct PidController {
    gate: SampleGate,
    kp: f64,
    ki: f64,
    kd: f64,
    out_min: f64,
    out_max: f64,
    integral: f64,
    last_input: Option<f64>,
    last_output: f64,
    clock: SharedClock,
}

impl PidController {
    /// Create a PID controller with the default `[0, 100]` output range.
    pub fn new(sample_time_s: f64, gains: PidGains, clock: SharedClock) -> ControlResult<Self> {
        Self::with_limits(sample_time_s, gains, OUT_MIN, OUT_MAX, clock)
    }

    /// Create a PID controller.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::InvalidArg`] if a gain is not a finite number,
    /// the sample time is not positive, or `out_min >= out_max`.
    pub fn with_limits(
        sample_time_s: f64,
        gains: PidGains,
        out_min: f64,
        out_max: f64,
        clock: SharedClock,
    ) -> ControlResult<Self> {
        if !gains.kp.is_finite() {
            return Err(ControlError::InvalidArg {
                what: "kp must be specified",
            });
        }
        if !gains.ki.is_finite() {
            return Err(ControlError::InvalidArg {
                what: "ki must be specified",
            });
        }
        if !gains.kd.is_finite() {
            return Err(ControlError::InvalidArg {
                what: "kd must be specified",
            });
        }
        let sample = SampleConfig::new(sample_time_s)?;
        if !(out_min < out_max) {
            return Err(ControlError::InvalidArg {
                what: "out_min must be less than out_max",
            });
        }

        Ok(Self {
            gate: SampleGate::new(sample),
            kp: gains.kp,
            ki: gains.ki * sample.dt,
            kd: gains.kd / sample.dt,
            out_min,
            out_max,
            integral: 0.0,
            last_input: None,
            last_output: 0.0,
            clock,
        })
    }

    /// Compute the controller output for a measurement and setpoint.
    ///
    /// Returns the held output unchanged if the sample period has not elapsed
    /// yet, or if either argument is not finite.
    pub fn calc(&mut self, input: f64, setpoint: f64) -> f64 {
        let now = self.clock.now();
        if !self.gate.ready(now) || !input.is_finite() || !setpoint.is_finite() {
            return self.last_output;
        }

        let error = setpoint - input;
        // First sample has no history: no derivative action.
        let input_delta = self.last_input.map_or(0.0, |last| input - last);

        if self.last_output < self.out_max && self.last_output > self.out_min {
            self.integral += self.ki * error;
            self.integral = self.integral.clamp(self.out_min, self.out_max);
        }

        let p = self.kp * error;
        let i = self.integral;
        let d = -(self.kd * input_delta);

        let output = (p + i + d).clamp(self.out_min, self.out_max);
        trace!(p, i, d, output, "pid sample");

        self.last_output = output;
        self.last_input = Some(input);
        self.gate.mark(now);
        output
    }

    /// Last computed output.
    pub fn output(&self) -> f64 {
        self.last_output
    }

    /// Output limits `(min, max)`.
    pub fn limits(&self) -> (f64, f64) {
        (self.out_min, self.out_max)
    }
}

impl std::fmt::Debug for PidController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PidController")
            .field("kp", &self.kp)
            .field("ki", &self.ki)
            .field("kd", &self.kd)
            .field("out_min", &self.out_min)
            .field("out_max", &self.out_max)
            .field("last_output", &self.last_output)
            .finish_non_exhaustive()
    }
}
