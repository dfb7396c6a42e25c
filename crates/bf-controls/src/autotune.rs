//! Relay-feedback PID autotuning.
//!
//! The tuner replaces the PID while active. It forces the heater between two
//! relay levels around a bias, switching whenever the process variable leaves
//! the noise band around the target. The relay induces a sustained
//! oscillation; once enough peaks of consistent amplitude have been observed,
//! the ultimate gain and period are derived from it:
//!
//! ```text
//! Ku = 4 d / (π a)      d: relay half-swing, a: induced amplitude
//! Pu = spacing of same-type peaks
//! ```
//!
//! [`crate::tuning::TuningRule`] turns `(Ku, Pu)` into PID gains.
//!
//! ## Peak detection
//!
//! A sample is a maximum if it is at least every sample of the lookback window
//! and above `target + noise_band`; a minimum if it is at most every sample
//! and below `target - noise_band`. Extremes are not trusted until the window
//! has filled. A change of extreme type is an inflection: the previous peak is
//! finalized and a new one opened, which then follows the running extreme.

use std::collections::VecDeque;
use std::f64::consts::PI;
use std::fmt;
use std::time::Duration;

use bf_core::SharedClock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{ControlError, ControlResult};
use crate::sampled::{SampleConfig, SampleGate};
use crate::tuning::{Oscillation, PidGains, TuningRule};

/// Autotuner lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AutotuneState {
    /// Constructed, not yet run.
    Init,
    /// Relay at `bias + step`.
    RelayHigh,
    /// Relay at `bias - step`.
    RelayLow,
    /// Stable oscillation observed; gains available.
    Succeeded,
    /// Gave up.
    Failed,
    /// Aborted from outside.
    Off,
}

impl AutotuneState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            AutotuneState::Succeeded | AutotuneState::Failed | AutotuneState::Off
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            AutotuneState::Init => "init",
            AutotuneState::RelayHigh => "relay step up",
            AutotuneState::RelayLow => "relay step down",
            AutotuneState::Succeeded => "succeeded",
            AutotuneState::Failed => "failed",
            AutotuneState::Off => "off",
        }
    }
}

impl fmt::Display for AutotuneState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Autotune parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutotuneConfig {
    /// Relay half-swing around `relay_bias` (% output).
    pub output_step: f64,
    /// Output level the relay swings around (% output).
    pub relay_bias: f64,
    /// Hysteresis around the target before the relay switches (°C).
    pub noise_band: f64,
    /// Length of the peak detection window (seconds).
    pub lookback_s: f64,
    /// Lower output limit.
    pub out_min: f64,
    /// Upper output limit.
    pub out_max: f64,
    /// Finalized peaks used by the convergence test.
    pub required_peaks: usize,
    /// Inflections after which tuning is abandoned.
    pub max_peaks: usize,
    /// Accepted relative deviation of the peak amplitude.
    pub peak_amplitude_tolerance: f64,
    /// Give up if no stable oscillation was found by then (seconds).
    pub max_duration_s: f64,
    /// Give up if the relay has not switched for this long (seconds).
    pub relay_timeout_s: f64,
}

impl Default for AutotuneConfig {
    fn default() -> Self {
        Self {
            output_step: 50.0,
            relay_bias: 50.0,
            noise_band: 0.5,
            lookback_s: 60.0,
            out_min: 0.0,
            out_max: 100.0,
            required_peaks: 5,
            max_peaks: 20,
            peak_amplitude_tolerance: 0.05,
            max_duration_s: 3.0 * 3600.0,
            relay_timeout_s: 3600.0,
        }
    }
}

impl AutotuneConfig {
    /// Relay output for the high state, clamped to the output limits.
    pub fn relay_high(&self) -> f64 {
        (self.relay_bias + self.output_step).clamp(self.out_min, self.out_max)
    }

    /// Relay output for the low state, clamped to the output limits.
    pub fn relay_low(&self) -> f64 {
        (self.relay_bias - self.output_step).clamp(self.out_min, self.out_max)
    }

    /// Check the configuration for a given sample time.
    pub fn validate(&self, sample_time_s: f64) -> ControlResult<()> {
        SampleConfig::new(sample_time_s)?;
        if !self.output_step.is_finite() || self.output_step <= 0.0 {
            return Err(ControlError::InvalidArg {
                what: "output_step must be positive",
            });
        }
        if !self.relay_bias.is_finite() {
            return Err(ControlError::InvalidArg {
                what: "relay_bias must be finite",
            });
        }
        if !(self.out_min < self.out_max) {
            return Err(ControlError::InvalidArg {
                what: "out_min must be less than out_max",
            });
        }
        if self.relay_high() <= self.relay_low() {
            return Err(ControlError::InvalidArg {
                what: "relay levels collapse within the output limits",
            });
        }
        if !self.noise_band.is_finite() || self.noise_band < 0.0 {
            return Err(ControlError::InvalidArg {
                what: "noise_band must be non-negative",
            });
        }
        if !self.lookback_s.is_finite() || self.lookback_s < sample_time_s {
            return Err(ControlError::InvalidArg {
                what: "lookback must be greater or equal to sample time",
            });
        }
        if self.required_peaks < 5 {
            return Err(ControlError::InvalidArg {
                what: "required_peaks must be at least 5",
            });
        }
        if self.max_peaks <= self.required_peaks {
            return Err(ControlError::InvalidArg {
                what: "max_peaks must exceed required_peaks",
            });
        }
        if !self.peak_amplitude_tolerance.is_finite() || self.peak_amplitude_tolerance <= 0.0 {
            return Err(ControlError::InvalidArg {
                what: "peak_amplitude_tolerance must be positive",
            });
        }
        if !self.max_duration_s.is_finite() || self.max_duration_s <= 0.0 {
            return Err(ControlError::InvalidArg {
                what: "max_duration_s must be positive",
            });
        }
        if !self.relay_timeout_s.is_finite() || self.relay_timeout_s <= 0.0 {
            return Err(ControlError::InvalidArg {
                what: "relay_timeout_s must be positive",
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PeakKind {
    Max,
    Min,
}

#[derive(Debug, Clone, Copy)]
struct Peak {
    kind: PeakKind,
    value: f64,
    at: Duration,
}

/// Relay-feedback autotuner.
pub struct Autotuner {
    config: AutotuneConfig,
    setpoint: f64,
    gate: SampleGate,
    window: VecDeque<f64>,
    window_len: usize,
    peaks: VecDeque<Peak>,
    open_peak: Option<Peak>,
    peak_count: usize,
    state: AutotuneState,
    output: f64,
    started_at: Duration,
    last_switch: Duration,
    oscillation: Option<Oscillation>,
    failure: Option<&'static str>,
    clock: SharedClock,
}

impl Autotuner {
    /// Create a tuner targeting `setpoint`.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::InvalidArg`] for a non-finite setpoint or an
    /// invalid configuration (see [`AutotuneConfig::validate`]).
    pub fn new(
        sample_time_s: f64,
        setpoint: f64,
        config: AutotuneConfig,
        clock: SharedClock,
    ) -> ControlResult<Self> {
        if !setpoint.is_finite() {
            return Err(ControlError::InvalidArg {
                what: "setpoint must be specified",
            });
        }
        config.validate(sample_time_s)?;
        let sample = SampleConfig::new(sample_time_s)?;
        let window_len = ((config.lookback_s / sample_time_s).round() as usize).max(1);

        Ok(Self {
            setpoint,
            gate: SampleGate::new(sample),
            window: VecDeque::with_capacity(window_len),
            window_len,
            peaks: VecDeque::with_capacity(config.required_peaks + 1),
            open_peak: None,
            peak_count: 0,
            state: AutotuneState::Init,
            output: 0.0,
            started_at: Duration::ZERO,
            last_switch: Duration::ZERO,
            oscillation: None,
            failure: None,
            config,
            clock,
        })
    }

    /// Advance the tuner with a new process reading.
    ///
    /// Returns `true` once the tuner is in a terminal state. Calls more
    /// frequent than the sample time are ignored.
    pub fn run(&mut self, input: f64) -> bool {
        if self.state.is_terminal() {
            return true;
        }

        let now = self.clock.now();
        if self.state == AutotuneState::Init {
            self.start(now);
        } else if !self.gate.ready(now) {
            return false;
        }
        if !input.is_finite() {
            return false;
        }
        self.gate.mark(now);

        if now.saturating_sub(self.started_at).as_secs_f64() > self.config.max_duration_s {
            return self.fail("oscillation did not settle in time");
        }

        self.switch_relay(input, now);
        if now.saturating_sub(self.last_switch).as_secs_f64() > self.config.relay_timeout_s {
            return self.fail("relay output did not move the process");
        }
        self.output = match self.state {
            AutotuneState::RelayLow => self.config.relay_low(),
            _ => self.config.relay_high(),
        };

        let upper = self.setpoint + self.config.noise_band;
        let lower = self.setpoint - self.config.noise_band;
        let is_max = input > upper && self.window.iter().all(|&v| input >= v);
        let is_min = input < lower && self.window.iter().all(|&v| input <= v);

        if self.window.len() == self.window_len {
            self.window.pop_front();
        }
        self.window.push_back(input);
        // Extremes are meaningless until the window has filled.
        if self.window.len() < self.window_len {
            return false;
        }

        let kind = if is_max {
            Some(PeakKind::Max)
        } else if is_min {
            Some(PeakKind::Min)
        } else {
            None
        };
        let inflection = kind.is_some_and(|kind| self.track_peak(kind, input, now));

        if inflection && self.peaks.len() >= self.config.required_peaks {
            if let Some(osc) = self.measure_oscillation() {
                self.succeed(osc);
                return true;
            }
        }

        if self.peak_count >= self.config.max_peaks {
            return self.fail("oscillation amplitude did not converge");
        }
        false
    }

    /// Abort tuning. Has no effect once terminal.
    pub fn abort(&mut self) {
        if !self.state.is_terminal() {
            self.state = AutotuneState::Off;
            self.output = 0.0;
            info!("autotune aborted");
        }
    }

    pub fn state(&self) -> AutotuneState {
        self.state
    }

    /// Relay-forced output for the current sample (0 when terminal).
    pub fn output(&self) -> f64 {
        self.output
    }

    /// Inflections seen so far; progress indicator.
    pub fn peak_count(&self) -> usize {
        self.peak_count
    }

    pub fn setpoint(&self) -> f64 {
        self.setpoint
    }

    pub fn config(&self) -> &AutotuneConfig {
        &self.config
    }

    /// Observed oscillation, available after success.
    pub fn oscillation(&self) -> Option<Oscillation> {
        self.oscillation
    }

    /// Why the tuner failed, if it did.
    pub fn failure_reason(&self) -> Option<&'static str> {
        self.failure
    }

    /// Every rule [`Autotuner::pid_parameters`] accepts.
    pub fn tuning_rules() -> &'static [TuningRule] {
        &TuningRule::ALL
    }

    /// Gains for `rule` from the observed oscillation.
    pub fn pid_parameters(&self, rule: TuningRule) -> ControlResult<PidGains> {
        self.oscillation
            .map(|osc| rule.gains(&osc))
            .ok_or_else(|| ControlError::NotTuned {
                state: self.state.to_string(),
            })
    }

    /// Gains for the rule called `name`.
    pub fn pid_parameters_by_name(&self, name: &str) -> ControlResult<PidGains> {
        self.pid_parameters(name.parse()?)
    }

    fn start(&mut self, now: Duration) {
        self.window.clear();
        self.peaks.clear();
        self.open_peak = None;
        self.peak_count = 0;
        self.oscillation = None;
        self.failure = None;
        self.gate.reset();
        self.started_at = now;
        self.last_switch = now;
        self.state = AutotuneState::RelayHigh;
        info!(
            setpoint = self.setpoint,
            high = self.config.relay_high(),
            low = self.config.relay_low(),
            "autotune started"
        );
    }

    fn switch_relay(&mut self, input: f64, now: Duration) {
        let next = match self.state {
            AutotuneState::RelayHigh if input > self.setpoint + self.config.noise_band => {
                AutotuneState::RelayLow
            }
            AutotuneState::RelayLow if input < self.setpoint - self.config.noise_band => {
                AutotuneState::RelayHigh
            }
            _ => return,
        };
        debug!(input, state = %next, "relay switched");
        self.state = next;
        self.last_switch = now;
    }

    /// Feed an extreme sample. Returns `true` on an inflection.
    fn track_peak(&mut self, kind: PeakKind, value: f64, at: Duration) -> bool {
        if let Some(open) = self.open_peak.as_mut() {
            if open.kind == kind {
                let more_extreme = match kind {
                    PeakKind::Max => value >= open.value,
                    PeakKind::Min => value <= open.value,
                };
                if more_extreme {
                    open.value = value;
                    open.at = at;
                }
                return false;
            }
        }

        if let Some(done) = self.open_peak.take() {
            self.peaks.push_back(done);
            while self.peaks.len() > self.config.required_peaks {
                self.peaks.pop_front();
            }
        }
        self.open_peak = Some(Peak { kind, value, at });
        self.peak_count += 1;
        debug!(value, peak_count = self.peak_count, "found peak");
        true
    }

    fn measure_oscillation(&self) -> Option<Oscillation> {
        let n = self.peaks.len();
        let swing: f64 = self
            .peaks
            .iter()
            .zip(self.peaks.iter().skip(1))
            .map(|(a, b)| (a.value - b.value).abs())
            .sum();
        let amplitude = swing / (2.0 * (n - 1) as f64);
        if !(amplitude > 0.0) {
            return None;
        }

        let (hi, lo) = self
            .peaks
            .iter()
            .fold((f64::MIN, f64::MAX), |(hi, lo), p| (hi.max(p.value), lo.min(p.value)));
        let deviation = (0.5 * (hi - lo) - amplitude) / amplitude;
        debug!(amplitude, deviation, "amplitude check");
        if deviation >= self.config.peak_amplitude_tolerance {
            return None;
        }

        // Peaks alternate, so same-type peaks sit two apart.
        let spacings: Vec<f64> = (2..n)
            .map(|i| {
                self.peaks[i]
                    .at
                    .saturating_sub(self.peaks[i - 2].at)
                    .as_secs_f64()
            })
            .collect();
        let pu_s = spacings.iter().sum::<f64>() / spacings.len() as f64;
        if !(pu_s > 0.0) {
            return None;
        }

        let d = 0.5 * (self.config.relay_high() - self.config.relay_low());
        Some(Oscillation {
            ku: 4.0 * d / (amplitude * PI),
            pu_s,
            amplitude,
        })
    }

    fn succeed(&mut self, osc: Oscillation) {
        self.state = AutotuneState::Succeeded;
        self.output = 0.0;
        self.oscillation = Some(osc);
        info!(
            ku = osc.ku,
            pu_s = osc.pu_s,
            amplitude = osc.amplitude,
            "autotune succeeded"
        );
    }

    fn fail(&mut self, reason: &'static str) -> bool {
        self.state = AutotuneState::Failed;
        self.output = 0.0;
        self.failure = Some(reason);
        warn!(reason, peak_count = self.peak_count, "autotune failed");
        true
    }
}

impl fmt::Debug for Autotuner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Autotuner")
            .field("setpoint", &self.setpoint)
            .field("state", &self.state)
            .field("output", &self.output)
            .field("peak_count", &self.peak_count)
            .field("oscillation", &self.oscillation)
            .finish_non_exhaustive()
    }
}
