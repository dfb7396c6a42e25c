//! Lumped kettle plant.
//!
//! The kettle is a single well-mixed water charge heated by an element and
//! losing heat to ambient through a lumped conductance:
//!
//! ```text
//! C dT/dt = P u/100 - h (T - T_amb)
//! ```
//!
//! which is a first-order system with gain `P / (100 h)` °C per % duty and
//! time constant `C / h`. The heater command reaches the water after a
//! transport delay (element warm-up, probe lag), modelled as a delay line of
//! whole simulation steps. Water cannot be heated past its boiling point.

use std::collections::VecDeque;

use bf_core::units::{HeatCapacity, Power, Temperature, Time};
use bf_core::{
    PERCENT_MAX, clamp_percent, ensure_finite, to_celsius, to_joules_per_kelvin, to_seconds,
    to_watts,
};
use tracing::trace;

use crate::error::{SimError, SimResult};
use crate::model::TransientModel;
use crate::sim::IntegratorType;

/// Boiling point of water at sea level.
pub const WATER_BOILING_POINT_C: f64 = 100.0;

/// First-order-plus-dead-time kettle parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct KettleParams {
    /// Steady-state temperature rise per % heater duty (°C/%).
    pub gain_c_per_pct: f64,
    /// Time constant (seconds).
    pub tau_s: f64,
    /// Transport delay between heater command and water response (seconds).
    pub dead_time_s: f64,
    /// Ambient temperature the kettle cools towards (°C).
    pub ambient_c: f64,
    /// Temperature cap, if any (°C).
    pub boiling_point_c: Option<f64>,
}

impl KettleParams {
    /// Bare first-order-plus-dead-time process without a boiling cap.
    pub fn first_order(gain_c_per_pct: f64, tau_s: f64, dead_time_s: f64, ambient_c: f64) -> Self {
        Self {
            gain_c_per_pct,
            tau_s,
            dead_time_s,
            ambient_c,
            boiling_point_c: None,
        }
    }

    /// Derive the model from physical quantities.
    ///
    /// `loss_w_per_k` is the lumped conductance to ambient.
    pub fn from_physical(
        heater: Power,
        heat_capacity: HeatCapacity,
        loss_w_per_k: f64,
        ambient: Temperature,
        dead_time: Time,
    ) -> SimResult<Self> {
        let power_w = ensure_finite(to_watts(heater), "heater power")?;
        let capacity = ensure_finite(to_joules_per_kelvin(heat_capacity), "heat capacity")?;
        let loss = ensure_finite(loss_w_per_k, "heat loss")?;
        if power_w < 0.0 {
            return Err(SimError::InvalidArg {
                what: "heater power must be non-negative",
            });
        }
        if capacity <= 0.0 || loss <= 0.0 {
            return Err(SimError::InvalidArg {
                what: "heat capacity and heat loss must be positive",
            });
        }

        let params = Self {
            gain_c_per_pct: power_w / (PERCENT_MAX * loss),
            tau_s: capacity / loss,
            dead_time_s: to_seconds(dead_time),
            ambient_c: to_celsius(ambient),
            boiling_point_c: Some(WATER_BOILING_POINT_C),
        };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> SimResult<()> {
        ensure_finite(self.gain_c_per_pct, "gain")?;
        ensure_finite(self.ambient_c, "ambient temperature")?;
        if self.gain_c_per_pct < 0.0 {
            return Err(SimError::InvalidArg {
                what: "gain must be non-negative",
            });
        }
        if !(self.tau_s > 0.0) || !self.tau_s.is_finite() {
            return Err(SimError::InvalidArg {
                what: "tau must be positive",
            });
        }
        if !(self.dead_time_s >= 0.0) || !self.dead_time_s.is_finite() {
            return Err(SimError::InvalidArg {
                what: "dead time must be non-negative",
            });
        }
        if let Some(cap) = self.boiling_point_c {
            if !cap.is_finite() || cap <= self.ambient_c {
                return Err(SimError::InvalidArg {
                    what: "boiling point must be above ambient",
                });
            }
        }
        Ok(())
    }

    /// Steady-state temperature at a constant duty, ignoring the boiling cap.
    pub fn steady_state_c(&self, duty: f64) -> f64 {
        self.ambient_c + self.gain_c_per_pct * duty
    }
}

impl Default for KettleParams {
    /// 20 L of water on a 3.5 kW element, losing 25 W/K, 30 s probe lag.
    fn default() -> Self {
        let loss_w_per_k = 25.0;
        let capacity = 20.0 * bf_core::units::constants::WATER_CP_J_PER_KG_K;
        Self {
            gain_c_per_pct: 3_500.0 / (PERCENT_MAX * loss_w_per_k),
            tau_s: capacity / loss_w_per_k,
            dead_time_s: 30.0,
            ambient_c: 20.0,
            boiling_point_c: Some(WATER_BOILING_POINT_C),
        }
    }
}

/// Kettle state vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KettleState {
    pub temperature_c: f64,
}

/// Kettle dynamics with the duty currently reaching the water.
#[derive(Debug, Clone)]
pub struct KettleModel {
    pub params: KettleParams,
    /// Delayed heater duty acting on the water (%).
    pub duty: f64,
}

impl KettleModel {
    pub fn new(params: KettleParams) -> Self {
        Self { params, duty: 0.0 }
    }
}

impl TransientModel for KettleModel {
    type State = KettleState;

    fn initial_state(&self) -> KettleState {
        KettleState {
            temperature_c: self.params.ambient_c,
        }
    }

    fn rhs(&mut self, _t: f64, x: &KettleState) -> SimResult<KettleState> {
        if !x.temperature_c.is_finite() {
            return Err(SimError::NonPhysical {
                what: "kettle temperature diverged",
            });
        }
        let target = self.params.steady_state_c(self.duty);
        Ok(KettleState {
            temperature_c: (target - x.temperature_c) / self.params.tau_s,
        })
    }

    fn add(&self, a: &KettleState, b: &KettleState) -> KettleState {
        KettleState {
            temperature_c: a.temperature_c + b.temperature_c,
        }
    }

    fn scale(&self, a: &KettleState, scale: f64) -> KettleState {
        KettleState {
            temperature_c: a.temperature_c * scale,
        }
    }
}

/// Stepping kettle plant with a transport delay line.
#[derive(Debug, Clone)]
pub struct KettleSim {
    model: KettleModel,
    state: KettleState,
    delay: VecDeque<f64>,
    commanded: f64,
    dt_s: f64,
    time_s: f64,
    integrator: IntegratorType,
}

impl KettleSim {
    /// Create a kettle at ambient temperature, stepping `dt_s` seconds at a time.
    pub fn new(params: KettleParams, dt_s: f64) -> SimResult<Self> {
        params.validate()?;
        if !(dt_s > 0.0) || !dt_s.is_finite() {
            return Err(SimError::InvalidArg {
                what: "dt must be positive",
            });
        }
        let delay_steps = (params.dead_time_s / dt_s).round() as usize;
        let model = KettleModel::new(params);
        let state = model.initial_state();
        Ok(Self {
            model,
            state,
            delay: VecDeque::from(vec![0.0; delay_steps]),
            commanded: 0.0,
            dt_s,
            time_s: 0.0,
            integrator: IntegratorType::default(),
        })
    }

    pub fn with_integrator(mut self, integrator: IntegratorType) -> Self {
        self.integrator = integrator;
        self
    }

    /// Start from `temperature_c` instead of ambient.
    pub fn with_temperature(mut self, temperature_c: f64) -> Self {
        self.state.temperature_c = self.cap(temperature_c);
        self
    }

    /// Command a heater duty; it reaches the water after the dead time.
    /// Non-finite duty is treated as off.
    pub fn set_duty(&mut self, duty: f64) {
        self.commanded = clamp_percent(duty);
    }

    /// Advance one step. Returns the new water temperature.
    pub fn step(&mut self) -> SimResult<f64> {
        self.delay.push_back(self.commanded);
        self.model.duty = self.delay.pop_front().unwrap_or(self.commanded);

        let next = self
            .integrator
            .step(&mut self.model, self.time_s, &self.state, self.dt_s)?;
        let temperature_c = ensure_finite(next.temperature_c, "kettle temperature")?;
        self.state.temperature_c = self.cap(temperature_c);
        self.time_s += self.dt_s;
        trace!(
            t = self.time_s,
            duty = self.model.duty,
            temperature = self.state.temperature_c,
            "kettle step"
        );
        Ok(self.state.temperature_c)
    }

    /// Step until simulated time reaches `t_s`. Returns the temperature.
    pub fn advance_to(&mut self, t_s: f64) -> SimResult<f64> {
        while self.time_s + self.dt_s <= t_s + 1e-9 {
            self.step()?;
        }
        Ok(self.state.temperature_c)
    }

    pub fn temperature(&self) -> f64 {
        self.state.temperature_c
    }

    pub fn time_s(&self) -> f64 {
        self.time_s
    }

    pub fn dt_s(&self) -> f64 {
        self.dt_s
    }

    /// Duty currently commanded (not yet necessarily acting).
    pub fn commanded_duty(&self) -> f64 {
        self.commanded
    }

    pub fn params(&self) -> &KettleParams {
        &self.model.params
    }

    fn cap(&self, temperature_c: f64) -> f64 {
        match self.model.params.boiling_point_c {
            Some(cap) => temperature_c.min(cap),
            None => temperature_c,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bf_core::{celsius, joules_per_kelvin, s, watts};

    #[test]
    fn default_kettle_parameters() {
        let p = KettleParams::default();
        assert!((p.gain_c_per_pct - 1.4).abs() < 1e-12);
        assert!((p.tau_s - 3_348.8).abs() < 1e-9);
        assert_eq!(p.boiling_point_c, Some(100.0));
        assert!(p.validate().is_ok());
    }

    #[test]
    fn from_physical_matches_default() {
        let p = KettleParams::from_physical(
            watts(3_500.0),
            joules_per_kelvin(83_720.0),
            25.0,
            celsius(20.0),
            s(30.0),
        )
        .unwrap();
        let d = KettleParams::default();
        assert!((p.gain_c_per_pct - d.gain_c_per_pct).abs() < 1e-9);
        assert!((p.tau_s - d.tau_s).abs() < 1e-6);
        assert!((p.ambient_c - 20.0).abs() < 1e-9);
        assert!((p.dead_time_s - 30.0).abs() < 1e-9);
    }

    #[test]
    fn from_physical_rejects_bad_inputs() {
        let bad_loss = KettleParams::from_physical(
            watts(3_500.0),
            joules_per_kelvin(83_720.0),
            0.0,
            celsius(20.0),
            s(30.0),
        );
        assert!(bad_loss.is_err());

        let bad_power = KettleParams::from_physical(
            watts(f64::NAN),
            joules_per_kelvin(83_720.0),
            25.0,
            celsius(20.0),
            s(30.0),
        );
        assert!(bad_power.is_err());
    }

    #[test]
    fn invalid_sim_params() {
        let p = KettleParams::first_order(1.0, 0.0, 10.0, 20.0);
        assert!(KettleSim::new(p, 1.0).is_err());
        let p = KettleParams::first_order(1.0, 100.0, -1.0, 20.0);
        assert!(KettleSim::new(p, 1.0).is_err());
        let p = KettleParams::first_order(1.0, 100.0, 10.0, 20.0);
        assert!(KettleSim::new(p, 0.0).is_err());
    }

    #[test]
    fn holds_ambient_with_heater_off() {
        let mut sim = KettleSim::new(KettleParams::default(), 1.0).unwrap();
        for _ in 0..100 {
            sim.step().unwrap();
        }
        assert!((sim.temperature() - 20.0).abs() < 1e-12);
    }

    #[test]
    fn dead_time_delays_response() {
        let p = KettleParams::first_order(1.0, 100.0, 10.0, 20.0);
        let mut sim = KettleSim::new(p, 1.0).unwrap();
        sim.set_duty(100.0);
        for _ in 0..10 {
            assert_eq!(sim.step().unwrap(), 20.0);
        }
        assert!(sim.step().unwrap() > 20.0);
    }

    #[test]
    fn step_response_follows_first_order() {
        let p = KettleParams::first_order(0.5, 200.0, 0.0, 20.0);
        let mut sim = KettleSim::new(p, 1.0).unwrap();
        sim.set_duty(100.0);
        let t = sim.advance_to(200.0).unwrap();

        // One time constant reaches 63.2 % of the 50 °C rise.
        let expected = 20.0 + 50.0 * (1.0 - (-1.0_f64).exp());
        assert!((t - expected).abs() < 1e-6);
        assert!((sim.time_s() - 200.0).abs() < 1e-9);
    }

    #[test]
    fn boiling_caps_temperature() {
        let mut sim = KettleSim::new(KettleParams::default(), 1.0)
            .unwrap()
            .with_temperature(95.0);
        sim.set_duty(100.0);
        sim.advance_to(3_600.0).unwrap();
        assert_eq!(sim.temperature(), WATER_BOILING_POINT_C);
    }

    #[test]
    fn duty_is_clamped() {
        let mut sim = KettleSim::new(KettleParams::default(), 1.0).unwrap();
        sim.set_duty(150.0);
        assert_eq!(sim.commanded_duty(), 100.0);
        sim.set_duty(f64::NAN);
        assert_eq!(sim.commanded_duty(), 0.0);
    }
}
