//! Control engine: mode state machine and the periodic tick.
//!
//! The engine exclusively owns [`ControlState`]. Every mutation goes through a
//! method here; [`crate::service::BrewService`] adds the lock that serializes
//! them against the control loop.
//!
//! ## Modes
//!
//! | mode    | controller | heater duty                                  |
//! |---------|------------|----------------------------------------------|
//! | off     | none       | 0                                            |
//! | manual  | none       | operator value                               |
//! | auto    | PID        | PID output                                   |
//! | boil    | none       | 100 until the boil threshold, then boil power |
//! | tuning  | autotuner  | relay output                                 |
//!
//! Every mode change tears down the active controller before running the entry
//! actions of the new mode, including when re-entering the current mode.

use bf_controls::{AutotuneState, Autotuner, PidController, PidGains, TuningRule};
use bf_core::{PERCENT_MAX, PERCENT_MIN, SharedClock, clamp_percent, ensure_finite, ensure_in_range};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::AppConfig;
use crate::error::AppResult;
use crate::hardware::Hardware;
use crate::history::ChartSample;
use crate::messages::Message;
use crate::settings::{Settings, SettingsStore};
use crate::state::{ActiveController, ControlState, Mode};

/// PID gains as exposed to operators.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PidSettings {
    pub p: f64,
    pub i: f64,
    pub d: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoilSettings {
    pub boil_threshold: f64,
    pub boil_power: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OtherSettings {
    pub initial_setpoint: f64,
    pub fan_power: f64,
}

/// Point-in-time view of the engine for frontends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub mode: Mode,
    pub pump: bool,
    /// `None` while the sensor reading is invalid.
    pub temperature: Option<f64>,
    pub setpoint: f64,
    pub duty_cycle: f64,
    pub boil_achieved: bool,
    pub chart_x: Vec<i64>,
    pub chart_temperature_y: Vec<Option<f64>>,
    pub chart_setpoint_y: Vec<Option<f64>>,
    pub chart_duty_cycle_y: Vec<f64>,
    /// Present only while tuning.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub autotune_peak_count: Option<usize>,
}

/// Liveness answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    pub status: String,
}

pub struct ControlEngine {
    state: ControlState,
    hardware: Hardware,
    store: Box<dyn SettingsStore>,
    clock: SharedClock,
    config: AppConfig,
}

impl ControlEngine {
    /// Build the engine and run the startup sequence: load settings (defaults
    /// on failure), apply the fan power, seed the setpoint.
    ///
    /// # Errors
    ///
    /// Returns [`crate::AppError::Config`] if `config` is invalid.
    pub fn new(
        config: AppConfig,
        mut hardware: Hardware,
        store: Box<dyn SettingsStore>,
        clock: SharedClock,
    ) -> AppResult<Self> {
        config.validate()?;

        let settings = match store.load() {
            Ok(settings) => {
                info!("initialized settings from store");
                settings
            }
            Err(e) => {
                error!(error = %e, "failed initializing settings, using defaults");
                Settings::default()
            }
        };
        hardware.fan.set_fan_power(clamp_percent(settings.fan_power));

        Ok(Self {
            state: ControlState::new(settings, config.history_capacity),
            hardware,
            store,
            clock,
            config,
        })
    }

    pub fn state(&self) -> &ControlState {
        &self.state
    }

    pub fn mode(&self) -> Mode {
        self.state.mode
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }

    pub fn selected_tuning_rule(&self) -> TuningRule {
        self.state.selected_tuning_rule
    }

    // ------------------------------------------------------------------
    // Mode state machine
    // ------------------------------------------------------------------

    /// Switch mode, running its entry actions.
    ///
    /// # Errors
    ///
    /// If the mode's controller cannot be built the engine falls back to
    /// [`Mode::Off`] and the error is returned.
    pub fn set_mode(&mut self, mode: Mode) -> AppResult<()> {
        info!(from = %self.state.mode, to = %mode, "mode set");
        self.teardown();
        self.state.mode = mode;

        match mode {
            Mode::Off => self.enter_off(),
            Mode::Manual => {
                self.state.alarm_armed = false;
            }
            Mode::Auto => {
                let pid = match self.build_pid() {
                    Ok(pid) => pid,
                    Err(e) => {
                        warn!(error = %e, "could not create PID, switching off");
                        self.enter_off();
                        return Err(e);
                    }
                };
                self.state.controller = ActiveController::Pid(pid);
                self.state.alarm_armed = true;
                self.state.duty_cycle = 0.0;
            }
            Mode::Boil => {
                self.state.alarm_armed = false;
                self.state.boil_achieved = false;
                self.handle_boil();
            }
            Mode::Tuning => {
                self.state.alarm_armed = false;
                self.state.duty_cycle = 0.0;
                let tuner = match Autotuner::new(
                    self.config.sample_time_s,
                    self.state.settings.initial_setpoint,
                    self.config.autotune.clone(),
                    self.clock.clone(),
                ) {
                    Ok(tuner) => tuner,
                    Err(e) => {
                        warn!(error = %e, "could not create autotuner, switching off");
                        self.enter_off();
                        return Err(e.into());
                    }
                };
                self.state.controller = ActiveController::Tuner(tuner);
            }
        }
        Ok(())
    }

    /// Switch mode, optionally selecting the tuning rule adopted when a
    /// subsequent autotune succeeds. An unknown rule is rejected before the
    /// mode changes.
    pub fn set_mode_with_rule(&mut self, mode: Mode, tuning_rule: Option<&str>) -> AppResult<()> {
        if let Some(name) = tuning_rule {
            let rule: TuningRule = name.parse()?;
            info!(rule = %rule, "selected tuning rule");
            self.state.selected_tuning_rule = rule;
        }
        self.set_mode(mode)
    }

    fn teardown(&mut self) {
        if let ActiveController::Tuner(tuner) = &mut self.state.controller {
            tuner.abort();
        }
        if !matches!(self.state.controller, ActiveController::Idle) {
            debug!("controller torn down");
        }
        self.state.controller = ActiveController::Idle;
    }

    fn enter_off(&mut self) {
        self.teardown();
        self.state.mode = Mode::Off;
        self.state.duty_cycle = 0.0;
        self.state.alarm_armed = false;
    }

    fn build_pid(&self) -> AppResult<PidController> {
        let s = &self.state.settings;
        let pid = PidController::new(
            self.config.sample_time_s,
            PidGains::new(s.kp, s.ki, s.kd),
            self.clock.clone(),
        )?;
        Ok(pid)
    }

    // ------------------------------------------------------------------
    // Operator commands
    // ------------------------------------------------------------------

    /// Store a new setpoint and arm the alarm. Switches to Auto when
    /// `auto_engage_on_setpoint` is configured.
    pub fn set_setpoint(&mut self, setpoint: f64) -> AppResult<()> {
        let setpoint = ensure_finite(setpoint, "setpoint")?;
        self.state.setpoint = setpoint;
        self.state.alarm_armed = true;
        info!(setpoint, "setpoint set");

        if self.config.auto_engage_on_setpoint && self.state.mode != Mode::Auto {
            self.set_mode(Mode::Auto)?;
        }
        Ok(())
    }

    /// Manual heater control. A positive duty enters Manual, zero enters Off.
    pub fn set_duty_cycle(&mut self, duty: f64) -> AppResult<()> {
        let duty = ensure_finite(duty, "duty cycle")?.clamp(PERCENT_MIN, PERCENT_MAX);
        if duty > 0.0 {
            self.set_mode(Mode::Manual)?;
            self.state.duty_cycle = duty;
        } else {
            self.set_mode(Mode::Off)?;
        }
        Ok(())
    }

    pub fn set_pump(&mut self, on: bool) {
        self.state.pump = on;
        self.hardware.pump.set_pump(on);
        info!(on, "pump set");
    }

    pub fn pid_settings(&self) -> PidSettings {
        let s = &self.state.settings;
        PidSettings {
            p: s.kp,
            i: s.ki,
            d: s.kd,
        }
    }

    /// Persist new gains; an active PID is rebuilt with them.
    pub fn set_pid_settings(&mut self, gains: PidSettings) -> AppResult<()> {
        let kp = ensure_finite(gains.p, "kp")?;
        let ki = ensure_finite(gains.i, "ki")?;
        let kd = ensure_finite(gains.d, "kd")?;
        self.state.settings.kp = kp;
        self.state.settings.ki = ki;
        self.state.settings.kd = kd;
        self.save_settings();

        if self.state.controller.is_pid() {
            info!("resetting PID");
            match self.build_pid() {
                Ok(pid) => self.state.controller = ActiveController::Pid(pid),
                Err(e) => {
                    self.enter_off();
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    pub fn boil_settings(&self) -> BoilSettings {
        BoilSettings {
            boil_threshold: self.state.settings.boil_threshold,
            boil_power: self.state.settings.boil_power,
        }
    }

    /// Persist boil parameters; Boil mode is re-entered to apply them.
    pub fn set_boil_settings(&mut self, boil: BoilSettings) -> AppResult<()> {
        let threshold = ensure_finite(boil.boil_threshold, "boil threshold")?;
        let power = ensure_in_range(boil.boil_power, PERCENT_MIN, PERCENT_MAX, "boil power")?;
        self.state.settings.boil_threshold = threshold;
        self.state.settings.boil_power = power;
        self.save_settings();

        if self.state.mode == Mode::Boil {
            self.set_mode(Mode::Boil)?;
        }
        Ok(())
    }

    pub fn other_settings(&self) -> OtherSettings {
        OtherSettings {
            initial_setpoint: self.state.settings.initial_setpoint,
            fan_power: self.state.settings.fan_power,
        }
    }

    /// Persist the tuning target and fan power; the fan is updated at once.
    pub fn set_other_settings(&mut self, other: OtherSettings) -> AppResult<()> {
        let initial_setpoint = ensure_finite(other.initial_setpoint, "initial setpoint")?;
        let fan_power = ensure_in_range(other.fan_power, PERCENT_MIN, PERCENT_MAX, "fan power")?;
        self.state.settings.initial_setpoint = initial_setpoint;
        self.state.settings.fan_power = fan_power;
        info!(fan_power, "setting fan power");
        self.hardware.fan.set_fan_power(fan_power);
        self.save_settings();
        Ok(())
    }

    /// Remove and return pending operator messages.
    pub fn drain_messages(&mut self) -> Vec<Message> {
        self.state.messages.drain()
    }

    pub fn status(&self) -> StatusSnapshot {
        let s = &self.state;
        StatusSnapshot {
            mode: s.mode,
            pump: s.pump,
            temperature: s.temperature_sensor_valid.then_some(s.temperature),
            setpoint: s.setpoint,
            duty_cycle: s.duty_cycle,
            boil_achieved: s.boil_achieved,
            chart_x: s.history.timestamps(),
            chart_temperature_y: s.history.temperatures(),
            chart_setpoint_y: s.history.setpoints(),
            chart_duty_cycle_y: s.history.duty_cycles(),
            autotune_peak_count: s.controller.tuner().map(Autotuner::peak_count),
        }
    }

    pub fn health(&self) -> Health {
        Health {
            status: "up".to_string(),
        }
    }

    fn save_settings(&self) {
        if let Err(e) = self.store.save(&self.state.settings) {
            error!(error = %e, "failed to save settings");
        }
    }

    // ------------------------------------------------------------------
    // Control loop
    // ------------------------------------------------------------------

    /// One control cycle: sense, compute, actuate, record.
    pub fn tick(&mut self) {
        self.state.previous_temperature = self.state.temperature;
        self.state.previous_temperature_valid = self.state.temperature_sensor_valid;
        self.read_sensor();
        self.handle_pid();
        self.handle_boil();
        self.handle_autotune();
        self.write_heater();
        self.handle_alarm();
        self.record_chart();
    }

    fn read_sensor(&mut self) {
        let reading = self.hardware.sensor.read_temperature();
        match reading.trusted() {
            Some(temperature) => {
                self.state.temperature = temperature;
                self.state.temperature_sensor_valid = true;
            }
            None => {
                self.state.temperature_sensor_valid = false;
                if self.state.mode != Mode::Off {
                    warn!(mode = %self.state.mode, "temperature sensor failure, switching off");
                    self.enter_off();
                    self.state
                        .messages
                        .push(Message::error("Temperature sensor failure, switched off"));
                }
            }
        }
    }

    fn handle_pid(&mut self) {
        if let ActiveController::Pid(pid) = &mut self.state.controller {
            self.state.duty_cycle = pid.calc(self.state.temperature, self.state.setpoint);
        }
    }

    fn handle_boil(&mut self) {
        if self.state.mode != Mode::Boil {
            return;
        }
        if !self.state.boil_achieved {
            self.state.duty_cycle = PERCENT_MAX;
            if self.state.temperature_sensor_valid
                && self.state.temperature >= self.state.settings.boil_threshold
            {
                info!(temperature = self.state.temperature, "boil achieved");
                self.hardware.buzzer.sound();
                self.state.boil_achieved = true;
            }
        }
        if self.state.boil_achieved {
            self.state.duty_cycle = self.state.settings.boil_power;
        }
    }

    fn handle_autotune(&mut self) {
        let ActiveController::Tuner(tuner) = &mut self.state.controller else {
            return;
        };
        tuner.run(self.state.temperature);
        self.state.duty_cycle = tuner.output();

        let outcome = tuner.state();
        if !outcome.is_terminal() {
            return;
        }

        let rule_gains: Vec<(TuningRule, PidGains)> = Autotuner::tuning_rules()
            .iter()
            .filter_map(|rule| tuner.pid_parameters(*rule).ok().map(|g| (*rule, g)))
            .collect();
        let failure = tuner.failure_reason();

        self.hardware.buzzer.sound();
        self.enter_off();

        match outcome {
            AutotuneState::Succeeded => {
                for (rule, gains) in &rule_gains {
                    info!(
                        rule = %rule,
                        kp = gains.kp,
                        ki = gains.ki,
                        kd = gains.kd,
                        "tuning rule gains"
                    );
                }
                let selected = self.state.selected_tuning_rule;
                if let Some((_, gains)) = rule_gains.iter().find(|(rule, _)| *rule == selected) {
                    self.state.settings.kp = gains.kp;
                    self.state.settings.ki = gains.ki;
                    self.state.settings.kd = gains.kd;
                    info!(rule = %selected, "adopted tuned gains");
                }
                self.save_settings();
                info!("Autotune successful");
                self.state.messages.push(Message::success("Autotune successful"));
            }
            AutotuneState::Failed => {
                warn!(reason = failure.unwrap_or("unknown"), "Autotune failed");
                self.state.messages.push(Message::error("Autotune failed"));
            }
            _ => {}
        }
    }

    fn write_heater(&mut self) {
        self.state.duty_cycle = clamp_percent(self.state.duty_cycle);
        if self.state.duty_cycle == self.state.previous_duty_cycle {
            return;
        }
        self.state.previous_duty_cycle = self.state.duty_cycle;
        info!(duty_cycle = self.state.duty_cycle, "setting heater duty cycle");
        self.hardware.heater.set_duty_cycle(self.state.duty_cycle);
    }

    fn handle_alarm(&mut self) {
        let s = &self.state;
        // A crossing needs two trusted readings in a row.
        if !s.alarm_armed || !s.temperature_sensor_valid || !s.previous_temperature_valid {
            return;
        }
        let (previous, current, setpoint) = (s.previous_temperature, s.temperature, s.setpoint);
        let rising = previous < setpoint && current >= setpoint;
        let falling = previous > setpoint && current <= setpoint;
        if rising || falling {
            info!(temperature = current, setpoint, "setpoint reached");
            self.hardware.buzzer.sound();
            self.state.alarm_armed = false;
        }
    }

    fn record_chart(&mut self) {
        let s = &self.state;
        let sample = ChartSample {
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
            temperature: s.temperature_sensor_valid.then_some(s.temperature),
            setpoint: s.controller.is_pid().then_some(s.setpoint),
            duty_cycle: s.duty_cycle,
        };
        self.state.history.push(sample);
    }
}

impl std::fmt::Debug for ControlEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlEngine")
            .field("mode", &self.state.mode)
            .field("temperature", &self.state.temperature)
            .field("setpoint", &self.state.setpoint)
            .field("duty_cycle", &self.state.duty_cycle)
            .finish_non_exhaustive()
    }
}
