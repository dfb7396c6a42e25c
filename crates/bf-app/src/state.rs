//! Control state aggregate.

use std::fmt;
use std::str::FromStr;

use bf_controls::{Autotuner, PidController, TuningRule};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::history::ChartHistory;
use crate::messages::MessageQueue;
use crate::settings::Settings;

/// Operating mode of the kettle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Off,
    Manual,
    Auto,
    Boil,
    Tuning,
}

impl Mode {
    pub const ALL: [Mode; 5] = [Mode::Off, Mode::Manual, Mode::Auto, Mode::Boil, Mode::Tuning];

    pub fn name(self) -> &'static str {
        match self {
            Mode::Off => "off",
            Mode::Manual => "manual",
            Mode::Auto => "auto",
            Mode::Boil => "boil",
            Mode::Tuning => "tuning",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Mode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Mode::ALL
            .into_iter()
            .find(|mode| mode.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| AppError::InvalidInput(format!("unknown mode '{s}'")))
    }
}

/// The controller driving the heater, if any.
///
/// `Pid` exists only in [`Mode::Auto`] and `Tuner` only in [`Mode::Tuning`].
#[derive(Debug, Default)]
pub enum ActiveController {
    #[default]
    Idle,
    Pid(PidController),
    Tuner(Autotuner),
}

impl ActiveController {
    pub fn is_pid(&self) -> bool {
        matches!(self, ActiveController::Pid(_))
    }

    pub fn is_tuner(&self) -> bool {
        matches!(self, ActiveController::Tuner(_))
    }

    pub fn tuner(&self) -> Option<&Autotuner> {
        match self {
            ActiveController::Tuner(tuner) => Some(tuner),
            _ => None,
        }
    }
}

/// Everything the control engine owns.
#[derive(Debug)]
pub struct ControlState {
    pub mode: Mode,
    pub pump: bool,
    pub temperature: f64,
    pub previous_temperature: f64,
    /// Whether `previous_temperature` came from a trusted reading.
    pub previous_temperature_valid: bool,
    pub temperature_sensor_valid: bool,
    pub setpoint: f64,
    pub duty_cycle: f64,
    /// Last duty written to the heater.
    pub previous_duty_cycle: f64,
    pub boil_achieved: bool,
    pub alarm_armed: bool,
    pub settings: Settings,
    pub controller: ActiveController,
    pub selected_tuning_rule: TuningRule,
    pub history: ChartHistory,
    pub messages: MessageQueue,
}

impl ControlState {
    pub fn new(settings: Settings, history_capacity: usize) -> Self {
        Self {
            mode: Mode::Off,
            pump: false,
            temperature: 0.0,
            previous_temperature: 0.0,
            previous_temperature_valid: false,
            temperature_sensor_valid: false,
            setpoint: settings.initial_setpoint,
            duty_cycle: 0.0,
            previous_duty_cycle: 0.0,
            boil_achieved: false,
            alarm_armed: false,
            settings,
            controller: ActiveController::Idle,
            selected_tuning_rule: TuningRule::default(),
            history: ChartHistory::new(history_capacity),
            messages: MessageQueue::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_parses_case_insensitively() {
        assert_eq!("Auto".parse::<Mode>().unwrap(), Mode::Auto);
        assert_eq!(" tuning ".parse::<Mode>().unwrap(), Mode::Tuning);
        assert!(matches!(
            "heat".parse::<Mode>(),
            Err(AppError::InvalidInput(_))
        ));
    }

    #[test]
    fn mode_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Mode::Boil).unwrap(), r#""boil""#);
        for mode in Mode::ALL {
            assert_eq!(mode.to_string().parse::<Mode>().unwrap(), mode);
        }
    }

    #[test]
    fn initial_state_is_off_and_untrusted() {
        let state = ControlState::new(Settings::default(), 10);
        assert_eq!(state.mode, Mode::Off);
        assert!(!state.temperature_sensor_valid);
        assert_eq!(state.setpoint, 65.0);
        assert!(!state.controller.is_pid() && !state.controller.is_tuner());
        assert_eq!(state.selected_tuning_rule, TuningRule::ZieglerNichols);
    }
}
