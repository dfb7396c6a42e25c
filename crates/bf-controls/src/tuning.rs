//! Tuning rules mapping a relay-induced oscillation onto PID gains.
//!
//! Every rule is a row of three divisors `[a, b, c]` applied to the ultimate
//! gain `Ku` and ultimate period `Pu`:
//!
//! ```text
//! Kp = Ku / a
//! Ki = Kp / (Pu / b)
//! Kd = Kp * (Pu / c)
//! ```
//!
//! The divisors are scaled for a 0..100 % heater output driven by a °C
//! process variable.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ControlError;

/// PID gains in the form the controller consumes them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PidGains {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
}

impl PidGains {
    pub fn new(kp: f64, ki: f64, kd: f64) -> Self {
        Self { kp, ki, kd }
    }
}

/// Oscillation observed during relay feedback.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Oscillation {
    /// Ultimate gain `Ku = 4d / (π a)`.
    pub ku: f64,
    /// Ultimate period in seconds.
    pub pu_s: f64,
    /// Induced amplitude `a` of the process variable.
    pub amplitude: f64,
}

/// Named tuning rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TuningRule {
    #[default]
    ZieglerNichols,
    TyreusLuyben,
    CianconeMarlin,
    PessenIntegral,
    SomeOvershoot,
    NoOvershoot,
}

/// Rule table: name and `[Kp, Ki, Kd]` divisors.
const RULE_TABLE: [(TuningRule, &str, [f64; 3]); 6] = [
    (TuningRule::ZieglerNichols, "ziegler-nichols", [34.0, 40.0, 160.0]),
    (TuningRule::TyreusLuyben, "tyreus-luyben", [44.0, 9.0, 126.0]),
    (TuningRule::CianconeMarlin, "ciancone-marlin", [66.0, 88.0, 162.0]),
    (TuningRule::PessenIntegral, "pessen-integral", [28.0, 50.0, 133.0]),
    (TuningRule::SomeOvershoot, "some-overshoot", [60.0, 40.0, 60.0]),
    (TuningRule::NoOvershoot, "no-overshoot", [100.0, 40.0, 60.0]),
];

impl TuningRule {
    /// Every supported rule, in table order.
    pub const ALL: [TuningRule; 6] = [
        TuningRule::ZieglerNichols,
        TuningRule::TyreusLuyben,
        TuningRule::CianconeMarlin,
        TuningRule::PessenIntegral,
        TuningRule::SomeOvershoot,
        TuningRule::NoOvershoot,
    ];

    fn row(self) -> &'static (TuningRule, &'static str, [f64; 3]) {
        // RULE_TABLE covers every variant; the index matches ALL.
        &RULE_TABLE[self as usize]
    }

    /// Kebab-case name used by the API and the config.
    pub fn name(self) -> &'static str {
        self.row().1
    }

    /// `[Kp, Ki, Kd]` divisors.
    pub fn divisors(self) -> [f64; 3] {
        self.row().2
    }

    /// Apply this rule to an observed oscillation.
    pub fn gains(self, osc: &Oscillation) -> PidGains {
        let [a, b, c] = self.divisors();
        let kp = osc.ku / a;
        let ki = kp / (osc.pu_s / b);
        let kd = kp * (osc.pu_s / c);
        PidGains { kp, ki, kd }
    }
}

impl fmt::Display for TuningRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TuningRule {
    type Err = ControlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        RULE_TABLE
            .iter()
            .find(|(_, name, _)| name.eq_ignore_ascii_case(wanted))
            .map(|(rule, _, _)| *rule)
            .ok_or_else(|| ControlError::UnknownTuningRule {
                name: s.to_string(),
            })
    }
}
