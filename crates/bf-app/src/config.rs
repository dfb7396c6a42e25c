//! Application configuration (YAML).
//!
//! ```yaml
//! sample_time_s: 1.0
//! tick_period_ms: 1000
//! settings_path: config/config.json
//! auto_engage_on_setpoint: false
//! history_capacity: 3600
//! autotune:
//!   output_step: 50.0
//!   relay_bias: 50.0
//! ```
//!
//! Every field is optional. A missing file yields [`AppConfig::default`].

use std::path::{Path, PathBuf};

use bf_controls::AutotuneConfig;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::history::DEFAULT_CAPACITY;
use crate::settings::DEFAULT_SETTINGS_PATH;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// PID and autotuner sample time (seconds).
    pub sample_time_s: f64,
    /// Control loop tick period (milliseconds).
    pub tick_period_ms: u64,
    /// Where operator settings are persisted.
    pub settings_path: PathBuf,
    /// Whether a setpoint change switches the kettle into Auto.
    pub auto_engage_on_setpoint: bool,
    /// Chart samples retained.
    pub history_capacity: usize,
    pub autotune: AutotuneConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            sample_time_s: 1.0,
            tick_period_ms: 1000,
            settings_path: PathBuf::from(DEFAULT_SETTINGS_PATH),
            auto_engage_on_setpoint: false,
            history_capacity: DEFAULT_CAPACITY,
            autotune: AutotuneConfig::default(),
        }
    }
}

impl AppConfig {
    /// Parse a YAML document.
    pub fn from_yaml(content: &str) -> AppResult<Self> {
        let config: AppConfig = serde_yaml::from_str(content)
            .map_err(|e| AppError::Config(format!("Failed to parse config YAML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`, or defaults if the file does not exist.
    pub fn load(path: &Path) -> AppResult<Self> {
        if !path.exists() {
            info!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| AppError::ConfigRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_yaml(&content)
    }

    pub fn validate(&self) -> AppResult<()> {
        if !self.sample_time_s.is_finite() || self.sample_time_s <= 0.0 {
            return Err(AppError::Config(
                "sample_time_s must be positive".to_string(),
            ));
        }
        if self.tick_period_ms == 0 {
            return Err(AppError::Config(
                "tick_period_ms must be positive".to_string(),
            ));
        }
        if self.history_capacity == 0 {
            return Err(AppError::Config(
                "history_capacity must be positive".to_string(),
            ));
        }
        self.autotune
            .validate(self.sample_time_s)
            .map_err(|e| AppError::Config(format!("autotune: {e}")))
    }
}
