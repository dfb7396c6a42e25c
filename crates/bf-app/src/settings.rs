//! Persistent operator settings.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{AppError, AppResult};

/// Default location of the settings file.
pub const DEFAULT_SETTINGS_PATH: &str = "config/config.json";

/// Operator settings that survive restarts.
///
/// Every field is required in the file; a partial file is rejected as a whole
/// and the engine falls back to defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub initial_setpoint: f64,
    pub fan_power: f64,
    pub boil_threshold: f64,
    pub boil_power: f64,
    #[serde(rename = "k_p")]
    pub kp: f64,
    #[serde(rename = "k_i")]
    pub ki: f64,
    #[serde(rename = "k_d")]
    pub kd: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            initial_setpoint: 65.0,
            fan_power: 100.0,
            boil_threshold: 99.7,
            boil_power: 50.0,
            kp: 1.0,
            ki: 1.0,
            kd: 1.0,
        }
    }
}

/// Storage backend for [`Settings`].
pub trait SettingsStore: Send {
    fn load(&self) -> AppResult<Settings>;
    fn save(&self, settings: &Settings) -> AppResult<()>;
}

/// Settings stored as a JSON document on disk.
#[derive(Debug, Clone)]
pub struct JsonSettingsStore {
    path: PathBuf,
}

impl JsonSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for JsonSettingsStore {
    fn default() -> Self {
        Self::new(DEFAULT_SETTINGS_PATH)
    }
}

impl SettingsStore for JsonSettingsStore {
    fn load(&self) -> AppResult<Settings> {
        let content =
            std::fs::read_to_string(&self.path).map_err(|e| AppError::SettingsRead {
                path: self.path.clone(),
                source: e,
            })?;
        let settings = serde_json::from_str(&content)
            .map_err(|e| AppError::SettingsFormat(format!("Failed to parse settings: {e}")))?;
        info!(path = %self.path.display(), "loaded settings");
        Ok(settings)
    }

    fn save(&self, settings: &Settings) -> AppResult<()> {
        let content = serde_json::to_string_pretty(settings)
            .map_err(|e| AppError::SettingsFormat(format!("Failed to serialize settings: {e}")))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| AppError::SettingsWrite {
                path: self.path.clone(),
                source: e,
            })?;
        }
        std::fs::write(&self.path, content).map_err(|e| AppError::SettingsWrite {
            path: self.path.clone(),
            source: e,
        })?;
        info!(path = %self.path.display(), "saved settings");
        Ok(())
    }
}

/// In-memory store for tests and simulations.
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    stored: Mutex<Option<Settings>>,
    saves: Mutex<usize>,
}

impl MemorySettingsStore {
    /// A store holding `settings`, as if previously saved.
    pub fn with_settings(settings: Settings) -> Self {
        Self {
            stored: Mutex::new(Some(settings)),
            saves: Mutex::new(0),
        }
    }

    pub fn stored(&self) -> Option<Settings> {
        self.stored.lock().clone()
    }

    /// Number of successful saves.
    pub fn save_count(&self) -> usize {
        *self.saves.lock()
    }
}

impl SettingsStore for MemorySettingsStore {
    fn load(&self) -> AppResult<Settings> {
        self.stored
            .lock()
            .clone()
            .ok_or_else(|| AppError::SettingsFormat("no settings stored".to_string()))
    }

    fn save(&self, settings: &Settings) -> AppResult<()> {
        *self.stored.lock() = Some(settings.clone());
        *self.saves.lock() += 1;
        Ok(())
    }
}

impl<S: SettingsStore + Sync> SettingsStore for std::sync::Arc<S> {
    fn load(&self) -> AppResult<Settings> {
        (**self).load()
    }

    fn save(&self, settings: &Settings) -> AppResult<()> {
        (**self).save(settings)
    }
}
