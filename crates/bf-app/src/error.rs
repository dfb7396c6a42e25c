//! Error types for the bf-app service layer.

use std::path::PathBuf;

/// Application error type wrapping errors from the control and simulation
/// crates behind one interface for every frontend.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Controller error: {0}")]
    Control(#[from] bf_controls::ControlError),

    #[error("Simulation error: {0}")]
    Simulation(String),

    #[error("Failed to read settings file: {path}")]
    SettingsRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write settings file: {path}")]
    SettingsWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Settings format error: {0}")]
    SettingsFormat(String),

    #[error("Failed to read config file: {path}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Config error: {0}")]
    Config(String),

    #[error("Control loop error: {0}")]
    ControlLoop(String),
}

/// Result type for bf-app operations.
pub type AppResult<T> = Result<T, AppError>;

impl From<bf_sim::SimError> for AppError {
    fn from(err: bf_sim::SimError) -> Self {
        AppError::Simulation(err.to_string())
    }
}

impl From<bf_core::BfError> for AppError {
    fn from(err: bf_core::BfError) -> Self {
        AppError::InvalidInput(err.to_string())
    }
}
