//! Error types for control system operations.

use thiserror::Error;

/// Result type for control system operations.
pub type ControlResult<T> = Result<T, ControlError>;

/// Errors that can occur in control system operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ControlError {
    /// Invalid argument provided to a control function.
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    /// Tuning rule name not present in the rule table.
    #[error("Unknown tuning rule: {name}")]
    UnknownTuningRule { name: String },

    /// Gains were requested before the autotuner observed a stable oscillation.
    #[error("Autotune has not succeeded (state: {state})")]
    NotTuned { state: String },
}

impl From<bf_core::BfError> for ControlError {
    fn from(err: bf_core::BfError) -> Self {
        let what = match err {
            bf_core::BfError::NonFinite { what, .. }
            | bf_core::BfError::InvalidArg { what }
            | bf_core::BfError::OutOfRange { what, .. } => what,
        };
        ControlError::InvalidArg { what }
    }
}
