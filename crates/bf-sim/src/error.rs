//! Error types for simulation operations.

use thiserror::Error;

/// Errors encountered during transient simulation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimError {
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Non-physical condition: {what}")]
    NonPhysical { what: &'static str },
}

pub type SimResult<T> = Result<T, SimError>;

impl From<bf_core::BfError> for SimError {
    fn from(e: bf_core::BfError) -> Self {
        match e {
            bf_core::BfError::NonFinite { what, .. } => SimError::NonPhysical { what },
            bf_core::BfError::InvalidArg { what } | bf_core::BfError::OutOfRange { what, .. } => {
                SimError::InvalidArg { what }
            }
        }
    }
}
