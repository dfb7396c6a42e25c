//! Closed-loop control primitives for brewflow.
//!
//! This crate holds the numeric heart of the kettle controller:
//!
//! - **PID**: sample-time gated, derivative on input, integral anti-windup
//! - **Autotune**: relay-feedback oscillation with peak analysis
//! - **Tuning rules**: named divisor tables mapping an observed oscillation
//!   (ultimate gain and period) onto PID gains
//!
//! Controllers read time through [`bf_core::SharedClock`] so the same code runs
//! against the wall clock in service and a manual clock in tests.

pub mod autotune;
pub mod error;
pub mod pid;
pub mod sampled;
pub mod tuning;

pub use autotune::{AutotuneConfig, AutotuneState, Autotuner};
pub use error::{ControlError, ControlResult};
pub use pid::{PidController, OUT_MAX, OUT_MIN};
pub use sampled::SampleGate;
pub use tuning::{Oscillation, PidGains, TuningRule};
