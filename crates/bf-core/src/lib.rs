//! bf-core: stable foundation for brewflow.
//!
//! Contains:
//! - units (uom SI types + constructors for the kettle plant)
//! - numeric (Real, percent limits, finiteness and range checks)
//! - timing (monotonic clocks shared by controllers and the control loop)
//! - error (shared error types)

pub mod error;
pub mod numeric;
pub mod timing;
pub mod units;

// Re-exports: nice ergonomics for downstream crates
pub use error::{BfError, BfResult};
pub use numeric::*;
pub use timing::{Clock, ManualClock, SharedClock, SystemClock};
pub use units::*;
