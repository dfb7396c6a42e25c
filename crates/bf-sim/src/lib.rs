//! Transient kettle simulation for brewflow.
//!
//! Provides:
//! - A pluggable [`TransientModel`] trait with fixed-step integrators
//! - A lumped first-order-plus-dead-time kettle model
//! - [`KettleSim`], a stepping plant with a transport delay line, used by the
//!   simulated hardware and by closed-loop tests

pub mod error;
pub mod integrator;
pub mod kettle;
pub mod model;
pub mod sim;

pub use error::{SimError, SimResult};
pub use integrator::{ForwardEuler, Integrator, RK4};
pub use kettle::{KettleModel, KettleParams, KettleSim, KettleState};
pub use model::TransientModel;
pub use sim::{IntegratorType, SimOptions, SimRecord, run_sim};
