//! Continuous-time plant models.

use crate::error::SimResult;

/// A plant described by `dx/dt = f(t, x)`.
///
/// Integrators only ever combine states linearly, so a model supplies the
/// vector-space operations for its own state type instead of requiring one.
pub trait TransientModel {
    type State: Clone;

    /// State at `t = 0`.
    fn initial_state(&self) -> Self::State;

    /// Time derivative of `x` at `t`. Inputs such as the heater duty are held
    /// by the model and stay constant across one integration step.
    fn rhs(&mut self, t: f64, x: &Self::State) -> SimResult<Self::State>;

    fn add(&self, a: &Self::State, b: &Self::State) -> Self::State;

    fn scale(&self, a: &Self::State, scale: f64) -> Self::State;

    /// `x + h * dxdt`.
    fn offset(&self, x: &Self::State, dxdt: &Self::State, h: f64) -> Self::State {
        self.add(x, &self.scale(dxdt, h))
    }
}
