//! Fixed-step time integrators.

use crate::error::SimResult;
use crate::model::TransientModel;

/// Fixed-step integration scheme.
pub trait Integrator {
    /// Advance `x` from `t` to `t + dt`.
    fn step<M: TransientModel>(
        &self,
        model: &mut M,
        t: f64,
        x: &M::State,
        dt: f64,
    ) -> SimResult<M::State>;
}

/// Classical fourth-order Runge-Kutta.
#[derive(Clone, Copy, Debug)]
pub struct RK4;

impl Integrator for RK4 {
    fn step<M: TransientModel>(
        &self,
        model: &mut M,
        t: f64,
        x: &M::State,
        dt: f64,
    ) -> SimResult<M::State> {
        let k1 = model.rhs(t, x)?;
        let k2 = model.rhs(t + 0.5 * dt, &model.offset(x, &k1, 0.5 * dt))?;
        let k3 = model.rhs(t + 0.5 * dt, &model.offset(x, &k2, 0.5 * dt))?;
        let k4 = model.rhs(t + dt, &model.offset(x, &k3, dt))?;

        let k_sum = model.add(
            &model.add(&k1, &model.scale(&k2, 2.0)),
            &model.add(&model.scale(&k3, 2.0), &k4),
        );
        Ok(model.offset(x, &k_sum, dt / 6.0))
    }
}

/// Explicit forward Euler. One `rhs` call per step.
#[derive(Clone, Copy, Debug)]
pub struct ForwardEuler;

impl Integrator for ForwardEuler {
    fn step<M: TransientModel>(
        &self,
        model: &mut M,
        t: f64,
        x: &M::State,
        dt: f64,
    ) -> SimResult<M::State> {
        let xdot = model.rhs(t, x)?;
        Ok(model.offset(x, &xdot, dt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// dx/dt = -x, x(0) = 1.
    struct Decay;

    impl TransientModel for Decay {
        type State = f64;

        fn initial_state(&self) -> f64 {
            1.0
        }

        fn rhs(&mut self, _t: f64, x: &f64) -> SimResult<f64> {
            Ok(-x)
        }

        fn add(&self, a: &f64, b: &f64) -> f64 {
            a + b
        }

        fn scale(&self, a: &f64, scale: f64) -> f64 {
            a * scale
        }
    }

    fn integrate(integrator: impl Integrator, dt: f64, steps: usize) -> f64 {
        let mut model = Decay;
        let mut x = model.initial_state();
        for i in 0..steps {
            x = integrator.step(&mut model, i as f64 * dt, &x, dt).unwrap();
        }
        x
    }

    #[test]
    fn rk4_matches_exponential_decay() {
        let x = integrate(RK4, 0.1, 10);
        assert!((x - (-1.0_f64).exp()).abs() < 1e-6);
    }

    #[test]
    fn forward_euler_is_first_order() {
        let coarse = (integrate(ForwardEuler, 0.1, 10) - (-1.0_f64).exp()).abs();
        let fine = (integrate(ForwardEuler, 0.05, 20) - (-1.0_f64).exp()).abs();
        assert!(fine < coarse);
        assert!((coarse / fine - 2.0).abs() < 0.2);
    }
}
