//! Open-loop simulation runner and result recording.

use crate::error::{SimError, SimResult};
use crate::integrator::{ForwardEuler, Integrator, RK4};
use crate::model::TransientModel;

/// Integration scheme used by [`run_sim`] and [`crate::KettleSim`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum IntegratorType {
    #[default]
    RK4,
    ForwardEuler,
}

impl IntegratorType {
    /// Advance `x` by one step of `dt` with the selected integrator.
    pub fn step<M: TransientModel>(
        self,
        model: &mut M,
        t: f64,
        x: &M::State,
        dt: f64,
    ) -> SimResult<M::State> {
        match self {
            IntegratorType::RK4 => RK4.step(model, t, x, dt),
            IntegratorType::ForwardEuler => ForwardEuler.step(model, t, x, dt),
        }
    }
}

/// Open-loop run settings.
#[derive(Clone, Debug)]
pub struct SimOptions {
    pub dt: f64,
    pub t_end: f64,
    /// Hard stop regardless of `t_end`.
    pub max_steps: usize,
    /// Keep one sample out of every `record_every` steps.
    pub record_every: usize,
    pub integrator: IntegratorType,
}

impl Default for SimOptions {
    fn default() -> Self {
        Self {
            dt: 1.0,
            t_end: 3600.0,
            max_steps: 1_000_000,
            record_every: 10,
            integrator: IntegratorType::default(),
        }
    }
}

/// Sampled trajectory. `t[i]` is the time of `x[i]`, in seconds.
#[derive(Clone, Debug)]
pub struct SimRecord<S> {
    pub t: Vec<f64>,
    pub x: Vec<S>,
}

/// Integrate `model` from its initial state with its inputs held constant.
///
/// The initial and final states are always recorded.
pub fn run_sim<M: TransientModel>(
    model: &mut M,
    opts: &SimOptions,
) -> SimResult<SimRecord<M::State>> {
    if !(opts.dt > 0.0) {
        return Err(SimError::InvalidArg {
            what: "dt must be positive",
        });
    }
    if !(opts.t_end >= 0.0) {
        return Err(SimError::InvalidArg {
            what: "t_end must be non-negative",
        });
    }
    if opts.max_steps == 0 || opts.record_every == 0 {
        return Err(SimError::InvalidArg {
            what: "max_steps and record_every must be positive",
        });
    }

    let mut t = 0.0;
    let mut x = model.initial_state();

    let mut t_record = vec![t];
    let mut x_record = vec![x.clone()];

    let mut step = 0;
    while t < opts.t_end && step < opts.max_steps {
        x = opts.integrator.step(model, t, &x, opts.dt)?;
        t += opts.dt;
        step += 1;

        if step % opts.record_every == 0 {
            t_record.push(t);
            x_record.push(x.clone());
        }
    }

    if step % opts.record_every != 0 {
        t_record.push(t);
        x_record.push(x);
    }

    Ok(SimRecord {
        t: t_record,
        x: x_record,
    })
}
