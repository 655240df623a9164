/*
    Regolith, small-body exploration simulation
    Copyright (C) 2024 Regolith contributors

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.

    This program is distributed in the hope that it will be useful,
    but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
    GNU Affero General Public License for more details.

    You should have received a copy of the GNU Affero General Public License
    along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/

//! Propagation of the equations of motion with embedded adaptive
//! Runge–Kutta steps. The outer loop asks for fixed 1 s ticks; the
//! propagator takes as many internal substeps as the tolerance demands and
//! reports divergence instead of grinding below the minimum step.

pub mod error_ctrl;
mod rk_methods;

pub use error_ctrl::{ErrorCtrl, RSSStep, RSSStepPV};
pub use rk_methods::{Dormand45, RK4Fixed, RK};

use crate::cosmic::StateVector;
use crate::dynamics::Dynamics;
use crate::errors::SimError;
use log::{error, trace};
use std::marker::PhantomData;

/// Propagation options: step bounds, tolerance, and shrink attempts.
#[derive(Clone, Copy, Debug)]
pub struct PropOpts<E: ErrorCtrl = RSSStepPV> {
    pub init_step: f64,
    pub min_step: f64,
    pub max_step: f64,
    pub tolerance: f64,
    pub attempts: u8,
    pub fixed_step: bool,
    _errctrl: PhantomData<E>,
}

impl<E: ErrorCtrl> PropOpts<E> {
    pub fn with_adaptive_step(min_step: f64, max_step: f64, tolerance: f64) -> Self {
        Self {
            init_step: max_step,
            min_step,
            max_step,
            tolerance,
            attempts: 50,
            fixed_step: false,
            _errctrl: PhantomData,
        }
    }

    pub fn with_fixed_step(step: f64) -> Self {
        Self {
            init_step: step,
            min_step: step,
            max_step: step,
            tolerance: 0.0,
            attempts: 1,
            fixed_step: true,
            _errctrl: PhantomData,
        }
    }
}

impl Default for PropOpts<RSSStepPV> {
    /// 1e-9 tolerance between 10 ms and 30 s internal steps.
    fn default() -> Self {
        Self::with_adaptive_step(0.01, 30.0, 1e-9)
    }
}

/// A propagator setup: dynamics plus a Butcher tableau and options.
pub struct Propagator<'a, D: Dynamics, E: ErrorCtrl = RSSStepPV> {
    pub dynamics: &'a D,
    pub opts: PropOpts<E>,
    order: u8,
    stages: usize,
    a_coeffs: &'static [f64],
    b_coeffs: &'static [f64],
}

impl<'a, D: Dynamics, E: ErrorCtrl> Propagator<'a, D, E> {
    pub fn new<M: RK>(dynamics: &'a D, opts: PropOpts<E>) -> Self {
        Self {
            dynamics,
            opts,
            order: M::ORDER,
            stages: M::STAGES,
            a_coeffs: M::A_COEFFS,
            b_coeffs: M::B_COEFFS,
        }
    }

    /// Attaches an initial state at time `t`, ready to propagate.
    pub fn with(&self, state: StateVector, t: f64) -> PropInstance<'_, 'a, D, E> {
        PropInstance {
            prop: self,
            state,
            t,
            step: self.opts.init_step,
            details: IntegrationDetails::default(),
        }
    }
}

impl<'a, D: Dynamics> Propagator<'a, D, RSSStepPV> {
    /// The default setup: Dormand–Prince 5(4) at 1e-9.
    pub fn dormand45(dynamics: &'a D) -> Self {
        Self::new::<Dormand45>(dynamics, PropOpts::default())
    }
}

/// Counters of one propagation arc.
#[derive(Clone, Copy, Debug, Default)]
pub struct IntegrationDetails {
    pub steps: u64,
    pub evals: u64,
    pub rejected: u64,
}

/// A propagator bound to a state; owns the adaptive step bookkeeping.
pub struct PropInstance<'p, 'a, D: Dynamics, E: ErrorCtrl> {
    prop: &'p Propagator<'a, D, E>,
    pub state: StateVector,
    pub t: f64,
    step: f64,
    pub details: IntegrationDetails,
}

impl<'p, 'a, D: Dynamics, E: ErrorCtrl> PropInstance<'p, 'a, D, E> {
    /// Advances the state by exactly `duration` seconds, subdividing as
    /// needed. On divergence the state holds the last accepted substep.
    pub fn for_duration(&mut self, duration: f64) -> Result<StateVector, SimError> {
        let t_end = self.t + duration;
        while self.t < t_end - 1e-12 {
            let h = self.step.min(t_end - self.t);
            self.try_step(h)?;
        }
        Ok(self.state)
    }

    /// One accepted substep of at most `h` seconds; returns the size taken.
    fn try_step(&mut self, h: f64) -> Result<f64, SimError> {
        let opts = &self.prop.opts;
        let mut h = h;
        for _attempt in 0..=opts.attempts {
            let (candidate, error) = self.eval_step(h)?;
            if opts.fixed_step {
                self.accept(h, candidate);
                return Ok(h);
            }
            let err = E::estimate(&error, &candidate, &self.state);
            if err <= opts.tolerance {
                self.accept(h, candidate);
                // Standard controller growth with a safety factor.
                let factor = if err > 0.0 {
                    0.9 * (opts.tolerance / err).powf(1.0 / f64::from(self.prop.order))
                } else {
                    5.0
                };
                self.step = (h * factor.clamp(0.2, 5.0)).clamp(opts.min_step, opts.max_step);
                return Ok(h);
            }
            self.details.rejected += 1;
            let factor = 0.9 * (opts.tolerance / err).powf(1.0 / f64::from(self.prop.order));
            let shrunk = (h * factor.clamp(0.1, 0.9)).max(opts.min_step);
            trace!(
                "step rejected at t = {} (err {err:.3e}), {} -> {}",
                self.t,
                h,
                shrunk
            );
            if shrunk >= h && h <= opts.min_step {
                break;
            }
            h = shrunk;
        }
        let (_, error) = self.eval_step(opts.min_step)?;
        let err = E::estimate(&error, &self.state, &self.state);
        error!(
            "integrator cannot meet tolerance {} at minimum step (t = {})",
            opts.tolerance, self.t
        );
        Err(SimError::Divergence { t: self.t, error: err })
    }

    fn accept(&mut self, h: f64, candidate: StateVector) {
        self.t += h;
        self.state = candidate;
        self.details.steps += 1;
    }

    /// Evaluates all stages for one trial step of size `h` and returns the
    /// higher order candidate and the embedded error estimate.
    fn eval_step(&mut self, h: f64) -> Result<(StateVector, StateVector), SimError> {
        let prop = self.prop;
        let mut ks: Vec<StateVector> = Vec::with_capacity(prop.stages);
        ks.push(prop.dynamics.eom(self.t, &self.state)?);
        self.details.evals += 1;
        let mut a_idx = 0;
        for i in 1..prop.stages {
            let mut xi = self.state;
            let mut ci = 0.0;
            for k in ks.iter().take(i) {
                let a = prop.a_coeffs[a_idx];
                ci += a;
                xi += k * (h * a);
                a_idx += 1;
            }
            ks.push(prop.dynamics.eom(self.t + ci * h, &xi)?);
            self.details.evals += 1;
        }
        let mut high = self.state;
        let mut low = self.state;
        for (i, k) in ks.iter().enumerate() {
            high += k * (h * prop.b_coeffs[i]);
            low += k * (h * prop.b_coeffs[prop.stages + i]);
        }
        Ok((high, high - low))
    }
}
