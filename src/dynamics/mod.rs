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

//! Equations of motion of the dumbbell about the rotating asteroid.
//!
//! One right-hand-side signature serves every phase: the frame (inertial or
//! asteroid-fixed), the gravity source (polyhedron or point-mass fallback),
//! and an optional borrowed guidance computer select the variant. The RHS
//! is pure — all measurement side effects live in the orchestrator.

use crate::cosmic::{Asteroid, Dumbbell, State, StateVector};
use crate::errors::SimError;
use crate::guidance::GuidanceComputer;
use crate::kinematics::{hat, rot3};
use nalgebra::Vector3;

/// Frame the state is expressed in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameKind {
    Inertial,
    /// Rotating with the asteroid; adds the Coriolis-like transport terms.
    AsteroidFixed,
}

/// A propagatable set of equations of motion.
pub trait Dynamics {
    /// State derivative at (t, x).
    fn eom(&self, t: f64, state: &StateVector) -> Result<StateVector, SimError>;
}

/// Gravity field evaluated at body-fixed field points.
pub enum GravitySource<'a> {
    Polyhedron(&'a Asteroid),
    /// Keplerian fallback with the same sign convention (U > 0,
    /// attraction = +∇U); the two-body validation seam.
    PointMass { mu: f64 },
}

impl<'a> GravitySource<'a> {
    /// Potential and attraction at a body-frame point.
    pub fn field(&self, r: &Vector3<f64>) -> Result<(f64, Vector3<f64>), SimError> {
        match self {
            GravitySource::Polyhedron(ast) => {
                let p = ast.potential(r)?;
                Ok((p.potential, p.gradient))
            }
            GravitySource::PointMass { mu } => {
                let n = r.norm();
                if n < 1e-12 {
                    return Err(SimError::Geometry(
                        "point-mass field evaluated at the origin".into(),
                    ));
                }
                Ok((mu / n, -mu * r / (n * n * n)))
            }
        }
    }
}

/// The 18-state dumbbell EOM.
pub struct DumbbellDynamics<'a> {
    pub dumbbell: &'a Dumbbell,
    gravity: GravitySource<'a>,
    /// Asteroid spin rate, rad/s.
    spin: f64,
    frame: FrameKind,
    guidance: Option<&'a GuidanceComputer>,
}

impl<'a> DumbbellDynamics<'a> {
    /// Uncontrolled inertial-frame dynamics over the polyhedron field.
    pub fn inertial(dumbbell: &'a Dumbbell, asteroid: &'a Asteroid) -> Self {
        Self {
            dumbbell,
            gravity: GravitySource::Polyhedron(asteroid),
            spin: asteroid.omega(),
            frame: FrameKind::Inertial,
            guidance: None,
        }
    }

    /// Uncontrolled asteroid-fixed (rotating frame) dynamics.
    pub fn relative(dumbbell: &'a Dumbbell, asteroid: &'a Asteroid) -> Self {
        Self {
            frame: FrameKind::AsteroidFixed,
            ..Self::inertial(dumbbell, asteroid)
        }
    }

    /// Inertial dynamics over a Keplerian point mass with the given spin.
    pub fn point_mass(dumbbell: &'a Dumbbell, mu: f64, spin: f64) -> Self {
        Self {
            dumbbell,
            gravity: GravitySource::PointMass { mu },
            spin,
            frame: FrameKind::Inertial,
            guidance: None,
        }
    }

    /// Closes the loop with a guidance computer. The computer must have
    /// been built for the same frame.
    pub fn with_guidance(mut self, guidance: &'a GuidanceComputer) -> Self {
        self.guidance = Some(guidance);
        self
    }

    pub fn frame(&self) -> FrameKind {
        self.frame
    }

    /// Gravity force and torque on the two end masses.
    ///
    /// Inertial frame: field points are `Raᵀ(p + Rζ_k)`, forces come back
    /// rotated into inertial, torques in the spacecraft body frame.
    /// Asteroid frame: field points are `p + Rζ_k` directly and the torque
    /// is expressed in the asteroid frame.
    fn gravity_wrench(
        &self,
        t: f64,
        s: &State,
    ) -> Result<(Vector3<f64>, Vector3<f64>, f64, f64), SimError> {
        let d = self.dumbbell;
        match self.frame {
            FrameKind::Inertial => {
                let ra = rot3(self.spin * t);
                let z1 = ra.transpose() * (s.pos + s.dcm * d.zeta1);
                let z2 = ra.transpose() * (s.pos + s.dcm * d.zeta2);
                let (u1, g1) = self.gravity.field(&z1)?;
                let (u2, g2) = self.gravity.field(&z2)?;
                let force = d.m1 * (ra * g1) + d.m2 * (ra * g2);
                let torque = d.m1 * hat(&d.zeta1) * (s.dcm.transpose() * ra * g1)
                    + d.m2 * hat(&d.zeta2) * (s.dcm.transpose() * ra * g2);
                Ok((force, torque, u1, u2))
            }
            FrameKind::AsteroidFixed => {
                let z1 = s.pos + s.dcm * d.zeta1;
                let z2 = s.pos + s.dcm * d.zeta2;
                let (u1, g1) = self.gravity.field(&z1)?;
                let (u2, g2) = self.gravity.field(&z2)?;
                let force = d.m1 * g1 + d.m2 * g2;
                let torque =
                    d.m1 * hat(&(s.dcm * d.zeta1)) * g1 + d.m2 * hat(&(s.dcm * d.zeta2)) * g2;
                Ok((force, torque, u1, u2))
            }
        }
    }

    /// Closed-loop wrench at (t, state), zero when uncontrolled. Exposed so
    /// the orchestrator can meter control effort at tick boundaries.
    pub fn control_wrench(
        &self,
        t: f64,
        s: &State,
    ) -> Result<(Vector3<f64>, Vector3<f64>), SimError> {
        match self.guidance {
            Some(g) => {
                let (force, _, _, _) = self.gravity_wrench(t, s)?;
                Ok(g.control(t, s, self.dumbbell, &force))
            }
            None => Ok((Vector3::zeros(), Vector3::zeros())),
        }
    }

    /// Total mechanical energy of the inertial form, for the conservation
    /// checks: kinetic plus −Σ m_k U_k.
    pub fn inertial_energy(&self, t: f64, s: &State) -> Result<f64, SimError> {
        let d = self.dumbbell;
        let ra = rot3(self.spin * t);
        let z1 = ra.transpose() * (s.pos + s.dcm * d.zeta1);
        let z2 = ra.transpose() * (s.pos + s.dcm * d.zeta2);
        let (u1, _) = self.gravity.field(&z1)?;
        let (u2, _) = self.gravity.field(&z2)?;
        let kinetic = 0.5 * d.total_mass() * s.vel.norm_squared()
            + 0.5 * s.omega.dot(&(d.inertia * s.omega));
        Ok(kinetic - d.m1 * u1 - d.m2 * u2)
    }
}

impl<'a> Dynamics for DumbbellDynamics<'a> {
    fn eom(&self, t: f64, state: &StateVector) -> Result<StateVector, SimError> {
        let s = State::from_vector(state);
        let d = self.dumbbell;
        let (force, torque, _, _) = self.gravity_wrench(t, &s)?;
        let (u_f, u_m) = match self.guidance {
            Some(g) => g.control(t, &s, d, &force),
            None => (Vector3::zeros(), Vector3::zeros()),
        };
        let m_total = d.total_mass();

        let mut out = State::at_rest(Vector3::zeros());
        match self.frame {
            FrameKind::Inertial => {
                out.pos = s.vel;
                out.vel = (force + u_f) / m_total;
                out.dcm = s.dcm * hat(&s.omega);
                out.omega = d.inertia_pinv()
                    * (torque - s.omega.cross(&(d.inertia * s.omega)) + u_m);
            }
            FrameKind::AsteroidFixed => {
                // Exact pullback of the inertial form through Ra(t): the
                // state carries the rotated inertial velocity and the
                // inertial angular velocity expressed in asteroid axes.
                let wa = Vector3::new(0.0, 0.0, self.spin);
                out.pos = s.vel - hat(&wa) * s.pos;
                out.vel = (force - m_total * hat(&wa) * s.vel + u_f) / m_total;
                out.dcm = hat(&s.omega) * s.dcm - hat(&wa) * s.dcm;
                let omega_b = s.dcm.transpose() * s.omega;
                let gyro = omega_b.cross(&(d.inertia * omega_b));
                out.omega = -hat(&wa) * s.omega
                    + s.dcm
                        * (d.inertia_pinv()
                            * (s.dcm.transpose() * (torque + u_m) - gyro));
            }
        }
        // The velocity slot of the packed derivative carries position rate,
        // and so on: pack the rates into the same layout as the state.
        let mut dx = StateVector::zeros();
        for k in 0..3 {
            dx[k] = out.pos[k];
            dx[3 + k] = out.vel[k];
            dx[15 + k] = out.omega[k];
        }
        for i in 0..3 {
            for j in 0..3 {
                dx[6 + 3 * i + j] = out.dcm[(i, j)];
            }
        }
        Ok(dx)
    }
}
