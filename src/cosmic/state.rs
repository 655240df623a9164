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

use crate::kinematics::{orthonormality_defect, orthonormalize, ORTHO_TOL};
use nalgebra::{Matrix3, SVector, Vector3};
use std::fmt;

/// Packed rigid body state length: position, velocity, row-major DCM, body
/// angular velocity.
pub type StateVector = SVector<f64, 18>;

/// The dumbbell rigid body state.
///
/// `dcm` maps spacecraft body coordinates into the frame the dynamics are
/// written in (inertial, or asteroid-fixed for the relative form).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct State {
    pub pos: Vector3<f64>,
    pub vel: Vector3<f64>,
    pub dcm: Matrix3<f64>,
    pub omega: Vector3<f64>,
}

impl State {
    pub fn new(pos: Vector3<f64>, vel: Vector3<f64>, dcm: Matrix3<f64>, omega: Vector3<f64>) -> Self {
        Self { pos, vel, dcm, omega }
    }

    /// At rest at `pos` with identity attitude.
    pub fn at_rest(pos: Vector3<f64>) -> Self {
        Self {
            pos,
            vel: Vector3::zeros(),
            dcm: Matrix3::identity(),
            omega: Vector3::zeros(),
        }
    }

    pub fn from_vector(x: &StateVector) -> Self {
        let pos = Vector3::new(x[0], x[1], x[2]);
        let vel = Vector3::new(x[3], x[4], x[5]);
        let dcm = Matrix3::new(x[6], x[7], x[8], x[9], x[10], x[11], x[12], x[13], x[14]);
        let omega = Vector3::new(x[15], x[16], x[17]);
        Self { pos, vel, dcm, omega }
    }

    pub fn to_vector(&self) -> StateVector {
        let mut x = StateVector::zeros();
        for k in 0..3 {
            x[k] = self.pos[k];
            x[3 + k] = self.vel[k];
            x[15 + k] = self.omega[k];
        }
        for i in 0..3 {
            for j in 0..3 {
                x[6 + 3 * i + j] = self.dcm[(i, j)];
            }
        }
        x
    }

    /// Re-projects the attitude onto SO(3) when integration drift exceeds
    /// the orthonormality threshold. Returns the defect that was found.
    pub fn renormalize(&mut self) -> f64 {
        let defect = orthonormality_defect(&self.dcm);
        if defect > ORTHO_TOL {
            self.dcm = orthonormalize(&self.dcm);
        }
        defect
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pos = [{:.6}, {:.6}, {:.6}] km\tvel = [{:.6e}, {:.6e}, {:.6e}] km/s\tω = [{:.3e}, {:.3e}, {:.3e}] rad/s",
            self.pos.x, self.pos.y, self.pos.z, self.vel.x, self.vel.y, self.vel.z,
            self.omega.x, self.omega.y, self.omega.z
        )
    }
}
