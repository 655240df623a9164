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

use crate::cosmic::StateVector;

/// Normalizes an embedded error estimate into a scalar compared against the
/// step tolerance.
pub trait ErrorCtrl {
    fn estimate(error: &StateVector, candidate: &StateVector, cur_state: &StateVector) -> f64;
}

/// RSS of the whole error vector, relative to the candidate state magnitude
/// with an absolute floor of one.
pub struct RSSStep;

impl ErrorCtrl for RSSStep {
    fn estimate(error: &StateVector, candidate: &StateVector, _cur_state: &StateVector) -> f64 {
        let mag = candidate.norm();
        if mag > 1.0 {
            error.norm() / mag
        } else {
            error.norm()
        }
    }
}

/// Position and velocity blocks judged separately (the attitude block is
/// bounded by construction); the worse of the two relative errors governs
/// the step.
pub struct RSSStepPV;

impl ErrorCtrl for RSSStepPV {
    fn estimate(error: &StateVector, candidate: &StateVector, _cur_state: &StateVector) -> f64 {
        let err_p = error.fixed_rows::<3>(0).norm();
        let err_v = error.fixed_rows::<3>(3).norm();
        let err_att = error.fixed_rows::<12>(6).norm();
        let mag_p = candidate.fixed_rows::<3>(0).norm();
        let mag_v = candidate.fixed_rows::<3>(3).norm();
        let rel_p = if mag_p > 1e-6 { err_p / mag_p } else { err_p };
        let rel_v = if mag_v > 1e-6 { err_v / mag_v } else { err_v };
        rel_p.max(rel_v).max(err_att)
    }
}
