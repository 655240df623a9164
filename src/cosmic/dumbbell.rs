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

use nalgebra::{Matrix3, Vector3};

/// The spacecraft: two point masses joined by a massless rod of length 2ℓ
/// along the body x-axis.
///
/// The inertia is that of the two points, `J = diag(0, mℓ², mℓ²)` with
/// `m = ½(m₁+m₂)`. The axial entry is structurally zero — the rod carries
/// no torque about its own axis — so angular dynamics use the diagonal
/// pseudo-inverse with a zero axial row.
#[derive(Clone, Copy, Debug)]
pub struct Dumbbell {
    /// kg
    pub m1: f64,
    /// kg
    pub m2: f64,
    /// Rod half-length, km.
    pub l: f64,
    /// Body-frame offset of mass 1, (−ℓ, 0, 0).
    pub zeta1: Vector3<f64>,
    /// Body-frame offset of mass 2, (+ℓ, 0, 0).
    pub zeta2: Vector3<f64>,
    /// Body inertia, kg·km².
    pub inertia: Matrix3<f64>,
    inertia_pinv: Matrix3<f64>,
}

impl Dumbbell {
    pub fn new(m1: f64, m2: f64, l: f64) -> Self {
        assert!(m1 > 0.0 && m2 > 0.0 && l > 0.0);
        let m = 0.5 * (m1 + m2);
        let j_t = m * l * l;
        let inertia = Matrix3::from_diagonal(&Vector3::new(0.0, j_t, j_t));
        assert!(
            (inertia - inertia.transpose()).norm() == 0.0,
            "dumbbell inertia must be symmetric"
        );
        let inertia_pinv = Matrix3::from_diagonal(&Vector3::new(0.0, 1.0 / j_t, 1.0 / j_t));
        Self {
            m1,
            m2,
            l,
            zeta1: Vector3::new(-l, 0.0, 0.0),
            zeta2: Vector3::new(l, 0.0, 0.0),
            inertia,
            inertia_pinv,
        }
    }

    pub fn total_mass(&self) -> f64 {
        self.m1 + self.m2
    }

    /// Transverse inertia mℓ² (the two equal nonzero entries of J).
    pub fn transverse_inertia(&self) -> f64 {
        self.inertia[(1, 1)]
    }

    /// Diagonal pseudo-inverse of the body inertia.
    pub fn inertia_pinv(&self) -> Matrix3<f64> {
        self.inertia_pinv
    }
}

impl Default for Dumbbell {
    /// The reference vehicle: 500 kg per end mass, 3 m half-rod.
    fn default() -> Self {
        Self::new(500.0, 500.0, 0.003)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_inertia() {
        let d = Dumbbell::default();
        assert_eq!(d.total_mass(), 1000.0);
        let j_t = 500.0 * 0.003 * 0.003;
        assert!((d.transverse_inertia() - j_t).abs() < 1e-15);
        assert_eq!(d.inertia[(0, 0)], 0.0);
        // J J⁺ is the projector onto the transverse plane.
        let proj = d.inertia * d.inertia_pinv();
        assert_eq!(proj[(0, 0)], 0.0);
        assert!((proj[(1, 1)] - 1.0).abs() < 1e-15);
        assert!((proj[(2, 2)] - 1.0).abs() < 1e-15);
    }
}
