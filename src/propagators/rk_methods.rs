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

/// Butcher tableau of an embedded explicit Runge–Kutta method.
///
/// `A_COEFFS` is the strictly lower triangular part in row order;
/// `B_COEFFS` holds the higher-order weights followed by the embedded
/// lower-order weights (2 × STAGES entries).
pub trait RK {
    /// Order of the propagating solution.
    const ORDER: u8;
    const STAGES: usize;
    const A_COEFFS: &'static [f64];
    const B_COEFFS: &'static [f64];
}

/// Dormand–Prince 5(4) with the FSAL stage kept explicit. The workhorse at
/// tight tolerances on these mildly stiff fields.
pub struct Dormand45;

impl RK for Dormand45 {
    const ORDER: u8 = 5;
    const STAGES: usize = 7;
    const A_COEFFS: &'static [f64] = &[
        1.0 / 5.0,
        3.0 / 40.0,
        9.0 / 40.0,
        44.0 / 45.0,
        -56.0 / 15.0,
        32.0 / 9.0,
        19_372.0 / 6_561.0,
        -25_360.0 / 2_187.0,
        64_448.0 / 6_561.0,
        -212.0 / 729.0,
        9_017.0 / 3_168.0,
        -355.0 / 33.0,
        46_732.0 / 5_247.0,
        49.0 / 176.0,
        -5_103.0 / 18_656.0,
        35.0 / 384.0,
        0.0,
        500.0 / 1_113.0,
        125.0 / 192.0,
        -2_187.0 / 6_784.0,
        11.0 / 84.0,
    ];
    const B_COEFFS: &'static [f64] = &[
        35.0 / 384.0,
        0.0,
        500.0 / 1_113.0,
        125.0 / 192.0,
        -2_187.0 / 6_784.0,
        11.0 / 84.0,
        0.0,
        5_179.0 / 57_600.0,
        0.0,
        7_571.0 / 16_695.0,
        393.0 / 640.0,
        -92_097.0 / 339_200.0,
        187.0 / 2_100.0,
        1.0 / 40.0,
    ];
}

/// Classic fixed-step fourth order Runge–Kutta; the embedded row repeats
/// the propagating weights so the error estimate is zero.
pub struct RK4Fixed;

impl RK for RK4Fixed {
    const ORDER: u8 = 4;
    const STAGES: usize = 4;
    const A_COEFFS: &'static [f64] = &[0.5, 0.0, 0.5, 0.0, 0.0, 1.0];
    const B_COEFFS: &'static [f64] = &[
        1.0 / 6.0,
        1.0 / 3.0,
        1.0 / 3.0,
        1.0 / 6.0,
        1.0 / 6.0,
        1.0 / 3.0,
        1.0 / 3.0,
        1.0 / 6.0,
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row_sums<M: RK>() -> Vec<f64> {
        // The c_i nodes are the A row sums for these tableaus.
        let mut sums = Vec::with_capacity(M::STAGES);
        let mut idx = 0;
        sums.push(0.0);
        for i in 1..M::STAGES {
            let mut s = 0.0;
            for _ in 0..i {
                s += M::A_COEFFS[idx];
                idx += 1;
            }
            sums.push(s);
        }
        sums
    }

    #[test]
    fn dormand45_weights_are_consistent() {
        let b = Dormand45::B_COEFFS;
        let high: f64 = b[..7].iter().sum();
        let low: f64 = b[7..].iter().sum();
        assert!((high - 1.0).abs() < 1e-15);
        assert!((low - 1.0).abs() < 1e-15);
        let c = row_sums::<Dormand45>();
        assert!((c[1] - 0.2).abs() < 1e-15);
        assert!((c[6] - 1.0).abs() < 1e-12, "last node must sit at 1");
    }

    #[test]
    fn rk4_rows() {
        let b = RK4Fixed::B_COEFFS;
        assert_eq!(b.len(), 8);
        assert!((b[..4].iter().sum::<f64>() - 1.0).abs() < 1e-15);
        let c = row_sums::<RK4Fixed>();
        assert_eq!(c, vec![0.0, 0.5, 0.5, 1.0]);
    }
}
