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

//! Attitude kinematics kernel: the skew operator, axis rotations, the SO(3)
//! exponential and logarithm, DCM/quaternion conversions, and the tangent
//! space errors used by the geometric controller.
//!
//! Rotations compose on the left: `R_{A→B}` maps vectors expressed in frame A
//! into coordinates of frame B.

use nalgebra::{Matrix3, Rotation3, UnitQuaternion, Vector3};

/// Frobenius-norm threshold above which a DCM gets re-projected onto SO(3).
pub const ORTHO_TOL: f64 = 1e-6;

/// Skew-symmetric (hat) operator: `hat(v) w = v × w`.
pub fn hat(v: &Vector3<f64>) -> Matrix3<f64> {
    Matrix3::new(0.0, -v.z, v.y, v.z, 0.0, -v.x, -v.y, v.x, 0.0)
}

/// Inverse of [`hat`]: extracts the axial vector of a skew-symmetric matrix.
pub fn vee(m: &Matrix3<f64>) -> Vector3<f64> {
    Vector3::new(m[(2, 1)], m[(0, 2)], m[(1, 0)])
}

/// Rotation about the first (x) axis by `theta` radians.
pub fn rot1(theta: f64) -> Matrix3<f64> {
    let (s, c) = theta.sin_cos();
    Matrix3::new(1.0, 0.0, 0.0, 0.0, c, -s, 0.0, s, c)
}

/// Rotation about the second (y) axis by `theta` radians.
pub fn rot2(theta: f64) -> Matrix3<f64> {
    let (s, c) = theta.sin_cos();
    Matrix3::new(c, 0.0, s, 0.0, 1.0, 0.0, -s, 0.0, c)
}

/// Rotation about the third (z) axis by `theta` radians.
///
/// This is the body-to-inertial map of a frame spun by `+theta` about z, and
/// is how the asteroid rotation `Ra = rot3(Ω t)` is formed everywhere.
pub fn rot3(theta: f64) -> Matrix3<f64> {
    let (s, c) = theta.sin_cos();
    Matrix3::new(c, -s, 0.0, s, c, 0.0, 0.0, 0.0, 1.0)
}

/// SO(3) exponential of a rotation vector (Rodrigues form).
pub fn exp_so3(v: &Vector3<f64>) -> Matrix3<f64> {
    let angle = v.norm();
    if angle < 1e-12 {
        return Matrix3::identity() + hat(v);
    }
    let k = hat(&(v / angle));
    Matrix3::identity() + k * angle.sin() + k * k * (1.0 - angle.cos())
}

/// SO(3) logarithm, returned as a rotation vector.
pub fn log_so3(r: &Matrix3<f64>) -> Vector3<f64> {
    let cos_angle = ((r.trace() - 1.0) / 2.0).clamp(-1.0, 1.0);
    let angle = cos_angle.acos();
    if angle < 1e-12 {
        return vee(&(r - Matrix3::identity()));
    }
    if (std::f64::consts::PI - angle).abs() < 1e-9 {
        // Antipodal case: the axis comes out of R + I.
        let m = (r + Matrix3::identity()) / 2.0;
        let mut axis = Vector3::new(m[(0, 0)], m[(1, 1)], m[(2, 2)]).map(|x| x.abs().sqrt());
        if m[(0, 1)] < 0.0 {
            axis.y = -axis.y;
        }
        if m[(0, 2)] < 0.0 {
            axis.z = -axis.z;
        }
        return axis.normalize() * angle;
    }
    vee(&((r - r.transpose()) * (angle / (2.0 * angle.sin()))))
}

/// DCM to unit quaternion.
pub fn dcm_to_quat(r: &Matrix3<f64>) -> UnitQuaternion<f64> {
    UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(*r))
}

/// Unit quaternion to DCM.
pub fn quat_to_dcm(q: &UnitQuaternion<f64>) -> Matrix3<f64> {
    *q.to_rotation_matrix().matrix()
}

/// Frobenius norm of `RᵀR − I`, the orthonormality defect.
pub fn orthonormality_defect(r: &Matrix3<f64>) -> f64 {
    (r.transpose() * r - Matrix3::identity()).norm()
}

/// Polar projection of a near-rotation matrix back onto SO(3).
pub fn orthonormalize(r: &Matrix3<f64>) -> Matrix3<f64> {
    let svd = r.svd(true, true);
    let (u, v_t) = (svd.u.unwrap_or_else(Matrix3::identity), svd.v_t.unwrap_or_else(Matrix3::identity));
    let mut proj = u * v_t;
    if proj.determinant() < 0.0 {
        let mut u_flip = u;
        u_flip.set_column(2, &(-u.column(2)));
        proj = u_flip * v_t;
    }
    proj
}

/// SO(3) tangent-space attitude error `e_R = ½ (R_dᵀ R − Rᵀ R_d)ᵛ`.
pub fn attitude_error(r: &Matrix3<f64>, r_d: &Matrix3<f64>) -> Vector3<f64> {
    vee(&((r_d.transpose() * r - r.transpose() * r_d) * 0.5))
}

/// Body angular velocity tracking error `e_ω = ω − Rᵀ R_d ω_d`.
pub fn ang_vel_error(
    r: &Matrix3<f64>,
    r_d: &Matrix3<f64>,
    w: &Vector3<f64>,
    w_d: &Vector3<f64>,
) -> Vector3<f64> {
    w - r.transpose() * r_d * w_d
}
