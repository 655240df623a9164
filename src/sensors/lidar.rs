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

//! The ranging head: an n×n fan of unit directions about a view axis. The
//! head only generates pointing targets; intersection happens in the
//! caster.

use crate::kinematics;
use nalgebra::{Matrix3, Unit, Vector3};

/// LIDAR beam pattern in the spacecraft body frame.
///
/// `view_axis` and `up_axis` define the sensor frame; the up axis is
/// re-orthogonalized against the view axis whenever either is set.
#[derive(Clone, Debug)]
pub struct Lidar {
    view_axis: Vector3<f64>,
    up_axis: Vector3<f64>,
    fov: [f64; 2],
    dist: f64,
    num_steps: usize,
}

impl Default for Lidar {
    /// The exploration configuration: +x view, +z up, 7°×7° fov, 3×3 grid.
    fn default() -> Self {
        Self {
            view_axis: Vector3::x(),
            up_axis: Vector3::z(),
            fov: [7f64.to_radians(), 7f64.to_radians()],
            dist: 2.0,
            num_steps: 3,
        }
    }
}

impl Lidar {
    pub fn with_view_axis(mut self, view: Vector3<f64>) -> Self {
        self.view_axis = view.normalize();
        self.reorthogonalize();
        self
    }

    pub fn with_up_axis(mut self, up: Vector3<f64>) -> Self {
        self.up_axis = up.normalize();
        self.reorthogonalize();
        self
    }

    pub fn with_fov(mut self, fov: [f64; 2]) -> Self {
        self.fov = fov;
        self
    }

    pub fn with_dist(mut self, dist: f64) -> Self {
        self.dist = dist;
        self
    }

    pub fn with_steps(mut self, num_steps: usize) -> Self {
        assert!(num_steps >= 1);
        self.num_steps = num_steps;
        self
    }

    fn reorthogonalize(&mut self) {
        let proj = self.up_axis - self.up_axis.dot(&self.view_axis) * self.view_axis;
        if proj.norm() < 1e-9 {
            // Up collapsed onto view; pick any perpendicular.
            self.up_axis = if self.view_axis.x.abs() < 0.9 {
                self.view_axis.cross(&Vector3::x()).normalize()
            } else {
                self.view_axis.cross(&Vector3::y()).normalize()
            };
        } else {
            self.up_axis = proj.normalize();
        }
    }

    pub fn view_axis(&self) -> Vector3<f64> {
        self.view_axis
    }

    pub fn up_axis(&self) -> Vector3<f64> {
        self.up_axis
    }

    pub fn fov(&self) -> [f64; 2] {
        self.fov
    }

    pub fn dist(&self) -> f64 {
        self.dist
    }

    pub fn num_steps(&self) -> usize {
        self.num_steps
    }

    /// The n×n grid of unit directions in the spacecraft body frame,
    /// spanning ±fov/2 about the view axis.
    pub fn directions(&self) -> Vec<Vector3<f64>> {
        let right = Unit::new_normalize(self.up_axis.cross(&self.view_axis));
        let up = Unit::new_normalize(self.up_axis);
        let n = self.num_steps;
        let mut dirs = Vec::with_capacity(n * n);
        for i in 0..n {
            for j in 0..n {
                let a = grid_angle(self.fov[0], n, i);
                let b = grid_angle(self.fov[1], n, j);
                let dir = kinematics::exp_so3(&(up.into_inner() * a))
                    * kinematics::exp_so3(&(right.into_inner() * b))
                    * self.view_axis;
                dirs.push(dir.normalize());
            }
        }
        dirs
    }

    /// World-frame target points for a spacecraft at `p` with body-to-world
    /// attitude `r_b2w`, each at range `dist` along a grid direction.
    pub fn define_targets(
        &self,
        p: &Vector3<f64>,
        r_b2w: &Matrix3<f64>,
        dist: f64,
    ) -> Vec<Vector3<f64>> {
        self.directions()
            .iter()
            .map(|d| p + dist * (r_b2w * d))
            .collect()
    }
}

fn grid_angle(fov: f64, n: usize, k: usize) -> f64 {
    if n == 1 {
        0.0
    } else {
        -fov / 2.0 + fov * k as f64 / (n - 1) as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn grid_is_symmetric_about_view_axis() {
        let lidar = Lidar::default();
        let dirs = lidar.directions();
        assert_eq!(dirs.len(), 9);
        // Center beam is the view axis itself.
        assert_abs_diff_eq!(dirs[4], Vector3::x(), epsilon = 1e-12);
        let mean: Vector3<f64> = dirs.iter().sum::<Vector3<f64>>() / 9.0;
        assert!(mean.cross(&Vector3::x()).norm() < 1e-12);
        for d in &dirs {
            assert_abs_diff_eq!(d.norm(), 1.0, epsilon = 1e-12);
            assert!(d.angle(&Vector3::x()) <= 7f64.to_radians());
        }
    }

    #[test]
    fn up_axis_reorthogonalized() {
        let lidar = Lidar::default()
            .with_view_axis(Vector3::new(1.0, 1.0, 0.0))
            .with_up_axis(Vector3::new(1.0, 0.0, 0.0));
        assert!(lidar.view_axis().dot(&lidar.up_axis()).abs() < 1e-12);
    }

    #[test]
    fn targets_rotate_with_attitude() {
        let lidar = Lidar::default().with_steps(1);
        let r = crate::kinematics::rot3(std::f64::consts::FRAC_PI_2);
        let p = Vector3::new(1.0, 2.0, 3.0);
        let targets = lidar.define_targets(&p, &r, 2.0);
        assert_eq!(targets.len(), 1);
        // Body +x points along world +y after the rotation.
        assert_abs_diff_eq!(targets[0], p + 2.0 * Vector3::y(), epsilon = 1e-12);
    }
}
