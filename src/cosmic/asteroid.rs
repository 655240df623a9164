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

use crate::errors::SimError;
use crate::gravity::{PointPotential, PolyGravity, G};
use crate::kinematics::rot3;
use crate::shape::MeshData;
use log::info;
use nalgebra::{Matrix3, Vector3};
use std::fmt;
use std::path::Path;

/// Physical constants of a named body: spin rate about the body z-axis and
/// bulk density.
#[derive(Clone, Copy, Debug)]
pub struct AsteroidConstants {
    /// rad/s
    pub omega: f64,
    /// kg/km³
    pub density: f64,
}

/// Spin periods and densities of the supported shape models.
const PRESETS: &[(&str, AsteroidConstants)] = &[
    (
        "castalia",
        AsteroidConstants {
            omega: 2.0 * std::f64::consts::PI / (4.07 * 3600.0),
            density: 2.1e12,
        },
    ),
    (
        "itokawa",
        AsteroidConstants {
            omega: 2.0 * std::f64::consts::PI / (12.132 * 3600.0),
            density: 1.9e12,
        },
    ),
    (
        "eros",
        AsteroidConstants {
            omega: 2.0 * std::f64::consts::PI / (5.27 * 3600.0),
            density: 2.67e12,
        },
    ),
];

/// A uniformly rotating constant-density polyhedral body.
///
/// The mesh is stored in body-fixed coordinates; the world configuration at
/// time t is `rot3(Ω t) · body`.
pub struct Asteroid {
    name: String,
    mesh: MeshData,
    gravity: PolyGravity,
    constants: AsteroidConstants,
    mu: f64,
    axes: [f64; 3],
}

impl Asteroid {
    /// Preset constants for a supported shape model name.
    pub fn lookup(name: &str) -> Result<AsteroidConstants, SimError> {
        PRESETS
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, c)| *c)
            .ok_or_else(|| SimError::UnknownAsteroid(name.to_string()))
    }

    /// Looks up the named preset and wraps the given body-frame mesh.
    pub fn from_mesh(name: &str, mesh: MeshData) -> Result<Self, SimError> {
        let constants = Self::lookup(name)?;
        let gravity = PolyGravity::new(&mesh, constants.density);
        let mu = G * constants.density * mesh.volume();
        let axes = mesh.half_extents();
        info!(
            "asteroid {name}: {} vertices, {} faces, mu = {mu:.4e} km3/s2, spin period {:.2} h",
            mesh.num_vertices(),
            mesh.num_faces(),
            2.0 * std::f64::consts::PI / constants.omega / 3600.0
        );
        Ok(Self {
            name: name.to_string(),
            mesh,
            gravity,
            constants,
            mu,
            axes,
        })
    }

    /// Loads the shape model from a Wavefront OBJ file.
    pub fn from_obj<P: AsRef<Path>>(name: &str, path: P) -> Result<Self, SimError> {
        let (v, f) = crate::shape::read_obj(path)?;
        Self::from_mesh(name, MeshData::new(v, f)?)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mesh(&self) -> &MeshData {
        &self.mesh
    }

    pub fn constants(&self) -> AsteroidConstants {
        self.constants
    }

    /// Spin rate Ω, rad/s.
    pub fn omega(&self) -> f64 {
        self.constants.omega
    }

    /// Spin vector Ω ẑ in body (and inertial) coordinates.
    pub fn omega_vector(&self) -> Vector3<f64> {
        Vector3::new(0.0, 0.0, self.constants.omega)
    }

    /// Gravitational parameter G·ρ·V, km³/s².
    pub fn mu(&self) -> f64 {
        self.mu
    }

    /// Reference half-axes (a, b, c) of the shape.
    pub fn axes(&self) -> [f64; 3] {
        self.axes
    }

    /// Body-to-inertial rotation at time t.
    pub fn rot_ast2int(&self, t: f64) -> Matrix3<f64> {
        rot3(self.constants.omega * t)
    }

    /// The true surface rotated into the inertial frame at time t.
    pub fn rotate_vertices(&self, t: f64) -> Vec<Vector3<f64>> {
        let ra = self.rot_ast2int(t);
        self.mesh.vertices().iter().map(|v| ra * v).collect()
    }

    /// Polyhedron potential at a body-frame field point.
    pub fn potential(&self, r_body: &Vector3<f64>) -> Result<PointPotential, SimError> {
        self.gravity.potential(r_body)
    }

    pub fn g_rho(&self) -> f64 {
        self.gravity.g_rho()
    }
}

impl fmt::Display for Asteroid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} faces, mu = {:.4e} km3/s2)",
            self.name,
            self.mesh.num_faces(),
            self.mu
        )
    }
}
