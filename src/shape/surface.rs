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

//! Seed surface generation: subdivided icosahedra scaled onto a reference
//! ellipsoid. This is where the shape estimate starts before any ranging
//! measurement has been folded in.

use crate::errors::SimError;
use crate::shape::MeshData;
use nalgebra::Vector3;
use std::collections::HashMap;

/// Knobs of the seed mesher, mirroring the recorded parameters of a run.
///
/// `max_radius` bounds the circumradius of the seed triangles and therefore
/// drives the subdivision depth; `min_angle` (degrees) and `max_distance`
/// are recorded with the run parameters for the archive.
#[derive(Clone, Copy, Debug)]
pub struct SurfaceOptions {
    pub min_angle: f64,
    pub max_radius: f64,
    pub max_distance: f64,
}

impl Default for SurfaceOptions {
    fn default() -> Self {
        Self {
            min_angle: 10.0,
            max_radius: 0.03,
            max_distance: 0.5,
        }
    }
}

impl SurfaceOptions {
    /// Subdivision depth so that the seed edge length on the largest axis
    /// stays below `max_radius` (clamped to keep the seed tractable).
    pub fn subdivisions(&self, max_axis: f64) -> u32 {
        // The unit icosahedron edge is ~1.0515 circumradii.
        let target = (1.0515 * max_axis / self.max_radius).max(1.0);
        (target.log2().ceil() as u32).clamp(1, 5)
    }

    /// Builds the seed ellipsoid estimate for a body with half-axes `axes`.
    pub fn seed(&self, axes: [f64; 3]) -> Result<MeshData, SimError> {
        let depth = self.subdivisions(axes[0].max(axes[1]).max(axes[2]));
        let (v, f) = ellipsoid_mesh(axes[0], axes[1], axes[2], depth);
        MeshData::new(v, f)
    }
}

/// A unit icosphere: icosahedron subdivided `depth` times, vertices
/// projected onto the unit sphere. Outward oriented.
pub fn icosphere(depth: u32) -> (Vec<Vector3<f64>>, Vec<[usize; 3]>) {
    let t = (1.0 + 5f64.sqrt()) / 2.0;
    let mut vertices: Vec<Vector3<f64>> = [
        (-1.0, t, 0.0),
        (1.0, t, 0.0),
        (-1.0, -t, 0.0),
        (1.0, -t, 0.0),
        (0.0, -1.0, t),
        (0.0, 1.0, t),
        (0.0, -1.0, -t),
        (0.0, 1.0, -t),
        (t, 0.0, -1.0),
        (t, 0.0, 1.0),
        (-t, 0.0, -1.0),
        (-t, 0.0, 1.0),
    ]
    .iter()
    .map(|&(x, y, z)| Vector3::new(x, y, z).normalize())
    .collect();

    let mut faces: Vec<[usize; 3]> = vec![
        [0, 11, 5],
        [0, 5, 1],
        [0, 1, 7],
        [0, 7, 10],
        [0, 10, 11],
        [1, 5, 9],
        [5, 11, 4],
        [11, 10, 2],
        [10, 7, 6],
        [7, 1, 8],
        [3, 9, 4],
        [3, 4, 2],
        [3, 2, 6],
        [3, 6, 8],
        [3, 8, 9],
        [4, 9, 5],
        [2, 4, 11],
        [6, 2, 10],
        [8, 6, 7],
        [9, 8, 1],
    ];

    for _ in 0..depth {
        let mut midpoints: HashMap<(usize, usize), usize> = HashMap::new();
        let mut next = Vec::with_capacity(faces.len() * 4);
        for f in &faces {
            let mut mids = [0usize; 3];
            for k in 0..3 {
                let (a, b) = (f[k], f[(k + 1) % 3]);
                let key = (a.min(b), a.max(b));
                mids[k] = *midpoints.entry(key).or_insert_with(|| {
                    let m = ((vertices[a] + vertices[b]) / 2.0).normalize();
                    vertices.push(m);
                    vertices.len() - 1
                });
            }
            next.push([f[0], mids[0], mids[2]]);
            next.push([f[1], mids[1], mids[0]]);
            next.push([f[2], mids[2], mids[1]]);
            next.push([mids[0], mids[1], mids[2]]);
        }
        faces = next;
    }

    (vertices, faces)
}

/// An icosphere stretched onto the ellipsoid with half-axes (a, b, c).
pub fn ellipsoid_mesh(a: f64, b: f64, c: f64, depth: u32) -> (Vec<Vector3<f64>>, Vec<[usize; 3]>) {
    let (mut v, f) = icosphere(depth);
    for p in &mut v {
        p.x *= a;
        p.y *= b;
        p.z *= c;
    }
    (v, f)
}
