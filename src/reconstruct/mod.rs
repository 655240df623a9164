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

//! Incremental shape reconstruction. Every ranging return drags the nearest
//! estimate vertex toward the measurement and bleeds uncertainty out of its
//! neighborhood; local refinement subdivides the mesh around a candidate
//! landing site so the next measurements can resolve finer terrain.

use crate::errors::SimError;
use crate::shape::MeshData;
use log::{debug, info, warn};
use nalgebra::Vector3;
use std::collections::{HashMap, HashSet};

/// Neighborhood uncertainty decay factor.
const KAPPA: f64 = 0.5;
/// Bound on the red/green refinement sweeps of one request.
const MAX_REFINE_PASSES: usize = 24;

/// The shape estimate: a mesh plus one uncertainty weight per vertex in
/// [0, 1], 1 meaning unknown and 0 meaning known. A vertex with zero weight
/// no longer moves (the blend factor `s = w·w_m` vanishes with it).
pub struct ReconstructMesh {
    mesh: MeshData,
    weights: Vec<f64>,
    max_vertices: usize,
}

impl ReconstructMesh {
    /// Wraps a seed mesh with every vertex fully unknown (w = 1).
    pub fn new(mesh: MeshData) -> Self {
        let n = mesh.num_vertices();
        Self {
            mesh,
            weights: vec![1.0; n],
            max_vertices: 10 * n,
        }
    }

    /// Restores an estimate from archived vertices and weights.
    pub fn with_weights(mesh: MeshData, weights: Vec<f64>) -> Result<Self, SimError> {
        if weights.len() != mesh.num_vertices() {
            return Err(SimError::Geometry(format!(
                "{} weights for {} vertices",
                weights.len(),
                mesh.num_vertices()
            )));
        }
        let max_vertices = 10 * mesh.num_vertices();
        Ok(Self {
            mesh,
            weights,
            max_vertices,
        })
    }

    pub fn mesh(&self) -> &MeshData {
        &self.mesh
    }

    pub fn vertices(&self) -> &[Vector3<f64>] {
        self.mesh.vertices()
    }

    pub fn faces(&self) -> &[[usize; 3]] {
        self.mesh.faces()
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Sum of all vertex weights, the scalar uncertainty of the estimate.
    pub fn total_weight(&self) -> f64 {
        self.weights.iter().sum()
    }

    /// Sum of weights of the vertices within `half_angle` of `dir` as seen
    /// from the body centroid.
    pub fn weight_in_cone(&self, dir: &Vector3<f64>, half_angle: f64) -> f64 {
        let centroid = self.mesh.centroid();
        let d = dir - centroid;
        let d = if d.norm() < 1e-30 { *dir } else { d };
        let d_unit = d.normalize();
        self.mesh
            .vertices()
            .iter()
            .zip(&self.weights)
            .filter(|(v, _)| {
                let rv = *v - centroid;
                let n = rv.norm();
                n > 1e-30 && (rv.dot(&d_unit) / n).clamp(-1.0, 1.0).acos() < half_angle
            })
            .map(|(_, w)| w)
            .sum()
    }

    /// Folds a batch of body-frame intersection points into the estimate
    /// with unit measurement weight. Non-finite rows (misses) are dropped.
    pub fn update(&mut self, batch: &[Vector3<f64>], max_half_angle: f64) {
        self.update_weighted(batch, max_half_angle, 1.0)
    }

    /// Folds a batch with an explicit per-measurement weight `meas_weight`.
    pub fn update_weighted(&mut self, batch: &[Vector3<f64>], max_half_angle: f64, meas_weight: f64) {
        for m in batch {
            if !(m.x.is_finite() && m.y.is_finite() && m.z.is_finite()) {
                continue;
            }
            let (vi, _) = self.mesh.nearest_vertex(m);
            let w = self.weights[vi];
            let s = (w * meas_weight).clamp(0.0, 1.0);
            let blended = (1.0 - s) * self.mesh.vertices()[vi] + s * *m;
            self.mesh.update_vertex(vi, blended);
            for vj in self.mesh.one_ring(vi) {
                let angle = self.mesh.angular_separation(vi, vj);
                if angle < max_half_angle {
                    let decay = 1.0 - KAPPA * (1.0 - angle / max_half_angle);
                    self.weights[vj] = (self.weights[vj] * decay).clamp(0.0, 1.0);
                }
            }
            self.weights[vi] = (self.weights[vi] * (1.0 - meas_weight)).clamp(0.0, 1.0);
        }
    }

    /// Refines the faces whose centers lie within `half_angle` of `center`
    /// (a body-fixed direction) until no edge in that cone is longer than
    /// `target_edge_length`. Marked faces get a 1-to-4 split; neighbors
    /// sharing a split edge get the conforming 1-to-2 split. New vertices
    /// are seeded fully unknown. If the result would breach the vertex cap
    /// or fail validation, the estimate is left untouched.
    pub fn remesh_faces_in_view(
        &mut self,
        center: &Vector3<f64>,
        half_angle: f64,
        target_edge_length: f64,
    ) -> Result<(), SimError> {
        let mut vertices = self.mesh.vertices().to_vec();
        let mut faces = self.mesh.faces().to_vec();
        let mut weights = self.weights.clone();

        for pass in 0..MAX_REFINE_PASSES {
            let centroid = vertices.iter().sum::<Vector3<f64>>() / vertices.len() as f64;
            let dir = center - centroid;
            if dir.norm() < 1e-30 {
                return Err(SimError::Remesh(
                    "view center coincides with the body centroid".into(),
                ));
            }
            let d_unit = dir.normalize();

            // Mark the overlong edges of the in-cone faces.
            let mut marked: HashSet<(usize, usize)> = HashSet::new();
            for f in &faces {
                let c = (vertices[f[0]] + vertices[f[1]] + vertices[f[2]]) / 3.0;
                let rc = c - centroid;
                let n = rc.norm();
                if n < 1e-30 || (rc.dot(&d_unit) / n).clamp(-1.0, 1.0).acos() >= half_angle {
                    continue;
                }
                for k in 0..3 {
                    let (a, b) = (f[k], f[(k + 1) % 3]);
                    if (vertices[a] - vertices[b]).norm() > target_edge_length {
                        marked.insert((a.min(b), a.max(b)));
                    }
                }
            }
            if marked.is_empty() {
                debug!("refinement converged after {pass} passes");
                break;
            }

            // Conformity closure: a face with two split edges splits fully.
            loop {
                let mut grew = false;
                for f in &faces {
                    let mut count = 0;
                    for k in 0..3 {
                        let (a, b) = (f[k], f[(k + 1) % 3]);
                        if marked.contains(&(a.min(b), a.max(b))) {
                            count += 1;
                        }
                    }
                    if count == 2 {
                        for k in 0..3 {
                            let (a, b) = (f[k], f[(k + 1) % 3]);
                            if marked.insert((a.min(b), a.max(b))) {
                                grew = true;
                            }
                        }
                    }
                }
                if !grew {
                    break;
                }
            }

            // Insert the midpoints.
            let mut midpoint: HashMap<(usize, usize), usize> = HashMap::new();
            for &(a, b) in &marked {
                let m = (vertices[a] + vertices[b]) / 2.0;
                vertices.push(m);
                weights.push(1.0);
                midpoint.insert((a, b), vertices.len() - 1);
            }
            if vertices.len() > self.max_vertices {
                warn!(
                    "refinement aborted: {} vertices would exceed the cap of {}",
                    vertices.len(),
                    self.max_vertices
                );
                return Err(SimError::Remesh(format!(
                    "vertex cap of {} exceeded",
                    self.max_vertices
                )));
            }

            let mut next_faces = Vec::with_capacity(faces.len() + 3 * marked.len());
            for f in &faces {
                let mid_of = |k: usize| {
                    let (a, b) = (f[k], f[(k + 1) % 3]);
                    midpoint.get(&(a.min(b), a.max(b))).copied()
                };
                // Green split: one divided edge k, apex at the third vertex.
                let green = |out: &mut Vec<[usize; 3]>, k: usize, m: usize| {
                    let (a, b, c) = (f[k], f[(k + 1) % 3], f[(k + 2) % 3]);
                    out.push([a, m, c]);
                    out.push([m, b, c]);
                };
                match [mid_of(0), mid_of(1), mid_of(2)] {
                    [None, None, None] => next_faces.push(*f),
                    [Some(m), None, None] => green(&mut next_faces, 0, m),
                    [None, Some(m), None] => green(&mut next_faces, 1, m),
                    [None, None, Some(m)] => green(&mut next_faces, 2, m),
                    [Some(m0), Some(m1), Some(m2)] => {
                        next_faces.push([f[0], m0, m2]);
                        next_faces.push([f[1], m1, m0]);
                        next_faces.push([f[2], m2, m1]);
                        next_faces.push([m0, m1, m2]);
                    }
                    _ => {
                        return Err(SimError::Remesh(
                            "conformity closure left a doubly split face".into(),
                        ))
                    }
                }
            }
            faces = next_faces;
        }

        match MeshData::new(vertices, faces) {
            Ok(mesh) => {
                info!(
                    "refined estimate to {} vertices / {} faces",
                    mesh.num_vertices(),
                    mesh.num_faces()
                );
                self.mesh = mesh;
                self.weights = weights;
                Ok(())
            }
            Err(e) => Err(SimError::Remesh(format!(
                "refined mesh failed validation, estimate unchanged: {e}"
            ))),
        }
    }
}
