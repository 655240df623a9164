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

//! Triangular surface mesh storage and topology queries.
//!
//! The mesh is stored as flat arrays rather than a pointer graph: a face →
//! vertex table, an edge table carrying the two incident faces of each edge,
//! and a vertex → face table in CSR form. All derived quantities (normals,
//! areas, centers, centroid) are rebuilt on construction and patched
//! incrementally when a single vertex moves.

mod obj;
mod surface;

pub use obj::{read_obj, write_obj};
pub use surface::{ellipsoid_mesh, icosphere, SurfaceOptions};

use crate::errors::SimError;
use nalgebra::Vector3;
use rayon::prelude::*;
use std::collections::HashMap;

/// An undirected mesh edge and the two faces sharing it.
#[derive(Clone, Copy, Debug)]
pub struct Edge {
    /// Endpoint vertex indices, `verts[0] < verts[1]`.
    pub verts: [usize; 2],
    /// The two incident face indices.
    pub faces: [usize; 2],
}

/// A closed, outward-oriented triangular mesh with derived adjacency.
#[derive(Clone, Debug)]
pub struct MeshData {
    vertices: Vec<Vector3<f64>>,
    faces: Vec<[usize; 3]>,
    edges: Vec<Edge>,
    vf_offsets: Vec<usize>,
    vf_faces: Vec<usize>,
    normals: Vec<Vector3<f64>>,
    areas: Vec<f64>,
    centers: Vec<Vector3<f64>>,
    centroid: Vector3<f64>,
}

impl MeshData {
    /// Builds a mesh and validates it: every edge must be shared by exactly
    /// two consistently oriented faces, no face may be degenerate, and the
    /// Euler characteristic must be 2.
    pub fn new(vertices: Vec<Vector3<f64>>, faces: Vec<[usize; 3]>) -> Result<Self, SimError> {
        if vertices.len() < 4 || faces.len() < 4 {
            return Err(SimError::Geometry(format!(
                "mesh too small: {} vertices, {} faces",
                vertices.len(),
                faces.len()
            )));
        }
        for (fi, f) in faces.iter().enumerate() {
            for &vi in f {
                if vi >= vertices.len() {
                    return Err(SimError::Geometry(format!(
                        "face {fi} references vertex {vi} out of {}",
                        vertices.len()
                    )));
                }
            }
            if f[0] == f[1] || f[1] == f[2] || f[0] == f[2] {
                return Err(SimError::Geometry(format!("face {fi} repeats a vertex")));
            }
        }

        // Directed edge census. A closed oriented 2-manifold has each directed
        // edge exactly once, and its reverse exactly once.
        let mut directed: HashMap<(usize, usize), usize> = HashMap::with_capacity(3 * faces.len());
        for (fi, f) in faces.iter().enumerate() {
            for k in 0..3 {
                let (a, b) = (f[k], f[(k + 1) % 3]);
                if directed.insert((a, b), fi).is_some() {
                    return Err(SimError::Geometry(format!(
                        "directed edge ({a},{b}) appears twice; mesh is not consistently oriented"
                    )));
                }
            }
        }

        let mut edges = Vec::with_capacity(3 * faces.len() / 2);
        for (&(a, b), &fi) in &directed {
            if a < b {
                match directed.get(&(b, a)) {
                    Some(&fj) => edges.push(Edge {
                        verts: [a, b],
                        faces: [fi, fj],
                    }),
                    None => {
                        return Err(SimError::Geometry(format!(
                            "edge ({a},{b}) has no opposite half-edge; mesh is not closed"
                        )))
                    }
                }
            } else if !directed.contains_key(&(b, a)) {
                return Err(SimError::Geometry(format!(
                    "edge ({b},{a}) has no opposite half-edge; mesh is not closed"
                )));
            }
        }

        let euler = vertices.len() as i64 - edges.len() as i64 + faces.len() as i64;
        if euler != 2 {
            return Err(SimError::Geometry(format!(
                "Euler characteristic is {euler}, expected 2"
            )));
        }

        // Vertex → face CSR.
        let mut counts = vec![0usize; vertices.len()];
        for f in &faces {
            for &vi in f {
                counts[vi] += 1;
            }
        }
        let mut vf_offsets = vec![0usize; vertices.len() + 1];
        for i in 0..vertices.len() {
            vf_offsets[i + 1] = vf_offsets[i] + counts[i];
        }
        let mut cursor = vf_offsets.clone();
        let mut vf_faces = vec![0usize; vf_offsets[vertices.len()]];
        for (fi, f) in faces.iter().enumerate() {
            for &vi in f {
                vf_faces[cursor[vi]] = fi;
                cursor[vi] += 1;
            }
        }

        let mut mesh = Self {
            vertices,
            faces,
            edges,
            vf_offsets,
            vf_faces,
            normals: Vec::new(),
            areas: Vec::new(),
            centers: Vec::new(),
            centroid: Vector3::zeros(),
        };
        mesh.recompute_face_data()?;
        Ok(mesh)
    }

    fn recompute_face_data(&mut self) -> Result<(), SimError> {
        self.normals.clear();
        self.areas.clear();
        self.centers.clear();
        for (fi, f) in self.faces.iter().enumerate() {
            let (p0, p1, p2) = (self.vertices[f[0]], self.vertices[f[1]], self.vertices[f[2]]);
            let cross = (p1 - p0).cross(&(p2 - p0));
            let double_area = cross.norm();
            if double_area < 1e-16 {
                return Err(SimError::Geometry(format!("face {fi} is degenerate")));
            }
            self.normals.push(cross / double_area);
            self.areas.push(double_area / 2.0);
            self.centers.push((p0 + p1 + p2) / 3.0);
        }
        self.centroid = self.vertices.iter().sum::<Vector3<f64>>() / self.vertices.len() as f64;
        Ok(())
    }

    pub fn vertices(&self) -> &[Vector3<f64>] {
        &self.vertices
    }

    pub fn faces(&self) -> &[[usize; 3]] {
        &self.faces
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn normals(&self) -> &[Vector3<f64>] {
        &self.normals
    }

    pub fn areas(&self) -> &[f64] {
        &self.areas
    }

    pub fn face_centers(&self) -> &[Vector3<f64>] {
        &self.centers
    }

    pub fn centroid(&self) -> Vector3<f64> {
        self.centroid
    }

    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    pub fn num_faces(&self) -> usize {
        self.faces.len()
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    /// Faces incident to vertex `vi`.
    pub fn vertex_faces(&self, vi: usize) -> &[usize] {
        &self.vf_faces[self.vf_offsets[vi]..self.vf_offsets[vi + 1]]
    }

    /// Vertex indices adjacent to `vi` (its 1-ring), without duplicates.
    pub fn one_ring(&self, vi: usize) -> Vec<usize> {
        let mut ring = Vec::with_capacity(8);
        for &fi in self.vertex_faces(vi) {
            for &vj in &self.faces[fi] {
                if vj != vi && !ring.contains(&vj) {
                    ring.push(vj);
                }
            }
        }
        ring
    }

    /// Moves a single vertex and patches the derived data of its incident
    /// faces and the mesh centroid.
    pub fn update_vertex(&mut self, vi: usize, pos: Vector3<f64>) {
        let n = self.vertices.len() as f64;
        self.centroid += (pos - self.vertices[vi]) / n;
        self.vertices[vi] = pos;
        for idx in self.vf_offsets[vi]..self.vf_offsets[vi + 1] {
            let fi = self.vf_faces[idx];
            let f = self.faces[fi];
            let (p0, p1, p2) = (self.vertices[f[0]], self.vertices[f[1]], self.vertices[f[2]]);
            let cross = (p1 - p0).cross(&(p2 - p0));
            let double_area = cross.norm();
            if double_area > 1e-16 {
                self.normals[fi] = cross / double_area;
            }
            self.areas[fi] = double_area / 2.0;
            self.centers[fi] = (p0 + p1 + p2) / 3.0;
        }
    }

    /// Angle at the centroid between the directions of vertices `a` and `b`.
    pub fn angular_separation(&self, a: usize, b: usize) -> f64 {
        let da = self.vertices[a] - self.centroid;
        let db = self.vertices[b] - self.centroid;
        let denom = da.norm() * db.norm();
        if denom < 1e-30 {
            return 0.0;
        }
        (da.dot(&db) / denom).clamp(-1.0, 1.0).acos()
    }

    /// Indices of faces whose center lies within `half_angle` of the
    /// direction `dir`, as seen from the body centroid.
    pub fn faces_in_cone(&self, dir: &Vector3<f64>, half_angle: f64) -> Vec<usize> {
        let d = dir - self.centroid;
        let d = if d.norm() < 1e-30 { *dir } else { d };
        let d_unit = d.normalize();
        self.centers
            .iter()
            .enumerate()
            .filter(|(_, c)| {
                let rc = *c - self.centroid;
                let n = rc.norm();
                n > 1e-30 && (rc.dot(&d_unit) / n).clamp(-1.0, 1.0).acos() < half_angle
            })
            .map(|(fi, _)| fi)
            .collect()
    }

    /// Index of the vertex closest to `p` and its distance.
    pub fn nearest_vertex(&self, p: &Vector3<f64>) -> (usize, f64) {
        let (vi, d2) = self
            .vertices
            .par_iter()
            .enumerate()
            .map(|(i, v)| (i, (v - p).norm_squared()))
            .reduce(
                || (usize::MAX, f64::INFINITY),
                |a, b| if b.1 < a.1 { b } else { a },
            );
        (vi, d2.sqrt())
    }

    /// Axis-aligned half-extents (max |x|, |y|, |z| over the vertices),
    /// the reference axes of the body.
    pub fn half_extents(&self) -> [f64; 3] {
        let mut ext = [0.0f64; 3];
        for v in &self.vertices {
            for k in 0..3 {
                ext[k] = ext[k].max(v[k].abs());
            }
        }
        ext
    }

    pub fn surface_area(&self) -> f64 {
        self.areas.iter().sum()
    }

    /// Enclosed volume by the divergence theorem.
    pub fn volume(&self) -> f64 {
        self.faces
            .iter()
            .map(|f| {
                self.vertices[f[0]]
                    .dot(&self.vertices[f[1]].cross(&self.vertices[f[2]]))
            })
            .sum::<f64>()
            / 6.0
    }

    /// Length of edge `ei`.
    pub fn edge_length(&self, ei: usize) -> f64 {
        let e = &self.edges[ei];
        (self.vertices[e.verts[0]] - self.vertices[e.verts[1]]).norm()
    }
}
