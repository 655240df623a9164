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

//! Exact gravitational potential of a constant-density polyhedron in the
//! Werner–Scheeres form: a finite sum of per-edge and per-face
//! contributions built from precomputed dyads.
//!
//! Sign convention: the potential is positive outside the body and the
//! attraction (acceleration) is `+∇U`, matching the dynamics assembly.

use crate::errors::SimError;
use crate::shape::MeshData;
use nalgebra::{Matrix3, Vector3};
use rayon::prelude::*;

/// Gravitational constant in km³/(kg·s²).
pub const G: f64 = 6.674_30e-20;

/// Denominator guard below which the field point is treated as degenerate
/// (sitting on a vertex, edge, or face plane of the summation term).
const DEGEN_TOL: f64 = 1e-12;
/// Perturbation applied to a degenerate field point before retrying.
const DEGEN_NUDGE: f64 = 1e-9;

/// Potential and its derivatives at one field point.
#[derive(Clone, Copy, Debug)]
pub struct PointPotential {
    /// U, km²/s².
    pub potential: f64,
    /// ∇U, the attraction, km/s².
    pub gradient: Vector3<f64>,
    /// ∇²U, the gradient matrix (Hessian), 1/s².
    pub gradient_mat: Matrix3<f64>,
    /// tr ∇²U = −Gρ ΣΩ_f: 0 outside the body, −4πGρ inside.
    pub laplacian: f64,
}

struct DegeneratePoint;

#[derive(Clone, Copy)]
struct TermSum {
    quad: f64,
    vec: Vector3<f64>,
    mat: Matrix3<f64>,
    scalar: f64,
}

impl TermSum {
    fn zero() -> Self {
        Self {
            quad: 0.0,
            vec: Vector3::zeros(),
            mat: Matrix3::zeros(),
            scalar: 0.0,
        }
    }

    fn merge(self, other: Self) -> Self {
        Self {
            quad: self.quad + other.quad,
            vec: self.vec + other.vec,
            mat: self.mat + other.mat,
            scalar: self.scalar + other.scalar,
        }
    }
}

/// Precomputed Werner–Scheeres summation data for one mesh.
pub struct PolyGravity {
    g_rho: f64,
    vertices: Vec<Vector3<f64>>,
    faces: Vec<[usize; 3]>,
    face_dyads: Vec<Matrix3<f64>>,
    edge_verts: Vec<[usize; 2]>,
    edge_dyads: Vec<Matrix3<f64>>,
    edge_lengths: Vec<f64>,
}

impl PolyGravity {
    /// Precomputes the face dyads `F_f = n̂_f n̂_fᵀ` and the edge dyads
    /// `E_e = n̂_A (n̂_A^e)ᵀ + n̂_B (n̂_B^e)ᵀ` for a validated mesh.
    /// `density` is in kg/km³.
    pub fn new(mesh: &MeshData, density: f64) -> Self {
        let vertices = mesh.vertices().to_vec();
        let faces = mesh.faces().to_vec();
        let normals = mesh.normals();

        let face_dyads = normals.iter().map(|n| n * n.transpose()).collect();

        let mut edge_verts = Vec::with_capacity(mesh.num_edges());
        let mut edge_dyads = Vec::with_capacity(mesh.num_edges());
        let mut edge_lengths = Vec::with_capacity(mesh.num_edges());
        for edge in mesh.edges() {
            let [a, b] = edge.verts;
            let mut dyad = Matrix3::zeros();
            for &fi in &edge.faces {
                // Edge direction as traversed in this face, so the in-plane
                // edge normal d̂ × n̂_f points out of the face.
                let f = faces[fi];
                let dir = if (f[0] == a && f[1] == b) || (f[1] == a && f[2] == b) || (f[2] == a && f[0] == b)
                {
                    vertices[b] - vertices[a]
                } else {
                    vertices[a] - vertices[b]
                };
                let edge_normal = dir.cross(&normals[fi]).normalize();
                dyad += normals[fi] * edge_normal.transpose();
            }
            edge_verts.push([a, b]);
            edge_dyads.push(dyad);
            edge_lengths.push((vertices[b] - vertices[a]).norm());
        }

        Self {
            g_rho: G * density,
            vertices,
            faces,
            face_dyads,
            edge_verts,
            edge_dyads,
            edge_lengths,
        }
    }

    pub fn g_rho(&self) -> f64 {
        self.g_rho
    }

    /// Evaluates U, ∇U, ∇²U, and the Laplacian at the field point `r`
    /// (body-fixed coordinates). A field point that lands exactly on a
    /// vertex, edge, or face is nudged by 1e-9 km and retried.
    pub fn potential(&self, r: &Vector3<f64>) -> Result<PointPotential, SimError> {
        let mut point = *r;
        for _ in 0..4 {
            match self.eval(&point) {
                Ok(p) => return Ok(p),
                Err(DegeneratePoint) => point.x += DEGEN_NUDGE,
            }
        }
        Err(SimError::Geometry(format!(
            "field point {point:?} is degenerate with respect to the mesh"
        )))
    }

    fn eval(&self, r: &Vector3<f64>) -> Result<PointPotential, DegeneratePoint> {
        let edge_sum = (0..self.edge_verts.len())
            .into_par_iter()
            .map(|ei| self.edge_term(ei, r))
            .try_reduce(TermSum::zero, |a, b| Ok(a.merge(b)))?;

        let face_sum = (0..self.faces.len())
            .into_par_iter()
            .map(|fi| self.face_term(fi, r))
            .try_reduce(TermSum::zero, |a, b| Ok(a.merge(b)))?;

        let g_rho = self.g_rho;
        Ok(PointPotential {
            potential: 0.5 * g_rho * (edge_sum.quad - face_sum.quad),
            gradient: -g_rho * (edge_sum.vec - face_sum.vec),
            gradient_mat: g_rho * (edge_sum.mat - face_sum.mat),
            laplacian: -g_rho * face_sum.scalar,
        })
    }

    fn edge_term(&self, ei: usize, r: &Vector3<f64>) -> Result<TermSum, DegeneratePoint> {
        let [a, b] = self.edge_verts[ei];
        let r_a = self.vertices[a] - r;
        let r_b = self.vertices[b] - r;
        let len = self.edge_lengths[ei];
        let denom = r_a.norm() + r_b.norm() - len;
        if denom <= DEGEN_TOL {
            return Err(DegeneratePoint);
        }
        let w_e = ((r_a.norm() + r_b.norm() + len) / denom).ln();
        let dyad = &self.edge_dyads[ei];
        Ok(TermSum {
            quad: r_a.dot(&(dyad * r_a)) * w_e,
            vec: dyad * r_a * w_e,
            mat: dyad * w_e,
            scalar: 0.0,
        })
    }

    fn face_term(&self, fi: usize, r: &Vector3<f64>) -> Result<TermSum, DegeneratePoint> {
        let f = self.faces[fi];
        let r1 = self.vertices[f[0]] - r;
        let r2 = self.vertices[f[1]] - r;
        let r3 = self.vertices[f[2]] - r;
        let (n1, n2, n3) = (r1.norm(), r2.norm(), r3.norm());
        let num = r1.dot(&r2.cross(&r3));
        let den = n1 * n2 * n3 + n1 * r2.dot(&r3) + n2 * r3.dot(&r1) + n3 * r1.dot(&r2);
        if den.abs() <= DEGEN_TOL && num.abs() <= DEGEN_TOL {
            return Err(DegeneratePoint);
        }
        let omega_f = 2.0 * num.atan2(den);
        let dyad = &self.face_dyads[fi];
        Ok(TermSum {
            quad: r1.dot(&(dyad * r1)) * omega_f,
            vec: dyad * r1 * omega_f,
            mat: dyad * omega_f,
            scalar: omega_f,
        })
    }
}
