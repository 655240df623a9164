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

use thiserror::Error;

/// Errors raised anywhere in the simulation stack.
///
/// The binary maps these onto process exit codes: unknown asteroid is 1,
/// integrator divergence is 2, archive problems are 3.
#[derive(Debug, Error)]
pub enum SimError {
    /// Bad input geometry: non-closed mesh, inconsistent orientation,
    /// degenerate triangles. Fatal for the run.
    #[error("geometry error: {0}")]
    Geometry(String),
    /// The requested shape model is not in the preset table.
    #[error("unknown asteroid `{0}`")]
    UnknownAsteroid(String),
    /// The integrator could not meet tolerance at the minimum step size.
    #[error("integrator diverged at t = {t} s (error {error:.3e} above tolerance at minimum step)")]
    Divergence { t: f64, error: f64 },
    /// A local refinement request would have produced a non-manifold mesh;
    /// the mesh was left unchanged.
    #[error("remesh aborted: {0}")]
    Remesh(String),
    /// The per-run archive is missing, malformed, or could not be written.
    #[error("archive error: {0}")]
    Archive(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("report error: {0}")]
    Csv(#[from] csv::Error),
}

impl SimError {
    /// Process exit code for this error per the CLI contract.
    pub fn exit_code(&self) -> i32 {
        match self {
            SimError::UnknownAsteroid(_) => 1,
            SimError::Divergence { .. } => 2,
            SimError::Archive(_) | SimError::Io(_) | SimError::Serde(_) | SimError::Csv(_) => 3,
            _ => 1,
        }
    }
}
