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

//! Regolith simulates an autonomous dumbbell spacecraft exploring, mapping,
//! refining, and landing on a small irregular body whose shape it does not
//! know ahead of time.
//!
//! The stack, leaves first: attitude kinematics, mesh data, the
//! Werner–Scheeres polyhedron gravity field, the ray caster and LIDAR head,
//! the per-vertex-weight reconstruction engine, the dumbbell equations of
//! motion, the geometric SE(3) guidance loop, the adaptive propagator, and
//! the three phase mission orchestrator on top.

pub mod cosmic;
pub mod dynamics;
pub mod errors;
pub mod gravity;
pub mod guidance;
pub mod io;
pub mod kinematics;
pub mod mission;
pub mod propagators;
pub mod reconstruct;
pub mod sensors;
pub mod shape;

pub use errors::SimError;

/// Commonly used types in one import.
pub mod prelude {
    pub use crate::cosmic::{Asteroid, Dumbbell, State};
    pub use crate::dynamics::{Dynamics, DumbbellDynamics, FrameKind, GravitySource};
    pub use crate::errors::SimError;
    pub use crate::gravity::PolyGravity;
    pub use crate::guidance::{
        AttitudeMode, ControlGains, GuidanceComputer, TranslationMode,
    };
    pub use crate::io::Archive;
    pub use crate::mission::{Mission, MissionConfig, Phase};
    pub use crate::propagators::{PropOpts, Propagator};
    pub use crate::reconstruct::ReconstructMesh;
    pub use crate::sensors::{Lidar, RayCaster};
    pub use crate::shape::MeshData;
}
