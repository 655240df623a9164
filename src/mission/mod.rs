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

//! The mission orchestrator: a three phase finite-state machine
//! (explore → refine → land → done) driving the tick pipeline
//!
//! > guidance(estimate) → propagate 1 s → raycast the true surface →
//! > fold the returns into the estimate → persist the tick.
//!
//! The orchestrator is the only owner of the true mesh; guidance only ever
//! sees the reconstruction.

use crate::cosmic::{Asteroid, Dumbbell, State};
use crate::dynamics::{DumbbellDynamics, FrameKind};
use crate::errors::SimError;
use crate::guidance::{AttitudeMode, ControlGains, GuidanceComputer, TranslationMode};
use crate::io::Archive;
use crate::kinematics::rot3;
use crate::propagators::Propagator;
use crate::reconstruct::ReconstructMesh;
use crate::sensors::{Lidar, RayCaster};
use crate::shape::SurfaceOptions;
use log::{info, warn};
use nalgebra::{Matrix3, Vector3};
use serde_derive::{Deserialize, Serialize};

/// Mission phases, advanced on fixed horizons.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Explore,
    Refine,
    Land,
    Done,
}

/// Tunable mission parameters with the reference-run defaults.
#[derive(Clone, Copy, Debug)]
pub struct MissionConfig {
    /// Exploration horizon in 1 s ticks.
    pub explore_steps: usize,
    /// Landing-site refinement horizon.
    pub refine_steps: usize,
    /// Descent horizon.
    pub landing_steps: usize,
    /// Candidate landing site used for refinement, body frame, km.
    pub refine_site: Vector3<f64>,
    /// Touchdown site, body frame, km.
    pub landing_site: Vector3<f64>,
    /// Half-angle of the refinement cone, rad.
    pub refine_cone: f64,
    /// Target edge length inside the refinement cone, km.
    pub refine_edge: f64,
    /// Sensor patch area driving the reconstruction influence angle, km².
    pub surf_area: f64,
    /// Seed mesher knobs (recorded with the run).
    pub surface_opts: SurfaceOptions,
    /// Initial spacecraft position, inertial, km.
    pub initial_pos: Vector3<f64>,
    /// Controller natural frequency, rad/s.
    pub omega_n: f64,
    pub seed: u64,
    /// Absolute and relative integration tolerance.
    pub tolerance: f64,
}

impl Default for MissionConfig {
    fn default() -> Self {
        Self {
            explore_steps: 15_000,
            refine_steps: 3_600,
            landing_steps: 5_000,
            refine_site: Vector3::new(0.471_804_73, -0.019_722_84, 0.367_299_88),
            landing_site: Vector3::new(0.485_017_97, -0.020_275_19, 0.377_586_39),
            refine_cone: 40f64.to_radians(),
            refine_edge: 0.02,
            surf_area: 0.01,
            surface_opts: SurfaceOptions::default(),
            initial_pos: Vector3::new(1.5, 0.0, 0.0),
            omega_n: 0.2,
            seed: 2024,
            tolerance: 1e-9,
        }
    }
}

/// Wrap-up numbers of one phase, logged into the archive and returned to
/// the caller.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct PhaseSummary {
    pub phase: Phase,
    pub ticks: usize,
    pub control_effort: f64,
    pub total_weight: f64,
}

/// The orchestrator. Owns every actor; see the module docs for the data
/// flow.
pub struct Mission {
    archive: Archive,
    asteroid: Asteroid,
    dumbbell: Dumbbell,
    estimate: ReconstructMesh,
    lidar: Lidar,
    caster: RayCaster,
    cfg: MissionConfig,
    gains: ControlGains,
    /// Reconstruction influence half-angle √(surf_area)/a.
    max_angle: f64,
}

impl Mission {
    /// Builds the actors, seeds the estimate ellipsoid, and records the
    /// simulation parameters into a fresh archive.
    pub fn new(
        archive: Archive,
        asteroid: Asteroid,
        dumbbell: Dumbbell,
        cfg: MissionConfig,
    ) -> Result<Self, SimError> {
        let axes = asteroid.axes();
        let max_angle = (cfg.surf_area / (axes[0] * axes[0])).sqrt();
        let seed_mesh = cfg.surface_opts.seed(axes)?;
        let estimate = ReconstructMesh::new(seed_mesh);
        let lidar = Lidar::default();
        let caster = RayCaster::new(
            asteroid.mesh().vertices().to_vec(),
            asteroid.mesh().faces().to_vec(),
        );
        let gains = ControlGains::critically_damped(&dumbbell, cfg.omega_n);

        let mission = Self {
            archive,
            asteroid,
            dumbbell,
            estimate,
            lidar,
            caster,
            cfg,
            gains,
            max_angle,
        };
        mission.write_parameters()?;
        Ok(mission)
    }

    /// Rebuilds a mission from an existing archive: the true body and
    /// vehicle from the recorded parameters, the estimate from the last
    /// persisted reconstruction (refinement tree when present, exploration
    /// otherwise). This is how the refine and land entry points pick up
    /// where the previous phase stopped.
    pub fn resume(archive: Archive, cfg: MissionConfig) -> Result<Self, SimError> {
        let sim = archive.group("simulation_parameters");
        let true_ast = sim.subgroup("true_asteroid");
        let name: String = true_ast.read("name")?;
        let v: Vec<[f64; 3]> = true_ast.read("vertices")?;
        let f: Vec<[usize; 3]> = true_ast.read("faces")?;
        let asteroid = Asteroid::from_mesh(&name, crate::shape::MeshData::new(rows_vec3(&v), f)?)?;

        let db = sim.subgroup("dumbbell");
        let dumbbell = Dumbbell::new(db.read("m1")?, db.read("m2")?, db.read("l")?);
        let max_angle: f64 = sim.subgroup("estimate_asteroid").read("max_angle")?;

        let src = if archive.has_group("refinement/reconstructed_vertex") {
            archive.group("refinement")
        } else {
            archive.group("")
        };
        let verts_group = src.subgroup("reconstructed_vertex");
        let keys = verts_group.keys()?;
        let last = keys
            .last()
            .ok_or_else(|| SimError::Archive("no persisted reconstruction to resume".into()))?;
        let ev: Vec<[f64; 3]> = verts_group.read(last)?;
        let ef: Vec<[usize; 3]> = src.subgroup("reconstructed_face").read(last)?;
        let ew: Vec<f64> = src.subgroup("reconstructed_weight").read(last)?;
        let estimate = ReconstructMesh::with_weights(
            crate::shape::MeshData::new(rows_vec3(&ev), ef)?,
            ew,
        )?;
        info!(
            "resumed {name}: estimate at {} vertices, terminal uncertainty {:.2}",
            estimate.mesh().num_vertices(),
            estimate.total_weight()
        );

        let caster = RayCaster::new(
            asteroid.mesh().vertices().to_vec(),
            asteroid.mesh().faces().to_vec(),
        );
        let gains = ControlGains::critically_damped(&dumbbell, cfg.omega_n);
        Ok(Self {
            archive,
            asteroid,
            dumbbell,
            estimate,
            lidar: Lidar::default(),
            caster,
            cfg,
            gains,
            max_angle,
        })
    }

    fn write_parameters(&self) -> Result<(), SimError> {
        let sim = self.archive.group("simulation_parameters");
        sim.write("AbsTol", &self.cfg.tolerance)?;
        sim.write("RelTol", &self.cfg.tolerance)?;

        let dumbbell = sim.subgroup("dumbbell");
        dumbbell.write("m1", &self.dumbbell.m1)?;
        dumbbell.write("m2", &self.dumbbell.m2)?;
        dumbbell.write("l", &self.dumbbell.l)?;

        let true_ast = sim.subgroup("true_asteroid");
        true_ast.write("vertices", &vec3_rows(self.asteroid.mesh().vertices()))?;
        true_ast.write("faces", &self.asteroid.mesh().faces().to_vec())?;
        true_ast.write("name", &self.asteroid.name())?;

        let est = sim.subgroup("estimate_asteroid");
        est.write("surf_area", &self.cfg.surf_area)?;
        est.write("max_angle", &self.max_angle)?;
        est.write("min_angle", &self.cfg.surface_opts.min_angle)?;
        est.write("max_distance", &self.cfg.surface_opts.max_distance)?;
        est.write("max_radius", &self.cfg.surface_opts.max_radius)?;
        est.write("initial_vertices", &vec3_rows(self.estimate.vertices()))?;
        est.write("initial_faces", &self.estimate.faces().to_vec())?;
        est.write("initial_weight", &self.estimate.weights().to_vec())?;

        let lidar = sim.subgroup("lidar");
        lidar.write("view_axis", &vec3_row(&self.lidar.view_axis()))?;
        lidar.write("up_axis", &vec3_row(&self.lidar.up_axis()))?;
        lidar.write("fov", &self.lidar.fov())?;
        Ok(())
    }

    pub fn estimate(&self) -> &ReconstructMesh {
        &self.estimate
    }

    pub fn archive(&self) -> &Archive {
        &self.archive
    }

    /// Initial condition of the reference run: at rest at the configured
    /// standoff, body frame yawed a quarter turn.
    pub fn initial_state(&self) -> State {
        let mut s = State::at_rest(self.cfg.initial_pos);
        s.dcm = rot3(std::f64::consts::FRAC_PI_2);
        s
    }

    /// Runs the full FSM to completion.
    pub fn run(&mut self) -> Result<Vec<PhaseSummary>, SimError> {
        let mut summaries = Vec::new();
        let mut phase = Phase::Explore;
        while phase != Phase::Done {
            let (summary, next) = match phase {
                Phase::Explore => (self.explore()?, Phase::Refine),
                Phase::Refine => (self.refine()?, Phase::Land),
                Phase::Land => (self.land()?, Phase::Done),
                Phase::Done => unreachable!(),
            };
            summaries.push(summary);
            phase = next;
        }
        Ok(summaries)
    }

    /// Phase 1: uncertainty-seeking mapping of the whole body.
    pub fn explore(&mut self) -> Result<PhaseSummary, SimError> {
        let steps = self.cfg.explore_steps;
        let time: Vec<i64> = (0..=steps as i64).collect();
        self.archive.write("time", &time)?;
        let state0 = self.initial_state();
        self.archive
            .write("initial_state", &state0.to_vector().as_slice().to_vec())?;

        let mut guidance = GuidanceComputer::with_seed(
            TranslationMode::Explore,
            AttitudeMode::BodyPointing,
            self.gains,
            FrameKind::Inertial,
            self.asteroid.omega(),
            self.cfg.seed,
        );
        guidance.cone_half_angle = self.lidar.fov()[0].max(self.max_angle);

        let mut state = state0;
        let mut effort = 0.0;
        for k in 1..=steps {
            let t = (k - 1) as f64;
            guidance.update(t, &state, &self.estimate);

            let dynamics =
                DumbbellDynamics::inertial(&self.dumbbell, &self.asteroid).with_guidance(&guidance);
            let (u_f, u_m) = dynamics.control_wrench(t, &state)?;
            effort += u_f.norm() + u_m.norm();

            let next = propagate_tick(&dynamics, &state, t, self.cfg.tolerance);
            state = match next {
                Ok(s) => s,
                Err(e) => {
                    warn!("explore phase ended early at tick {k}: {e}");
                    return Err(e);
                }
            };

            let t_meas = k as f64;
            let (targets, hits, body_hits, ra) = measure(
                &self.asteroid,
                &mut self.caster,
                &self.lidar,
                t_meas,
                &state,
            );
            self.estimate.update(&to_points(&body_hits), self.max_angle);

            self.persist_tick("", k, &state, &ra, &targets, &hits, &body_hits)?;
            info!(
                "explore {k}/{steps} t = {t_meas} s pos = [{:.4}, {:.4}, {:.4}] km uncertainty = {:.2}",
                state.pos.x,
                state.pos.y,
                state.pos.z,
                self.estimate.total_weight()
            );
        }
        let summary = PhaseSummary {
            phase: Phase::Explore,
            ticks: steps,
            control_effort: effort,
            total_weight: self.estimate.total_weight(),
        };
        info!(
            "exploration complete: {} ticks, effort {:.4e}, terminal uncertainty {:.2}",
            summary.ticks, summary.control_effort, summary.total_weight
        );
        self.archive.group("summary").write("explore", &summary)?;
        Ok(summary)
    }

    /// Phase 2: remesh the landing cone and hover above the site while the
    /// narrowed sensor fills in the fine terrain.
    pub fn refine(&mut self) -> Result<PhaseSummary, SimError> {
        let (t0, mut state) = self.terminal_state("")?;
        info!(
            "refinement starts from t = {t0} s with {} estimate vertices",
            self.estimate.mesh().num_vertices()
        );
        if let Err(e) = self.estimate.remesh_faces_in_view(
            &self.cfg.refine_site,
            self.cfg.refine_cone,
            self.cfg.refine_edge,
        ) {
            // A refused refinement is not fatal; the phase continues on
            // the coarse patch.
            warn!("{e}");
        }
        self.lidar = self
            .lidar
            .clone()
            .with_fov([2f64.to_radians(), 2f64.to_radians()]);

        let steps = self.cfg.refine_steps;
        let refinement = self.archive.group("refinement");
        let time: Vec<i64> = (t0 as i64..=(t0 as i64 + steps as i64)).collect();
        refinement.write("time", &time)?;
        refinement.write("initial_state", &state.to_vector().as_slice().to_vec())?;

        let guidance = GuidanceComputer::with_seed(
            TranslationMode::Refine {
                site: self.cfg.refine_site,
            },
            AttitudeMode::TargetPointing,
            self.gains,
            FrameKind::Inertial,
            self.asteroid.omega(),
            self.cfg.seed,
        );

        let mut effort = 0.0;
        for k in 1..=steps {
            let t = t0 + (k - 1) as f64;
            let dynamics =
                DumbbellDynamics::inertial(&self.dumbbell, &self.asteroid).with_guidance(&guidance);
            let (u_f, u_m) = dynamics.control_wrench(t, &state)?;
            effort += u_f.norm() + u_m.norm();
            state = propagate_tick(&dynamics, &state, t, self.cfg.tolerance)?;

            let t_meas = t0 + k as f64;
            let (targets, hits, body_hits, ra) = measure(
                &self.asteroid,
                &mut self.caster,
                &self.lidar,
                t_meas,
                &state,
            );
            self.estimate.update(&to_points(&body_hits), self.max_angle);
            self.persist_tick("refinement", k, &state, &ra, &targets, &hits, &body_hits)?;
            info!(
                "refine {k}/{steps} t = {t_meas} s uncertainty in cone = {:.3}",
                self.estimate
                    .weight_in_cone(&self.cfg.refine_site, self.cfg.refine_cone)
            );
        }
        let summary = PhaseSummary {
            phase: Phase::Refine,
            ticks: steps,
            control_effort: effort,
            total_weight: self.estimate.total_weight(),
        };
        info!(
            "refinement complete: {} ticks, effort {:.4e}, terminal uncertainty {:.2}",
            summary.ticks, summary.control_effort, summary.total_weight
        );
        self.archive.group("summary").write("refinement", &summary)?;
        Ok(summary)
    }

    /// Phase 3: radial descent in the rotating frame onto the site. No
    /// measurements are taken on the way down.
    pub fn land(&mut self) -> Result<PhaseSummary, SimError> {
        let (t0, handoff) = self.terminal_state("refinement")?;
        let steps = self.cfg.landing_steps;

        // Hand the inertial state over to the asteroid-fixed frame. The
        // relative form carries the rotated inertial velocity, not the
        // rotating-frame path derivative.
        let ra = self.asteroid.rot_ast2int(t0);
        let state = State::new(
            ra.transpose() * handoff.pos,
            ra.transpose() * handoff.vel,
            ra.transpose() * handoff.dcm,
            ra.transpose() * (handoff.dcm * handoff.omega),
        );

        let landing = self.archive.group("landing");
        let time: Vec<i64> = (t0 as i64..=(t0 as i64 + steps as i64)).collect();
        landing.write("time", &time)?;
        landing.write("initial_state", &state.to_vector().as_slice().to_vec())?;
        landing.write("vertices", &vec3_rows(self.estimate.vertices()))?;
        landing.write("faces", &self.estimate.faces().to_vec())?;
        landing.write("weight", &self.estimate.weights().to_vec())?;

        let guidance = GuidanceComputer::with_seed(
            TranslationMode::Land {
                site: self.cfg.landing_site,
                start: state.pos,
                t0,
                duration: steps as f64,
            },
            AttitudeMode::TargetPointing,
            self.gains,
            FrameKind::AsteroidFixed,
            self.asteroid.omega(),
            self.cfg.seed,
        );

        let mut state = state;
        let mut effort = 0.0;
        for k in 1..=steps {
            let t = t0 + (k - 1) as f64;
            let dynamics =
                DumbbellDynamics::relative(&self.dumbbell, &self.asteroid).with_guidance(&guidance);
            let (u_f, u_m) = dynamics.control_wrench(t, &state)?;
            effort += u_f.norm() + u_m.norm();
            state = propagate_tick(&dynamics, &state, t, self.cfg.tolerance)?;

            let t_now = t0 + k as f64;
            let group = self.archive.group("landing");
            group
                .subgroup("state")
                .write(&k.to_string(), &state.to_vector().as_slice().to_vec())?;
            group.subgroup("Ra").write(
                &k.to_string(),
                &mat3_rows(&self.asteroid.rot_ast2int(t_now)),
            )?;
            let altitude = (state.pos - self.cfg.landing_site).norm();
            info!("land {k}/{steps} t = {t_now} s altitude above site = {:.5} km", altitude);
        }

        let altitude = (state.pos - self.cfg.landing_site).norm();
        let summary = PhaseSummary {
            phase: Phase::Land,
            ticks: steps,
            control_effort: effort,
            total_weight: self.estimate.total_weight(),
        };
        info!(
            "landing complete: final altitude {:.2} m, descent speed {:.2} cm/s, effort {:.4e}",
            altitude * 1e3,
            state.vel.norm() * 1e5,
            summary.control_effort
        );
        self.archive.group("summary").write("landing", &summary)?;
        Ok(summary)
    }

    /// Reads the terminal (time, state) of a phase back from the archive.
    fn terminal_state(&self, prefix: &str) -> Result<(f64, State), SimError> {
        let group = if prefix.is_empty() {
            self.archive.group("")
        } else {
            self.archive.group(prefix)
        };
        let time: Vec<i64> = group.read("time")?;
        let t_end = *time.last().ok_or_else(|| {
            SimError::Archive("archive has an empty time vector".into())
        })? as f64;
        let states = group.subgroup("state");
        let keys = states.keys()?;
        let last = keys
            .last()
            .ok_or_else(|| SimError::Archive(format!("no states under `{prefix}`")))?;
        let raw: Vec<f64> = states.read(last)?;
        if raw.len() != 18 {
            return Err(SimError::Archive(format!(
                "state `{last}` has {} entries, expected 18",
                raw.len()
            )));
        }
        let x = crate::cosmic::StateVector::from_iterator(raw);
        Ok((t_end, State::from_vector(&x)))
    }

    #[allow(clippy::too_many_arguments)]
    fn persist_tick(
        &self,
        prefix: &str,
        k: usize,
        state: &State,
        ra: &Matrix3<f64>,
        targets: &[Vector3<f64>],
        hits: &[Vector3<f64>],
        body_hits: &[Option<[f64; 3]>],
    ) -> Result<(), SimError> {
        let root = if prefix.is_empty() {
            self.archive.group("")
        } else {
            self.archive.group(prefix)
        };
        let key = k.to_string();
        root.subgroup("state")
            .write(&key, &state.to_vector().as_slice().to_vec())?;
        root.subgroup("Ra").write(&key, &mat3_rows(ra))?;
        root.subgroup("targets").write(&key, &vec3_rows(targets))?;
        root.subgroup("inertial_intersections")
            .write(&key, &vec3_rows(hits))?;
        root.subgroup("asteroid_intersections")
            .write(&key, &body_hits.to_vec())?;
        root.subgroup("reconstructed_vertex")
            .write(&key, &vec3_rows(self.estimate.vertices()))?;
        root.subgroup("reconstructed_face")
            .write(&key, &self.estimate.faces().to_vec())?;
        root.subgroup("reconstructed_weight")
            .write(&key, &self.estimate.weights().to_vec())?;
        Ok(())
    }
}

/// One integrator hop between ticks.
fn propagate_tick(
    dynamics: &DumbbellDynamics<'_>,
    state: &State,
    t: f64,
    tolerance: f64,
) -> Result<State, SimError> {
    use crate::propagators::{PropOpts, RSSStepPV};
    let opts = PropOpts::<RSSStepPV>::with_adaptive_step(0.01, 30.0, tolerance);
    let prop = Propagator::new::<crate::propagators::Dormand45>(dynamics, opts);
    let mut instance = prop.with(state.to_vector(), t);
    let x = instance.for_duration(1.0)?;
    let mut next = State::from_vector(&x);
    next.renormalize();
    Ok(next)
}

/// Raycast pipeline of one tick: rotate the true surface into the world,
/// refresh the caster, cast the grid, and map the returns into the body
/// frame (None marks a miss).
fn measure(
    asteroid: &Asteroid,
    caster: &mut RayCaster,
    lidar: &Lidar,
    t: f64,
    state: &State,
) -> (
    Vec<Vector3<f64>>,
    Vec<Vector3<f64>>,
    Vec<Option<[f64; 3]>>,
    Matrix3<f64>,
) {
    let ra = asteroid.rot_ast2int(t);
    let targets = lidar.define_targets(&state.pos, &state.dcm, state.pos.norm());
    caster.update_mesh(asteroid.rotate_vertices(t), asteroid.mesh().faces().to_vec());
    let hits = caster.cast_array(&state.pos, &targets);
    let body_hits: Vec<Option<[f64; 3]>> = hits
        .iter()
        .map(|hit| {
            if (hit - state.pos).norm() < crate::sensors::RAY_EPS {
                None
            } else {
                let b = ra.transpose() * hit;
                Some([b.x, b.y, b.z])
            }
        })
        .collect();
    (targets, hits, body_hits, ra)
}

/// Miss-aware conversion of archived intersection rows into the NaN
/// sentinel convention of the reconstruction engine.
fn to_points(body_hits: &[Option<[f64; 3]>]) -> Vec<Vector3<f64>> {
    body_hits
        .iter()
        .map(|row| match row {
            Some([x, y, z]) => Vector3::new(*x, *y, *z),
            None => Vector3::repeat(f64::NAN),
        })
        .collect()
}

fn rows_vec3(rows: &[[f64; 3]]) -> Vec<Vector3<f64>> {
    rows.iter().map(|r| Vector3::new(r[0], r[1], r[2])).collect()
}

fn vec3_row(v: &Vector3<f64>) -> [f64; 3] {
    [v.x, v.y, v.z]
}

fn vec3_rows(vs: &[Vector3<f64>]) -> Vec<[f64; 3]> {
    vs.iter().map(vec3_row).collect()
}

fn mat3_rows(m: &Matrix3<f64>) -> [[f64; 3]; 3] {
    let mut out = [[0.0; 3]; 3];
    for i in 0..3 {
        for j in 0..3 {
            out[i][j] = m[(i, j)];
        }
    }
    out
}
