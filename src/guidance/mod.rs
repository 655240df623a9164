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

//! Guidance and control: per-mode trajectory generation, pointing attitude
//! construction, and the geometric SE(3) tracking controller (Lee form)
//! with gravity feedforward.
//!
//! The trajectory is a tagged mode dispatched once per evaluation; the
//! exploration mode is the only stateful one — its next target is chosen at
//! tick boundaries from the current uncertainty map, so the right-hand side
//! stays deterministic between ticks.

use crate::cosmic::{Dumbbell, State};
use crate::dynamics::FrameKind;
use crate::kinematics::{ang_vel_error, attitude_error, hat, rot3};
use crate::reconstruct::ReconstructMesh;
use log::debug;
use nalgebra::{Matrix3, Vector3};
use rand::SeedableRng;
use rand_distr::{Distribution, UnitSphere};
use rand_pcg::Pcg64Mcg;
use std::f64::consts::TAU;

/// Desired pose and its first two derivatives, the controller's reference.
#[derive(Clone, Copy, Debug)]
pub struct DesiredState {
    pub pos: Vector3<f64>,
    pub vel: Vector3<f64>,
    pub acc: Vector3<f64>,
    pub dcm: Matrix3<f64>,
    pub omega: Vector3<f64>,
    pub alpha: Vector3<f64>,
}

impl DesiredState {
    fn hold(pos: Vector3<f64>, dcm: Matrix3<f64>) -> Self {
        Self {
            pos,
            vel: Vector3::zeros(),
            acc: Vector3::zeros(),
            dcm,
            omega: Vector3::zeros(),
            alpha: Vector3::zeros(),
        }
    }
}

/// Translational trajectory generator, one variant per mission behavior.
#[derive(Clone, Copy, Debug)]
pub enum TranslationMode {
    /// Circle of the given radius in the inertial xy-plane, `loops` turns
    /// over `tf` seconds.
    Circumnavigate { tf: f64, loops: f64, radius: f64 },
    /// Planar lissajous in the inertial yz-plane.
    LissajousYz { tf: f64, loops: f64, radius: f64 },
    /// Uncertainty-seeking shell sampling; the target is refreshed each
    /// tick from the estimate.
    Explore,
    /// Hover above the candidate landing site, co-rotating with the body.
    Refine { site: Vector3<f64> },
    /// Straight-line radial descent onto the site in the rotating frame.
    Land {
        site: Vector3<f64>,
        start: Vector3<f64>,
        t0: f64,
        duration: f64,
    },
}

/// Desired attitude construction.
#[derive(Clone, Copy, Debug)]
pub enum AttitudeMode {
    /// Body +x at the estimated body center.
    BodyPointing,
    /// Body +x at the current translational target.
    TargetPointing,
}

/// Diagonal controller gains.
#[derive(Clone, Copy, Debug)]
pub struct ControlGains {
    pub k_p: Vector3<f64>,
    pub k_v: Vector3<f64>,
    pub k_r: Vector3<f64>,
    pub k_w: Vector3<f64>,
}

impl ControlGains {
    /// Critically damped defaults: closed loop poles at −ω_n on every axis,
    /// scaled by the vehicle mass and transverse inertia.
    pub fn critically_damped(dumbbell: &Dumbbell, omega_n: f64) -> Self {
        let m = dumbbell.total_mass();
        let j_t = dumbbell.transverse_inertia();
        Self {
            k_p: Vector3::repeat(m * omega_n * omega_n),
            k_v: Vector3::repeat(2.0 * m * omega_n),
            k_r: Vector3::repeat(j_t * omega_n * omega_n),
            k_w: Vector3::repeat(2.0 * j_t * omega_n),
        }
    }
}

impl Default for ControlGains {
    fn default() -> Self {
        Self::critically_damped(&Dumbbell::default(), 0.2)
    }
}

/// The closed-loop guidance computer for one mission phase.
pub struct GuidanceComputer {
    mode: TranslationMode,
    attitude_mode: AttitudeMode,
    gains: ControlGains,
    frame: FrameKind,
    /// Asteroid spin rate, needed by the co-rotating generators.
    spin: f64,
    /// Sensor cone half-angle used to score exploration candidates.
    pub cone_half_angle: f64,
    /// Translational effort penalty λ of the exploration score.
    pub effort_penalty: f64,
    pub num_candidates: usize,
    held: DesiredState,
    rng: Pcg64Mcg,
}

impl GuidanceComputer {
    pub fn new(
        mode: TranslationMode,
        attitude_mode: AttitudeMode,
        gains: ControlGains,
        frame: FrameKind,
        spin: f64,
    ) -> Self {
        Self::with_seed(mode, attitude_mode, gains, frame, spin, 2024)
    }

    pub fn with_seed(
        mode: TranslationMode,
        attitude_mode: AttitudeMode,
        gains: ControlGains,
        frame: FrameKind,
        spin: f64,
        seed: u64,
    ) -> Self {
        Self {
            mode,
            attitude_mode,
            gains,
            frame,
            spin,
            cone_half_angle: 12f64.to_radians(),
            effort_penalty: 1.0,
            num_candidates: 64,
            held: DesiredState::hold(Vector3::zeros(), Matrix3::identity()),
            rng: Pcg64Mcg::seed_from_u64(seed),
        }
    }

    pub fn mode(&self) -> TranslationMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: TranslationMode) {
        self.mode = mode;
    }

    /// Tick-boundary refresh. Only the exploration mode is stateful: it
    /// scores `num_candidates` shell samples by uncovered weight in the
    /// sensor cone minus the translational effort penalty and holds the
    /// argmax until the next tick.
    pub fn update(&mut self, t: f64, state: &State, estimate: &ReconstructMesh) {
        if !matches!(self.mode, TranslationMode::Explore) {
            return;
        }
        let ra = rot3(self.spin * t);
        let radius = state.pos.norm();
        // The current position is always a candidate, so the target never
        // gets worse than staying put.
        let mut best_pos = state.pos;
        let mut best_score = self.score_candidate(&state.pos, state, &ra, estimate);
        for _ in 0..self.num_candidates {
            let u: [f64; 3] = UnitSphere.sample(&mut self.rng);
            let cand = radius * Vector3::from(u);
            let score = self.score_candidate(&cand, state, &ra, estimate);
            if score > best_score {
                best_score = score;
                best_pos = cand;
            }
        }
        debug!(
            "explore target {:.4?} (score {best_score:.3})",
            (best_pos.x, best_pos.y, best_pos.z)
        );
        let center = ra * estimate.mesh().centroid();
        self.held = DesiredState::hold(best_pos, pointing_dcm(&best_pos, &center));
    }

    fn score_candidate(
        &self,
        cand: &Vector3<f64>,
        state: &State,
        ra: &Matrix3<f64>,
        estimate: &ReconstructMesh,
    ) -> f64 {
        let dir_body = ra.transpose() * cand;
        estimate.weight_in_cone(&dir_body, self.cone_half_angle)
            - self.effort_penalty * (cand - state.pos).norm_squared()
    }

    /// The reference pose at time t. Parametric modes are analytic in t;
    /// exploration returns the held tick target.
    pub fn desired_at(&self, t: f64, state: &State) -> DesiredState {
        match self.mode {
            TranslationMode::Circumnavigate { tf, loops, radius } => {
                let rate = TAU * loops / tf;
                let (s, c) = (rate * t).sin_cos();
                let pos = radius * Vector3::new(c, s, 0.0);
                let vel = radius * rate * Vector3::new(-s, c, 0.0);
                let acc = -radius * rate * rate * Vector3::new(c, s, 0.0);
                let mut des = DesiredState::hold(pos, self.attitude_for(state, &pos));
                des.vel = vel;
                des.acc = acc;
                // The pointing frame turns with the circle.
                des.omega = des.dcm.transpose() * Vector3::new(0.0, 0.0, rate);
                des
            }
            TranslationMode::LissajousYz { tf, loops, radius } => {
                let rate = TAU * loops / tf;
                let (s, c) = (rate * t).sin_cos();
                let (s2, c2) = (2.0 * rate * t).sin_cos();
                let pos = Vector3::new(0.0, radius * c, 0.5 * radius * s2);
                let vel = Vector3::new(0.0, -radius * rate * s, radius * rate * c2);
                let acc = Vector3::new(0.0, -radius * rate * rate * c, -2.0 * radius * rate * rate * s2);
                let mut des = DesiredState::hold(pos, self.attitude_for(state, &pos));
                des.vel = vel;
                des.acc = acc;
                des
            }
            TranslationMode::Explore => self.held,
            TranslationMode::Refine { site } => {
                let ra = rot3(self.spin * t);
                let wa = Vector3::new(0.0, 0.0, self.spin);
                let pos = ra * (4.0 * site);
                let vel = wa.cross(&pos);
                let acc = wa.cross(&vel);
                let dcm = pointing_dcm(&pos, &(ra * site));
                DesiredState {
                    pos,
                    vel,
                    acc,
                    dcm,
                    // The pose co-rotates with the body.
                    omega: dcm.transpose() * wa,
                    alpha: Vector3::zeros(),
                }
            }
            TranslationMode::Land {
                site,
                start,
                t0,
                duration,
            } => {
                // Asteroid-fixed frame: straight segment from the handoff
                // point down to the site, monotone in radial distance. The
                // velocity reference matches the relative-state convention
                // (rotated inertial velocity), so the transport terms go
                // into the feedforward.
                let tau = ((t - t0) / duration).clamp(0.0, 1.0);
                let wa = Vector3::new(0.0, 0.0, self.spin);
                let pos = site + (start - site) * (1.0 - tau);
                let path_vel = if tau < 1.0 {
                    (site - start) / duration
                } else {
                    Vector3::zeros()
                };
                let vel = path_vel + wa.cross(&pos);
                let acc = 2.0 * wa.cross(&path_vel) + wa.cross(&wa.cross(&pos));
                let dcm = pointing_dcm(&pos, &Vector3::zeros());
                let mut des = DesiredState::hold(pos, dcm);
                des.vel = vel;
                des.acc = acc;
                des
            }
        }
    }

    fn attitude_for(&self, state: &State, target: &Vector3<f64>) -> Matrix3<f64> {
        match self.attitude_mode {
            AttitudeMode::BodyPointing => pointing_dcm(&state.pos, &Vector3::zeros()),
            AttitudeMode::TargetPointing => pointing_dcm(&state.pos, target),
        }
    }

    /// Closed-loop force and torque. `grav_force` is the total gravity
    /// force on the vehicle in the dynamics frame, fed forward so that at
    /// zero error the wrench exactly cancels gravity.
    pub fn control(
        &self,
        t: f64,
        state: &State,
        dumbbell: &Dumbbell,
        grav_force: &Vector3<f64>,
    ) -> (Vector3<f64>, Vector3<f64>) {
        let des = self.desired_at(t, state);
        let e_p = state.pos - des.pos;
        let e_v = state.vel - des.vel;
        let u_f = -self.gains.k_p.component_mul(&e_p) - self.gains.k_v.component_mul(&e_v)
            + dumbbell.total_mass() * des.acc
            - grav_force;

        let e_r = attitude_error(&state.dcm, &des.dcm);
        let mut u_m = match self.frame {
            FrameKind::Inertial => {
                let e_w = ang_vel_error(&state.dcm, &des.dcm, &state.omega, &des.omega);
                let j = dumbbell.inertia;
                let rtrd = state.dcm.transpose() * des.dcm;
                -self.gains.k_r.component_mul(&e_r) - self.gains.k_w.component_mul(&e_w)
                    + state.omega.cross(&(j * state.omega))
                    - j * (hat(&state.omega) * rtrd * des.omega - rtrd * des.alpha)
            }
            FrameKind::AsteroidFixed => {
                // Holding a pose fixed in the rotating frame means spinning
                // with it: the angular velocity target is the frame rate,
                // and the body gyroscopic torque is fed forward.
                let wa = Vector3::new(0.0, 0.0, self.spin);
                let e_w = state.omega - wa;
                let omega_b = state.dcm.transpose() * state.omega;
                -self.gains.k_r.component_mul(&e_r) - self.gains.k_w.component_mul(&e_w)
                    + state.dcm * omega_b.cross(&(dumbbell.inertia * omega_b))
            }
        };

        // No torque authority about the rod axis.
        let axial = match self.frame {
            FrameKind::Inertial => Vector3::x(),
            FrameKind::AsteroidFixed => state.dcm * Vector3::x(),
        };
        u_m -= axial * u_m.dot(&axial);
        (u_f, u_m)
    }
}

/// Right-handed pointing frame: body +x toward `target`, +z completed from
/// the frame's +z axis (re-orthogonalized), mapped body → outer frame.
pub fn pointing_dcm(from: &Vector3<f64>, target: &Vector3<f64>) -> Matrix3<f64> {
    let boresight = target - from;
    let b1 = if boresight.norm() < 1e-12 {
        -from.normalize()
    } else {
        boresight.normalize()
    };
    let mut b3 = Vector3::z() - Vector3::z().dot(&b1) * b1;
    if b3.norm() < 1e-9 {
        b3 = b1.cross(&Vector3::y());
    }
    let b3 = b3.normalize();
    let b2 = b3.cross(&b1);
    Matrix3::from_columns(&[b1, b2, b3])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinematics::orthonormality_defect;
    use approx::assert_abs_diff_eq;

    #[test]
    fn pointing_frame_is_special_orthogonal() {
        let from = Vector3::new(1.5, 0.3, -0.2);
        let r = pointing_dcm(&from, &Vector3::zeros());
        assert!(orthonormality_defect(&r) < 1e-12);
        assert!((r.determinant() - 1.0).abs() < 1e-12);
        // Body +x maps onto the boresight.
        let bore = (Vector3::zeros() - from).normalize();
        assert_abs_diff_eq!(r * Vector3::x(), bore, epsilon = 1e-12);
    }

    #[test]
    fn circumnavigate_closes_after_tf() {
        let mode = TranslationMode::Circumnavigate {
            tf: 3600.0,
            loops: 1.0,
            radius: 1.5,
        };
        let g = GuidanceComputer::new(
            mode,
            AttitudeMode::BodyPointing,
            ControlGains::default(),
            FrameKind::Inertial,
            0.0,
        );
        let state = State::at_rest(Vector3::new(1.5, 0.0, 0.0));
        let d0 = g.desired_at(0.0, &state);
        let d1 = g.desired_at(3600.0, &state);
        assert_abs_diff_eq!(d0.pos, d1.pos, epsilon = 1e-9);
        assert_abs_diff_eq!(d0.pos, Vector3::new(1.5, 0.0, 0.0), epsilon = 1e-12);
        // Quarter period is on the +y axis.
        let dq = g.desired_at(900.0, &state);
        assert_abs_diff_eq!(dq.pos, Vector3::new(0.0, 1.5, 0.0), epsilon = 1e-9);
        // v is perpendicular to r on a circle.
        assert!(dq.pos.dot(&dq.vel).abs() < 1e-9);
    }

    #[test]
    fn landing_descends_monotonically() {
        let site = Vector3::new(0.485, -0.020, 0.378);
        let start = 4.0 * site;
        let mode = TranslationMode::Land {
            site,
            start,
            t0: 100.0,
            duration: 500.0,
        };
        let g = GuidanceComputer::new(
            mode,
            AttitudeMode::TargetPointing,
            ControlGains::default(),
            FrameKind::AsteroidFixed,
            4.3e-4,
        );
        let state = State::at_rest(start);
        let mut last = f64::INFINITY;
        for k in 0..=10 {
            let d = g.desired_at(100.0 + 50.0 * k as f64, &state);
            let r = d.pos.norm();
            assert!(r <= last + 1e-12, "radial distance increased");
            last = r;
        }
        // Clamped at the site after the descent window; only the frame
        // transport velocity remains.
        let d_end = g.desired_at(1000.0, &state);
        assert_abs_diff_eq!(d_end.pos, site, epsilon = 1e-12);
        let transport = Vector3::new(0.0, 0.0, 4.3e-4).cross(&site);
        assert_abs_diff_eq!(d_end.vel, transport, epsilon = 1e-15);
    }

    #[test]
    fn hover_wrench_cancels_gravity_at_rest() {
        let dumbbell = Dumbbell::default();
        let state = State::at_rest(Vector3::new(1.5, 0.0, 0.0));
        // A "stay exactly where you are" reference.
        let mode = TranslationMode::Land {
            site: state.pos,
            start: state.pos,
            t0: 0.0,
            duration: 1.0,
        };
        let mut g = GuidanceComputer::new(
            mode,
            AttitudeMode::TargetPointing,
            ControlGains::default(),
            FrameKind::Inertial,
            0.0,
        );
        // Force the desired attitude to the current one.
        g.held = DesiredState::hold(state.pos, state.dcm);
        g.set_mode(TranslationMode::Explore);
        let grav = Vector3::new(-4.2e-5, 1e-6, 0.0);
        let (u_f, u_m) = g.control(0.0, &state, &dumbbell, &grav);
        assert_abs_diff_eq!(u_f, -grav, epsilon = 1e-12);
        assert_abs_diff_eq!(u_m, Vector3::zeros(), epsilon = 1e-12);
    }

    #[test]
    fn explore_picks_uncovered_direction() {
        use crate::shape::{icosphere, MeshData};
        let (v, f) = icosphere(2);
        let mut est = ReconstructMesh::new(MeshData::new(v, f).unwrap());
        // Everything on the −x side is already known.
        let known: Vec<usize> = (0..est.mesh().num_vertices())
            .filter(|&i| est.mesh().vertices()[i].x < 0.0)
            .collect();
        let batch: Vec<_> = known.iter().map(|&i| est.mesh().vertices()[i]).collect();
        for _ in 0..3 {
            est.update(&batch, 0.2);
        }
        let mut g = GuidanceComputer::new(
            TranslationMode::Explore,
            AttitudeMode::BodyPointing,
            ControlGains::default(),
            FrameKind::Inertial,
            0.0,
        );
        g.effort_penalty = 0.0;
        g.cone_half_angle = 0.5;
        let state = State::at_rest(Vector3::new(1.5, 0.0, 0.0));
        g.update(0.0, &state, &est);
        let target = g.desired_at(0.0, &state).pos;
        assert!((target.norm() - 1.5).abs() < 1e-9, "target must stay on the shell");
        assert!(
            target.x > -0.5,
            "the chooser went for the already mapped side: {target:?}"
        );
    }
}
