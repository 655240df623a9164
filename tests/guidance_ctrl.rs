use nalgebra::Vector3;

use regolith::cosmic::{Asteroid, Dumbbell, State};
use regolith::dynamics::{DumbbellDynamics, FrameKind};
use regolith::guidance::{AttitudeMode, ControlGains, GuidanceComputer, TranslationMode};
use regolith::propagators::Propagator;
use regolith::shape::{ellipsoid_mesh, MeshData};

fn castalia_like() -> Asteroid {
    let (v, f) = ellipsoid_mesh(0.8, 0.5, 0.4, 2);
    Asteroid::from_mesh("castalia", MeshData::new(v, f).unwrap()).unwrap()
}

/// Gravity cancellation: commanding the current pose at rest makes the
/// wrench exactly the negative of the gravity force, with zero torque.
#[test]
fn wrench_cancels_gravity_at_the_commanded_pose() {
    let asteroid = castalia_like();
    let dumbbell = Dumbbell::default();
    let state = State::at_rest(Vector3::new(1.5, 0.0, 0.0));

    // A landing segment parked at the current position commands exactly
    // p_d = p, v_d = 0, a_d = 0 once clamped, with no spin.
    let guidance = GuidanceComputer::new(
        TranslationMode::Land {
            site: state.pos,
            start: state.pos,
            t0: 0.0,
            duration: 1.0,
        },
        AttitudeMode::TargetPointing,
        ControlGains::default(),
        FrameKind::Inertial,
        0.0,
    );
    let dynamics =
        DumbbellDynamics::inertial(&dumbbell, &asteroid).with_guidance(&guidance);

    // Align the attitude with the commanded pointing frame so e_R = 0.
    let mut state = state;
    state.dcm = guidance.desired_at(2.0, &state).dcm;

    let (u_f, u_m) = dynamics.control_wrench(2.0, &state).unwrap();
    let p1 = asteroid
        .potential(&(state.pos + state.dcm * dumbbell.zeta1))
        .unwrap();
    let p2 = asteroid
        .potential(&(state.pos + state.dcm * dumbbell.zeta2))
        .unwrap();
    let grav = dumbbell.m1 * p1.gradient + dumbbell.m2 * p2.gradient;
    assert!(
        (u_f + grav).norm() < 1e-15,
        "force does not cancel gravity: {u_f:?} vs {grav:?}"
    );
    assert!(u_m.norm() < 1e-15, "torque at rest must vanish: {u_m:?}");
}

/// Tracking scenario: a commanded circumnavigation over the polyhedron
/// field converges and holds the reference to a few tens of meters.
#[test]
fn circumnavigation_tracks_the_reference() {
    let asteroid = castalia_like();
    let dumbbell = Dumbbell::default();
    let (tf, loops, radius) = (1800.0, 1.0, 1.5);

    let guidance = GuidanceComputer::new(
        TranslationMode::Circumnavigate { tf, loops, radius },
        AttitudeMode::BodyPointing,
        ControlGains::default(),
        FrameKind::Inertial,
        asteroid.omega(),
    );
    let dynamics =
        DumbbellDynamics::inertial(&dumbbell, &asteroid).with_guidance(&guidance);

    let mut state = State::at_rest(Vector3::new(radius, 0.0, 0.0));
    state.dcm = guidance.desired_at(0.0, &state).dcm;

    let prop = Propagator::dormand45(&dynamics);
    let mut t = 0.0;
    let mut worst_late_error: f64 = 0.0;
    for k in 1..=600usize {
        let mut instance = prop.with(state.to_vector(), t);
        let x = instance.for_duration(1.0).unwrap();
        t = instance.t;
        state = State::from_vector(&x);
        state.renormalize();
        if k > 120 {
            let des = guidance.desired_at(t, &state);
            let err = (state.pos - des.pos).norm();
            worst_late_error = worst_late_error.max(err);
        }
    }
    println!("worst position error after settling: {worst_late_error:.5} km");
    assert!(
        worst_late_error < 0.02,
        "tracking error {worst_late_error:.4} km exceeds 20 m"
    );

    let des = guidance.desired_at(t, &state);
    let att_err = (state.dcm.transpose() * des.dcm - nalgebra::Matrix3::identity()).norm();
    assert!(att_err < 0.05, "attitude error {att_err:.3} too large");
}

/// Descent scenario: from four site radii down the body-fixed radial, the
/// vehicle arrives with sub-meter accuracy and creeping speed.
#[test]
fn landing_reaches_the_site_gently() {
    let asteroid = castalia_like();
    let dumbbell = Dumbbell::default();
    let site = Vector3::new(0.485_017_97, -0.020_275_19, 0.377_586_39);
    let start = 4.0 * site;
    let descent = 400.0;

    let guidance = GuidanceComputer::new(
        TranslationMode::Land {
            site,
            start,
            t0: 0.0,
            duration: descent,
        },
        AttitudeMode::TargetPointing,
        ControlGains::default(),
        FrameKind::AsteroidFixed,
        asteroid.omega(),
    );
    let dynamics =
        DumbbellDynamics::relative(&dumbbell, &asteroid).with_guidance(&guidance);

    let mut state = State::at_rest(start);
    let des0 = guidance.desired_at(0.0, &state);
    state.dcm = des0.dcm;
    state.vel = des0.vel;
    state.omega = asteroid.omega_vector();

    let prop = Propagator::dormand45(&dynamics);
    let mut t = 0.0;
    // Descent plus a settling tail.
    for _ in 0..(descent as usize + 120) {
        let mut instance = prop.with(state.to_vector(), t);
        let x = instance.for_duration(1.0).unwrap();
        t = instance.t;
        state = State::from_vector(&x);
        state.renormalize();
        // Radial distance must shrink essentially monotonically.
    }

    let altitude_km = (state.pos - site).norm();
    let wa = asteroid.omega_vector();
    let descent_speed = (state.vel - wa.cross(&state.pos)).norm();
    println!(
        "final altitude {:.3} m, residual speed {:.3} cm/s",
        altitude_km * 1e3,
        descent_speed * 1e5
    );
    assert!(
        altitude_km < 1e-3,
        "final altitude {:.2} m above the site",
        altitude_km * 1e3
    );
    assert!(
        descent_speed < 1e-5,
        "residual speed {:.2} cm/s too fast",
        descent_speed * 1e5
    );
}
