use regolith::cosmic::{Asteroid, Dumbbell};
use regolith::io::Archive;
use regolith::mission::{Mission, MissionConfig, Phase};
use regolith::shape::{ellipsoid_mesh, MeshData, SurfaceOptions};

fn short_mission_config() -> MissionConfig {
    MissionConfig {
        explore_steps: 4,
        refine_steps: 3,
        landing_steps: 4,
        refine_edge: 0.1,
        surface_opts: SurfaceOptions {
            max_radius: 0.25,
            ..Default::default()
        },
        ..Default::default()
    }
}

fn castalia_like() -> Asteroid {
    let (v, f) = ellipsoid_mesh(0.8, 0.5, 0.4, 2);
    Asteroid::from_mesh("castalia", MeshData::new(v, f).unwrap()).unwrap()
}

/// The whole FSM on a short horizon: explore → refine → land, with every
/// archive group the collaborators expect.
#[test]
fn full_mission_populates_the_archive() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("exploration_sim");
    let archive = Archive::create(&path).unwrap();

    let cfg = short_mission_config();
    let mut mission =
        Mission::new(archive, castalia_like(), Dumbbell::default(), cfg).unwrap();
    let initial_weight = mission.estimate().total_weight();

    let summaries = mission.run().unwrap();
    assert_eq!(summaries.len(), 3);
    assert_eq!(summaries[0].phase, Phase::Explore);
    assert_eq!(summaries[0].ticks, 4);
    assert_eq!(summaries[1].phase, Phase::Refine);
    assert_eq!(summaries[2].phase, Phase::Land);
    assert!(
        summaries[2].total_weight <= initial_weight,
        "uncertainty grew over the mission"
    );

    let archive = Archive::open(&path).unwrap();
    // Run parameters.
    for key in ["AbsTol", "RelTol"] {
        let v: f64 = archive.group("simulation_parameters").read(key).unwrap();
        assert_eq!(v, 1e-9);
    }
    let name: String = archive
        .group("simulation_parameters/true_asteroid")
        .read("name")
        .unwrap();
    assert_eq!(name, "castalia");

    // Exploration tree.
    let time: Vec<i64> = archive.read("time").unwrap();
    assert_eq!(time.len(), 5);
    let initial: Vec<f64> = archive.read("initial_state").unwrap();
    assert_eq!(initial.len(), 18);
    for group in [
        "state",
        "Ra",
        "targets",
        "inertial_intersections",
        "asteroid_intersections",
        "reconstructed_vertex",
        "reconstructed_face",
        "reconstructed_weight",
    ] {
        let keys = archive.group(group).keys().unwrap();
        assert_eq!(
            keys,
            vec!["1", "2", "3", "4"],
            "group {group} incomplete"
        );
    }
    let targets: Vec<[f64; 3]> = archive.group("targets").read("1").unwrap();
    assert_eq!(targets.len(), 9, "3x3 ray grid expected");

    // Refinement and landing trees.
    assert_eq!(
        archive.group("refinement/state").keys().unwrap().len(),
        3
    );
    assert_eq!(archive.group("landing/state").keys().unwrap().len(), 4);
    let landing_state: Vec<f64> = archive.group("landing/state").read("4").unwrap();
    assert_eq!(landing_state.len(), 18);

    // Phase summaries are archived alongside the tick data.
    let landing_summary: regolith::mission::PhaseSummary =
        archive.group("summary").read("landing").unwrap();
    assert_eq!(landing_summary.phase, Phase::Land);
    assert_eq!(landing_summary.ticks, 4);

    // Every persisted DCM block stays on SO(3).
    for key in archive.group("state").keys().unwrap() {
        let x: Vec<f64> = archive.group("state").read(&key).unwrap();
        let r = nalgebra::Matrix3::new(
            x[6], x[7], x[8], x[9], x[10], x[11], x[12], x[13], x[14],
        );
        assert!(
            regolith::kinematics::orthonormality_defect(&r) < 1e-6,
            "tick {key} attitude off SO(3)"
        );
        assert!((r.determinant() - 1.0).abs() < 1e-6);
    }
}

/// The refine and land entry points resume from what the archive holds,
/// exactly like the separate CLI invocations of a real campaign.
#[test]
fn phases_resume_across_process_boundaries() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("resumable_sim");
    let cfg = short_mission_config();

    // Process one: exploration only.
    {
        let archive = Archive::create(&path).unwrap();
        let mut mission =
            Mission::new(archive, castalia_like(), Dumbbell::default(), cfg).unwrap();
        mission.explore().unwrap();
    }

    // Process two: refinement resumed from disk.
    {
        let archive = Archive::open(&path).unwrap();
        let mut mission = Mission::resume(archive, cfg).unwrap();
        mission.refine().unwrap();
    }

    // Process three: landing resumed from the refinement tree.
    {
        let archive = Archive::open(&path).unwrap();
        let mut mission = Mission::resume(archive, cfg).unwrap();
        mission.land().unwrap();
    }

    let archive = Archive::open(&path).unwrap();
    assert!(archive.has_group("refinement/state"));
    assert!(archive.has_group("landing/state"));

    // The landing initial state is the refinement terminal state mapped
    // into the asteroid frame: radial distances agree.
    let refine_terminal: Vec<f64> = archive
        .group("refinement/state")
        .read("3")
        .unwrap();
    let landing_initial: Vec<f64> = archive.group("landing").read("initial_state").unwrap();
    let r_ref = (refine_terminal[0].powi(2) + refine_terminal[1].powi(2)
        + refine_terminal[2].powi(2))
    .sqrt();
    let r_land = (landing_initial[0].powi(2) + landing_initial[1].powi(2)
        + landing_initial[2].powi(2))
    .sqrt();
    assert!((r_ref - r_land).abs() < 1e-9, "handoff changed the radius");
}

/// An archive that refuses to resume: no reconstruction was ever written.
#[test]
fn resume_requires_reconstruction_data() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty_sim");
    {
        let archive = Archive::create(&path).unwrap();
        // Parameters only, no ticks.
        Mission::new(archive, castalia_like(), Dumbbell::default(), short_mission_config())
            .unwrap();
    }
    let archive = Archive::open(&path).unwrap();
    assert!(Mission::resume(archive, short_mission_config()).is_err());
}
