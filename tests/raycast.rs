use nalgebra::Vector3;
use rand::SeedableRng;
use rand_distr::{Distribution, UnitSphere};
use rand_pcg::Pcg64Mcg;

use regolith::sensors::{Lidar, RayCaster, RAY_EPS};
use regolith::shape::{icosphere, MeshData};

/// Any ray fired from outside a convex body at its centroid returns exactly
/// one forward hit lying on the surface.
#[test]
fn outside_rays_at_centroid_always_hit() {
    let (v, f) = icosphere(3);
    let mesh = MeshData::new(v.clone(), f.clone()).unwrap();
    let caster = RayCaster::new(v, f);

    let mut rng = Pcg64Mcg::seed_from_u64(7);
    for _ in 0..500 {
        let dir: [f64; 3] = UnitSphere.sample(&mut rng);
        let origin = 3.0 * Vector3::from(dir);
        let hit = caster.cast(&origin, &Vector3::zeros());
        assert!(
            (hit - origin).norm() > RAY_EPS,
            "missed the body from {origin:?}"
        );
        // On the surface: between the inscribed and circumscribed radii.
        let r = hit.norm();
        assert!(
            (0.98..=1.0 + 1e-9).contains(&r),
            "hit at radius {r} is off the surface"
        );
        // The nearest (front) intersection, not the back one.
        assert!((hit - origin).norm() < origin.norm(), "returned the far hit");
        // And on a face plane of the mesh.
        let on_face = mesh.faces().iter().enumerate().any(|(fi, face)| {
            let d = (hit - mesh.vertices()[face[0]]).dot(&mesh.normals()[fi]);
            d.abs() < 1e-9
        });
        assert!(on_face, "hit {hit:?} lies on no face plane");
    }
}

/// The LIDAR grid and caster compose: a 3×3 fan aimed at the body returns
/// nine hits; aimed away, nine sentinels.
#[test]
fn lidar_fan_through_caster() {
    let (v, f) = icosphere(3);
    let caster = RayCaster::new(v, f);
    let lidar = Lidar::default();

    let pos = Vector3::new(2.0, 0.0, 0.0);
    // Body +x toward the body (a half-turn about z).
    let toward = regolith::kinematics::rot3(std::f64::consts::PI);
    let targets = lidar.define_targets(&pos, &toward, pos.norm());
    let hits = caster.cast_array(&pos, &targets);
    assert_eq!(hits.len(), 9);
    for hit in &hits {
        assert!((hit - pos).norm() > RAY_EPS, "beam missed unexpectedly");
        assert!(hit.norm() <= 1.0 + 1e-9);
    }

    // Identity attitude points body +x along inertial +x, away from the
    // body: all sentinels.
    let away = nalgebra::Matrix3::identity();
    let targets = lidar.define_targets(&pos, &away, pos.norm());
    for hit in caster.cast_array(&pos, &targets) {
        assert!((hit - pos).norm() < RAY_EPS, "phantom hit {hit:?}");
    }
}

/// A rotating mesh snapshot changes where the same ray lands.
#[test]
fn rotated_snapshot_moves_the_hit() {
    // A lopsided body: stretch the +x hemisphere.
    let (v, f) = icosphere(3);
    let stretched: Vec<_> = v
        .iter()
        .map(|p| {
            if p.x > 0.0 {
                Vector3::new(1.5 * p.x, p.y, p.z)
            } else {
                *p
            }
        })
        .collect();
    let mut caster = RayCaster::new(stretched.clone(), f.clone());

    let origin = Vector3::new(3.0, 0.0, 0.0);
    let hit_near = caster.cast(&origin, &Vector3::zeros());
    assert!((hit_near.x - 1.5).abs() < 0.05, "stretched nose not hit");

    // Half a turn later the flat side faces the ray.
    let ra = regolith::kinematics::rot3(std::f64::consts::PI);
    let rotated: Vec<_> = stretched.iter().map(|p| ra * p).collect();
    caster.update_mesh(rotated, f);
    let hit_far = caster.cast(&origin, &Vector3::zeros());
    assert!(
        (hit_far.x - 1.0).abs() < 0.05,
        "rotated snapshot still shows the nose: {hit_far:?}"
    );
}
