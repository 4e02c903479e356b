use flagsim_core::tests::test_helpers::{approx_eq_f32, approx_eq_vec3, small_flag};
use flagsim_core::{
    Axis, CapsuleDescriptor, Features, FlagMesh, MeshHost, SimError, SimParams, Simulation,
    SphereDescriptor, SpringKind,
};
use glam::{Affine3A, Vec3};

const DT: f32 = 1.0 / 60.0;

fn mean_y(sim: &Simulation) -> f32 {
    sim.particles().iter().map(|p| p.position.y).sum::<f32>() / sim.particles().len() as f32
}

#[test]
fn test_initialize_builds_particles_and_springs() {
    let sim = Simulation::initialize(&small_flag(), SimParams::calm()).unwrap();

    assert_eq!(sim.particles().len(), 9);
    assert_eq!(sim.network().count(SpringKind::Structural), 16);
    assert!(sim.network().count(SpringKind::Bending) > 0);
    assert_eq!(sim.pinned_indices(), (0, 2));
    assert!(sim.particles()[0].pinned && sim.particles()[2].pinned);
}

#[test]
fn test_initialize_places_particles_in_world_space() {
    let mesh = small_flag().with_transform(Affine3A::from_translation(Vec3::new(0.0, 5.0, 0.0)));
    let sim = Simulation::initialize(&mesh, SimParams::calm()).unwrap();

    assert!(approx_eq_vec3(sim.particles()[4].position, Vec3::new(1.0, 4.0, 0.0), 1e-6));
}

#[test]
fn test_initialize_rejects_bad_meshes() {
    let empty = FlagMesh::new(Vec::new(), Vec::new());
    assert!(matches!(
        Simulation::initialize(&empty, SimParams::default()),
        Err(SimError::MissingMesh)
    ));

    let no_triangles = FlagMesh::new(vec![Vec3::ZERO, Vec3::X, Vec3::Y], Vec::new());
    assert!(matches!(
        Simulation::initialize(&no_triangles, SimParams::default()),
        Err(SimError::MissingTriangles)
    ));

    let out_of_range = FlagMesh::new(vec![Vec3::ZERO, Vec3::X, Vec3::Y], vec![0, 1, 5]);
    assert!(matches!(
        Simulation::initialize(&out_of_range, SimParams::default()),
        Err(SimError::InvalidMesh(_))
    ));

    let flattened = small_flag().with_transform(Affine3A::from_scale(Vec3::new(1.0, 0.0, 1.0)));
    assert!(matches!(
        Simulation::initialize(&flattened, SimParams::default()),
        Err(SimError::InvalidMesh(_))
    ));
}

#[test]
fn test_initialize_rejects_bad_params() {
    let params = SimParams {
        stiffness: 2.0,
        ..SimParams::default()
    };
    assert!(matches!(
        Simulation::initialize(&small_flag(), params),
        Err(SimError::InvalidConfig(_))
    ));
}

#[test]
fn test_flag_sags_under_gravity_and_stays_bounded() {
    let mut sim = Simulation::initialize(&small_flag(), SimParams::calm()).unwrap();
    let pinned_before: Vec<Vec3> = [0, 2].iter().map(|&i| sim.particles()[i].position).collect();
    let mean_before = mean_y(&sim);

    for _ in 0..200 {
        sim.step(DT);
    }

    assert_eq!(sim.frame(), 200);
    assert!(mean_y(&sim) < mean_before, "flag should sag");
    assert!(sim.particles()[1].position.y < 0.0, "top edge should sag between the pins");
    assert_eq!(sim.particles()[0].position, pinned_before[0]);
    assert_eq!(sim.particles()[2].position, pinned_before[1]);

    for p in sim.particles() {
        assert!(p.position.is_finite());
        assert!(p.position.y > -6.0, "particle {} fell to {}", p.id, p.position.y);
    }
}

#[test]
fn test_zero_gravity_rest_state_is_stable() {
    let params = SimParams {
        gravity: 0.0,
        ..SimParams::calm()
    };
    let mut sim = Simulation::initialize(&small_flag(), params).unwrap();
    let before: Vec<Vec3> = sim.particles().iter().map(|p| p.position).collect();

    for _ in 0..30 {
        sim.step(DT);
    }

    for (p, start) in sim.particles().iter().zip(&before) {
        assert!(approx_eq_vec3(p.position, *start, 1e-5));
    }
}

#[test]
fn test_bad_time_step_is_skipped() {
    let mut sim = Simulation::initialize(&small_flag(), SimParams::calm()).unwrap();
    let before: Vec<Vec3> = sim.particles().iter().map(|p| p.position).collect();

    let report = sim.step(0.0);
    sim.step(f32::NAN);
    sim.step(-1.0);

    assert_eq!(report.collider_contacts.resolved, 0);
    assert_eq!(sim.frame(), 0);
    for (p, start) in sim.particles().iter().zip(&before) {
        assert_eq!(p.position, *start);
    }
}

#[test]
fn test_wind_pushes_flag_downwind() {
    let mut params = SimParams::default();
    params.features.aerodynamics = false;
    params.wind_direction = Vec3::Z;
    let mut sim = Simulation::initialize(&small_flag(), params).unwrap();

    for _ in 0..60 {
        sim.step(DT);
    }

    let mean_z =
        sim.particles().iter().map(|p| p.position.z).sum::<f32>() / sim.particles().len() as f32;
    assert!(mean_z > 0.0, "mean z was {}", mean_z);
}

#[test]
fn test_wind_burst_runs_out() {
    let mut sim = Simulation::initialize(&small_flag(), SimParams::calm()).unwrap();
    sim.trigger_wind_burst(0.1);
    assert!(sim.wind_burst().is_active());

    for _ in 0..10 {
        sim.step(DT);
    }
    assert!(!sim.wind_burst().is_active());
}

#[test]
fn test_sphere_keeps_cloth_outside() {
    let mesh = FlagMesh::grid(7, 7, 2.0, 2.0)
        .with_transform(Affine3A::from_translation(Vec3::new(-1.0, 0.0, 0.0)));
    let mut sim = Simulation::initialize(&mesh, SimParams::calm()).unwrap();

    let center = Vec3::new(0.0, -1.2, 0.2);
    let radius = 0.5;
    sim.set_colliders(
        &[SphereDescriptor {
            center,
            radius,
            transform: Affine3A::IDENTITY,
        }],
        &[],
    );
    assert_eq!(sim.colliders().len(), 1);

    let mut contacts = 0;
    for _ in 0..120 {
        contacts += sim.step(DT).collider_contacts.resolved;
    }

    assert!(contacts > 0, "cloth should hit the sphere");
    for p in sim.particles() {
        assert!(
            p.position.distance(center) > radius * 0.8,
            "particle {} is inside the sphere",
            p.id
        );
    }
}

#[test]
fn test_disabled_colliders_are_ignored() {
    let mut params = SimParams::calm();
    params.features.sphere_collisions = false;
    let mut sim = Simulation::initialize(&small_flag(), params).unwrap();
    sim.set_colliders(
        &[SphereDescriptor {
            center: Vec3::new(1.0, -1.0, 0.0),
            radius: 0.5,
            transform: Affine3A::IDENTITY,
        }],
        &[],
    );

    let report = sim.step(DT);
    assert_eq!(report.collider_contacts.resolved, 0);
}

#[test]
fn test_invalid_collider_descriptors_are_skipped() {
    let mut sim = Simulation::initialize(&small_flag(), SimParams::calm()).unwrap();
    sim.set_colliders(
        &[SphereDescriptor {
            center: Vec3::ZERO,
            radius: f32::INFINITY,
            transform: Affine3A::IDENTITY,
        }],
        &[
            CapsuleDescriptor {
                center: Vec3::ZERO,
                height: 1.0,
                radius: 0.2,
                axis: Axis::Z,
                transform: Affine3A::IDENTITY,
            },
            CapsuleDescriptor {
                center: Vec3::ZERO,
                height: 1.0,
                radius: -0.2,
                axis: Axis::Z,
                transform: Affine3A::IDENTITY,
            },
        ],
    );

    assert_eq!(sim.colliders().len(), 1);
}

#[test]
fn test_minimal_features_run_springs_and_gravity_only() {
    let params = SimParams {
        features: Features::minimal(),
        ..SimParams::default()
    };
    let mut sim = Simulation::initialize(&small_flag(), params).unwrap();
    for _ in 0..30 {
        let report = sim.step(DT);
        assert_eq!(report.self_contacts.resolved, 0);
    }
    for p in sim.particles() {
        assert!(approx_eq_f32(p.position.z, 0.0, 1e-6));
    }
}

#[test]
fn test_set_params_retunes_springs() {
    let mut sim = Simulation::initialize(&small_flag(), SimParams::calm()).unwrap();
    let params = SimParams {
        stiffness: 0.8,
        folding_factor: 0.5,
        ..SimParams::calm()
    };
    sim.set_params(params).unwrap();

    for spring in sim.network().springs() {
        let expected = match spring.kind {
            SpringKind::Structural => 0.8,
            SpringKind::Bending => 0.4,
        };
        assert!(approx_eq_f32(spring.stiffness, expected, 1e-6));
    }

    let bad = SimParams {
        damping: 1.5,
        ..SimParams::calm()
    };
    assert!(sim.set_params(bad).is_err());
    assert!(approx_eq_f32(sim.params().stiffness, 0.8, 1e-6));
}

#[test]
fn test_set_wind_clamps_strength() {
    let mut sim = Simulation::initialize(&small_flag(), SimParams::default()).unwrap();
    sim.set_wind(100.0, Vec3::X);
    assert_eq!(sim.params().wind_strength, 20.0);
    assert_eq!(sim.params().wind_vector(), Vec3::new(20.0, 0.0, 0.0));
}

#[test]
fn test_export_writes_local_positions_back() {
    let offset = Vec3::new(0.0, 5.0, 0.0);
    let mut mesh = small_flag().with_transform(Affine3A::from_translation(offset));
    let original = mesh.vertices.clone();
    let mut sim = Simulation::initialize(&mesh, SimParams::calm()).unwrap();

    for _ in 0..20 {
        sim.step(DT);
    }
    sim.export_to(&mut mesh);

    // Pinned corners are unchanged in local space, the rest moved
    assert!(approx_eq_vec3(mesh.local_vertices()[0], original[0], 1e-5));
    assert!(approx_eq_vec3(mesh.local_vertices()[2], original[2], 1e-5));
    assert!(mesh.local_vertices()[7].y < original[7].y);
    for (local, particle) in mesh.local_vertices().iter().zip(sim.particles()) {
        assert!(approx_eq_vec3(*local + offset, particle.position, 1e-5));
    }
}

#[test]
fn test_two_by_two_flag_drops_then_settles() {
    let mesh = FlagMesh::grid(2, 2, 1.0, 1.0);
    let mut sim = Simulation::initialize(&mesh, SimParams::calm()).unwrap();
    let lowest_y = |sim: &Simulation| {
        sim.particles()
            .iter()
            .map(|p| p.position.y)
            .fold(f32::INFINITY, f32::min)
    };

    let mut previous = lowest_y(&sim);
    for frame in 0..3 {
        sim.step(DT);
        let lowest = lowest_y(&sim);
        assert!(lowest < previous, "frame {}: {} did not drop below {}", frame, lowest, previous);
        previous = lowest;
    }

    for _ in 0..300 {
        sim.step(DT);
    }
    let before = lowest_y(&sim);
    sim.step(DT);
    let settled = lowest_y(&sim);
    assert!(settled < -1.0 && settled > -1.05, "settled at {}", settled);
    assert!(approx_eq_f32(settled, before, 1e-4));
}
