use flagsim_core::collision::{CapsuleCollider, SphereCollider};
use flagsim_core::tests::test_helpers::{approx_eq_f32, approx_eq_vec3, particles_at};
use flagsim_core::{Axis, CapsuleDescriptor, Collider, ContactParams, SphereDescriptor};
use glam::{Affine3A, Quat, Vec3};

fn unit_sphere() -> Collider {
    Collider::Sphere(SphereCollider {
        center: Vec3::ZERO,
        radius: 1.0,
    })
}

#[test]
fn test_particle_inside_sphere_is_projected_to_shell() {
    let mut particles = particles_at(&[Vec3::new(0.5, 0.0, 0.0)]);
    let report = unit_sphere().resolve(&mut particles, &ContactParams::default());

    assert!(approx_eq_vec3(particles[0].position, Vec3::new(1.05, 0.0, 0.0), 1e-6));
    assert_eq!(report.resolved, 1);
    assert!(approx_eq_f32(report.max_penetration, 0.55, 1e-6));
}

#[test]
fn test_particle_at_sphere_center_uses_up_direction() {
    let mut particles = particles_at(&[Vec3::ZERO]);
    unit_sphere().resolve(&mut particles, &ContactParams::default());

    assert!(approx_eq_vec3(particles[0].position, Vec3::new(0.0, 1.05, 0.0), 1e-6));
}

#[test]
fn test_particle_outside_sphere_is_untouched() {
    let mut particles = particles_at(&[Vec3::new(2.0, 0.0, 0.0)]);
    let report = unit_sphere().resolve(&mut particles, &ContactParams::default());

    assert_eq!(particles[0].position, Vec3::new(2.0, 0.0, 0.0));
    assert_eq!(particles[0].force, Vec3::ZERO);
    assert_eq!(report.resolved, 0);
}

#[test]
fn test_pinned_particle_is_never_pushed() {
    let mut particles = particles_at(&[Vec3::new(0.5, 0.0, 0.0)]);
    particles[0].pinned = true;
    unit_sphere().resolve(&mut particles, &ContactParams::default());

    assert_eq!(particles[0].position, Vec3::new(0.5, 0.0, 0.0));
}

#[test]
fn test_contact_adds_elastic_and_friction_forces() {
    let mut particles = particles_at(&[Vec3::new(0.5, 0.0, 0.0)]);
    // Sliding along +y while touching the +x side
    particles[0].previous_position = Vec3::new(0.5, -0.1, 0.0);

    let params = ContactParams {
        epsilon: 0.05,
        friction: 0.3,
        elasticity: 0.1,
    };
    unit_sphere().resolve(&mut particles, &params);

    assert!(approx_eq_vec3(particles[0].force, Vec3::new(0.1, -0.03, 0.0), 1e-6));
}

#[test]
fn test_capsule_pushes_from_segment_interior() {
    let capsule = Collider::Capsule(CapsuleCollider {
        start: Vec3::new(0.0, -0.75, 0.0),
        end: Vec3::new(0.0, 0.75, 0.0),
        radius: 0.25,
    });
    let mut particles = particles_at(&[Vec3::new(0.1, 0.5, 0.0)]);
    capsule.resolve(&mut particles, &ContactParams::default());

    assert!(approx_eq_vec3(particles[0].position, Vec3::new(0.2625, 0.5, 0.0), 1e-6));
}

#[test]
fn test_capsule_end_behaves_like_hemisphere() {
    let capsule = CapsuleCollider {
        start: Vec3::new(0.0, -0.75, 0.0),
        end: Vec3::new(0.0, 0.75, 0.0),
        radius: 0.25,
    };
    assert_eq!(capsule.closest_point(Vec3::new(0.0, 3.0, 0.0)), capsule.end);

    let mut particles = particles_at(&[Vec3::new(0.0, 1.0, 0.0)]);
    Collider::Capsule(capsule).resolve(&mut particles, &ContactParams::default());
    assert!(approx_eq_vec3(particles[0].position, Vec3::new(0.0, 1.0125, 0.0), 1e-6));
}

#[test]
fn test_sphere_descriptor_applies_transform() {
    let descriptor = SphereDescriptor {
        center: Vec3::new(1.0, 0.0, 0.0),
        radius: 0.5,
        transform: Affine3A::from_scale_rotation_translation(
            Vec3::new(2.0, 1.0, 1.0),
            Quat::IDENTITY,
            Vec3::new(0.0, 3.0, 0.0),
        ),
    };
    let sphere = descriptor.to_world().unwrap();

    assert!(approx_eq_vec3(sphere.center, Vec3::new(2.0, 3.0, 0.0), 1e-6));
    // Largest axis scale wins
    assert!(approx_eq_f32(sphere.radius, 1.0, 1e-6));
}

#[test]
fn test_sphere_descriptor_rejects_non_finite_values() {
    let descriptor = SphereDescriptor {
        center: Vec3::new(f32::NAN, 0.0, 0.0),
        radius: 1.0,
        transform: Affine3A::IDENTITY,
    };
    assert!(descriptor.to_world().is_err());
}

#[test]
fn test_capsule_descriptor_segment_excludes_caps() {
    let descriptor = CapsuleDescriptor {
        center: Vec3::ZERO,
        height: 2.0,
        radius: 0.25,
        axis: Axis::Y,
        transform: Affine3A::from_translation(Vec3::new(1.0, 0.0, 0.0)),
    };
    let capsule = descriptor.to_world().unwrap();

    assert!(approx_eq_vec3(capsule.start, Vec3::new(1.0, -0.75, 0.0), 1e-6));
    assert!(approx_eq_vec3(capsule.end, Vec3::new(1.0, 0.75, 0.0), 1e-6));
    assert!(approx_eq_f32(capsule.radius, 0.25, 1e-6));
}

#[test]
fn test_short_capsule_collapses_to_sphere() {
    let descriptor = CapsuleDescriptor {
        center: Vec3::ZERO,
        height: 0.2,
        radius: 0.5,
        axis: Axis::X,
        transform: Affine3A::IDENTITY,
    };
    let capsule = descriptor.to_world().unwrap();
    assert_eq!(capsule.start, capsule.end);
}

#[test]
fn test_capsule_descriptor_rejects_collapsed_axis() {
    let descriptor = CapsuleDescriptor {
        center: Vec3::ZERO,
        height: 2.0,
        radius: 0.25,
        axis: Axis::Y,
        transform: Affine3A::from_scale(Vec3::new(1.0, 0.0, 1.0)),
    };
    assert!(descriptor.to_world().is_err());
}
