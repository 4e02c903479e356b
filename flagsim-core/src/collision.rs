//! Collision resolution against rigid primitives and the cloth itself.
//!
//! All responses are positional: penetrating particles are projected back
//! to the surface, and contact forces (elastic push, friction) are queued
//! for the next integration.

use crate::particle::Particle;
use crate::spatial::SpatialIndex;
use crate::topology::SpringNetwork;
use glam::{Affine3A, Vec3};

/// Below this distance a contact direction is undefined and a fallback axis is used
const MIN_CONTACT_DISTANCE: f32 = 1e-6;

/// Direction used when a particle sits exactly on a contact center
const FALLBACK_NORMAL: Vec3 = Vec3::Y;

/// Self-collision threshold as a multiple of the particle radius
pub const SELF_COLLISION_SCALE: f32 = 1.5;

/// Principal axis of a capsule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    pub fn unit(self) -> Vec3 {
        match self {
            Axis::X => Vec3::X,
            Axis::Y => Vec3::Y,
            Axis::Z => Vec3::Z,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "x" | "X" => Some(Axis::X),
            "y" | "Y" => Some(Axis::Y),
            "z" | "Z" => Some(Axis::Z),
            _ => None,
        }
    }
}

/// Per-axis scale of a host transform
fn transform_scale(transform: &Affine3A) -> Vec3 {
    Vec3::new(
        transform.matrix3.x_axis.length(),
        transform.matrix3.y_axis.length(),
        transform.matrix3.z_axis.length(),
    )
}

/// Host-side sphere: local center and radius under a world transform
#[derive(Debug, Clone)]
pub struct SphereDescriptor {
    pub center: Vec3,
    pub radius: f32,
    pub transform: Affine3A,
}

impl SphereDescriptor {
    /// Resolve to world space; `Err` names why the descriptor is unusable.
    ///
    /// The radius is scaled by the largest axis scale of the transform.
    pub fn to_world(&self) -> Result<SphereCollider, String> {
        if !self.center.is_finite() || !self.radius.is_finite() || !self.transform.is_finite() {
            return Err("non-finite sphere descriptor".to_string());
        }
        let radius = self.radius * transform_scale(&self.transform).max_element();
        if radius <= 0.0 {
            return Err(format!("sphere radius {} is not positive", radius));
        }
        Ok(SphereCollider {
            center: self.transform.transform_point3(self.center),
            radius,
        })
    }
}

/// Host-side capsule: local center, total height, radius and principal axis
#[derive(Debug, Clone)]
pub struct CapsuleDescriptor {
    pub center: Vec3,
    pub height: f32,
    pub radius: f32,
    pub axis: Axis,
    pub transform: Affine3A,
}

impl CapsuleDescriptor {
    /// Resolve to world space.
    ///
    /// Height scales with the transform along `axis`; radius with the larger
    /// of the two other axis scales. The segment between the hemisphere
    /// centers is `height - 2 * radius` long (zero for a sphere-like capsule).
    pub fn to_world(&self) -> Result<CapsuleCollider, String> {
        if !self.center.is_finite()
            || !self.radius.is_finite()
            || !self.height.is_finite()
            || !self.transform.is_finite()
        {
            return Err("non-finite capsule descriptor".to_string());
        }

        let scale = transform_scale(&self.transform);
        let axis = self.axis.index();
        let cross_scale = (0..3)
            .filter(|&k| k != axis)
            .map(|k| scale[k])
            .fold(0.0_f32, f32::max);

        let radius = self.radius * cross_scale;
        if radius <= 0.0 {
            return Err(format!("capsule radius {} is not positive", radius));
        }
        let height = self.height.max(0.0) * scale[axis];

        let direction = self
            .transform
            .transform_vector3(self.axis.unit())
            .try_normalize()
            .ok_or_else(|| "capsule axis collapses under its transform".to_string())?;

        let center = self.transform.transform_point3(self.center);
        let half_segment = (height * 0.5 - radius).max(0.0);
        Ok(CapsuleCollider {
            start: center - direction * half_segment,
            end: center + direction * half_segment,
            radius,
        })
    }
}

/// Contact response tuning
#[derive(Debug, Clone, Copy)]
pub struct ContactParams {
    /// Collision shell: radii are inflated by `1 + epsilon`
    pub epsilon: f32,
    /// Scale of the force opposing tangential motion at a contact
    pub friction: f32,
    /// Magnitude of the outward push applied on contact
    pub elasticity: f32,
}

impl Default for ContactParams {
    fn default() -> Self {
        Self {
            epsilon: 0.05,
            friction: 0.3,
            elasticity: 0.1,
        }
    }
}

/// Summary of one resolution pass
#[derive(Debug, Clone, Copy, Default)]
pub struct ContactReport {
    pub resolved: u32,
    pub max_penetration: f32,
}

impl ContactReport {
    fn record(&mut self, depth: f32) {
        self.resolved += 1;
        self.max_penetration = self.max_penetration.max(depth);
    }

    pub fn merge(&mut self, other: ContactReport) {
        self.resolved += other.resolved;
        self.max_penetration = self.max_penetration.max(other.max_penetration);
    }
}

/// World-space sphere
#[derive(Debug, Clone, Copy)]
pub struct SphereCollider {
    pub center: Vec3,
    pub radius: f32,
}

/// World-space capsule: a segment swept by `radius`
#[derive(Debug, Clone, Copy)]
pub struct CapsuleCollider {
    pub start: Vec3,
    pub end: Vec3,
    pub radius: f32,
}

impl CapsuleCollider {
    /// Closest point to `p` on the segment, with the projection clamped to its ends
    pub fn closest_point(&self, p: Vec3) -> Vec3 {
        let segment = self.end - self.start;
        let length = segment.length();
        if length < MIN_CONTACT_DISTANCE {
            return self.start;
        }
        let direction = segment / length;
        let t = (p - self.start).dot(direction).clamp(0.0, length);
        self.start + direction * t
    }
}

/// A rigid volume the cloth cannot enter
#[derive(Debug, Clone, Copy)]
pub enum Collider {
    Sphere(SphereCollider),
    Capsule(CapsuleCollider),
}

impl Collider {
    pub fn resolve(&self, particles: &mut [Particle], params: &ContactParams) -> ContactReport {
        let mut report = ContactReport::default();
        for particle in particles.iter_mut().filter(|p| !p.pinned) {
            let depth = match self {
                Collider::Sphere(sphere) => {
                    push_out_of_sphere(particle, sphere.center, sphere.radius, params)
                }
                Collider::Capsule(capsule) => {
                    let center = capsule.closest_point(particle.position);
                    push_out_of_sphere(particle, center, capsule.radius, params)
                }
            };
            if let Some(depth) = depth {
                report.record(depth);
            }
        }
        report
    }
}

/// Project `particle` onto the inflated sphere around `center` if it is
/// inside, and queue elastic and friction forces. Returns the penetration depth.
fn push_out_of_sphere(
    particle: &mut Particle,
    center: Vec3,
    radius: f32,
    params: &ContactParams,
) -> Option<f32> {
    let collision_radius = radius * (1.0 + params.epsilon);
    let offset = particle.position - center;
    let distance = offset.length();
    if distance >= collision_radius {
        return None;
    }

    let normal = if distance > MIN_CONTACT_DISTANCE {
        offset / distance
    } else {
        FALLBACK_NORMAL
    };

    let velocity = particle.displacement();
    particle.set_position(center + normal * collision_radius);

    let tangential = velocity - normal * velocity.dot(normal);
    particle.add_force(normal * params.elasticity);
    particle.add_force(-tangential * params.friction);

    Some(collision_radius - distance)
}

/// Push apart particles closer than `1.5 * particle_radius`.
///
/// Each unordered pair is visited once (lower id first). Spring-connected
/// pairs are skipped since their distance is the springs' business.
///
/// `index` may have been built from older positions. `drift` must be at
/// least the largest distance any particle has moved since then; queries
/// are widened by it so pairs that moved together are still found.
/// `neighbors` is scratch space reused across calls.
pub fn resolve_self_collision(
    particles: &mut [Particle],
    index: &dyn SpatialIndex,
    network: &SpringNetwork,
    particle_radius: f32,
    drift: f32,
    neighbors: &mut Vec<usize>,
) -> ContactReport {
    let min_distance = SELF_COLLISION_SCALE * particle_radius;
    let min_distance_sq = min_distance * min_distance;
    let query_radius = min_distance + drift.max(0.0);
    let mut report = ContactReport::default();

    for i in 0..particles.len() {
        neighbors.clear();
        index.query(particles[i].position, query_radius, neighbors);

        for &j in neighbors.iter() {
            if particles[i].id >= particles[j].id || network.is_connected(i, j) {
                continue;
            }
            let (pinned_i, pinned_j) = (particles[i].pinned, particles[j].pinned);

            let delta = particles[j].position - particles[i].position;
            let distance_sq = delta.length_squared();
            if distance_sq >= min_distance_sq {
                continue;
            }

            let distance = distance_sq.sqrt();
            let direction = if distance > MIN_CONTACT_DISTANCE {
                delta / distance
            } else {
                FALLBACK_NORMAL
            };
            let penetration = min_distance - distance;

            match (pinned_i, pinned_j) {
                (false, false) => {
                    let half = direction * (penetration * 0.5);
                    particles[i].position -= half;
                    particles[j].position += half;
                }
                (true, false) => particles[j].position += direction * penetration,
                (false, true) => particles[i].position -= direction * penetration,
                (true, true) => continue,
            }
            report.record(penetration);
        }
    }

    report
}
