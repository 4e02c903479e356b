//! The per-frame pipeline.
//!
//! forces -> integrate -> `iterations` x (springs, colliders, self-collision)
//! -> export to the mesh host.

use crate::collision::{
    resolve_self_collision, CapsuleDescriptor, Collider, ContactReport, SphereDescriptor,
};
use crate::config::SimParams;
use crate::error::{SimError, SimResult};
use crate::forces::{accumulate_normals, apply_aerodynamics, apply_gravity, apply_wind, WindBurst};
use crate::mesh::MeshHost;
use crate::particle::Particle;
use crate::spatial::{build_index, SpatialIndex};
use crate::topology::{pin_extremes, validate_triangles, SpringNetwork};
use glam::{Affine3A, Vec3};
use tracing::{debug, info, trace, warn};

/// What one `step` did
#[derive(Debug, Clone, Copy, Default)]
pub struct StepReport {
    pub collider_contacts: ContactReport,
    pub self_contacts: ContactReport,
}

pub struct Simulation {
    particles: Vec<Particle>,
    network: SpringNetwork,
    triangles: Vec<u32>,
    transform: Affine3A,
    inverse_transform: Affine3A,
    params: SimParams,
    index: Box<dyn SpatialIndex>,
    colliders: Vec<Collider>,
    burst: WindBurst,
    pinned: (usize, usize),
    neighbors: Vec<usize>,
    /// Positions the index was last built from
    indexed_positions: Vec<Vec3>,
    frame: u64,
}

impl Simulation {
    /// Build particles and springs from the host mesh.
    ///
    /// Fails if the mesh is missing, has no triangles, references
    /// out-of-range vertices, or `params` are unusable.
    pub fn initialize(host: &dyn MeshHost, params: SimParams) -> SimResult<Self> {
        params.validate().map_err(SimError::InvalidConfig)?;

        let vertices = host.local_vertices();
        let triangles = host.triangles();
        validate_triangles(triangles, vertices.len())?;

        let transform = host.transform();
        if !transform.is_finite() || transform.matrix3.determinant().abs() <= f32::EPSILON {
            return Err(SimError::InvalidMesh(
                "host transform is not invertible".to_string(),
            ));
        }

        let mut particles: Vec<Particle> = vertices
            .iter()
            .enumerate()
            .map(|(id, &v)| Particle::new(id, transform.transform_point3(v)))
            .collect();

        let (left, right) = pin_extremes(&mut particles).ok_or(SimError::MissingMesh)?;
        info!(
            index = left,
            position = ?particles[left].position,
            "pinned leftmost particle"
        );
        info!(
            index = right,
            position = ?particles[right].position,
            "pinned rightmost particle"
        );

        let network = SpringNetwork::from_triangles(
            &particles,
            triangles,
            params.stiffness,
            Some(params.folding_factor),
        )?;
        info!(
            particles = particles.len(),
            springs = network.len(),
            "cloth initialized"
        );

        let index = build_index(&params.spatial, params.particle_radius);

        Ok(Self {
            particles,
            network,
            triangles: triangles.to_vec(),
            transform,
            inverse_transform: transform.inverse(),
            params,
            index,
            colliders: Vec::new(),
            burst: WindBurst::default(),
            pinned: (left, right),
            neighbors: Vec::new(),
            indexed_positions: Vec::new(),
            frame: 0,
        })
    }

    /// Advance one frame
    pub fn step(&mut self, dt: f32) -> StepReport {
        let mut report = StepReport::default();
        if !(dt.is_finite() && dt > 0.0) {
            warn!(dt, "skipping frame with unusable time step");
            return report;
        }

        let features = self.params.features;
        let wind = self.params.wind_vector();
        let steady_wind = if features.wind { wind } else { Vec3::ZERO };

        accumulate_normals(&mut self.particles, &self.triangles);
        apply_gravity(&mut self.particles, self.params.gravity);
        apply_wind(&mut self.particles, steady_wind);
        self.burst.apply(&mut self.particles, wind, dt);
        if features.aerodynamics {
            apply_aerodynamics(
                &mut self.particles,
                steady_wind,
                self.params.drag_coefficient,
                self.params.lift_coefficient,
                dt,
            );
        }

        for particle in &mut self.particles {
            particle.integrate(dt, self.params.damping);
        }

        if features.self_collision {
            self.index.rebuild(&self.particles);
            self.indexed_positions.clear();
            self.indexed_positions
                .extend(self.particles.iter().map(|p| p.position));
        }

        for _ in 0..self.params.iterations {
            self.network.relax(
                &mut self.particles,
                self.params.spring_damping,
                features.bending_springs,
            );

            for collider in &self.colliders {
                let enabled = match collider {
                    Collider::Sphere(_) => features.sphere_collisions,
                    Collider::Capsule(_) => features.capsule_collisions,
                };
                if enabled {
                    report
                        .collider_contacts
                        .merge(collider.resolve(&mut self.particles, &self.params.contact));
                }
            }

            if features.self_collision {
                let drift = max_drift(&self.particles, &self.indexed_positions);
                report.self_contacts.merge(resolve_self_collision(
                    &mut self.particles,
                    self.index.as_ref(),
                    &self.network,
                    self.params.particle_radius,
                    drift,
                    &mut self.neighbors,
                ));
            }
        }

        self.frame += 1;
        trace!(
            frame = self.frame,
            collider_contacts = report.collider_contacts.resolved,
            self_contacts = report.self_contacts.resolved,
            "step"
        );
        report
    }

    /// Replace this frame's colliders. Malformed descriptors are logged and skipped.
    pub fn set_colliders(&mut self, spheres: &[SphereDescriptor], capsules: &[CapsuleDescriptor]) {
        self.colliders.clear();

        for (i, sphere) in spheres.iter().enumerate() {
            match sphere.to_world() {
                Ok(collider) => self.colliders.push(Collider::Sphere(collider)),
                Err(reason) => warn!(index = i, %reason, "skipping sphere collider"),
            }
        }
        for (i, capsule) in capsules.iter().enumerate() {
            match capsule.to_world() {
                Ok(collider) => self.colliders.push(Collider::Capsule(collider)),
                Err(reason) => warn!(index = i, %reason, "skipping capsule collider"),
            }
        }
    }

    /// Start (or restart) a timed gust of the current wind
    pub fn trigger_wind_burst(&mut self, duration: f32) {
        debug!(duration, "wind burst triggered");
        self.burst.trigger(duration);
    }

    pub fn set_wind(&mut self, strength: f32, direction: Vec3) {
        self.params.set_wind_strength(strength);
        self.params.wind_direction = direction;
    }

    /// Swap in new parameters, retuning springs and rebuilding the spatial index
    pub fn set_params(&mut self, params: SimParams) -> SimResult<()> {
        params.validate().map_err(SimError::InvalidConfig)?;
        self.network
            .set_stiffness(params.stiffness, params.stiffness * params.folding_factor);
        self.index = build_index(&params.spatial, params.particle_radius);
        self.params = params;
        Ok(())
    }

    /// Write particle positions back to the host in its local space
    pub fn export_to(&self, host: &mut dyn MeshHost) {
        host.update_vertices(&self.local_positions());
        host.recalculate_normals();
    }

    pub fn local_positions(&self) -> Vec<Vec3> {
        self.particles
            .iter()
            .map(|p| self.inverse_transform.transform_point3(p.position))
            .collect()
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    /// Direct particle access for host setup code (e.g. relocating a pinned anchor)
    pub fn particles_mut(&mut self) -> &mut [Particle] {
        &mut self.particles
    }

    pub fn network(&self) -> &SpringNetwork {
        &self.network
    }

    pub fn colliders(&self) -> &[Collider] {
        &self.colliders
    }

    pub fn params(&self) -> &SimParams {
        &self.params
    }

    pub fn transform(&self) -> Affine3A {
        self.transform
    }

    pub fn pinned_indices(&self) -> (usize, usize) {
        self.pinned
    }

    pub fn wind_burst(&self) -> &WindBurst {
        &self.burst
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }
}

/// Largest distance any particle has moved away from its indexed position
fn max_drift(particles: &[Particle], indexed: &[Vec3]) -> f32 {
    particles
        .iter()
        .zip(indexed)
        .map(|(p, &q)| p.position.distance(q))
        .fold(0.0, f32::max)
}
