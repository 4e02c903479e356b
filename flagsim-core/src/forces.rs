//! External forces: gravity, wind, and a flat-panel aerodynamic model.

use crate::mesh::face_normal;
use crate::particle::Particle;
use glam::Vec3;

/// Rebuild every particle normal from the triangles around it
pub fn accumulate_normals(particles: &mut [Particle], triangles: &[u32]) {
    for particle in particles.iter_mut() {
        particle.normal = Vec3::ZERO;
    }

    for tri in triangles.chunks_exact(3) {
        let (a, b, c) = (tri[0] as usize, tri[1] as usize, tri[2] as usize);
        let Some(n) = face_normal(particles[a].position, particles[b].position, particles[c].position)
        else {
            continue;
        };
        particles[a].normal += n;
        particles[b].normal += n;
        particles[c].normal += n;
    }

    for particle in particles.iter_mut() {
        particle.normal = particle.normal.normalize_or_zero();
    }
}

pub fn apply_gravity(particles: &mut [Particle], gravity: f32) {
    let force = Vec3::new(0.0, -gravity, 0.0);
    for particle in particles.iter_mut() {
        particle.add_force(force);
    }
}

/// Uniform push; `add_force` already ignores pinned particles
pub fn apply_wind(particles: &mut [Particle], wind: Vec3) {
    if wind == Vec3::ZERO {
        return;
    }
    for particle in particles.iter_mut() {
        particle.add_force(wind);
    }
}

/// Drag and lift on each particle treated as a small flat panel.
///
/// Both scale with the squared relative airspeed. Drag acts along the
/// relative wind direction, lift along `relative_dir x normal`.
pub fn apply_aerodynamics(
    particles: &mut [Particle],
    wind: Vec3,
    drag_coefficient: f32,
    lift_coefficient: f32,
    dt: f32,
) {
    for particle in particles.iter_mut().filter(|p| !p.pinned) {
        let relative = wind - particle.velocity(dt);
        let speed_sq = relative.length_squared();
        if speed_sq <= f32::EPSILON || particle.normal == Vec3::ZERO {
            continue;
        }

        let direction = relative / speed_sq.sqrt();
        let drag = -drag_coefficient * direction * speed_sq;
        let lift = lift_coefficient * direction.cross(particle.normal) * speed_sq;
        particle.add_force(drag + lift);
    }
}

/// A timed gust that re-applies the wind once per frame until it runs out.
///
/// Triggering again while active restarts the countdown.
#[derive(Debug, Clone, Copy, Default)]
pub struct WindBurst {
    remaining: f32,
}

impl WindBurst {
    pub fn trigger(&mut self, duration: f32) {
        self.remaining = duration.max(0.0);
    }

    pub fn is_active(&self) -> bool {
        self.remaining > 0.0
    }

    pub fn remaining(&self) -> f32 {
        self.remaining
    }

    /// Apply this frame's contribution and advance the countdown
    pub fn apply(&mut self, particles: &mut [Particle], wind: Vec3, dt: f32) {
        if !self.is_active() {
            return;
        }
        apply_wind(particles, wind);
        self.remaining = (self.remaining - dt).max(0.0);
    }
}
