use crate::particle::Particle;

/// Springs shorter than this are treated as degenerate and skipped
const MIN_SPRING_LENGTH: f32 = 1e-6;

/// Spring category. Both share the same constraint, only stiffness differs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpringKind {
    /// Along a triangle edge
    Structural,
    /// Across two triangles sharing an edge
    Bending,
}

/// A distance constraint between two particles
#[derive(Debug, Clone)]
pub struct Spring {
    pub a: usize, // particle index
    pub b: usize, // particle index
    pub rest_length: f32,
    pub stiffness: f32,
    pub kind: SpringKind,
}

impl Spring {
    /// Create a spring whose rest length is the current distance between `a` and `b`
    pub fn new(particles: &[Particle], a: usize, b: usize, stiffness: f32, kind: SpringKind) -> Self {
        let rest_length = particles[a].position.distance(particles[b].position);
        Self {
            a,
            b,
            rest_length,
            stiffness,
            kind,
        }
    }

    /// Relax the pair toward `rest_length`.
    ///
    /// Each unpinned endpoint moves by the full `stiffness`-scaled offset, so a
    /// spring with one pinned end corrects entirely through the free end.
    /// A positive `damping_factor` also queues a force opposing the relative
    /// velocity, which only takes effect at the next integration.
    pub fn apply_constraint(&self, particles: &mut [Particle], damping_factor: f32) {
        let pos_a = particles[self.a].position;
        let pos_b = particles[self.b].position;

        let delta = pos_b - pos_a;
        let current_length = delta.length();
        if current_length < MIN_SPRING_LENGTH {
            return;
        }

        let correction_fraction = (current_length - self.rest_length) / current_length;
        let offset = delta * (self.stiffness * correction_fraction);

        if !particles[self.a].pinned {
            particles[self.a].position += offset;
        }
        if !particles[self.b].pinned {
            particles[self.b].position -= offset;
        }

        if damping_factor > 0.0 {
            let relative_velocity =
                particles[self.b].displacement() - particles[self.a].displacement();
            let damping_force = -relative_velocity * damping_factor;
            particles[self.a].add_force(-damping_force * 0.5);
            particles[self.b].add_force(damping_force * 0.5);
        }
    }

    /// Current length divided by rest length
    pub fn stretch_ratio(&self, particles: &[Particle]) -> f32 {
        if self.rest_length < MIN_SPRING_LENGTH {
            return 1.0;
        }
        particles[self.a].position.distance(particles[self.b].position) / self.rest_length
    }

    /// True if this spring joins `i` and `j` in either order
    pub fn connects(&self, i: usize, j: usize) -> bool {
        (self.a == i && self.b == j) || (self.a == j && self.b == i)
    }
}
