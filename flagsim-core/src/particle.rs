use glam::Vec3;

/// A point mass advanced by Verlet integration.
///
/// Velocity is implicit: it is the displacement since the previous frame.
#[derive(Debug, Clone)]
pub struct Particle {
    pub id: usize,
    pub position: Vec3,
    pub previous_position: Vec3,
    pub force: Vec3,
    pub pinned: bool,
    /// Sum of adjacent unit face normals, renormalized every frame
    pub normal: Vec3,
}

impl Particle {
    /// Create a resting particle; `id` is its index in the owning arena.
    pub fn new(id: usize, position: Vec3) -> Self {
        Self {
            id,
            position,
            previous_position: position,
            force: Vec3::ZERO,
            pinned: false,
            normal: Vec3::ZERO,
        }
    }

    pub fn add_force(&mut self, force: Vec3) {
        if !self.pinned {
            self.force += force;
        }
    }

    /// Advance one step: `x' = x + (x - x_prev) * damping + f * dt^2`
    pub fn integrate(&mut self, dt: f32, damping: f32) {
        if self.pinned {
            return;
        }

        let velocity = (self.position - self.previous_position) * damping;
        let new_position = self.position + velocity + self.force * (dt * dt);
        self.previous_position = self.position;
        self.position = new_position;
        self.force = Vec3::ZERO;
    }

    /// Explicit relocation. Works on pinned particles too; solver passes
    /// check `pinned` themselves.
    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    /// Displacement since the previous frame (the Verlet implicit velocity)
    pub fn displacement(&self) -> Vec3 {
        self.position - self.previous_position
    }

    /// Displacement per second, zero for a degenerate time step
    pub fn velocity(&self, dt: f32) -> Vec3 {
        if dt <= f32::EPSILON {
            return Vec3::ZERO;
        }
        self.displacement() / dt
    }
}
