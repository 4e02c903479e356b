//! Simulation parameters.
//!
//! Everything the host may tune at runtime lives in `SimParams`. Scene files
//! override individual fields by name through `SimParams::set`.

use crate::collision::ContactParams;
use crate::spatial::{SpatialConfig, SpatialStrategy, MAX_OCTREE_DEPTH, MIN_CELL_SIZE_FACTOR};
use glam::Vec3;

/// Upper bound of the wind strength control
pub const MAX_WIND_STRENGTH: f32 = 20.0;

/// Which stages of the pipeline participate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Features {
    pub sphere_collisions: bool,
    pub capsule_collisions: bool,
    pub self_collision: bool,
    pub wind: bool,
    pub aerodynamics: bool,
    pub bending_springs: bool,
}

impl Default for Features {
    fn default() -> Self {
        Self {
            sphere_collisions: true,
            capsule_collisions: true,
            self_collision: true,
            wind: true,
            aerodynamics: true,
            bending_springs: true,
        }
    }
}

impl Features {
    /// Everything off: gravity and springs only
    pub fn minimal() -> Self {
        Self {
            sphere_collisions: false,
            capsule_collisions: false,
            self_collision: false,
            wind: false,
            aerodynamics: false,
            bending_springs: false,
        }
    }

    /// Toggle a feature by its scene-file name. Returns `false` for unknown names.
    pub fn set(&mut self, name: &str, enabled: bool) -> bool {
        let flag = match name {
            "sphere_collisions" => &mut self.sphere_collisions,
            "capsule_collisions" => &mut self.capsule_collisions,
            "self_collision" => &mut self.self_collision,
            "wind" => &mut self.wind,
            "aerodynamics" => &mut self.aerodynamics,
            "bending_springs" => &mut self.bending_springs,
            _ => return false,
        };
        *flag = enabled;
        true
    }
}

#[derive(Debug, Clone)]
pub struct SimParams {
    /// Downward acceleration
    pub gravity: f32,
    /// Fraction of structural spring error corrected per relaxation pass (0..1)
    pub stiffness: f32,
    /// Bending spring stiffness as a fraction of `stiffness`
    pub folding_factor: f32,
    /// Verlet displacement damping (1.0 = none)
    pub damping: f32,
    /// Spring velocity damping; 0 disables it
    pub spring_damping: f32,
    /// Relaxation iterations per frame
    pub iterations: u32,
    /// Self-collision particle radius
    pub particle_radius: f32,
    pub wind_strength: f32,
    pub wind_direction: Vec3,
    pub drag_coefficient: f32,
    pub lift_coefficient: f32,
    pub contact: ContactParams,
    pub spatial: SpatialConfig,
    pub features: Features,
}

impl Default for SimParams {
    fn default() -> Self {
        Self {
            gravity: 9.81,
            stiffness: 0.5,
            folding_factor: 0.3,
            damping: 0.99,
            spring_damping: 0.05,
            iterations: 5,
            particle_radius: 0.1,
            wind_strength: 2.0,
            wind_direction: Vec3::new(1.0, 0.0, 0.3),
            drag_coefficient: 0.01,
            lift_coefficient: 0.02,
            contact: ContactParams::default(),
            spatial: SpatialConfig::default(),
            features: Features::default(),
        }
    }
}

impl SimParams {
    /// No wind, no aerodynamics
    pub fn calm() -> Self {
        let mut features = Features::default();
        features.wind = false;
        features.aerodynamics = false;
        Self {
            wind_strength: 0.0,
            features,
            ..Default::default()
        }
    }

    /// Strong gusts with extra relaxation iterations to keep the cloth taut
    pub fn stormy() -> Self {
        Self {
            wind_strength: 15.0,
            iterations: 8,
            drag_coefficient: 0.02,
            lift_coefficient: 0.04,
            ..Default::default()
        }
    }

    /// The wind force vector: unit direction times strength
    pub fn wind_vector(&self) -> Vec3 {
        self.wind_direction.normalize_or_zero() * self.wind_strength
    }

    /// Set wind strength, clamped to `0..=MAX_WIND_STRENGTH`
    pub fn set_wind_strength(&mut self, strength: f32) {
        self.wind_strength = strength.clamp(0.0, MAX_WIND_STRENGTH);
    }

    /// Set a scalar field by its scene-file name. Returns `false` for unknown names.
    pub fn set(&mut self, name: &str, value: f32) -> bool {
        match name {
            "gravity" => self.gravity = value,
            "stiffness" => self.stiffness = value,
            "folding_factor" => self.folding_factor = value,
            "damping" => self.damping = value,
            "spring_damping" => self.spring_damping = value,
            "iterations" => self.iterations = value.max(0.0) as u32,
            "particle_radius" => self.particle_radius = value,
            "wind_strength" => self.set_wind_strength(value),
            "wind_control" => self.wind_direction = wind_direction_from_control(value),
            "drag" => self.drag_coefficient = value,
            "lift" => self.lift_coefficient = value,
            "collision_epsilon" => self.contact.epsilon = value,
            "friction" => self.contact.friction = value,
            "elasticity" => self.contact.elasticity = value,
            "cell_size_factor" => self.spatial.cell_size_factor = value,
            "octree_capacity" => self.spatial.octree_capacity = value.max(1.0) as usize,
            "octree_max_depth" => self.spatial.octree_max_depth = value.max(0.0) as u32,
            _ => return false,
        }
        true
    }

    pub fn set_strategy(&mut self, strategy: SpatialStrategy) {
        self.spatial.strategy = strategy;
    }

    /// Reject values the solver cannot work with
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.stiffness) {
            return Err(format!("stiffness {} outside 0..=1", self.stiffness));
        }
        if !(0.0..=1.0).contains(&self.folding_factor) {
            return Err(format!("folding_factor {} outside 0..=1", self.folding_factor));
        }
        if !(0.0..=1.0).contains(&self.damping) {
            return Err(format!("damping {} outside 0..=1", self.damping));
        }
        if self.particle_radius <= 0.0 {
            return Err(format!("particle_radius {} must be positive", self.particle_radius));
        }
        if self.contact.epsilon < 0.0 {
            return Err(format!("collision_epsilon {} must not be negative", self.contact.epsilon));
        }
        let cell_size_factor = self.spatial.cell_size_factor;
        if cell_size_factor.is_nan() || cell_size_factor < MIN_CELL_SIZE_FACTOR {
            return Err(format!(
                "cell_size_factor {} must be at least {}",
                cell_size_factor, MIN_CELL_SIZE_FACTOR
            ));
        }
        if self.spatial.octree_max_depth > MAX_OCTREE_DEPTH {
            return Err(format!(
                "octree_max_depth {} exceeds {}",
                self.spatial.octree_max_depth, MAX_OCTREE_DEPTH
            ));
        }
        Ok(())
    }
}

/// Map a single scalar control to a wind direction: a horizontal offset
/// blended with fixed upward and forward components.
pub fn wind_direction_from_control(control: f32) -> Vec3 {
    Vec3::new(control, 0.25, 1.0).normalize()
}
