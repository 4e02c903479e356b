//! Broad phase for self-collision.
//!
//! Both indexes are rebuilt from scratch every frame; there are no
//! incremental updates because every particle moves every frame.

mod grid;
mod octree;

pub use grid::GridHash;
pub use octree::Octree;

use crate::particle::Particle;
use glam::Vec3;

/// Spatial acceleration structure over particle positions.
pub trait SpatialIndex {
    /// Discard the previous contents and index `particles` at their current positions.
    fn rebuild(&mut self, particles: &[Particle]);

    /// Append to `out` the indices of particles near `position`.
    ///
    /// Every particle within `radius` is returned. Exact indexes return
    /// nothing else; inexact ones may also return nearby candidates and the
    /// caller must distance-check.
    fn query(&self, position: Vec3, radius: f32, out: &mut Vec<usize>);

    /// Whether `query` results are already filtered to the exact radius
    fn is_exact(&self) -> bool;

    fn name(&self) -> &str;
}

/// Which broad phase the simulation builds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpatialStrategy {
    Grid,
    Octree,
}

impl SpatialStrategy {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "grid" => Some(Self::Grid),
            "octree" => Some(Self::Octree),
            _ => None,
        }
    }
}

/// Smallest grid cell, as a multiple of the particle diameter, that keeps
/// the per-query cell scan small
pub const MIN_CELL_SIZE_FACTOR: f32 = 0.25;

/// Deepest octree level; insertion recurses once per level
pub const MAX_OCTREE_DEPTH: u32 = 16;

/// Tuning shared by both strategies
#[derive(Debug, Clone, Copy)]
pub struct SpatialConfig {
    pub strategy: SpatialStrategy,
    /// Grid cell edge as a multiple of the particle diameter
    pub cell_size_factor: f32,
    /// Particles a node holds before it subdivides
    pub octree_capacity: usize,
    pub octree_max_depth: u32,
}

impl Default for SpatialConfig {
    fn default() -> Self {
        Self {
            strategy: SpatialStrategy::Grid,
            cell_size_factor: 1.0,
            octree_capacity: 8,
            octree_max_depth: 6,
        }
    }
}

/// Construct the configured index for particles of the given radius
pub fn build_index(config: &SpatialConfig, particle_radius: f32) -> Box<dyn SpatialIndex> {
    match config.strategy {
        SpatialStrategy::Grid => Box::new(GridHash::new(
            particle_radius * 2.0 * config.cell_size_factor,
        )),
        SpatialStrategy::Octree => Box::new(Octree::new(
            config.octree_capacity,
            config.octree_max_depth,
        )),
    }
}
