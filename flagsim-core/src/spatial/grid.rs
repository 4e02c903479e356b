//! Uniform grid hash.
//!
//! Bins particles into cubic cells keyed by `floor(p / cell_size)`.
//! Queries scan the cube of cells covering the search radius, or the
//! occupied cells when there are fewer of them, and then filter by exact
//! distance.

use super::SpatialIndex;
use crate::particle::Particle;
use glam::{IVec3, Vec3};
use std::collections::HashMap;

pub struct GridHash {
    cell_size: f32,
    inv_cell_size: f32,
    cells: HashMap<IVec3, Vec<usize>>,
    positions: Vec<Vec3>,
}

impl GridHash {
    pub fn new(cell_size: f32) -> Self {
        let cell_size = cell_size.max(1e-6);
        Self {
            cell_size,
            inv_cell_size: 1.0 / cell_size,
            cells: HashMap::new(),
            positions: Vec::new(),
        }
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    fn cell_of(&self, position: Vec3) -> IVec3 {
        (position * self.inv_cell_size).floor().as_ivec3()
    }

    /// Number of occupied cells
    pub fn occupied_cells(&self) -> usize {
        self.cells.len()
    }
}

impl SpatialIndex for GridHash {
    fn rebuild(&mut self, particles: &[Particle]) {
        self.cells.clear();
        self.positions.clear();
        for (i, particle) in particles.iter().enumerate() {
            self.positions.push(particle.position);
            let cell = self.cell_of(particle.position);
            self.cells.entry(cell).or_default().push(i);
        }
    }

    fn query(&self, position: Vec3, radius: f32, out: &mut Vec<usize>) {
        let center = self.cell_of(position);
        let range = (radius * self.inv_cell_size).ceil().max(0.0);
        let radius_sq = radius * radius;
        let within = |i: &usize| self.positions[*i].distance_squared(position) <= radius_sq;

        // A scan cube larger than the occupied set is cheaper to replace by
        // walking the occupied cells
        let side = 2.0 * range + 1.0;
        if side * side * side > self.cells.len() as f32 {
            let range = range.min(i32::MAX as f32) as i32;
            let start = out.len();
            for (cell, bucket) in &self.cells {
                let offset = (*cell - center).abs();
                if offset.max_element() <= range {
                    out.extend(bucket.iter().copied().filter(within));
                }
            }
            // HashMap order is not stable across runs
            out[start..].sort_unstable();
            return;
        }

        let range = range as i32;
        for dx in -range..=range {
            for dy in -range..=range {
                for dz in -range..=range {
                    let Some(bucket) = self.cells.get(&(center + IVec3::new(dx, dy, dz))) else {
                        continue;
                    };
                    out.extend(bucket.iter().copied().filter(within));
                }
            }
        }
    }

    fn is_exact(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "grid_hash"
    }
}
