//! Spring network construction from triangle connectivity.

use crate::error::{SimError, SimResult};
use crate::particle::Particle;
use crate::spring::{Spring, SpringKind};
use std::collections::{HashMap, HashSet};

/// Canonical key for an unordered particle pair
fn pair_key(i: usize, j: usize) -> (usize, usize) {
    if i < j {
        (i, j)
    } else {
        (j, i)
    }
}

/// Check that `triangles` is a stride-3 list of indices into `vertex_count` vertices
pub fn validate_triangles(triangles: &[u32], vertex_count: usize) -> SimResult<()> {
    if vertex_count == 0 {
        return Err(SimError::MissingMesh);
    }
    if triangles.is_empty() {
        return Err(SimError::MissingTriangles);
    }
    if triangles.len() % 3 != 0 {
        return Err(SimError::InvalidMesh(format!(
            "triangle index count {} is not a multiple of 3",
            triangles.len()
        )));
    }
    if let Some(bad) = triangles.iter().find(|&&i| i as usize >= vertex_count) {
        return Err(SimError::InvalidMesh(format!(
            "triangle index {} out of range for {} vertices",
            bad, vertex_count
        )));
    }
    Ok(())
}

/// The set of springs binding the cloth together.
///
/// Springs live in a plain `Vec` for iteration; a pair set guarantees at most
/// one spring per unordered particle pair.
#[derive(Debug, Default)]
pub struct SpringNetwork {
    springs: Vec<Spring>,
    pairs: HashSet<(usize, usize)>,
}

impl SpringNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build structural springs for every triangle edge and, when
    /// `folding_factor` is given, bending springs across every interior edge.
    pub fn from_triangles(
        particles: &[Particle],
        triangles: &[u32],
        stiffness: f32,
        folding_factor: Option<f32>,
    ) -> SimResult<Self> {
        validate_triangles(triangles, particles.len())?;

        let mut network = Self::new();
        for tri in triangles.chunks_exact(3) {
            let (a, b, c) = (tri[0] as usize, tri[1] as usize, tri[2] as usize);
            network.add_spring(particles, a, b, stiffness, SpringKind::Structural);
            network.add_spring(particles, b, c, stiffness, SpringKind::Structural);
            network.add_spring(particles, c, a, stiffness, SpringKind::Structural);
        }

        if let Some(factor) = folding_factor {
            network.add_bending_springs(particles, triangles, stiffness * factor);
        }

        Ok(network)
    }

    /// Insert a spring unless the pair is already connected (or degenerate).
    /// Returns whether a spring was added.
    pub fn add_spring(
        &mut self,
        particles: &[Particle],
        a: usize,
        b: usize,
        stiffness: f32,
        kind: SpringKind,
    ) -> bool {
        if a == b || !self.pairs.insert(pair_key(a, b)) {
            return false;
        }
        self.springs.push(Spring::new(particles, a, b, stiffness, kind));
        true
    }

    fn add_bending_springs(&mut self, particles: &[Particle], triangles: &[u32], stiffness: f32) {
        let mut edge_triangles: HashMap<(usize, usize), Vec<usize>> = HashMap::new();
        for (t, tri) in triangles.chunks_exact(3).enumerate() {
            for k in 0..3 {
                let edge = pair_key(tri[k] as usize, tri[(k + 1) % 3] as usize);
                edge_triangles.entry(edge).or_default().push(t);
            }
        }

        // Sorted so spring order (and hence solver order) is deterministic
        let mut shared: Vec<_> = edge_triangles
            .into_iter()
            .filter(|(_, tris)| tris.len() == 2)
            .collect();
        shared.sort_unstable_by_key(|(edge, _)| *edge);

        for ((e0, e1), tris) in shared {
            let opposite = |t: usize| {
                triangles[t * 3..t * 3 + 3]
                    .iter()
                    .map(|&v| v as usize)
                    .find(|&v| v != e0 && v != e1)
            };
            if let (Some(p), Some(q)) = (opposite(tris[0]), opposite(tris[1])) {
                self.add_spring(particles, p, q, stiffness, SpringKind::Bending);
            }
        }
    }

    /// Whether particles `i` and `j` share a spring
    pub fn is_connected(&self, i: usize, j: usize) -> bool {
        self.pairs.contains(&pair_key(i, j))
    }

    pub fn springs(&self) -> &[Spring] {
        &self.springs
    }

    pub fn len(&self) -> usize {
        self.springs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.springs.is_empty()
    }

    pub fn count(&self, kind: SpringKind) -> usize {
        self.springs.iter().filter(|s| s.kind == kind).count()
    }

    /// One Gauss-Seidel relaxation sweep, bending springs included only on request
    pub fn relax(&self, particles: &mut [Particle], damping_factor: f32, include_bending: bool) {
        for spring in &self.springs {
            if spring.kind == SpringKind::Bending && !include_bending {
                continue;
            }
            spring.apply_constraint(particles, damping_factor);
        }
    }

    /// Retune every spring; rest lengths are untouched
    pub fn set_stiffness(&mut self, structural: f32, bending: f32) {
        for spring in &mut self.springs {
            spring.stiffness = match spring.kind {
                SpringKind::Structural => structural,
                SpringKind::Bending => bending,
            };
        }
    }
}

/// Pin the particles with minimum and maximum world-space x (first
/// encountered wins ties). Returns their indices, `None` for an empty slice.
pub fn pin_extremes(particles: &mut [Particle]) -> Option<(usize, usize)> {
    let first = particles.first()?;
    let mut leftmost = (0, first.position.x);
    let mut rightmost = (0, first.position.x);

    for (i, particle) in particles.iter().enumerate().skip(1) {
        let x = particle.position.x;
        if x < leftmost.1 {
            leftmost = (i, x);
        }
        if x > rightmost.1 {
            rightmost = (i, x);
        }
    }

    particles[leftmost.0].pinned = true;
    particles[rightmost.0].pinned = true;
    Some((leftmost.0, rightmost.0))
}
