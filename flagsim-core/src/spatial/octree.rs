//! Adaptive octree.
//!
//! Nodes hold particles directly until they exceed `capacity`, then split
//! into eight equal octants (unless `max_depth` is reached or the node is
//! already tiny). Queries return
//! every particle inside the axis-aligned box around the query sphere, so
//! results are candidates rather than exact-radius hits.

use super::{SpatialIndex, MAX_OCTREE_DEPTH};
use crate::particle::Particle;
use glam::Vec3;

/// Padding added around the particle bounds so boundary particles sit strictly inside
const BOUNDS_PADDING: f32 = 1e-3;

/// Nodes narrower than this never split; coincident particles share a leaf
const MIN_NODE_EXTENT: f32 = 1e-4;

#[derive(Debug)]
struct Node {
    min: Vec3,
    max: Vec3,
    depth: u32,
    items: Vec<usize>,
    /// Index of the first of eight consecutive children
    first_child: Option<usize>,
}

impl Node {
    fn new(min: Vec3, max: Vec3, depth: u32) -> Self {
        Self {
            min,
            max,
            depth,
            items: Vec::new(),
            first_child: None,
        }
    }

    fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    fn intersects(&self, min: Vec3, max: Vec3) -> bool {
        self.min.cmple(max).all() && self.max.cmpge(min).all()
    }

    /// Octant of `p`: bit 0 = +x, bit 1 = +y, bit 2 = +z
    fn can_split(&self) -> bool {
        (self.max - self.min).min_element() > MIN_NODE_EXTENT
    }

    fn octant_of(&self, p: Vec3) -> usize {
        let c = self.center();
        (p.x >= c.x) as usize | ((p.y >= c.y) as usize) << 1 | ((p.z >= c.z) as usize) << 2
    }
}

pub struct Octree {
    capacity: usize,
    max_depth: u32,
    nodes: Vec<Node>,
    positions: Vec<Vec3>,
}

impl Octree {
    pub fn new(capacity: usize, max_depth: u32) -> Self {
        Self {
            capacity: capacity.max(1),
            max_depth: max_depth.min(MAX_OCTREE_DEPTH),
            nodes: Vec::new(),
            positions: Vec::new(),
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn depth(&self) -> u32 {
        self.nodes.iter().map(|n| n.depth).max().unwrap_or(0)
    }

    fn insert(&mut self, node: usize, item: usize) {
        if let Some(first) = self.nodes[node].first_child {
            let child = first + self.nodes[node].octant_of(self.positions[item]);
            self.insert(child, item);
            return;
        }

        let n = &mut self.nodes[node];
        n.items.push(item);
        if n.items.len() > self.capacity && n.depth < self.max_depth && n.can_split() {
            self.subdivide(node);
        }
    }

    fn subdivide(&mut self, node: usize) {
        let (min, max, depth) = {
            let n = &self.nodes[node];
            (n.min, n.max, n.depth)
        };
        let center = (min + max) * 0.5;

        let first = self.nodes.len();
        for octant in 0..8 {
            let pick = |bit: usize, lo: f32, mid: f32, hi: f32| {
                if octant & bit == 0 {
                    (lo, mid)
                } else {
                    (mid, hi)
                }
            };
            let (x0, x1) = pick(1, min.x, center.x, max.x);
            let (y0, y1) = pick(2, min.y, center.y, max.y);
            let (z0, z1) = pick(4, min.z, center.z, max.z);
            self.nodes.push(Node::new(
                Vec3::new(x0, y0, z0),
                Vec3::new(x1, y1, z1),
                depth + 1,
            ));
        }

        let items = std::mem::take(&mut self.nodes[node].items);
        self.nodes[node].first_child = Some(first);
        for item in items {
            let child = first + self.nodes[node].octant_of(self.positions[item]);
            self.insert(child, item);
        }
    }

    fn query_node(&self, node: usize, min: Vec3, max: Vec3, out: &mut Vec<usize>) {
        let n = &self.nodes[node];
        if !n.intersects(min, max) {
            return;
        }

        match n.first_child {
            Some(first) => {
                for child in first..first + 8 {
                    self.query_node(child, min, max, out);
                }
            }
            None => out.extend(n.items.iter().copied().filter(|&i| {
                let p = self.positions[i];
                p.cmpge(min).all() && p.cmple(max).all()
            })),
        }
    }
}

impl SpatialIndex for Octree {
    fn rebuild(&mut self, particles: &[Particle]) {
        self.nodes.clear();
        self.positions.clear();
        self.positions.extend(particles.iter().map(|p| p.position));

        let Some(&first) = self.positions.first() else {
            return;
        };
        let (min, max) = self
            .positions
            .iter()
            .fold((first, first), |(lo, hi), &p| (lo.min(p), hi.max(p)));

        self.nodes.push(Node::new(
            min - Vec3::splat(BOUNDS_PADDING),
            max + Vec3::splat(BOUNDS_PADDING),
            0,
        ));
        for i in 0..self.positions.len() {
            self.insert(0, i);
        }
    }

    fn query(&self, position: Vec3, radius: f32, out: &mut Vec<usize>) {
        if self.nodes.is_empty() {
            return;
        }
        let extent = Vec3::splat(radius.max(0.0));
        self.query_node(0, position - extent, position + extent, out);
    }

    fn is_exact(&self) -> bool {
        false
    }

    fn name(&self) -> &str {
        "octree"
    }
}
