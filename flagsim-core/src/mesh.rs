//! Mesh host contract and a minimal in-crate host.
//!
//! A host owns the renderable mesh: it hands the simulation local-space
//! vertices, triangle indices and its world transform once, and receives
//! local-space vertex positions back every frame.

use glam::{Affine3A, Vec3};
use std::collections::HashMap;

/// What the simulation needs from whoever owns the renderable mesh
pub trait MeshHost {
    /// Vertex positions in object-local space
    fn local_vertices(&self) -> &[Vec3];

    /// Stride-3 triangle list indexing `local_vertices`
    fn triangles(&self) -> &[u32];

    /// Object-to-world transform
    fn transform(&self) -> Affine3A;

    /// Replace vertex positions (object-local space)
    fn update_vertices(&mut self, local: &[Vec3]);

    fn recalculate_normals(&mut self);
}

/// Unit normal of triangle `(a, b, c)`, `None` when the triangle is degenerate
pub fn face_normal(a: Vec3, b: Vec3, c: Vec3) -> Option<Vec3> {
    (b - a).cross(c - a).try_normalize()
}

/// Per-vertex normals as the normalized sum of adjacent face normals
pub fn vertex_normals(vertices: &[Vec3], triangles: &[u32]) -> Vec<Vec3> {
    let mut normals = vec![Vec3::ZERO; vertices.len()];
    for tri in triangles.chunks_exact(3) {
        let (a, b, c) = (tri[0] as usize, tri[1] as usize, tri[2] as usize);
        if let Some(n) = face_normal(vertices[a], vertices[b], vertices[c]) {
            normals[a] += n;
            normals[b] += n;
            normals[c] += n;
        }
    }
    for n in &mut normals {
        *n = n.normalize_or_zero();
    }
    normals
}

/// A standalone triangle mesh that implements `MeshHost`
#[derive(Debug, Clone)]
pub struct FlagMesh {
    pub vertices: Vec<Vec3>,
    pub triangles: Vec<u32>,
    pub normals: Vec<Vec3>,
    pub transform: Affine3A,
}

impl FlagMesh {
    pub fn new(vertices: Vec<Vec3>, triangles: Vec<u32>) -> Self {
        let normals = vertex_normals(&vertices, &triangles);
        Self {
            vertices,
            triangles,
            normals,
            transform: Affine3A::IDENTITY,
        }
    }

    pub fn with_transform(mut self, transform: Affine3A) -> Self {
        self.transform = transform;
        self
    }

    /// A `cols` x `rows` vertex grid in the local XY plane.
    ///
    /// Row 0 is the top edge at `y = 0`; the grid extends toward `+x` and
    /// `-y`. Vertex `(col, row)` has index `row * cols + col`, so the first
    /// vertices encountered at the extreme x values are the top corners.
    pub fn grid(cols: usize, rows: usize, width: f32, height: f32) -> Self {
        let cols = cols.max(2);
        let rows = rows.max(2);
        let dx = width / (cols - 1) as f32;
        let dy = height / (rows - 1) as f32;

        let mut vertices = Vec::with_capacity(cols * rows);
        for row in 0..rows {
            for col in 0..cols {
                vertices.push(Vec3::new(col as f32 * dx, -(row as f32) * dy, 0.0));
            }
        }

        let mut triangles = Vec::with_capacity((cols - 1) * (rows - 1) * 6);
        for row in 0..rows - 1 {
            for col in 0..cols - 1 {
                let tl = (row * cols + col) as u32;
                let tr = tl + 1;
                let bl = tl + cols as u32;
                let br = bl + 1;
                triangles.extend_from_slice(&[tl, bl, tr, tr, bl, br]);
            }
        }

        Self::new(vertices, triangles)
    }

    /// Split every triangle into four through its edge midpoints, `levels` times.
    ///
    /// Midpoints are shared between the two triangles of an edge so the
    /// result stays watertight.
    pub fn subdivide(&self, levels: u32) -> Self {
        let mut vertices = self.vertices.clone();
        let mut triangles = self.triangles.clone();

        for _ in 0..levels {
            let mut midpoints: HashMap<(u32, u32), u32> = HashMap::new();
            let mut next = Vec::with_capacity(triangles.len() * 4);

            let mut midpoint = |i: u32, j: u32, vertices: &mut Vec<Vec3>| -> u32 {
                let key = if i < j { (i, j) } else { (j, i) };
                *midpoints.entry(key).or_insert_with(|| {
                    let mid = (vertices[i as usize] + vertices[j as usize]) * 0.5;
                    vertices.push(mid);
                    (vertices.len() - 1) as u32
                })
            };

            for tri in triangles.chunks_exact(3) {
                let (v0, v1, v2) = (tri[0], tri[1], tri[2]);
                let m01 = midpoint(v0, v1, &mut vertices);
                let m12 = midpoint(v1, v2, &mut vertices);
                let m20 = midpoint(v2, v0, &mut vertices);
                next.extend_from_slice(&[
                    v0, m01, m20, //
                    m01, v1, m12, //
                    m12, v2, m20, //
                    m01, m12, m20,
                ]);
            }
            triangles = next;
        }

        Self::new(vertices, triangles).with_transform(self.transform)
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len() / 3
    }

    /// Vertex positions in world space
    pub fn world_vertices(&self) -> Vec<Vec3> {
        self.vertices
            .iter()
            .map(|&v| self.transform.transform_point3(v))
            .collect()
    }
}

impl MeshHost for FlagMesh {
    fn local_vertices(&self) -> &[Vec3] {
        &self.vertices
    }

    fn triangles(&self) -> &[u32] {
        &self.triangles
    }

    fn transform(&self) -> Affine3A {
        self.transform
    }

    fn update_vertices(&mut self, local: &[Vec3]) {
        self.vertices.clear();
        self.vertices.extend_from_slice(local);
    }

    fn recalculate_normals(&mut self) {
        self.normals = vertex_normals(&self.vertices, &self.triangles);
    }
}
