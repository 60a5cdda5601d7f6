use std::f32::consts::FRAC_PI_2;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::types::{Aabb, Plane};
use crate::utils::simd::max_dot_index;

const HALF_ANGLE_COMPRESSION: f32 = 255.0 / FRAC_PI_2;

/// Polygonal face of a hull, indexing into `face_vertex_indices`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Face {
    pub first_index: u16,
    pub num_vertices: u8,
    /// Smallest angle between this face and its neighbours, halved and
    /// quantized to `[0, pi/2]` in 255 steps.
    pub min_half_angle_compressed: u8,
}

impl Face {
    pub fn new(first_index: u16, num_vertices: u8, min_half_angle: f32) -> Self {
        let mut face = Self {
            first_index,
            num_vertices,
            min_half_angle_compressed: 0,
        };
        face.set_min_half_angle(min_half_angle);
        face
    }

    pub fn min_half_angle(&self) -> f32 {
        f32::from(self.min_half_angle_compressed) / HALF_ANGLE_COMPRESSION
    }

    pub fn set_min_half_angle(&mut self, angle: f32) {
        self.min_half_angle_compressed = (angle * HALF_ANGLE_COMPRESSION).clamp(0.0, 255.0) as u8;
    }
}

/// Reference to the `edge_index`-th edge of face `face_index`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub face_index: u16,
    pub edge_index: u8,
}

impl Edge {
    pub const fn new(face_index: u16, edge_index: u8) -> Self {
        Self {
            face_index,
            edge_index,
        }
    }
}

/// Convex polytope core plus a rounding radius.
///
/// Spheres and capsules are hulls of one and two vertices without faces;
/// everything else stores its face planes and face loops. Faces are wound
/// counter-clockwise seen from outside.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConvexHull {
    pub vertices: Vec<Vec3>,
    pub face_planes: Vec<Plane>,
    pub faces: Vec<Face>,
    pub face_vertex_indices: Vec<u8>,
    /// For each vertex, one edge leaving it. Only populated for boxes.
    pub vertex_edges: Vec<Edge>,
    /// For each face edge, the matching edge on the adjacent face. Only
    /// populated for boxes.
    pub face_links: Vec<Edge>,
    pub convex_radius: f32,
}

impl ConvexHull {
    /// Empty hull with room for the given element counts.
    pub fn with_capacity(vertices: usize, faces: usize, indices: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(vertices),
            face_planes: Vec::with_capacity(faces),
            faces: Vec::with_capacity(faces),
            face_vertex_indices: Vec::with_capacity(indices),
            vertex_edges: Vec::new(),
            face_links: Vec::new(),
            convex_radius: 0.0,
        }
    }

    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    pub fn num_faces(&self) -> usize {
        self.faces.len()
    }

    pub fn face_vertex_indices(&self, face_index: usize) -> &[u8] {
        let face = self.faces[face_index];
        let start = usize::from(face.first_index);
        &self.face_vertex_indices[start..start + usize::from(face.num_vertices)]
    }

    pub fn face_vertices(&self, face_index: usize) -> impl Iterator<Item = Vec3> + '_ {
        self.face_vertex_indices(face_index)
            .iter()
            .map(move |&i| self.vertices[usize::from(i)])
    }

    /// Start and end vertex of an edge.
    pub fn edge_vertices(&self, edge: Edge) -> (Vec3, Vec3) {
        let indices = self.face_vertex_indices(usize::from(edge.face_index));
        let i = usize::from(edge.edge_index);
        let j = (i + 1) % indices.len();
        (
            self.vertices[usize::from(indices[i])],
            self.vertices[usize::from(indices[j])],
        )
    }

    /// Index of the vertex furthest along `direction` and its projection.
    pub fn support_index(&self, direction: Vec3) -> (usize, f32) {
        max_dot_index(&self.vertices, direction).unwrap_or((0, 0.0))
    }

    /// Face whose plane normal is most aligned with `direction`.
    pub fn best_face(&self, direction: Vec3) -> Option<usize> {
        let mut best = None;
        let mut best_dot = f32::NEG_INFINITY;
        for (index, plane) in self.face_planes.iter().enumerate() {
            let dot = plane.normal.dot(direction);
            if dot > best_dot {
                best_dot = dot;
                best = Some(index);
            }
        }
        best
    }

    /// Bounds of the core vertices inflated by the convex radius.
    pub fn local_aabb(&self) -> Aabb {
        Aabb::from_points(&self.vertices).expanded(self.convex_radius)
    }
}
