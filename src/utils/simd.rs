//! SIMD-friendly helpers for hot vertex loops.
//!
//! Support mapping and axis projection run over every hull vertex for every
//! query; routing the dot products through `Vec3A` lets `glam` use its SIMD
//! backend.

use glam::{Vec3, Vec3A};

/// Index and value of the vertex with the largest dot product against
/// `direction`. Ties keep the lowest index.
pub fn max_dot_index(vertices: &[Vec3], direction: Vec3) -> Option<(usize, f32)> {
    let dir = Vec3A::from(direction);
    let mut best = None;
    let mut max_value = f32::NEG_INFINITY;

    for (index, vertex) in vertices.iter().enumerate() {
        let dot = Vec3A::from(*vertex).dot(dir);
        if dot > max_value {
            max_value = dot;
            best = Some(index);
        }
    }

    best.map(|index| (index, max_value))
}

/// Projects all vertices onto `axis` and returns the `(min, max)` interval.
pub fn project_interval(vertices: &[Vec3], axis: Vec3) -> (f32, f32) {
    let axis = Vec3A::from(axis);
    vertices
        .iter()
        .map(|v| Vec3A::from(*v).dot(axis))
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), d| {
            (lo.min(d), hi.max(d))
        })
}

/// Computes the maximum distance of the provided points from `origin`.
pub fn max_distance_from(vertices: &[Vec3], origin: Vec3) -> f32 {
    let origin = Vec3A::from(origin);
    vertices
        .iter()
        .map(|v| (Vec3A::from(*v) - origin).length_squared())
        .fold(0.0f32, f32::max)
        .sqrt()
}
