//! Polygon and segment clipping against half-spaces.
//!
//! A point is kept when its signed distance to every plane is at most zero.

use glam::Vec3;

use crate::core::types::Plane;

const EPSILON: f32 = 1e-5;

/// Clips a convex polygon against `planes` (Sutherland-Hodgman).
pub fn clip_polygon(vertices: &[Vec3], planes: &[Plane]) -> Vec<Vec3> {
    let mut output = vertices.to_vec();
    let mut scratch = Vec::with_capacity(vertices.len() + planes.len());
    for plane in planes {
        if output.is_empty() {
            break;
        }
        clip_against_plane(&output, plane, &mut scratch);
        std::mem::swap(&mut output, &mut scratch);
    }
    output
}

fn clip_against_plane(vertices: &[Vec3], plane: &Plane, clipped: &mut Vec<Vec3>) {
    clipped.clear();
    if vertices.len() == 1 {
        if plane.signed_distance(vertices[0]) <= EPSILON {
            clipped.push(vertices[0]);
        }
        return;
    }

    let mut current = vertices[vertices.len() - 1];
    let mut current_dist = plane.signed_distance(current);
    for &next in vertices {
        let next_dist = plane.signed_distance(next);
        let current_inside = current_dist <= EPSILON;
        let next_inside = next_dist <= EPSILON;

        if current_inside != next_inside {
            if let Some(intersection) = intersect(current, next, current_dist, next_dist) {
                clipped.push(intersection);
            }
        }
        if next_inside {
            clipped.push(next);
        }

        current = next;
        current_dist = next_dist;
    }
}

fn intersect(start: Vec3, end: Vec3, start_dist: f32, end_dist: f32) -> Option<Vec3> {
    let denom = start_dist - end_dist;
    if denom.abs() <= f32::EPSILON {
        return None;
    }
    Some(start.lerp(end, start_dist / denom))
}

/// Clips the segment `a`-`b` against `planes`, returning what is left.
pub fn clip_segment(a: Vec3, b: Vec3, planes: &[Plane]) -> Option<(Vec3, Vec3)> {
    let mut t_min = 0.0f32;
    let mut t_max = 1.0f32;
    let direction = b - a;
    for plane in planes {
        let dist = plane.signed_distance(a);
        let rate = plane.normal.dot(direction);
        if rate.abs() <= f32::EPSILON {
            if dist > EPSILON {
                return None;
            }
            continue;
        }
        let t = -dist / rate;
        if rate > 0.0 {
            t_max = t_max.min(t);
        } else {
            t_min = t_min.max(t);
        }
        if t_min > t_max {
            return None;
        }
    }
    Some((a + direction * t_min, a + direction * t_max))
}

/// Planes bounding the prism above a convex face loop with outward `normal`.
pub fn face_side_planes(face: &[Vec3], normal: Vec3) -> Vec<Plane> {
    let mut planes = Vec::with_capacity(face.len());
    for (i, &start) in face.iter().enumerate() {
        let end = face[(i + 1) % face.len()];
        let side = (end - start).cross(normal);
        if let Some(side) = side.try_normalize() {
            planes.push(Plane::through(side, start));
        }
    }
    planes
}
