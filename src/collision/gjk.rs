//! Convex-convex distance: GJK on the hull cores, a separating-axis search
//! when the cores overlap, and a closed form for sphere/capsule pairs.

use glam::Vec3;

use crate::core::convex_hull::ConvexHull;
use crate::core::types::Transform;
use crate::utils::math::basis_from_normal;
use crate::utils::simd::project_interval;

/// A hull placed in some common space.
#[derive(Debug, Clone, Copy)]
pub struct ConvexView<'a> {
    pub hull: &'a ConvexHull,
    pub transform: Transform,
}

impl<'a> ConvexView<'a> {
    pub fn new(hull: &'a ConvexHull, transform: Transform) -> Self {
        Self { hull, transform }
    }

    pub fn radius(&self) -> f32 {
        self.hull.convex_radius
    }

    /// Core vertex furthest along `direction` (common space).
    pub fn support(&self, direction: Vec3) -> Vec3 {
        let local = self.transform.inverse_transform_vector(direction);
        let (index, _) = self.hull.support_index(local);
        self.transform.transform_point(self.hull.vertices[index])
    }

    pub fn vertices(&self) -> impl Iterator<Item = Vec3> + '_ {
        self.hull
            .vertices
            .iter()
            .map(move |&v| self.transform.transform_point(v))
    }

    fn world_vertices(&self) -> Vec<Vec3> {
        self.vertices().collect()
    }

    fn is_faceted(&self) -> bool {
        !self.hull.faces.is_empty()
    }
}

/// Closest features of two convex shapes, including their convex radii.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceResult {
    /// Signed surface distance; negative when penetrating.
    pub distance: f32,
    /// Unit direction from B towards A.
    pub normal: Vec3,
    /// Point on A's surface.
    pub position_on_a: Vec3,
}

impl DistanceResult {
    pub fn position_on_b(&self) -> Vec3 {
        self.position_on_a - self.normal * self.distance
    }
}

/// GJK driver and its tolerances.
pub struct GjkAlgorithm;

#[derive(Debug, Clone, Copy)]
struct SupportPoint {
    w: Vec3,
    a: Vec3,
    b: Vec3,
}

#[derive(Debug, Clone, Copy)]
struct Simplex {
    points: [SupportPoint; 4],
    weights: [f32; 4],
    len: usize,
}

enum GjkOutcome {
    Separated { core_a: Vec3, core_b: Vec3 },
    Overlapping,
}

impl GjkAlgorithm {
    const MAX_ITERATIONS: usize = 64;
    const EPSILON: f32 = 1e-6;
    const OVERLAP_EPSILON_SQ: f32 = 1e-10;

    fn support(a: &ConvexView, b: &ConvexView, direction: Vec3) -> SupportPoint {
        let pa = a.support(direction);
        let pb = b.support(-direction);
        SupportPoint { w: pa - pb, a: pa, b: pb }
    }

    fn run(a: &ConvexView, b: &ConvexView) -> GjkOutcome {
        let initial = a.transform.position - b.transform.position;
        let direction = if initial.length_squared() > Self::EPSILON {
            -initial
        } else {
            Vec3::X
        };
        let mut simplex = Simplex::new(Self::support(a, b, direction));
        let mut v = simplex.points[0].w;

        for _ in 0..Self::MAX_ITERATIONS {
            let v_sq = v.length_squared();
            if v_sq < Self::OVERLAP_EPSILON_SQ {
                return GjkOutcome::Overlapping;
            }
            let p = Self::support(a, b, -v);
            if v_sq - v.dot(p.w) <= Self::EPSILON * v_sq.max(1.0) || simplex.contains(p.w) {
                break;
            }
            simplex.push(p);
            match simplex.solve() {
                Some(closest) => v = closest,
                None => return GjkOutcome::Overlapping,
            }
        }

        if v.length_squared() < Self::OVERLAP_EPSILON_SQ {
            return GjkOutcome::Overlapping;
        }
        let (core_a, core_b) = simplex.witnesses();
        GjkOutcome::Separated { core_a, core_b }
    }
}

impl Simplex {
    fn new(point: SupportPoint) -> Self {
        Self {
            points: [point; 4],
            weights: [1.0, 0.0, 0.0, 0.0],
            len: 1,
        }
    }

    fn contains(&self, w: Vec3) -> bool {
        self.points[..self.len]
            .iter()
            .any(|p| p.w.distance_squared(w) < 1e-12)
    }

    fn push(&mut self, point: SupportPoint) {
        self.points[self.len] = point;
        self.len += 1;
    }

    fn witnesses(&self) -> (Vec3, Vec3) {
        let mut a = Vec3::ZERO;
        let mut b = Vec3::ZERO;
        for (p, &weight) in self.points[..self.len].iter().zip(&self.weights) {
            a += p.a * weight;
            b += p.b * weight;
        }
        (a, b)
    }

    /// Replaces the simplex by the smallest sub-simplex supporting the point
    /// closest to the origin, and returns that point. `None` means the
    /// origin is enclosed.
    fn solve(&mut self) -> Option<Vec3> {
        let (closest, kept) = match self.len {
            2 => {
                let (p, w) = closest_on_segment(self.points[0].w, self.points[1].w);
                (p, vec![(0, w[0]), (1, w[1])])
            }
            3 => {
                let (p, w) =
                    closest_on_triangle(self.points[0].w, self.points[1].w, self.points[2].w);
                (p, vec![(0, w[0]), (1, w[1]), (2, w[2])])
            }
            4 => self.solve_tetrahedron()?,
            _ => (self.points[0].w, vec![(0, 1.0)]),
        };

        let mut points = self.points;
        let mut weights = [0.0; 4];
        let mut len = 0;
        for (index, weight) in kept {
            if weight > 0.0 {
                points[len] = self.points[index];
                weights[len] = weight;
                len += 1;
            }
        }
        if len == 0 {
            len = 1;
            weights[0] = 1.0;
        }
        self.points = points;
        self.weights = weights;
        self.len = len;
        Some(closest)
    }

    #[allow(clippy::type_complexity)]
    fn solve_tetrahedron(&self) -> Option<(Vec3, Vec<(usize, f32)>)> {
        const FACES: [([usize; 3], usize); 4] =
            [([0, 1, 2], 3), ([0, 2, 3], 1), ([0, 3, 1], 2), ([1, 3, 2], 0)];
        let w = |i: usize| self.points[i].w;

        let mut best: Option<(Vec3, Vec<(usize, f32)>)> = None;
        for ([i, j, k], opposite) in FACES {
            let n = (w(j) - w(i)).cross(w(k) - w(i));
            let sign_origin = (-w(i)).dot(n);
            let sign_opposite = (w(opposite) - w(i)).dot(n);
            let outside = sign_origin * sign_opposite < 0.0 || sign_opposite.abs() < 1e-12;
            if !outside {
                continue;
            }
            let (p, bary) = closest_on_triangle(w(i), w(j), w(k));
            if best
                .as_ref()
                .map_or(true, |(q, _)| p.length_squared() < q.length_squared())
            {
                best = Some((p, vec![(i, bary[0]), (j, bary[1]), (k, bary[2])]));
            }
        }
        best
    }
}

fn closest_on_segment(a: Vec3, b: Vec3) -> (Vec3, [f32; 2]) {
    let ab = b - a;
    let denom = ab.length_squared();
    if denom <= f32::EPSILON {
        return (a, [1.0, 0.0]);
    }
    let t = ((-a).dot(ab) / denom).clamp(0.0, 1.0);
    (a + ab * t, [1.0 - t, t])
}

/// Point of triangle `abc` closest to the origin, with barycentric weights.
fn closest_on_triangle(a: Vec3, b: Vec3, c: Vec3) -> (Vec3, [f32; 3]) {
    let ab = b - a;
    let ac = c - a;

    let ap = -a;
    let d1 = ab.dot(ap);
    let d2 = ac.dot(ap);
    if d1 <= 0.0 && d2 <= 0.0 {
        return (a, [1.0, 0.0, 0.0]);
    }

    let bp = -b;
    let d3 = ab.dot(bp);
    let d4 = ac.dot(bp);
    if d3 >= 0.0 && d4 <= d3 {
        return (b, [0.0, 1.0, 0.0]);
    }

    let vc = d1 * d4 - d3 * d2;
    if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
        let v = d1 / (d1 - d3);
        return (a + ab * v, [1.0 - v, v, 0.0]);
    }

    let cp = -c;
    let d5 = ab.dot(cp);
    let d6 = ac.dot(cp);
    if d6 >= 0.0 && d5 <= d6 {
        return (c, [0.0, 0.0, 1.0]);
    }

    let vb = d5 * d2 - d1 * d6;
    if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
        let w = d2 / (d2 - d6);
        return (a + ac * w, [1.0 - w, 0.0, w]);
    }

    let va = d3 * d6 - d5 * d4;
    if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
        let w = (d4 - d3) / ((d4 - d3) + (d5 - d6));
        return (b + (c - b) * w, [0.0, 1.0 - w, w]);
    }

    let sum = va + vb + vc;
    if sum.abs() <= f32::EPSILON {
        // Collinear: fall back to the closest edge.
        let candidates = [
            (closest_on_segment(a, b), [0usize, 1]),
            (closest_on_segment(b, c), [1, 2]),
            (closest_on_segment(a, c), [0, 2]),
        ];
        let mut best = (a, [1.0, 0.0, 0.0]);
        let mut best_sq = f32::INFINITY;
        for ((p, w), [i, j]) in candidates {
            if p.length_squared() < best_sq {
                best_sq = p.length_squared();
                let mut bary = [0.0; 3];
                bary[i] = w[0];
                bary[j] = w[1];
                best = (p, bary);
            }
        }
        return best;
    }
    let denom = 1.0 / sum;
    let v = vb * denom;
    let w = vc * denom;
    (a + ab * v + ac * w, [1.0 - v - w, v, w])
}

/// Closest points between segments `p1 q1` and `p2 q2`.
pub fn closest_points_segment_segment(p1: Vec3, q1: Vec3, p2: Vec3, q2: Vec3) -> (Vec3, Vec3) {
    let d1 = q1 - p1;
    let d2 = q2 - p2;
    let r = p1 - p2;
    let a = d1.length_squared();
    let e = d2.length_squared();
    let f = d2.dot(r);

    let (s, t) = if a <= f32::EPSILON && e <= f32::EPSILON {
        (0.0, 0.0)
    } else if a <= f32::EPSILON {
        (0.0, (f / e).clamp(0.0, 1.0))
    } else {
        let c = d1.dot(r);
        if e <= f32::EPSILON {
            ((-c / a).clamp(0.0, 1.0), 0.0)
        } else {
            let b = d1.dot(d2);
            let denom = a * e - b * b;
            let mut s = if denom > f32::EPSILON {
                ((b * f - c * e) / denom).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let mut t = (b * s + f) / e;
            if t < 0.0 {
                t = 0.0;
                s = (-c / a).clamp(0.0, 1.0);
            } else if t > 1.0 {
                t = 1.0;
                s = ((b - c) / a).clamp(0.0, 1.0);
            }
            (s, t)
        }
    };
    (p1 + d1 * s, p2 + d2 * t)
}

fn segment_of(view: &ConvexView) -> (Vec3, Vec3) {
    let vertices = &view.hull.vertices;
    let p = view.transform.transform_point(vertices[0]);
    let q = view.transform.transform_point(vertices[vertices.len() - 1]);
    (p, q)
}

fn fallback_normal(a: &ConvexView, b: &ConvexView) -> Vec3 {
    let (pa, qa) = segment_of(a);
    let (pb, qb) = segment_of(b);
    let (da, db) = (qa - pa, qb - pb);
    let cross = da.cross(db);
    if cross.length_squared() > GjkAlgorithm::EPSILON {
        return cross.normalize();
    }
    let axis = if da.length_squared() > GjkAlgorithm::EPSILON { da } else { db };
    if axis.length_squared() > GjkAlgorithm::EPSILON {
        basis_from_normal(axis.normalize()).0
    } else {
        Vec3::Y
    }
}

fn rounded_result(a: &ConvexView, b: &ConvexView, core_a: Vec3, core_b: Vec3) -> DistanceResult {
    let delta = core_a - core_b;
    let core_distance = delta.length();
    let normal = if core_distance > GjkAlgorithm::EPSILON {
        delta / core_distance
    } else {
        fallback_normal(a, b)
    };
    DistanceResult {
        distance: core_distance - a.radius() - b.radius(),
        normal,
        position_on_a: core_a - normal * a.radius(),
    }
}

fn edge_directions(view: &ConvexView, out: &mut Vec<Vec3>) {
    let hull = view.hull;
    let mut push = |d: Vec3| {
        let d = view.transform.transform_vector(d).normalize_or_zero();
        if d != Vec3::ZERO && !out.iter().any(|e| e.dot(d).abs() > 0.9999) {
            out.push(d);
        }
    };
    if hull.faces.is_empty() {
        if hull.vertices.len() == 2 {
            push(hull.vertices[1] - hull.vertices[0]);
        }
        return;
    }
    for face_index in 0..hull.num_faces() {
        let indices = hull.face_vertex_indices(face_index);
        for (i, &from) in indices.iter().enumerate() {
            let to = indices[(i + 1) % indices.len()];
            push(hull.vertices[to as usize] - hull.vertices[from as usize]);
        }
    }
}

/// Separating-axis search over face normals and edge-edge crosses of the two
/// cores. Returns the axis of greatest separation (from B to A) and that
/// separation, which is negative while the cores overlap.
pub fn separating_axis(a: &ConvexView, b: &ConvexView) -> (Vec3, f32) {
    let verts_a = a.world_vertices();
    let verts_b = b.world_vertices();

    let mut best_axis = Vec3::Y;
    let mut best = f32::NEG_INFINITY;
    let mut test = |axis: Vec3| {
        let (min_a, max_a) = project_interval(&verts_a, axis);
        let (min_b, max_b) = project_interval(&verts_b, axis);
        let forward = min_a - max_b;
        let backward = min_b - max_a;
        if forward > best {
            best = forward;
            best_axis = axis;
        }
        if backward > best {
            best = backward;
            best_axis = -axis;
        }
    };

    for plane in &a.hull.face_planes {
        test(a.transform.transform_vector(plane.normal));
    }
    for plane in &b.hull.face_planes {
        test(b.transform.transform_vector(plane.normal));
    }

    let mut edges_a = Vec::new();
    let mut edges_b = Vec::new();
    edge_directions(a, &mut edges_a);
    edge_directions(b, &mut edges_b);
    for ea in &edges_a {
        for eb in &edges_b {
            let axis = ea.cross(*eb);
            if axis.length_squared() > 1e-6 {
                test(axis.normalize());
            }
        }
    }

    (best_axis, best)
}

/// Signed distance between two convex shapes, both given in the same space.
pub fn convex_distance(a: &ConvexView, b: &ConvexView) -> DistanceResult {
    if !a.is_faceted() && !b.is_faceted() && a.hull.vertices.len() <= 2 && b.hull.vertices.len() <= 2 {
        let (pa, qa) = segment_of(a);
        let (pb, qb) = segment_of(b);
        let (core_a, core_b) = closest_points_segment_segment(pa, qa, pb, qb);
        return rounded_result(a, b, core_a, core_b);
    }

    match GjkAlgorithm::run(a, b) {
        GjkOutcome::Separated { core_a, core_b } => rounded_result(a, b, core_a, core_b),
        GjkOutcome::Overlapping => {
            let (normal, separation) = separating_axis(a, b);
            DistanceResult {
                distance: separation - a.radius() - b.radius(),
                normal,
                position_on_a: a.support(-normal) - normal * a.radius(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::convex_hull::Face;
    use crate::core::types::Plane;
    use approx::assert_relative_eq;
    use glam::Quat;

    fn cube(half: f32) -> ConvexHull {
        let mut hull = ConvexHull::with_capacity(8, 6, 24);
        for z in [half, -half] {
            for y in [half, -half] {
                for x in [half, -half] {
                    hull.vertices.push(Vec3::new(x, y, z));
                }
            }
        }
        let faces: [(Vec3, [u8; 4]); 6] = [
            (Vec3::X, [0, 4, 6, 2]),
            (-Vec3::X, [1, 3, 7, 5]),
            (Vec3::Y, [0, 1, 5, 4]),
            (-Vec3::Y, [2, 6, 7, 3]),
            (Vec3::Z, [0, 2, 3, 1]),
            (-Vec3::Z, [4, 5, 7, 6]),
        ];
        for (i, (normal, indices)) in faces.iter().enumerate() {
            hull.face_planes.push(Plane::new(*normal, -half));
            hull.faces.push(Face::new((i * 4) as u16, 4, std::f32::consts::FRAC_PI_4));
            hull.face_vertex_indices.extend_from_slice(indices);
        }
        hull
    }

    fn sphere(radius: f32) -> ConvexHull {
        let mut hull = ConvexHull::with_capacity(1, 0, 0);
        hull.vertices.push(Vec3::ZERO);
        hull.convex_radius = radius;
        hull
    }

    #[test]
    fn separated_cubes() {
        let hull = cube(0.5);
        let a = ConvexView::new(&hull, Transform::from_position(Vec3::new(1.5, 0.0, 0.0)));
        let b = ConvexView::new(&hull, Transform::IDENTITY);
        let result = convex_distance(&a, &b);
        assert_relative_eq!(result.distance, 0.5, epsilon = 1e-5);
        assert_relative_eq!(result.normal.x, 1.0, epsilon = 1e-5);
        assert_relative_eq!(result.position_on_b().x, 0.5, epsilon = 1e-5);
    }

    #[test]
    fn penetrating_cubes_use_separating_axis() {
        let hull = cube(0.5);
        let a = ConvexView::new(&hull, Transform::from_position(Vec3::new(0.0, 0.9, 0.0)));
        let b = ConvexView::new(&hull, Transform::IDENTITY);
        let result = convex_distance(&a, &b);
        assert_relative_eq!(result.distance, -0.1, epsilon = 1e-5);
        assert_relative_eq!(result.normal.y, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn rotated_cube_against_sphere() {
        let hull = cube(0.5);
        let ball = sphere(0.25);
        let a = ConvexView::new(&ball, Transform::from_position(Vec3::new(0.0, 2.0, 0.0)));
        let b = ConvexView::new(&hull, Transform::new(Quat::from_rotation_z(0.25 * std::f32::consts::PI), Vec3::ZERO));
        let result = convex_distance(&a, &b);
        let corner = 0.5 * std::f32::consts::SQRT_2;
        assert_relative_eq!(result.distance, 2.0 - corner - 0.25, epsilon = 1e-4);
        assert_relative_eq!(result.normal.y, 1.0, epsilon = 1e-4);
    }

    #[test]
    fn sphere_pair_closed_form() {
        let ball = sphere(1.0);
        let a = ConvexView::new(&ball, Transform::from_position(Vec3::new(1.5, 0.0, 0.0)));
        let b = ConvexView::new(&ball, Transform::IDENTITY);
        let result = convex_distance(&a, &b);
        assert_relative_eq!(result.distance, -0.5, epsilon = 1e-6);
        assert_relative_eq!(result.normal.x, 1.0, epsilon = 1e-6);
        assert_relative_eq!(result.position_on_a.x, 0.5, epsilon = 1e-6);
    }

    #[test]
    fn crossing_segments() {
        let (a, b) = closest_points_segment_segment(
            Vec3::new(-1.0, 1.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(0.0, 0.0, -1.0),
            Vec3::new(0.0, 0.0, 1.0),
        );
        assert_relative_eq!(a.distance(b), 1.0, epsilon = 1e-6);
    }
}
