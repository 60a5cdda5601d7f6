//! Ray intersection routines and ray casts against every collider type.
//!
//! Primitives are solid: a ray starting inside one reports a hit at fraction
//! zero whose normal opposes the ray displacement.

use glam::Vec3;

use super::collector::{Collector, RaycastHit};
use crate::core::bvh::SpatialVisitor;
use crate::core::collider::{Collider, ColliderKey};
use crate::core::compound::CompoundCollider;
use crate::core::convex_hull::ConvexHull;
use crate::core::filter::CollisionFilter;
use crate::core::mesh::{MeshCollider, PrimitiveFlags};
use crate::core::terrain::TerrainCollider;
use crate::core::types::{Aabb, Transform};
use crate::utils::math::{normalize_with_length, safe_reciprocal};

/// Finite ray: `origin + t * displacement` for `t` in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    displacement: Vec3,
    reciprocal_displacement: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, displacement: Vec3) -> Self {
        Self {
            origin,
            displacement,
            reciprocal_displacement: safe_reciprocal(displacement),
        }
    }

    pub fn displacement(&self) -> Vec3 {
        self.displacement
    }

    pub fn set_displacement(&mut self, displacement: Vec3) {
        self.displacement = displacement;
        self.reciprocal_displacement = safe_reciprocal(displacement);
    }

    /// Component-wise reciprocal of the displacement; zero components map to
    /// `sqrt(f32::MAX)`.
    pub fn reciprocal_displacement(&self) -> Vec3 {
        self.reciprocal_displacement
    }

    pub fn point_at(&self, fraction: f32) -> Vec3 {
        self.origin + self.displacement * fraction
    }

    /// Same ray expressed in another space.
    pub fn transformed(&self, to_from_current: &Transform) -> Ray {
        Ray::new(
            to_from_current.transform_point(self.origin),
            to_from_current.transform_vector(self.displacement),
        )
    }

    /// Bounds of the part of the ray up to `max_fraction`.
    pub fn bounds(&self, max_fraction: f32) -> Aabb {
        let reach = self.displacement * max_fraction;
        Aabb::new(
            self.origin + reach.min(Vec3::ZERO),
            self.origin + reach.max(Vec3::ZERO),
        )
    }

    fn hits_bounds(&self, bounds: &Aabb, max_fraction: f32) -> bool {
        bounds.raycast(self.origin, self.reciprocal_displacement, max_fraction)
    }
}

/// Segment from `start` to `end` plus the filter used to cull targets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RaycastInput {
    ray: Ray,
    pub filter: CollisionFilter,
}

impl RaycastInput {
    pub fn new(start: Vec3, end: Vec3) -> Self {
        Self {
            ray: Ray::new(start, end - start),
            filter: CollisionFilter::DEFAULT,
        }
    }

    pub fn with_filter(mut self, filter: CollisionFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn ray(&self) -> &Ray {
        &self.ray
    }

    pub fn start(&self) -> Vec3 {
        self.ray.origin
    }

    pub fn end(&self) -> Vec3 {
        self.ray.origin + self.ray.displacement
    }

    /// Moves the start while keeping the end fixed.
    pub fn set_start(&mut self, start: Vec3) {
        let end = self.end();
        self.ray.origin = start;
        self.ray.set_displacement(end - start);
    }

    pub fn set_end(&mut self, end: Vec3) {
        self.ray.set_displacement(end - self.ray.origin);
    }

    /// The same query expressed in another space.
    pub fn transformed(&self, to_from_current: &Transform) -> Self {
        Self {
            ray: self.ray.transformed(to_from_current),
            filter: self.filter,
        }
    }
}

fn inside_normal(displacement: Vec3) -> Vec3 {
    (-displacement).normalize_or_zero()
}

/// Ray against a solid sphere. Returns the hit fraction and unit normal when
/// the hit is closer than `max_fraction`.
pub fn ray_sphere(
    origin: Vec3,
    displacement: Vec3,
    center: Vec3,
    radius: f32,
    max_fraction: f32,
) -> Option<(f32, Vec3)> {
    let diff = origin - center;
    let a = displacement.dot(displacement);
    let b = 2.0 * displacement.dot(diff);
    let c = diff.dot(diff) - radius * radius;

    if c < 0.0 {
        return Some((0.0, inside_normal(displacement)));
    }

    let discriminant = b * b - 4.0 * a * c;
    if discriminant < 0.0 || a == 0.0 {
        return None;
    }

    let sqrt_discriminant = discriminant.sqrt();
    let inv_denom = 0.5 / a;
    let t_min = ((sqrt_discriminant - b) * inv_denom).min((-sqrt_discriminant - b) * inv_denom);

    if t_min >= 0.0 && t_min < max_fraction {
        let normal = if radius > 0.0 {
            (origin + displacement * t_min - center) / radius
        } else {
            inside_normal(displacement)
        };
        Some((t_min, normal))
    } else {
        None
    }
}

/// Ray against a solid capsule: the side is tested as an infinite cylinder
/// clipped to the segment, then both end caps as spheres.
pub fn ray_capsule(
    origin: Vec3,
    displacement: Vec3,
    vertex0: Vec3,
    vertex1: Vec3,
    radius: f32,
    max_fraction: f32,
) -> Option<(f32, Vec3)> {
    let (axis, axis_length) = normalize_with_length(vertex1 - vertex0);

    let direction_dot_axis = displacement.dot(axis);
    let origin_dot_axis = (origin - vertex0).dot(axis);
    let displacement_2d = displacement - axis * direction_dot_axis;
    let origin_2d = origin - axis * origin_dot_axis;

    if let Some((fraction, normal)) =
        ray_sphere(origin_2d, displacement_2d, vertex0, radius, max_fraction)
    {
        let t = origin_dot_axis + fraction * direction_dot_axis;
        if (0.0..=axis_length).contains(&t) {
            let normal = if fraction == 0.0 {
                inside_normal(displacement)
            } else {
                normal
            };
            return Some((fraction, normal));
        }
    }

    let mut best = None;
    let mut fraction = max_fraction;
    for cap in [vertex0, vertex1] {
        if let Some(hit) = ray_sphere(origin, displacement, cap, radius, fraction) {
            fraction = hit.0;
            best = Some(hit);
        }
    }
    best
}

/// Ray against a two-sided triangle. The returned normal is unnormalized and
/// faces the ray origin.
pub fn ray_triangle(
    origin: Vec3,
    displacement: Vec3,
    a: Vec3,
    b: Vec3,
    c: Vec3,
    max_fraction: f32,
) -> Option<(f32, Vec3)> {
    let ab = b - a;
    let ca = a - c;
    let n = ab.cross(ca);
    let ap = origin - a;
    let end = ap + displacement * max_fraction;

    let d = n.dot(ap);
    let e = n.dot(end);
    if d * e >= 0.0 {
        return None;
    }

    let fraction = max_fraction * d / (d - e);
    let normal = n * d.signum();

    let bc = c - b;
    let o2 = origin + origin;
    let dots = Vec3::new(
        (o2 - (a + b)).dot(ab.cross(displacement)),
        (o2 - (b + c)).dot(bc.cross(displacement)),
        (o2 - (c + a)).dot(ca.cross(displacement)),
    );

    let inside = dots.cmple(Vec3::ZERO).all() || dots.cmpge(Vec3::ZERO).all();
    inside.then_some((fraction, normal))
}

/// Ray against a two-sided planar quad `a b c d`.
pub fn ray_quad(
    origin: Vec3,
    displacement: Vec3,
    [a, b, c, d]: [Vec3; 4],
    max_fraction: f32,
) -> Option<(f32, Vec3)> {
    let ab = b - a;
    let ca = a - c;
    let n = ab.cross(ca);
    let ap = origin - a;
    let end = ap + displacement * max_fraction;

    let n_dot_ap = n.dot(ap);
    let e = n.dot(end);
    if n_dot_ap * e >= 0.0 {
        return None;
    }

    let fraction = max_fraction * n_dot_ap / (n_dot_ap - e);
    let normal = n * n_dot_ap.signum();

    let o2 = origin + origin;
    let edges = [(a, b), (b, c), (c, d), (d, a)];
    let dots = edges.map(|(p, q)| (o2 - (p + q)).dot((q - p).cross(displacement)));

    let inside = dots.iter().all(|&x| x <= 0.0) || dots.iter().all(|&x| x >= 0.0);
    inside.then_some((fraction, normal))
}

/// Slab test of a ray against the face planes of `hull`, each pushed out by
/// the hull's convex radius.
pub fn ray_convex(
    origin: Vec3,
    displacement: Vec3,
    hull: &ConvexHull,
    max_fraction: f32,
) -> Option<(f32, Vec3)> {
    let convex_radius = hull.convex_radius;
    let mut frac_enter = -1.0f32;
    let mut frac_exit = 2.0f32;
    let start = origin;
    let end = start + displacement * max_fraction;
    let mut normal = Vec3::X;

    for plane in &hull.face_planes {
        let start_distance = plane.signed_distance(start) - convex_radius;
        let end_distance = plane.signed_distance(end) - convex_radius;
        let new_fraction = start_distance / (start_distance - end_distance);
        let start_inside = start_distance < 0.0;
        let end_inside = end_distance < 0.0;

        if !(start_inside || end_inside) {
            return None;
        }

        if !start_inside && new_fraction > frac_enter {
            frac_enter = new_fraction;
            normal = plane.normal;
        }
        if !end_inside && new_fraction < frac_exit {
            frac_exit = new_fraction;
        }
    }

    if frac_enter < 0.0 {
        return Some((0.0, inside_normal(displacement)));
    }
    (frac_enter < frac_exit).then_some((max_fraction * frac_enter, normal))
}

/// Casts `input` (in collider space) against `collider`. Returns whether the
/// collector accepted at least one hit.
pub fn cast_ray<C: Collector<RaycastHit>>(
    collider: &Collider,
    input: &RaycastInput,
    collector: &mut C,
) -> bool {
    if !CollisionFilter::is_collision_enabled(&input.filter, &collider.filter()) {
        return false;
    }

    let origin = input.ray.origin;
    let displacement = input.ray.displacement;
    let max_fraction = collector.max_fraction();
    let hit = match collider {
        Collider::Sphere(s) => ray_sphere(origin, displacement, s.center(), s.radius(), max_fraction),
        Collider::Capsule(c) => ray_capsule(
            origin,
            displacement,
            c.vertex0(),
            c.vertex1(),
            c.radius(),
            max_fraction,
        ),
        Collider::Triangle(p) => {
            let v = p.vertices();
            ray_triangle(origin, displacement, v[0], v[1], v[2], max_fraction)
                .map(|(f, n)| (f, n.normalize_or_zero()))
        }
        Collider::Quad(p) => {
            let v = p.vertices();
            ray_quad(origin, displacement, [v[0], v[1], v[2], v[3]], max_fraction)
                .map(|(f, n)| (f, n.normalize_or_zero()))
        }
        Collider::Box(b) => ray_convex(origin, displacement, &b.hull, max_fraction),
        Collider::Cylinder(c) => ray_convex(origin, displacement, &c.hull, max_fraction),
        Collider::Compound(c) => return ray_compound(input, c, collector),
        Collider::Mesh(m) => return ray_mesh(input, m, collector),
        Collider::Terrain(t) => return ray_terrain(input, t, collector),
    };

    match hit {
        Some((fraction, surface_normal)) => collector.add_hit(RaycastHit {
            fraction,
            position: input.ray.point_at(fraction),
            surface_normal,
            rigid_body_index: None,
            collider_key: ColliderKey::EMPTY,
            material: collider.material(),
        }),
        None => false,
    }
}

struct CompoundRay<'a, C> {
    compound: &'a CompoundCollider,
    input: &'a RaycastInput,
    collector: &'a mut C,
    had_hit: bool,
}

impl<C: Collector<RaycastHit>> SpatialVisitor for CompoundRay<'_, C> {
    fn accept_bounds(&mut self, bounds: &Aabb) -> bool {
        self.input.ray.hits_bounds(bounds, self.collector.max_fraction())
    }

    fn visit_leaf(&mut self, index: usize) -> bool {
        let child = &self.compound.children()[index];
        if !CollisionFilter::is_collision_enabled(&self.input.filter, &child.collider.filter()) {
            return true;
        }

        let compound_from_child = child.compound_from_child;
        let local = self.input.transformed(&compound_from_child.inverse());
        let num_hits = self.collector.num_hits();
        let fraction = self.collector.max_fraction();

        if cast_ray(&child.collider, &local, self.collector) {
            self.collector.transform_new_hits(
                num_hits,
                fraction,
                &compound_from_child,
                self.compound.num_collider_key_bits(),
                index as u32,
            );
            self.had_hit = true;
        }
        !(self.had_hit && self.collector.early_out_on_first_hit())
    }
}

fn ray_compound<C: Collector<RaycastHit>>(
    input: &RaycastInput,
    compound: &CompoundCollider,
    collector: &mut C,
) -> bool {
    let mut visitor = CompoundRay {
        compound,
        input,
        collector,
        had_hit: false,
    };
    compound.bvh().visit(&mut visitor);
    visitor.had_hit
}

struct MeshRay<'a, C> {
    mesh: &'a MeshCollider,
    input: &'a RaycastInput,
    collector: &'a mut C,
    had_hit: bool,
}

impl<C: Collector<RaycastHit>> SpatialVisitor for MeshRay<'_, C> {
    fn accept_bounds(&mut self, bounds: &Aabb) -> bool {
        self.input.ray.hits_bounds(bounds, self.collector.max_fraction())
    }

    fn visit_leaf(&mut self, primitive_index: usize) -> bool {
        let primitive = &self.mesh.primitives()[primitive_index];
        let is_quad = primitive.flags.contains(PrimitiveFlags::IS_QUAD);
        let ray = &self.input.ray;

        for polygon_index in 0..primitive.num_polygons() {
            let max_fraction = self.collector.max_fraction();
            let (v, _) = self.mesh.polygon_vertices(primitive, polygon_index);
            let hit = if is_quad {
                ray_quad(ray.origin, ray.displacement, v, max_fraction)
            } else {
                ray_triangle(ray.origin, ray.displacement, v[0], v[1], v[2], max_fraction)
            };

            if let Some((fraction, normal)) = hit.filter(|(f, _)| *f < max_fraction) {
                let sub_key = ((primitive_index as u32) << 1) | polygon_index as u32;
                self.had_hit |= self.collector.add_hit(RaycastHit {
                    fraction,
                    position: ray.point_at(fraction),
                    surface_normal: normal.normalize_or_zero(),
                    rigid_body_index: None,
                    collider_key: ColliderKey::new(self.mesh.num_collider_key_bits(), sub_key),
                    material: self.mesh.header.material(),
                });
            }
        }
        !(self.had_hit && self.collector.early_out_on_first_hit())
    }
}

fn ray_mesh<C: Collector<RaycastHit>>(
    input: &RaycastInput,
    mesh: &MeshCollider,
    collector: &mut C,
) -> bool {
    let mut visitor = MeshRay {
        mesh,
        input,
        collector,
        had_hit: false,
    };
    mesh.primitive_bvh().visit(&mut visitor);
    visitor.had_hit
}

struct TerrainRay<'a, C> {
    terrain: &'a TerrainCollider,
    input: &'a RaycastInput,
    collector: &'a mut C,
    had_hit: bool,
}

impl<C: Collector<RaycastHit>> SpatialVisitor for TerrainRay<'_, C> {
    fn accept_bounds(&mut self, bounds: &Aabb) -> bool {
        self.input.ray.hits_bounds(bounds, self.collector.max_fraction())
    }

    fn visit_leaf(&mut self, quad: usize) -> bool {
        let [x, z] = self.terrain.quad_coords(quad);
        let ray = &self.input.ray;
        for (index, [a, b, c]) in self.terrain.quad_triangles(x, z).into_iter().enumerate() {
            let max_fraction = self.collector.max_fraction();
            let hit = ray_triangle(ray.origin, ray.displacement, a, b, c, max_fraction)
                .filter(|(f, _)| *f < max_fraction);
            if let Some((fraction, normal)) = hit {
                let sub_key = ((quad as u32) << 1) | index as u32;
                self.had_hit |= self.collector.add_hit(RaycastHit {
                    fraction,
                    position: ray.point_at(fraction),
                    surface_normal: normal.normalize_or_zero(),
                    rigid_body_index: None,
                    collider_key: ColliderKey::new(self.terrain.num_collider_key_bits(), sub_key),
                    material: self.terrain.header.material(),
                });
                if self.had_hit && self.collector.early_out_on_first_hit() {
                    return false;
                }
            }
        }
        true
    }
}

fn ray_terrain<C: Collector<RaycastHit>>(
    input: &RaycastInput,
    terrain: &TerrainCollider,
    collector: &mut C,
) -> bool {
    let mut visitor = TerrainRay {
        terrain,
        input,
        collector,
        had_hit: false,
    };
    terrain.walk(&mut visitor);
    visitor.had_hit
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn sphere_hit_from_outside() {
        let (fraction, normal) =
            ray_sphere(Vec3::new(0.0, 0.0, -5.0), Vec3::new(0.0, 0.0, 10.0), Vec3::ZERO, 1.0, 1.0)
                .unwrap();
        assert_relative_eq!(fraction, 0.4, epsilon = 1e-6);
        assert_relative_eq!(normal.z, -1.0, epsilon = 1e-6);
    }

    #[test]
    fn sphere_inside_hit_reports_zero_fraction() {
        let (fraction, normal) = ray_sphere(Vec3::ZERO, Vec3::X, Vec3::ZERO, 1.0, 1.0).unwrap();
        assert_eq!(fraction, 0.0);
        assert_eq!(normal, -Vec3::X);
    }

    #[test]
    fn sphere_miss_beyond_max_fraction() {
        let hit = ray_sphere(Vec3::new(0.0, 0.0, -5.0), Vec3::new(0.0, 0.0, 10.0), Vec3::ZERO, 1.0, 0.3);
        assert!(hit.is_none());
    }

    #[test]
    fn zero_length_ray_outside_misses() {
        assert!(ray_sphere(Vec3::splat(3.0), Vec3::ZERO, Vec3::ZERO, 1.0, 1.0).is_none());
        let ray = Ray::new(Vec3::ZERO, Vec3::ZERO);
        assert_eq!(ray.reciprocal_displacement(), Vec3::splat(f32::MAX.sqrt()));
    }

    #[test]
    fn capsule_side_and_cap_hits() {
        let v0 = Vec3::new(0.0, -1.0, 0.0);
        let v1 = Vec3::new(0.0, 1.0, 0.0);
        let (fraction, normal) =
            ray_capsule(Vec3::new(-2.0, 0.5, 0.0), Vec3::new(4.0, 0.0, 0.0), v0, v1, 0.5, 1.0).unwrap();
        assert_relative_eq!(fraction, 1.5 / 4.0, epsilon = 1e-6);
        assert_relative_eq!(normal.x, -1.0, epsilon = 1e-6);

        let (fraction, normal) =
            ray_capsule(Vec3::new(0.0, 3.0, 0.0), Vec3::new(0.0, -4.0, 0.0), v0, v1, 0.5, 1.0).unwrap();
        assert_relative_eq!(fraction, 1.5 / 4.0, epsilon = 1e-6);
        assert_relative_eq!(normal.y, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn triangle_is_two_sided() {
        let (a, b, c) = (Vec3::ZERO, Vec3::X, Vec3::Z);
        let down = ray_triangle(Vec3::new(0.2, 1.0, 0.2), Vec3::new(0.0, -2.0, 0.0), a, b, c, 1.0);
        let up = ray_triangle(Vec3::new(0.2, -1.0, 0.2), Vec3::new(0.0, 2.0, 0.0), a, b, c, 1.0);
        let (fd, nd) = down.unwrap();
        let (fu, nu) = up.unwrap();
        assert_relative_eq!(fd, 0.5);
        assert_relative_eq!(fu, 0.5);
        assert!(nd.y > 0.0 && nu.y < 0.0);

        let outside = ray_triangle(Vec3::new(0.8, 1.0, 0.8), Vec3::new(0.0, -2.0, 0.0), a, b, c, 1.0);
        assert!(outside.is_none());
    }

    #[test]
    fn quad_hit_inside_and_miss_outside() {
        let quad = [Vec3::ZERO, Vec3::Z, Vec3::new(1.0, 0.0, 1.0), Vec3::X];
        let hit = ray_quad(Vec3::new(0.9, 1.0, 0.9), Vec3::new(0.0, -2.0, 0.0), quad, 1.0);
        assert_relative_eq!(hit.unwrap().0, 0.5);
        let miss = ray_quad(Vec3::new(1.1, 1.0, 0.5), Vec3::new(0.0, -2.0, 0.0), quad, 1.0);
        assert!(miss.is_none());
    }
}
