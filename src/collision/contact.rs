//! Contact manifold generation between two bodies.

use bitflags::bitflags;
use glam::Vec3;
use log::trace;
use serde::{Deserialize, Serialize};

use super::clipping::{clip_polygon, clip_segment, face_side_planes};
use super::gjk::{convex_distance, ConvexView};
use crate::core::collider::{Collider, ColliderKey, ColliderKeyPath};
use crate::core::constraints::BodyIndexPair;
use crate::core::convex_hull::ConvexHull;
use crate::core::filter::CollisionFilter;
use crate::core::rigidbody::{MotionVelocity, RigidBody};
use crate::core::types::{Material, MaterialFlags, Transform};

/// Most points kept per manifold.
pub const MAX_CONTACT_POINTS: usize = 4;

/// Reference faces less aligned than this with the separating normal fall
/// back to a single contact.
const FACE_ALIGNMENT: f32 = 0.95;

bitflags! {
    /// How the solver and event collection treat a manifold.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct ContactFlags: u8 {
        const IS_TRIGGER = 1 << 0;
        const ENABLE_COLLISION_EVENTS = 1 << 1;
    }
}

/// A point on body B's surface with the signed distance to body A along the
/// manifold normal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContactPoint {
    pub position: Vec3,
    pub distance: f32,
}

/// Contacts between one leaf of body A and one leaf of body B, in world
/// space. `normal` points from B towards A.
#[derive(Debug, Clone, PartialEq)]
pub struct ContactManifold {
    pub body_pair: BodyIndexPair,
    pub normal: Vec3,
    pub points: Vec<ContactPoint>,
    pub collider_key_a: ColliderKey,
    pub collider_key_b: ColliderKey,
    pub friction: f32,
    pub restitution: f32,
    pub flags: ContactFlags,
}

impl ContactManifold {
    pub fn is_trigger(&self) -> bool {
        self.flags.contains(ContactFlags::IS_TRIGGER)
    }

    pub fn raises_collision_events(&self) -> bool {
        self.flags.contains(ContactFlags::ENABLE_COLLISION_EVENTS)
    }

    /// Deepest (smallest) point distance.
    pub fn min_distance(&self) -> f32 {
        self.points
            .iter()
            .map(|p| p.distance)
            .fold(f32::INFINITY, f32::min)
    }

    pub fn average_position(&self) -> Vec3 {
        if self.points.is_empty() {
            return Vec3::ZERO;
        }
        let sum: Vec3 = self.points.iter().map(|p| p.position).sum();
        sum / self.points.len() as f32
    }
}

struct PairContext<'o> {
    body_pair: BodyIndexPair,
    max_distance: f32,
    out: &'o mut Vec<ContactManifold>,
}

#[derive(Clone, Copy)]
struct Side<'c> {
    collider: &'c Collider,
    world_from_collider: Transform,
    key: ColliderKeyPath,
}

/// Entry points producing contact manifolds for body pairs.
pub struct ManifoldQueries;

impl ManifoldQueries {
    /// Appends manifolds for every pair of leaves of `body_a` and `body_b`
    /// closer than `collision_tolerance` plus the distance the bodies can
    /// travel towards each other during `time_step`.
    #[allow(clippy::too_many_arguments)]
    pub fn body_body(
        body_a: &RigidBody,
        body_b: &RigidBody,
        velocity_a: &MotionVelocity,
        velocity_b: &MotionVelocity,
        collision_tolerance: f32,
        time_step: f32,
        body_pair: BodyIndexPair,
        out: &mut Vec<ContactManifold>,
    ) {
        let (Some(collider_a), Some(collider_b)) = (&body_a.collider, &body_b.collider) else {
            return;
        };

        let max_distance = collision_tolerance
            + velocity_a.calculate_expansion(time_step).max_distance()
            + velocity_b.calculate_expansion(time_step).max_distance();

        let before = out.len();
        let mut context = PairContext {
            body_pair,
            max_distance,
            out,
        };
        collide(
            &mut context,
            Side {
                collider: collider_a,
                world_from_collider: body_a.world_from_body,
                key: ColliderKeyPath::default(),
            },
            Side {
                collider: collider_b,
                world_from_collider: body_b.world_from_body,
                key: ColliderKeyPath::default(),
            },
        );
        trace!(
            "bodies ({}, {}): {} manifolds",
            body_pair.body_a,
            body_pair.body_b,
            context.out.len() - before
        );
    }
}

fn collide(context: &mut PairContext<'_>, a: Side<'_>, b: Side<'_>) {
    if !CollisionFilter::is_collision_enabled(&a.collider.filter(), &b.collider.filter()) {
        return;
    }

    if !a.collider.is_convex() {
        let a_from_b = a.world_from_collider.inverse_combine(&b.world_from_collider);
        let bounds = b.collider.calculate_aabb(&a_from_b).expanded(context.max_distance);
        a.collider.visit_leaves(&bounds, &mut |leaf| {
            collide(
                context,
                Side {
                    collider: &*leaf.collider,
                    world_from_collider: a.world_from_collider.combine(&leaf.parent_from_leaf),
                    key: a.key.push_child(leaf.num_key_bits, leaf.sub_key),
                },
                b,
            );
            true
        });
        return;
    }

    if !b.collider.is_convex() {
        let b_from_a = b.world_from_collider.inverse_combine(&a.world_from_collider);
        let bounds = a.collider.calculate_aabb(&b_from_a).expanded(context.max_distance);
        b.collider.visit_leaves(&bounds, &mut |leaf| {
            collide(
                context,
                a,
                Side {
                    collider: &*leaf.collider,
                    world_from_collider: b.world_from_collider.combine(&leaf.parent_from_leaf),
                    key: b.key.push_child(leaf.num_key_bits, leaf.sub_key),
                },
            );
            true
        });
        return;
    }

    let (Some(hull_a), Some(hull_b)) = (a.collider.convex_hull(), b.collider.convex_hull()) else {
        return;
    };
    let b_from_a = b.world_from_collider.inverse_combine(&a.world_from_collider);
    let Some((normal, points)) = convex_convex(hull_a, &b_from_a, hull_b, context.max_distance)
    else {
        return;
    };

    let material_a = a.collider.material();
    let material_b = b.collider.material();
    let world = &b.world_from_collider;
    context.out.push(ContactManifold {
        body_pair: context.body_pair,
        normal: world.transform_vector(normal),
        points: points
            .into_iter()
            .map(|p| ContactPoint {
                position: world.transform_point(p.position),
                distance: p.distance,
            })
            .collect(),
        collider_key_a: a.key.key(),
        collider_key_b: b.key.key(),
        friction: Material::combine_friction(&material_a, &material_b),
        restitution: Material::combine_restitution(&material_a, &material_b),
        flags: pair_flags(&material_a, &material_b),
    });
}

fn pair_flags(a: &Material, b: &Material) -> ContactFlags {
    let mut flags = ContactFlags::empty();
    if a.is_trigger() || b.is_trigger() {
        flags |= ContactFlags::IS_TRIGGER;
    }
    if (a.flags | b.flags).contains(MaterialFlags::ENABLE_COLLISION_EVENTS) {
        flags |= ContactFlags::ENABLE_COLLISION_EVENTS;
    }
    flags
}

/// Contact normal and points between hull A (placed by `b_from_a`) and hull
/// B, all in B's space. `None` when the hulls are further apart than
/// `max_distance`.
pub fn convex_convex(
    hull_a: &ConvexHull,
    b_from_a: &Transform,
    hull_b: &ConvexHull,
    max_distance: f32,
) -> Option<(Vec3, Vec<ContactPoint>)> {
    let view_a = ConvexView::new(hull_a, *b_from_a);
    let view_b = ConvexView::new(hull_b, Transform::IDENTITY);
    let result = convex_distance(&view_a, &view_b);
    if result.distance >= max_distance {
        return None;
    }

    if let Some(manifold) = clipped_manifold(hull_a, b_from_a, hull_b, result.normal, max_distance) {
        return Some(manifold);
    }

    Some((
        result.normal,
        vec![ContactPoint {
            position: result.position_on_b(),
            distance: result.distance,
        }],
    ))
}

/// Reference face of one hull clipped against the incident feature of the
/// other. `normal` points from B to A.
fn clipped_manifold(
    hull_a: &ConvexHull,
    b_from_a: &Transform,
    hull_b: &ConvexHull,
    normal: Vec3,
    max_distance: f32,
) -> Option<(Vec3, Vec<ContactPoint>)> {
    let radius_a = hull_a.convex_radius;
    let radius_b = hull_b.convex_radius;
    let faceted_a = hull_a.num_faces() > 0;
    let faceted_b = hull_b.num_faces() > 0;
    let segment_a = !faceted_a && hull_a.num_vertices() == 2;
    let segment_b = !faceted_b && hull_b.num_vertices() == 2;

    let face_b = faceted_b.then(|| hull_b.best_face(normal)).flatten();
    let face_a = faceted_a
        .then(|| hull_a.best_face(b_from_a.inverse_transform_vector(-normal)))
        .flatten();
    let alignment_b = face_b.map_or(f32::NEG_INFINITY, |f| hull_b.face_planes[f].normal.dot(normal));
    let alignment_a = face_a.map_or(f32::NEG_INFINITY, |f| {
        -b_from_a.transform_vector(hull_a.face_planes[f].normal).dot(normal)
    });

    let use_b = face_b.is_some() && (faceted_a || segment_a) && alignment_b >= alignment_a;
    let use_a = !use_b && face_a.is_some() && (faceted_b || segment_b);

    if use_b {
        let face = face_b?;
        if alignment_b < FACE_ALIGNMENT {
            return None;
        }
        let reference: Vec<Vec3> = hull_b.face_vertices(face).collect();
        let face_normal = hull_b.face_planes[face].normal;
        let incident: Vec<Vec3> = if segment_a {
            hull_a.vertices.iter().map(|v| b_from_a.transform_point(*v)).collect()
        } else {
            let local_normal = b_from_a.inverse_transform_vector(-face_normal);
            let incident_face = hull_a.best_face(local_normal)?;
            hull_a
                .face_vertices(incident_face)
                .map(|v| b_from_a.transform_point(v))
                .collect()
        };
        let points = clip_incident(&incident, &reference, face_normal)?;
        let contacts = points
            .into_iter()
            .map(|p| {
                let core = (p - reference[0]).dot(face_normal);
                ContactPoint {
                    position: p - face_normal * (core - radius_b),
                    distance: core - radius_a - radius_b,
                }
            })
            .filter(|c| c.distance < max_distance)
            .collect::<Vec<_>>();
        return finish(face_normal, contacts);
    }

    if use_a {
        let face = face_a?;
        if alignment_a < FACE_ALIGNMENT {
            return None;
        }
        let reference: Vec<Vec3> = hull_a
            .face_vertices(face)
            .map(|v| b_from_a.transform_point(v))
            .collect();
        let face_normal = b_from_a.transform_vector(hull_a.face_planes[face].normal);
        let incident: Vec<Vec3> = if segment_b {
            hull_b.vertices.clone()
        } else {
            let incident_face = hull_b.best_face(-face_normal)?;
            hull_b.face_vertices(incident_face).collect()
        };
        let points = clip_incident(&incident, &reference, face_normal)?;
        let manifold_normal = -face_normal;
        let contacts = points
            .into_iter()
            .map(|p| {
                let core = (p - reference[0]).dot(face_normal);
                ContactPoint {
                    position: p + manifold_normal * radius_b,
                    distance: core - radius_a - radius_b,
                }
            })
            .filter(|c| c.distance < max_distance)
            .collect::<Vec<_>>();
        return finish(manifold_normal, contacts);
    }

    None
}

fn clip_incident(incident: &[Vec3], reference: &[Vec3], reference_normal: Vec3) -> Option<Vec<Vec3>> {
    let planes = face_side_planes(reference, reference_normal);
    if incident.len() == 2 {
        let (p, q) = clip_segment(incident[0], incident[1], &planes)?;
        return Some(if p.distance_squared(q) > 1e-10 { vec![p, q] } else { vec![p] });
    }
    let clipped = clip_polygon(incident, &planes);
    (!clipped.is_empty()).then_some(clipped)
}

fn finish(normal: Vec3, contacts: Vec<ContactPoint>) -> Option<(Vec3, Vec<ContactPoint>)> {
    if contacts.is_empty() {
        return None;
    }
    Some((normal, reduce_points(contacts, normal)))
}

/// Keeps at most [`MAX_CONTACT_POINTS`]: the deepest point, the point
/// furthest from it, and the two spanning the largest areas on either side.
pub fn reduce_points(points: Vec<ContactPoint>, normal: Vec3) -> Vec<ContactPoint> {
    if points.len() <= MAX_CONTACT_POINTS {
        return points;
    }

    let deepest = index_of_max(&points, |p| -p.distance);
    let p0 = points[deepest].position;
    let furthest = index_of_max(&points, |p| p.position.distance_squared(p0));
    let p1 = points[furthest].position;
    let signed_area = |p: &ContactPoint| (p1 - p0).cross(p.position - p0).dot(normal);
    let left = index_of_max(&points, signed_area);
    let right = index_of_max(&points, |p| -signed_area(p));

    let mut chosen = vec![deepest];
    for index in [furthest, left, right] {
        if !chosen.contains(&index) {
            chosen.push(index);
        }
    }
    chosen.into_iter().map(|i| points[i]).collect()
}

fn index_of_max(points: &[ContactPoint], key: impl Fn(&ContactPoint) -> f32) -> usize {
    let mut best = 0;
    let mut best_value = f32::NEG_INFINITY;
    for (index, point) in points.iter().enumerate() {
        let value = key(point);
        if value > best_value {
            best_value = value;
            best = index;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geometry::{BoxGeometry, CapsuleGeometry, SphereGeometry};
    use approx::assert_relative_eq;
    use std::sync::Arc;

    fn body(collider: Collider, position: Vec3) -> RigidBody {
        RigidBody::new(Transform::from_position(position), Arc::new(collider))
    }

    fn unit_box() -> Collider {
        Collider::create_box(BoxGeometry::default(), CollisionFilter::DEFAULT, Material::default())
            .unwrap()
    }

    fn manifolds(a: &RigidBody, b: &RigidBody, tolerance: f32) -> Vec<ContactManifold> {
        let mut out = Vec::new();
        ManifoldQueries::body_body(
            a,
            b,
            &MotionVelocity::ZERO,
            &MotionVelocity::ZERO,
            tolerance,
            1.0 / 60.0,
            BodyIndexPair::new(0, 1),
            &mut out,
        );
        out
    }

    #[test]
    fn stacked_boxes_get_four_points() {
        let a = body(unit_box(), Vec3::new(0.0, 0.95, 0.0));
        let b = body(unit_box(), Vec3::ZERO);
        let out = manifolds(&a, &b, 0.1);
        assert_eq!(out.len(), 1);
        let manifold = &out[0];
        assert_relative_eq!(manifold.normal.y, 1.0, epsilon = 1e-4);
        assert_eq!(manifold.points.len(), 4);
        for point in &manifold.points {
            assert_relative_eq!(point.distance, -0.05, epsilon = 1e-4);
            assert_relative_eq!(point.position.y, 0.5, epsilon = 1e-4);
        }
    }

    #[test]
    fn distant_boxes_produce_nothing() {
        let a = body(unit_box(), Vec3::new(0.0, 1.5, 0.0));
        let b = body(unit_box(), Vec3::ZERO);
        assert!(manifolds(&a, &b, 0.1).is_empty());
    }

    #[test]
    fn sphere_on_box_single_point() {
        let sphere = Collider::create_sphere(
            SphereGeometry::new(Vec3::ZERO, 0.5),
            CollisionFilter::DEFAULT,
            Material::default(),
        )
        .unwrap();
        let a = body(sphere, Vec3::new(0.0, 1.02, 0.0));
        let b = body(unit_box(), Vec3::ZERO);
        let out = manifolds(&a, &b, 0.1);
        assert_eq!(out[0].points.len(), 1);
        assert_relative_eq!(out[0].points[0].distance, 0.02, epsilon = 1e-4);
        assert_relative_eq!(out[0].points[0].position.y, 0.5, epsilon = 1e-4);
    }

    #[test]
    fn lying_capsule_gets_two_points() {
        let capsule = Collider::create_capsule(
            CapsuleGeometry::new(Vec3::new(-0.3, 0.0, 0.0), Vec3::new(0.3, 0.0, 0.0), 0.1),
            CollisionFilter::DEFAULT,
            Material::default(),
        )
        .unwrap();
        let a = body(capsule, Vec3::new(0.0, 0.6, 0.0));
        let b = body(unit_box(), Vec3::ZERO);
        let out = manifolds(&a, &b, 0.1);
        assert_eq!(out[0].points.len(), 2);
        for point in &out[0].points {
            assert_relative_eq!(point.distance, 0.0, epsilon = 1e-4);
        }
    }

    #[test]
    fn trigger_and_filter_flags() {
        let trigger = Collider::create_box(BoxGeometry::default(), CollisionFilter::DEFAULT, Material::trigger())
            .unwrap();
        let out = manifolds(&body(trigger, Vec3::new(0.0, 0.9, 0.0)), &body(unit_box(), Vec3::ZERO), 0.1);
        assert!(out[0].is_trigger());

        let ghost = Collider::create_box(BoxGeometry::default(), CollisionFilter::ZERO, Material::default())
            .unwrap();
        assert!(manifolds(&body(ghost, Vec3::ZERO), &body(unit_box(), Vec3::ZERO), 0.1).is_empty());
    }

    #[test]
    fn reduction_keeps_deepest_and_extremes() {
        let points: Vec<ContactPoint> = (0..8)
            .map(|i| {
                let angle = i as f32 * std::f32::consts::FRAC_PI_4;
                ContactPoint {
                    position: Vec3::new(angle.cos(), 0.0, angle.sin()),
                    distance: if i == 3 { -0.2 } else { -0.1 },
                }
            })
            .collect();
        let reduced = reduce_points(points, Vec3::Y);
        assert_eq!(reduced.len(), 4);
        assert_eq!(reduced[0].distance, -0.2);
    }
}
