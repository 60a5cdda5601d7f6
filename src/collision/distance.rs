//! Point and collider distance queries.

use glam::Vec3;

use super::collector::{Collector, DistanceHit};
use super::gjk::{convex_distance, ConvexView};
use crate::core::collider::{Collider, ColliderKey};
use crate::core::convex_hull::ConvexHull;
use crate::core::filter::CollisionFilter;
use crate::core::types::{Aabb, Transform};

/// Distance from a point, in target space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointDistanceInput {
    pub position: Vec3,
    pub max_distance: f32,
    pub filter: CollisionFilter,
}

impl PointDistanceInput {
    pub fn new(position: Vec3, max_distance: f32) -> Self {
        Self {
            position,
            max_distance,
            filter: CollisionFilter::DEFAULT,
        }
    }
}

/// Distance from a collider placed at `transform` in target space.
#[derive(Debug, Clone, Copy)]
pub struct ColliderDistanceInput<'a> {
    pub collider: &'a Collider,
    pub transform: Transform,
    pub max_distance: f32,
}

impl<'a> ColliderDistanceInput<'a> {
    pub fn new(collider: &'a Collider, transform: Transform, max_distance: f32) -> Self {
        Self {
            collider,
            transform,
            max_distance,
        }
    }
}

/// Calls `f` with every convex leaf of `collider` and the leaf's transform,
/// given that `collider` sits at `transform`. Stops when `f` returns false.
pub(crate) fn for_each_convex_leaf(
    collider: &Collider,
    transform: &Transform,
    f: &mut dyn FnMut(&Collider, &Transform) -> bool,
) -> bool {
    if collider.is_convex() {
        return f(collider, transform);
    }
    let bounds = collider.aabb();
    collider.visit_leaves(&bounds, &mut |leaf| {
        let leaf_transform = transform.combine(&leaf.parent_from_leaf);
        for_each_convex_leaf(&leaf.collider, &leaf_transform, f)
    })
}

pub(crate) fn view_bounds(view: &ConvexView) -> Aabb {
    let mut bounds = Aabb::empty();
    for v in view.vertices() {
        bounds.extend(v);
    }
    bounds.expanded(view.radius())
}

/// Distance from a convex `query` (in target space) to `target`.
pub(crate) fn distance_to_collider<C: Collector<DistanceHit>>(
    query: &ConvexView,
    filter: &CollisionFilter,
    target: &Collider,
    collector: &mut C,
) -> bool {
    if !CollisionFilter::is_collision_enabled(filter, &target.filter()) {
        return false;
    }

    if let Some(hull) = target.convex_hull() {
        let result = convex_distance(query, &ConvexView::new(hull, Transform::IDENTITY));
        if result.distance >= collector.max_fraction() {
            return false;
        }
        return collector.add_hit(DistanceHit {
            fraction: result.distance,
            position: result.position_on_b(),
            surface_normal: result.normal,
            rigid_body_index: None,
            collider_key: ColliderKey::EMPTY,
            material: target.material(),
        });
    }

    let bounds = view_bounds(query).expanded(collector.max_fraction().max(0.0));
    let mut had_hit = false;
    target.visit_leaves(&bounds, &mut |leaf| {
        let leaf_from_parent = leaf.parent_from_leaf.inverse();
        let local = ConvexView::new(query.hull, leaf_from_parent.combine(&query.transform));
        let num_hits = collector.num_hits();
        let fraction = collector.max_fraction();
        if distance_to_collider(&local, filter, &leaf.collider, collector) {
            collector.transform_new_hits(
                num_hits,
                fraction,
                &leaf.parent_from_leaf,
                leaf.num_key_bits,
                leaf.sub_key,
            );
            had_hit = true;
        }
        !(had_hit && collector.early_out_on_first_hit())
    });
    had_hit
}

/// Closest distance from `input.position` to `target`, reported through
/// `collector`. Points inside solid colliders get negative distances.
pub fn calculate_distance_point<C: Collector<DistanceHit>>(
    target: &Collider,
    input: &PointDistanceInput,
    collector: &mut C,
) -> bool {
    let mut point = ConvexHull::with_capacity(1, 0, 0);
    point.vertices.push(input.position);
    let view = ConvexView::new(&point, Transform::IDENTITY);
    distance_to_collider(&view, &input.filter, target, collector)
}

/// Closest distance between `input.collider` and `target`. Composite query
/// colliders are measured leaf by leaf.
pub fn calculate_distance_collider<C: Collector<DistanceHit>>(
    target: &Collider,
    input: &ColliderDistanceInput,
    collector: &mut C,
) -> bool {
    let mut had_hit = false;
    for_each_convex_leaf(input.collider, &input.transform, &mut |leaf, transform| {
        let Some(hull) = leaf.convex_hull() else {
            return true;
        };
        let view = ConvexView::new(hull, *transform);
        had_hit |= distance_to_collider(&view, &leaf.filter(), target, collector);
        !(had_hit && collector.early_out_on_first_hit())
    });
    had_hit
}
