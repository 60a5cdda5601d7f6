//! Swept collider queries by conservative advancement.

use glam::{Quat, Vec3};

use super::collector::{ColliderCastHit, Collector};
use super::distance::{for_each_convex_leaf, view_bounds};
use super::gjk::{convex_distance, ConvexView, DistanceResult};
use super::raycast::Ray;
use crate::core::collider::{Collider, ColliderKey};
use crate::core::convex_hull::ConvexHull;
use crate::core::filter::CollisionFilter;
use crate::core::types::Transform;

/// Sweeps `collider` with a fixed `orientation` from `start` to `end`.
#[derive(Debug, Clone, Copy)]
pub struct ColliderCastInput<'a> {
    pub collider: &'a Collider,
    pub orientation: Quat,
    ray: Ray,
}

impl<'a> ColliderCastInput<'a> {
    pub fn new(collider: &'a Collider, start: Vec3, end: Vec3) -> Self {
        Self {
            collider,
            orientation: Quat::IDENTITY,
            ray: Ray::new(start, end - start),
        }
    }

    pub fn with_orientation(mut self, orientation: Quat) -> Self {
        self.orientation = orientation;
        self
    }

    pub fn ray(&self) -> &Ray {
        &self.ray
    }

    pub fn start(&self) -> Vec3 {
        self.ray.origin
    }

    pub fn end(&self) -> Vec3 {
        self.ray.origin + self.ray.displacement()
    }
}

const MAX_ITERATIONS: usize = 32;
const TOLERANCE: f32 = 1.0e-4;

/// Fraction at which `query` moving by `displacement` first touches
/// `target`, with the contact found there.
fn conservative_advancement(
    hull: &ConvexHull,
    start: &Transform,
    displacement: Vec3,
    target: &ConvexView,
    max_fraction: f32,
) -> Option<(f32, DistanceResult)> {
    let mut fraction = 0.0;
    for _ in 0..MAX_ITERATIONS {
        let at = Transform::new(start.rotation, start.position + displacement * fraction);
        let result = convex_distance(&ConvexView::new(hull, at), target);
        if result.distance <= TOLERANCE {
            return Some((fraction, result));
        }
        let closing_speed = -displacement.dot(result.normal);
        if closing_speed <= f32::EPSILON {
            return None;
        }
        fraction += result.distance / closing_speed;
        if fraction > max_fraction {
            return None;
        }
    }
    None
}

fn cast_convex<C: Collector<ColliderCastHit>>(
    hull: &ConvexHull,
    filter: &CollisionFilter,
    start: &Transform,
    displacement: Vec3,
    target: &Collider,
    collector: &mut C,
) -> bool {
    if !CollisionFilter::is_collision_enabled(filter, &target.filter()) {
        return false;
    }

    if let Some(target_hull) = target.convex_hull() {
        let target_view = ConvexView::new(target_hull, Transform::IDENTITY);
        let Some((fraction, result)) =
            conservative_advancement(hull, start, displacement, &target_view, collector.max_fraction())
        else {
            return false;
        };
        return collector.add_hit(ColliderCastHit {
            fraction,
            position: result.position_on_b(),
            surface_normal: result.normal,
            rigid_body_index: None,
            collider_key: ColliderKey::EMPTY,
            material: target.material(),
        });
    }

    let start_bounds = view_bounds(&ConvexView::new(hull, *start));
    let end = Transform::new(
        start.rotation,
        start.position + displacement * collector.max_fraction(),
    );
    let swept = start_bounds.union(&view_bounds(&ConvexView::new(hull, end)));

    let mut had_hit = false;
    target.visit_leaves(&swept, &mut |leaf| {
        let leaf_from_parent = leaf.parent_from_leaf.inverse();
        let local_start = leaf_from_parent.combine(start);
        let local_displacement = leaf_from_parent.transform_vector(displacement);
        let num_hits = collector.num_hits();
        let fraction = collector.max_fraction();
        if cast_convex(hull, filter, &local_start, local_displacement, &leaf.collider, collector) {
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

/// Sweeps `input.collider` against `target`. Hits report the fraction of the
/// sweep at first contact, a point on the target's surface and the target
/// normal there. An initially overlapping query hits at fraction zero.
pub fn cast_collider<C: Collector<ColliderCastHit>>(
    target: &Collider,
    input: &ColliderCastInput,
    collector: &mut C,
) -> bool {
    let start = Transform::new(input.orientation, input.start());
    let displacement = input.ray.displacement();
    let mut had_hit = false;
    for_each_convex_leaf(input.collider, &start, &mut |leaf, transform| {
        let Some(hull) = leaf.convex_hull() else {
            return true;
        };
        had_hit |= cast_convex(hull, &leaf.filter(), transform, displacement, target, collector);
        !(had_hit && collector.early_out_on_first_hit())
    });
    had_hit
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::collector::{AnyHitCollector, ClosestHitCollector};
    use crate::core::geometry::{BoxGeometry, SphereGeometry};
    use crate::core::types::Material;
    use approx::assert_relative_eq;

    fn sphere(radius: f32) -> Collider {
        Collider::create_sphere(
            SphereGeometry::new(Vec3::ZERO, radius),
            CollisionFilter::DEFAULT,
            Material::default(),
        )
        .unwrap()
    }

    #[test]
    fn sphere_cast_hits_box_face() {
        let target = Collider::create_box(
            BoxGeometry::default(),
            CollisionFilter::DEFAULT,
            Material::default(),
        )
        .unwrap();
        let ball = sphere(0.5);
        let input = ColliderCastInput::new(&ball, Vec3::new(0.0, 0.0, -5.0), Vec3::new(0.0, 0.0, 5.0));
        let mut collector = ClosestHitCollector::new(1.0);
        assert!(cast_collider(&target, &input, &mut collector));
        let hit = collector.into_hit().unwrap();
        assert_relative_eq!(hit.fraction, 0.4, epsilon = 1e-3);
        assert_relative_eq!(hit.position.z, -0.5, epsilon = 1e-3);
        assert_relative_eq!(hit.surface_normal.z, -1.0, epsilon = 1e-3);
    }

    #[test]
    fn moving_away_or_falling_short_misses() {
        let target = sphere(1.0);
        let ball = sphere(0.5);
        let away = ColliderCastInput::new(&ball, Vec3::new(3.0, 0.0, 0.0), Vec3::new(6.0, 0.0, 0.0));
        assert!(!cast_collider(&target, &away, &mut AnyHitCollector::new(1.0)));

        let short = ColliderCastInput::new(&ball, Vec3::new(5.0, 0.0, 0.0), Vec3::new(3.0, 0.0, 0.0));
        assert!(!cast_collider(&target, &short, &mut AnyHitCollector::new(1.0)));
    }

    #[test]
    fn initial_overlap_hits_at_zero() {
        let target = sphere(1.0);
        let ball = sphere(0.5);
        let input = ColliderCastInput::new(&ball, Vec3::new(1.0, 0.0, 0.0), Vec3::new(4.0, 0.0, 0.0));
        let mut collector = ClosestHitCollector::new(1.0);
        assert!(cast_collider(&target, &input, &mut collector));
        assert_eq!(collector.into_hit().unwrap().fraction, 0.0);
    }
}
