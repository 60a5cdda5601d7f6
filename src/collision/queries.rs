//! Query entry points on [`Collider`], each with any/closest/all variants.

use super::collector::{
    AllHitsCollector, AnyHitCollector, ClosestHitCollector, ColliderCastHit, Collector, DistanceHit,
    RaycastHit,
};
use super::collider_cast::{self, ColliderCastInput};
use super::distance::{self, ColliderDistanceInput, PointDistanceInput};
use super::raycast::{self, RaycastInput};
use crate::core::collider::Collider;

impl Collider {
    /// Casts a ray in collider space, feeding hits to `collector`.
    pub fn cast_ray<C: Collector<RaycastHit>>(&self, input: &RaycastInput, collector: &mut C) -> bool {
        raycast::cast_ray(self, input, collector)
    }

    pub fn cast_ray_any(&self, input: &RaycastInput) -> bool {
        self.cast_ray(input, &mut AnyHitCollector::new(1.0))
    }

    pub fn cast_ray_closest(&self, input: &RaycastInput) -> Option<RaycastHit> {
        let mut collector = ClosestHitCollector::new(1.0);
        self.cast_ray(input, &mut collector);
        collector.into_hit()
    }

    /// Every hit, nearest first.
    pub fn cast_ray_all(&self, input: &RaycastInput) -> Vec<RaycastHit> {
        let mut collector = AllHitsCollector::new(1.0);
        self.cast_ray(input, &mut collector);
        collector.into_sorted_hits()
    }

    pub fn cast_collider<C: Collector<ColliderCastHit>>(
        &self,
        input: &ColliderCastInput,
        collector: &mut C,
    ) -> bool {
        collider_cast::cast_collider(self, input, collector)
    }

    pub fn cast_collider_any(&self, input: &ColliderCastInput) -> bool {
        self.cast_collider(input, &mut AnyHitCollector::new(1.0))
    }

    pub fn cast_collider_closest(&self, input: &ColliderCastInput) -> Option<ColliderCastHit> {
        let mut collector = ClosestHitCollector::new(1.0);
        self.cast_collider(input, &mut collector);
        collector.into_hit()
    }

    pub fn cast_collider_all(&self, input: &ColliderCastInput) -> Vec<ColliderCastHit> {
        let mut collector = AllHitsCollector::new(1.0);
        self.cast_collider(input, &mut collector);
        collector.into_sorted_hits()
    }

    pub fn calculate_distance_point<C: Collector<DistanceHit>>(
        &self,
        input: &PointDistanceInput,
        collector: &mut C,
    ) -> bool {
        distance::calculate_distance_point(self, input, collector)
    }

    pub fn calculate_distance_point_any(&self, input: &PointDistanceInput) -> bool {
        self.calculate_distance_point(input, &mut AnyHitCollector::new(input.max_distance))
    }

    pub fn calculate_distance_point_closest(&self, input: &PointDistanceInput) -> Option<DistanceHit> {
        let mut collector = ClosestHitCollector::new(input.max_distance);
        self.calculate_distance_point(input, &mut collector);
        collector.into_hit()
    }

    pub fn calculate_distance_point_all(&self, input: &PointDistanceInput) -> Vec<DistanceHit> {
        let mut collector = AllHitsCollector::new(input.max_distance);
        self.calculate_distance_point(input, &mut collector);
        collector.into_sorted_hits()
    }

    pub fn calculate_distance_collider<C: Collector<DistanceHit>>(
        &self,
        input: &ColliderDistanceInput,
        collector: &mut C,
    ) -> bool {
        distance::calculate_distance_collider(self, input, collector)
    }

    pub fn calculate_distance_collider_any(&self, input: &ColliderDistanceInput) -> bool {
        self.calculate_distance_collider(input, &mut AnyHitCollector::new(input.max_distance))
    }

    pub fn calculate_distance_collider_closest(&self, input: &ColliderDistanceInput) -> Option<DistanceHit> {
        let mut collector = ClosestHitCollector::new(input.max_distance);
        self.calculate_distance_collider(input, &mut collector);
        collector.into_hit()
    }

    pub fn calculate_distance_collider_all(&self, input: &ColliderDistanceInput) -> Vec<DistanceHit> {
        let mut collector = AllHitsCollector::new(input.max_distance);
        self.calculate_distance_collider(input, &mut collector);
        collector.into_sorted_hits()
    }
}

#[cfg(test)]
mod tests {
    use crate::collision::raycast::RaycastInput;
    use crate::core::collider::Collider;
    use crate::core::compound::CompoundChild;
    use crate::core::filter::CollisionFilter;
    use crate::core::geometry::SphereGeometry;
    use crate::core::types::{Material, Transform};
    use glam::Vec3;

    fn sphere_at(x: f32) -> CompoundChild {
        let sphere = Collider::create_sphere(
            SphereGeometry::new(Vec3::ZERO, 0.5),
            CollisionFilter::DEFAULT,
            Material::default(),
        )
        .unwrap();
        CompoundChild::new(Transform::from_position(Vec3::new(x, 0.0, 0.0)), sphere.into_shared())
    }

    #[test]
    fn wrappers_agree_on_compound() {
        let compound = Collider::create_compound(vec![sphere_at(-2.0), sphere_at(2.0)]).unwrap();
        let input = RaycastInput::new(Vec3::new(-5.0, 0.0, 0.0), Vec3::new(5.0, 0.0, 0.0));
        assert!(compound.cast_ray_any(&input));

        let closest = compound.cast_ray_closest(&input).unwrap();
        assert!((closest.fraction - 0.25).abs() < 1e-5);
        assert!((closest.position.x + 2.5).abs() < 1e-5);

        let all = compound.cast_ray_all(&input);
        assert_eq!(all.len(), 2);
        assert!(all[0].fraction < all[1].fraction);
        assert_ne!(all[0].collider_key, all[1].collider_key);

        let miss = RaycastInput::new(Vec3::new(-5.0, 3.0, 0.0), Vec3::new(5.0, 3.0, 0.0));
        assert!(!compound.cast_ray_any(&miss));
    }
}
