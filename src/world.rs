use glam::Vec3;

use crate::{
    collision::{
        collector::{
            AllHitsCollector, AnyHitCollector, ClosestHitCollector, ColliderCastHit, Collector,
            DistanceHit, QueryResult, RaycastHit,
        },
        collider_cast::ColliderCastInput,
        distance::{ColliderDistanceInput, PointDistanceInput},
        raycast::RaycastInput,
    },
    config::DEFAULT_COLLISION_TOLERANCE,
    core::{
        constraints::Joint,
        rigidbody::{MotionData, MotionVelocity, RigidBody},
        types::{Aabb, Transform},
    },
};

/// Bodies, their motion state and joints for one simulation step.
///
/// Dynamic bodies occupy `0..num_dynamic_bodies()` of `bodies`, in the same
/// order as `motion_velocities` and `motion_datas`; static bodies follow.
#[derive(Debug, Clone)]
pub struct PhysicsWorld {
    pub bodies: Vec<RigidBody>,
    pub motion_velocities: Vec<MotionVelocity>,
    pub motion_datas: Vec<MotionData>,
    pub joints: Vec<Joint>,
    pub collision_tolerance: f32,
    num_dynamic_bodies: usize,
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl PhysicsWorld {
    pub fn new() -> Self {
        Self {
            bodies: Vec::new(),
            motion_velocities: Vec::new(),
            motion_datas: Vec::new(),
            joints: Vec::new(),
            collision_tolerance: DEFAULT_COLLISION_TOLERANCE,
            num_dynamic_bodies: 0,
        }
    }

    pub fn with_collision_tolerance(mut self, collision_tolerance: f32) -> Self {
        self.collision_tolerance = collision_tolerance;
        self
    }

    /// Inserts a dynamic body after the existing dynamic bodies and returns
    /// its index. Static body indices shift up by one, so add bodies before
    /// joints that refer to static bodies.
    pub fn add_dynamic_body(&mut self, body: RigidBody, velocity: MotionVelocity) -> usize {
        let index = self.num_dynamic_bodies;
        let motion_data = match &body.collider {
            Some(collider) => MotionData::new(&body.world_from_body, &collider.mass_properties()),
            None => MotionData::stationary(body.world_from_body),
        };
        self.bodies.insert(index, body);
        self.motion_velocities.push(velocity);
        self.motion_datas.push(motion_data);
        self.num_dynamic_bodies += 1;
        index
    }

    pub fn add_static_body(&mut self, body: RigidBody) -> usize {
        self.bodies.push(body);
        self.bodies.len() - 1
    }

    pub fn add_joint(&mut self, joint: Joint) -> usize {
        self.joints.push(joint);
        self.joints.len() - 1
    }

    pub fn num_bodies(&self) -> usize {
        self.bodies.len()
    }

    pub fn num_dynamic_bodies(&self) -> usize {
        self.num_dynamic_bodies
    }

    pub fn num_static_bodies(&self) -> usize {
        self.bodies.len() - self.num_dynamic_bodies
    }

    pub fn dynamic_bodies(&self) -> &[RigidBody] {
        &self.bodies[..self.num_dynamic_bodies]
    }

    pub fn static_bodies(&self) -> &[RigidBody] {
        &self.bodies[self.num_dynamic_bodies..]
    }

    pub fn is_dynamic(&self, body_index: usize) -> bool {
        body_index < self.num_dynamic_bodies
    }

    /// Velocity of a body; static bodies never move.
    pub fn motion_velocity(&self, body_index: usize) -> MotionVelocity {
        if self.is_dynamic(body_index) {
            self.motion_velocities
                .get(body_index)
                .copied()
                .unwrap_or(MotionVelocity::ZERO)
        } else {
            MotionVelocity::ZERO
        }
    }

    /// Motion frame of a body. Static bodies get one synthesised from their
    /// fixed transform.
    pub fn motion_data(&self, body_index: usize) -> Option<MotionData> {
        if self.is_dynamic(body_index) {
            self.motion_datas.get(body_index).copied()
        } else {
            self.bodies
                .get(body_index)
                .map(|body| MotionData::stationary(body.world_from_body))
        }
    }

    /// Moves dynamic bodies by their velocities over `time_step`. Stands in
    /// for the external solver in demos and benches.
    pub fn integrate(&mut self, time_step: f32, gravity: Vec3) {
        let dynamic = &mut self.bodies[..self.num_dynamic_bodies];
        for ((body, velocity), motion) in dynamic
            .iter_mut()
            .zip(self.motion_velocities.iter_mut())
            .zip(self.motion_datas.iter_mut())
        {
            if velocity.has_infinite_mass() {
                continue;
            }
            velocity.linear += gravity * motion.gravity_factor * time_step;
            velocity.linear *= 1.0 / (1.0 + motion.linear_damping * time_step);
            velocity.angular *= 1.0 / (1.0 + motion.angular_damping * time_step);

            let frame = &mut motion.world_from_motion;
            frame.position += velocity.linear * time_step;
            let spin = glam::Quat::from_scaled_axis(velocity.angular * time_step);
            frame.rotation = (spin * frame.rotation).normalize();
            body.world_from_body = frame.combine(&motion.body_from_motion.inverse());
        }
    }

    /// Runs `query` against every body whose world bounds overlap `bounds`
    /// (all bodies when `None`), remapping new hits into world space.
    fn query_bodies<T, C, F>(&self, bounds: Option<Aabb>, collector: &mut C, mut query: F) -> bool
    where
        T: QueryResult,
        C: Collector<T>,
        F: FnMut(&RigidBody, &Transform, &mut C) -> bool,
    {
        let mut had_hit = false;
        for (index, body) in self.bodies.iter().enumerate() {
            let Some(world_aabb) = body.world_aabb() else {
                continue;
            };
            if bounds.is_some_and(|b| !b.overlaps(&world_aabb)) {
                continue;
            }
            let body_from_world = body.world_from_body.inverse();
            let num_hits = collector.num_hits();
            let fraction = collector.max_fraction();
            if query(body, &body_from_world, collector) {
                collector.transform_new_hits_to_body(num_hits, fraction, &body.world_from_body, index);
                had_hit = true;
                if collector.early_out_on_first_hit() {
                    break;
                }
            }
        }
        had_hit
    }

    /// Casts a world-space ray against every body.
    pub fn cast_ray<C: Collector<RaycastHit>>(&self, input: &RaycastInput, collector: &mut C) -> bool {
        self.query_bodies::<RaycastHit, C, _>(None, collector, |body, body_from_world, collector| {
            let world_aabb = body.world_aabb();
            let ray = input.ray();
            if let Some(aabb) = world_aabb {
                if !aabb.raycast(ray.origin, ray.reciprocal_displacement(), collector.max_fraction()) {
                    return false;
                }
            }
            body.collider.as_ref().is_some_and(|collider| {
                collider.cast_ray(&input.transformed(body_from_world), collector)
            })
        })
    }

    pub fn cast_ray_any(&self, input: &RaycastInput) -> bool {
        self.cast_ray(input, &mut AnyHitCollector::new(1.0))
    }

    pub fn cast_ray_closest(&self, input: &RaycastInput) -> Option<RaycastHit> {
        let mut collector = ClosestHitCollector::new(1.0);
        self.cast_ray(input, &mut collector);
        collector.into_hit()
    }

    pub fn cast_ray_all(&self, input: &RaycastInput) -> Vec<RaycastHit> {
        let mut collector = AllHitsCollector::new(1.0);
        self.cast_ray(input, &mut collector);
        collector.into_sorted_hits()
    }

    /// Sweeps a collider through the world.
    pub fn cast_collider<C: Collector<ColliderCastHit>>(
        &self,
        input: &ColliderCastInput,
        collector: &mut C,
    ) -> bool {
        self.query_bodies::<ColliderCastHit, C, _>(None, collector, |body, body_from_world, collector| {
            let local = ColliderCastInput::new(
                input.collider,
                body_from_world.transform_point(input.start()),
                body_from_world.transform_point(input.end()),
            )
            .with_orientation(body_from_world.rotation * input.orientation);
            body.collider
                .as_ref()
                .is_some_and(|collider| collider.cast_collider(&local, collector))
        })
    }

    pub fn calculate_distance_point<C: Collector<DistanceHit>>(
        &self,
        input: &PointDistanceInput,
        collector: &mut C,
    ) -> bool {
        let bounds = Aabb::from_center_extent(input.position, Vec3::splat(input.max_distance.max(0.0)));
        self.query_bodies::<DistanceHit, C, _>(Some(bounds), collector, |body, body_from_world, collector| {
            let local = PointDistanceInput {
                position: body_from_world.transform_point(input.position),
                ..*input
            };
            body.collider
                .as_ref()
                .is_some_and(|collider| collider.calculate_distance_point(&local, collector))
        })
    }

    pub fn calculate_distance_point_closest(&self, input: &PointDistanceInput) -> Option<DistanceHit> {
        let mut collector = ClosestHitCollector::new(input.max_distance);
        self.calculate_distance_point(input, &mut collector);
        collector.into_hit()
    }

    pub fn calculate_distance_collider<C: Collector<DistanceHit>>(
        &self,
        input: &ColliderDistanceInput,
        collector: &mut C,
    ) -> bool {
        let bounds = input
            .collider
            .calculate_aabb(&input.transform)
            .expanded(input.max_distance.max(0.0));
        self.query_bodies::<DistanceHit, C, _>(Some(bounds), collector, |body, body_from_world, collector| {
            let local = ColliderDistanceInput::new(
                input.collider,
                body_from_world.combine(&input.transform),
                input.max_distance,
            );
            body.collider
                .as_ref()
                .is_some_and(|collider| collider.calculate_distance_collider(&local, collector))
        })
    }

    pub fn calculate_distance_collider_closest(&self, input: &ColliderDistanceInput) -> Option<DistanceHit> {
        let mut collector = ClosestHitCollector::new(input.max_distance);
        self.calculate_distance_collider(input, &mut collector);
        collector.into_hit()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::collider::Collider;
    use crate::core::filter::CollisionFilter;
    use crate::core::geometry::{BoxGeometry, SphereGeometry};
    use crate::core::types::Material;
    use approx::assert_relative_eq;

    fn ball() -> std::sync::Arc<Collider> {
        Collider::create_sphere(SphereGeometry::new(Vec3::ZERO, 0.5), CollisionFilter::DEFAULT, Material::default())
            .unwrap()
            .into_shared()
    }

    #[test]
    fn dynamic_bodies_stay_in_front() {
        let mut world = PhysicsWorld::new();
        let ground = world.add_static_body(RigidBody::new(Transform::IDENTITY, ball()));
        assert_eq!(ground, 0);
        let first = world.add_dynamic_body(RigidBody::new(Transform::from_position(Vec3::Y), ball()), MotionVelocity::ZERO);
        assert_eq!(first, 0);
        assert_eq!(world.num_dynamic_bodies(), 1);
        assert_eq!(world.static_bodies()[0].world_from_body, Transform::IDENTITY);
        assert_eq!(world.motion_velocity(1), MotionVelocity::ZERO);
        assert!(world.motion_data(1).is_some());
        assert!(world.motion_data(5).is_none());
    }

    #[test]
    fn world_ray_reports_body_index() {
        let mut world = PhysicsWorld::new();
        world.add_static_body(RigidBody::new(Transform::from_position(Vec3::new(0.0, 0.0, 5.0)), ball()));
        let cube = Collider::create_box(BoxGeometry::default(), CollisionFilter::DEFAULT, Material::default())
            .unwrap()
            .into_shared();
        world.add_static_body(RigidBody::new(Transform::from_position(Vec3::new(0.0, 0.0, 2.0)), cube));

        let input = RaycastInput::new(Vec3::ZERO, Vec3::new(0.0, 0.0, 10.0));
        let hit = world.cast_ray_closest(&input).unwrap();
        assert_eq!(hit.rigid_body_index, Some(1));
        assert_relative_eq!(hit.position.z, 1.5, epsilon = 1e-5);
        assert_eq!(world.cast_ray_all(&input).len(), 2);
        assert!(world.cast_ray_any(&input));
    }

    #[test]
    fn world_point_distance() {
        let mut world = PhysicsWorld::new();
        world.add_static_body(RigidBody::new(Transform::from_position(Vec3::new(3.0, 0.0, 0.0)), ball()));
        let hit = world
            .calculate_distance_point_closest(&PointDistanceInput::new(Vec3::ZERO, 5.0))
            .unwrap();
        assert_relative_eq!(hit.distance(), 2.5, epsilon = 1e-5);
        assert_relative_eq!(hit.position.x, 2.5, epsilon = 1e-5);
        assert_eq!(hit.rigid_body_index, Some(0));
    }
}
