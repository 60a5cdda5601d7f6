use std::f32::consts::FRAC_PI_2;
use std::sync::Arc;

use glam::Vec3;

use super::collider::Collider;
use super::types::{Aabb, MassProperties, Transform};

/// A body in the collision world. Several bodies may share one collider.
#[derive(Debug, Clone, Default)]
pub struct RigidBody {
    pub world_from_body: Transform,
    pub collider: Option<Arc<Collider>>,
    pub custom_tags: u8,
}

impl RigidBody {
    pub fn new(world_from_body: Transform, collider: Arc<Collider>) -> Self {
        Self {
            world_from_body,
            collider: Some(collider),
            custom_tags: 0,
        }
    }

    pub fn with_custom_tags(mut self, tags: u8) -> Self {
        self.custom_tags = tags;
        self
    }

    /// World-space bounds, or `None` for a body without a collider.
    pub fn world_aabb(&self) -> Option<Aabb> {
        self.collider
            .as_ref()
            .map(|collider| collider.calculate_aabb(&self.world_from_body))
    }
}

/// How far a body can sweep during one step.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MotionExpansion {
    pub linear: Vec3,
    pub uniform: f32,
}

impl MotionExpansion {
    pub fn max_distance(&self) -> f32 {
        self.linear.length() + self.uniform
    }

    /// Grows `aabb` to cover the swept motion.
    pub fn expand_aabb(&self, aabb: &Aabb) -> Aabb {
        let swept = aabb.expanded(self.uniform);
        Aabb::new(
            swept.min + self.linear.min(Vec3::ZERO),
            swept.max + self.linear.max(Vec3::ZERO),
        )
    }
}

/// Velocity state of a dynamic body, expressed in its motion frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionVelocity {
    pub linear: Vec3,
    pub angular: Vec3,
    pub inverse_inertia: Vec3,
    pub inverse_mass: f32,
    pub angular_expansion_factor: f32,
}

impl Default for MotionVelocity {
    fn default() -> Self {
        Self::ZERO
    }
}

impl MotionVelocity {
    /// Stationary body with infinite mass.
    pub const ZERO: Self = Self {
        linear: Vec3::ZERO,
        angular: Vec3::ZERO,
        inverse_inertia: Vec3::ZERO,
        inverse_mass: 0.0,
        angular_expansion_factor: 0.0,
    };

    pub fn from_mass_properties(mass_properties: &MassProperties, mass: f32) -> Self {
        let inverse_mass = if mass > 0.0 { 1.0 / mass } else { 0.0 };
        let inertia = mass_properties.mass_distribution.inertia_tensor * mass;
        Self {
            linear: Vec3::ZERO,
            angular: Vec3::ZERO,
            inverse_inertia: Vec3::select(inertia.cmpgt(Vec3::ZERO), inertia.recip(), Vec3::ZERO),
            inverse_mass,
            angular_expansion_factor: mass_properties.angular_expansion_factor,
        }
    }

    pub fn with_velocity(mut self, linear: Vec3, angular: Vec3) -> Self {
        self.linear = linear;
        self.angular = angular;
        self
    }

    pub fn has_infinite_mass(&self) -> bool {
        self.inverse_mass == 0.0
    }

    pub fn has_infinite_inertia(&self) -> bool {
        self.inverse_inertia == Vec3::ZERO
    }

    pub fn calculate_expansion(&self, time_step: f32) -> MotionExpansion {
        MotionExpansion {
            linear: self.linear * time_step,
            uniform: (self.angular.length() * time_step).min(FRAC_PI_2)
                * self.angular_expansion_factor,
        }
    }
}

/// Integration frame of a dynamic body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionData {
    pub world_from_motion: Transform,
    pub body_from_motion: Transform,
    pub linear_damping: f32,
    pub angular_damping: f32,
    pub gravity_factor: f32,
}

impl Default for MotionData {
    fn default() -> Self {
        Self::stationary(Transform::IDENTITY)
    }
}

impl MotionData {
    pub fn new(world_from_body: &Transform, mass_properties: &MassProperties) -> Self {
        let body_from_motion = mass_properties.mass_distribution.transform;
        Self {
            world_from_motion: world_from_body.combine(&body_from_motion),
            body_from_motion,
            linear_damping: 0.0,
            angular_damping: 0.05,
            gravity_factor: 1.0,
        }
    }

    /// Motion frame of a static body: coincident with the body frame.
    pub fn stationary(world_from_body: Transform) -> Self {
        Self {
            world_from_motion: world_from_body,
            body_from_motion: Transform::IDENTITY,
            linear_damping: 0.0,
            angular_damping: 0.0,
            gravity_factor: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn zero_motion_has_infinite_mass() {
        assert!(MotionVelocity::ZERO.has_infinite_mass());
        assert!(MotionVelocity::ZERO.has_infinite_inertia());
        assert_eq!(MotionVelocity::ZERO.calculate_expansion(1.0).max_distance(), 0.0);
    }

    #[test]
    fn expansion_clamps_rotation() {
        let motion = MotionVelocity {
            angular_expansion_factor: 2.0,
            ..MotionVelocity::ZERO
        }
        .with_velocity(Vec3::new(3.0, 0.0, 4.0), Vec3::new(0.0, 100.0, 0.0));
        let expansion = motion.calculate_expansion(0.1);
        assert_relative_eq!(expansion.linear.length(), 0.5);
        assert_relative_eq!(expansion.uniform, FRAC_PI_2 * 2.0);

        let aabb = expansion.expand_aabb(&Aabb::new(Vec3::ZERO, Vec3::ONE));
        assert_relative_eq!(aabb.max.x, 1.0 + 0.3 + FRAC_PI_2 * 2.0, epsilon = 1e-5);
        assert_relative_eq!(aabb.min.x, -FRAC_PI_2 * 2.0, epsilon = 1e-5);
    }

    #[test]
    fn inverse_inertia_scales_with_mass() {
        let motion = MotionVelocity::from_mass_properties(&MassProperties::UNIT_SPHERE, 2.0);
        assert_relative_eq!(motion.inverse_mass, 0.5);
        assert_relative_eq!(motion.inverse_inertia.x, 1.0 / 0.8, epsilon = 1e-5);
    }
}
