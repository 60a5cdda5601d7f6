//! Value descriptors for the primitive shapes.
//!
//! Geometries are validated before a collider is built from them and carry
//! the closed-form mass properties of the shape at unit density. Equality and
//! hashing compare raw `f32` bit patterns so identical descriptors can be used
//! as deduplication keys.

use std::f32::consts::PI;
use std::hash::{Hash, Hasher};

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::types::{Aabb, MassDistribution, MassProperties, Transform};
use crate::utils::math::from_to_rotation;

/// Reasons a geometry or polygon is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GeometryError {
    /// The shape center contains NaN or infinite components.
    #[error("center must be finite")]
    InvalidCenter,
    /// The orientation is all zeros or not finite.
    #[error("orientation must be finite and non-zero")]
    InvalidOrientation,
    /// A size or height is non-finite or out of range.
    #[error("{0} must be finite and in range")]
    InvalidExtent(&'static str),
    /// Bevel radius is negative, non-finite, or larger than the shape allows.
    #[error("bevel radius must be finite, non-negative and fit inside the shape")]
    InvalidBevelRadius,
    #[error("side count {count} outside [{min}, {max}]")]
    SideCountOutOfRange { count: u32, min: u32, max: u32 },
    #[error("vertex {0} must be finite")]
    InvalidVertex(usize),
    #[error("radius must be finite and non-negative")]
    InvalidRadius,
    #[error("quad vertices are not coplanar")]
    NonPlanarQuad,
    #[error("polygon has zero area")]
    DegeneratePolygon,
}

fn check_center(center: Vec3) -> Result<(), GeometryError> {
    if center.is_finite() {
        Ok(())
    } else {
        Err(GeometryError::InvalidCenter)
    }
}

fn check_orientation(orientation: Quat) -> Result<(), GeometryError> {
    if orientation.length_squared() == 0.0 || !orientation.is_finite() {
        Err(GeometryError::InvalidOrientation)
    } else {
        Ok(())
    }
}

fn check_non_negative(value: f32) -> bool {
    value.is_finite() && value >= 0.0
}

macro_rules! bitwise_value {
    ($ty:ty) => {
        impl PartialEq for $ty {
            fn eq(&self, other: &Self) -> bool {
                self.bit_pattern() == other.bit_pattern()
            }
        }

        impl Eq for $ty {}

        impl Hash for $ty {
            fn hash<H: Hasher>(&self, state: &mut H) {
                self.bit_pattern().hash(state);
            }
        }
    };
}

fn vec_bits(v: Vec3) -> [u32; 3] {
    [v.x.to_bits(), v.y.to_bits(), v.z.to_bits()]
}

fn quat_bits(q: Quat) -> [u32; 4] {
    [q.x.to_bits(), q.y.to_bits(), q.z.to_bits(), q.w.to_bits()]
}

/// Oriented box with optional rounded edges.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BoxGeometry {
    pub center: Vec3,
    pub orientation: Quat,
    pub size: Vec3,
    pub bevel_radius: f32,
}

impl Default for BoxGeometry {
    fn default() -> Self {
        Self {
            center: Vec3::ZERO,
            orientation: Quat::IDENTITY,
            size: Vec3::ONE,
            bevel_radius: 0.0,
        }
    }
}

impl BoxGeometry {
    pub fn from_size(size: Vec3) -> Self {
        Self {
            size,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), GeometryError> {
        check_center(self.center)?;
        check_orientation(self.orientation)?;
        if !self.size.is_finite() || !self.size.cmpgt(Vec3::ZERO).all() {
            return Err(GeometryError::InvalidExtent("box size"));
        }
        if !check_non_negative(self.bevel_radius)
            || self.size.cmplt(Vec3::splat(2.0 * self.bevel_radius)).any()
        {
            return Err(GeometryError::InvalidBevelRadius);
        }
        Ok(())
    }

    /// Collider-from-box frame with a normalized orientation.
    pub fn frame(&self) -> Transform {
        Transform::new(self.orientation.normalize(), self.center)
    }

    /// Half extents of the hull core, inside the bevel.
    pub fn core_half_extents(&self) -> Vec3 {
        self.size * 0.5 - Vec3::splat(self.bevel_radius)
    }

    pub fn mass_properties(&self) -> MassProperties {
        let s = self.size;
        MassProperties {
            mass_distribution: MassDistribution {
                transform: self.frame(),
                inertia_tensor: Vec3::new(
                    (s.y * s.y + s.z * s.z) / 12.0,
                    (s.x * s.x + s.z * s.z) / 12.0,
                    (s.x * s.x + s.y * s.y) / 12.0,
                ),
            },
            volume: s.x * s.y * s.z,
            angular_expansion_factor: self.core_half_extents().length(),
        }
    }

    pub fn calculate_aabb(&self, transform: &Transform) -> Aabb {
        let orientation = transform.rotation * self.orientation.normalize();
        let half = self.size * 0.5;
        let x = orientation * Vec3::new(half.x, 0.0, 0.0);
        let y = orientation * Vec3::new(0.0, half.y, 0.0);
        let z = orientation * Vec3::new(0.0, 0.0, half.z);
        Aabb::from_center_extent(
            transform.transform_point(self.center),
            x.abs() + y.abs() + z.abs(),
        )
    }

    fn bit_pattern(&self) -> [u32; 11] {
        let c = vec_bits(self.center);
        let q = quat_bits(self.orientation);
        let s = vec_bits(self.size);
        [
            c[0], c[1], c[2], q[0], q[1], q[2], q[3], s[0], s[1], s[2],
            self.bevel_radius.to_bits(),
        ]
    }
}

bitwise_value!(BoxGeometry);

/// Line segment swept by a sphere.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CapsuleGeometry {
    pub vertex0: Vec3,
    pub vertex1: Vec3,
    pub radius: f32,
}

impl CapsuleGeometry {
    pub fn new(vertex0: Vec3, vertex1: Vec3, radius: f32) -> Self {
        Self {
            vertex0,
            vertex1,
            radius,
        }
    }

    pub fn validate(&self) -> Result<(), GeometryError> {
        if !self.vertex0.is_finite() {
            return Err(GeometryError::InvalidVertex(0));
        }
        if !self.vertex1.is_finite() {
            return Err(GeometryError::InvalidVertex(1));
        }
        if !check_non_negative(self.radius) {
            return Err(GeometryError::InvalidRadius);
        }
        Ok(())
    }

    pub fn mass_properties(&self) -> MassProperties {
        let axis = self.vertex1 - self.vertex0;
        let length = axis.length();
        let r = self.radius;

        let mut cylinder_mass = PI * length * r * r;
        let mut sphere_mass = PI * (4.0 / 3.0) * r * r * r;
        let total = cylinder_mass + sphere_mass;
        if total > 0.0 {
            cylinder_mass /= total;
            sphere_mass /= total;
        }
        let on_axis = (cylinder_mass * 0.5 + sphere_mass * 0.4) * r * r;
        let off_axis = cylinder_mass * ((1.0 / 4.0) * r * r + (1.0 / 12.0) * length * length)
            + sphere_mass * ((2.0 / 5.0) * r * r + (3.0 / 8.0) * r * length + (1.0 / 4.0) * length * length);

        let orientation = if length == 0.0 {
            Quat::IDENTITY
        } else {
            from_to_rotation(Vec3::Y, axis)
        };

        MassProperties {
            mass_distribution: MassDistribution {
                transform: Transform::new(orientation, (self.vertex0 + self.vertex1) * 0.5),
                inertia_tensor: Vec3::new(off_axis, on_axis, off_axis),
            },
            volume: PI * r * r * ((4.0 / 3.0) * r + length),
            angular_expansion_factor: length * 0.5,
        }
    }

    pub fn calculate_aabb(&self, transform: &Transform) -> Aabb {
        let v0 = transform.transform_point(self.vertex0);
        let v1 = transform.transform_point(self.vertex1);
        Aabb::new(
            v0.min(v1) - Vec3::splat(self.radius),
            v0.max(v1) + Vec3::splat(self.radius),
        )
    }

    fn bit_pattern(&self) -> [u32; 7] {
        let a = vec_bits(self.vertex0);
        let b = vec_bits(self.vertex1);
        [a[0], a[1], a[2], b[0], b[1], b[2], self.radius.to_bits()]
    }
}

bitwise_value!(CapsuleGeometry);

/// Cylinder around the local Z axis, approximated by a prism.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CylinderGeometry {
    pub center: Vec3,
    pub orientation: Quat,
    pub height: f32,
    pub radius: f32,
    pub bevel_radius: f32,
    pub side_count: u32,
}

impl Default for CylinderGeometry {
    fn default() -> Self {
        Self {
            center: Vec3::ZERO,
            orientation: Quat::IDENTITY,
            height: 1.0,
            radius: 0.5,
            bevel_radius: 0.0,
            side_count: Self::DEFAULT_SIDE_COUNT,
        }
    }
}

impl CylinderGeometry {
    pub const MIN_SIDE_COUNT: u32 = 3;
    pub const MAX_SIDE_COUNT: u32 = 32;
    pub const DEFAULT_SIDE_COUNT: u32 = 20;

    pub fn validate(&self) -> Result<(), GeometryError> {
        check_center(self.center)?;
        check_orientation(self.orientation)?;
        if !check_non_negative(self.height) {
            return Err(GeometryError::InvalidExtent("cylinder height"));
        }
        if !check_non_negative(self.radius) {
            return Err(GeometryError::InvalidRadius);
        }
        if !check_non_negative(self.bevel_radius)
            || self.bevel_radius > self.radius
            || 2.0 * self.bevel_radius > self.height
        {
            return Err(GeometryError::InvalidBevelRadius);
        }
        if !(Self::MIN_SIDE_COUNT..=Self::MAX_SIDE_COUNT).contains(&self.side_count) {
            return Err(GeometryError::SideCountOutOfRange {
                count: self.side_count,
                min: Self::MIN_SIDE_COUNT,
                max: Self::MAX_SIDE_COUNT,
            });
        }
        Ok(())
    }

    /// Collider-from-cylinder frame with a normalized orientation.
    pub fn frame(&self) -> Transform {
        Transform::new(self.orientation.normalize(), self.center)
    }

    /// Radius and half height of the hull core, inside the bevel.
    pub fn core_dimensions(&self) -> (f32, f32) {
        (
            (self.radius - self.bevel_radius).max(0.0),
            (self.height * 0.5 - self.bevel_radius).max(0.0),
        )
    }

    pub fn mass_properties(&self) -> MassProperties {
        let (r, h) = (self.radius, self.height);
        let (core_radius, core_half_height) = self.core_dimensions();
        MassProperties {
            mass_distribution: MassDistribution {
                transform: self.frame(),
                inertia_tensor: Vec3::new(
                    (r * r + h * h) / 12.0,
                    (r * r + h * h) / 12.0,
                    r * r * 0.5,
                ),
            },
            volume: PI * r * r * h,
            angular_expansion_factor: (core_radius * core_radius
                + core_half_height * core_half_height)
                .sqrt(),
        }
    }

    pub fn calculate_aabb(&self, transform: &Transform) -> Aabb {
        let frame = transform.combine(&self.frame());
        let axis = frame.transform_vector(Vec3::Z) * (self.height * 0.5);
        let v0 = frame.position + axis;
        let v1 = frame.position - axis;
        let e = Vec3::splat(self.radius);
        Aabb::new(v0.min(v1) - e, v0.max(v1) + e)
    }

    fn bit_pattern(&self) -> [u32; 11] {
        let c = vec_bits(self.center);
        let q = quat_bits(self.orientation);
        [
            c[0],
            c[1],
            c[2],
            q[0],
            q[1],
            q[2],
            q[3],
            self.height.to_bits(),
            self.radius.to_bits(),
            self.bevel_radius.to_bits(),
            self.side_count,
        ]
    }
}

bitwise_value!(CylinderGeometry);

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SphereGeometry {
    pub center: Vec3,
    pub radius: f32,
}

impl SphereGeometry {
    pub fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }

    pub fn validate(&self) -> Result<(), GeometryError> {
        check_center(self.center)?;
        if !check_non_negative(self.radius) {
            return Err(GeometryError::InvalidRadius);
        }
        Ok(())
    }

    pub fn mass_properties(&self) -> MassProperties {
        let r = self.radius;
        MassProperties {
            mass_distribution: MassDistribution {
                transform: Transform::from_position(self.center),
                inertia_tensor: Vec3::splat(0.4 * r * r),
            },
            volume: 4.0 / 3.0 * PI * r * r * r,
            angular_expansion_factor: 0.0,
        }
    }

    pub fn calculate_aabb(&self, transform: &Transform) -> Aabb {
        Aabb::from_center_extent(
            transform.transform_point(self.center),
            Vec3::splat(self.radius),
        )
    }

    fn bit_pattern(&self) -> [u32; 4] {
        let c = vec_bits(self.center);
        [c[0], c[1], c[2], self.radius.to_bits()]
    }
}

bitwise_value!(SphereGeometry);

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::collections::HashSet;

    #[test]
    fn capsule_off_axis_inertia_is_bit_exact() {
        let r = 0.3f32;
        for i in 1..=2000 {
            let length = 0.013f32 * i as f32;
            let geometry = CapsuleGeometry::new(Vec3::ZERO, Vec3::new(0.0, length, 0.0), r);
            let mass = geometry.mass_properties();

            let axis_length = Vec3::new(0.0, length, 0.0).length();
            let mut cylinder = PI * axis_length * r * r;
            let mut sphere = PI * (4.0f32 / 3.0) * r * r * r;
            let total = cylinder + sphere;
            cylinder /= total;
            sphere /= total;
            let twelfth: f32 = 1.0 / 12.0;
            let expected = cylinder * (0.25f32 * r * r + twelfth * axis_length * axis_length)
                + sphere * (0.4f32 * r * r + 0.375f32 * r * axis_length + 0.25f32 * axis_length * axis_length);
            assert_eq!(
                mass.mass_distribution.inertia_tensor.x.to_bits(),
                expected.to_bits(),
                "length {length}"
            );
        }

        let twelfth: f32 = 1.0 / 12.0;
        assert_eq!((twelfth * 0.013 * 0.013).to_bits(), 1.408_333_36e-5f32.to_bits());
    }

    #[test]
    fn box_validation_order() {
        let mut geometry = BoxGeometry::default();
        assert!(geometry.validate().is_ok());

        geometry.bevel_radius = 0.6;
        assert_eq!(geometry.validate(), Err(GeometryError::InvalidBevelRadius));

        geometry.size = Vec3::new(1.0, 0.0, 1.0);
        assert_eq!(geometry.validate(), Err(GeometryError::InvalidExtent("box size")));

        geometry.orientation = Quat::from_xyzw(0.0, 0.0, 0.0, 0.0);
        assert_eq!(geometry.validate(), Err(GeometryError::InvalidOrientation));

        geometry.center = Vec3::new(f32::NAN, 0.0, 0.0);
        assert_eq!(geometry.validate(), Err(GeometryError::InvalidCenter));
    }

    #[test]
    fn bevel_may_equal_half_extent() {
        let geometry = BoxGeometry {
            bevel_radius: 0.5,
            ..BoxGeometry::default()
        };
        assert!(geometry.validate().is_ok());
    }

    #[test]
    fn cylinder_side_count_range() {
        let mut geometry = CylinderGeometry {
            side_count: 2,
            ..CylinderGeometry::default()
        };
        assert_eq!(
            geometry.validate(),
            Err(GeometryError::SideCountOutOfRange {
                count: 2,
                min: 3,
                max: 32
            })
        );
        geometry.side_count = 33;
        assert!(geometry.validate().is_err());
        geometry.side_count = 32;
        assert!(geometry.validate().is_ok());
    }

    #[test]
    fn capsule_rejects_non_finite_input() {
        let bad_vertex = CapsuleGeometry::new(Vec3::ZERO, Vec3::splat(f32::INFINITY), 0.5);
        assert_eq!(bad_vertex.validate(), Err(GeometryError::InvalidVertex(1)));
        let bad_radius = CapsuleGeometry::new(Vec3::ZERO, Vec3::Y, -1.0);
        assert_eq!(bad_radius.validate(), Err(GeometryError::InvalidRadius));
    }

    #[test]
    fn box_mass_properties() {
        let geometry = BoxGeometry {
            size: Vec3::new(1.0, 2.0, 3.0),
            bevel_radius: 0.1,
            ..BoxGeometry::default()
        };
        let mp = geometry.mass_properties();
        assert_relative_eq!(mp.volume, 6.0);
        assert_relative_eq!(mp.mass_distribution.inertia_tensor.x, 13.0 / 12.0);
        assert_relative_eq!(mp.mass_distribution.inertia_tensor.y, 10.0 / 12.0);
        assert_relative_eq!(mp.mass_distribution.inertia_tensor.z, 5.0 / 12.0);
        assert_relative_eq!(
            mp.angular_expansion_factor,
            Vec3::new(0.4, 0.9, 1.4).length(),
            epsilon = 1e-6
        );
    }

    #[test]
    fn capsule_mass_frame_follows_axis() {
        let geometry = CapsuleGeometry::new(Vec3::ZERO, Vec3::new(2.0, 0.0, 0.0), 0.5);
        let mp = geometry.mass_properties();
        let frame = mp.mass_distribution.transform;
        assert_relative_eq!(frame.position.x, 1.0);
        let axis = frame.rotation * Vec3::Y;
        assert_relative_eq!(axis.x, 1.0, epsilon = 1e-6);
        assert_relative_eq!(mp.angular_expansion_factor, 1.0);
        assert_relative_eq!(mp.volume, PI * 0.25 * (4.0 / 3.0 * 0.5 + 2.0), epsilon = 1e-5);
        assert!(mp.mass_distribution.inertia_tensor.x > mp.mass_distribution.inertia_tensor.y);
    }

    #[test]
    fn degenerate_capsule_has_identity_frame() {
        let mp = CapsuleGeometry::new(Vec3::ONE, Vec3::ONE, 1.0).mass_properties();
        assert_eq!(mp.mass_distribution.transform.rotation, Quat::IDENTITY);
        assert_relative_eq!(mp.mass_distribution.inertia_tensor.y, 0.4);
    }

    #[test]
    fn cylinder_aabb_spans_axis() {
        let geometry = CylinderGeometry {
            height: 2.0,
            radius: 0.5,
            ..CylinderGeometry::default()
        };
        let aabb = geometry.calculate_aabb(&Transform::IDENTITY);
        assert_relative_eq!(aabb.max.z, 1.5);
        assert_relative_eq!(aabb.min.x, -0.5);
    }

    #[test]
    fn bitwise_equality_and_hash() {
        let a = SphereGeometry::new(Vec3::ZERO, 1.0);
        let b = SphereGeometry::new(Vec3::ZERO, 1.0);
        let c = SphereGeometry::new(Vec3::new(-0.0, 0.0, 0.0), 1.0);
        assert_eq!(a, b);
        assert_ne!(a, c);
        let set: HashSet<_> = [a, b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
    }
}
