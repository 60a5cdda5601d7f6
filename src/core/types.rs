use bitflags::bitflags;
use glam::{Mat3, Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Rigid transform (rotation then translation). Rotations are expected to be
/// unit quaternions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
    };

    pub fn new(rotation: Quat, position: Vec3) -> Self {
        Self { position, rotation }
    }

    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            rotation: Quat::IDENTITY,
        }
    }

    /// `self * other`: maps points from `other`'s source space through `self`.
    pub fn combine(&self, other: &Transform) -> Transform {
        Transform {
            position: self.position + self.rotation * other.position,
            rotation: self.rotation * other.rotation,
        }
    }

    pub fn inverse(&self) -> Transform {
        let rotation = self.rotation.conjugate();
        Transform {
            position: rotation * -self.position,
            rotation,
        }
    }

    /// `self.inverse() * other` without building the intermediate inverse.
    pub fn inverse_combine(&self, other: &Transform) -> Transform {
        let inv = self.rotation.conjugate();
        Transform {
            position: inv * (other.position - self.position),
            rotation: inv * other.rotation,
        }
    }

    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        self.position + self.rotation * point
    }

    pub fn transform_vector(&self, vector: Vec3) -> Vec3 {
        self.rotation * vector
    }

    pub fn inverse_transform_point(&self, point: Vec3) -> Vec3 {
        self.rotation.conjugate() * (point - self.position)
    }

    pub fn inverse_transform_vector(&self, vector: Vec3) -> Vec3 {
        self.rotation.conjugate() * vector
    }
}

/// Plane in Hessian form: points `p` with `normal · p + distance == 0`.
/// Positive signed distances are outside.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Plane {
    pub normal: Vec3,
    pub distance: f32,
}

impl Plane {
    pub fn new(normal: Vec3, distance: f32) -> Self {
        Self { normal, distance }
    }

    /// Plane with the given normal passing through `point`.
    pub fn through(normal: Vec3, point: Vec3) -> Self {
        Self {
            normal,
            distance: -normal.dot(point),
        }
    }

    pub fn signed_distance(&self, point: Vec3) -> f32 {
        self.normal.dot(point) + self.distance
    }

    pub fn flipped(&self) -> Plane {
        Plane {
            normal: -self.normal,
            distance: -self.distance,
        }
    }

    pub fn transformed(&self, transform: &Transform) -> Plane {
        let normal = transform.transform_vector(self.normal);
        Plane {
            normal,
            distance: self.distance - normal.dot(transform.position),
        }
    }
}

/// Axis-aligned bounding box used for collider bounds and BVH nodes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Default for Aabb {
    fn default() -> Self {
        Self::empty()
    }
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn empty() -> Self {
        Self {
            min: Vec3::splat(f32::INFINITY),
            max: Vec3::splat(f32::NEG_INFINITY),
        }
    }

    pub fn from_center_extent(center: Vec3, extent: Vec3) -> Self {
        Self {
            min: center - extent,
            max: center + extent,
        }
    }

    pub fn extend(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    pub fn from_points(points: &[Vec3]) -> Self {
        let mut bounds = Self::empty();
        for &p in points {
            bounds.extend(p);
        }
        bounds
    }

    pub fn is_valid(&self) -> bool {
        self.min.cmple(self.max).all()
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn extent(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    pub fn radius(&self) -> f32 {
        self.extent().length()
    }

    pub fn surface_area(&self) -> f32 {
        let d = self.max - self.min;
        2.0 * (d.x * d.y + d.y * d.z + d.z * d.x)
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn expanded(&self, amount: f32) -> Aabb {
        Aabb {
            min: self.min - Vec3::splat(amount),
            max: self.max + Vec3::splat(amount),
        }
    }

    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.min.cmple(other.max).all() && other.min.cmple(self.max).all()
    }

    pub fn contains_point(&self, point: Vec3) -> bool {
        self.min.cmple(point).all() && point.cmple(self.max).all()
    }

    /// Bounds of this box after applying `transform`.
    pub fn transformed(&self, transform: &Transform) -> Aabb {
        let rotation = Mat3::from_quat(transform.rotation);
        let abs = Mat3::from_cols(
            rotation.x_axis.abs(),
            rotation.y_axis.abs(),
            rotation.z_axis.abs(),
        );
        Aabb::from_center_extent(
            transform.transform_point(self.center()),
            abs * self.extent(),
        )
    }

    /// Slab test of the segment `origin + t * displacement`, `t` in
    /// `[0, max_fraction]`. `reciprocal` is the safe reciprocal of the
    /// displacement.
    pub fn raycast(&self, origin: Vec3, reciprocal: Vec3, max_fraction: f32) -> bool {
        let t1 = (self.min - origin) * reciprocal;
        let t2 = (self.max - origin) * reciprocal;
        let enter = t1.min(t2).max_element().max(0.0);
        let exit = t1.max(t2).min_element().min(max_fraction);
        enter <= exit
    }
}

/// Center of mass, principal axes and principal inertia per unit mass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MassDistribution {
    pub transform: Transform,
    pub inertia_tensor: Vec3,
}

/// Mass properties of a collider at unit density.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MassProperties {
    pub mass_distribution: MassDistribution,
    pub volume: f32,
    /// Upper bound on how far any surface point moves per radian of rotation
    /// about the center of mass.
    pub angular_expansion_factor: f32,
}

impl Default for MassProperties {
    fn default() -> Self {
        Self::UNIT_SPHERE
    }
}

impl MassProperties {
    pub const UNIT_SPHERE: Self = Self {
        mass_distribution: MassDistribution {
            transform: Transform::IDENTITY,
            inertia_tensor: Vec3::splat(0.4),
        },
        volume: 4.0 / 3.0 * std::f32::consts::PI,
        angular_expansion_factor: 0.0,
    };

    /// Solid box approximation used where an exact tensor is not available.
    pub fn from_aabb(aabb: &Aabb) -> Self {
        let size = aabb.max - aabb.min;
        MassProperties {
            mass_distribution: MassDistribution {
                transform: Transform::from_position(aabb.center()),
                inertia_tensor: Vec3::new(
                    (size.y * size.y + size.z * size.z) / 12.0,
                    (size.x * size.x + size.z * size.z) / 12.0,
                    (size.x * size.x + size.y * size.y) / 12.0,
                ),
            },
            volume: size.x * size.y * size.z,
            angular_expansion_factor: aabb.radius(),
        }
    }

    /// Full inertia tensor in the collider frame.
    pub fn inertia_matrix(&self) -> Mat3 {
        let r = Mat3::from_quat(self.mass_distribution.transform.rotation);
        r * Mat3::from_diagonal(self.mass_distribution.inertia_tensor) * r.transpose()
    }
}

bitflags! {
    /// Behaviour toggles carried by a [`Material`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct MaterialFlags: u8 {
        const IS_TRIGGER = 1 << 0;
        const ENABLE_COLLISION_EVENTS = 1 << 1;
    }
}

/// How two coefficients are merged. When the two materials disagree, the
/// policy declared later in this enum wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum CombinePolicy {
    #[default]
    GeometricMean,
    Minimum,
    Maximum,
    ArithmeticMean,
}

impl CombinePolicy {
    pub fn combine(self, a: f32, b: f32) -> f32 {
        match self {
            CombinePolicy::GeometricMean => (a * b).max(0.0).sqrt(),
            CombinePolicy::Minimum => a.min(b),
            CombinePolicy::Maximum => a.max(b),
            CombinePolicy::ArithmeticMean => 0.5 * (a + b),
        }
    }
}

/// Surface properties of a collider.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Material {
    pub friction: f32,
    pub restitution: f32,
    pub friction_combine: CombinePolicy,
    pub restitution_combine: CombinePolicy,
    pub flags: MaterialFlags,
    pub custom_tags: u8,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            friction: 0.5,
            restitution: 0.0,
            friction_combine: CombinePolicy::GeometricMean,
            restitution_combine: CombinePolicy::Maximum,
            flags: MaterialFlags::empty(),
            custom_tags: 0,
        }
    }
}

impl Material {
    pub fn rubber() -> Self {
        Self {
            friction: 1.0,
            restitution: 0.8,
            ..Self::default()
        }
    }

    pub fn ice() -> Self {
        Self {
            friction: 0.03,
            restitution: 0.05,
            friction_combine: CombinePolicy::Minimum,
            ..Self::default()
        }
    }

    pub fn trigger() -> Self {
        Self {
            flags: MaterialFlags::IS_TRIGGER,
            ..Self::default()
        }
    }

    pub fn with_flags(mut self, flags: MaterialFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn is_trigger(&self) -> bool {
        self.flags.contains(MaterialFlags::IS_TRIGGER)
    }

    pub fn raises_collision_events(&self) -> bool {
        self.flags.contains(MaterialFlags::ENABLE_COLLISION_EVENTS)
    }

    pub fn combine_friction(a: &Material, b: &Material) -> f32 {
        a.friction_combine
            .max(b.friction_combine)
            .combine(a.friction, b.friction)
    }

    pub fn combine_restitution(a: &Material, b: &Material) -> f32 {
        a.restitution_combine
            .max(b.restitution_combine)
            .combine(a.restitution, b.restitution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn combine_policies() {
        assert_relative_eq!(CombinePolicy::ArithmeticMean.combine(0.6, 0.2), 0.4);
        assert_relative_eq!(CombinePolicy::Minimum.combine(0.6, 0.2), 0.2);
        assert_relative_eq!(CombinePolicy::Maximum.combine(0.6, 0.2), 0.6);
        assert_relative_eq!(
            CombinePolicy::GeometricMean.combine(0.6, 0.2),
            (0.6_f32 * 0.2).sqrt()
        );
    }

    #[test]
    fn stronger_policy_wins() {
        let ice = Material::ice();
        let rubber = Material::rubber();
        assert_relative_eq!(Material::combine_friction(&ice, &rubber), 0.03);
        assert_relative_eq!(Material::combine_restitution(&ice, &rubber), 0.8);
    }

    #[test]
    fn transform_inverse_round_trips() {
        let t = Transform::new(Quat::from_rotation_y(0.7), Vec3::new(1.0, 2.0, 3.0));
        let p = Vec3::new(-0.5, 4.0, 2.0);
        let back = t.inverse().transform_point(t.transform_point(p));
        assert_relative_eq!(back.x, p.x, epsilon = 1e-5);
        assert_relative_eq!(back.y, p.y, epsilon = 1e-5);
        assert_relative_eq!(back.z, p.z, epsilon = 1e-5);

        let other = Transform::from_position(Vec3::X);
        let a = t.inverse().combine(&other);
        let b = t.inverse_combine(&other);
        assert_relative_eq!(a.position.distance(b.position), 0.0, epsilon = 1e-5);
    }

    #[test]
    fn plane_transform_keeps_points_on_plane() {
        let plane = Plane::through(Vec3::Y, Vec3::new(0.0, 1.0, 0.0));
        let t = Transform::new(Quat::from_rotation_z(0.4), Vec3::new(2.0, 0.0, 1.0));
        let moved = plane.transformed(&t);
        let point = t.transform_point(Vec3::new(3.0, 1.0, -2.0));
        assert_relative_eq!(moved.signed_distance(point), 0.0, epsilon = 1e-5);
    }

    #[test]
    fn aabb_slab_raycast() {
        let aabb = Aabb::new(Vec3::splat(-1.0), Vec3::splat(1.0));
        let origin = Vec3::new(-3.0, 0.0, 0.0);
        let rcp = crate::utils::math::safe_reciprocal(Vec3::new(6.0, 0.0, 0.0));
        assert!(aabb.raycast(origin, rcp, 1.0));
        assert!(!aabb.raycast(origin, rcp, 0.2));
        let above = Vec3::new(-3.0, 2.0, 0.0);
        assert!(!aabb.raycast(above, rcp, 1.0));
    }
}
