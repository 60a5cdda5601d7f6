use glam::Vec3;

use crate::core::collider::{ColliderHeader, ColliderType};
use crate::core::convex_hull::ConvexHull;
use crate::core::filter::CollisionFilter;
use crate::core::geometry::{CapsuleGeometry, GeometryError};
use crate::core::types::{Aabb, MassProperties, Material, Transform};

/// Two-vertex hull (the axis segment) rounded by the capsule radius.
#[derive(Debug, Clone, PartialEq)]
pub struct CapsuleCollider {
    pub(crate) header: ColliderHeader,
    pub(crate) hull: ConvexHull,
    geometry: CapsuleGeometry,
}

impl CapsuleCollider {
    pub fn create(
        geometry: CapsuleGeometry,
        filter: CollisionFilter,
        material: Material,
    ) -> Result<Self, GeometryError> {
        geometry.validate()?;
        let mut collider = Self {
            header: ColliderHeader::new(ColliderType::Capsule, filter, material),
            hull: ConvexHull::with_capacity(2, 0, 0),
            geometry,
        };
        collider.apply_geometry(geometry);
        Ok(collider)
    }

    pub fn geometry(&self) -> CapsuleGeometry {
        self.geometry
    }

    pub fn set_geometry(&mut self, geometry: CapsuleGeometry) -> Result<(), GeometryError> {
        geometry.validate()?;
        if geometry != self.geometry {
            self.apply_geometry(geometry);
        }
        Ok(())
    }

    fn apply_geometry(&mut self, geometry: CapsuleGeometry) {
        self.geometry = geometry;
        self.hull.vertices.clear();
        self.hull.vertices.extend([geometry.vertex0, geometry.vertex1]);
        self.hull.convex_radius = geometry.radius;
        self.header.bump_version();
    }

    pub fn vertex0(&self) -> Vec3 {
        self.geometry.vertex0
    }

    pub fn vertex1(&self) -> Vec3 {
        self.geometry.vertex1
    }

    pub fn radius(&self) -> f32 {
        self.geometry.radius
    }

    pub fn mass_properties(&self) -> MassProperties {
        self.geometry.mass_properties()
    }

    pub fn calculate_aabb(&self, transform: &Transform) -> Aabb {
        self.geometry.calculate_aabb(transform)
    }
}
