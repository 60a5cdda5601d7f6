use glam::Vec3;

use crate::core::collider::{ColliderHeader, ColliderType};
use crate::core::convex_hull::ConvexHull;
use crate::core::filter::CollisionFilter;
use crate::core::geometry::{GeometryError, SphereGeometry};
use crate::core::types::{Aabb, MassProperties, Material, Transform};

/// A single-vertex hull whose convex radius is the sphere radius.
#[derive(Debug, Clone, PartialEq)]
pub struct SphereCollider {
    pub(crate) header: ColliderHeader,
    pub(crate) hull: ConvexHull,
    geometry: SphereGeometry,
}

impl SphereCollider {
    pub fn create(
        geometry: SphereGeometry,
        filter: CollisionFilter,
        material: Material,
    ) -> Result<Self, GeometryError> {
        geometry.validate()?;
        let mut collider = Self {
            header: ColliderHeader::new(ColliderType::Sphere, filter, material),
            hull: ConvexHull::with_capacity(1, 0, 0),
            geometry,
        };
        collider.apply_geometry(geometry);
        Ok(collider)
    }

    pub fn geometry(&self) -> SphereGeometry {
        self.geometry
    }

    pub fn set_geometry(&mut self, geometry: SphereGeometry) -> Result<(), GeometryError> {
        geometry.validate()?;
        if geometry != self.geometry {
            self.apply_geometry(geometry);
        }
        Ok(())
    }

    fn apply_geometry(&mut self, geometry: SphereGeometry) {
        self.geometry = geometry;
        self.hull.vertices.clear();
        self.hull.vertices.push(geometry.center);
        self.hull.convex_radius = geometry.radius;
        self.header.bump_version();
    }

    pub fn center(&self) -> Vec3 {
        self.geometry.center
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
