use std::f32::consts::{FRAC_PI_4, PI, TAU};

use glam::{Quat, Vec3};

use crate::core::collider::{ColliderHeader, ColliderType};
use crate::core::convex_hull::{ConvexHull, Face};
use crate::core::filter::CollisionFilter;
use crate::core::geometry::{CylinderGeometry, GeometryError};
use crate::core::types::{Aabb, MassProperties, Material, Plane, Transform};

const MAX_SIDES: usize = CylinderGeometry::MAX_SIDE_COUNT as usize;

/// Prism approximation of a cylinder around local Z.
///
/// The hull buffers are sized for [`CylinderGeometry::MAX_SIDE_COUNT`] at
/// creation so changing the side count later never reallocates.
#[derive(Debug, Clone, PartialEq)]
pub struct CylinderCollider {
    pub(crate) header: ColliderHeader,
    pub(crate) hull: ConvexHull,
    geometry: CylinderGeometry,
    mass_properties: MassProperties,
}

impl CylinderCollider {
    pub fn create(
        geometry: CylinderGeometry,
        filter: CollisionFilter,
        material: Material,
    ) -> Result<Self, GeometryError> {
        geometry.validate()?;
        let mut collider = Self {
            header: ColliderHeader::new(ColliderType::Cylinder, filter, material),
            hull: ConvexHull::with_capacity(2 * MAX_SIDES, MAX_SIDES + 2, 6 * MAX_SIDES),
            geometry,
            mass_properties: geometry.mass_properties(),
        };
        collider.apply_geometry(geometry);
        Ok(collider)
    }

    pub fn geometry(&self) -> CylinderGeometry {
        self.geometry
    }

    pub fn set_geometry(&mut self, geometry: CylinderGeometry) -> Result<(), GeometryError> {
        geometry.validate()?;
        if geometry != self.geometry {
            self.apply_geometry(geometry);
        }
        Ok(())
    }

    fn apply_geometry(&mut self, geometry: CylinderGeometry) {
        self.geometry = geometry;
        self.mass_properties = geometry.mass_properties();

        let n = geometry.side_count as usize;
        let (radius, half_height) = geometry.core_dimensions();
        let frame = geometry.frame();
        let hull = &mut self.hull;
        hull.convex_radius = geometry.bevel_radius;

        hull.vertices.clear();
        for z in [-half_height, half_height] {
            for i in 0..n {
                let angle = TAU * i as f32 / n as f32;
                let local = Vec3::new(radius * angle.cos(), radius * angle.sin(), z);
                hull.vertices.push(frame.transform_point(local));
            }
        }

        hull.face_planes.clear();
        hull.face_planes.push(Plane::new(-Vec3::Z, -half_height).transformed(&frame));
        hull.face_planes.push(Plane::new(Vec3::Z, -half_height).transformed(&frame));
        let side_distance = -radius * (PI / n as f32).cos();
        for i in 0..n {
            let angle = TAU * (i as f32 + 0.5) / n as f32;
            let normal = Vec3::new(angle.cos(), angle.sin(), 0.0);
            hull.face_planes
                .push(Plane::new(normal, side_distance).transformed(&frame));
        }

        hull.faces.clear();
        hull.face_vertex_indices.clear();
        let side_count = n as u8;
        hull.faces.push(Face::new(0, side_count, FRAC_PI_4));
        hull.face_vertex_indices.extend((0..side_count).map(|i| side_count - 1 - i));
        hull.faces.push(Face::new(u16::from(side_count), side_count, FRAC_PI_4));
        hull.face_vertex_indices.extend((0..side_count).map(|i| side_count + i));

        let side_half_angle = PI / n as f32;
        for i in 0..side_count {
            let first_index = 2 * u16::from(side_count) + 4 * u16::from(i);
            hull.faces.push(Face::new(first_index, 4, side_half_angle));
            let next = (i + 1) % side_count;
            hull.face_vertex_indices
                .extend([i, next, next + side_count, i + side_count]);
        }

        self.header.bump_version();
    }

    pub fn center(&self) -> Vec3 {
        self.geometry.center
    }

    pub fn orientation(&self) -> Quat {
        self.geometry.orientation
    }

    pub fn height(&self) -> f32 {
        self.geometry.height
    }

    pub fn radius(&self) -> f32 {
        self.geometry.radius
    }

    pub fn side_count(&self) -> u32 {
        self.geometry.side_count
    }

    pub fn mass_properties(&self) -> MassProperties {
        self.mass_properties
    }

    pub fn calculate_aabb(&self, transform: &Transform) -> Aabb {
        self.geometry.calculate_aabb(transform)
    }
}
