use std::f32::consts::FRAC_PI_2;

use glam::Vec3;

use crate::core::collider::{ColliderHeader, ColliderType};
use crate::core::convex_hull::{ConvexHull, Face};
use crate::core::filter::CollisionFilter;
use crate::core::geometry::GeometryError;
use crate::core::types::{Aabb, MassDistribution, MassProperties, Material, Plane, Transform};
use crate::utils::simd::max_distance_from;

const COPLANAR_TOLERANCE: f32 = 1e-4;

/// Flat triangle or quad. The hull has two faces, front and back, sharing
/// the same vertices in opposite order.
#[derive(Debug, Clone, PartialEq)]
pub struct PolygonCollider {
    pub(crate) header: ColliderHeader,
    pub(crate) hull: ConvexHull,
}

impl PolygonCollider {
    pub fn create_triangle(
        vertices: [Vec3; 3],
        filter: CollisionFilter,
        material: Material,
    ) -> Result<Self, GeometryError> {
        check_vertices(&vertices)?;
        if polygon_normal(&vertices).is_none() {
            return Err(GeometryError::DegeneratePolygon);
        }
        Ok(Self::from_vertices(&vertices, filter, material))
    }

    pub fn create_quad(
        vertices: [Vec3; 4],
        filter: CollisionFilter,
        material: Material,
    ) -> Result<Self, GeometryError> {
        check_vertices(&vertices)?;
        let normal = polygon_normal(&vertices).ok_or(GeometryError::DegeneratePolygon)?;
        if normal.dot(vertices[3] - vertices[0]).abs() > COPLANAR_TOLERANCE {
            return Err(GeometryError::NonPlanarQuad);
        }
        Ok(Self::from_vertices(&vertices, filter, material))
    }

    /// Builds a triangle or quad leaf from mesh or terrain data without
    /// validating it.
    pub(crate) fn from_vertices(vertices: &[Vec3], filter: CollisionFilter, material: Material) -> Self {
        debug_assert!(vertices.len() == 3 || vertices.len() == 4);
        let collider_type = if vertices.len() == 3 {
            ColliderType::Triangle
        } else {
            ColliderType::Quad
        };
        let n = vertices.len() as u8;
        let normal = polygon_normal(vertices).unwrap_or(Vec3::Y);

        let mut hull = ConvexHull::with_capacity(4, 2, 8);
        hull.vertices.extend_from_slice(vertices);
        let front = Plane::through(normal, vertices[0]);
        hull.face_planes.extend([front, front.flipped()]);
        hull.faces.push(Face::new(0, n, FRAC_PI_2));
        hull.faces.push(Face::new(u16::from(n), n, FRAC_PI_2));
        hull.face_vertex_indices.extend(0..n);
        hull.face_vertex_indices.extend((0..n).rev());

        let mut header = ColliderHeader::new(collider_type, filter, material);
        header.bump_version();
        Self { header, hull }
    }

    pub fn is_triangle(&self) -> bool {
        self.header.collider_type() == ColliderType::Triangle
    }

    pub fn is_quad(&self) -> bool {
        self.header.collider_type() == ColliderType::Quad
    }

    pub fn vertices(&self) -> &[Vec3] {
        &self.hull.vertices
    }

    pub fn normal(&self) -> Vec3 {
        self.hull.face_planes[0].normal
    }

    pub fn mass_properties(&self) -> MassProperties {
        let vertices = self.vertices();
        let centroid = vertices.iter().copied().sum::<Vec3>() / vertices.len() as f32;
        let radius = max_distance_from(vertices, centroid);
        MassProperties {
            mass_distribution: MassDistribution {
                transform: Transform::from_position(centroid),
                inertia_tensor: Vec3::splat(0.4 * radius * radius),
            },
            volume: 0.0,
            angular_expansion_factor: radius,
        }
    }

    pub fn calculate_aabb(&self, transform: &Transform) -> Aabb {
        let mut aabb = Aabb::empty();
        for v in self.vertices() {
            aabb.extend(transform.transform_point(*v));
        }
        aabb
    }
}

fn check_vertices(vertices: &[Vec3]) -> Result<(), GeometryError> {
    match vertices.iter().position(|v| !v.is_finite()) {
        Some(index) => Err(GeometryError::InvalidVertex(index)),
        None => Ok(()),
    }
}

fn polygon_normal(vertices: &[Vec3]) -> Option<Vec3> {
    let normal = (vertices[1] - vertices[0]).cross(vertices[2] - vertices[0]);
    normal.try_normalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quad_must_be_planar() {
        let flat = [
            Vec3::ZERO,
            Vec3::X,
            Vec3::new(1.0, 0.0, 1.0),
            Vec3::Z,
        ];
        let quad = PolygonCollider::create_quad(flat, CollisionFilter::DEFAULT, Material::default())
            .unwrap();
        assert!(quad.is_quad());
        assert_eq!(quad.normal(), -Vec3::Y);
        assert_eq!(quad.hull.face_vertex_indices, vec![0, 1, 2, 3, 3, 2, 1, 0]);

        let mut bent = flat;
        bent[3].y = 0.1;
        assert_eq!(
            PolygonCollider::create_quad(bent, CollisionFilter::DEFAULT, Material::default()),
            Err(GeometryError::NonPlanarQuad)
        );
    }

    #[test]
    fn triangle_rejects_collinear_vertices() {
        let verts = [Vec3::ZERO, Vec3::X, Vec3::X * 2.0];
        assert_eq!(
            PolygonCollider::create_triangle(verts, CollisionFilter::DEFAULT, Material::default()),
            Err(GeometryError::DegeneratePolygon)
        );
    }
}
