use glam::{Quat, Vec3};

use crate::core::collider::{ColliderHeader, ColliderType};
use crate::core::convex_hull::{ConvexHull, Edge, Face};
use crate::core::filter::CollisionFilter;
use crate::core::geometry::{BoxGeometry, GeometryError};
use crate::core::types::{Aabb, MassProperties, Material, Plane, Transform};

/// Face loops, four vertices per face, in plane order +X, -X, +Y, -Y, +Z, -Z.
const FACE_VERTEX_INDICES: [u8; 24] = [
    2, 6, 4, 0, //
    1, 5, 7, 3, //
    1, 0, 4, 5, //
    7, 6, 2, 3, //
    3, 2, 0, 1, //
    7, 5, 4, 6,
];

/// One outgoing edge per vertex as `(face, edge)`.
const VERTEX_EDGES: [(u16, u8); 8] = [
    (4, 2),
    (2, 0),
    (4, 1),
    (4, 0),
    (5, 2),
    (5, 1),
    (0, 1),
    (5, 0),
];

/// Twin of every face edge as `(face, edge)`.
const FACE_LINKS: [(u16, u8); 24] = [
    (3, 1),
    (5, 2),
    (2, 1),
    (4, 1),
    (2, 3),
    (5, 0),
    (3, 3),
    (4, 3),
    (4, 2),
    (0, 2),
    (5, 1),
    (1, 0),
    (5, 3),
    (0, 0),
    (4, 0),
    (1, 2),
    (3, 2),
    (0, 3),
    (2, 0),
    (1, 3),
    (1, 1),
    (2, 2),
    (0, 1),
    (3, 0),
];

/// Roughly `pi/4` once quantized; every box edge is a right angle.
const BOX_HALF_ANGLE_COMPRESSED: u8 = 0x80;

/// Eight-vertex hull with full edge adjacency, rounded by the bevel radius.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxCollider {
    pub(crate) header: ColliderHeader,
    pub(crate) hull: ConvexHull,
    geometry: BoxGeometry,
}

impl BoxCollider {
    pub fn create(
        geometry: BoxGeometry,
        filter: CollisionFilter,
        material: Material,
    ) -> Result<Self, GeometryError> {
        geometry.validate()?;
        let mut hull = ConvexHull::with_capacity(8, 6, 24);
        hull.vertex_edges = VERTEX_EDGES
            .iter()
            .map(|&(face, edge)| Edge::new(face, edge))
            .collect();
        hull.face_links = FACE_LINKS
            .iter()
            .map(|&(face, edge)| Edge::new(face, edge))
            .collect();
        hull.face_vertex_indices.extend_from_slice(&FACE_VERTEX_INDICES);
        hull.faces.extend((0..6u16).map(|i| Face {
            first_index: i * 4,
            num_vertices: 4,
            min_half_angle_compressed: BOX_HALF_ANGLE_COMPRESSED,
        }));

        let mut collider = Self {
            header: ColliderHeader::new(ColliderType::Box, filter, material),
            hull,
            geometry,
        };
        collider.apply_geometry(geometry);
        Ok(collider)
    }

    pub fn geometry(&self) -> BoxGeometry {
        self.geometry
    }

    pub fn set_geometry(&mut self, geometry: BoxGeometry) -> Result<(), GeometryError> {
        geometry.validate()?;
        if geometry != self.geometry {
            self.apply_geometry(geometry);
        }
        Ok(())
    }

    fn apply_geometry(&mut self, geometry: BoxGeometry) {
        self.geometry = geometry;
        self.hull.convex_radius = geometry.bevel_radius;

        let he = geometry.core_half_extents();
        let frame = geometry.frame();

        self.hull.vertices.clear();
        for z in [he.z, -he.z] {
            for y in [he.y, -he.y] {
                for x in [he.x, -he.x] {
                    self.hull
                        .vertices
                        .push(frame.transform_point(Vec3::new(x, y, z)));
                }
            }
        }

        self.hull.face_planes.clear();
        for (axis, extent) in [(Vec3::X, he.x), (Vec3::Y, he.y), (Vec3::Z, he.z)] {
            for normal in [axis, -axis] {
                self.hull
                    .face_planes
                    .push(Plane::new(normal, -extent).transformed(&frame));
            }
        }

        self.header.bump_version();
    }

    pub fn center(&self) -> Vec3 {
        self.geometry.center
    }

    pub fn orientation(&self) -> Quat {
        self.geometry.orientation
    }

    pub fn size(&self) -> Vec3 {
        self.geometry.size
    }

    pub fn bevel_radius(&self) -> f32 {
        self.geometry.bevel_radius
    }

    pub fn mass_properties(&self) -> MassProperties {
        self.geometry.mass_properties()
    }

    pub fn calculate_aabb(&self, transform: &Transform) -> Aabb {
        self.geometry.calculate_aabb(transform)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_box() -> BoxCollider {
        BoxCollider::create(
            BoxGeometry::default(),
            CollisionFilter::DEFAULT,
            Material::default(),
        )
        .unwrap()
    }

    #[test]
    fn vertex_order_matches_sign_pattern() {
        let b = unit_box();
        let v = &b.hull.vertices;
        assert_eq!(v[0], Vec3::splat(0.5));
        assert_eq!(v[1], Vec3::new(-0.5, 0.5, 0.5));
        assert_eq!(v[2], Vec3::new(0.5, -0.5, 0.5));
        assert_eq!(v[7], Vec3::splat(-0.5));
    }

    #[test]
    fn face_loops_lie_on_their_planes() {
        let b = unit_box();
        for face in 0..6 {
            let plane = b.hull.face_planes[face];
            for v in b.hull.face_vertices(face) {
                assert_relative_eq!(plane.signed_distance(v), 0.0, epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn face_links_are_symmetric_and_share_vertices() {
        let b = unit_box();
        for face in 0..6u16 {
            for edge in 0..4u8 {
                let link = b.hull.face_links[usize::from(face) * 4 + usize::from(edge)];
                let back = b.hull.face_links[usize::from(link.face_index) * 4 + usize::from(link.edge_index)];
                assert_eq!(back, Edge::new(face, edge));

                let (a0, a1) = b.hull.edge_vertices(Edge::new(face, edge));
                let (b0, b1) = b.hull.edge_vertices(link);
                assert_eq!((a0, a1), (b1, b0));
            }
        }
    }

    #[test]
    fn vertex_edges_start_at_their_vertex() {
        let b = unit_box();
        for (vertex, edge) in b.hull.vertex_edges.iter().enumerate() {
            let (start, _) = b.hull.edge_vertices(*edge);
            assert_eq!(start, b.hull.vertices[vertex]);
        }
    }

    #[test]
    fn bevel_shrinks_core() {
        let geometry = BoxGeometry {
            bevel_radius: 0.1,
            center: Vec3::new(1.0, 0.0, 0.0),
            ..BoxGeometry::default()
        };
        let b = BoxCollider::create(geometry, CollisionFilter::DEFAULT, Material::default()).unwrap();
        assert_relative_eq!(b.hull.vertices[0].x, 1.4);
        assert_relative_eq!(b.hull.convex_radius, 0.1);
        assert_relative_eq!(b.hull.face_planes[0].signed_distance(Vec3::new(1.4, 0.0, 0.0)), 0.0);
    }
}
