use std::collections::HashMap;

use bitflags::bitflags;
use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::bvh::Bvh;
use super::collider::{Collider, ColliderError, ColliderHeader, ColliderType, Leaf, LeafCollider};
use super::filter::CollisionFilter;
use super::geometry::GeometryError;
use super::shapes::PolygonCollider;
use super::types::{Aabb, MassProperties, Material};
use crate::utils::math::bits_for_count;

const QUAD_COPLANAR_COS: f32 = 0.9999;

bitflags! {
    /// How the four vertex slots of a [`MeshPrimitive`] are used.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct PrimitiveFlags: u8 {
        /// Two triangles `(0, 1, 2)` and `(0, 2, 3)`.
        const IS_TRIANGLE_PAIR = 1 << 0;
        /// The pair is planar and convex and is handled as one quad.
        const IS_QUAD = 1 << 1;
    }
}

/// Up to two triangles sharing the edge `(0, 2)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeshPrimitive {
    pub vertices: [u32; 4],
    pub flags: PrimitiveFlags,
}

impl MeshPrimitive {
    pub fn num_polygons(&self) -> usize {
        if self.flags.contains(PrimitiveFlags::IS_TRIANGLE_PAIR)
            && !self.flags.contains(PrimitiveFlags::IS_QUAD)
        {
            2
        } else {
            1
        }
    }
}

/// Triangle mesh cooked into primitives and indexed by a BVH.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshCollider {
    pub(crate) header: ColliderHeader,
    vertices: Vec<Vec3>,
    primitives: Vec<MeshPrimitive>,
    bvh: Bvh,
    num_collider_key_bits: u32,
    aabb: Aabb,
}

impl MeshCollider {
    pub fn vertices(&self) -> &[Vec3] {
        &self.vertices
    }

    pub fn primitives(&self) -> &[MeshPrimitive] {
        &self.primitives
    }

    pub fn num_collider_key_bits(&self) -> u32 {
        self.num_collider_key_bits
    }

    pub fn local_aabb(&self) -> Aabb {
        self.aabb
    }

    /// Solid-box approximation over the mesh bounds.
    pub fn mass_properties(&self) -> MassProperties {
        MassProperties::from_aabb(&self.aabb)
    }

    /// Corner positions of polygon `polygon_index` of `primitive`.
    pub fn polygon_vertices(&self, primitive: &MeshPrimitive, polygon_index: usize) -> ([Vec3; 4], usize) {
        let v = primitive.vertices.map(|i| self.vertices[i as usize]);
        if primitive.flags.contains(PrimitiveFlags::IS_QUAD) {
            (v, 4)
        } else if polygon_index == 0 {
            ([v[0], v[1], v[2], v[2]], 3)
        } else {
            ([v[0], v[2], v[3], v[3]], 3)
        }
    }

    /// Polygon addressed by a `primitive << 1 | polygon` sub-key.
    pub fn polygon(&self, sub_key: u32) -> Option<PolygonCollider> {
        let primitive = self.primitives.get((sub_key >> 1) as usize)?;
        let polygon_index = (sub_key & 1) as usize;
        if polygon_index >= primitive.num_polygons() {
            return None;
        }
        let (vertices, count) = self.polygon_vertices(primitive, polygon_index);
        Some(PolygonCollider::from_vertices(
            &vertices[..count],
            self.header.filter(),
            self.header.material(),
        ))
    }

    pub(crate) fn visit_polygons(
        &self,
        bounds: &Aabb,
        visitor: &mut dyn FnMut(Leaf<'_>) -> bool,
    ) -> bool {
        self.bvh.query_overlaps(bounds, |index| {
            let primitive = &self.primitives[index];
            for polygon_index in 0..primitive.num_polygons() {
                let sub_key = ((index as u32) << 1) | polygon_index as u32;
                let (vertices, count) = self.polygon_vertices(primitive, polygon_index);
                if !Aabb::from_points(&vertices[..count]).overlaps(bounds) {
                    continue;
                }
                let polygon = PolygonCollider::from_vertices(
                    &vertices[..count],
                    self.header.filter(),
                    self.header.material(),
                );
                let leaf = Leaf {
                    parent_from_leaf: Default::default(),
                    num_key_bits: self.num_collider_key_bits,
                    sub_key,
                    collider: LeafCollider::Polygon(Collider::from_polygon(polygon)),
                };
                if !visitor(leaf) {
                    return false;
                }
            }
            true
        })
    }

    pub(crate) fn primitive_bvh(&self) -> &Bvh {
        &self.bvh
    }
}

/// Cooks raw vertex/index buffers into a [`MeshCollider`].
#[derive(Debug, Clone)]
pub struct MeshBuilder {
    vertices: Vec<Vec3>,
    triangles: Vec<[u32; 3]>,
    weld_epsilon: f32,
    filter: CollisionFilter,
    material: Material,
}

impl MeshBuilder {
    pub fn new(vertices: Vec<Vec3>, triangles: Vec<[u32; 3]>) -> Self {
        Self {
            vertices,
            triangles,
            weld_epsilon: 0.0,
            filter: CollisionFilter::DEFAULT,
            material: Material::default(),
        }
    }

    /// Merges vertices that fall into the same `epsilon` grid cell.
    pub fn weld_vertices(mut self, epsilon: f32) -> Self {
        self.weld_epsilon = epsilon;
        self
    }

    pub fn filter(mut self, filter: CollisionFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn material(mut self, material: Material) -> Self {
        self.material = material;
        self
    }

    pub fn build(mut self) -> Result<MeshCollider, ColliderError> {
        if let Some(index) = self.vertices.iter().position(|v| !v.is_finite()) {
            return Err(GeometryError::InvalidVertex(index).into());
        }
        let vertex_count = self.vertices.len();
        for (triangle, indices) in self.triangles.iter().enumerate() {
            if let Some(&index) = indices.iter().find(|&&i| i as usize >= vertex_count) {
                return Err(ColliderError::IndexOutOfRange {
                    triangle,
                    index,
                    vertex_count,
                });
            }
        }

        if self.weld_epsilon > 0.0 {
            self.weld();
        }

        let vertices = &self.vertices;
        let before = self.triangles.len();
        self.triangles.retain(|t| {
            let [a, b, c] = t.map(|i| vertices[i as usize]);
            (b - a).cross(c - a).length_squared() > 0.0
        });
        if self.triangles.len() != before {
            log::debug!(
                "mesh: dropped {} degenerate triangles",
                before - self.triangles.len()
            );
        }
        if self.triangles.is_empty() {
            return Err(ColliderError::EmptyMesh);
        }

        let primitives = pair_triangles(&self.vertices, &self.triangles);
        let primitive_bounds: Vec<Aabb> = primitives
            .iter()
            .map(|p| {
                let mut aabb = Aabb::empty();
                for &i in &p.vertices {
                    aabb.extend(self.vertices[i as usize]);
                }
                aabb
            })
            .collect();
        let bvh = Bvh::build(&primitive_bounds);
        let aabb = bvh.root_bounds();

        let mut header = ColliderHeader::new(ColliderType::Mesh, self.filter, self.material);
        header.bump_version();

        Ok(MeshCollider {
            header,
            num_collider_key_bits: bits_for_count((primitives.len() as u32) << 1),
            vertices: self.vertices,
            primitives,
            bvh,
            aabb,
        })
    }

    fn weld(&mut self) {
        let inv = 1.0 / self.weld_epsilon;
        let mut map: HashMap<(i32, i32, i32), u32> = HashMap::new();
        let mut welded: Vec<Vec3> = Vec::new();
        let mut remap: Vec<u32> = Vec::with_capacity(self.vertices.len());

        for v in &self.vertices {
            let key = (
                (v.x * inv).round() as i32,
                (v.y * inv).round() as i32,
                (v.z * inv).round() as i32,
            );
            let index = *map.entry(key).or_insert_with(|| {
                welded.push(*v);
                welded.len() as u32 - 1
            });
            remap.push(index);
        }

        for tri in &mut self.triangles {
            *tri = tri.map(|i| remap[i as usize]);
        }
        self.vertices = welded;
    }
}

/// Greedily merges each triangle with the next one when they share an edge
/// with consistent winding.
fn pair_triangles(vertices: &[Vec3], triangles: &[[u32; 3]]) -> Vec<MeshPrimitive> {
    let mut primitives = Vec::with_capacity(triangles.len());
    let mut i = 0;
    while i < triangles.len() {
        let t0 = triangles[i];
        let paired = triangles
            .get(i + 1)
            .and_then(|t1| shared_edge_quad(t0, *t1));
        match paired {
            Some(quad) => {
                let mut flags = PrimitiveFlags::IS_TRIANGLE_PAIR;
                if is_planar_convex_quad(quad.map(|v| vertices[v as usize])) {
                    flags |= PrimitiveFlags::IS_QUAD;
                }
                primitives.push(MeshPrimitive {
                    vertices: quad,
                    flags,
                });
                i += 2;
            }
            None => {
                primitives.push(MeshPrimitive {
                    vertices: [t0[0], t0[1], t0[2], t0[2]],
                    flags: PrimitiveFlags::empty(),
                });
                i += 1;
            }
        }
    }
    primitives
}

/// Finds `[p, q, r, s]` with `t0 ~ (p, q, r)` and `t1 ~ (p, r, s)`.
fn shared_edge_quad(t0: [u32; 3], t1: [u32; 3]) -> Option<[u32; 4]> {
    for k in 0..3 {
        let (p, q, r) = (t0[k], t0[(k + 1) % 3], t0[(k + 2) % 3]);
        for m in 0..3 {
            if t1[m] == p && t1[(m + 1) % 3] == r {
                let s = t1[(m + 2) % 3];
                if s != q {
                    return Some([p, q, r, s]);
                }
            }
        }
    }
    None
}

fn is_planar_convex_quad(v: [Vec3; 4]) -> bool {
    let n0 = (v[1] - v[0]).cross(v[2] - v[0]);
    let n1 = (v[2] - v[0]).cross(v[3] - v[0]);
    let (Some(n0), Some(n1)) = (n0.try_normalize(), n1.try_normalize()) else {
        return false;
    };
    if n0.dot(n1) < QUAD_COPLANAR_COS {
        return false;
    }
    (0..4).all(|i| {
        let a = v[i];
        let b = v[(i + 1) % 4];
        let c = v[(i + 2) % 4];
        (b - a).cross(c - b).dot(n0) > 0.0
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> (Vec<Vec3>, Vec<[u32; 3]>) {
        (
            vec![
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(0.0, 0.0, 1.0),
                Vec3::new(1.0, 0.0, 1.0),
                Vec3::new(1.0, 0.0, 0.0),
            ],
            vec![[0, 1, 2], [0, 2, 3]],
        )
    }

    #[test]
    fn coplanar_pair_becomes_quad() {
        let (v, t) = square();
        let mesh = MeshBuilder::new(v, t).build().unwrap();
        assert_eq!(mesh.primitives().len(), 1);
        assert!(mesh.primitives()[0].flags.contains(PrimitiveFlags::IS_QUAD));
        assert_eq!(mesh.primitives()[0].num_polygons(), 1);
        assert!(mesh.polygon(0).map(|p| p.is_quad()).unwrap_or(false));
        assert!(mesh.polygon(1).is_none());
    }

    #[test]
    fn folded_pair_keeps_two_triangles() {
        let (mut v, t) = square();
        v[3].y = 0.5;
        let mesh = MeshBuilder::new(v, t).build().unwrap();
        let primitive = mesh.primitives()[0];
        assert!(primitive.flags.contains(PrimitiveFlags::IS_TRIANGLE_PAIR));
        assert!(!primitive.flags.contains(PrimitiveFlags::IS_QUAD));
        assert_eq!(primitive.num_polygons(), 2);
        assert!(mesh.polygon(1).map(|p| p.is_triangle()).unwrap_or(false));
    }

    #[test]
    fn welding_merges_duplicates() {
        let vertices = vec![
            Vec3::ZERO,
            Vec3::X,
            Vec3::Z,
            Vec3::new(1e-5, 0.0, 0.0),
            Vec3::Z,
            Vec3::new(-1.0, 0.0, 0.0),
        ];
        let mesh = MeshBuilder::new(vertices, vec![[0, 2, 1], [3, 5, 4]])
            .weld_vertices(1e-3)
            .build()
            .unwrap();
        assert_eq!(mesh.vertices().len(), 4);
    }

    #[test]
    fn invalid_inputs() {
        assert_eq!(
            MeshBuilder::new(vec![Vec3::ZERO], vec![[0, 1, 2]]).build(),
            Err(ColliderError::IndexOutOfRange {
                triangle: 0,
                index: 1,
                vertex_count: 1
            })
        );
        assert_eq!(
            MeshBuilder::new(vec![Vec3::ZERO, Vec3::X, Vec3::X * 2.0], vec![[0, 1, 2]]).build(),
            Err(ColliderError::EmptyMesh)
        );
    }
}
