//! Height-field collider with a min/max quadtree over its quads.

use glam::Vec3;

use super::bvh::SpatialVisitor;
use super::collider::{Collider, ColliderError, ColliderHeader, ColliderType, Leaf, LeafCollider};
use super::filter::CollisionFilter;
use super::shapes::PolygonCollider;
use super::types::{Aabb, MassProperties, Material};
use crate::utils::math::bits_for_count;

#[derive(Debug, Clone, PartialEq)]
struct QuadTreeLevel {
    dims: [usize; 2],
    min: Vec<f32>,
    max: Vec<f32>,
}

/// Grid of `size[0] x size[1]` height samples. Sample `(x, z)` sits at
/// `(x, height, z) * scale`; each grid cell is split into two triangles.
#[derive(Debug, Clone, PartialEq)]
pub struct TerrainCollider {
    pub(crate) header: ColliderHeader,
    size: [usize; 2],
    heights: Vec<f32>,
    scale: Vec3,
    /// Root first, one min/max entry per quad on the last level.
    levels: Vec<QuadTreeLevel>,
    num_collider_key_bits: u32,
    aabb: Aabb,
}

impl TerrainCollider {
    pub fn create(
        size: [usize; 2],
        heights: Vec<f32>,
        scale: Vec3,
        filter: CollisionFilter,
        material: Material,
    ) -> Result<Self, ColliderError> {
        if size[0] < 2 || size[1] < 2 {
            return Err(ColliderError::TerrainTooSmall(size[0], size[1]));
        }
        let expected = size[0] * size[1];
        if heights.len() != expected {
            return Err(ColliderError::HeightCountMismatch {
                expected,
                actual: heights.len(),
            });
        }
        if let Some(index) = heights.iter().position(|h| !h.is_finite()) {
            return Err(ColliderError::InvalidHeight(index));
        }
        if !scale.is_finite() || !scale.cmpgt(Vec3::ZERO).all() {
            return Err(ColliderError::InvalidTerrainScale);
        }

        let quads = [size[0] - 1, size[1] - 1];
        let mut terrain = Self {
            header: ColliderHeader::new(ColliderType::Terrain, filter, material),
            size,
            heights,
            scale,
            levels: Vec::new(),
            num_collider_key_bits: bits_for_count((quads[0] * quads[1] * 2) as u32),
            aabb: Aabb::empty(),
        };
        terrain.build_quadtree();
        terrain.aabb = terrain.node_bounds(0, 0, 0);
        terrain.header.bump_version();
        Ok(terrain)
    }

    fn build_quadtree(&mut self) {
        let quads = self.num_quads();
        let mut leaf = QuadTreeLevel {
            dims: quads,
            min: Vec::with_capacity(quads[0] * quads[1]),
            max: Vec::with_capacity(quads[0] * quads[1]),
        };
        for z in 0..quads[1] {
            for x in 0..quads[0] {
                let h = [
                    self.height(x, z),
                    self.height(x + 1, z),
                    self.height(x, z + 1),
                    self.height(x + 1, z + 1),
                ];
                leaf.min.push(h.iter().copied().fold(f32::INFINITY, f32::min));
                leaf.max.push(h.iter().copied().fold(f32::NEG_INFINITY, f32::max));
            }
        }

        let mut levels = vec![leaf];
        while let Some(child) = levels.last().filter(|l| l.dims != [1, 1]) {
            let dims = [child.dims[0].div_ceil(2), child.dims[1].div_ceil(2)];
            let mut parent = QuadTreeLevel {
                dims,
                min: vec![f32::INFINITY; dims[0] * dims[1]],
                max: vec![f32::NEG_INFINITY; dims[0] * dims[1]],
            };
            for cz in 0..child.dims[1] {
                for cx in 0..child.dims[0] {
                    let c = cx + cz * child.dims[0];
                    let p = cx / 2 + (cz / 2) * dims[0];
                    parent.min[p] = parent.min[p].min(child.min[c]);
                    parent.max[p] = parent.max[p].max(child.max[c]);
                }
            }
            levels.push(parent);
        }
        levels.reverse();
        self.levels = levels;
    }

    pub fn size(&self) -> [usize; 2] {
        self.size
    }

    pub fn scale(&self) -> Vec3 {
        self.scale
    }

    pub fn num_quads(&self) -> [usize; 2] {
        [self.size[0] - 1, self.size[1] - 1]
    }

    pub fn num_collider_key_bits(&self) -> u32 {
        self.num_collider_key_bits
    }

    pub fn local_aabb(&self) -> Aabb {
        self.aabb
    }

    pub fn mass_properties(&self) -> MassProperties {
        MassProperties::from_aabb(&self.aabb)
    }

    pub fn height(&self, x: usize, z: usize) -> f32 {
        self.heights[x + z * self.size[0]]
    }

    fn vertex(&self, x: usize, z: usize) -> Vec3 {
        Vec3::new(x as f32, self.height(x, z), z as f32) * self.scale
    }

    /// Corners of quad `(x, z)` wound so the surface faces +Y.
    pub fn quad_vertices(&self, x: usize, z: usize) -> [Vec3; 4] {
        [
            self.vertex(x, z),
            self.vertex(x, z + 1),
            self.vertex(x + 1, z + 1),
            self.vertex(x + 1, z),
        ]
    }

    /// The two triangles of quad `(x, z)`: `(a, b, c)` and `(a, c, d)`.
    pub fn quad_triangles(&self, x: usize, z: usize) -> [[Vec3; 3]; 2] {
        let [a, b, c, d] = self.quad_vertices(x, z);
        [[a, b, c], [a, c, d]]
    }

    pub(crate) fn quad_coords(&self, quad: usize) -> [usize; 2] {
        let width = self.size[0] - 1;
        [quad % width, quad / width]
    }

    /// Triangle addressed by a `quad << 1 | triangle` sub-key.
    pub fn polygon(&self, sub_key: u32) -> Option<PolygonCollider> {
        let quad = (sub_key >> 1) as usize;
        let quads = self.num_quads();
        if quad >= quads[0] * quads[1] {
            return None;
        }
        let [x, z] = self.quad_coords(quad);
        let triangle = self.quad_triangles(x, z)[(sub_key & 1) as usize];
        Some(PolygonCollider::from_vertices(
            &triangle,
            self.header.filter(),
            self.header.material(),
        ))
    }

    fn node_bounds(&self, level: usize, x: usize, z: usize) -> Aabb {
        let depth = self.levels.len() - 1;
        let span = 1usize << (depth - level);
        let quads = self.num_quads();
        let node = &self.levels[level];
        let index = x + z * node.dims[0];
        let x0 = x * span;
        let z0 = z * span;
        let x1 = ((x + 1) * span).min(quads[0]);
        let z1 = ((z + 1) * span).min(quads[1]);
        Aabb::new(
            Vec3::new(x0 as f32, node.min[index], z0 as f32) * self.scale,
            Vec3::new(x1 as f32, node.max[index], z1 as f32) * self.scale,
        )
    }

    /// Walks the quadtree with an explicit stack. Leaves passed to the
    /// visitor are linear quad indices. Returns `false` on early exit.
    pub fn walk<V: SpatialVisitor + ?Sized>(&self, visitor: &mut V) -> bool {
        let leaf_level = self.levels.len() - 1;
        let mut stack = vec![(0usize, 0usize, 0usize)];
        while let Some((level, x, z)) = stack.pop() {
            if !visitor.accept_bounds(&self.node_bounds(level, x, z)) {
                continue;
            }
            if level == leaf_level {
                if !visitor.visit_leaf(x + z * self.levels[level].dims[0]) {
                    return false;
                }
                continue;
            }
            let child_dims = self.levels[level + 1].dims;
            for (dx, dz) in [(1, 1), (0, 1), (1, 0), (0, 0)] {
                let cx = 2 * x + dx;
                let cz = 2 * z + dz;
                if cx < child_dims[0] && cz < child_dims[1] {
                    stack.push((level + 1, cx, cz));
                }
            }
        }
        true
    }

    pub(crate) fn visit_polygons(
        &self,
        bounds: &Aabb,
        visitor: &mut dyn FnMut(Leaf<'_>) -> bool,
    ) -> bool {
        struct Overlap<'a, 'v> {
            terrain: &'a TerrainCollider,
            bounds: &'a Aabb,
            visitor: &'v mut dyn FnMut(Leaf<'_>) -> bool,
        }

        impl SpatialVisitor for Overlap<'_, '_> {
            fn accept_bounds(&mut self, bounds: &Aabb) -> bool {
                bounds.overlaps(self.bounds)
            }

            fn visit_leaf(&mut self, quad: usize) -> bool {
                let [x, z] = self.terrain.quad_coords(quad);
                for (index, triangle) in self.terrain.quad_triangles(x, z).iter().enumerate() {
                    if !Aabb::from_points(triangle).overlaps(self.bounds) {
                        continue;
                    }
                    let polygon = PolygonCollider::from_vertices(
                        triangle,
                        self.terrain.header.filter(),
                        self.terrain.header.material(),
                    );
                    let leaf = Leaf {
                        parent_from_leaf: Default::default(),
                        num_key_bits: self.terrain.num_collider_key_bits,
                        sub_key: ((quad as u32) << 1) | index as u32,
                        collider: LeafCollider::Polygon(Collider::from_polygon(polygon)),
                    };
                    if !(self.visitor)(leaf) {
                        return false;
                    }
                }
                true
            }
        }

        self.walk(&mut Overlap {
            terrain: self,
            bounds,
            visitor,
        })
    }
}
