//! The `Collider` enum, its shared header, collider keys and leaf visiting.

use std::ops::Deref;
use std::sync::Arc;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::compound::{CompoundChild, CompoundCollider};
use super::convex_hull::ConvexHull;
use super::filter::CollisionFilter;
use super::geometry::{BoxGeometry, CapsuleGeometry, CylinderGeometry, GeometryError, SphereGeometry};
use super::mesh::{MeshBuilder, MeshCollider};
use super::shapes::{BoxCollider, CapsuleCollider, CylinderCollider, PolygonCollider, SphereCollider};
use super::terrain::TerrainCollider;
use super::types::{Aabb, MassProperties, Material, Transform};

/// Concrete shape of a collider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColliderType {
    Sphere,
    Capsule,
    Triangle,
    Quad,
    Box,
    Cylinder,
    Compound,
    Mesh,
    Terrain,
}

/// Which family of algorithms handles a collider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CollisionType {
    Convex,
    Composite,
    Terrain,
}

impl ColliderType {
    pub fn collision_type(self) -> CollisionType {
        match self {
            ColliderType::Compound | ColliderType::Mesh => CollisionType::Composite,
            ColliderType::Terrain => CollisionType::Terrain,
            _ => CollisionType::Convex,
        }
    }
}

/// Data shared by every collider variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColliderHeader {
    collider_type: ColliderType,
    collision_type: CollisionType,
    filter: CollisionFilter,
    material: Material,
    version: u32,
}

impl ColliderHeader {
    pub(crate) fn new(collider_type: ColliderType, filter: CollisionFilter, material: Material) -> Self {
        Self {
            collider_type,
            collision_type: collider_type.collision_type(),
            filter,
            material,
            version: 0,
        }
    }

    pub fn collider_type(&self) -> ColliderType {
        self.collider_type
    }

    pub fn collision_type(&self) -> CollisionType {
        self.collision_type
    }

    pub fn filter(&self) -> CollisionFilter {
        self.filter
    }

    pub fn material(&self) -> Material {
        self.material
    }

    /// Incremented once for every change to the collider.
    pub fn version(&self) -> u32 {
        self.version
    }

    pub(crate) fn bump_version(&mut self) {
        self.version = self.version.wrapping_add(1);
    }

    fn set_filter(&mut self, filter: CollisionFilter) {
        if self.filter != filter {
            self.filter = filter;
            self.bump_version();
        }
    }

    fn set_material(&mut self, material: Material) {
        if self.material != material {
            self.material = material;
            self.bump_version();
        }
    }
}

/// Failures while building composite colliders.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ColliderError {
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    #[error("compound collider needs at least one child")]
    EmptyCompound,
    #[error("child {0} has a non-finite transform")]
    InvalidChildTransform(usize),
    #[error("mesh needs at least one non-degenerate triangle")]
    EmptyMesh,
    #[error("triangle {triangle} references vertex {index}, mesh has {vertex_count}")]
    IndexOutOfRange {
        triangle: usize,
        index: u32,
        vertex_count: usize,
    },
    #[error("terrain needs at least 2x2 samples, got {0}x{1}")]
    TerrainTooSmall(usize, usize),
    #[error("terrain expects {expected} height samples, got {actual}")]
    HeightCountMismatch { expected: usize, actual: usize },
    #[error("terrain scale must be finite and positive")]
    InvalidTerrainScale,
    #[error("height sample {0} is not finite")]
    InvalidHeight(usize),
}

/// Path to a leaf inside nested composite colliders.
///
/// Each level owns a fixed number of bits. Pushing stores the new sub-key in
/// the top bits and shifts the existing path down; unused low bits stay set so
/// that [`ColliderKey::EMPTY`] is all ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ColliderKey(u32);

impl Default for ColliderKey {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl ColliderKey {
    pub const EMPTY: Self = Self(u32::MAX);

    pub fn new(num_sub_key_bits: u32, sub_key: u32) -> Self {
        let mut key = Self::EMPTY;
        key.push_sub_key(num_sub_key_bits, sub_key);
        key
    }

    pub fn from_value(value: u32) -> Self {
        Self(value)
    }

    pub fn value(self) -> u32 {
        self.0
    }

    pub fn is_empty(self) -> bool {
        self == Self::EMPTY
    }

    pub fn push_sub_key(&mut self, num_sub_key_bits: u32, sub_key: u32) {
        if num_sub_key_bits == 0 {
            return;
        }
        let head = u64::from(sub_key) << (32 - num_sub_key_bits);
        let tail = u64::from(self.0) >> num_sub_key_bits;
        self.0 = (head | tail) as u32;
    }

    /// Removes and returns the top sub-key, or `None` for an empty key.
    pub fn pop_sub_key(&mut self, num_sub_key_bits: u32) -> Option<u32> {
        if self.is_empty() || num_sub_key_bits == 0 {
            return None;
        }
        let sub_key = (u64::from(self.0) >> (32 - num_sub_key_bits)) as u32;
        self.0 = (((1 + u64::from(self.0)) << num_sub_key_bits) - 1) as u32;
        Some(sub_key)
    }
}

/// Builds a [`ColliderKey`] root first while descending into composites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ColliderKeyPath {
    key: ColliderKey,
    used_bits: u32,
}

impl ColliderKeyPath {
    pub fn key(self) -> ColliderKey {
        self.key
    }

    /// Appends the sub-key of a child below the levels already on the path.
    pub fn push_child(self, num_sub_key_bits: u32, sub_key: u32) -> Self {
        if num_sub_key_bits == 0 || self.used_bits + num_sub_key_bits > 32 {
            return self;
        }
        let shift = 32 - self.used_bits - num_sub_key_bits;
        let mask = ((1u64 << num_sub_key_bits) - 1) << shift;
        let value = (u64::from(self.key.0) & !mask) | (u64::from(sub_key) << shift);
        Self {
            key: ColliderKey(value as u32),
            used_bits: self.used_bits + num_sub_key_bits,
        }
    }
}

/// Convex leaf reached inside a composite collider.
#[derive(Debug)]
pub enum LeafCollider<'a> {
    /// A child stored in the composite (compound children).
    Shared(&'a Collider),
    /// A polygon assembled on the fly (mesh and terrain primitives).
    Polygon(Collider),
}

impl Deref for LeafCollider<'_> {
    type Target = Collider;

    fn deref(&self) -> &Collider {
        match self {
            LeafCollider::Shared(collider) => collider,
            LeafCollider::Polygon(collider) => collider,
        }
    }
}

/// A direct child of a composite, with the sub-key that addresses it.
#[derive(Debug)]
pub struct Leaf<'a> {
    pub parent_from_leaf: Transform,
    pub num_key_bits: u32,
    pub sub_key: u32,
    pub collider: LeafCollider<'a>,
}

/// Every collider variant, sharing a [`ColliderHeader`].
///
/// Colliders own all of their data, so they are `Send + Sync` and can be
/// shared between bodies through `Arc<Collider>`.
#[derive(Debug, Clone, PartialEq)]
pub enum Collider {
    Sphere(SphereCollider),
    Capsule(CapsuleCollider),
    Triangle(PolygonCollider),
    Quad(PolygonCollider),
    Box(BoxCollider),
    Cylinder(CylinderCollider),
    Compound(CompoundCollider),
    Mesh(MeshCollider),
    Terrain(TerrainCollider),
}

impl Collider {
    pub fn create_sphere(
        geometry: SphereGeometry,
        filter: CollisionFilter,
        material: Material,
    ) -> Result<Self, GeometryError> {
        SphereCollider::create(geometry, filter, material).map(Collider::Sphere)
    }

    pub fn create_capsule(
        geometry: CapsuleGeometry,
        filter: CollisionFilter,
        material: Material,
    ) -> Result<Self, GeometryError> {
        CapsuleCollider::create(geometry, filter, material).map(Collider::Capsule)
    }

    pub fn create_box(
        geometry: BoxGeometry,
        filter: CollisionFilter,
        material: Material,
    ) -> Result<Self, GeometryError> {
        BoxCollider::create(geometry, filter, material).map(Collider::Box)
    }

    pub fn create_cylinder(
        geometry: CylinderGeometry,
        filter: CollisionFilter,
        material: Material,
    ) -> Result<Self, GeometryError> {
        CylinderCollider::create(geometry, filter, material).map(Collider::Cylinder)
    }

    pub fn create_triangle(
        vertices: [Vec3; 3],
        filter: CollisionFilter,
        material: Material,
    ) -> Result<Self, GeometryError> {
        PolygonCollider::create_triangle(vertices, filter, material).map(Collider::Triangle)
    }

    pub fn create_quad(
        vertices: [Vec3; 4],
        filter: CollisionFilter,
        material: Material,
    ) -> Result<Self, GeometryError> {
        PolygonCollider::create_quad(vertices, filter, material).map(Collider::Quad)
    }

    pub fn create_compound(children: Vec<CompoundChild>) -> Result<Self, ColliderError> {
        CompoundCollider::create(children).map(Collider::Compound)
    }

    pub fn create_mesh(
        vertices: Vec<Vec3>,
        triangles: Vec<[u32; 3]>,
        filter: CollisionFilter,
        material: Material,
    ) -> Result<Self, ColliderError> {
        MeshBuilder::new(vertices, triangles)
            .filter(filter)
            .material(material)
            .build()
            .map(Collider::Mesh)
    }

    /// Height field with `size[0] * size[1]` samples stored row by row
    /// (x fastest), scaled per axis.
    pub fn create_terrain(
        size: [usize; 2],
        heights: Vec<f32>,
        scale: Vec3,
        filter: CollisionFilter,
        material: Material,
    ) -> Result<Self, ColliderError> {
        TerrainCollider::create(size, heights, scale, filter, material).map(Collider::Terrain)
    }

    pub(crate) fn from_polygon(polygon: PolygonCollider) -> Self {
        if polygon.is_quad() {
            Collider::Quad(polygon)
        } else {
            Collider::Triangle(polygon)
        }
    }

    pub fn into_shared(self) -> Arc<Collider> {
        Arc::new(self)
    }

    pub fn header(&self) -> &ColliderHeader {
        match self {
            Collider::Sphere(c) => &c.header,
            Collider::Capsule(c) => &c.header,
            Collider::Triangle(c) | Collider::Quad(c) => &c.header,
            Collider::Box(c) => &c.header,
            Collider::Cylinder(c) => &c.header,
            Collider::Compound(c) => &c.header,
            Collider::Mesh(c) => &c.header,
            Collider::Terrain(c) => &c.header,
        }
    }

    fn header_mut(&mut self) -> &mut ColliderHeader {
        match self {
            Collider::Sphere(c) => &mut c.header,
            Collider::Capsule(c) => &mut c.header,
            Collider::Triangle(c) | Collider::Quad(c) => &mut c.header,
            Collider::Box(c) => &mut c.header,
            Collider::Cylinder(c) => &mut c.header,
            Collider::Compound(c) => &mut c.header,
            Collider::Mesh(c) => &mut c.header,
            Collider::Terrain(c) => &mut c.header,
        }
    }

    pub fn collider_type(&self) -> ColliderType {
        self.header().collider_type()
    }

    pub fn collision_type(&self) -> CollisionType {
        self.header().collision_type()
    }

    pub fn is_convex(&self) -> bool {
        self.collision_type() == CollisionType::Convex
    }

    pub fn filter(&self) -> CollisionFilter {
        self.header().filter()
    }

    pub fn material(&self) -> Material {
        self.header().material()
    }

    pub fn version(&self) -> u32 {
        self.header().version()
    }

    /// Replaces the filter, bumping the version only if it differs.
    pub fn set_filter(&mut self, filter: CollisionFilter) {
        self.header_mut().set_filter(filter);
    }

    /// Replaces the material, bumping the version only if it differs.
    pub fn set_material(&mut self, material: Material) {
        self.header_mut().set_material(material);
    }

    pub fn as_sphere_mut(&mut self) -> Option<&mut SphereCollider> {
        match self {
            Collider::Sphere(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_capsule_mut(&mut self) -> Option<&mut CapsuleCollider> {
        match self {
            Collider::Capsule(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_box_mut(&mut self) -> Option<&mut BoxCollider> {
        match self {
            Collider::Box(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_cylinder_mut(&mut self) -> Option<&mut CylinderCollider> {
        match self {
            Collider::Cylinder(c) => Some(c),
            _ => None,
        }
    }

    /// Hull of a convex collider; `None` for composites.
    pub fn convex_hull(&self) -> Option<&ConvexHull> {
        match self {
            Collider::Sphere(c) => Some(&c.hull),
            Collider::Capsule(c) => Some(&c.hull),
            Collider::Triangle(c) | Collider::Quad(c) => Some(&c.hull),
            Collider::Box(c) => Some(&c.hull),
            Collider::Cylinder(c) => Some(&c.hull),
            Collider::Compound(_) | Collider::Mesh(_) | Collider::Terrain(_) => None,
        }
    }

    pub fn mass_properties(&self) -> MassProperties {
        match self {
            Collider::Sphere(c) => c.mass_properties(),
            Collider::Capsule(c) => c.mass_properties(),
            Collider::Triangle(c) | Collider::Quad(c) => c.mass_properties(),
            Collider::Box(c) => c.mass_properties(),
            Collider::Cylinder(c) => c.mass_properties(),
            Collider::Compound(c) => c.mass_properties(),
            Collider::Mesh(c) => c.mass_properties(),
            Collider::Terrain(c) => c.mass_properties(),
        }
    }

    /// Bounds in collider space.
    pub fn aabb(&self) -> Aabb {
        self.calculate_aabb(&Transform::IDENTITY)
    }

    /// Bounds after applying `transform`.
    pub fn calculate_aabb(&self, transform: &Transform) -> Aabb {
        match self {
            Collider::Sphere(c) => c.calculate_aabb(transform),
            Collider::Capsule(c) => c.calculate_aabb(transform),
            Collider::Triangle(c) | Collider::Quad(c) => c.calculate_aabb(transform),
            Collider::Box(c) => c.calculate_aabb(transform),
            Collider::Cylinder(c) => c.calculate_aabb(transform),
            Collider::Compound(c) => c.local_aabb().transformed(transform),
            Collider::Mesh(c) => c.local_aabb().transformed(transform),
            Collider::Terrain(c) => c.local_aabb().transformed(transform),
        }
    }

    /// Bits used by this collider's own level of a [`ColliderKey`].
    pub fn num_collider_key_bits(&self) -> u32 {
        match self {
            Collider::Compound(c) => c.num_collider_key_bits(),
            Collider::Mesh(c) => c.num_collider_key_bits(),
            Collider::Terrain(c) => c.num_collider_key_bits(),
            _ => 0,
        }
    }

    /// Visits the direct children of a composite whose bounds overlap
    /// `bounds` (given in this collider's space). Returns `false` if the
    /// visitor stopped early. Convex colliders have no children.
    pub fn visit_leaves(&self, bounds: &Aabb, visitor: &mut dyn FnMut(Leaf<'_>) -> bool) -> bool {
        match self {
            Collider::Compound(c) => c.visit_children(bounds, visitor),
            Collider::Mesh(c) => c.visit_polygons(bounds, visitor),
            Collider::Terrain(c) => c.visit_polygons(bounds, visitor),
            _ => true,
        }
    }

    /// Resolves `key` to the convex leaf it addresses, together with the
    /// transform from that leaf into this collider's space.
    pub fn get_leaf(&self, key: ColliderKey) -> Option<(Transform, LeafCollider<'_>)> {
        let mut key = key;
        self.get_leaf_inner(&mut key, Transform::IDENTITY)
    }

    fn get_leaf_inner(
        &self,
        key: &mut ColliderKey,
        parent_from_self: Transform,
    ) -> Option<(Transform, LeafCollider<'_>)> {
        match self {
            Collider::Compound(c) => {
                let index = key.pop_sub_key(c.num_collider_key_bits())? as usize;
                let child = c.children().get(index)?;
                let transform = parent_from_self.combine(&child.compound_from_child);
                if child.collider.is_convex() {
                    Some((transform, LeafCollider::Shared(&child.collider)))
                } else {
                    child.collider.get_leaf_inner(key, transform)
                }
            }
            Collider::Mesh(c) => {
                let sub_key = key.pop_sub_key(c.num_collider_key_bits())?;
                let polygon = c.polygon(sub_key)?;
                Some((parent_from_self, LeafCollider::Polygon(Collider::from_polygon(polygon))))
            }
            Collider::Terrain(c) => {
                let sub_key = key.pop_sub_key(c.num_collider_key_bits())?;
                let polygon = c.polygon(sub_key)?;
                Some((parent_from_self, LeafCollider::Polygon(Collider::from_polygon(polygon))))
            }
            _ => Some((parent_from_self, LeafCollider::Shared(self))),
        }
    }
}
