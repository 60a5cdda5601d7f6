use std::sync::Arc;

use glam::{Mat3, Vec3};

use super::bvh::Bvh;
use super::collider::{Collider, ColliderError, ColliderHeader, ColliderType, Leaf, LeafCollider};
use super::filter::CollisionFilter;
use super::types::{Aabb, MassDistribution, MassProperties, Material, Transform};
use crate::utils::math::{bits_for_count, diagonalize_symmetric};

/// Child of a compound collider.
#[derive(Debug, Clone, PartialEq)]
pub struct CompoundChild {
    pub compound_from_child: Transform,
    pub collider: Arc<Collider>,
}

impl CompoundChild {
    pub fn new(compound_from_child: Transform, collider: Arc<Collider>) -> Self {
        Self {
            compound_from_child,
            collider,
        }
    }
}

/// Rigid assembly of child colliders indexed by a BVH.
#[derive(Debug, Clone, PartialEq)]
pub struct CompoundCollider {
    pub(crate) header: ColliderHeader,
    children: Vec<CompoundChild>,
    bvh: Bvh,
    num_collider_key_bits: u32,
    mass_properties: MassProperties,
    aabb: Aabb,
}

impl CompoundCollider {
    pub fn create(children: Vec<CompoundChild>) -> Result<Self, ColliderError> {
        if children.is_empty() {
            return Err(ColliderError::EmptyCompound);
        }
        for (index, child) in children.iter().enumerate() {
            let t = child.compound_from_child;
            if !t.position.is_finite() || !t.rotation.is_finite() {
                return Err(ColliderError::InvalidChildTransform(index));
            }
        }

        let child_bounds: Vec<Aabb> = children
            .iter()
            .map(|child| child.collider.calculate_aabb(&child.compound_from_child))
            .collect();
        let aabb = child_bounds
            .iter()
            .fold(Aabb::empty(), |acc, b| acc.union(b));
        let filter = children
            .iter()
            .skip(1)
            .fold(children[0].collider.filter(), |acc, child| {
                CollisionFilter::union(&acc, &child.collider.filter())
            });

        let mut header = ColliderHeader::new(ColliderType::Compound, filter, Material::default());
        header.bump_version();

        Ok(Self {
            header,
            bvh: Bvh::build(&child_bounds),
            num_collider_key_bits: bits_for_count(children.len() as u32),
            mass_properties: combine_mass_properties(&children),
            aabb,
            children,
        })
    }

    pub fn children(&self) -> &[CompoundChild] {
        &self.children
    }

    pub fn num_children(&self) -> usize {
        self.children.len()
    }

    pub fn bvh(&self) -> &Bvh {
        &self.bvh
    }

    pub fn num_collider_key_bits(&self) -> u32 {
        self.num_collider_key_bits
    }

    pub fn mass_properties(&self) -> MassProperties {
        self.mass_properties
    }

    pub fn local_aabb(&self) -> Aabb {
        self.aabb
    }

    pub(crate) fn visit_children(
        &self,
        bounds: &Aabb,
        visitor: &mut dyn FnMut(Leaf<'_>) -> bool,
    ) -> bool {
        self.bvh.query_overlaps(bounds, |index| {
            let child = &self.children[index];
            visitor(Leaf {
                parent_from_leaf: child.compound_from_child,
                num_key_bits: self.num_collider_key_bits,
                sub_key: index as u32,
                collider: LeafCollider::Shared(&child.collider),
            })
        })
    }
}

/// Volume-weighted combination of the children, re-expressed in the
/// principal frame of the combined inertia.
fn combine_mass_properties(children: &[CompoundChild]) -> MassProperties {
    let parts: Vec<(MassProperties, Transform)> = children
        .iter()
        .map(|c| (c.collider.mass_properties(), c.compound_from_child))
        .collect();

    let total_volume: f32 = parts.iter().map(|(mp, _)| mp.volume).sum();
    let weight = |mp: &MassProperties| {
        if total_volume > 0.0 {
            mp.volume / total_volume
        } else {
            1.0 / parts.len() as f32
        }
    };

    let center_of = |mp: &MassProperties, t: &Transform| {
        t.transform_point(mp.mass_distribution.transform.position)
    };
    let center: Vec3 = parts
        .iter()
        .map(|(mp, t)| center_of(mp, t) * weight(mp))
        .sum();

    let mut tensor = Mat3::ZERO;
    let mut angular_expansion = 0.0f32;
    for (mp, t) in &parts {
        let w = weight(mp);
        let frame = t.combine(&mp.mass_distribution.transform);
        let r = Mat3::from_quat(frame.rotation);
        let local = r * Mat3::from_diagonal(mp.mass_distribution.inertia_tensor) * r.transpose();
        let d = frame.position - center;
        let shift = Mat3::from_diagonal(Vec3::splat(d.length_squared()))
            - Mat3::from_cols(d * d.x, d * d.y, d * d.z);
        tensor += (local + shift) * w;
        angular_expansion = angular_expansion.max(d.length() + mp.angular_expansion_factor);
    }

    let (rotation, inertia) = diagonalize_symmetric(tensor);
    MassProperties {
        mass_distribution: MassDistribution {
            transform: Transform::new(rotation, center),
            inertia_tensor: inertia,
        },
        volume: total_volume,
        angular_expansion_factor: angular_expansion,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geometry::SphereGeometry;
    use approx::assert_relative_eq;

    fn sphere(filter: CollisionFilter) -> Arc<Collider> {
        Collider::create_sphere(SphereGeometry::new(Vec3::ZERO, 0.5), filter, Material::default())
            .unwrap()
            .into_shared()
    }

    #[test]
    fn empty_compound_is_rejected() {
        assert_eq!(CompoundCollider::create(Vec::new()), Err(ColliderError::EmptyCompound));
    }

    #[test]
    fn filter_is_union_of_children() {
        let compound = CompoundCollider::create(vec![
            CompoundChild::new(Transform::IDENTITY, sphere(CollisionFilter::new(1, 2))),
            CompoundChild::new(
                Transform::from_position(Vec3::X),
                sphere(CollisionFilter::new(4, 8)),
            ),
        ])
        .unwrap();
        assert_eq!(compound.header.filter(), CollisionFilter::new(5, 10));
        assert_eq!(compound.num_collider_key_bits(), 2);
        assert_eq!(compound.header.version(), 1);
    }

    #[test]
    fn symmetric_pair_centers_mass() {
        let compound = CompoundCollider::create(vec![
            CompoundChild::new(
                Transform::from_position(Vec3::new(-1.0, 0.0, 0.0)),
                sphere(CollisionFilter::DEFAULT),
            ),
            CompoundChild::new(
                Transform::from_position(Vec3::new(1.0, 0.0, 0.0)),
                sphere(CollisionFilter::DEFAULT),
            ),
        ])
        .unwrap();
        let mp = compound.mass_properties();
        let com = mp.mass_distribution.transform.position;
        assert_relative_eq!(com.length(), 0.0, epsilon = 1e-6);
        assert_relative_eq!(mp.angular_expansion_factor, 1.0);

        let mut inertia = mp.mass_distribution.inertia_tensor.to_array();
        inertia.sort_by(|a, b| a.total_cmp(b));
        assert_relative_eq!(inertia[0], 0.1, epsilon = 1e-4);
        assert_relative_eq!(inertia[2], 1.1, epsilon = 1e-4);
    }
}
