//! Hit types and the collectors that accumulate them during queries.

use glam::Vec3;

use crate::core::collider::ColliderKey;
use crate::core::types::{Material, Transform};

/// A hit produced by a query, expressed in the space of the collider that
/// produced it until remapped by a parent.
pub trait QueryResult: Clone {
    /// Ray/cast fraction, or distance for distance queries.
    fn fraction(&self) -> f32;

    /// Moves the hit from child space to parent space and records the child's
    /// sub-key in the hit's collider key.
    fn transform(&mut self, parent_from_child: &Transform, num_sub_key_bits: u32, sub_key: u32);

    /// Moves the hit from body space to world space and tags it with the body.
    fn transform_to_body(&mut self, world_from_body: &Transform, rigid_body_index: usize);
}

macro_rules! surface_hit {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq)]
        pub struct $name {
            pub fraction: f32,
            pub position: Vec3,
            pub surface_normal: Vec3,
            pub rigid_body_index: Option<usize>,
            pub collider_key: ColliderKey,
            pub material: Material,
        }

        impl QueryResult for $name {
            fn fraction(&self) -> f32 {
                self.fraction
            }

            fn transform(&mut self, parent_from_child: &Transform, num_sub_key_bits: u32, sub_key: u32) {
                self.position = parent_from_child.transform_point(self.position);
                self.surface_normal = parent_from_child.transform_vector(self.surface_normal);
                self.collider_key.push_sub_key(num_sub_key_bits, sub_key);
            }

            fn transform_to_body(&mut self, world_from_body: &Transform, rigid_body_index: usize) {
                self.position = world_from_body.transform_point(self.position);
                self.surface_normal = world_from_body.transform_vector(self.surface_normal);
                self.rigid_body_index = Some(rigid_body_index);
            }
        }
    };
}

surface_hit!(
    /// Ray hit. `fraction` is along the ray displacement.
    RaycastHit
);
surface_hit!(
    /// Collider cast hit. `position` is on the surface of the target and
    /// `fraction` is along the cast displacement.
    ColliderCastHit
);
surface_hit!(
    /// Closest point on a target. `fraction` is the signed distance,
    /// negative when penetrating; `surface_normal` points from the target
    /// towards the query.
    DistanceHit
);

impl DistanceHit {
    pub fn distance(&self) -> f32 {
        self.fraction
    }
}

/// Receives hits during a query and decides how far the query keeps looking.
pub trait Collector<T: QueryResult> {
    /// Stop traversal as soon as any hit is accepted.
    fn early_out_on_first_hit(&self) -> bool;

    /// Hits beyond this fraction are not of interest.
    fn max_fraction(&self) -> f32;

    fn num_hits(&self) -> usize;

    /// Offers a hit; returns whether it was accepted.
    fn add_hit(&mut self, hit: T) -> bool;

    /// Remaps hits added since `old_num_hits` (or closer than `old_fraction`)
    /// from child space into parent space.
    fn transform_new_hits(
        &mut self,
        old_num_hits: usize,
        old_fraction: f32,
        parent_from_child: &Transform,
        num_sub_key_bits: u32,
        sub_key: u32,
    );

    /// Remaps new hits from body space into world space.
    fn transform_new_hits_to_body(
        &mut self,
        old_num_hits: usize,
        old_fraction: f32,
        world_from_body: &Transform,
        rigid_body_index: usize,
    );
}

/// Answers "is there any hit?" and stops at the first one.
#[derive(Debug, Clone)]
pub struct AnyHitCollector {
    max_fraction: f32,
    num_hits: usize,
}

impl AnyHitCollector {
    pub fn new(max_fraction: f32) -> Self {
        Self {
            max_fraction,
            num_hits: 0,
        }
    }
}

impl<T: QueryResult> Collector<T> for AnyHitCollector {
    fn early_out_on_first_hit(&self) -> bool {
        true
    }

    fn max_fraction(&self) -> f32 {
        self.max_fraction
    }

    fn num_hits(&self) -> usize {
        self.num_hits
    }

    fn add_hit(&mut self, _hit: T) -> bool {
        self.num_hits = 1;
        true
    }

    fn transform_new_hits(&mut self, _: usize, _: f32, _: &Transform, _: u32, _: u32) {}

    fn transform_new_hits_to_body(&mut self, _: usize, _: f32, _: &Transform, _: usize) {}
}

/// Keeps the hit with the smallest fraction, shrinking `max_fraction` as
/// closer hits arrive.
///
/// `num_hits` counts every accepted hit, so a hit that ties the stored one
/// still registers as new for the remapping scope it arrived in.
#[derive(Debug, Clone)]
pub struct ClosestHitCollector<T> {
    max_fraction: f32,
    closest_hit: Option<T>,
    num_accepted: usize,
}

impl<T: QueryResult> ClosestHitCollector<T> {
    pub fn new(max_fraction: f32) -> Self {
        Self {
            max_fraction,
            closest_hit: None,
            num_accepted: 0,
        }
    }

    pub fn closest_hit(&self) -> Option<&T> {
        self.closest_hit.as_ref()
    }

    pub fn into_hit(self) -> Option<T> {
        self.closest_hit
    }
}

impl<T: QueryResult> Collector<T> for ClosestHitCollector<T> {
    fn early_out_on_first_hit(&self) -> bool {
        false
    }

    fn max_fraction(&self) -> f32 {
        self.max_fraction
    }

    fn num_hits(&self) -> usize {
        self.num_accepted
    }

    fn add_hit(&mut self, hit: T) -> bool {
        if hit.fraction() > self.max_fraction {
            return false;
        }
        self.max_fraction = hit.fraction();
        self.closest_hit = Some(hit);
        self.num_accepted += 1;
        true
    }

    fn transform_new_hits(
        &mut self,
        old_num_hits: usize,
        _old_fraction: f32,
        parent_from_child: &Transform,
        num_sub_key_bits: u32,
        sub_key: u32,
    ) {
        if self.num_accepted > old_num_hits {
            if let Some(hit) = self.closest_hit.as_mut() {
                hit.transform(parent_from_child, num_sub_key_bits, sub_key);
            }
        }
    }

    fn transform_new_hits_to_body(
        &mut self,
        old_num_hits: usize,
        _old_fraction: f32,
        world_from_body: &Transform,
        rigid_body_index: usize,
    ) {
        if self.num_accepted > old_num_hits {
            if let Some(hit) = self.closest_hit.as_mut() {
                hit.transform_to_body(world_from_body, rigid_body_index);
            }
        }
    }
}

/// Keeps every hit within `max_fraction`.
#[derive(Debug, Clone)]
pub struct AllHitsCollector<T> {
    max_fraction: f32,
    hits: Vec<T>,
}

impl<T: QueryResult> AllHitsCollector<T> {
    pub fn new(max_fraction: f32) -> Self {
        Self {
            max_fraction,
            hits: Vec::new(),
        }
    }

    pub fn hits(&self) -> &[T] {
        &self.hits
    }

    /// Hits ordered by fraction.
    pub fn into_sorted_hits(mut self) -> Vec<T> {
        self.hits.sort_by(|a, b| a.fraction().total_cmp(&b.fraction()));
        self.hits
    }
}

impl<T: QueryResult> Collector<T> for AllHitsCollector<T> {
    fn early_out_on_first_hit(&self) -> bool {
        false
    }

    fn max_fraction(&self) -> f32 {
        self.max_fraction
    }

    fn num_hits(&self) -> usize {
        self.hits.len()
    }

    fn add_hit(&mut self, hit: T) -> bool {
        if hit.fraction() > self.max_fraction {
            return false;
        }
        self.hits.push(hit);
        true
    }

    fn transform_new_hits(
        &mut self,
        old_num_hits: usize,
        _old_fraction: f32,
        parent_from_child: &Transform,
        num_sub_key_bits: u32,
        sub_key: u32,
    ) {
        for hit in &mut self.hits[old_num_hits..] {
            hit.transform(parent_from_child, num_sub_key_bits, sub_key);
        }
    }

    fn transform_new_hits_to_body(
        &mut self,
        old_num_hits: usize,
        _old_fraction: f32,
        world_from_body: &Transform,
        rigid_body_index: usize,
    ) {
        for hit in &mut self.hits[old_num_hits..] {
            hit.transform_to_body(world_from_body, rigid_body_index);
        }
    }
}
