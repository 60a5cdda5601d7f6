use std::collections::{HashMap, HashSet};

use glam::Vec3;
use log::trace;

use crate::config::MAX_BROADPHASE_CELLS_PER_BODY;
use crate::core::constraints::BodyIndexPair;
use crate::core::filter::CollisionFilter;
use crate::core::rigidbody::{MotionVelocity, RigidBody};
use crate::core::types::Aabb;

type Cell = (i32, i32, i32);

/// Uniform grid spatial partitioning used by the broad-phase.
pub struct SpatialGrid {
    cell_size: f32,
    grid: HashMap<Cell, Vec<usize>>,
    /// Bodies too large to bin; tested against everything.
    oversized: Vec<usize>,
}

impl SpatialGrid {
    pub fn new(cell_size: f32) -> Self {
        Self {
            cell_size: cell_size.max(f32::EPSILON),
            grid: HashMap::new(),
            oversized: Vec::new(),
        }
    }

    pub fn clear(&mut self) {
        self.grid.clear();
        self.oversized.clear();
    }

    fn world_to_grid(&self, pos: Vec3) -> Cell {
        let cell = (pos / self.cell_size).floor();
        (cell.x as i32, cell.y as i32, cell.z as i32)
    }

    fn cell_range(&self, aabb: &Aabb) -> Option<(Cell, Cell)> {
        let min = self.world_to_grid(aabb.min);
        let max = self.world_to_grid(aabb.max);
        let count = (i64::from(max.0) - i64::from(min.0) + 1)
            * (i64::from(max.1) - i64::from(min.1) + 1)
            * (i64::from(max.2) - i64::from(min.2) + 1);
        (count <= MAX_BROADPHASE_CELLS_PER_BODY as i64).then_some((min, max))
    }

    pub fn insert(&mut self, body_index: usize, aabb: &Aabb) {
        let Some((min_cell, max_cell)) = self.cell_range(aabb) else {
            self.oversized.push(body_index);
            return;
        };
        for x in min_cell.0..=max_cell.0 {
            for y in min_cell.1..=max_cell.1 {
                for z in min_cell.2..=max_cell.2 {
                    self.grid.entry((x, y, z)).or_default().push(body_index);
                }
            }
        }
    }

    /// Bodies sharing a cell with `aabb`, plus every oversized body. Sorted
    /// and without duplicates.
    pub fn query(&self, aabb: &Aabb) -> Vec<usize> {
        let mut results = self.oversized.clone();
        match self.cell_range(aabb) {
            Some((min_cell, max_cell)) => {
                for x in min_cell.0..=max_cell.0 {
                    for y in min_cell.1..=max_cell.1 {
                        for z in min_cell.2..=max_cell.2 {
                            if let Some(bodies) = self.grid.get(&(x, y, z)) {
                                results.extend(bodies);
                            }
                        }
                    }
                }
            }
            None => results.extend(self.grid.values().flatten()),
        }
        results.sort_unstable();
        results.dedup();
        results
    }
}

/// Reference broad phase: bins motion-expanded body bounds into a uniform
/// grid and reports overlapping pairs.
pub struct BroadPhase {
    grid: SpatialGrid,
}

impl BroadPhase {
    pub fn new(cell_size: f32) -> Self {
        Self {
            grid: SpatialGrid::new(cell_size),
        }
    }

    /// Candidate pairs `(a, b)` with `a < b`, sorted. Bodies past
    /// `num_dynamic_bodies` are static and never paired with each other.
    pub fn find_pairs(
        &mut self,
        bodies: &[RigidBody],
        velocities: &[MotionVelocity],
        num_dynamic_bodies: usize,
        time_step: f32,
        collision_tolerance: f32,
    ) -> Vec<BodyIndexPair> {
        self.grid.clear();

        let bounds: Vec<Option<Aabb>> = bodies
            .iter()
            .enumerate()
            .map(|(index, body)| {
                let aabb = body.world_aabb()?.expanded(collision_tolerance * 0.5);
                let velocity = velocities.get(index).copied().unwrap_or(MotionVelocity::ZERO);
                Some(velocity.calculate_expansion(time_step).expand_aabb(&aabb))
            })
            .collect();

        for (index, aabb) in bounds.iter().enumerate() {
            if let Some(aabb) = aabb {
                self.grid.insert(index, aabb);
            }
        }

        let mut pairs = Vec::new();
        let mut checked = HashSet::new();
        for (index, aabb) in bounds.iter().enumerate() {
            let Some(aabb) = aabb else { continue };
            for other in self.grid.query(aabb) {
                if other == index || (index >= num_dynamic_bodies && other >= num_dynamic_bodies) {
                    continue;
                }
                let pair = BodyIndexPair::new(index, other).ordered();
                if !checked.insert(pair) {
                    continue;
                }
                let Some(other_aabb) = &bounds[other] else { continue };
                if aabb.overlaps(other_aabb) && filters_allow(&bodies[index], &bodies[other]) {
                    pairs.push(pair);
                }
            }
        }

        pairs.sort_unstable();
        trace!("broad phase: {} bodies, {} pairs", bodies.len(), pairs.len());
        pairs
    }
}

fn filters_allow(a: &RigidBody, b: &RigidBody) -> bool {
    match (&a.collider, &b.collider) {
        (Some(a), Some(b)) => CollisionFilter::is_collision_enabled(&a.filter(), &b.filter()),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::collider::Collider;
    use crate::core::geometry::SphereGeometry;
    use crate::core::types::{Material, Transform};
    use std::sync::Arc;

    fn ball(position: Vec3, filter: CollisionFilter) -> RigidBody {
        let collider = Collider::create_sphere(SphereGeometry::new(Vec3::ZERO, 0.5), filter, Material::default())
            .unwrap();
        RigidBody::new(Transform::from_position(position), Arc::new(collider))
    }

    #[test]
    fn finds_only_overlapping_pairs() {
        let bodies = vec![
            ball(Vec3::ZERO, CollisionFilter::DEFAULT),
            ball(Vec3::new(0.9, 0.0, 0.0), CollisionFilter::DEFAULT),
            ball(Vec3::new(10.0, 0.0, 0.0), CollisionFilter::DEFAULT),
        ];
        let mut broad_phase = BroadPhase::new(2.0);
        let pairs = broad_phase.find_pairs(&bodies, &[], 3, 1.0 / 60.0, 0.1);
        assert_eq!(pairs, vec![BodyIndexPair::new(0, 1)]);
    }

    #[test]
    fn static_pairs_and_filtered_pairs_are_skipped() {
        let bodies = vec![
            ball(Vec3::ZERO, CollisionFilter::new(1, 1)),
            ball(Vec3::new(0.5, 0.0, 0.0), CollisionFilter::new(2, 2)),
            ball(Vec3::new(0.0, 0.5, 0.0), CollisionFilter::DEFAULT),
        ];
        let mut broad_phase = BroadPhase::new(2.0);
        let pairs = broad_phase.find_pairs(&bodies, &[], 1, 1.0 / 60.0, 0.1);
        assert_eq!(pairs, vec![BodyIndexPair::new(0, 2)]);
    }

    #[test]
    fn oversized_bodies_meet_everyone() {
        let mut grid = SpatialGrid::new(0.01);
        grid.insert(0, &Aabb::new(Vec3::splat(-100.0), Vec3::splat(100.0)));
        grid.insert(1, &Aabb::from_center_extent(Vec3::splat(50.0), Vec3::splat(0.001)));
        let found = grid.query(&Aabb::from_center_extent(Vec3::splat(50.0), Vec3::splat(0.001)));
        assert_eq!(found, vec![0, 1]);
    }
}
