//! Binary bounding volume hierarchy over leaf bounds, shared by compound and
//! mesh colliders.

use serde::{Deserialize, Serialize};

use super::types::Aabb;

const MAX_LEAVES_PER_NODE: usize = 2;

/// Receives bounds and leaves during a traversal.
pub trait SpatialVisitor {
    /// Whether the subtree under `bounds` should be entered.
    fn accept_bounds(&mut self, bounds: &Aabb) -> bool;
    /// Called for each leaf of an accepted node. Returning `false` stops the
    /// traversal.
    fn visit_leaf(&mut self, leaf: usize) -> bool;
}

/// Node of the hierarchy. Leaves have no children and reference
/// `count` entries of the leaf order starting at `start`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BvhNode {
    pub bounds: Aabb,
    pub left: Option<u32>,
    pub right: Option<u32>,
    pub start: u32,
    pub count: u32,
}

impl BvhNode {
    pub fn is_leaf(&self) -> bool {
        self.left.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Bvh {
    nodes: Vec<BvhNode>,
    leaf_order: Vec<u32>,
}

impl Bvh {
    /// Builds a median-split hierarchy. The build is deterministic for a
    /// given input order.
    pub fn build(leaf_bounds: &[Aabb]) -> Self {
        let mut bvh = Self {
            nodes: Vec::with_capacity(2 * leaf_bounds.len()),
            leaf_order: (0..leaf_bounds.len() as u32).collect(),
        };
        if leaf_bounds.is_empty() {
            return bvh;
        }

        bvh.nodes.push(BvhNode {
            bounds: Aabb::empty(),
            left: None,
            right: None,
            start: 0,
            count: 0,
        });
        let mut pending = vec![(0usize, 0usize, leaf_bounds.len())];

        while let Some((node, start, end)) = pending.pop() {
            let range = &mut bvh.leaf_order[start..end];
            let mut bounds = Aabb::empty();
            let mut centroids = Aabb::empty();
            for &leaf in range.iter() {
                let b = &leaf_bounds[leaf as usize];
                bounds = bounds.union(b);
                centroids.extend(b.center());
            }
            bvh.nodes[node].bounds = bounds;

            if end - start <= MAX_LEAVES_PER_NODE {
                bvh.nodes[node].start = start as u32;
                bvh.nodes[node].count = (end - start) as u32;
                continue;
            }

            let spread = centroids.max - centroids.min;
            let axis = if spread.x >= spread.y && spread.x >= spread.z {
                0
            } else if spread.y >= spread.z {
                1
            } else {
                2
            };
            range.sort_by(|&a, &b| {
                let ca = leaf_bounds[a as usize].center()[axis];
                let cb = leaf_bounds[b as usize].center()[axis];
                ca.total_cmp(&cb).then(a.cmp(&b))
            });

            let mid = start + (end - start) / 2;
            let left = bvh.nodes.len();
            for _ in 0..2 {
                bvh.nodes.push(BvhNode {
                    bounds: Aabb::empty(),
                    left: None,
                    right: None,
                    start: 0,
                    count: 0,
                });
            }
            bvh.nodes[node].left = Some(left as u32);
            bvh.nodes[node].right = Some(left as u32 + 1);
            pending.push((left + 1, mid, end));
            pending.push((left, start, mid));
        }

        bvh
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[BvhNode] {
        &self.nodes
    }

    pub fn root_bounds(&self) -> Aabb {
        self.nodes.first().map(|n| n.bounds).unwrap_or_default()
    }

    /// Depth-first traversal with an explicit stack. Returns `false` if the
    /// visitor stopped early.
    pub fn visit<V: SpatialVisitor + ?Sized>(&self, visitor: &mut V) -> bool {
        if self.nodes.is_empty() {
            return true;
        }
        let mut stack = vec![0u32];
        while let Some(index) = stack.pop() {
            let node = &self.nodes[index as usize];
            if !visitor.accept_bounds(&node.bounds) {
                continue;
            }
            match (node.left, node.right) {
                (Some(left), Some(right)) => {
                    stack.push(right);
                    stack.push(left);
                }
                _ => {
                    let start = node.start as usize;
                    for &leaf in &self.leaf_order[start..start + node.count as usize] {
                        if !visitor.visit_leaf(leaf as usize) {
                            return false;
                        }
                    }
                }
            }
        }
        true
    }

    /// Calls `f` for every leaf whose subtree bounds overlap `aabb`.
    pub fn query_overlaps(&self, aabb: &Aabb, f: impl FnMut(usize) -> bool) -> bool {
        struct Overlap<'a, F> {
            aabb: &'a Aabb,
            f: F,
        }
        impl<F: FnMut(usize) -> bool> SpatialVisitor for Overlap<'_, F> {
            fn accept_bounds(&mut self, bounds: &Aabb) -> bool {
                bounds.overlaps(self.aabb)
            }
            fn visit_leaf(&mut self, leaf: usize) -> bool {
                (self.f)(leaf)
            }
        }
        self.visit(&mut Overlap { aabb, f })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn unit_boxes_along_x(n: usize) -> Vec<Aabb> {
        (0..n)
            .map(|i| {
                let c = Vec3::new(i as f32 * 2.0, 0.0, 0.0);
                Aabb::from_center_extent(c, Vec3::splat(0.5))
            })
            .collect()
    }

    #[test]
    fn every_leaf_is_reachable_once() {
        let leaves = unit_boxes_along_x(13);
        let bvh = Bvh::build(&leaves);
        let mut seen = Vec::new();
        bvh.query_overlaps(&bvh.root_bounds(), |leaf| {
            seen.push(leaf);
            true
        });
        seen.sort_unstable();
        assert_eq!(seen, (0..13).collect::<Vec<_>>());
    }

    #[test]
    fn overlap_query_prunes() {
        let leaves = unit_boxes_along_x(16);
        let bvh = Bvh::build(&leaves);
        let probe = Aabb::from_center_extent(Vec3::new(6.0, 0.0, 0.0), Vec3::splat(0.1));
        let mut hits = Vec::new();
        bvh.query_overlaps(&probe, |leaf| {
            if leaves[leaf].overlaps(&probe) {
                hits.push(leaf);
            }
            true
        });
        assert_eq!(hits, vec![3]);
    }

    #[test]
    fn early_exit_stops_traversal() {
        let bvh = Bvh::build(&unit_boxes_along_x(8));
        let mut count = 0;
        let finished = bvh.query_overlaps(&bvh.root_bounds(), |_| {
            count += 1;
            count < 3
        });
        assert!(!finished);
        assert_eq!(count, 3);
    }

    #[test]
    fn empty_hierarchy() {
        let bvh = Bvh::build(&[]);
        assert!(bvh.is_empty());
        assert!(bvh.query_overlaps(&Aabb::new(Vec3::ZERO, Vec3::ONE), |_| true));
    }
}
