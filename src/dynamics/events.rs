//! Collision and trigger events derived from a step's contact manifolds.

use std::collections::BTreeMap;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::collision::contact::ContactManifold;
use crate::core::constraints::BodyIndexPair;

/// Two bodies touching where at least one asked for collision events.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CollisionEvent {
    pub body_indices: BodyIndexPair,
    pub normal: Vec3,
    pub average_contact_point_position: Vec3,
}

/// Two bodies overlapping where at least one is a trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TriggerEvent {
    pub body_indices: BodyIndexPair,
}

/// A collision as seen from one of the two bodies.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BodyCollision {
    pub other_body: usize,
    pub average_contact_point_position: Vec3,
}

/// Everything one body touched during the step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BodyEvents {
    pub collisions: Vec<BodyCollision>,
    pub triggers: Vec<usize>,
}

impl BodyEvents {
    pub fn is_empty(&self) -> bool {
        self.collisions.is_empty() && self.triggers.is_empty()
    }
}

#[derive(Default)]
struct PairAccumulator {
    normal: Vec3,
    position_sum: Vec3,
    num_points: usize,
}

/// One step's events, ordered by body pair.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationEvents {
    collision_events: Vec<CollisionEvent>,
    trigger_events: Vec<TriggerEvent>,
}

impl SimulationEvents {
    /// Collects one event per body pair from manifolds with at least one
    /// touching point (distance at most zero).
    pub fn from_manifolds<'a>(manifolds: impl IntoIterator<Item = &'a ContactManifold>) -> Self {
        let mut collisions: BTreeMap<BodyIndexPair, PairAccumulator> = BTreeMap::new();
        let mut triggers = Vec::new();

        for manifold in manifolds {
            let touching: Vec<Vec3> = manifold
                .points
                .iter()
                .filter(|p| p.distance <= 0.0)
                .map(|p| p.position)
                .collect();
            if touching.is_empty() {
                continue;
            }

            if manifold.is_trigger() {
                triggers.push(TriggerEvent {
                    body_indices: manifold.body_pair,
                });
            } else if manifold.raises_collision_events() {
                let entry = collisions.entry(manifold.body_pair).or_default();
                if entry.num_points == 0 {
                    entry.normal = manifold.normal;
                }
                entry.position_sum += touching.iter().copied().sum::<Vec3>();
                entry.num_points += touching.len();
            }
        }

        triggers.sort_unstable_by_key(|t| t.body_indices);
        triggers.dedup();

        Self {
            collision_events: collisions
                .into_iter()
                .map(|(body_indices, acc)| CollisionEvent {
                    body_indices,
                    normal: acc.normal,
                    average_contact_point_position: acc.position_sum / acc.num_points as f32,
                })
                .collect(),
            trigger_events: triggers,
        }
    }

    pub fn collision_events(&self) -> &[CollisionEvent] {
        &self.collision_events
    }

    pub fn trigger_events(&self) -> &[TriggerEvent] {
        &self.trigger_events
    }

    pub fn is_empty(&self) -> bool {
        self.collision_events.is_empty() && self.trigger_events.is_empty()
    }

    /// Per-body view of the events. Each event is listed on both bodies,
    /// naming the other one; events involving a body for which `is_enabled`
    /// returns false are dropped.
    pub fn per_body(&self, num_bodies: usize, is_enabled: impl Fn(usize) -> bool) -> Vec<BodyEvents> {
        let mut out = vec![BodyEvents::default(); num_bodies];
        let usable = |pair: BodyIndexPair| {
            pair.body_a < num_bodies && pair.body_b < num_bodies && is_enabled(pair.body_a) && is_enabled(pair.body_b)
        };

        for event in &self.collision_events {
            let pair = event.body_indices;
            if !usable(pair) {
                continue;
            }
            for (body, other) in [(pair.body_a, pair.body_b), (pair.body_b, pair.body_a)] {
                out[body].collisions.push(BodyCollision {
                    other_body: other,
                    average_contact_point_position: event.average_contact_point_position,
                });
            }
        }

        for event in &self.trigger_events {
            let pair = event.body_indices;
            if !usable(pair) {
                continue;
            }
            out[pair.body_a].triggers.push(pair.body_b);
            out[pair.body_b].triggers.push(pair.body_a);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::contact::{ContactFlags, ContactPoint};
    use crate::core::collider::ColliderKey;

    fn manifold(a: usize, b: usize, flags: ContactFlags, distances: &[f32]) -> ContactManifold {
        ContactManifold {
            body_pair: BodyIndexPair::new(a, b),
            normal: Vec3::Y,
            points: distances
                .iter()
                .enumerate()
                .map(|(i, &distance)| ContactPoint {
                    position: Vec3::new(i as f32, 0.0, 0.0),
                    distance,
                })
                .collect(),
            collider_key_a: ColliderKey::EMPTY,
            collider_key_b: ColliderKey::EMPTY,
            friction: 0.5,
            restitution: 0.0,
            flags,
        }
    }

    #[test]
    fn collision_events_average_touching_points() {
        let manifolds = vec![
            manifold(0, 1, ContactFlags::ENABLE_COLLISION_EVENTS, &[-0.1, 0.0, 0.3]),
            manifold(0, 2, ContactFlags::empty(), &[-0.1]),
            manifold(1, 2, ContactFlags::ENABLE_COLLISION_EVENTS, &[0.05]),
        ];
        let events = SimulationEvents::from_manifolds(&manifolds);
        assert_eq!(events.collision_events().len(), 1);
        let event = events.collision_events()[0];
        assert_eq!(event.body_indices, BodyIndexPair::new(0, 1));
        assert_eq!(event.average_contact_point_position, Vec3::new(0.5, 0.0, 0.0));
    }

    #[test]
    fn triggers_are_exported_to_both_bodies() {
        let manifolds = vec![
            manifold(0, 3, ContactFlags::IS_TRIGGER, &[-0.2]),
            manifold(0, 3, ContactFlags::IS_TRIGGER, &[-0.1]),
            manifold(1, 2, ContactFlags::IS_TRIGGER, &[-0.1]),
        ];
        let events = SimulationEvents::from_manifolds(&manifolds);
        assert_eq!(events.trigger_events().len(), 2);

        let per_body = events.per_body(4, |body| body != 2);
        assert_eq!(per_body[0].triggers, vec![3]);
        assert_eq!(per_body[3].triggers, vec![0]);
        assert!(per_body[1].is_empty());
        assert!(per_body[2].is_empty());
    }

    #[test]
    fn collisions_name_the_other_body() {
        let manifolds = vec![manifold(4, 1, ContactFlags::ENABLE_COLLISION_EVENTS, &[-0.1])];
        let per_body = SimulationEvents::from_manifolds(&manifolds).per_body(5, |_| true);
        assert_eq!(per_body[4].collisions[0].other_body, 1);
        assert_eq!(per_body[1].collisions[0].other_body, 4);
    }
}
