//! Collision detection: queries, contact manifolds, broad phase and narrow phase.

pub mod broadphase;
pub mod clipping;
pub mod collector;
pub mod collider_cast;
pub mod contact;
pub mod distance;
pub mod gjk;
pub mod narrowphase;
pub mod queries;
pub mod raycast;

pub use broadphase::{BroadPhase, SpatialGrid};
pub use collector::{
    AllHitsCollector, AnyHitCollector, ClosestHitCollector, ColliderCastHit, Collector, DistanceHit,
    QueryResult, RaycastHit,
};
pub use collider_cast::{cast_collider, ColliderCastInput};
pub use contact::{ContactFlags, ContactManifold, ContactPoint, ManifoldQueries};
pub use distance::{calculate_distance_collider, calculate_distance_point, ColliderDistanceInput, PointDistanceInput};
pub use gjk::{convex_distance, ConvexView, DistanceResult};
pub use narrowphase::{NarrowPhase, NarrowPhaseHandle, NarrowPhaseOutput};
pub use raycast::{cast_ray, Ray, RaycastInput};
