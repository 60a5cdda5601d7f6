//! Rigid Collide – collision detection for rigid-body physics.
//!
//! The crate covers the collision half of a physics step: convex and
//! composite collider shapes, ray/collider-cast/distance queries with
//! pluggable hit collectors, a broad phase, a solver-phase scheduler and a
//! narrow phase that streams contact manifolds and joint jacobians per work
//! item. Constraint solving and integration belong to the caller.
//!
//! ```no_run
//! use rigid_collide::{
//!     BoxGeometry, Collider, CollisionFilter, Material, MotionVelocity, PhysicsWorld, RigidBody,
//!     Simulation, StepConfig, Transform, Vec3,
//! };
//!
//! let cube = Collider::create_box(BoxGeometry::default(), CollisionFilter::DEFAULT, Material::default())
//!     .unwrap()
//!     .into_shared();
//! let mut world = PhysicsWorld::new();
//! world.add_static_body(RigidBody::new(Transform::IDENTITY, cube.clone()));
//! world.add_dynamic_body(
//!     RigidBody::new(Transform::from_position(Vec3::new(0.0, 0.95, 0.0)), cube),
//!     MotionVelocity::ZERO,
//! );
//!
//! let mut simulation = Simulation::new(StepConfig::default());
//! let output = simulation.step(&world);
//! assert_eq!(output.narrow_phase.contacts.len(), 1);
//! ```

pub mod collision;
pub mod config;
pub mod core;
pub mod dynamics;
pub mod utils;
pub mod world;

pub use glam::{Mat3, Quat, Vec3};

pub use collision::{
    AllHitsCollector, AnyHitCollector, BroadPhase, ClosestHitCollector, ColliderCastHit, ColliderCastInput,
    ColliderDistanceInput, Collector, ContactManifold, ContactPoint, DistanceHit, NarrowPhase,
    NarrowPhaseOutput, PointDistanceInput, QueryResult, RaycastHit, RaycastInput,
};
pub use config::StepConfig;
pub use core::{
    Aabb, BodyIndexPair, BoxGeometry, CapsuleGeometry, Collider, ColliderError, ColliderKey, ColliderType,
    CollisionFilter, CollisionType, CompoundChild, CylinderGeometry, Joint, MassProperties, Material,
    MaterialFlags, MeshBuilder, MotionData, MotionVelocity, RigidBody, SphereGeometry, Transform,
};
pub use dynamics::{
    CollisionEvent, DispatchPair, JointJacobian, Scheduler, Simulation, SimulationEvents, SolverSchedulerInfo,
    StepOutput, TriggerEvent,
};
pub use utils::{JobHandle, WorkItemStream};
pub use world::PhysicsWorld;
