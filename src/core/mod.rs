//! Collider shapes, composite colliders and the body data they attach to.

pub mod bvh;
pub mod collider;
pub mod compound;
pub mod constraints;
pub mod convex_hull;
pub mod filter;
pub mod geometry;
pub mod mesh;
pub mod rigidbody;
pub mod shapes;
pub mod terrain;
pub mod types;

pub use collider::{Collider, ColliderError, ColliderKey, ColliderType, CollisionType};
pub use compound::{CompoundChild, CompoundCollider};
pub use constraints::{BodyIndexPair, Joint, JointData};
pub use convex_hull::ConvexHull;
pub use filter::CollisionFilter;
pub use geometry::{BoxGeometry, CapsuleGeometry, CylinderGeometry, GeometryError, SphereGeometry};
pub use mesh::{MeshBuilder, MeshCollider};
pub use rigidbody::{MotionData, MotionExpansion, MotionVelocity, RigidBody};
pub use terrain::TerrainCollider;
pub use types::{Aabb, CombinePolicy, MassProperties, Material, MaterialFlags, Plane, Transform};
