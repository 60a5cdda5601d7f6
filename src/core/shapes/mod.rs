//! Convex collider variants. Each owns a [`ConvexHull`](super::convex_hull::ConvexHull)
//! rebuilt whenever its geometry changes.

pub mod box_shape;
pub mod capsule;
pub mod cylinder;
pub mod polygon;
pub mod sphere;

pub use box_shape::BoxCollider;
pub use capsule::CapsuleCollider;
pub use cylinder::CylinderCollider;
pub use polygon::PolygonCollider;
pub use sphere::SphereCollider;
