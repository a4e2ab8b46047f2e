//! Core primitives.
//!
//! Collider shapes and their intersection tests, plus the clock
//! abstraction. Nothing in here knows about abilities or users.

pub mod aabb;
pub mod obb;
pub mod sphere;
pub mod ray;
pub mod disk;
pub mod collider;
pub mod clock;

// Re-export core types
pub use aabb::Aabb;
pub use obb::Obb;
pub use sphere::Sphere;
pub use ray::Ray;
pub use disk::Disk;
pub use collider::Collider;
pub use clock::{Clock, ClockRef, ManualClock, SystemClock};
