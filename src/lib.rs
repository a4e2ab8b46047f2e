//! # Bending Engine
//!
//! Effect simulation for elemental powers: instance lifecycle, collision
//! resolution between effects and combo activation.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      BENDING ENGINE                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/             - Geometry and time                       │
//! │  ├── aabb.rs       - Axis-aligned boxes                      │
//! │  ├── obb.rs        - Oriented boxes (separating axes)        │
//! │  ├── sphere.rs     - Spheres                                 │
//! │  ├── ray.rs        - Capped rays                             │
//! │  ├── disk.rs       - Sphere and box composite                │
//! │  ├── collider.rs   - Closed collider variant                 │
//! │  └── clock.rs      - Injectable time source                  │
//! │                                                              │
//! │  game/             - Simulation                              │
//! │  ├── description.rs- Ability kinds and registry              │
//! │  ├── ability.rs    - Instance contract                       │
//! │  ├── policy.rs     - Removal predicates                      │
//! │  ├── manager.rs    - Per-world lifecycle                     │
//! │  ├── collision.rs  - Pair registry and resolution            │
//! │  ├── sequence.rs   - Combo matching                          │
//! │  ├── tick.rs       - World loop and engine                   │
//! │  └── config.rs     - Tunables and registry definitions       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Execution Model
//!
//! Everything runs on one simulation thread:
//! - Shared handles are `Rc`, never `Arc`
//! - Instance tables are `BTreeMap` for stable iteration
//! - Time comes from an injected [`core::Clock`]
//! - A panicking instance is logged and dropped, not propagated
//!
//! Each world ticks as lifecycle pass, then collision pass, then event
//! collection.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;

// Re-export commonly used types
pub use core::{Collider, Clock, ClockRef, ManualClock, SystemClock};
pub use game::{
    Ability, AbilityDescription, AbilityManager, AbilityRegistry, Activation, CollisionEngine,
    CollisionRegistry, Engine, EngineConfig, SequenceMatcher, SequenceRegistry, User, UserId,
    UserRef, WorldId,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
