//! Effect Simulation Module
//!
//! Ability lifecycle, collision resolution and combo matching.
//!
//! ## Module Structure
//!
//! - `activation`: Trigger methods and elements
//! - `description`: Ability kinds and the kind registry
//! - `user`: Owner capability and a plain in-memory owner
//! - `ability`: Instance contract, tick context, collision records
//! - `policy`: Composable removal predicates
//! - `manager`: Per-world instance lifecycle
//! - `collision`: Pair registry and pairwise resolution
//! - `sequence`: Combo registry and per-user step buffers
//! - `tick`: World loop and engine front door
//! - `events`: Engine events for logging and inspection
//! - `config`: Runtime tunables and registry definitions

pub mod activation;
pub mod description;
pub mod user;
pub mod ability;
pub mod policy;
pub mod manager;
pub mod collision;
pub mod sequence;
pub mod tick;
pub mod events;
pub mod config;
pub mod error;

#[cfg(test)]
pub(crate) mod testing;

// Re-export key types
pub use activation::{Activation, Element};
pub use description::{AbilityDescription, AbilityDescriptionBuilder, AbilityFactory, AbilityRegistry};
pub use user::{SimpleUser, User, UserId, UserRef, WorldId};
pub use ability::{
    Ability, Collision, CollisionResponse, InstanceId, TickContext, Updatable, UpdatableRef, UpdateResult,
};
pub use policy::{Policies, RemovalPolicy};
pub use manager::{AbilityManager, InstanceSnapshot};
pub use collision::{CollisionEngine, CollisionPair, CollisionRegistry};
pub use sequence::{Sequence, SequenceMatcher, SequenceRegistry, SequenceStep, MAX_SEQUENCE_STEPS};
pub use tick::{ActionResult, Engine, TickResult, World};
pub use events::{DestroyReason, EngineEvent, EngineEventData, EventPriority};
pub use config::{EngineConfig, RegistrySpec};
pub use error::{AbilityError, ConfigError, RegistryError};
