//! Error types for the engine.

use thiserror::Error;

/// Startup-time registration failures.
///
/// These are returned while building registries and never at tick time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Ability names must be non-empty and alphabetic.
    #[error("invalid ability name: {0:?}")]
    InvalidName(String),

    /// Two descriptions share a (case-insensitive) name.
    #[error("duplicate ability: {0}")]
    DuplicateAbility(String),

    /// A collision pair, layer or sequence references an unregistered kind.
    #[error("unknown ability: {0}")]
    UnknownAbility(String),

    /// Sequence has too few or too many steps.
    #[error("sequence {name} has {len} steps, expected 1..={max}")]
    SequenceLength {
        /// Synthetic ability name
        name: String,
        /// Number of steps supplied
        len: usize,
        /// Upper bound
        max: usize,
    },

    /// The synthetic ability of a sequence must accept `Activation::Sequence`.
    #[error("ability {0} is not activated by sequences")]
    NotSequenceActivated(String),

    /// A synthetic ability already has a sequence.
    #[error("duplicate sequence for {0}")]
    DuplicateSequence(String),
}

/// Runtime fault reported by an ability instance from `update`.
///
/// The manager logs it and removes the instance.
#[derive(Debug, Error)]
pub enum AbilityError {
    /// The owning user disappeared or became invalid mid-update.
    #[error("owner is no longer valid")]
    InvalidOwner,

    /// The instance reached a state it cannot continue from.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Anything else.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable or field held an unusable value.
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue {
        /// Variable or field name
        key: &'static str,
        /// Raw value
        value: String,
    },

    /// Registry spec could not be parsed.
    #[error("malformed registry spec: {0}")]
    Json(#[from] serde_json::Error),

    /// Registry spec parsed but references bad kinds.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}
