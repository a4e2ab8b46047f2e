//! Engine Configuration
//!
//! Runtime knobs ([`EngineConfig`]) and the data-driven registry input
//! ([`RegistrySpec`]). Both deserialize from JSON; the engine config can
//! also be read from `BENDING_*` environment variables.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::game::activation::Activation;
use crate::game::collision::CollisionRegistry;
use crate::game::description::AbilityRegistry;
use crate::game::error::ConfigError;
use crate::game::sequence::{SequenceRegistry, MAX_SEQUENCE_STEPS};

/// Default simulation rate (Hz).
pub const DEFAULT_TICK_RATE: u32 = 20;

/// Sequence buffer limits.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequenceConfig {
    /// Steps kept per user
    pub max_steps: usize,
    /// Inactivity window after which the buffer is cleared (ms)
    pub expiry_ms: u64,
}

impl SequenceConfig {
    /// Inactivity window.
    pub fn expiry(&self) -> Duration {
        Duration::from_millis(self.expiry_ms)
    }
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            max_steps: MAX_SEQUENCE_STEPS,
            expiry_ms: 5000,
        }
    }
}

/// Collision pass settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollisionConfig {
    /// Run the collision pass at all
    pub enabled: bool,
}

impl Default for CollisionConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Top-level engine settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Ticks per second
    pub tick_rate: u32,
    /// Sequence matcher settings
    pub sequence: SequenceConfig,
    /// Collision engine settings
    pub collision: CollisionConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_rate: DEFAULT_TICK_RATE,
            sequence: SequenceConfig::default(),
            collision: CollisionConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load from environment variables, falling back to defaults.
    ///
    /// - `BENDING_TICK_RATE`
    /// - `BENDING_SEQUENCE_MAX_STEPS`
    /// - `BENDING_SEQUENCE_EXPIRY_MS`
    /// - `BENDING_COLLISIONS` (`true`/`1` or `false`/`0`)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) over an arbitrary lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(value) = lookup("BENDING_TICK_RATE") {
            config.tick_rate = parse("BENDING_TICK_RATE", value)?;
        }
        if let Some(value) = lookup("BENDING_SEQUENCE_MAX_STEPS") {
            config.sequence.max_steps = parse("BENDING_SEQUENCE_MAX_STEPS", value)?;
        }
        if let Some(value) = lookup("BENDING_SEQUENCE_EXPIRY_MS") {
            config.sequence.expiry_ms = parse("BENDING_SEQUENCE_EXPIRY_MS", value)?;
        }
        if let Some(value) = lookup("BENDING_COLLISIONS") {
            config.collision.enabled = match value.as_str() {
                "true" | "1" => true,
                "false" | "0" => false,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: "BENDING_COLLISIONS",
                        value,
                    })
                }
            };
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a JSON document. Missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_rate == 0 {
            return Err(ConfigError::InvalidValue {
                key: "tick_rate",
                value: self.tick_rate.to_string(),
            });
        }
        if !(1..=MAX_SEQUENCE_STEPS).contains(&self.sequence.max_steps) {
            return Err(ConfigError::InvalidValue {
                key: "sequence.max_steps",
                value: self.sequence.max_steps.to_string(),
            });
        }
        Ok(())
    }

    /// Length of one tick.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(1) / self.tick_rate.max(1)
    }
}

fn parse<T: std::str::FromStr>(key: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue { key, value })
}

// =============================================================================
// REGISTRY SPEC
// =============================================================================

/// Explicit collision pair by ability name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollisionSpec {
    /// First kind
    pub first: String,
    /// Second kind
    pub second: String,
    /// Remove the first kind's instance
    #[serde(default)]
    pub remove_first: bool,
    /// Remove the second kind's instance
    #[serde(default)]
    pub remove_second: bool,
}

/// One sequence step by ability name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepSpec {
    /// Selected kind
    pub ability: String,
    /// Action performed
    pub action: Activation,
}

/// Combo by ability name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceSpec {
    /// Synthetic kind
    pub ability: String,
    /// Steps in order
    pub steps: Vec<StepSpec>,
}

/// Collision layers, pairs and sequences by ability name.
///
/// ```json
/// {
///   "layers": [["AirBlast", "FireBlast"], ["EarthWall"]],
///   "collisions": [{ "first": "FireBlast", "second": "WaterSpout", "remove_first": true }],
///   "sequences": [{ "ability": "FireKick", "steps": [{ "ability": "FireBlast", "action": "attack" }] }]
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrySpec {
    /// Collision layers, lowest first
    pub layers: Vec<Vec<String>>,
    /// Explicit collision pairs
    pub collisions: Vec<CollisionSpec>,
    /// Input sequences
    pub sequences: Vec<SequenceSpec>,
}

impl RegistrySpec {
    /// Parse a JSON document.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Resolve every name against `abilities`.
    pub fn resolve(
        &self,
        abilities: &AbilityRegistry,
    ) -> Result<(CollisionRegistry, SequenceRegistry), ConfigError> {
        let mut collisions = CollisionRegistry::builder(abilities);
        for layer in &self.layers {
            collisions = collisions.layer(layer.iter().cloned());
        }
        for pair in &self.collisions {
            collisions = collisions.pair(&pair.first, &pair.second, pair.remove_first, pair.remove_second);
        }

        let mut sequences = SequenceRegistry::builder(abilities);
        for sequence in &self.sequences {
            let steps = sequence.steps.iter().map(|s| (s.ability.clone(), s.action));
            sequences = sequences.sequence(&sequence.ability, steps);
        }

        let resolved = (collisions.build()?, sequences.build()?);
        debug!(
            collisions = resolved.0.len(),
            sequences = resolved.1.len(),
            "resolved registry spec"
        );
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::error::RegistryError;
    use crate::game::testing::describe;
    use std::collections::BTreeMap;
    use std::rc::Rc;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: BTreeMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.tick_rate, 20);
        assert_eq!(config.sequence.max_steps, 16);
        assert_eq!(config.sequence.expiry(), Duration::from_secs(5));
        assert!(config.collision.enabled);
        assert_eq!(config.tick_interval(), Duration::from_millis(50));
    }

    #[test]
    fn test_from_lookup() {
        let config = EngineConfig::from_lookup(lookup(&[
            ("BENDING_TICK_RATE", "40"),
            ("BENDING_SEQUENCE_EXPIRY_MS", "2500"),
            ("BENDING_COLLISIONS", "0"),
        ]))
        .unwrap();
        assert_eq!(config.tick_rate, 40);
        assert_eq!(config.sequence.expiry(), Duration::from_millis(2500));
        assert_eq!(config.sequence.max_steps, 16);
        assert!(!config.collision.enabled);
    }

    #[test]
    fn test_bad_values_rejected() {
        let err = EngineConfig::from_lookup(lookup(&[("BENDING_TICK_RATE", "fast")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "BENDING_TICK_RATE", .. }));

        let err = EngineConfig::from_lookup(lookup(&[("BENDING_SEQUENCE_MAX_STEPS", "64")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "sequence.max_steps", .. }));

        let err = EngineConfig::from_lookup(lookup(&[("BENDING_COLLISIONS", "maybe")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "BENDING_COLLISIONS", .. }));
    }

    #[test]
    fn test_partial_json() {
        let config = EngineConfig::from_json(r#"{ "sequence": { "expiry_ms": 1000 } }"#).unwrap();
        assert_eq!(config.sequence.expiry_ms, 1000);
        assert_eq!(config.sequence.max_steps, 16);
        assert_eq!(config.tick_rate, DEFAULT_TICK_RATE);

        assert!(matches!(EngineConfig::from_json("{ nope"), Err(ConfigError::Json(_))));
        assert!(EngineConfig::from_json(r#"{ "tick_rate": 0 }"#).is_err());
    }

    #[test]
    fn test_registry_spec_resolves() {
        let blast = describe("FireBlast").activation(Activation::Attack).build().unwrap();
        let spout = describe("WaterSpout").activation(Activation::Sneak).build().unwrap();
        let kick = describe("FireKick").activation(Activation::Sequence).build().unwrap();
        let abilities = AbilityRegistry::from_descriptions([
            Rc::clone(&blast),
            Rc::clone(&spout),
            Rc::clone(&kick),
        ])
        .unwrap();

        let spec = RegistrySpec::from_json(
            r#"{
                "layers": [["FireBlast"]],
                "collisions": [{ "first": "WaterSpout", "second": "FireBlast", "remove_second": true }],
                "sequences": [{
                    "ability": "FireKick",
                    "steps": [
                        { "ability": "FireBlast", "action": "attack" },
                        { "ability": "FireBlast", "action": "sneak" }
                    ]
                }]
            }"#,
        )
        .unwrap();

        let (collisions, sequences) = spec.resolve(&abilities).unwrap();
        assert_eq!(collisions.len(), 2);
        let pair = collisions.get(&blast, &spout).unwrap();
        assert!(pair.remove_first);
        assert!(!pair.remove_second);
        assert_eq!(sequences.get(&kick).unwrap().steps().len(), 2);
    }

    #[test]
    fn test_registry_spec_unknown_name() {
        let abilities = AbilityRegistry::from_descriptions([describe("FireBlast").build().unwrap()]).unwrap();
        let spec = RegistrySpec::from_json(r#"{ "layers": [["FireBlast", "Lightning"]] }"#).unwrap();

        match spec.resolve(&abilities) {
            Err(ConfigError::Registry(RegistryError::UnknownAbility(name))) => assert_eq!(name, "Lightning"),
            other => panic!("unexpected: {:?}", other.map(|_| ())),
        }
    }
}
