//! Activation triggers and elements.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Input or event that may start an ability.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    /// Granted automatically while the user can bend the kind
    Passive,
    /// Left click
    Attack,
    /// Right click in the air
    Interact,
    /// Right click on an entity
    InteractEntity,
    /// Right click on a block
    InteractBlock,
    /// Sneak key pressed
    Sneak,
    /// Sneak key released
    SneakRelease,
    /// Fall damage
    Fall,
    /// Completed input combo
    Sequence,
}

impl Activation {
    /// All triggers, in declaration order.
    pub const ALL: [Activation; 9] = [
        Activation::Passive,
        Activation::Attack,
        Activation::Interact,
        Activation::InteractEntity,
        Activation::InteractBlock,
        Activation::Sneak,
        Activation::SneakRelease,
        Activation::Fall,
        Activation::Sequence,
    ];

    /// Short name used in logs and combo listings.
    pub fn as_str(&self) -> &'static str {
        match self {
            Activation::Passive => "passive",
            Activation::Attack => "attack",
            Activation::Interact => "interact",
            Activation::InteractEntity => "interact_entity",
            Activation::InteractBlock => "interact_block",
            Activation::Sneak => "sneak",
            Activation::SneakRelease => "sneak_release",
            Activation::Fall => "fall",
            Activation::Sequence => "sequence",
        }
    }
}

impl fmt::Display for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bending element.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Element {
    /// Air
    Air,
    /// Water
    Water,
    /// Earth
    Earth,
    /// Fire
    Fire,
}

impl Element {
    /// All elements.
    pub const ALL: [Element; 4] = [Element::Air, Element::Water, Element::Earth, Element::Fire];
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Element::Air => "air",
            Element::Water => "water",
            Element::Earth => "earth",
            Element::Fire => "fire",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activation_serde_names() {
        let json = serde_json::to_string(&Activation::SneakRelease).unwrap();
        assert_eq!(json, "\"sneak_release\"");

        let parsed: Activation = serde_json::from_str("\"interact_block\"").unwrap();
        assert_eq!(parsed, Activation::InteractBlock);

        for method in Activation::ALL {
            let round: Activation = serde_json::from_str(&format!("\"{}\"", method)).unwrap();
            assert_eq!(round, method);
        }
    }
}
