//! Ability Descriptions
//!
//! A description is the immutable identity shared by every instance of a
//! power. Descriptions are built once at startup, collected into an
//! [`AbilityRegistry`] and passed around as `Rc<AbilityDescription>`.
//! Two descriptions are equal when their names match case-insensitively.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use tracing::debug;

use crate::game::ability::Ability;
use crate::game::activation::{Activation, Element};
use crate::game::error::RegistryError;

/// Creates a fresh, not yet activated instance of a kind.
pub type AbilityFactory = Rc<dyn Fn(Rc<AbilityDescription>) -> Box<dyn Ability>>;

/// Immutable identity of an ability kind.
pub struct AbilityDescription {
    name: String,
    key: String,
    activations: BTreeSet<Activation>,
    elements: BTreeSet<Element>,
    bypass_cooldown: bool,
    hidden: bool,
    can_bind: bool,
    factory: AbilityFactory,
}

impl AbilityDescription {
    /// Start building a description.
    pub fn builder<F>(name: impl Into<String>, factory: F) -> AbilityDescriptionBuilder
    where
        F: Fn(Rc<AbilityDescription>) -> Box<dyn Ability> + 'static,
    {
        AbilityDescriptionBuilder {
            name: name.into(),
            activations: BTreeSet::new(),
            elements: BTreeSet::new(),
            bypass_cooldown: false,
            hidden: false,
            bindable: true,
            factory: Rc::new(factory),
        }
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Lowercase name used for lookups and equality.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Triggers this kind responds to.
    pub fn activations(&self) -> &BTreeSet<Activation> {
        &self.activations
    }

    /// Check if `method` starts this kind.
    pub fn is_activated_by(&self, method: Activation) -> bool {
        self.activations.contains(&method)
    }

    /// Passive kinds are granted by `create_passives`.
    pub fn is_passive(&self) -> bool {
        self.is_activated_by(Activation::Passive)
    }

    /// Elements the kind belongs to. Empty means element-less.
    pub fn elements(&self) -> &BTreeSet<Element> {
        &self.elements
    }

    /// Check membership in an element.
    pub fn has_element(&self, element: Element) -> bool {
        self.elements.contains(&element)
    }

    /// Activation ignores the user's cooldown for this kind.
    pub fn bypass_cooldown(&self) -> bool {
        self.bypass_cooldown
    }

    /// Hidden kinds are left out of listings.
    pub fn hidden(&self) -> bool {
        self.hidden
    }

    /// Whether a user may put this kind on a hotbar slot.
    pub fn can_bind(&self) -> bool {
        self.can_bind
    }

    /// Create a fresh instance through the kind's factory.
    pub fn instantiate(desc: &Rc<AbilityDescription>) -> Box<dyn Ability> {
        (desc.factory)(Rc::clone(desc))
    }
}

impl PartialEq for AbilityDescription {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for AbilityDescription {}

impl Hash for AbilityDescription {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl fmt::Display for AbilityDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl fmt::Debug for AbilityDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AbilityDescription")
            .field("name", &self.name)
            .field("activations", &self.activations)
            .field("elements", &self.elements)
            .field("bypass_cooldown", &self.bypass_cooldown)
            .field("hidden", &self.hidden)
            .field("can_bind", &self.can_bind)
            .finish_non_exhaustive()
    }
}

/// Builder for [`AbilityDescription`].
pub struct AbilityDescriptionBuilder {
    name: String,
    activations: BTreeSet<Activation>,
    elements: BTreeSet<Element>,
    bypass_cooldown: bool,
    hidden: bool,
    bindable: bool,
    factory: AbilityFactory,
}

impl AbilityDescriptionBuilder {
    /// Add a trigger.
    pub fn activation(mut self, method: Activation) -> Self {
        self.activations.insert(method);
        self
    }

    /// Add several triggers.
    pub fn activations(mut self, methods: impl IntoIterator<Item = Activation>) -> Self {
        self.activations.extend(methods);
        self
    }

    /// Add an element.
    pub fn element(mut self, element: Element) -> Self {
        self.elements.insert(element);
        self
    }

    /// Ignore cooldowns on activation.
    pub fn bypass_cooldown(mut self, bypass: bool) -> Self {
        self.bypass_cooldown = bypass;
        self
    }

    /// Hide from listings.
    pub fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    /// Allow binding to slots. Sequence-activated kinds are never bindable.
    pub fn bindable(mut self, bindable: bool) -> Self {
        self.bindable = bindable;
        self
    }

    /// Validate and freeze.
    pub fn build(self) -> Result<Rc<AbilityDescription>, RegistryError> {
        if self.name.is_empty() || !self.name.chars().all(char::is_alphabetic) {
            return Err(RegistryError::InvalidName(self.name));
        }
        let can_bind = self.bindable && !self.activations.contains(&Activation::Sequence);
        Ok(Rc::new(AbilityDescription {
            key: self.name.to_lowercase(),
            name: self.name,
            activations: self.activations,
            elements: self.elements,
            bypass_cooldown: self.bypass_cooldown,
            hidden: self.hidden,
            can_bind,
            factory: self.factory,
        }))
    }
}

// =============================================================================
// REGISTRY
// =============================================================================

/// All known kinds, keyed by lowercase name.
#[derive(Debug, Default)]
pub struct AbilityRegistry {
    abilities: BTreeMap<String, Rc<AbilityDescription>>,
}

impl AbilityRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a list of descriptions, rejecting duplicates.
    pub fn from_descriptions(
        descriptions: impl IntoIterator<Item = Rc<AbilityDescription>>,
    ) -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        for desc in descriptions {
            registry.register(desc)?;
        }
        Ok(registry)
    }

    /// Add a description.
    pub fn register(&mut self, desc: Rc<AbilityDescription>) -> Result<(), RegistryError> {
        if self.abilities.contains_key(desc.key()) {
            return Err(RegistryError::DuplicateAbility(desc.name().to_owned()));
        }
        debug!(ability = %desc.name(), "registered ability");
        self.abilities.insert(desc.key().to_owned(), desc);
        Ok(())
    }

    /// Case-insensitive lookup.
    pub fn get(&self, name: &str) -> Option<&Rc<AbilityDescription>> {
        self.abilities.get(&name.to_lowercase())
    }

    /// Lookup that fails with `UnknownAbility`.
    pub fn require(&self, name: &str) -> Result<&Rc<AbilityDescription>, RegistryError> {
        self.get(name)
            .ok_or_else(|| RegistryError::UnknownAbility(name.to_owned()))
    }

    /// Check if this exact kind is registered.
    pub fn contains(&self, desc: &AbilityDescription) -> bool {
        self.abilities.contains_key(desc.key())
    }

    /// Number of kinds.
    pub fn len(&self) -> usize {
        self.abilities.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.abilities.is_empty()
    }

    /// All kinds in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Rc<AbilityDescription>> {
        self.abilities.values()
    }

    /// Visible passive kinds, for listings.
    pub fn passives(&self) -> impl Iterator<Item = &Rc<AbilityDescription>> {
        self.iter().filter(|d| d.is_passive() && !d.hidden())
    }

    /// Every passive kind, hidden ones included.
    pub fn all_passives(&self) -> impl Iterator<Item = &Rc<AbilityDescription>> {
        self.iter().filter(|d| d.is_passive())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::testing::describe;

    #[test]
    fn test_name_validation() {
        assert!(describe("AirBlast").build().is_ok());
        assert_eq!(
            describe("").build().unwrap_err(),
            RegistryError::InvalidName(String::new())
        );
        assert!(matches!(
            describe("Air Blast").build(),
            Err(RegistryError::InvalidName(_))
        ));
        assert!(describe("Blast2").build().is_err());
    }

    #[test]
    fn test_sequence_kinds_are_not_bindable() {
        let combo = describe("Combo").activation(Activation::Sequence).build().unwrap();
        assert!(!combo.can_bind());

        let blast = describe("Blast").activation(Activation::Attack).build().unwrap();
        assert!(blast.can_bind());

        let locked = describe("Locked").bindable(false).build().unwrap();
        assert!(!locked.can_bind());
    }

    #[test]
    fn test_case_insensitive_identity() {
        let a = describe("FireBlast").build().unwrap();
        let b = describe("fireblast").build().unwrap();
        assert_eq!(a, b);

        let mut registry = AbilityRegistry::new();
        registry.register(a).unwrap();
        assert_eq!(
            registry.register(b),
            Err(RegistryError::DuplicateAbility("fireblast".into()))
        );
        assert!(registry.get("FIREBLAST").is_some());
        assert_eq!(
            registry.require("WaterSpout").unwrap_err(),
            RegistryError::UnknownAbility("WaterSpout".into())
        );
    }

    #[test]
    fn test_passive_listing_skips_hidden() {
        let registry = AbilityRegistry::from_descriptions([
            describe("Acrobat").activation(Activation::Passive).build().unwrap(),
            describe("Secret").activation(Activation::Passive).hidden(true).build().unwrap(),
            describe("Blast").activation(Activation::Attack).build().unwrap(),
        ])
        .unwrap();

        let visible: Vec<_> = registry.passives().map(|d| d.name().to_owned()).collect();
        assert_eq!(visible, vec!["Acrobat"]);
        assert_eq!(registry.all_passives().count(), 2);
    }

    #[test]
    fn test_factory_receives_description() {
        let blast = describe("Blast").activation(Activation::Attack).build().unwrap();
        let instance = AbilityDescription::instantiate(&blast);
        assert_eq!(instance.description(), &blast);
    }
}
