//! Users
//!
//! The engine never owns users. Game glue implements [`User`] for whatever
//! entity can bend; [`SimpleUser`] is an in-memory implementation for
//! embedding and tests.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::core::clock::ClockRef;
use crate::game::activation::Element;
use crate::game::description::AbilityDescription;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Unique user identifier (128-bit UUID).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(pub [u8; 16]);

impl UserId {
    /// Create from raw bytes.
    pub const fn new(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Generate a random id.
    pub fn random() -> Self {
        Self(*uuid::Uuid::new_v4().as_bytes())
    }

    /// Create from UUID string.
    pub fn from_uuid_str(s: &str) -> Option<Self> {
        uuid::Uuid::parse_str(s)
            .ok()
            .map(|u| Self(*u.as_bytes()))
    }

    /// Convert to UUID string.
    pub fn to_uuid_string(&self) -> String {
        uuid::Uuid::from_bytes(self.0).to_string()
    }

    /// Get raw bytes.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_uuid_string())
    }
}

/// World identifier. Each world runs an independent engine pair.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WorldId(pub u32);

impl fmt::Display for WorldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "world-{}", self.0)
    }
}

// =============================================================================
// USER CONTRACT
// =============================================================================

/// Everything the engine and its abilities read from a bender.
pub trait User {
    /// Stable identity.
    fn id(&self) -> UserId;

    /// World the user is currently in.
    fn world(&self) -> WorldId;

    /// False once the user has died, logged out or otherwise gone away.
    fn is_valid(&self) -> bool;

    /// Ability bound to the currently selected slot.
    fn selected_ability(&self) -> Option<Rc<AbilityDescription>>;

    /// Currently selected hotbar slot.
    fn selected_slot(&self) -> u8;

    /// Eye location.
    fn location(&self) -> DVec3;

    /// Unit look direction.
    fn direction(&self) -> DVec3;

    /// Sneak key held.
    fn is_sneaking(&self) -> bool;

    /// Standing in water or lava.
    fn in_liquid(&self) -> bool;

    /// Check if the user has the element.
    fn has_element(&self, element: Element) -> bool;

    /// Permission and element check for a kind.
    fn can_bend(&self, desc: &AbilityDescription) -> bool;

    /// Check if the kind is cooling down.
    fn on_cooldown(&self, desc: &AbilityDescription) -> bool;

    /// Start a cooldown for the kind.
    fn add_cooldown(&self, desc: &AbilityDescription, duration: Duration);
}

/// Shared handle to a user.
pub type UserRef = Rc<dyn User>;

// =============================================================================
// SIMPLE USER
// =============================================================================

/// In-memory user with interior mutability, driven by the clock it is given.
pub struct SimpleUser {
    id: UserId,
    clock: ClockRef,
    world: Cell<WorldId>,
    valid: Cell<bool>,
    slot: Cell<u8>,
    slots: RefCell<BTreeMap<u8, Rc<AbilityDescription>>>,
    location: Cell<DVec3>,
    direction: Cell<DVec3>,
    sneaking: Cell<bool>,
    liquid: Cell<bool>,
    elements: RefCell<BTreeSet<Element>>,
    denied: RefCell<BTreeSet<String>>,
    cooldowns: RefCell<BTreeMap<String, Duration>>,
}

impl SimpleUser {
    /// Create a user in `world` with no elements.
    pub fn new(id: UserId, world: WorldId, clock: ClockRef) -> Self {
        Self {
            id,
            clock,
            world: Cell::new(world),
            valid: Cell::new(true),
            slot: Cell::new(1),
            slots: RefCell::new(BTreeMap::new()),
            location: Cell::new(DVec3::ZERO),
            direction: Cell::new(DVec3::Z),
            sneaking: Cell::new(false),
            liquid: Cell::new(false),
            elements: RefCell::new(BTreeSet::new()),
            denied: RefCell::new(BTreeSet::new()),
            cooldowns: RefCell::new(BTreeMap::new()),
        }
    }

    /// Grant an element.
    pub fn add_element(&self, element: Element) {
        self.elements.borrow_mut().insert(element);
    }

    /// Revoke an element.
    pub fn remove_element(&self, element: Element) {
        self.elements.borrow_mut().remove(&element);
    }

    /// Bind a kind to a hotbar slot. Unbindable kinds are refused.
    pub fn bind(&self, slot: u8, desc: Rc<AbilityDescription>) -> bool {
        if !desc.can_bind() {
            return false;
        }
        self.slots.borrow_mut().insert(slot, desc);
        true
    }

    /// Clear a hotbar slot.
    pub fn unbind(&self, slot: u8) {
        self.slots.borrow_mut().remove(&slot);
    }

    /// Change the selected slot.
    pub fn select_slot(&self, slot: u8) {
        self.slot.set(slot);
    }

    /// Move the user.
    pub fn set_location(&self, location: DVec3) {
        self.location.set(location);
    }

    /// Turn the user; the direction is normalized.
    pub fn set_direction(&self, direction: DVec3) {
        self.direction.set(direction.normalize_or_zero());
    }

    /// Press or release sneak.
    pub fn set_sneaking(&self, sneaking: bool) {
        self.sneaking.set(sneaking);
    }

    /// Enter or leave liquid.
    pub fn set_in_liquid(&self, liquid: bool) {
        self.liquid.set(liquid);
    }

    /// Move to another world.
    pub fn set_world(&self, world: WorldId) {
        self.world.set(world);
    }

    /// Mark the user as gone.
    pub fn invalidate(&self) {
        self.valid.set(false);
    }

    /// Deny (or re-allow) a kind regardless of elements.
    pub fn set_permission(&self, desc: &AbilityDescription, allowed: bool) {
        let mut denied = self.denied.borrow_mut();
        if allowed {
            denied.remove(desc.key());
        } else {
            denied.insert(desc.key().to_owned());
        }
    }

    /// Drop any cooldown on the kind.
    pub fn reset_cooldown(&self, desc: &AbilityDescription) {
        self.cooldowns.borrow_mut().remove(desc.key());
    }
}

impl User for SimpleUser {
    fn id(&self) -> UserId {
        self.id
    }

    fn world(&self) -> WorldId {
        self.world.get()
    }

    fn is_valid(&self) -> bool {
        self.valid.get()
    }

    fn selected_ability(&self) -> Option<Rc<AbilityDescription>> {
        self.slots.borrow().get(&self.slot.get()).cloned()
    }

    fn selected_slot(&self) -> u8 {
        self.slot.get()
    }

    fn location(&self) -> DVec3 {
        self.location.get()
    }

    fn direction(&self) -> DVec3 {
        self.direction.get()
    }

    fn is_sneaking(&self) -> bool {
        self.sneaking.get()
    }

    fn in_liquid(&self) -> bool {
        self.liquid.get()
    }

    fn has_element(&self, element: Element) -> bool {
        self.elements.borrow().contains(&element)
    }

    fn can_bend(&self, desc: &AbilityDescription) -> bool {
        if !self.is_valid() || self.denied.borrow().contains(desc.key()) {
            return false;
        }
        let elements = self.elements.borrow();
        desc.elements().is_empty() || desc.elements().iter().any(|e| elements.contains(e))
    }

    fn on_cooldown(&self, desc: &AbilityDescription) -> bool {
        self.cooldowns
            .borrow()
            .get(desc.key())
            .is_some_and(|until| self.clock.now() < *until)
    }

    fn add_cooldown(&self, desc: &AbilityDescription, duration: Duration) {
        if duration.is_zero() {
            return;
        }
        let until = self.clock.now() + duration;
        self.cooldowns.borrow_mut().insert(desc.key().to_owned(), until);
    }
}

impl fmt::Debug for SimpleUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimpleUser")
            .field("id", &self.id)
            .field("world", &self.world.get())
            .field("valid", &self.valid.get())
            .field("slot", &self.slot.get())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::testing::{describe, Fixture};
    use crate::game::activation::Activation;

    #[test]
    fn test_user_id_uuid_roundtrip() {
        let id = UserId::random();
        let parsed = UserId::from_uuid_str(&id.to_uuid_string()).unwrap();
        assert_eq!(parsed, id);
        assert!(UserId::from_uuid_str("not-a-uuid").is_none());
    }

    #[test]
    fn test_cooldowns_follow_clock() {
        let fx = Fixture::new();
        let user = fx.user(1);
        let blast = describe("Blast").activation(Activation::Attack).element(Element::Earth).build().unwrap();

        assert!(!user.on_cooldown(&blast));
        user.add_cooldown(&blast, Duration::from_millis(500));
        assert!(user.on_cooldown(&blast));

        fx.clock.advance(Duration::from_millis(499));
        assert!(user.on_cooldown(&blast));
        fx.clock.advance(Duration::from_millis(1));
        assert!(!user.on_cooldown(&blast));
    }

    #[test]
    fn test_can_bend_requires_element_and_permission() {
        let fx = Fixture::new();
        let user = fx.user(1);
        let blast = describe("Blast").activation(Activation::Attack).element(Element::Earth).build().unwrap();

        assert!(!user.can_bend(&blast));
        user.add_element(Element::Earth);
        assert!(user.can_bend(&blast));

        user.set_permission(&blast, false);
        assert!(!user.can_bend(&blast));
        user.set_permission(&blast, true);
        user.invalidate();
        assert!(!user.can_bend(&blast));
    }

    #[test]
    fn test_unbindable_kinds_rejected() {
        let fx = Fixture::new();
        let user = fx.user(1);
        let combo = describe("Combo").activation(Activation::Sequence).build().unwrap();
        let blast = describe("Blast").activation(Activation::Attack).build().unwrap();

        assert!(!user.bind(1, combo));
        assert!(user.bind(1, Rc::clone(&blast)));
        assert_eq!(user.selected_ability(), Some(blast));

        user.select_slot(2);
        assert!(user.selected_ability().is_none());
    }
}
