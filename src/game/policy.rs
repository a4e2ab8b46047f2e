//! Removal Policies
//!
//! A removal policy decides when an instance terminates itself. Policies
//! are OR-chains of small units built with [`Policies::builder`]; the first
//! unit that reports true ends the instance.
//!
//! Units that capture state at construction (start time, origin) belong
//! to exactly one instance. Build a new policy per instance.
//!
//! ```ignore
//! let policy = Policies::builder()
//!     .add(SwappedSlots::new(Rc::clone(&desc)))
//!     .add(Expire::after(Duration::from_secs(3), clock))
//!     .build();
//! ```

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use glam::DVec3;

use crate::core::clock::ClockRef;
use crate::game::description::AbilityDescription;
use crate::game::user::User;

/// Termination predicate over (user, kind).
pub trait RemovalPolicy {
    /// True when the instance should be removed.
    fn test(&self, user: &dyn User, desc: &AbilityDescription) -> bool;
}

// =============================================================================
// UNITS
// =============================================================================

/// User is no longer valid (dead, offline or gone).
#[derive(Clone, Copy, Debug, Default)]
pub struct Dead;

impl RemovalPolicy for Dead {
    fn test(&self, user: &dyn User, _desc: &AbilityDescription) -> bool {
        !user.is_valid()
    }
}

/// Selected kind is no longer `expected`.
#[derive(Clone, Debug)]
pub struct SwappedSlots {
    expected: Rc<AbilityDescription>,
}

impl SwappedSlots {
    /// Remove once the user selects anything but `expected`.
    pub fn new(expected: Rc<AbilityDescription>) -> Self {
        Self { expected }
    }
}

impl RemovalPolicy for SwappedSlots {
    fn test(&self, user: &dyn User, _desc: &AbilityDescription) -> bool {
        user.selected_ability()
            .map_or(true, |selected| *selected != *self.expected)
    }
}

/// User stands in liquid.
#[derive(Clone, Copy, Debug, Default)]
pub struct InLiquid;

impl RemovalPolicy for InLiquid {
    fn test(&self, user: &dyn User, _desc: &AbilityDescription) -> bool {
        user.in_liquid()
    }
}

/// User released sneak.
#[derive(Clone, Copy, Debug, Default)]
pub struct NotSneaking;

impl RemovalPolicy for NotSneaking {
    fn test(&self, user: &dyn User, _desc: &AbilityDescription) -> bool {
        !user.is_sneaking()
    }
}

/// User is sneaking.
#[derive(Clone, Copy, Debug, Default)]
pub struct Sneaking;

impl RemovalPolicy for Sneaking {
    fn test(&self, user: &dyn User, _desc: &AbilityDescription) -> bool {
        user.is_sneaking()
    }
}

/// Fixed lifetime measured from construction.
///
/// A zero duration never expires.
pub struct Expire {
    clock: ClockRef,
    deadline: Option<Duration>,
}

impl Expire {
    /// Expire `duration` after now.
    pub fn after(duration: Duration, clock: ClockRef) -> Self {
        let deadline = (!duration.is_zero()).then(|| clock.now() + duration);
        Self { clock, deadline }
    }
}

impl RemovalPolicy for Expire {
    fn test(&self, _user: &dyn User, _desc: &AbilityDescription) -> bool {
        self.deadline.is_some_and(|deadline| self.clock.now() >= deadline)
    }
}

impl fmt::Debug for Expire {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Expire").field("deadline", &self.deadline).finish()
    }
}

/// Position that [`OutOfRange`] measures against.
#[derive(Clone, Debug)]
pub enum Tracked {
    /// The user's current location
    User,
    /// A position the instance keeps updating
    Shared(Rc<Cell<DVec3>>),
}

/// Tracked position drifted farther than `range` from the origin.
#[derive(Clone, Debug)]
pub struct OutOfRange {
    range_sq: f64,
    origin: DVec3,
    tracked: Tracked,
}

impl OutOfRange {
    /// Origin is the user's location now; the user's later location is tracked.
    pub fn from_user(range: f64, user: &dyn User) -> Self {
        Self {
            range_sq: range * range,
            origin: user.location(),
            tracked: Tracked::User,
        }
    }

    /// Track a shared position against a fixed origin.
    pub fn tracking(range: f64, origin: DVec3, position: Rc<Cell<DVec3>>) -> Self {
        Self {
            range_sq: range * range,
            origin,
            tracked: Tracked::Shared(position),
        }
    }
}

impl RemovalPolicy for OutOfRange {
    fn test(&self, user: &dyn User, _desc: &AbilityDescription) -> bool {
        let current = match &self.tracked {
            Tracked::User => user.location(),
            Tracked::Shared(position) => position.get(),
        };
        self.origin.distance_squared(current) > self.range_sq
    }
}

/// Selected hotbar slot differs from the one captured at construction.
#[derive(Clone, Copy, Debug)]
pub struct SlotChanged {
    slot: u8,
}

impl SlotChanged {
    /// Capture the user's current slot.
    pub fn from_user(user: &dyn User) -> Self {
        Self {
            slot: user.selected_slot(),
        }
    }
}

impl RemovalPolicy for SlotChanged {
    fn test(&self, user: &dyn User, _desc: &AbilityDescription) -> bool {
        user.selected_slot() != self.slot
    }
}

/// Arbitrary predicate.
pub struct Custom(Box<dyn Fn(&dyn User, &AbilityDescription) -> bool>);

impl Custom {
    /// Wrap a closure.
    pub fn new(f: impl Fn(&dyn User, &AbilityDescription) -> bool + 'static) -> Self {
        Self(Box::new(f))
    }
}

impl RemovalPolicy for Custom {
    fn test(&self, user: &dyn User, desc: &AbilityDescription) -> bool {
        (self.0)(user, desc)
    }
}

// =============================================================================
// COMBINATOR
// =============================================================================

/// OR-chain of units.
pub struct Policies {
    units: Vec<Box<dyn RemovalPolicy>>,
}

impl Policies {
    /// Builder preloaded with [`Dead`].
    pub fn builder() -> PoliciesBuilder {
        PoliciesBuilder {
            units: vec![Box::new(Dead)],
        }
    }

    /// Number of units in the chain.
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Check if the chain has no units (never removes).
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

impl RemovalPolicy for Policies {
    fn test(&self, user: &dyn User, desc: &AbilityDescription) -> bool {
        self.units.iter().any(|unit| unit.test(user, desc))
    }
}

impl fmt::Debug for Policies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Policies").field("units", &self.units.len()).finish()
    }
}

/// Builder for [`Policies`].
pub struct PoliciesBuilder {
    units: Vec<Box<dyn RemovalPolicy>>,
}

impl PoliciesBuilder {
    /// Drop the default units.
    pub fn without_defaults(mut self) -> Self {
        self.units.clear();
        self
    }

    /// Append a unit.
    pub fn add(mut self, unit: impl RemovalPolicy + 'static) -> Self {
        self.units.push(Box::new(unit));
        self
    }

    /// Append a closure unit.
    pub fn add_fn(self, f: impl Fn(&dyn User, &AbilityDescription) -> bool + 'static) -> Self {
        self.add(Custom::new(f))
    }

    /// Freeze the chain.
    pub fn build(self) -> Policies {
        Policies { units: self.units }
    }
}
