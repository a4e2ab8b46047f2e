//! Ability Instances
//!
//! [`Ability`] is the contract every power implements. The manager owns
//! instances as `Box<dyn Ability>`, updates them once per tick and calls
//! [`Ability::on_destroy`] exactly once when they leave the live set.

use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::core::collider::Collider;
use crate::game::activation::Activation;
use crate::game::description::AbilityDescription;
use crate::game::error::AbilityError;
use crate::game::user::{UserId, UserRef};

/// Identifier assigned to an instance when it is added to a manager.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InstanceId(pub u64);

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Outcome of one `update` call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdateResult {
    /// Keep the instance live
    Continue,
    /// Remove and destroy the instance
    Remove,
}

/// Per-tick handle given to instance callbacks.
///
/// Instances spawned through it are queued and only become live on the
/// next tick.
pub struct TickContext {
    tick: u64,
    spawned: Vec<(UserRef, Box<dyn Ability>)>,
}

impl TickContext {
    /// Context for tick `tick`.
    pub fn new(tick: u64) -> Self {
        Self {
            tick,
            spawned: Vec::new(),
        }
    }

    /// Current tick number.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Queue a new instance owned by `user`.
    pub fn spawn(&mut self, user: UserRef, instance: Box<dyn Ability>) {
        self.spawned.push((user, instance));
    }

    /// Number of instances spawned so far.
    pub fn spawned(&self) -> usize {
        self.spawned.len()
    }

    /// Take everything spawned so far.
    pub(crate) fn take_spawned(&mut self) -> Vec<(UserRef, Box<dyn Ability>)> {
        std::mem::take(&mut self.spawned)
    }
}

/// One side's view of a detected collision.
///
/// `remove_self`/`remove_other` carry the current removal proposal. The
/// first callback sees the registered defaults; the second sees them as
/// updated by the first.
#[derive(Clone, Debug)]
pub struct Collision {
    /// Receiving instance
    pub instance: InstanceId,
    /// Collider of the receiving instance that hit
    pub collider: Collider,
    /// Instance on the other side
    pub other_instance: InstanceId,
    /// Kind on the other side
    pub other_kind: Rc<AbilityDescription>,
    /// Owner on the other side
    pub other_user: UserId,
    /// Collider on the other side that hit
    pub other_collider: Collider,
    /// Proposal: remove the receiving instance
    pub remove_self: bool,
    /// Proposal: remove the other instance
    pub remove_other: bool,
}

impl Collision {
    /// Current proposal as a response (accept as is).
    pub fn proposal(&self) -> CollisionResponse {
        CollisionResponse {
            remove_self: self.remove_self,
            remove_other: self.remove_other,
        }
    }
}

/// Removal flags returned from [`Ability::on_collision`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CollisionResponse {
    /// Remove the receiving instance
    pub remove_self: bool,
    /// Remove the other instance
    pub remove_other: bool,
}

impl CollisionResponse {
    /// Neither side is removed.
    pub const KEEP_BOTH: Self = Self {
        remove_self: false,
        remove_other: false,
    };

    /// Build a response.
    pub const fn new(remove_self: bool, remove_other: bool) -> Self {
        Self {
            remove_self,
            remove_other,
        }
    }
}

/// Tickable helper that is not an ability instance, such as a rising
/// pillar or a spreading fracture. Owned by the manager and updated after
/// every instance.
pub trait Updatable {
    /// Per-tick step.
    fn update(&mut self) -> UpdateResult;
}

/// Owned helper handle.
pub type UpdatableRef = Box<dyn Updatable>;

/// A live power.
pub trait Ability {
    /// Kind of this instance.
    fn description(&self) -> &Rc<AbilityDescription>;

    /// Current owner. `None` before a successful `activate`.
    fn user(&self) -> Option<&UserRef>;

    /// Try to start. Returning false discards the instance.
    fn activate(&mut self, user: UserRef, method: Activation) -> bool;

    /// Per-tick step. An error counts as `Remove`.
    fn update(&mut self, ctx: &mut TickContext) -> Result<UpdateResult, AbilityError>;

    /// Cleanup. Called exactly once when the instance leaves the manager.
    fn on_destroy(&mut self) {}

    /// Accept a new owner. Returning false keeps the old one.
    fn set_user(&mut self, _user: UserRef) -> bool {
        false
    }

    /// Reload owner-dependent settings after an ownership change.
    fn recalculate_config(&mut self) {}

    /// Geometry for this tick.
    fn colliders(&self) -> Vec<Collider> {
        Vec::new()
    }

    /// Called once per detected collision with another user's instance.
    fn on_collision(&mut self, collision: &Collision, _ctx: &mut TickContext) -> CollisionResponse {
        collision.proposal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::sphere::Sphere;
    use crate::game::testing::describe;
    use glam::DVec3;

    #[test]
    fn test_default_collision_response_accepts_proposal() {
        let kind = describe("Blast").build().unwrap();
        let mut instance = AbilityDescription::instantiate(&kind);
        let collider: Collider = Sphere::new(DVec3::ZERO, 1.0).into();
        let collision = Collision {
            instance: InstanceId(1),
            collider,
            other_instance: InstanceId(2),
            other_kind: Rc::clone(&kind),
            other_user: UserId::new([2; 16]),
            other_collider: collider,
            remove_self: true,
            remove_other: false,
        };

        let mut ctx = TickContext::new(0);
        assert_eq!(
            instance.on_collision(&collision, &mut ctx),
            CollisionResponse::new(true, false)
        );
    }

    #[test]
    fn test_instance_id_display() {
        assert_eq!(InstanceId(42).to_string(), "#42");
    }
}
