//! Shared test fixtures: a scriptable ability and users on a manual clock.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::core::clock::ManualClock;
use crate::core::collider::Collider;
use crate::game::ability::{Ability, Collision, CollisionResponse, TickContext, UpdateResult};
use crate::game::activation::Activation;
use crate::game::description::{AbilityDescription, AbilityDescriptionBuilder};
use crate::game::error::AbilityError;
use crate::game::policy::{Policies, RemovalPolicy};
use crate::game::user::{SimpleUser, UserId, UserRef, WorldId};

/// Clock plus user factory.
pub struct Fixture {
    pub clock: ManualClock,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            clock: ManualClock::new(),
        }
    }

    /// User `[n; 16]` in world 0.
    pub fn user(&self, n: u8) -> Rc<SimpleUser> {
        self.user_in(n, WorldId(0))
    }

    pub fn user_in(&self, n: u8, world: WorldId) -> Rc<SimpleUser> {
        Rc::new(SimpleUser::new(UserId::new([n; 16]), world, self.clock.handle()))
    }
}

/// Builder whose instances report to a throwaway script.
pub fn describe(name: &str) -> AbilityDescriptionBuilder {
    ScriptHandle::new().describe(name)
}

/// What a script does on `update`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScriptMode {
    Continue,
    Remove,
    Fail,
    Panic,
}

#[derive(Default)]
struct ScriptState {
    activations: Cell<u32>,
    updates: Cell<u32>,
    destroys: Cell<u32>,
    collisions: Cell<u32>,
    recalculations: Cell<u32>,
    refuse_activation: Cell<bool>,
    refuse_owner: Cell<bool>,
    panic_on_destroy: Cell<bool>,
    panic_on_colliders: Cell<bool>,
    panic_on_owner: Cell<bool>,
    mode: Cell<Option<ScriptMode>>,
    response: Cell<Option<CollisionResponse>>,
    seen: RefCell<Vec<Collision>>,
}

/// Shared counters and knobs for every script created from it.
#[derive(Clone, Default)]
pub struct ScriptHandle {
    state: Rc<ScriptState>,
}

impl ScriptHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Description builder whose factory creates scripts reporting here.
    pub fn describe(&self, name: &str) -> AbilityDescriptionBuilder {
        let handle = self.clone();
        AbilityDescription::builder(name, move |desc| {
            Box::new(Scripted::new(desc, handle.clone())) as Box<dyn Ability>
        })
    }

    /// Scripted activated for `user`, ready for `add_ability`.
    pub fn live(&self, desc: &Rc<AbilityDescription>, user: UserRef) -> Scripted {
        let mut script = Scripted::new(Rc::clone(desc), self.clone());
        script.user = Some(user);
        script
    }

    pub fn activations(&self) -> u32 {
        self.state.activations.get()
    }

    pub fn updates(&self) -> u32 {
        self.state.updates.get()
    }

    pub fn destroys(&self) -> u32 {
        self.state.destroys.get()
    }

    pub fn collisions(&self) -> u32 {
        self.state.collisions.get()
    }

    pub fn recalculations(&self) -> u32 {
        self.state.recalculations.get()
    }

    /// Collisions seen by these scripts, in callback order.
    pub fn seen(&self) -> Vec<Collision> {
        self.state.seen.borrow().clone()
    }

    pub fn set_mode(&self, mode: ScriptMode) {
        self.state.mode.set(Some(mode));
    }

    pub fn refuse_activation(&self, refuse: bool) {
        self.state.refuse_activation.set(refuse);
    }

    pub fn refuse_owner(&self, refuse: bool) {
        self.state.refuse_owner.set(refuse);
    }

    pub fn panic_on_destroy(&self, panic: bool) {
        self.state.panic_on_destroy.set(panic);
    }

    pub fn panic_on_colliders(&self, panic: bool) {
        self.state.panic_on_colliders.set(panic);
    }

    pub fn panic_on_owner(&self, panic: bool) {
        self.state.panic_on_owner.set(panic);
    }

    pub fn respond(&self, response: CollisionResponse) {
        self.state.response.set(Some(response));
    }
}

/// Scriptable ability.
pub struct Scripted {
    desc: Rc<AbilityDescription>,
    user: Option<UserRef>,
    handle: ScriptHandle,
    colliders: Vec<Collider>,
    policy: Option<Policies>,
    spawn: Option<Rc<AbilityDescription>>,
}

impl Scripted {
    pub fn new(desc: Rc<AbilityDescription>, handle: ScriptHandle) -> Self {
        Self {
            desc,
            user: None,
            handle,
            colliders: Vec::new(),
            policy: None,
            spawn: None,
        }
    }

    pub fn with_collider(mut self, collider: impl Into<Collider>) -> Self {
        self.colliders.push(collider.into());
        self
    }

    pub fn with_policy(mut self, policy: Policies) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Spawn one instance of `kind` on the first update.
    pub fn spawning(mut self, kind: Rc<AbilityDescription>) -> Self {
        self.spawn = Some(kind);
        self
    }

    pub fn boxed(self) -> Box<dyn Ability> {
        Box::new(self)
    }
}

impl Ability for Scripted {
    fn description(&self) -> &Rc<AbilityDescription> {
        &self.desc
    }

    fn user(&self) -> Option<&UserRef> {
        self.user.as_ref()
    }

    fn activate(&mut self, user: UserRef, _method: Activation) -> bool {
        let state = &self.handle.state;
        state.activations.set(state.activations.get() + 1);
        if state.refuse_activation.get() {
            return false;
        }
        self.user = Some(user);
        true
    }

    fn update(&mut self, ctx: &mut TickContext) -> Result<UpdateResult, AbilityError> {
        let state = &self.handle.state;
        state.updates.set(state.updates.get() + 1);

        let user = self.user.clone().ok_or(AbilityError::InvalidOwner)?;
        if let Some(policy) = &self.policy {
            if policy.test(&*user, &self.desc) {
                return Ok(UpdateResult::Remove);
            }
        }

        if let Some(kind) = self.spawn.take() {
            let mut child = AbilityDescription::instantiate(&kind);
            if child.activate(Rc::clone(&user), Activation::Attack) {
                ctx.spawn(user, child);
            }
        }

        match state.mode.get().unwrap_or(ScriptMode::Continue) {
            ScriptMode::Continue => Ok(UpdateResult::Continue),
            ScriptMode::Remove => Ok(UpdateResult::Remove),
            ScriptMode::Fail => Err(AbilityError::InvalidState("script failure".into())),
            ScriptMode::Panic => panic!("script panic"),
        }
    }

    fn on_destroy(&mut self) {
        let state = &self.handle.state;
        state.destroys.set(state.destroys.get() + 1);
        if state.panic_on_destroy.get() {
            panic!("script destroy panic");
        }
    }

    fn set_user(&mut self, user: UserRef) -> bool {
        if self.handle.state.panic_on_owner.get() {
            panic!("script owner panic");
        }
        if self.handle.state.refuse_owner.get() {
            return false;
        }
        self.user = Some(user);
        true
    }

    fn recalculate_config(&mut self) {
        let state = &self.handle.state;
        state.recalculations.set(state.recalculations.get() + 1);
    }

    fn colliders(&self) -> Vec<Collider> {
        if self.handle.state.panic_on_colliders.get() {
            panic!("script colliders panic");
        }
        self.colliders.clone()
    }

    fn on_collision(&mut self, collision: &Collision, _ctx: &mut TickContext) -> CollisionResponse {
        let state = &self.handle.state;
        state.collisions.set(state.collisions.get() + 1);
        state.seen.borrow_mut().push(collision.clone());
        state.response.get().unwrap_or_else(|| collision.proposal())
    }
}
