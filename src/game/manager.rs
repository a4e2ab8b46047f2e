//! Ability Lifecycle Manager
//!
//! One manager per world owns every live instance in that world.
//!
//! ## Lifecycle
//!
//! ```text
//! add_ability ──► queue ──(next update)──► live ──(Remove / fault / collision / destroy_*)──► on_destroy
//! ```
//!
//! - Queued instances become live at the start of the next `update`, so an
//!   instance spawned mid-tick is never updated in the tick that spawned it.
//! - Every live instance is updated at most once per `update`.
//! - Removing an entry moves it out of the table before `on_destroy` runs,
//!   which makes `on_destroy` fire exactly once per instance.
//! - Errors and panics from instance callbacks are caught, logged and
//!   turned into removal of that instance only.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use tracing::{debug, error, trace, warn};

use crate::core::collider::Collider;
use crate::game::ability::{Ability, InstanceId, TickContext, UpdatableRef, UpdateResult};
use crate::game::activation::Activation;
use crate::game::description::{AbilityDescription, AbilityRegistry};
use crate::game::events::{DestroyReason, EngineEvent};
use crate::game::user::{UserId, UserRef, WorldId};

/// Live or queued instance with its owner.
struct Entry {
    id: InstanceId,
    user: UserRef,
    instance: Box<dyn Ability>,
}

impl Entry {
    fn user_id(&self) -> UserId {
        self.user.id()
    }

    fn name(&self) -> &str {
        self.instance.description().name()
    }
}

/// Collision-relevant view of one live instance.
#[derive(Clone, Debug)]
pub struct InstanceSnapshot {
    /// Instance id
    pub id: InstanceId,
    /// Owner
    pub user: UserId,
    /// Kind
    pub kind: Rc<AbilityDescription>,
    /// Colliders for this tick
    pub colliders: Vec<Collider>,
}

/// Per-world instance table.
pub struct AbilityManager {
    world: WorldId,
    registry: Rc<AbilityRegistry>,
    instances: BTreeMap<UserId, Vec<Entry>>,
    owners: BTreeMap<InstanceId, UserId>,
    queue: Vec<Entry>,
    updatables: Vec<UpdatableRef>,
    next_id: u64,
    tick: u64,
    events: Vec<EngineEvent>,
}

impl AbilityManager {
    /// Create an empty manager for `world`.
    pub fn new(world: WorldId, registry: Rc<AbilityRegistry>) -> Self {
        Self {
            world,
            registry,
            instances: BTreeMap::new(),
            owners: BTreeMap::new(),
            queue: Vec::new(),
            updatables: Vec::new(),
            next_id: 1,
            tick: 0,
            events: Vec::new(),
        }
    }

    /// World this manager serves.
    pub fn world(&self) -> WorldId {
        self.world
    }

    /// Number of completed update passes.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Kinds known to this manager.
    pub fn registry(&self) -> &Rc<AbilityRegistry> {
        &self.registry
    }

    // =========================================================================
    // Adding
    // =========================================================================

    /// Queue an activated instance for `user`.
    ///
    /// Returns `None` (and drops the instance untouched) when the user is
    /// in another world.
    pub fn add_ability(&mut self, user: &UserRef, instance: Box<dyn Ability>) -> Option<InstanceId> {
        if user.world() != self.world {
            warn!(
                ability = %instance.description().name(),
                user = %user.id(),
                world = %self.world,
                "rejected instance for user in another world"
            );
            return None;
        }

        let id = InstanceId(self.next_id);
        self.next_id += 1;

        trace!(ability = %instance.description().name(), user = %user.id(), instance = %id, "queued");
        self.events.push(EngineEvent::ability_queued(
            self.tick,
            id,
            instance.description().name(),
            user.id(),
        ));
        self.queue.push(Entry {
            id,
            user: Rc::clone(user),
            instance,
        });
        Some(id)
    }

    /// Hand over a helper that is ticked after every instance until it
    /// reports `Remove`.
    pub fn add_updatable(&mut self, updatable: UpdatableRef) {
        self.updatables.push(updatable);
    }

    /// Activation controller: check trigger, permission and cooldown,
    /// then create, activate and queue a new instance.
    ///
    /// Rejection is a normal `None`.
    pub fn activate(
        &mut self,
        user: &UserRef,
        method: Activation,
        desc: &Rc<AbilityDescription>,
    ) -> Option<InstanceId> {
        if !desc.is_activated_by(method) || !user.can_bend(desc) {
            return None;
        }
        if !desc.bypass_cooldown() && user.on_cooldown(desc) {
            trace!(ability = %desc.name(), user = %user.id(), "on cooldown");
            return None;
        }
        if user.world() != self.world {
            return None;
        }

        let mut instance = AbilityDescription::instantiate(desc);
        let started = panic::catch_unwind(AssertUnwindSafe(|| {
            instance.activate(Rc::clone(user), method)
        }));
        match started {
            Ok(true) => self.add_ability(user, instance),
            Ok(false) => None,
            Err(payload) => {
                error!(
                    ability = %desc.name(),
                    user = %user.id(),
                    error = %panic_message(payload.as_ref()),
                    "ability panicked during activation"
                );
                None
            }
        }
    }

    /// Recreate every passive kind for `user`.
    ///
    /// Existing instances of each passive kind are destroyed first; a new
    /// one is started only if the user has the element, may bend the kind
    /// and the instance accepts `Activation::Passive`.
    pub fn create_passives(&mut self, user: &UserRef) {
        if user.world() != self.world {
            return;
        }

        let registry = Rc::clone(&self.registry);
        for passive in registry.all_passives() {
            self.destroy_instance_type(user.id(), passive);

            let element_ok = passive.elements().is_empty()
                || passive.elements().iter().any(|e| user.has_element(*e));
            if !element_ok || !user.can_bend(passive) {
                continue;
            }

            let mut instance = AbilityDescription::instantiate(passive);
            let started = panic::catch_unwind(AssertUnwindSafe(|| {
                instance.activate(Rc::clone(user), Activation::Passive)
            }));
            match started {
                Ok(true) => {
                    self.add_ability(user, instance);
                }
                Ok(false) => {}
                Err(payload) => {
                    error!(
                        ability = %passive.name(),
                        user = %user.id(),
                        error = %panic_message(payload.as_ref()),
                        "passive panicked during activation"
                    );
                }
            }
        }
    }

    /// Destroy every passive instance owned by `user`.
    pub fn clear_passives(&mut self, user: UserId) -> usize {
        self.destroy_user_instances_where(user, |a| a.description().is_passive())
    }

    // =========================================================================
    // Tick
    // =========================================================================

    /// Run one pass: drain the queue, update every live instance once and
    /// reap the ones that asked to be removed or faulted.
    ///
    /// Returns the number of instances removed.
    pub fn update(&mut self) -> usize {
        self.tick += 1;
        let tick = self.tick;

        for entry in std::mem::take(&mut self.queue) {
            let user = entry.user_id();
            self.events
                .push(EngineEvent::ability_started(tick, entry.id, entry.name(), user));
            self.owners.insert(entry.id, user);
            self.instances.entry(user).or_default().push(entry);
        }

        let mut ctx = TickContext::new(tick);
        let mut removed = 0;

        for entries in self.instances.values_mut() {
            let mut i = 0;
            while i < entries.len() {
                match run_update(&mut entries[i], &mut ctx, tick, &mut self.events) {
                    None => i += 1,
                    Some(reason) => {
                        let entry = entries.remove(i);
                        self.owners.remove(&entry.id);
                        destroy_entry(entry, reason, tick, &mut self.events);
                        removed += 1;
                    }
                }
            }
        }
        self.instances.retain(|_, entries| !entries.is_empty());

        let world = self.world;
        self.updatables.retain_mut(|updatable| {
            match panic::catch_unwind(AssertUnwindSafe(|| updatable.update())) {
                Ok(UpdateResult::Continue) => true,
                Ok(UpdateResult::Remove) => false,
                Err(payload) => {
                    error!(
                        world = %world,
                        error = %panic_message(payload.as_ref()),
                        "updatable panicked"
                    );
                    false
                }
            }
        });

        self.absorb(&mut ctx);
        removed
    }

    /// Queue everything spawned through `ctx`.
    pub(crate) fn absorb(&mut self, ctx: &mut TickContext) {
        for (user, instance) in ctx.take_spawned() {
            self.add_ability(&user, instance);
        }
    }

    // =========================================================================
    // Ownership
    // =========================================================================

    /// Move a live instance to `user`.
    ///
    /// No-op when `user` already owns it or is in another world. If the
    /// instance refuses the new owner it stays with the old one.
    pub fn change_owner(&mut self, id: InstanceId, user: &UserRef) -> bool {
        let Some(&old) = self.owners.get(&id) else {
            return false;
        };
        if old == user.id() || user.world() != self.world {
            return false;
        }
        let Some(entries) = self.instances.get_mut(&old) else {
            return false;
        };
        let Some(pos) = entries.iter().position(|e| e.id == id) else {
            return false;
        };

        let mut entry = entries.remove(pos);
        let accepted = panic::catch_unwind(AssertUnwindSafe(|| entry.instance.set_user(Rc::clone(user))));
        if let Ok(false) = accepted {
            debug!(ability = %entry.name(), instance = %id, "instance refused new owner");
            entries.insert(pos, entry);
            return false;
        }
        if entries.is_empty() {
            self.instances.remove(&old);
        }

        let reconfigured = accepted
            .and_then(|_| panic::catch_unwind(AssertUnwindSafe(|| entry.instance.recalculate_config())));
        if let Err(payload) = reconfigured {
            let message = panic_message(payload.as_ref());
            error!(
                ability = %entry.name(),
                user = %old,
                instance = %id,
                error = %message,
                "ability panicked during owner change"
            );
            self.owners.remove(&id);
            self.events
                .push(EngineEvent::ability_faulted(self.tick, id, entry.name(), old, message));
            destroy_entry(entry, DestroyReason::Faulted, self.tick, &mut self.events);
            return false;
        }

        entry.user = Rc::clone(user);
        self.events.push(EngineEvent::owner_changed(
            self.tick,
            id,
            entry.name(),
            old,
            user.id(),
        ));
        self.owners.insert(id, user.id());
        self.instances.entry(user.id()).or_default().push(entry);
        true
    }

    // =========================================================================
    // Destruction
    // =========================================================================

    /// Destroy one instance, live or queued.
    ///
    /// Returns false (and does nothing) if it is already gone.
    pub fn destroy_instance(&mut self, id: InstanceId) -> bool {
        self.remove_instance(id, DestroyReason::Requested)
    }

    pub(crate) fn remove_instance(&mut self, id: InstanceId, reason: DestroyReason) -> bool {
        if let Some(user) = self.owners.remove(&id) {
            if let Some(entries) = self.instances.get_mut(&user) {
                if let Some(pos) = entries.iter().position(|e| e.id == id) {
                    let entry = entries.remove(pos);
                    if entries.is_empty() {
                        self.instances.remove(&user);
                    }
                    destroy_entry(entry, reason, self.tick, &mut self.events);
                    return true;
                }
            }
            return false;
        }

        if let Some(pos) = self.queue.iter().position(|e| e.id == id) {
            let entry = self.queue.remove(pos);
            destroy_entry(entry, reason, self.tick, &mut self.events);
            return true;
        }
        false
    }

    /// Destroy the user's instances (live and queued) matching `predicate`.
    pub fn destroy_user_instances_where<F>(&mut self, user: UserId, predicate: F) -> usize
    where
        F: Fn(&dyn Ability) -> bool,
    {
        let mut doomed = Vec::new();

        if let Some(entries) = self.instances.get_mut(&user) {
            let (gone, kept): (Vec<_>, Vec<_>) = std::mem::take(entries)
                .into_iter()
                .partition(|e| predicate(e.instance.as_ref()));
            *entries = kept;
            if entries.is_empty() {
                self.instances.remove(&user);
            }
            doomed.extend(gone);
        }

        let (gone, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.queue)
            .into_iter()
            .partition(|e| e.user_id() == user && predicate(e.instance.as_ref()));
        self.queue = kept;
        doomed.extend(gone);

        let count = doomed.len();
        for entry in doomed {
            self.owners.remove(&entry.id);
            destroy_entry(entry, DestroyReason::Bulk, self.tick, &mut self.events);
        }
        count
    }

    /// Destroy the user's instances of exactly this kind.
    pub fn destroy_instance_type(&mut self, user: UserId, kind: &AbilityDescription) -> usize {
        self.destroy_user_instances_where(user, |a| **a.description() == *kind)
    }

    /// Destroy everything the user owns.
    pub fn destroy_user_instances(&mut self, user: UserId) -> usize {
        self.destroy_user_instances_where(user, |_| true)
    }

    /// Destroy every instance in the world, queued ones included.
    pub fn destroy_all_instances(&mut self) -> usize {
        let mut doomed: Vec<Entry> = std::mem::take(&mut self.instances)
            .into_values()
            .flatten()
            .collect();
        doomed.append(&mut self.queue);
        self.owners.clear();
        self.updatables.clear();

        let count = doomed.len();
        for entry in doomed {
            destroy_entry(entry, DestroyReason::Bulk, self.tick, &mut self.events);
        }
        if count > 0 {
            debug!(world = %self.world, count, "destroyed all instances");
        }
        count
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Number of live instances.
    pub fn len(&self) -> usize {
        self.owners.len()
    }

    /// Check if no instance is live.
    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    /// Number of queued instances.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Check if the instance is live.
    pub fn contains(&self, id: InstanceId) -> bool {
        self.owners.contains_key(&id)
    }

    /// Owner of a live instance.
    pub fn owner(&self, id: InstanceId) -> Option<UserId> {
        self.owners.get(&id).copied()
    }

    /// Check if the user has a live instance of this kind.
    pub fn has_ability(&self, user: UserId, kind: &AbilityDescription) -> bool {
        self.user_instances(user).any(|(_, a)| **a.description() == *kind)
    }

    /// Live instances of one user.
    pub fn user_instances(&self, user: UserId) -> impl Iterator<Item = (InstanceId, &dyn Ability)> {
        self.instances
            .get(&user)
            .into_iter()
            .flatten()
            .map(|e| (e.id, e.instance.as_ref()))
    }

    /// All live instances, ordered by user then insertion.
    pub fn instances(&self) -> impl Iterator<Item = (InstanceId, UserId, &dyn Ability)> {
        self.instances
            .iter()
            .flat_map(|(user, entries)| entries.iter().map(move |e| (e.id, *user, e.instance.as_ref())))
    }

    /// Look up a live instance.
    pub fn instance(&self, id: InstanceId) -> Option<&dyn Ability> {
        self.find(id).map(|e| e.instance.as_ref())
    }

    /// Look up a live instance mutably.
    pub fn instance_mut(&mut self, id: InstanceId) -> Option<&mut (dyn Ability + 'static)> {
        let user = self.owners.get(&id)?;
        self.instances
            .get_mut(user)?
            .iter_mut()
            .find(|e| e.id == id)
            .map(|e| e.instance.as_mut())
    }

    fn find(&self, id: InstanceId) -> Option<&Entry> {
        let user = self.owners.get(&id)?;
        self.instances.get(user)?.iter().find(|e| e.id == id)
    }

    /// Number of helpers still ticking.
    pub fn updatables(&self) -> usize {
        self.updatables.len()
    }

    /// Live instances with at least one collider, in instance-id order.
    ///
    /// An instance whose `colliders` panics is left out and destroyed as
    /// faulted.
    pub fn collision_snapshot(&mut self) -> Vec<InstanceSnapshot> {
        let mut snapshot = Vec::new();
        let mut faulted = Vec::new();

        for e in self.instances.values().flatten() {
            match panic::catch_unwind(AssertUnwindSafe(|| e.instance.colliders())) {
                Ok(colliders) if colliders.is_empty() => {}
                Ok(colliders) => snapshot.push(InstanceSnapshot {
                    id: e.id,
                    user: e.user_id(),
                    kind: Rc::clone(e.instance.description()),
                    colliders,
                }),
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    error!(
                        ability = %e.name(),
                        user = %e.user_id(),
                        instance = %e.id,
                        error = %message,
                        "ability panicked while reporting colliders"
                    );
                    faulted.push((e.id, e.name().to_owned(), e.user_id(), message));
                }
            }
        }

        for (id, name, user, message) in faulted {
            self.events
                .push(EngineEvent::ability_faulted(self.tick, id, &name, user, message));
            self.remove_instance(id, DestroyReason::Faulted);
        }

        snapshot.sort_by_key(|s| s.id);
        snapshot
    }

    // =========================================================================
    // Events
    // =========================================================================

    pub(crate) fn push_event(&mut self, event: EngineEvent) {
        self.events.push(event);
    }

    /// Drain buffered events.
    pub fn take_events(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.events)
    }
}

impl fmt::Debug for AbilityManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AbilityManager")
            .field("world", &self.world)
            .field("tick", &self.tick)
            .field("live", &self.owners.len())
            .field("pending", &self.queue.len())
            .field("updatables", &self.updatables.len())
            .finish()
    }
}

/// Update one entry. Returns the removal reason, if any.
fn run_update(
    entry: &mut Entry,
    ctx: &mut TickContext,
    tick: u64,
    events: &mut Vec<EngineEvent>,
) -> Option<DestroyReason> {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| entry.instance.update(ctx)));
    let message = match outcome {
        Ok(Ok(UpdateResult::Continue)) => return None,
        Ok(Ok(UpdateResult::Remove)) => return Some(DestroyReason::Expired),
        Ok(Err(err)) => err.to_string(),
        Err(payload) => panic_message(payload.as_ref()),
    };

    error!(
        ability = %entry.name(),
        user = %entry.user_id(),
        instance = %entry.id,
        error = %message,
        "ability faulted during update"
    );
    events.push(EngineEvent::ability_faulted(
        tick,
        entry.id,
        entry.name(),
        entry.user_id(),
        message,
    ));
    Some(DestroyReason::Faulted)
}

/// Consume an entry and run its cleanup.
fn destroy_entry(mut entry: Entry, reason: DestroyReason, tick: u64, events: &mut Vec<EngineEvent>) {
    let cleaned = panic::catch_unwind(AssertUnwindSafe(|| entry.instance.on_destroy()));
    if let Err(payload) = cleaned {
        error!(
            ability = %entry.name(),
            user = %entry.user_id(),
            instance = %entry.id,
            error = %panic_message(payload.as_ref()),
            "ability panicked during destroy"
        );
    }

    #[cfg(feature = "debug-tracing")]
    trace!(ability = %entry.name(), instance = %entry.id, ?reason, "destroyed");

    events.push(EngineEvent::ability_destroyed(
        tick,
        entry.id,
        entry.name(),
        entry.user_id(),
        reason,
    ));
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}
