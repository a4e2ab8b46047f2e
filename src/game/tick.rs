//! World Tick
//!
//! A [`World`] pairs one lifecycle manager with one collision engine and
//! runs them in fixed order. The [`Engine`] owns every world plus the
//! shared registries and routes user input to the right world.
//!
//! ## Per-tick order
//!
//! 1. `manager.update()`: drain queue, update, reap
//! 2. `collisions.update()`: pairwise test and resolve
//! 3. Collect events

use std::collections::BTreeMap;
use std::rc::Rc;

use tracing::{debug, info};

use crate::core::clock::ClockRef;
use crate::game::ability::InstanceId;
use crate::game::activation::Activation;
use crate::game::collision::{CollisionEngine, CollisionRegistry};
use crate::game::config::EngineConfig;
use crate::game::description::AbilityRegistry;
use crate::game::events::EngineEvent;
use crate::game::manager::AbilityManager;
use crate::game::sequence::{SequenceMatcher, SequenceRegistry};
use crate::game::user::{UserId, UserRef, WorldId};

/// Result of a tick.
#[derive(Debug, Default)]
pub struct TickResult {
    /// Manager pass number
    pub tick: u64,
    /// Events generated this tick, sorted
    pub events: Vec<EngineEvent>,
    /// Instances removed by the update pass
    pub removed: usize,
    /// Collisions resolved
    pub collisions: usize,
}

/// One world's manager and collision engine.
#[derive(Debug)]
pub struct World {
    manager: AbilityManager,
    collisions: CollisionEngine,
}

impl World {
    /// Empty world.
    pub fn new(id: WorldId, abilities: Rc<AbilityRegistry>, collisions: Rc<CollisionRegistry>) -> Self {
        Self {
            manager: AbilityManager::new(id, abilities),
            collisions: CollisionEngine::new(collisions),
        }
    }

    /// World id.
    pub fn id(&self) -> WorldId {
        self.manager.world()
    }

    /// Instance table.
    pub fn manager(&self) -> &AbilityManager {
        &self.manager
    }

    /// Instance table, mutably.
    pub fn manager_mut(&mut self) -> &mut AbilityManager {
        &mut self.manager
    }

    /// Collision engine.
    pub fn collisions_mut(&mut self) -> &mut CollisionEngine {
        &mut self.collisions
    }

    /// Run one simulation tick.
    pub fn tick(&mut self) -> TickResult {
        let mut result = TickResult::default();

        // 1. Lifecycle pass
        result.removed = self.manager.update();

        // 2. Collision pass
        result.collisions = self.collisions.update(&mut self.manager);

        // Collect events
        result.tick = self.manager.tick();
        result.events = self.manager.take_events();
        result.events.sort();

        result
    }
}

/// Instances started by one user action.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ActionResult {
    /// Selected ability started by the action
    pub ability: Option<InstanceId>,
    /// Combo completed by the action
    pub sequence: Option<InstanceId>,
}

/// All worlds plus shared registries.
pub struct Engine {
    config: EngineConfig,
    abilities: Rc<AbilityRegistry>,
    collisions: Rc<CollisionRegistry>,
    sequences: SequenceMatcher,
    worlds: BTreeMap<WorldId, World>,
}

impl Engine {
    /// Create an engine with no worlds.
    pub fn new(
        config: EngineConfig,
        abilities: Rc<AbilityRegistry>,
        collisions: Rc<CollisionRegistry>,
        sequences: Rc<SequenceRegistry>,
        clock: ClockRef,
    ) -> Self {
        info!(
            abilities = abilities.len(),
            collisions = collisions.len(),
            sequences = sequences.len(),
            tick_rate = config.tick_rate,
            "engine ready"
        );
        Self {
            sequences: SequenceMatcher::new(sequences, clock, &config.sequence),
            config,
            abilities,
            collisions,
            worlds: BTreeMap::new(),
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Known kinds.
    pub fn abilities(&self) -> &Rc<AbilityRegistry> {
        &self.abilities
    }

    /// Existing world.
    pub fn world(&self, id: WorldId) -> Option<&World> {
        self.worlds.get(&id)
    }

    /// World by id, created on first use.
    pub fn world_mut(&mut self, id: WorldId) -> &mut World {
        let enabled = self.config.collision.enabled;
        self.worlds
            .entry(id)
            .or_insert_with(|| spawn_world(id, &self.abilities, &self.collisions, enabled))
    }

    /// Existing worlds in id order.
    pub fn worlds(&self) -> impl Iterator<Item = &World> {
        self.worlds.values()
    }

    /// Route a user action: record it as a sequence step, then try to start
    /// the selected ability with it.
    pub fn on_action(&mut self, user: &UserRef, method: Activation) -> ActionResult {
        let id = user.world();
        let enabled = self.config.collision.enabled;
        let world = self
            .worlds
            .entry(id)
            .or_insert_with(|| spawn_world(id, &self.abilities, &self.collisions, enabled));
        let manager = &mut world.manager;

        let sequence = self.sequences.register_step(user, method, manager);
        let ability = user
            .selected_ability()
            .and_then(|desc| manager.activate(user, method, &desc));

        ActionResult { ability, sequence }
    }

    /// Grant passives to a user who entered a world.
    pub fn on_join(&mut self, user: &UserRef) {
        self.world_mut(user.world()).manager_mut().create_passives(user);
    }

    /// Re-evaluate passives after the user's elements changed.
    pub fn on_elements_changed(&mut self, user: &UserRef) {
        self.world_mut(user.world()).manager_mut().create_passives(user);
    }

    /// Tear down everything a leaving user owns.
    pub fn on_leave(&mut self, user: UserId) -> usize {
        self.sequences.remove_user(user);
        self.worlds
            .values_mut()
            .map(|world| world.manager_mut().destroy_user_instances(user))
            .sum()
    }

    /// Move a user's instances out of `from`, then grant passives in the
    /// world they are in now.
    pub fn on_world_change(&mut self, user: &UserRef, from: WorldId) {
        if let Some(world) = self.worlds.get_mut(&from) {
            world.manager_mut().destroy_user_instances(user.id());
        }
        self.sequences.clear(user.id());
        self.on_join(user);
    }

    /// Tick every world in id order.
    pub fn tick(&mut self) -> Vec<(WorldId, TickResult)> {
        self.worlds
            .iter_mut()
            .map(|(id, world)| (*id, world.tick()))
            .collect()
    }

    /// Destroy every instance in every world.
    pub fn shutdown(&mut self) -> usize {
        let count = self
            .worlds
            .values_mut()
            .map(|world| world.manager_mut().destroy_all_instances())
            .sum();
        info!(destroyed = count, "engine shut down");
        count
    }
}

fn spawn_world(
    id: WorldId,
    abilities: &Rc<AbilityRegistry>,
    collisions: &Rc<CollisionRegistry>,
    enabled: bool,
) -> World {
    debug!(world = %id, "created world");
    let mut world = World::new(id, Rc::clone(abilities), Rc::clone(collisions));
    world.collisions.set_enabled(enabled);
    world
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("worlds", &self.worlds.len())
            .field("sequences", &self.sequences)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Sphere;
    use crate::game::events::{DestroyReason, EngineEventData};
    use crate::game::testing::{Fixture, ScriptHandle, ScriptMode};
    use crate::game::user::User;
    use glam::DVec3;

    fn destroyed(events: &[EngineEvent]) -> Vec<(InstanceId, DestroyReason)> {
        events
            .iter()
            .filter_map(|e| match &e.data {
                EngineEventData::AbilityDestroyed { instance, reason, .. } => Some((*instance, *reason)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_remove_and_collision_same_tick_destroys_once() {
        let fx = Fixture::new();
        let x = ScriptHandle::new();
        let y = ScriptHandle::new();
        let kind_x = x.describe("KindX").build().unwrap();
        let kind_y = y.describe("KindY").build().unwrap();
        let abilities = Rc::new(AbilityRegistry::from_descriptions([Rc::clone(&kind_x), Rc::clone(&kind_y)]).unwrap());
        let collisions = CollisionRegistry::builder(&abilities).pair("KindX", "KindY", true, true).build().unwrap();
        let mut world = World::new(WorldId(0), Rc::clone(&abilities), Rc::new(collisions));
        let alice: UserRef = fx.user(1);
        let bob: UserRef = fx.user(2);

        let ball = Sphere::new(DVec3::ZERO, 1.0);
        let a = world.manager_mut().add_ability(&alice, x.live(&kind_x, Rc::clone(&alice)).with_collider(ball).boxed()).unwrap();
        let b = world.manager_mut().add_ability(&bob, y.live(&kind_y, Rc::clone(&bob)).with_collider(ball).boxed()).unwrap();

        // X expires in the same tick it would have collided
        x.set_mode(ScriptMode::Remove);
        let result = world.tick();
        assert_eq!(result.removed, 1);
        assert_eq!(result.collisions, 0);
        assert_eq!(x.destroys(), 1);
        assert_eq!(destroyed(&result.events), vec![(a, DestroyReason::Expired)]);

        // Both flagged by collision: each destroyed once, never again
        let c = world.manager_mut().add_ability(&alice, x.live(&kind_x, Rc::clone(&alice)).with_collider(ball).boxed()).unwrap();
        x.set_mode(ScriptMode::Continue);
        let result = world.tick();
        assert_eq!(result.collisions, 1);
        assert_eq!(
            destroyed(&result.events),
            vec![(c, DestroyReason::Collision), (b, DestroyReason::Collision)]
        );

        let result = world.tick();
        assert!(destroyed(&result.events).is_empty());
        assert_eq!(x.destroys(), 2);
        assert_eq!(y.destroys(), 1);
        assert!(world.manager().is_empty());
    }

    #[test]
    fn test_collider_panic_stays_inside_tick() {
        let fx = Fixture::new();
        let x = ScriptHandle::new();
        let y = ScriptHandle::new();
        let kind_x = x.describe("KindX").build().unwrap();
        let kind_y = y.describe("KindY").build().unwrap();
        let abilities = Rc::new(AbilityRegistry::from_descriptions([Rc::clone(&kind_x), Rc::clone(&kind_y)]).unwrap());
        let collisions = CollisionRegistry::builder(&abilities).pair("KindX", "KindY", true, true).build().unwrap();
        let mut world = World::new(WorldId(0), Rc::clone(&abilities), Rc::new(collisions));
        let alice: UserRef = fx.user(1);
        let bob: UserRef = fx.user(2);

        let ball = Sphere::new(DVec3::ZERO, 1.0);
        let a = world.manager_mut().add_ability(&alice, x.live(&kind_x, Rc::clone(&alice)).with_collider(ball).boxed()).unwrap();
        let b = world.manager_mut().add_ability(&bob, y.live(&kind_y, Rc::clone(&bob)).with_collider(ball).boxed()).unwrap();
        world.tick();

        x.panic_on_colliders(true);
        let result = world.tick();
        assert_eq!(result.collisions, 0);
        assert_eq!(destroyed(&result.events), vec![(a, DestroyReason::Faulted)]);
        assert!(world.manager().contains(b));
        assert_eq!(y.collisions(), 0);

        // Later ticks run normally
        let result = world.tick();
        assert!(destroyed(&result.events).is_empty());
        assert_eq!(y.updates(), 3);
        assert_eq!(x.destroys(), 1);
    }

    fn engine(fx: &Fixture) -> (Engine, ScriptHandle, ScriptHandle, Rc<SequenceRegistry>) {
        let blast = ScriptHandle::new();
        let combo = ScriptHandle::new();
        let abilities = Rc::new(
            AbilityRegistry::from_descriptions([
                blast.describe("Blast").activation(Activation::Attack).build().unwrap(),
                blast.describe("Shield").activation(Activation::Sneak).build().unwrap(),
                combo.describe("Strike").activation(Activation::Sequence).build().unwrap(),
                combo.describe("Acrobat").activation(Activation::Passive).build().unwrap(),
            ])
            .unwrap(),
        );
        let sequences = Rc::new(
            SequenceRegistry::builder(&abilities)
                .sequence("Strike", [("Blast", Activation::Attack), ("Shield", Activation::Sneak)])
                .build()
                .unwrap(),
        );
        let collisions = Rc::new(CollisionRegistry::builder(&abilities).build().unwrap());
        let engine = Engine::new(
            EngineConfig::default(),
            abilities,
            collisions,
            Rc::clone(&sequences),
            fx.clock.handle(),
        );
        (engine, blast, combo, sequences)
    }

    #[test]
    fn test_engine_routes_actions() {
        let fx = Fixture::new();
        let (mut engine, blast, combo, _) = engine(&fx);
        let user = fx.user(1);
        user.bind(1, Rc::clone(engine.abilities().get("Blast").unwrap()));
        user.bind(2, Rc::clone(engine.abilities().get("Shield").unwrap()));
        let user_ref: UserRef = user.clone();

        let first = engine.on_action(&user_ref, Activation::Attack);
        assert!(first.ability.is_some());
        assert!(first.sequence.is_none());

        // Wrong trigger for Blast: ability refused, step still recorded
        let miss = engine.on_action(&user_ref, Activation::Sneak);
        assert_eq!(miss, ActionResult::default());

        user.select_slot(2);
        let done = engine.on_action(&user_ref, Activation::Sneak);
        assert!(done.ability.is_some());
        assert!(done.sequence.is_some());
        assert_eq!(blast.activations(), 2);
        assert_eq!(combo.activations(), 1);

        let results = engine.tick();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, WorldId(0));
        assert_eq!(engine.world(WorldId(0)).unwrap().manager().len(), 3);

        assert_eq!(engine.on_leave(user.id()), 3);
        assert_eq!(blast.destroys() + combo.destroys(), 3);
    }

    #[test]
    fn test_worlds_are_isolated() {
        let fx = Fixture::new();
        let (mut engine, _, combo, _) = engine(&fx);
        let alice = fx.user_in(1, WorldId(1));
        let bob = fx.user_in(2, WorldId(2));
        let alice_ref: UserRef = alice.clone();
        let bob_ref: UserRef = bob.clone();

        engine.on_join(&alice_ref);
        engine.on_join(&bob_ref);
        engine.tick();
        assert_eq!(combo.activations(), 2);
        assert_eq!(engine.world(WorldId(1)).unwrap().manager().len(), 1);
        assert_eq!(engine.world(WorldId(2)).unwrap().manager().len(), 1);

        // Alice walks into world 2
        alice.set_world(WorldId(2));
        engine.on_world_change(&alice_ref, WorldId(1));
        engine.tick();
        assert!(engine.world(WorldId(1)).unwrap().manager().is_empty());
        assert_eq!(engine.world(WorldId(2)).unwrap().manager().len(), 2);

        assert_eq!(engine.shutdown(), 2);
    }
}
