//! Bending Engine Demo
//!
//! Two benders trade projectiles across a field in one world. One of them
//! throws up a shield, then lands a three-step combo. Every resolved
//! collision and triggered combo is logged.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use glam::DVec3;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use bending::{
    core::{Collider, ManualClock, Sphere},
    game::{
        policy::{Expire, NotSneaking, OutOfRange},
        Ability, AbilityDescription, AbilityError, AbilityRegistry, Activation, Element, Engine,
        EngineConfig, EngineEventData, Policies, RegistrySpec, RemovalPolicy, SimpleUser,
        TickContext, UpdateResult, UserId, UserRef, WorldId,
    },
    ClockRef, VERSION,
};

const DEMO_TICKS: u64 = 300;

const REGISTRY: &str = r#"{
    "layers": [["AirBlast", "FireBlast"]],
    "collisions": [
        { "first": "EarthShield", "second": "FireBlast", "remove_second": true },
        { "first": "EarthShield", "second": "AirBlast", "remove_second": true },
        { "first": "EarthShield", "second": "FireComet", "remove_first": true }
    ],
    "sequences": [
        {
            "ability": "FireComet",
            "steps": [
                { "ability": "FireBlast", "action": "attack" },
                { "ability": "EarthShield", "action": "sneak" },
                { "ability": "EarthShield", "action": "sneak_release" }
            ]
        }
    ]
}"#;

fn main() -> Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber).context("failed to set tracing subscriber")?;

    info!("Bending Engine v{}", VERSION);

    let config = EngineConfig::from_env()?;
    info!("Tick Rate: {} Hz", config.tick_rate);

    demo(config)
}

// =============================================================================
// DEMO ABILITIES
// =============================================================================

#[derive(Clone, Copy, Debug)]
struct ProjectileStats {
    speed: f64,
    radius: f64,
    range: f64,
    lifetime: Duration,
    cooldown: Duration,
}

/// Straight-line projectile launched from the eye.
struct Projectile {
    desc: Rc<AbilityDescription>,
    stats: ProjectileStats,
    clock: ClockRef,
    user: Option<UserRef>,
    direction: DVec3,
    position: Rc<Cell<DVec3>>,
    policy: Option<Policies>,
}

impl Projectile {
    fn new(desc: Rc<AbilityDescription>, stats: ProjectileStats, clock: ClockRef) -> Self {
        Self {
            desc,
            stats,
            clock,
            user: None,
            direction: DVec3::X,
            position: Rc::new(Cell::new(DVec3::ZERO)),
            policy: None,
        }
    }
}

impl Ability for Projectile {
    fn description(&self) -> &Rc<AbilityDescription> {
        &self.desc
    }

    fn user(&self) -> Option<&UserRef> {
        self.user.as_ref()
    }

    fn activate(&mut self, user: UserRef, _method: Activation) -> bool {
        let origin = user.location();
        self.position.set(origin);
        self.direction = user.direction();
        self.policy = Some(
            Policies::builder()
                .add(OutOfRange::tracking(self.stats.range, origin, Rc::clone(&self.position)))
                .add(Expire::after(self.stats.lifetime, Rc::clone(&self.clock)))
                .build(),
        );
        user.add_cooldown(&self.desc, self.stats.cooldown);
        self.user = Some(user);
        true
    }

    fn update(&mut self, _ctx: &mut TickContext) -> Result<UpdateResult, AbilityError> {
        let user = self.user.as_ref().ok_or(AbilityError::InvalidOwner)?;
        let policy = self
            .policy
            .as_ref()
            .ok_or_else(|| AbilityError::InvalidState("not activated".into()))?;
        if policy.test(&**user, &self.desc) {
            return Ok(UpdateResult::Remove);
        }
        self.position.set(self.position.get() + self.direction * self.stats.speed);
        Ok(UpdateResult::Continue)
    }

    fn set_user(&mut self, user: UserRef) -> bool {
        self.user = Some(user);
        true
    }

    fn colliders(&self) -> Vec<Collider> {
        vec![Sphere::new(self.position.get(), self.stats.radius).into()]
    }
}

/// Bubble around the user while sneaking.
struct Shield {
    desc: Rc<AbilityDescription>,
    user: Option<UserRef>,
    policy: Policies,
}

impl Shield {
    fn new(desc: Rc<AbilityDescription>) -> Self {
        Self {
            desc,
            user: None,
            policy: Policies::builder().add(NotSneaking).build(),
        }
    }
}

impl Ability for Shield {
    fn description(&self) -> &Rc<AbilityDescription> {
        &self.desc
    }

    fn user(&self) -> Option<&UserRef> {
        self.user.as_ref()
    }

    fn activate(&mut self, user: UserRef, _method: Activation) -> bool {
        if !user.is_sneaking() {
            return false;
        }
        self.user = Some(user);
        true
    }

    fn update(&mut self, _ctx: &mut TickContext) -> Result<UpdateResult, AbilityError> {
        let user = self.user.as_ref().ok_or(AbilityError::InvalidOwner)?;
        if self.policy.test(&**user, &self.desc) {
            return Ok(UpdateResult::Remove);
        }
        Ok(UpdateResult::Continue)
    }

    fn colliders(&self) -> Vec<Collider> {
        self.user
            .iter()
            .map(|user| Sphere::new(user.location(), 2.0).into())
            .collect()
    }
}

/// Always-on passive with no effect of its own.
struct Acrobatics {
    desc: Rc<AbilityDescription>,
    user: Option<UserRef>,
}

impl Ability for Acrobatics {
    fn description(&self) -> &Rc<AbilityDescription> {
        &self.desc
    }

    fn user(&self) -> Option<&UserRef> {
        self.user.as_ref()
    }

    fn activate(&mut self, user: UserRef, _method: Activation) -> bool {
        self.user = Some(user);
        true
    }

    fn update(&mut self, _ctx: &mut TickContext) -> Result<UpdateResult, AbilityError> {
        match &self.user {
            Some(user) if user.is_valid() => Ok(UpdateResult::Continue),
            _ => Ok(UpdateResult::Remove),
        }
    }
}

fn projectile(
    name: &str,
    element: Element,
    activation: Activation,
    stats: ProjectileStats,
    clock: &ClockRef,
) -> Result<Rc<AbilityDescription>> {
    let clock = Rc::clone(clock);
    let desc = AbilityDescription::builder(name, move |desc| {
        Box::new(Projectile::new(desc, stats, Rc::clone(&clock))) as Box<dyn Ability>
    })
    .activation(activation)
    .element(element)
    .build()?;
    Ok(desc)
}

fn abilities(clock: &ClockRef) -> Result<AbilityRegistry> {
    let blast = ProjectileStats {
        speed: 0.5,
        radius: 0.5,
        range: 20.0,
        lifetime: Duration::from_secs(3),
        cooldown: Duration::from_millis(500),
    };
    let comet = ProjectileStats {
        speed: 0.3,
        radius: 1.5,
        range: 30.0,
        lifetime: Duration::from_secs(6),
        cooldown: Duration::from_secs(5),
    };

    let shield = AbilityDescription::builder("EarthShield", |desc| {
        Box::new(Shield::new(desc)) as Box<dyn Ability>
    })
    .activation(Activation::Sneak)
    .element(Element::Earth)
    .build()?;

    let acrobatics = AbilityDescription::builder("Acrobatics", |desc| {
        Box::new(Acrobatics { desc, user: None }) as Box<dyn Ability>
    })
    .activation(Activation::Passive)
    .element(Element::Air)
    .hidden(true)
    .build()?;

    let registry = AbilityRegistry::from_descriptions([
        projectile("FireBlast", Element::Fire, Activation::Attack, blast, clock)?,
        projectile("AirBlast", Element::Air, Activation::Attack, blast, clock)?,
        projectile("FireComet", Element::Fire, Activation::Sequence, comet, clock)?,
        shield,
        acrobatics,
    ])?;
    Ok(registry)
}

// =============================================================================
// DEMO RUN
// =============================================================================

fn bender(
    n: u8,
    clock: &ClockRef,
    registry: &AbilityRegistry,
    location: DVec3,
    direction: DVec3,
    elements: &[Element],
    slots: &[&str],
) -> Result<Rc<SimpleUser>> {
    let user = Rc::new(SimpleUser::new(UserId::new([n; 16]), WorldId(0), Rc::clone(clock)));
    user.set_location(location);
    user.set_direction(direction);
    for element in elements {
        user.add_element(*element);
    }
    for (slot, name) in (1u8..).zip(slots) {
        if !user.bind(slot, Rc::clone(registry.require(name)?)) {
            bail!("{} cannot be bound", name);
        }
    }
    Ok(user)
}

fn demo(config: EngineConfig) -> Result<()> {
    info!("=== Starting Demo ===");

    let clock = ManualClock::new();
    let handle = clock.handle();
    let registry = Rc::new(abilities(&handle)?);
    let (collisions, sequences) = RegistrySpec::from_json(REGISTRY)?.resolve(&registry)?;
    let tick_interval = config.tick_interval();

    let mut engine = Engine::new(
        config,
        Rc::clone(&registry),
        Rc::new(collisions),
        Rc::new(sequences),
        Rc::clone(&handle),
    );

    // Ten blocks apart, facing each other
    let alice = bender(
        1,
        &handle,
        &registry,
        DVec3::ZERO,
        DVec3::X,
        &[Element::Fire, Element::Earth],
        &["FireBlast", "EarthShield"],
    )?;
    let bob = bender(
        2,
        &handle,
        &registry,
        DVec3::new(10.0, 0.0, 0.0),
        DVec3::NEG_X,
        &[Element::Air, Element::Earth],
        &["AirBlast", "EarthShield"],
    )?;
    let alice_ref: UserRef = alice.clone();
    let bob_ref: UserRef = bob.clone();

    engine.on_join(&alice_ref);
    engine.on_join(&bob_ref);

    let mut total_events = 0;
    let mut collisions_resolved = 0;

    info!("Running {} ticks...", DEMO_TICKS);

    for t in 0..DEMO_TICKS {
        match t {
            // Bob raises a shield for a while
            100 => {
                bob.select_slot(2);
                bob.set_sneaking(true);
                engine.on_action(&bob_ref, Activation::Sneak);
            }
            160 => {
                bob.set_sneaking(false);
                engine.on_action(&bob_ref, Activation::SneakRelease);
                bob.select_slot(1);
            }
            // Alice: blast, shield up, shield down
            201 => {
                alice.select_slot(2);
                alice.set_sneaking(true);
                engine.on_action(&alice_ref, Activation::Sneak);
            }
            202 => {
                alice.set_sneaking(false);
                let action = engine.on_action(&alice_ref, Activation::SneakRelease);
                if action.sequence.is_none() {
                    bail!("combo did not trigger");
                }
                alice.select_slot(1);
            }
            _ if t % 20 == 0 => {
                engine.on_action(&alice_ref, Activation::Attack);
                engine.on_action(&bob_ref, Activation::Attack);
            }
            _ => {}
        }

        for (world, result) in engine.tick() {
            total_events += result.events.len();
            collisions_resolved += result.collisions;

            for event in &result.events {
                match &event.data {
                    EngineEventData::CollisionResolved {
                        first_ability,
                        second_ability,
                        first_removed,
                        second_removed,
                        ..
                    } => {
                        info!(
                            "{} tick {}: {} (removed: {}) hit {} (removed: {})",
                            world, result.tick, first_ability, first_removed, second_ability, second_removed
                        );
                    }
                    EngineEventData::SequenceTriggered { user, ability, .. } => {
                        info!("{} tick {}: {} completed {}", world, result.tick, user, ability);
                    }
                    EngineEventData::AbilityFaulted { ability, message, .. } => {
                        info!("{} tick {}: {} faulted: {}", world, result.tick, ability, message);
                    }
                    _ => debug!(?event, "event"),
                }
            }
        }

        clock.advance(tick_interval);
    }

    // Print final results
    info!("=== Results ===");
    for world in engine.worlds() {
        info!("{}: {} live instances after {} ticks", world.id(), world.manager().len(), world.manager().tick());
    }
    info!("Collisions resolved: {}", collisions_resolved);
    info!("Total events: {}", total_events);
    info!("Destroyed on shutdown: {}", engine.shutdown());

    Ok(())
}
