//! Collision Resolution
//!
//! Pairwise collisions between ability instances, driven by a declarative
//! [`CollisionRegistry`] of (kind, kind, remove, remove) entries.
//!
//! ## Resolution order
//!
//! Pairs are visited in registry order (sorted by lowercase kind names),
//! and instances within a pair in instance-id order. For each hit the
//! first instance's `on_collision` sees the registered proposal and the
//! second sees the proposal as left by the first. The outcome therefore
//! depends on that order; it is fixed, so results are reproducible.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use tracing::{debug, error, warn};

use crate::core::collider::Collider;
use crate::game::ability::{Collision, CollisionResponse, InstanceId, TickContext};
use crate::game::description::{AbilityDescription, AbilityRegistry};
use crate::game::error::RegistryError;
use crate::game::events::{DestroyReason, EngineEvent};
use crate::game::manager::{AbilityManager, InstanceSnapshot};

// =============================================================================
// REGISTRY
// =============================================================================

/// Declared collision between two kinds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CollisionPair {
    /// First kind
    pub first: Rc<AbilityDescription>,
    /// Second kind
    pub second: Rc<AbilityDescription>,
    /// Default: remove the first kind's instance
    pub remove_first: bool,
    /// Default: remove the second kind's instance
    pub remove_second: bool,
}

impl CollisionPair {
    /// Same registration seen from the other side.
    pub fn flipped(&self) -> Self {
        Self {
            first: Rc::clone(&self.second),
            second: Rc::clone(&self.first),
            remove_first: self.remove_second,
            remove_second: self.remove_first,
        }
    }
}

/// Symmetric lookup table of collision pairs.
#[derive(Debug, Default)]
pub struct CollisionRegistry {
    pairs: BTreeMap<(String, String), CollisionPair>,
}

impl CollisionRegistry {
    /// Start building against the known kinds.
    pub fn builder(abilities: &AbilityRegistry) -> CollisionRegistryBuilder<'_> {
        CollisionRegistryBuilder {
            abilities,
            layers: Vec::new(),
            pairs: Vec::new(),
        }
    }

    /// Registration for (a, b), oriented to the argument order.
    pub fn get(&self, a: &AbilityDescription, b: &AbilityDescription) -> Option<CollisionPair> {
        let (key, flip) = pair_key(a.key(), b.key());
        self.pairs
            .get(&key)
            .map(|pair| if flip { pair.flipped() } else { pair.clone() })
    }

    /// Check if (a, b) is registered in either order.
    pub fn contains(&self, a: &AbilityDescription, b: &AbilityDescription) -> bool {
        self.pairs.contains_key(&pair_key(a.key(), b.key()).0)
    }

    /// All pairs, in resolution order.
    pub fn iter(&self) -> impl Iterator<Item = &CollisionPair> {
        self.pairs.values()
    }

    /// Number of pairs.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    fn insert(&mut self, pair: CollisionPair) {
        let (key, flip) = pair_key(pair.first.key(), pair.second.key());
        let pair = if flip { pair.flipped() } else { pair };
        self.pairs.insert(key, pair);
    }
}

/// Sorted key plus whether the arguments were reversed to get it.
fn pair_key(a: &str, b: &str) -> ((String, String), bool) {
    if a <= b {
        ((a.to_owned(), b.to_owned()), false)
    } else {
        ((b.to_owned(), a.to_owned()), true)
    }
}

/// Builder for [`CollisionRegistry`].
///
/// Layers are listed lowest first. Kinds in the same layer remove each
/// other; a kind in a higher layer removes every kind below it and
/// survives. Explicit pairs override anything a layer produced.
pub struct CollisionRegistryBuilder<'a> {
    abilities: &'a AbilityRegistry,
    layers: Vec<Vec<String>>,
    pairs: Vec<(String, String, bool, bool)>,
}

impl<'a> CollisionRegistryBuilder<'a> {
    /// Add the next (higher) layer.
    pub fn layer<I, S>(mut self, kinds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.layers.push(kinds.into_iter().map(Into::into).collect());
        self
    }

    /// Add an explicit pair.
    pub fn pair(mut self, first: &str, second: &str, remove_first: bool, remove_second: bool) -> Self {
        self.pairs
            .push((first.to_owned(), second.to_owned(), remove_first, remove_second));
        self
    }

    /// Register every (first, second) combination of two groups with the
    /// same flags.
    pub fn pairs<I, J, S, T>(mut self, firsts: I, seconds: J, remove_first: bool, remove_second: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        J: IntoIterator<Item = T>,
        S: Into<String>,
        T: Into<String>,
    {
        let seconds: Vec<String> = seconds.into_iter().map(Into::into).collect();
        for first in firsts {
            let first = first.into();
            for second in &seconds {
                self.pairs
                    .push((first.clone(), second.clone(), remove_first, remove_second));
            }
        }
        self
    }

    /// Resolve every name and expand layers.
    pub fn build(self) -> Result<CollisionRegistry, RegistryError> {
        let mut layers = Vec::with_capacity(self.layers.len());
        for layer in &self.layers {
            let kinds = layer
                .iter()
                .map(|name| self.resolve(name))
                .collect::<Result<Vec<_>, _>>()?;
            layers.push(kinds);
        }

        let mut registry = CollisionRegistry::default();
        for (level, layer) in layers.iter().enumerate() {
            for (i, a) in layer.iter().enumerate() {
                for b in &layer[i..] {
                    registry.insert(pair(a, b, true, true));
                }
            }
            for lower in &layers[..level] {
                for low in lower {
                    for high in layer {
                        registry.insert(pair(low, high, true, false));
                    }
                }
            }
        }

        for (first, second, remove_first, remove_second) in &self.pairs {
            let first = self.resolve(first)?;
            let second = self.resolve(second)?;
            registry.insert(pair(&first, &second, *remove_first, *remove_second));
        }

        debug!(pairs = registry.len(), "built collision registry");
        Ok(registry)
    }

    fn resolve(&self, name: &str) -> Result<Rc<AbilityDescription>, RegistryError> {
        self.abilities.require(name).map(Rc::clone).map_err(|err| {
            warn!(ability = %name, "collision registration references unknown ability");
            err
        })
    }
}

fn pair(
    first: &Rc<AbilityDescription>,
    second: &Rc<AbilityDescription>,
    remove_first: bool,
    remove_second: bool,
) -> CollisionPair {
    CollisionPair {
        first: Rc::clone(first),
        second: Rc::clone(second),
        remove_first,
        remove_second,
    }
}

// =============================================================================
// ENGINE
// =============================================================================

/// First intersecting collider pair in the cartesian product, if any.
pub fn first_hit(a: &[Collider], b: &[Collider]) -> Option<(Collider, Collider)> {
    a.iter()
        .flat_map(|ca| b.iter().map(move |cb| (ca, cb)))
        .find(|(ca, cb)| ca.intersects(cb))
        .map(|(ca, cb)| (*ca, *cb))
}

/// Per-world collision pass.
pub struct CollisionEngine {
    registry: Rc<CollisionRegistry>,
    enabled: bool,
}

impl CollisionEngine {
    /// Engine over `registry`.
    pub fn new(registry: Rc<CollisionRegistry>) -> Self {
        Self {
            registry,
            enabled: true,
        }
    }

    /// Turn the pass on or off.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Check if the pass runs.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Registered pairs.
    pub fn registry(&self) -> &Rc<CollisionRegistry> {
        &self.registry
    }

    /// Test every registered pair among the live instances and destroy
    /// whatever ends up flagged.
    ///
    /// Returns the number of collisions resolved.
    pub fn update(&mut self, manager: &mut AbilityManager) -> usize {
        if !self.enabled || self.registry.is_empty() {
            return 0;
        }
        let snapshot = manager.collision_snapshot();
        if snapshot.len() < 2 {
            return 0;
        }

        let mut by_kind: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        let mut destroyed: BTreeSet<InstanceId> = BTreeSet::new();
        let mut ctx = TickContext::new(manager.tick());
        let mut resolved = 0;

        for pair in self.registry.iter() {
            let firsts = instances_of(&mut by_kind, &snapshot, &pair.first);
            if firsts.is_empty() {
                continue;
            }
            let seconds = instances_of(&mut by_kind, &snapshot, &pair.second);
            let same_kind = pair.first == pair.second;

            for &i in &firsts {
                for &j in &seconds {
                    if same_kind && j <= i {
                        continue;
                    }
                    let (a, b) = (&snapshot[i], &snapshot[j]);
                    if a.user == b.user || destroyed.contains(&a.id) || destroyed.contains(&b.id) {
                        continue;
                    }
                    let Some((ca, cb)) = first_hit(&a.colliders, &b.colliders) else {
                        continue;
                    };

                    let (remove_a, remove_b) = negotiate(manager, pair, (a, ca), (b, cb), &mut ctx);
                    resolved += 1;

                    manager.push_event(EngineEvent::collision_resolved(
                        manager.tick(),
                        (a.id, a.kind.name(), remove_a),
                        (b.id, b.kind.name(), remove_b),
                    ));
                    if remove_a && manager.remove_instance(a.id, DestroyReason::Collision) {
                        destroyed.insert(a.id);
                    }
                    if remove_b && manager.remove_instance(b.id, DestroyReason::Collision) {
                        destroyed.insert(b.id);
                    }
                }
            }
        }

        manager.absorb(&mut ctx);
        resolved
    }
}

impl fmt::Debug for CollisionEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollisionEngine")
            .field("pairs", &self.registry.len())
            .field("enabled", &self.enabled)
            .finish()
    }
}

/// Snapshot indices of one kind, computed once per pass.
fn instances_of<'k>(
    cache: &mut BTreeMap<&'k str, Vec<usize>>,
    snapshot: &[InstanceSnapshot],
    kind: &'k AbilityDescription,
) -> Vec<usize> {
    cache
        .entry(kind.key())
        .or_insert_with(|| {
            snapshot
                .iter()
                .enumerate()
                .filter(|(_, s)| *s.kind == *kind)
                .map(|(i, _)| i)
                .collect()
        })
        .clone()
}

/// Run both callbacks and return the final (remove_a, remove_b).
fn negotiate(
    manager: &mut AbilityManager,
    pair: &CollisionPair,
    (a, ca): (&InstanceSnapshot, Collider),
    (b, cb): (&InstanceSnapshot, Collider),
    ctx: &mut TickContext,
) -> (bool, bool) {
    let first = Collision {
        instance: a.id,
        collider: ca,
        other_instance: b.id,
        other_kind: Rc::clone(&b.kind),
        other_user: b.user,
        other_collider: cb,
        remove_self: pair.remove_first,
        remove_other: pair.remove_second,
    };
    let r1 = notify(manager, &first, ctx);

    let second = Collision {
        instance: b.id,
        collider: cb,
        other_instance: a.id,
        other_kind: Rc::clone(&a.kind),
        other_user: a.user,
        other_collider: ca,
        remove_self: r1.remove_other,
        remove_other: r1.remove_self,
    };
    let r2 = notify(manager, &second, ctx);

    (r2.remove_other, r2.remove_self)
}

/// Deliver one callback. A panic keeps the proposal unchanged.
fn notify(manager: &mut AbilityManager, collision: &Collision, ctx: &mut TickContext) -> CollisionResponse {
    let Some(instance) = manager.instance_mut(collision.instance) else {
        return collision.proposal();
    };
    let name = instance.description().name().to_owned();
    match panic::catch_unwind(AssertUnwindSafe(|| instance.on_collision(collision, ctx))) {
        Ok(response) => response,
        Err(_) => {
            error!(
                ability = %name,
                instance = %collision.instance,
                other = %collision.other_kind.name(),
                "ability panicked during collision"
            );
            collision.proposal()
        }
    }
}
