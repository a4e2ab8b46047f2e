//! Input Sequences
//!
//! A sequence is an ordered list of (selected kind, action) steps that,
//! once seen in a user's recent input, activates a synthetic kind.
//!
//! Each user has a bounded step buffer that is cleared after a period of
//! inactivity. A sequence matches when its steps appear in the buffer in
//! order, not necessarily back to back, with its last step being the
//! newest input. A successful activation consumes the buffer.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use tracing::{debug, trace};

use crate::core::clock::ClockRef;
use crate::game::ability::InstanceId;
use crate::game::activation::Activation;
use crate::game::config::SequenceConfig;
use crate::game::description::{AbilityDescription, AbilityRegistry};
use crate::game::error::RegistryError;
use crate::game::events::EngineEvent;
use crate::game::manager::AbilityManager;
use crate::game::user::{UserId, UserRef};

/// Longest sequence that can be registered.
pub const MAX_SEQUENCE_STEPS: usize = 16;

/// One (kind, action) step.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SequenceStep {
    /// Kind selected when the action happened
    pub ability: Rc<AbilityDescription>,
    /// Action performed
    pub action: Activation,
}

impl SequenceStep {
    /// Create a step.
    pub fn new(ability: Rc<AbilityDescription>, action: Activation) -> Self {
        Self { ability, action }
    }
}

impl fmt::Display for SequenceStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.ability.name(), self.action)
    }
}

/// Registered combo.
#[derive(Clone, Debug)]
pub struct Sequence {
    ability: Rc<AbilityDescription>,
    steps: Vec<SequenceStep>,
}

impl Sequence {
    /// Kind activated on match.
    pub fn ability(&self) -> &Rc<AbilityDescription> {
        &self.ability
    }

    /// Steps in order.
    pub fn steps(&self) -> &[SequenceStep] {
        &self.steps
    }

    /// Human-readable instructions, e.g. `Blast (attack) > Shield (sneak)`.
    pub fn instructions(&self) -> String {
        self.steps
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" > ")
    }

    /// In-order match against `buffer` that ends at its newest step.
    fn matches(&self, buffer: &VecDeque<SequenceStep>) -> bool {
        let Some(newest) = buffer.back() else {
            return false;
        };
        let Some((last, rest)) = self.steps.split_last() else {
            return false;
        };
        if last != newest {
            return false;
        }

        let mut wanted = rest.iter().rev().peekable();
        for step in buffer.iter().rev().skip(1) {
            match wanted.peek() {
                Some(w) if *w == step => {
                    wanted.next();
                }
                Some(_) => {}
                None => break,
            }
        }
        wanted.peek().is_none()
    }
}

/// All combos, keyed by the synthetic kind's lowercase name.
#[derive(Debug, Default)]
pub struct SequenceRegistry {
    sequences: BTreeMap<String, Sequence>,
}

impl SequenceRegistry {
    /// Start building against the known kinds.
    pub fn builder(abilities: &AbilityRegistry) -> SequenceRegistryBuilder<'_> {
        SequenceRegistryBuilder {
            abilities,
            pending: Vec::new(),
        }
    }

    /// Combo for a synthetic kind.
    pub fn get(&self, ability: &AbilityDescription) -> Option<&Sequence> {
        self.sequences.get(ability.key())
    }

    /// All combos in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Sequence> {
        self.sequences.values()
    }

    /// Number of combos.
    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }
}

/// Builder for [`SequenceRegistry`].
pub struct SequenceRegistryBuilder<'a> {
    abilities: &'a AbilityRegistry,
    pending: Vec<(String, Vec<(String, Activation)>)>,
}

impl<'a> SequenceRegistryBuilder<'a> {
    /// Register `ability` as triggered by `steps`.
    pub fn sequence<I, S>(mut self, ability: &str, steps: I) -> Self
    where
        I: IntoIterator<Item = (S, Activation)>,
        S: Into<String>,
    {
        let steps = steps.into_iter().map(|(name, action)| (name.into(), action)).collect();
        self.pending.push((ability.to_owned(), steps));
        self
    }

    /// Resolve and validate every combo.
    pub fn build(self) -> Result<SequenceRegistry, RegistryError> {
        let mut registry = SequenceRegistry::default();

        for (name, raw_steps) in self.pending {
            let ability = Rc::clone(self.abilities.require(&name)?);
            if !ability.is_activated_by(Activation::Sequence) {
                return Err(RegistryError::NotSequenceActivated(ability.name().to_owned()));
            }
            if raw_steps.is_empty() || raw_steps.len() > MAX_SEQUENCE_STEPS {
                return Err(RegistryError::SequenceLength {
                    name: ability.name().to_owned(),
                    len: raw_steps.len(),
                    max: MAX_SEQUENCE_STEPS,
                });
            }
            if registry.sequences.contains_key(ability.key()) {
                return Err(RegistryError::DuplicateSequence(ability.name().to_owned()));
            }

            let steps = raw_steps
                .iter()
                .map(|(step, action)| {
                    self.abilities
                        .require(step)
                        .map(|desc| SequenceStep::new(Rc::clone(desc), *action))
                })
                .collect::<Result<Vec<_>, _>>()?;

            let sequence = Sequence { ability, steps };
            debug!(ability = %sequence.ability.name(), steps = %sequence.instructions(), "registered sequence");
            registry
                .sequences
                .insert(sequence.ability.key().to_owned(), sequence);
        }

        Ok(registry)
    }
}

// =============================================================================
// MATCHER
// =============================================================================

#[derive(Default)]
struct StepBuffer {
    steps: VecDeque<SequenceStep>,
    last_step: Duration,
}

/// Per-user step buffers matched against a [`SequenceRegistry`].
pub struct SequenceMatcher {
    registry: Rc<SequenceRegistry>,
    clock: ClockRef,
    max_steps: usize,
    expiry: Duration,
    buffers: BTreeMap<UserId, StepBuffer>,
}

impl SequenceMatcher {
    /// Matcher over `registry` with buffer limits from `config`.
    pub fn new(registry: Rc<SequenceRegistry>, clock: ClockRef, config: &SequenceConfig) -> Self {
        Self {
            registry,
            clock,
            max_steps: config.max_steps.clamp(1, MAX_SEQUENCE_STEPS),
            expiry: config.expiry(),
            buffers: BTreeMap::new(),
        }
    }

    /// Registered combos.
    pub fn registry(&self) -> &Rc<SequenceRegistry> {
        &self.registry
    }

    /// Record `action` against the user's selected kind and try every combo.
    ///
    /// No-op when nothing is selected. On a match whose activation
    /// succeeds the buffer is cleared and the new instance returned; a
    /// failed activation leaves the buffer intact.
    pub fn register_step(
        &mut self,
        user: &UserRef,
        action: Activation,
        manager: &mut AbilityManager,
    ) -> Option<InstanceId> {
        let selected = user.selected_ability()?;
        let now = self.clock.now();

        let buffer = self.buffers.entry(user.id()).or_default();
        if !buffer.steps.is_empty() && now.saturating_sub(buffer.last_step) >= self.expiry {
            trace!(user = %user.id(), "sequence buffer expired");
            buffer.steps.clear();
        }
        if buffer.steps.len() >= self.max_steps {
            buffer.steps.pop_front();
        }
        buffer.steps.push_back(SequenceStep::new(selected, action));
        buffer.last_step = now;

        for sequence in self.registry.iter() {
            if !sequence.matches(&buffer.steps) {
                continue;
            }
            if let Some(id) = manager.activate(user, Activation::Sequence, sequence.ability()) {
                debug!(user = %user.id(), ability = %sequence.ability().name(), instance = %id, "sequence triggered");
                manager.push_event(EngineEvent::sequence_triggered(
                    manager.tick(),
                    user.id(),
                    sequence.ability().name(),
                    id,
                ));
                buffer.steps.clear();
                return Some(id);
            }
        }
        None
    }

    /// Steps currently buffered for a user.
    pub fn buffered(&self, user: UserId) -> usize {
        self.buffers.get(&user).map_or(0, |b| b.steps.len())
    }

    /// Forget the user's recent input.
    pub fn clear(&mut self, user: UserId) {
        if let Some(buffer) = self.buffers.get_mut(&user) {
            buffer.steps.clear();
        }
    }

    /// Drop all state for a user who left.
    pub fn remove_user(&mut self, user: UserId) {
        self.buffers.remove(&user);
    }
}

impl fmt::Debug for SequenceMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SequenceMatcher")
            .field("sequences", &self.registry.len())
            .field("max_steps", &self.max_steps)
            .field("expiry", &self.expiry)
            .field("users", &self.buffers.len())
            .finish()
    }
}
