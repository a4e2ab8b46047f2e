//! Engine Events
//!
//! Lifecycle, collision and combo events buffered during a tick and
//! handed out through `TickResult`.

use serde::{Serialize, Deserialize};

use crate::game::ability::InstanceId;
use crate::game::user::UserId;

/// Priority for event processing order.
///
/// Lower value = processed first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum EventPriority {
    /// Faults first
    Fault = 0,
    /// Then collision outcomes
    Collision = 1,
    /// Then removals
    Destroy = 2,
    /// Then activations and ownership changes
    Lifecycle = 3,
    /// Lowest priority
    Other = 255,
}

/// Why an instance left the live set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DestroyReason {
    /// `update` returned `Remove`
    Expired,
    /// `update` returned an error or panicked
    Faulted,
    /// Flagged by collision resolution
    Collision,
    /// Explicit `destroy_instance`
    Requested,
    /// Bulk destroy by type, user or world
    Bulk,
}

/// Engine event data.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum EngineEventData {
    /// Instance entered the add queue
    AbilityQueued {
        /// Instance id
        instance: InstanceId,
        /// Kind name
        ability: String,
        /// Owner
        user: UserId,
    },

    /// Queued instance became live
    AbilityStarted {
        /// Instance id
        instance: InstanceId,
        /// Kind name
        ability: String,
        /// Owner
        user: UserId,
    },

    /// Instance faulted in a callback
    AbilityFaulted {
        /// Instance id
        instance: InstanceId,
        /// Kind name
        ability: String,
        /// Owner
        user: UserId,
        /// Error or panic message
        message: String,
    },

    /// Instance destroyed
    AbilityDestroyed {
        /// Instance id
        instance: InstanceId,
        /// Kind name
        ability: String,
        /// Owner
        user: UserId,
        /// Why it was destroyed
        reason: DestroyReason,
    },

    /// Instance moved to another owner
    OwnerChanged {
        /// Instance id
        instance: InstanceId,
        /// Kind name
        ability: String,
        /// Previous owner
        from: UserId,
        /// New owner
        to: UserId,
    },

    /// Two instances collided
    CollisionResolved {
        /// First instance
        first: InstanceId,
        /// Second instance
        second: InstanceId,
        /// First instance's kind
        first_ability: String,
        /// Second instance's kind
        second_ability: String,
        /// First instance destroyed
        first_removed: bool,
        /// Second instance destroyed
        second_removed: bool,
    },

    /// A combo matched and its ability started
    SequenceTriggered {
        /// Owner
        user: UserId,
        /// Kind name
        ability: String,
        /// Instance id
        instance: InstanceId,
    },
}

/// An engine event with timing and priority.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EngineEvent {
    /// Tick when event occurred
    pub tick: u64,

    /// Processing priority
    pub priority: EventPriority,

    /// User involved (for tie-breaking)
    pub user_id: Option<UserId>,

    /// Event data
    pub data: EngineEventData,
}

impl EngineEvent {
    /// Create a new event.
    pub fn new(tick: u64, priority: EventPriority, data: EngineEventData) -> Self {
        let user_id = match &data {
            EngineEventData::AbilityQueued { user, .. } => Some(*user),
            EngineEventData::AbilityStarted { user, .. } => Some(*user),
            EngineEventData::AbilityFaulted { user, .. } => Some(*user),
            EngineEventData::AbilityDestroyed { user, .. } => Some(*user),
            EngineEventData::OwnerChanged { to, .. } => Some(*to),
            EngineEventData::SequenceTriggered { user, .. } => Some(*user),
            EngineEventData::CollisionResolved { .. } => None,
        };

        Self {
            tick,
            priority,
            user_id,
            data,
        }
    }

    /// Create ability queued event.
    pub fn ability_queued(tick: u64, instance: InstanceId, ability: &str, user: UserId) -> Self {
        Self::new(
            tick,
            EventPriority::Lifecycle,
            EngineEventData::AbilityQueued {
                instance,
                ability: ability.to_owned(),
                user,
            },
        )
    }

    /// Create ability started event.
    pub fn ability_started(tick: u64, instance: InstanceId, ability: &str, user: UserId) -> Self {
        Self::new(
            tick,
            EventPriority::Lifecycle,
            EngineEventData::AbilityStarted {
                instance,
                ability: ability.to_owned(),
                user,
            },
        )
    }

    /// Create ability faulted event.
    pub fn ability_faulted(
        tick: u64,
        instance: InstanceId,
        ability: &str,
        user: UserId,
        message: String,
    ) -> Self {
        Self::new(
            tick,
            EventPriority::Fault,
            EngineEventData::AbilityFaulted {
                instance,
                ability: ability.to_owned(),
                user,
                message,
            },
        )
    }

    /// Create ability destroyed event.
    pub fn ability_destroyed(
        tick: u64,
        instance: InstanceId,
        ability: &str,
        user: UserId,
        reason: DestroyReason,
    ) -> Self {
        Self::new(
            tick,
            EventPriority::Destroy,
            EngineEventData::AbilityDestroyed {
                instance,
                ability: ability.to_owned(),
                user,
                reason,
            },
        )
    }

    /// Create owner changed event.
    pub fn owner_changed(
        tick: u64,
        instance: InstanceId,
        ability: &str,
        from: UserId,
        to: UserId,
    ) -> Self {
        Self::new(
            tick,
            EventPriority::Lifecycle,
            EngineEventData::OwnerChanged {
                instance,
                ability: ability.to_owned(),
                from,
                to,
            },
        )
    }

    /// Create collision resolved event.
    pub fn collision_resolved(
        tick: u64,
        (first, first_ability, first_removed): (InstanceId, &str, bool),
        (second, second_ability, second_removed): (InstanceId, &str, bool),
    ) -> Self {
        Self::new(
            tick,
            EventPriority::Collision,
            EngineEventData::CollisionResolved {
                first,
                second,
                first_ability: first_ability.to_owned(),
                second_ability: second_ability.to_owned(),
                first_removed,
                second_removed,
            },
        )
    }

    /// Create sequence triggered event.
    pub fn sequence_triggered(tick: u64, user: UserId, ability: &str, instance: InstanceId) -> Self {
        Self::new(
            tick,
            EventPriority::Other,
            EngineEventData::SequenceTriggered {
                user,
                ability: ability.to_owned(),
                instance,
            },
        )
    }

    /// Instance the event is about, if it names exactly one.
    pub fn instance(&self) -> Option<InstanceId> {
        match &self.data {
            EngineEventData::AbilityQueued { instance, .. }
            | EngineEventData::AbilityStarted { instance, .. }
            | EngineEventData::AbilityFaulted { instance, .. }
            | EngineEventData::AbilityDestroyed { instance, .. }
            | EngineEventData::OwnerChanged { instance, .. }
            | EngineEventData::SequenceTriggered { instance, .. } => Some(*instance),
            EngineEventData::CollisionResolved { .. } => None,
        }
    }
}

impl PartialEq for EngineEvent {
    fn eq(&self, other: &Self) -> bool {
        self.tick == other.tick
            && self.priority == other.priority
            && self.user_id == other.user_id
    }
}

impl Eq for EngineEvent {}

impl PartialOrd for EngineEvent {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EngineEvent {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Sort by: tick, then priority, then user_id
        self.tick
            .cmp(&other.tick)
            .then(self.priority.cmp(&other.priority))
            .then(self.user_id.cmp(&other.user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_ordering() {
        let id1 = UserId::new([1; 16]);
        let id2 = UserId::new([2; 16]);

        let fault = EngineEvent::ability_faulted(10, InstanceId(1), "Blast", id1, "boom".into());
        let destroyed = EngineEvent::ability_destroyed(10, InstanceId(1), "Blast", id1, DestroyReason::Faulted);
        let other_fault = EngineEvent::ability_faulted(10, InstanceId(2), "Blast", id2, "boom".into());

        // Same tick, but fault < destroy
        assert!(fault < destroyed);

        // Same tick and priority, but id1 < id2
        assert!(fault < other_fault);
    }

    #[test]
    fn test_event_instance() {
        let id = UserId::new([1; 16]);
        let event = EngineEvent::ability_started(3, InstanceId(7), "Shield", id);
        assert_eq!(event.instance(), Some(InstanceId(7)));
        assert_eq!(event.user_id, Some(id));

        let collision = EngineEvent::collision_resolved(3, (InstanceId(1), "A", true), (InstanceId(2), "B", false));
        assert_eq!(collision.instance(), None);
        assert_eq!(collision.user_id, None);
    }
}
