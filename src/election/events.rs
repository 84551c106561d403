//! Real-time event stream capturing election activity for monitoring the
//! simulation from the outside: role changes, heartbeat probes, election
//! rounds and leader announcements.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::election::core::{InstanceId, Role};

static EVENT_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A single observable event in the election simulation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElectionEvent {
    /// Unique event identifier for tracking
    pub id: u64,
    /// Unix timestamp in milliseconds when the event occurred
    pub timestamp: u64,
    /// Instance that originated this event
    pub instance_id: InstanceId,
    /// The specific event data
    pub event_type: ElectionEventType,
}

impl ElectionEvent {
    /// Creates a new event with the current timestamp
    pub fn new(instance_id: InstanceId, event_type: ElectionEventType) -> Self {
        let id = EVENT_COUNTER.fetch_add(1, Ordering::Relaxed) + 1;
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;

        Self {
            id,
            timestamp,
            instance_id,
            event_type,
        }
    }
}

/// All observable election activities
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ElectionEventType {
    /// Instance changed role (Follower/Electing/Leader)
    RoleChange {
        from_role: Role,
        to_role: Role,
        reason: String,
    },

    /// A periodic or driver-triggered heartbeat probe of the believed leader
    HeartbeatProbe {
        leader_id: InstanceId,
        healthy: bool,
    },

    /// Instance detected leader failure or was invoked and started electing
    ElectionStarted { believed_leader: InstanceId },

    /// A live higher candidate accepted the bid and will contest itself
    ElectionBidAccepted { bidder_id: InstanceId },

    /// No live candidate outranked the bidder; it takes leadership
    LeaderElected { leader_id: InstanceId },

    /// Instance applied a Leader broadcast
    LeaderAnnounced { leader_id: InstanceId },

    /// Driver flipped an instance's liveness flag
    CrashInjected,
    RecoveryInjected,
}

/// Helper constructors for common events
impl ElectionEvent {
    /// Creates a role change event
    pub fn role_change(
        instance_id: InstanceId,
        from_role: Role,
        to_role: Role,
        reason: String,
    ) -> Self {
        Self::new(
            instance_id,
            ElectionEventType::RoleChange {
                from_role,
                to_role,
                reason,
            },
        )
    }

    /// Creates a heartbeat probe event
    pub fn heartbeat_probe(instance_id: InstanceId, leader_id: InstanceId, healthy: bool) -> Self {
        Self::new(
            instance_id,
            ElectionEventType::HeartbeatProbe { leader_id, healthy },
        )
    }

    /// Creates an election started event
    pub fn election_started(instance_id: InstanceId, believed_leader: InstanceId) -> Self {
        Self::new(
            instance_id,
            ElectionEventType::ElectionStarted { believed_leader },
        )
    }

    /// Creates a leader elected event
    pub fn leader_elected(leader_id: InstanceId) -> Self {
        Self::new(leader_id, ElectionEventType::LeaderElected { leader_id })
    }

    /// Creates a leader announced event
    pub fn leader_announced(instance_id: InstanceId, leader_id: InstanceId) -> Self {
        Self::new(instance_id, ElectionEventType::LeaderAnnounced { leader_id })
    }
}

/// Event channel wrapper for broadcasting events to multiple subscribers
#[derive(Debug, Clone)]
pub struct EventBroadcaster {
    sender: tokio::sync::broadcast::Sender<ElectionEvent>,
}

impl EventBroadcaster {
    /// Creates a new event broadcaster with the specified channel capacity
    pub fn new(capacity: usize) -> (Self, tokio::sync::broadcast::Receiver<ElectionEvent>) {
        let (sender, receiver) = tokio::sync::broadcast::channel(capacity);
        (Self { sender }, receiver)
    }

    /// Broadcasts an event to all subscribers; events with no subscriber
    /// are dropped, which is fine for pure observability
    pub fn emit(&self, event: ElectionEvent) {
        let _ = self.sender.send(event);
    }

    /// Creates a new subscriber to the event stream
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<ElectionEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_creation() {
        let event = ElectionEvent::role_change(
            2,
            Role::Follower,
            Role::Electing,
            "election started".to_string(),
        );

        assert_eq!(event.instance_id, 2);
        match event.event_type {
            ElectionEventType::RoleChange {
                from_role,
                to_role,
                reason,
            } => {
                assert!(matches!(from_role, Role::Follower));
                assert!(matches!(to_role, Role::Electing));
                assert_eq!(reason, "election started");
            }
            _ => panic!("Wrong event type"),
        }
    }

    #[test]
    fn test_event_ids_are_unique() {
        let first = ElectionEvent::leader_elected(4);
        let second = ElectionEvent::leader_elected(4);
        assert_ne!(first.id, second.id);
    }

    #[test]
    fn test_event_broadcaster() {
        let (broadcaster, mut receiver) = EventBroadcaster::new(16);

        let event = ElectionEvent::heartbeat_probe(1, 5, false);
        broadcaster.emit(event.clone());

        let received = receiver.blocking_recv().unwrap();
        assert_eq!(received.id, event.id);
        assert_eq!(received.instance_id, 1);
    }

    #[test]
    fn test_event_serialization() {
        let event = ElectionEvent::leader_announced(2, 4);

        let json = serde_json::to_string(&event).unwrap();
        let deserialized: ElectionEvent = serde_json::from_str(&json).unwrap();

        assert_eq!(event.instance_id, deserialized.instance_id);
        match deserialized.event_type {
            ElectionEventType::LeaderAnnounced { leader_id } => assert_eq!(leader_id, 4),
            _ => panic!("Wrong event type"),
        }
    }
}
