use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{trace, warn};

use crate::election::core::{InstanceId, LeaderCell};
use crate::election::error::ElectionError;
use crate::election::message::Message;

/// Returns the smallest live id strictly greater than `current`.
/// Ascending id order is the single tie-break rule for candidate search.
pub fn next_live_above(
    snapshot: &[(InstanceId, bool)],
    current: InstanceId,
) -> Option<InstanceId> {
    snapshot
        .iter()
        .filter(|&&(id, alive)| alive && id > current)
        .map(|&(id, _)| id)
        .min()
}

/// Candidate search with wrap-around: the smallest live id strictly greater
/// than `current`, or failing that the smallest live id overall. The scan
/// never yields `current` itself; None means no other live instance exists.
pub fn next_live_wrapping(
    snapshot: &[(InstanceId, bool)],
    current: InstanceId,
) -> Option<InstanceId> {
    next_live_above(snapshot, current).or_else(|| {
        snapshot
            .iter()
            .filter(|&&(id, alive)| alive && id != current)
            .map(|&(id, _)| id)
            .min()
    })
}

/// Routing-side handle for a single instance: the shared liveness flag and
/// leader cell plus the sender half of the instance's message channel.
#[derive(Debug, Clone)]
pub struct InstanceHandle {
    /// Instance id this handle represents
    pub id: InstanceId,
    alive: Arc<AtomicBool>,
    leader: LeaderCell,
    sender: mpsc::UnboundedSender<Message>,
}

impl InstanceHandle {
    /// Reads the liveness flag
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Flips the liveness flag (driver-side crash/recovery injection)
    pub fn set_alive(&self, alive: bool) {
        self.alive.store(alive, Ordering::SeqCst);
    }

    /// Clones the shared liveness flag for the instance task
    pub fn alive_flag(&self) -> Arc<AtomicBool> {
        self.alive.clone()
    }

    /// Clones the shared leader cell for the instance task
    pub fn leader_cell(&self) -> LeaderCell {
        self.leader.clone()
    }

    /// Enqueues a message on the instance's channel
    pub fn send(&self, message: Message) -> Result<(), mpsc::error::SendError<Message>> {
        self.sender.send(message)
    }
}

/// Routing and delivery service shared by all instances.
///
/// Owns the registry mapping ids to instance handles; the registry itself is
/// never mutated after construction, only the liveness flags inside the
/// referenced handles flip. Candidate resolution reads a consistent snapshot
/// of the per-instance atomic flags, insulating election logic from direct
/// references between instances.
#[derive(Debug)]
pub struct MessageRouter {
    instances: HashMap<InstanceId, InstanceHandle>,
}

impl MessageRouter {
    /// Creates the registry for a fixed set of instance ids and returns the
    /// receiver half of each instance's channel. Every instance starts alive
    /// with its believed leader set to the smallest registry id, the
    /// deterministic bootstrap that needs no election at t=0.
    pub fn new(ids: &[InstanceId]) -> (Self, Vec<(InstanceId, mpsc::UnboundedReceiver<Message>)>) {
        let bootstrap_leader = ids.iter().copied().min().unwrap_or(0);
        let mut instances = HashMap::new();
        let mut receivers = Vec::new();

        for &id in ids {
            let (sender, receiver) = mpsc::unbounded_channel();
            instances.insert(
                id,
                InstanceHandle {
                    id,
                    alive: Arc::new(AtomicBool::new(true)),
                    leader: LeaderCell::new(bootstrap_leader),
                    sender,
                },
            );
            receivers.push((id, receiver));
        }

        (Self { instances }, receivers)
    }

    /// Gets the handle for an instance id
    pub fn handle(&self, id: InstanceId) -> Option<&InstanceHandle> {
        self.instances.get(&id)
    }

    /// Gets all registered instance ids in ascending order
    pub fn all_instance_ids(&self) -> Vec<InstanceId> {
        let mut ids: Vec<InstanceId> = self.instances.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Gets the number of instances in the registry
    pub fn size(&self) -> usize {
        self.instances.len()
    }

    /// Takes a consistent snapshot of `(id, alive)` pairs in ascending id
    /// order, the immutable input for candidate search
    pub fn liveness_snapshot(&self) -> Vec<(InstanceId, bool)> {
        let mut snapshot: Vec<(InstanceId, bool)> = self
            .instances
            .values()
            .map(|handle| (handle.id, handle.is_alive()))
            .collect();
        snapshot.sort_unstable_by_key(|&(id, _)| id);
        snapshot
    }

    /// Flips an instance's liveness flag (crash/recovery injection)
    pub fn set_alive(&self, id: InstanceId, alive: bool) -> Result<(), ElectionError> {
        self.handle(id)
            .map(|handle| handle.set_alive(alive))
            .ok_or(ElectionError::UnknownInstance(id))
    }

    /// Reads the leader id an instance currently believes in
    pub fn current_leader(&self, id: InstanceId) -> Result<InstanceId, ElectionError> {
        self.handle(id)
            .map(|handle| handle.leader_cell().get())
            .ok_or(ElectionError::UnknownInstance(id))
    }

    /// Resolves the next candidate after `current`: the live instance with
    /// the smallest id strictly greater than `current`, wrapping around to
    /// the smallest live id when none exists above. Fails with
    /// `NoLiveInstance` when no live candidate exists anywhere; callers
    /// treat that as "election cannot proceed yet".
    pub fn find_next_instance(&self, current: InstanceId) -> Result<InstanceId, ElectionError> {
        next_live_wrapping(&self.liveness_snapshot(), current).ok_or(ElectionError::NoLiveInstance)
    }

    /// Delivers a heartbeat probe to `target`. Returns true iff the target
    /// is known and alive; an unreachable or unknown target is ordinary
    /// traffic, never an error.
    pub fn send_heartbeat_message(&self, target: InstanceId) -> bool {
        match self.handle(target) {
            Some(handle) if handle.is_alive() => {
                let _ = handle.send(Message::Heartbeat);
                true
            }
            Some(_) => {
                trace!(target, "heartbeat probe found target crashed");
                false
            }
            None => {
                trace!(target, "heartbeat probe for unknown instance id");
                false
            }
        }
    }

    /// Delivers an Election bid to the next live candidate outranking
    /// `sender`. Returns true when a candidate accepted the bid and will
    /// itself contest leadership; false when no live candidate outranks the
    /// sender and the sender must take leadership itself.
    pub fn send_election_message(&self, sender: InstanceId, content: String) -> bool {
        let candidate = match next_live_above(&self.liveness_snapshot(), sender) {
            Some(id) => id,
            None => {
                trace!(sender, "no live candidate outranks the sender");
                return false;
            }
        };

        // The handle exists because the snapshot was built from the registry
        let delivered = self
            .handle(candidate)
            .map(|handle| handle.send(Message::Election { content }).is_ok())
            .unwrap_or(false);
        if delivered {
            trace!(sender, candidate, "election bid forwarded");
        } else {
            warn!(
                sender,
                candidate, "candidate channel closed, treating bid as unaccepted"
            );
        }
        delivered
    }

    /// Broadcasts a Leader announcement to every live instance except the
    /// sender, which already updated its own state. Delivery to crashed
    /// instances is a no-op.
    pub fn send_leader_message(&self, sender: InstanceId, new_leader: InstanceId) {
        for handle in self.instances.values() {
            if handle.id == sender {
                continue;
            }
            if !handle.is_alive() {
                trace!(
                    target = handle.id,
                    new_leader, "skipping leader announcement to crashed instance"
                );
                continue;
            }
            let _ = handle.send(Message::leader(new_leader));
        }
    }

    /// Wakes the heartbeat-check behavior on a specific instance
    pub fn send_heartbeat_invoke_message(&self, target: InstanceId) {
        self.invoke(target, Message::HeartbeatInvoke);
    }

    /// Triggers the election behavior on a specific instance out of band
    pub fn send_election_invoke_message(&self, target: InstanceId) {
        self.invoke(target, Message::ElectionInvoke);
    }

    /// Triggers a leadership re-announcement on a specific instance
    pub fn send_leader_invoke_message(&self, target: InstanceId) {
        self.invoke(target, Message::LeaderInvoke);
    }

    fn invoke(&self, target: InstanceId, message: Message) {
        match self.handle(target) {
            Some(handle) => {
                let _ = handle.send(message);
            }
            None => warn!(target, "invoke requested for unknown instance id"),
        }
    }
}
