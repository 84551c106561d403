use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Type alias for instance identifiers in the simulation
pub type InstanceId = usize;

/// Represents the three possible roles an instance can be in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    /// Instance believes another instance is leader and probes it periodically
    Follower,
    /// Instance has sent an election bid and is awaiting the outcome
    Electing,
    /// Instance believes itself to be the current leader
    Leader,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Follower => write!(f, "Follower"),
            Role::Electing => write!(f, "Electing"),
            Role::Leader => write!(f, "Leader"),
        }
    }
}

/// Shared cell holding the leader id an instance currently believes in.
/// Written only by the owning instance's task; read by the driver for
/// observability.
#[derive(Debug, Clone)]
pub struct LeaderCell(Arc<AtomicUsize>);

impl LeaderCell {
    /// Creates a new cell with an initial leader assignment
    pub fn new(leader_id: InstanceId) -> Self {
        Self(Arc::new(AtomicUsize::new(leader_id)))
    }

    /// Reads the currently believed leader id
    pub fn get(&self) -> InstanceId {
        self.0.load(Ordering::SeqCst)
    }

    /// Records a new believed leader id
    pub fn set(&self, leader_id: InstanceId) {
        self.0.store(leader_id, Ordering::SeqCst);
    }
}

/// Per-instance state owned by the instance's task.
///
/// Identity and ordering never change after construction; the liveness flag
/// is flipped only by the simulation driver and the believed leader only by
/// the election state machine.
#[derive(Debug)]
pub struct Instance {
    /// Unique, immutable, totally ordered identifier
    pub id: InstanceId,
    /// Current role in the election state machine
    pub role: Role,
    /// Liveness flag shared with the routing layer (crash/recovery injection)
    alive: Arc<AtomicBool>,
    /// Believed leader, shared with the driver for observability
    leader: LeaderCell,
    /// Interval between periodic heartbeat checks
    pub heartbeat_interval: Duration,
}

impl Instance {
    /// Creates a new instance sharing the liveness flag and leader cell held
    /// by its routing handle. The heartbeat interval is jittered so probes
    /// from different instances do not fire in lockstep.
    pub fn new(id: InstanceId, alive: Arc<AtomicBool>, leader: LeaderCell) -> Self {
        let mut rng = rand::thread_rng();
        let interval_ms = rng.gen_range(150..=250);
        Self {
            id,
            role: Role::Follower,
            alive,
            leader,
            heartbeat_interval: Duration::from_millis(interval_ms),
        }
    }

    /// Checks the liveness flag (crash injection makes this false)
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Gets the id this instance currently believes is leader
    pub fn leader_id(&self) -> InstanceId {
        self.leader.get()
    }

    /// Transitions into the electing state after detecting leader failure
    pub fn begin_election(&mut self) {
        self.role = Role::Electing;
    }

    /// Returns to follower after a higher candidate accepted the bid;
    /// the believed leader stays unchanged until the Leader broadcast lands
    pub fn await_announcement(&mut self) {
        self.role = Role::Follower;
    }

    /// Takes leadership: no live candidate outranked this instance
    pub fn become_leader(&mut self) {
        self.role = Role::Leader;
        self.leader.set(self.id);
    }

    /// Applies a Leader announcement: record the new leader and follow it,
    /// unless the announced id is this instance itself
    pub fn follow(&mut self, leader_id: InstanceId) {
        self.leader.set(leader_id);
        self.role = if leader_id == self.id {
            Role::Leader
        } else {
            Role::Follower
        };
    }
}

impl fmt::Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Instance{} [{}] leader:{}",
            self.id,
            self.role,
            self.leader_id()
        )
    }
}
