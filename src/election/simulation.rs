use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, trace, warn};

use crate::election::core::{Instance, InstanceId, Role};
use crate::election::error::ElectionError;
use crate::election::events::{ElectionEvent, ElectionEventType, EventBroadcaster};
use crate::election::message::Message;
use crate::election::routing::MessageRouter;

/// Runs a single instance asynchronously, handling incoming messages and the
/// periodic heartbeat timer. This is the main event loop for each instance;
/// it owns the instance state, so every state machine step is serialized.
pub async fn run_instance(
    mut instance: Instance,
    mut receiver: mpsc::UnboundedReceiver<Message>,
    router: Arc<MessageRouter>,
    events: EventBroadcaster,
) {
    loop {
        // An elapsed timeout is the periodic HeartbeatInvoke self-trigger
        match timeout(instance.heartbeat_interval, receiver.recv()).await {
            Ok(Some(message)) => {
                if !instance.is_alive() {
                    trace!(
                        instance_id = instance.id,
                        "crashed instance ignoring message: {}",
                        message.message_type()
                    );
                    continue;
                }
                handle_message(&mut instance, message, &router, &events);
            }
            Ok(None) => {
                // Channel closed, the simulation is tearing down
                break;
            }
            Err(_) => {
                if !instance.is_alive() {
                    continue;
                }
                handle_heartbeat_invoke(&mut instance, &router, &events);
            }
        }
    }
}

/// Dispatches one delivered message through the election state machine
fn handle_message(
    instance: &mut Instance,
    message: Message,
    router: &MessageRouter,
    events: &EventBroadcaster,
) {
    match message {
        Message::HeartbeatInvoke => handle_heartbeat_invoke(instance, router, events),
        Message::Heartbeat => {
            // The acknowledgement was already returned synchronously to the
            // prober; the delivered record is only traffic for tracing
            trace!(instance_id = instance.id, "received heartbeat probe");
        }
        Message::ElectionInvoke => {
            info!(instance_id = instance.id, "election invoked");
            run_election(instance, router, events);
        }
        Message::Election { .. } => {
            let bidder = decode_content(instance.id, &message);
            // Receiving a bid means "I outrank the bidder and I am alive";
            // acceptance was already signaled through the router's boolean,
            // so the receiver now contends against instances outranking it
            info!(
                instance_id = instance.id,
                bidder, "election bid received, contending for leadership"
            );
            run_election(instance, router, events);
        }
        Message::LeaderInvoke => {
            if instance.role == Role::Leader {
                info!(instance_id = instance.id, "re-announcing leadership");
                router.send_leader_message(instance.id, instance.id);
            } else {
                debug!(
                    instance_id = instance.id,
                    "ignoring leader invoke, not currently leader"
                );
            }
        }
        Message::Leader { .. } => {
            let announced = decode_content(instance.id, &message);
            let previous = instance.leader_id();
            change_role(
                instance,
                if announced == instance.id {
                    Role::Leader
                } else {
                    Role::Follower
                },
                "leader announcement received",
                events,
            );
            instance.follow(announced);
            if previous != announced {
                info!(
                    instance_id = instance.id,
                    leader_id = announced,
                    "leader updated"
                );
            }
            events.emit(ElectionEvent::leader_announced(instance.id, announced));
        }
    }
}

/// Probes the believed leader; a failed probe drives a follower into the
/// election procedure. Liveness failure is ordinary signal, never retried
/// blindly; the next periodic tick is the only retry mechanism.
fn handle_heartbeat_invoke(
    instance: &mut Instance,
    router: &MessageRouter,
    events: &EventBroadcaster,
) {
    let leader_id = instance.leader_id();
    let healthy = router.send_heartbeat_message(leader_id);
    events.emit(ElectionEvent::heartbeat_probe(
        instance.id,
        leader_id,
        healthy,
    ));

    if healthy {
        trace!(instance_id = instance.id, leader_id, "leader is alive");
        return;
    }
    if instance.role == Role::Leader {
        // A leader probes itself; a failed probe here would mean the local
        // liveness flag flipped mid-step, nothing to elect over
        return;
    }
    warn!(
        instance_id = instance.id,
        leader_id, "leader is not alive, starting election"
    );
    run_election(instance, router, events);
}

/// The bully election procedure: bid against the candidates outranking this
/// instance; if none is alive, this instance wins and announces leadership.
fn run_election(instance: &mut Instance, router: &MessageRouter, events: &EventBroadcaster) {
    change_role(instance, Role::Electing, "election started", events);
    instance.begin_election();
    events.emit(ElectionEvent::election_started(
        instance.id,
        instance.leader_id(),
    ));

    let accepted = router.send_election_message(instance.id, instance.id.to_string());
    if accepted {
        info!(
            instance_id = instance.id,
            "bid accepted by a higher candidate, awaiting announcement"
        );
        events.emit(ElectionEvent::new(
            instance.id,
            ElectionEventType::ElectionBidAccepted {
                bidder_id: instance.id,
            },
        ));
        change_role(instance, Role::Follower, "awaiting announcement", events);
        instance.await_announcement();
    } else {
        info!(
            instance_id = instance.id,
            "no live candidate outranks this instance, taking leadership"
        );
        change_role(instance, Role::Leader, "won election", events);
        instance.become_leader();
        events.emit(ElectionEvent::leader_elected(instance.id));
        router.send_leader_message(instance.id, instance.id);
    }
}

/// Emits a role change event when the role actually changes
fn change_role(instance: &Instance, to_role: Role, reason: &str, events: &EventBroadcaster) {
    if instance.role != to_role {
        debug!(
            instance_id = instance.id,
            "role change {} -> {} ({reason})", instance.role, to_role
        );
        events.emit(ElectionEvent::role_change(
            instance.id,
            instance.role,
            to_role,
            reason.to_string(),
        ));
    }
}

/// Decodes Election/Leader content into an instance id. Malformed content is
/// a routing-layer bug and fails fast rather than being swallowed.
fn decode_content(instance_id: InstanceId, message: &Message) -> InstanceId {
    match message.content_id() {
        Ok(id) => id,
        Err(err) => {
            error!(instance_id, "{err}");
            panic!("routing bug at instance {instance_id}: {err}");
        }
    }
}

/// Driver-facing handle over a running simulation: crash/recovery injection,
/// external re-triggers and observability over the converged state.
#[derive(Debug)]
pub struct Simulation {
    router: Arc<MessageRouter>,
    events: EventBroadcaster,
    tasks: Vec<JoinHandle<()>>,
}

impl Simulation {
    /// Flips an instance's liveness flag (crash when false, recovery when
    /// true). Recovery does not preempt the sitting leader; the revived
    /// instance rejoins with its stale beliefs until an election involves it.
    pub fn set_alive(&self, id: InstanceId, alive: bool) -> Result<(), ElectionError> {
        self.router.set_alive(id, alive)?;
        if alive {
            info!(instance_id = id, "recovery injected");
            self.events
                .emit(ElectionEvent::new(id, ElectionEventType::RecoveryInjected));
        } else {
            warn!(instance_id = id, "crash injected");
            self.events
                .emit(ElectionEvent::new(id, ElectionEventType::CrashInjected));
        }
        Ok(())
    }

    /// Wakes the heartbeat check on an instance out of band
    pub fn trigger_heartbeat(&self, id: InstanceId) -> Result<(), ElectionError> {
        self.known(id)?;
        self.router.send_heartbeat_invoke_message(id);
        Ok(())
    }

    /// Triggers the election procedure on an instance out of band
    pub fn trigger_election(&self, id: InstanceId) -> Result<(), ElectionError> {
        self.known(id)?;
        self.router.send_election_invoke_message(id);
        Ok(())
    }

    /// Reads the leader id an instance currently believes in
    pub fn current_leader(&self, id: InstanceId) -> Result<InstanceId, ElectionError> {
        self.router.current_leader(id)
    }

    /// Accesses the routing layer directly (candidate resolution, liveness
    /// snapshots); mainly useful for tests and diagnostics
    pub fn router(&self) -> &Arc<MessageRouter> {
        &self.router
    }

    /// Subscribes to the election event stream
    pub fn events(&self) -> tokio::sync::broadcast::Receiver<ElectionEvent> {
        self.events.subscribe()
    }

    /// Stops the simulation: already in-flight handling completes or is
    /// dropped with its task, and no timer re-arms afterwards
    pub fn shutdown(self) {
        for task in self.tasks {
            task.abort();
        }
    }

    fn known(&self, id: InstanceId) -> Result<(), ElectionError> {
        self.router
            .handle(id)
            .map(|_| ())
            .ok_or(ElectionError::UnknownInstance(id))
    }
}

/// Spawns a simulation over a fixed set of instance ids: one task per
/// instance, all starting as followers of the smallest id.
pub async fn spawn_simulation(ids: &[InstanceId]) -> Simulation {
    info!("creating simulation with {} instances", ids.len());
    let (router, receivers) = MessageRouter::new(ids);
    let router = Arc::new(router);
    let (events, _) = EventBroadcaster::new(1024);
    let mut tasks = Vec::new();

    for (id, receiver) in receivers {
        // The handle exists: the receiver list and registry share the id set
        let handle = router
            .handle(id)
            .unwrap_or_else(|| panic!("registry missing instance {id}"));
        let instance = Instance::new(id, handle.alive_flag(), handle.leader_cell());

        info!(
            instance_id = id,
            leader_id = instance.leader_id(),
            "spawning instance as follower"
        );
        let router_clone = router.clone();
        let events_clone = events.clone();
        tasks.push(tokio::spawn(async move {
            run_instance(instance, receiver, router_clone, events_clone).await;
            debug!(instance_id = id, "instance shutting down");
        }));
    }

    Simulation {
        router,
        events,
        tasks,
    }
}
