use crate::election::core::InstanceId;
use thiserror::Error;

/// Failures surfaced by the election subsystem.
///
/// An unreachable peer is never an error: liveness failure is ordinary
/// traffic and is signaled as a boolean `false` by the delivery primitives.
/// The variants here are the structural and programmer-error conditions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ElectionError {
    /// No instance in the registry is alive; an election cannot proceed
    /// until the driver reintroduces liveness
    #[error("no live instance available in the registry")]
    NoLiveInstance,

    /// The id is not present in the registry
    #[error("unknown instance id {0}")]
    UnknownInstance(InstanceId),

    /// Message content did not decode to an instance id; this indicates a
    /// bug in the routing or encoding layer, not a liveness condition
    #[error("malformed message content {0:?}, expected an instance id")]
    MalformedContent(String),
}
