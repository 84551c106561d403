/// Core instance state: identifiers, roles and the per-instance state machine data
pub mod core;

/// Message types exchanged between instances
pub mod message;

/// Message routing and candidate resolution (the MessageManager)
pub mod routing;

/// Error taxonomy for the election subsystem
pub mod error;

/// Real-time event stream for observing election activity
pub mod events;

/// Async simulation infrastructure: per-instance run loops and the driver API
pub mod simulation;


/// Integration tests for whole-simulation behavior
#[cfg(test)]
mod integration_tests;

// Re-export commonly used types for convenience
pub use self::core::{InstanceId, Role};
pub use self::error::ElectionError;
pub use self::message::Message;
pub use self::simulation::{spawn_simulation, Simulation};
