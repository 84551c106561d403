use crate::election::core::InstanceId;
use crate::election::error::ElectionError;

/// Messages that can be delivered between instances in the simulation.
/// Election and Leader carry the relevant instance id as string content;
/// the invoke variants are out-of-band wake-ups carrying no payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Wakes the periodic heartbeat check on the receiving instance
    HeartbeatInvoke,
    /// Liveness probe record delivered to a live target; the acknowledgement
    /// itself is the router's synchronous boolean, not a reply message
    Heartbeat,
    /// Triggers the election procedure on the receiving instance out of band
    ElectionInvoke,
    /// Election bid from a lower-id instance; content is the bidder's id
    Election {
        /// The bidding instance's id, encoded as text
        content: String,
    },
    /// Triggers a leadership re-announcement on the receiving instance
    LeaderInvoke,
    /// Leader announcement broadcast; content is the new leader's id
    Leader {
        /// The announced leader's id, encoded as text
        content: String,
    },
}

impl Message {
    /// Creates an Election bid carrying the sender's id as content
    pub fn election(sender_id: InstanceId) -> Self {
        Self::Election {
            content: sender_id.to_string(),
        }
    }

    /// Creates a Leader announcement carrying the new leader's id as content
    pub fn leader(leader_id: InstanceId) -> Self {
        Self::Leader {
            content: leader_id.to_string(),
        }
    }

    /// Gets the string content for Election/Leader messages, None otherwise
    pub fn content(&self) -> Option<&str> {
        match self {
            Self::Election { content } | Self::Leader { content } => Some(content),
            _ => None,
        }
    }

    /// Parses the content as an instance id.
    /// Fails with `MalformedContent` when the message carries no content or
    /// the content is not a valid id; that indicates a routing-layer bug.
    pub fn content_id(&self) -> Result<InstanceId, ElectionError> {
        let content = self
            .content()
            .ok_or_else(|| ElectionError::MalformedContent(String::new()))?;
        content
            .parse()
            .map_err(|_| ElectionError::MalformedContent(content.to_string()))
    }

    /// Returns the message type as a string for debugging/logging
    pub fn message_type(&self) -> &'static str {
        match self {
            Self::HeartbeatInvoke => "HeartbeatInvoke",
            Self::Heartbeat => "Heartbeat",
            Self::ElectionInvoke => "ElectionInvoke",
            Self::Election { .. } => "Election",
            Self::LeaderInvoke => "LeaderInvoke",
            Self::Leader { .. } => "Leader",
        }
    }
}
