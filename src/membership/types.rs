use crate::network::types::Address;
use serde::{Deserialize, Serialize};

/// Stable member key, derived from the address as `host:port`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemberId(pub String);

impl MemberId {
    pub fn of(address: &Address) -> Self {
        Self(address.to_string())
    }
}

/// One entry of a membership view.
///
/// `last_seen` is a reading of the clock of whichever node holds the record;
/// `heartbeat` comes from the member's own cycle and never decreases.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Member {
    pub id: MemberId,
    pub address: Address,
    pub last_seen: u64,
    pub heartbeat: u64,
}

impl Member {
    pub fn new(address: Address, heartbeat: u64, last_seen: u64) -> Self {
        Self {
            id: MemberId::of(&address),
            address,
            last_seen,
            heartbeat,
        }
    }

    /// Same heartbeat, seen at `now`.
    pub fn seen_at(&self, now: u64) -> Self {
        Self {
            last_seen: now,
            ..self.clone()
        }
    }

    pub fn age(&self, now: u64) -> u64 {
        now.saturating_sub(self.last_seen)
    }
}

/// The gossip wire protocol.
///
/// - `Join`: Sent by a node to a seed to announce itself.
/// - `MemberList`: Periodic push of the sender's active view.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum GossipMessage {
    Join { sender: Member },
    MemberList { sender: Member, members: Vec<Member> },
}

impl GossipMessage {
    pub fn sender(&self) -> &Member {
        match self {
            GossipMessage::Join { sender } => sender,
            GossipMessage::MemberList { sender, .. } => sender,
        }
    }

    pub fn members(&self) -> &[Member] {
        match self {
            GossipMessage::Join { .. } => &[],
            GossipMessage::MemberList { members, .. } => members,
        }
    }
}
