//! Key-value wire messages.
//!
//! One message shape covers client requests, owner-to-replica fan-out,
//! acknowledgements and final replies. The `replica` flag marks traffic from an
//! owner that must be applied directly instead of being coordinated again.

use crate::network::types::Address;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    Read,
    Create,
    Update,
    Delete,
    Ack,
    Ok,
    Fail,
    /// Owner-initiated copy of the current value, applied like `Create`.
    Replicate,
}

impl MessageType {
    /// Requests that never change state and so need no write ordering.
    pub fn is_idempotent(self) -> bool {
        matches!(self, MessageType::Read)
    }

    /// Operations a node coordinates or applies, as opposed to replies.
    pub fn is_request(self) -> bool {
        matches!(
            self,
            MessageType::Read
                | MessageType::Create
                | MessageType::Update
                | MessageType::Delete
                | MessageType::Replicate
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KvMessage {
    pub kind: MessageType,
    /// Assigned by the sender; an owner re-numbers fan-out with its own counter.
    pub seq: u64,
    pub sender: Address,
    pub key: String,
    pub value: Option<String>,
    pub replica: bool,
}

impl KvMessage {
    pub fn new(
        kind: MessageType,
        seq: u64,
        sender: Address,
        key: impl Into<String>,
        value: Option<String>,
    ) -> Self {
        Self {
            kind,
            seq,
            sender,
            key: key.into(),
            value,
            replica: false,
        }
    }

    pub fn read(seq: u64, sender: Address, key: impl Into<String>) -> Self {
        Self::new(MessageType::Read, seq, sender, key, None)
    }

    pub fn create(seq: u64, sender: Address, key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(MessageType::Create, seq, sender, key, Some(value.into()))
    }

    pub fn update(seq: u64, sender: Address, key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(MessageType::Update, seq, sender, key, Some(value.into()))
    }

    pub fn delete(seq: u64, sender: Address, key: impl Into<String>) -> Self {
        Self::new(MessageType::Delete, seq, sender, key, None)
    }

    /// Success reply from `from`, keeping the request's sequence number.
    pub fn ok(&self, from: &Address) -> Self {
        self.reply(MessageType::Ok, from)
    }

    pub fn fail(&self, from: &Address) -> Self {
        self.reply(MessageType::Fail, from)
    }

    /// Replica acknowledgement from `from`.
    pub fn ack(&self, from: &Address) -> Self {
        self.reply(MessageType::Ack, from)
    }

    /// Fan-out copy sent by `owner`.
    pub fn replica_of(&self, owner: &Address) -> Self {
        Self {
            sender: owner.clone(),
            replica: true,
            ..self.clone()
        }
    }

    pub fn with_seq(&self, seq: u64) -> Self {
        Self {
            seq,
            ..self.clone()
        }
    }

    pub fn with_value(&self, value: Option<String>) -> Self {
        Self {
            value,
            ..self.clone()
        }
    }

    fn reply(&self, kind: MessageType, from: &Address) -> Self {
        Self {
            kind,
            sender: from.clone(),
            ..self.clone()
        }
    }
}
