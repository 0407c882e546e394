//! Error types shared across the cluster.
//!
//! The protocol state machines (`Membership`, `GossipDriver`, `KvEngine`) never
//! return these: anomalies there turn into FAIL replies or log lines. They
//! surface at the edges instead: transport setup, wire decoding, configuration
//! and the request/response client.

use crate::network::types::Address;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClusterError {
    /// The transport could not hand the payload to the target.
    #[error("network unavailable: could not deliver to {target}")]
    NetworkUnavailable { target: Address },

    /// Fewer live members than the replication factor requires.
    #[error("insufficient replicas: need {needed}, have {available}")]
    InsufficientReplicas { needed: usize, available: usize },

    /// No response arrived within the configured window.
    #[error("request timed out after {millis} ms")]
    Timeout { millis: u64 },

    /// The coordinating node answered FAIL.
    #[error("request for key '{key}' was rejected")]
    Rejected { key: String },

    /// A frame or address that does not decode.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ClusterError>;
