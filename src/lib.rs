//! Gossip-Replicated Key-Value Store Library
//!
//! This library crate defines the modules that make up a cluster node. The
//! binary (`main.rs`) wires them to UDP and a tokio scheduler.
//!
//! ## Architecture Modules
//! - **`membership`**: Heartbeat gossip and failure detection. Every node keeps its
//!   own eventually consistent view of who is alive.
//! - **`storage`**: Consistent-hash placement and the quorum engine that forwards,
//!   replicates, orders and repairs key-value requests.
//! - **`network`**: The two-operation transport contract with in-process and UDP
//!   implementations, plus the datagram codec.
//! - **`node`**: Composes the above into a lockable node, a scheduler, a client
//!   and admin HTTP handlers.
//! - **`clock`**, **`config`**, **`error`**: Shared plumbing.

pub mod clock;
pub mod config;
pub mod error;
pub mod membership;
pub mod network;
pub mod node;
pub mod storage;
