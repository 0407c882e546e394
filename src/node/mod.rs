//! Node Composition Module
//!
//! Wires the protocol pieces into something that can run.
//!
//! ## Core Concepts
//! - **ClusterNode**: One node's membership, gossip driver and KV engine behind a
//!   single lock, so `handle` and `cycle` never interleave.
//! - **NodeRuntime**: The tokio scheduler that drains a listener into `handle` and
//!   calls `cycle` on a fixed interval.
//! - **KvClient**: A request/response client that talks to any node over the same
//!   `Network` the nodes use.
//! - **Handlers**: Read-only HTTP views of a node for operators.

pub mod client;
pub mod cluster;
pub mod handlers;
pub mod runtime;
