//! Membership & Discovery Module
//!
//! Implements a heartbeat-based gossip protocol that gives every node an
//! eventually consistent view of who is in the cluster.
//!
//! ## Core Mechanisms
//! - **Heartbeats**: Each node bumps its own counter every cycle. A member record
//!   only ever moves forward: an update with a stale heartbeat is ignored.
//! - **Gossip**: Every cycle a node sends its full active member list to a few
//!   peers chosen by a pluggable `SpreadStrategy`.
//! - **Failure Detection**: A member not refreshed within the failure window
//!   drops out of the active view, and is removed for good after the cleanup window.

pub mod gossip;
pub mod service;
pub mod spread;
pub mod types;

#[cfg(test)]
mod tests;
