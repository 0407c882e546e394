//! Replicated Storage Module
//!
//! Implements the quorum-replicated key-value layer on top of the membership view.
//!
//! ## Core Concepts
//! - **Placement**: `HashRing` orders live members by hash position; the owner of a
//!   key is the first member clockwise from the key's position.
//! - **Replication**: `ReplicaSelector` extends the owner with its clockwise
//!   successors. The owner applies each write, fans it out, and answers the client
//!   once a majority has acknowledged.
//! - **Ordering**: While a write for a key is in flight, later requests for that key
//!   are buffered and replayed in arrival order once it resolves.
//! - **Repair**: After a membership change the owner re-replicates keys whose replica
//!   set has moved.

pub mod engine;
pub mod memory;
pub mod partitioner;
pub mod protocol;
